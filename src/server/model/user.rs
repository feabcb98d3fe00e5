use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Admin,
    Cook,
    Waiter,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "cook" => Ok(Self::Cook),
            "waiter" => Ok(Self::Waiter),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

/// the staff member a bearer token resolved to
#[derive(Debug, Clone, Copy)]
pub(crate) struct LoggedUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
}
