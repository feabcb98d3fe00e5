use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Table {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Restaurant {
    pub id: Uuid,
    #[serde(rename = "organizationID")]
    pub organization_id: Uuid,
    pub name: String,
    pub address: String,
    #[serde(rename = "serviceFeeInPercentage")]
    pub service_fee_in_percentage: Decimal,
    pub tables: Vec<Table>,
}

impl Restaurant {
    pub fn has_table(&self, table_id: Uuid) -> bool {
        self.tables.iter().any(|table| table.id == table_id)
    }
}

/// partial update; absent fields keep their current value
#[derive(Debug, Deserialize)]
pub(crate) struct UpdatableRestaurant {
    pub name: Option<String>,
    pub address: Option<String>,
    #[serde(rename = "serviceFeeInPercentage")]
    pub service_fee_in_percentage: Option<Decimal>,
}
