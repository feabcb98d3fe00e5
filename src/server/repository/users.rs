use log::error;

use crate::server::controller::error::CustomError;
use crate::server::database::DB_ACQUIRE_TIMEOUT_SECONDS;
use crate::server::model::user::LoggedUser;
use crate::server::repository::{db_err, PgStore, UsersStore};

impl UsersStore for PgStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<LoggedUser>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let row = conn
            .query_opt(
                r#"SELECT id, organization_id, role FROM "user" WHERE api_token = $1"#,
                &[&token],
            )
            .await
            .map_err(db_err("lookup user by token"))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let role = row.get::<_, &str>("role").parse().map_err(|e: String| {
            error!("unexpected user row, {}", e);
            CustomError::DbError
        })?;
        Ok(Some(LoggedUser {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            role,
        }))
    }
}
