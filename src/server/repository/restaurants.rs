use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::database::DB_ACQUIRE_TIMEOUT_SECONDS;
use crate::server::model::restaurant::{Restaurant, Table, UpdatableRestaurant};
use crate::server::repository::{db_err, PgStore, RestaurantsStore};

const RESTAURANT_SELECT: &str = r#"
    SELECT r.id, r.organization_id, r.name, r.address, r.service_fee_in_percentage,
           t.id AS table_id, t.name AS table_name
    FROM restaurant r
    LEFT JOIN "table" t ON t.restaurant_id = r.id
"#;

impl RestaurantsStore for PgStore {
    async fn find_by_id(&self, restaurant_id: Uuid) -> Result<Option<Restaurant>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        select_restaurant(&*conn, "WHERE r.id = $1", &[&restaurant_id]).await
    }

    async fn find_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Restaurant>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        select_restaurant(&*conn, "WHERE r.organization_id = $1", &[&organization_id]).await
    }

    async fn update_for_organization(
        &self,
        organization_id: Uuid,
        changes: &UpdatableRestaurant,
    ) -> Result<Restaurant, CustomError> {
        let Some(conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let affected = conn
            .execute(
                r#"
                UPDATE restaurant
                SET name = COALESCE($2, name),
                    address = COALESCE($3, address),
                    service_fee_in_percentage = COALESCE($4, service_fee_in_percentage)
                WHERE organization_id = $1
                "#,
                &[
                    &organization_id,
                    &changes.name,
                    &changes.address,
                    &changes.service_fee_in_percentage,
                ],
            )
            .await
            .map_err(db_err("update restaurant"))?;
        if affected == 0 {
            return Err(CustomError::not_found("Restaurant not found"));
        }
        select_restaurant(&*conn, "WHERE r.organization_id = $1", &[&organization_id])
            .await?
            .ok_or_else(|| CustomError::not_found("Restaurant not found"))
    }
}

async fn select_restaurant(
    client: &tokio_postgres::Client,
    clause: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Option<Restaurant>, CustomError> {
    let stmt = format!("{RESTAURANT_SELECT} {clause} ORDER BY t.name");
    let rows = client
        .query(&stmt, params)
        .await
        .map_err(db_err("select restaurant"))?;
    Ok(fold_restaurant(&rows))
}

fn fold_restaurant(rows: &[Row]) -> Option<Restaurant> {
    let mut restaurant: Option<Restaurant> = None;
    for row in rows {
        let entry = restaurant.get_or_insert_with(|| Restaurant {
            id: row.get("id"),
            organization_id: row.get("organization_id"),
            name: row.get("name"),
            address: row.get("address"),
            service_fee_in_percentage: row.get("service_fee_in_percentage"),
            tables: Vec::new(),
        });
        if let Some(table_id) = row.get::<_, Option<Uuid>>("table_id") {
            entry.tables.push(Table {
                id: table_id,
                name: row.get("table_name"),
            });
        }
    }
    restaurant
}
