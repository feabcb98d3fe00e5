//! menu-item store: the snapshot resolver the bill engine prices from, plus
//! the plumbing staff use to manage the catalog.
//!
//! "Active" means the item sits on a menu: restaurant scope walks
//! item -> menu -> restaurant, organization scope only requires a menu link.

use tokio_postgres::Row;
use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::database::DB_ACQUIRE_TIMEOUT_SECONDS;
use crate::server::model::menu_item::{
    CreatableMenuItem, MenuItem, ResolvedMenuItem, UpdatableMenuItem,
};
use crate::server::repository::{db_err, MenuItemsStore, PgStore};

impl MenuItemsStore for PgStore {
    async fn find_many_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let ids: Vec<Uuid> = item_ids.to_vec();
        let rows = conn
            .query(
                r#"
                SELECT i.id, i.price_value, i.price_discount
                FROM menu_item i
                JOIN menu m ON m.id = i.menu_id
                WHERE m.restaurant_id = $1 AND i.id = ANY($2)
                "#,
                &[&restaurant_id, &ids],
            )
            .await
            .map_err(db_err("resolve items in restaurant"))?;
        Ok(rows.iter().map(row_to_resolved).collect())
    }

    async fn find_many_active_in_organization(
        &self,
        organization_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let ids: Vec<Uuid> = item_ids.to_vec();
        let rows = conn
            .query(
                r#"
                SELECT i.id, i.price_value, i.price_discount
                FROM menu_item i
                WHERE i.organization_id = $1 AND i.menu_id IS NOT NULL AND i.id = ANY($2)
                "#,
                &[&organization_id, &ids],
            )
            .await
            .map_err(db_err("resolve items in organization"))?;
        Ok(rows.iter().map(row_to_resolved).collect())
    }

    async fn list_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CustomError> {
        let Some(conn) = self.read_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let rows = conn
            .query(
                r#"
                SELECT i.id, i.menu_id, i.name, i.description, i.price_value, i.price_discount
                FROM menu_item i
                JOIN menu m ON m.id = i.menu_id
                WHERE m.restaurant_id = $1
                ORDER BY i.name
                "#,
                &[&restaurant_id],
            )
            .await
            .map_err(db_err("list items in restaurant"))?;
        Ok(rows.iter().map(row_to_menu_item).collect())
    }

    async fn create_many(
        &self,
        organization_id: Uuid,
        items: &[CreatableMenuItem],
    ) -> Result<Vec<MenuItem>, CustomError> {
        let Some(mut conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let txn = conn
            .transaction()
            .await
            .map_err(db_err("begin create_many menu items"))?;

        // every referenced menu must belong to the caller's organization
        let menu_ids: Vec<Uuid> = items.iter().filter_map(|i| i.menu_id).collect();
        if !menu_ids.is_empty() {
            let known = txn
                .query(
                    r#"
                    SELECT m.id FROM menu m
                    JOIN restaurant r ON r.id = m.restaurant_id
                    WHERE m.id = ANY($1) AND r.organization_id = $2
                    "#,
                    &[&menu_ids, &organization_id],
                )
                .await
                .map_err(db_err("lookup menus for organization"))?;
            let known: Vec<Uuid> = known.iter().map(|r| r.get("id")).collect();
            if menu_ids.iter().any(|id| !known.contains(id)) {
                return Err(CustomError::not_found("Menu not found"));
            }
        }

        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let id = Uuid::now_v7();
            txn.execute(
                r#"
                INSERT INTO menu_item (id, organization_id, menu_id, name, description,
                                       price_value, price_discount)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
                &[
                    &id,
                    &organization_id,
                    &item.menu_id,
                    &item.name,
                    &item.description,
                    &item.price_value,
                    &item.price_discount,
                ],
            )
            .await
            .map_err(db_err("insert menu item"))?;
            created.push(MenuItem {
                id,
                menu_id: item.menu_id,
                name: item.name.clone(),
                description: item.description.clone(),
                price_value: item.price_value,
                price_discount: item.price_discount,
            });
        }
        txn.commit()
            .await
            .map_err(db_err("commit create_many menu items"))?;
        Ok(created)
    }

    async fn update_one(
        &self,
        organization_id: Uuid,
        item_id: Uuid,
        changes: &UpdatableMenuItem,
    ) -> Result<MenuItem, CustomError> {
        let Some(conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let row = conn
            .query_opt(
                r#"
                UPDATE menu_item
                SET name = COALESCE($3, name),
                    description = COALESCE($4, description),
                    price_value = COALESCE($5, price_value),
                    price_discount = COALESCE($6, price_discount)
                WHERE id = $1 AND organization_id = $2
                RETURNING id, menu_id, name, description, price_value, price_discount
                "#,
                &[
                    &item_id,
                    &organization_id,
                    &changes.name,
                    &changes.description,
                    &changes.price_value,
                    &changes.price_discount,
                ],
            )
            .await
            .map_err(db_err("update menu item"))?;
        row.as_ref()
            .map(row_to_menu_item)
            .ok_or_else(|| CustomError::not_found("Not found"))
    }

    async fn detach_one(&self, organization_id: Uuid, item_id: Uuid) -> Result<(), CustomError> {
        let Some(conn) = self.write_pool().acquire(DB_ACQUIRE_TIMEOUT_SECONDS).await else {
            return Err(CustomError::ServerIsBusy);
        };
        let affected = conn
            .execute(
                "UPDATE menu_item SET menu_id = NULL WHERE id = $1 AND organization_id = $2",
                &[&item_id, &organization_id],
            )
            .await
            .map_err(db_err("detach menu item"))?;
        if affected == 0 {
            return Err(CustomError::not_found("Not found"));
        }
        Ok(())
    }
}

fn row_to_resolved(row: &Row) -> ResolvedMenuItem {
    ResolvedMenuItem {
        id: row.get("id"),
        price_value: row.get("price_value"),
        price_discount: row.get("price_discount"),
    }
}

fn row_to_menu_item(row: &Row) -> MenuItem {
    MenuItem {
        id: row.get("id"),
        menu_id: row.get("menu_id"),
        name: row.get("name"),
        description: row.get("description"),
        price_value: row.get("price_value"),
        price_discount: row.get("price_discount"),
    }
}
