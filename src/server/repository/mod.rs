//! persistence boundary: one trait per aggregate, implemented for PostgreSQL
//! and, in tests, for an in-memory store

pub(crate) mod bills;
#[cfg(test)]
pub(crate) mod memory;
pub(crate) mod menu_items;
pub(crate) mod restaurants;
pub(crate) mod users;

use log::warn;
use tokio_postgres::Client;
use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::database::pool::Pool;
use crate::server::model::bill::{Bill, BillRangeFilter, NewOrder, NewOrderItem, OrderItemStatus};
use crate::server::model::menu_item::{CreatableMenuItem, MenuItem, ResolvedMenuItem, UpdatableMenuItem};
use crate::server::model::restaurant::{Restaurant, UpdatableRestaurant};
use crate::server::model::user::LoggedUser;

/// bill lifecycle primitives; every method is atomic with respect to
/// concurrent callers (transaction or serialized critical section)
pub(crate) trait BillsStore {
    async fn find_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError>;
    async fn find_many(
        &self,
        organization_id: Uuid,
        filter: &BillRangeFilter,
    ) -> Result<Vec<Bill>, CustomError>;
    async fn find_active_for_table(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError>;
    async fn find_active_for_table_in_organization(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError>;

    async fn create_pending(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
        orders: &[NewOrder],
    ) -> Result<Bill, CustomError>;
    async fn create_confirmed(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Bill, CustomError>;
    async fn create_instant(
        &self,
        organization_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError>;

    /// append pending items to an open bill, merging into the customer's
    /// existing order when one exists (public customer path, restaurant scope)
    async fn append_pending_items(
        &self,
        restaurant_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError>;
    /// append already-confirmed items to an open bill (staff path, organization scope)
    async fn append_active_items(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError>;

    async fn confirm_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError>;
    async fn decline_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError>;
    async fn close_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError>;

    /// one conditional update: only items under the bill whose status is in
    /// `from` transition to `to`; everything else is silently skipped
    async fn set_items_status(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        item_ids: &[Uuid],
        from: &[OrderItemStatus],
        to: OrderItemStatus,
    ) -> Result<Bill, CustomError>;
}

/// menu snapshot resolver plus the menu-item plumbing around it
pub(crate) trait MenuItemsStore {
    async fn find_many_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError>;
    async fn find_many_active_in_organization(
        &self,
        organization_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError>;

    async fn list_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CustomError>;
    async fn create_many(
        &self,
        organization_id: Uuid,
        items: &[CreatableMenuItem],
    ) -> Result<Vec<MenuItem>, CustomError>;
    async fn update_one(
        &self,
        organization_id: Uuid,
        item_id: Uuid,
        changes: &UpdatableMenuItem,
    ) -> Result<MenuItem, CustomError>;
    /// takes the item off its menu; the row stays for payed-value history
    async fn detach_one(&self, organization_id: Uuid, item_id: Uuid) -> Result<(), CustomError>;
}

pub(crate) trait RestaurantsStore {
    async fn find_by_id(&self, restaurant_id: Uuid) -> Result<Option<Restaurant>, CustomError>;
    async fn find_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Restaurant>, CustomError>;
    async fn update_for_organization(
        &self,
        organization_id: Uuid,
        changes: &UpdatableRestaurant,
    ) -> Result<Restaurant, CustomError>;
}

pub(crate) trait UsersStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<LoggedUser>, CustomError>;
}

/// the PostgreSQL-backed store; reads go to the read pool, everything that
/// mutates goes through the write pool
#[derive(Clone)]
pub(crate) struct PgStore {
    read_pool: Pool<Client>,
    write_pool: Pool<Client>,
}

impl PgStore {
    pub fn new(read_pool: Pool<Client>, write_pool: Pool<Client>) -> Self {
        Self {
            read_pool,
            write_pool,
        }
    }

    pub(super) fn read_pool(&self) -> &Pool<Client> {
        &self.read_pool
    }

    pub(super) fn write_pool(&self) -> &Pool<Client> {
        &self.write_pool
    }
}

/// log the database failure at its site and hide the details from the caller
pub(super) fn db_err(op: &'static str) -> impl Fn(tokio_postgres::Error) -> CustomError {
    move |e| {
        warn!("{} failed, {}", op, e);
        CustomError::DbError
    }
}
