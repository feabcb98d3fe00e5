//! the bill lifecycle manager: validates scope and preconditions, consults
//! the role policy and the occupancy guard, freezes prices through the menu
//! snapshot resolver, and delegates the actual state flips to the store

use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::model::bill::{
    captured_payed_value, Bill, BillRangeFilter, CreatableOrders, NewOrder, NewOrderItem,
    OrderItemStatus,
};
use crate::server::model::menu_item::ResolvedMenuItem;
use crate::server::model::user::LoggedUser;
use crate::server::policy::{authorize, BillOperation};
use crate::server::repository::{BillsStore, MenuItemsStore, RestaurantsStore};

/// who a table lookup is scoped by
enum OwnerScope {
    Restaurant(Uuid),
    Organization(Uuid),
}

pub(crate) struct BillsService<S> {
    store: S,
}

impl<S> BillsService<S>
where
    S: BillsStore + MenuItemsStore + RestaurantsStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    // customer paths, no authentication

    /// open a `pending` bill on a free table, one order per customer name,
    /// every item priced at this very moment
    pub async fn open_pending_one(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
        orders: &CreatableOrders,
    ) -> Result<Bill, CustomError> {
        if orders.is_empty() || orders.values().any(|order| order.items.is_empty()) {
            return Err(CustomError::bad("No items provided"));
        }
        if orders.keys().any(|name| name.trim().is_empty()) {
            return Err(CustomError::bad("Customer name must not be empty"));
        }
        let restaurant = self
            .store
            .find_by_id(restaurant_id)
            .await?
            .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
        if !restaurant.has_table(table_id) {
            return Err(CustomError::not_found("Table not found"));
        }
        self.ensure_table_free(OwnerScope::Restaurant(restaurant_id), table_id)
            .await?;

        let mut new_orders = Vec::with_capacity(orders.len());
        for (customer_name, order) in orders {
            let item_ids: Vec<Uuid> = order.items.iter().map(|item| item.item_id).collect();
            let resolved = self
                .store
                .find_many_active_in_restaurant(restaurant_id, &dedup(&item_ids))
                .await?;
            if resolved.is_empty() {
                return Err(CustomError::not_found("Items not found"));
            }
            new_orders.push(NewOrder {
                customer_name: customer_name.clone(),
                items: resolved.iter().map(frozen_item).collect(),
            });
        }
        self.store
            .create_pending(restaurant_id, table_id, &new_orders)
            .await
    }

    pub async fn add_many_pending_order_items(
        &self,
        restaurant_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        validate_items_request(customer_name, item_ids)?;
        let resolved = self
            .store
            .find_many_active_in_restaurant(restaurant_id, &dedup(item_ids))
            .await?;
        if resolved.is_empty() {
            return Err(CustomError::not_found("No MenuItem found for the restaurant"));
        }
        let items = requested_items(item_ids, &resolved);
        self.store
            .append_pending_items(restaurant_id, bill_id, customer_name, &items)
            .await
    }

    pub async fn get_active_for_table(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError> {
        let restaurant = self
            .store
            .find_by_id(restaurant_id)
            .await?
            .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
        if !restaurant.has_table(table_id) {
            return Err(CustomError::not_found("Table not found"));
        }
        self.store.find_active_for_table(restaurant_id, table_id).await
    }

    // staff paths

    /// open a bill directly `active` on a pre-authorized table; items come later
    pub async fn open_confirmed_one(
        &self,
        user: &LoggedUser,
        table_id: Uuid,
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::OpenConfirmed)?;
        let restaurant = self
            .store
            .find_for_organization(user.organization_id)
            .await?
            .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
        if !restaurant.has_table(table_id) {
            return Err(CustomError::not_found("Table not found"));
        }
        self.ensure_table_free(OwnerScope::Organization(user.organization_id), table_id)
            .await?;
        self.store
            .create_confirmed(user.organization_id, table_id)
            .await
    }

    pub async fn add_many_confirmed_order_items(
        &self,
        user: &LoggedUser,
        bill_id: Uuid,
        customer_name: &str,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::AddConfirmedItems)?;
        validate_items_request(customer_name, item_ids)?;
        let resolved = self
            .resolve_in_organization(user.organization_id, item_ids)
            .await?;
        let items = requested_items(item_ids, &resolved);
        self.store
            .append_active_items(user.organization_id, bill_id, customer_name, &items)
            .await
    }

    /// a walk-up counter sale: the bill is born `closed`, its items `active`
    pub async fn open_insta_one(
        &self,
        user: &LoggedUser,
        customer_name: &str,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::OpenInstant)?;
        validate_items_request(customer_name, item_ids)?;
        let resolved = self
            .resolve_in_organization(user.organization_id, item_ids)
            .await?;
        let items = requested_items(item_ids, &resolved);
        self.store
            .create_instant(user.organization_id, customer_name, &items)
            .await
    }

    pub async fn confirm_one(&self, user: &LoggedUser, bill_id: Uuid) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::Confirm)?;
        self.store.confirm_one(user.organization_id, bill_id).await
    }

    pub async fn close_one(&self, user: &LoggedUser, bill_id: Uuid) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::Close)?;
        self.store.close_one(user.organization_id, bill_id).await
    }

    pub async fn decline_one(&self, user: &LoggedUser, bill_id: Uuid) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::Decline)?;
        self.store.decline_one(user.organization_id, bill_id).await
    }

    pub async fn confirm_many_pending_order_items(
        &self,
        user: &LoggedUser,
        bill_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::ConfirmItems)?;
        self.set_items_status(user.organization_id, bill_id, item_ids, OrderItemStatus::Active)
            .await
    }

    pub async fn decline_many_pending_order_items(
        &self,
        user: &LoggedUser,
        bill_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::DeclineItems)?;
        self.set_items_status(user.organization_id, bill_id, item_ids, OrderItemStatus::Declined)
            .await
    }

    pub async fn remove_many_order_items(
        &self,
        user: &LoggedUser,
        bill_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Bill, CustomError> {
        authorize(user, BillOperation::RemoveItems)?;
        self.set_items_status(user.organization_id, bill_id, item_ids, OrderItemStatus::Removed)
            .await
    }

    pub async fn get_many_by_range(
        &self,
        user: &LoggedUser,
        filter: &BillRangeFilter,
    ) -> Result<Vec<Bill>, CustomError> {
        authorize(user, BillOperation::ListByRange)?;
        if filter.start_date > filter.end_date {
            return Err(CustomError::bad("Invalid date range"));
        }
        self.store.find_many(user.organization_id, filter).await
    }

    // guards and helpers

    /// advisory occupancy check; the storage layer still enforces the
    /// invariant when two requests race past this read
    async fn ensure_table_free(
        &self,
        scope: OwnerScope,
        table_id: Uuid,
    ) -> Result<(), CustomError> {
        let existing = match scope {
            OwnerScope::Restaurant(restaurant_id) => {
                self.store
                    .find_active_for_table(restaurant_id, table_id)
                    .await?
            }
            OwnerScope::Organization(organization_id) => {
                self.store
                    .find_active_for_table_in_organization(organization_id, table_id)
                    .await?
            }
        };
        match existing {
            Some(_) => Err(CustomError::conflict(
                "There's already an active bill for this table",
            )),
            None => Ok(()),
        }
    }

    /// the legal source statuses fall out of the transition table, so an
    /// ineligible item can never be dragged along
    async fn set_items_status(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        item_ids: &[Uuid],
        to: OrderItemStatus,
    ) -> Result<Bill, CustomError> {
        if item_ids.is_empty() {
            return Err(CustomError::bad("No items provided"));
        }
        self.store
            .set_items_status(organization_id, bill_id, item_ids, &OrderItemStatus::sources(to), to)
            .await
    }

    async fn resolve_in_organization(
        &self,
        organization_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError> {
        let resolved = self
            .store
            .find_many_active_in_organization(organization_id, &dedup(item_ids))
            .await?;
        if resolved.is_empty() {
            return Err(CustomError::not_found("No MenuItem found for the restaurant"));
        }
        Ok(resolved)
    }
}

fn validate_items_request(customer_name: &str, item_ids: &[Uuid]) -> Result<(), CustomError> {
    if item_ids.is_empty() {
        return Err(CustomError::bad("No items provided"));
    }
    if customer_name.trim().is_empty() {
        return Err(CustomError::bad("Customer name must not be empty"));
    }
    Ok(())
}

fn dedup(item_ids: &[Uuid]) -> Vec<Uuid> {
    let mut ids = item_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// keep the caller's ordering and duplicates; ids that did not resolve are
/// skipped, the caller can diff the returned bill to see what was dropped
fn requested_items(item_ids: &[Uuid], resolved: &[ResolvedMenuItem]) -> Vec<NewOrderItem> {
    let mut items = Vec::with_capacity(item_ids.len());
    for item_id in item_ids {
        if let Some(item) = resolved.iter().find(|r| r.id == *item_id) {
            items.push(frozen_item(item));
        }
    }
    items
}

fn frozen_item(item: &ResolvedMenuItem) -> NewOrderItem {
    NewOrderItem {
        menu_item_id: item.id,
        payed_value: captured_payed_value(item.price_value, item.price_discount),
    }
}
