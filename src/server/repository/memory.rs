//! in-memory store for engine tests. Every operation runs inside one mutex
//! guard, i.e. a serialized critical section, which is the same enforcement
//! the partial unique index gives the PostgreSQL store.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::server::controller::error::CustomError;
use crate::server::model::bill::{
    Bill, BillRangeFilter, BillStatus, NewOrder, NewOrderItem, Order, OrderItem, OrderItemStatus,
};
use crate::server::model::menu_item::{
    CreatableMenuItem, MenuItem, ResolvedMenuItem, UpdatableMenuItem,
};
use crate::server::model::restaurant::{Restaurant, Table, UpdatableRestaurant};
use crate::server::model::user::{LoggedUser, Role};
use crate::server::repository::{
    BillsStore, MenuItemsStore, RestaurantsStore, UsersStore,
};
use crate::server::util::time;

#[derive(Debug, Clone)]
pub(crate) struct MemRestaurant {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: String,
    pub service_fee_in_percentage: Decimal,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone)]
pub(crate) struct MemMenu {
    pub id: Uuid,
    pub restaurant_id: Uuid,
}

#[derive(Debug, Clone)]
pub(crate) struct MemMenuItem {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub menu_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub price_value: Decimal,
    pub price_discount: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub(crate) struct MemUser {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub role: Role,
    pub api_token: String,
}

#[derive(Debug, Default)]
pub(crate) struct MemDb {
    pub restaurants: Vec<MemRestaurant>,
    pub menus: Vec<MemMenu>,
    pub menu_items: Vec<MemMenuItem>,
    pub users: Vec<MemUser>,
    /// bills are stored complete, including declined/removed items; reads
    /// filter the hidden ones the way the SQL select does
    pub bills: Vec<Bill>,
}

impl MemDb {
    fn restaurant_org(&self, restaurant_id: Uuid) -> Option<Uuid> {
        self.restaurants
            .iter()
            .find(|r| r.id == restaurant_id)
            .map(|r| r.organization_id)
    }

    fn bill_index(&self, organization_id: Uuid, bill_id: Uuid) -> Result<usize, CustomError> {
        self.bills
            .iter()
            .position(|b| {
                b.id == bill_id && self.restaurant_org(b.restaurant_id) == Some(organization_id)
            })
            .ok_or_else(|| CustomError::not_found("Bill not found"))
    }

    fn table_taken(&self, table_id: Uuid) -> bool {
        self.bills
            .iter()
            .any(|b| b.table_id == Some(table_id) && b.status.is_open())
    }

    fn item_is_active(&self, item: &MemMenuItem, restaurant_id: Option<Uuid>) -> bool {
        let Some(menu_id) = item.menu_id else {
            return false;
        };
        match restaurant_id {
            Some(restaurant_id) => self
                .menus
                .iter()
                .any(|m| m.id == menu_id && m.restaurant_id == restaurant_id),
            None => true,
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct MemStore(Arc<Mutex<MemDb>>);

impl MemStore {
    pub fn from_db(db: MemDb) -> Self {
        Self(Arc::new(Mutex::new(db)))
    }

    /// test hook: insert a bill row bypassing the occupancy constraint
    pub fn push_bill_unchecked(&self, bill: Bill) {
        self.with(|db| db.bills.push(bill));
    }

    fn with<R>(&self, f: impl FnOnce(&mut MemDb) -> R) -> R {
        let mut db = self.0.lock().expect("memory store lock poisoned");
        f(&mut db)
    }

    fn visible(bill: &Bill) -> Bill {
        let mut bill = bill.clone();
        for order in &mut bill.orders {
            order.items.retain(|item| !item.status.is_hidden());
        }
        bill
    }
}

impl BillsStore for MemStore {
    async fn find_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db.bill_index(organization_id, bill_id)?;
            Ok(Self::visible(&db.bills[idx]))
        })
    }

    async fn find_many(
        &self,
        organization_id: Uuid,
        filter: &BillRangeFilter,
    ) -> Result<Vec<Bill>, CustomError> {
        self.with(|db| {
            Ok(db
                .bills
                .iter()
                .filter(|b| db.restaurant_org(b.restaurant_id) == Some(organization_id))
                .filter(|b| b.created_at >= filter.start_date && b.created_at <= filter.end_date)
                .filter(|b| filter.status_list.contains(&b.status))
                .map(Self::visible)
                .collect())
        })
    }

    async fn find_active_for_table(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError> {
        self.with(|db| {
            Ok(db
                .bills
                .iter()
                .find(|b| {
                    b.restaurant_id == restaurant_id
                        && b.table_id == Some(table_id)
                        && b.status.is_open()
                })
                .map(Self::visible))
        })
    }

    async fn find_active_for_table_in_organization(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Option<Bill>, CustomError> {
        self.with(|db| {
            let known = db.restaurants.iter().any(|r| {
                r.organization_id == organization_id && r.tables.iter().any(|t| t.id == table_id)
            });
            if !known {
                return Err(CustomError::not_found("Table or Restaurant not found"));
            }
            Ok(db
                .bills
                .iter()
                .find(|b| {
                    b.table_id == Some(table_id)
                        && b.status.is_open()
                        && db.restaurant_org(b.restaurant_id) == Some(organization_id)
                })
                .map(Self::visible))
        })
    }

    async fn create_pending(
        &self,
        restaurant_id: Uuid,
        table_id: Uuid,
        orders: &[NewOrder],
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            if db.table_taken(table_id) {
                return Err(CustomError::conflict(
                    "There's already an active bill for this table",
                ));
            }
            let bill = Bill {
                id: Uuid::now_v7(),
                restaurant_id,
                table_id: Some(table_id),
                status: BillStatus::Pending,
                created_at: time::helper::get_utc_now(),
                closed_at: None,
                payed_service_fee_in_percentage: None,
                orders: orders
                    .iter()
                    .map(|order| new_order(&order.customer_name, &order.items, OrderItemStatus::Pending))
                    .collect(),
            };
            db.bills.push(bill.clone());
            Ok(Self::visible(&bill))
        })
    }

    async fn create_confirmed(
        &self,
        organization_id: Uuid,
        table_id: Uuid,
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            let restaurant_id = db
                .restaurants
                .iter()
                .find(|r| r.organization_id == organization_id)
                .map(|r| r.id)
                .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
            if db.table_taken(table_id) {
                return Err(CustomError::conflict(
                    "There's already an active bill for this table",
                ));
            }
            let bill = Bill {
                id: Uuid::now_v7(),
                restaurant_id,
                table_id: Some(table_id),
                status: BillStatus::Active,
                created_at: time::helper::get_utc_now(),
                closed_at: None,
                payed_service_fee_in_percentage: None,
                orders: Vec::new(),
            };
            db.bills.push(bill.clone());
            Ok(bill)
        })
    }

    async fn create_instant(
        &self,
        organization_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            let restaurant = db
                .restaurants
                .iter()
                .find(|r| r.organization_id == organization_id)
                .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
            let now = time::helper::get_utc_now();
            let bill = Bill {
                id: Uuid::now_v7(),
                restaurant_id: restaurant.id,
                table_id: None,
                status: BillStatus::Closed,
                created_at: now,
                closed_at: Some(now),
                payed_service_fee_in_percentage: Some(restaurant.service_fee_in_percentage),
                orders: vec![new_order(customer_name, items, OrderItemStatus::Active)],
            };
            db.bills.push(bill.clone());
            Ok(bill)
        })
    }

    async fn append_pending_items(
        &self,
        restaurant_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db
                .bills
                .iter()
                .position(|b| {
                    b.id == bill_id && b.restaurant_id == restaurant_id && b.status.is_open()
                })
                .ok_or_else(|| CustomError::not_found("Bill not found"))?;
            append_items(&mut db.bills[idx], customer_name, items, OrderItemStatus::Pending);
            Ok(Self::visible(&db.bills[idx]))
        })
    }

    async fn append_active_items(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        customer_name: &str,
        items: &[NewOrderItem],
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db
                .bills
                .iter()
                .position(|b| {
                    b.id == bill_id
                        && b.status.is_open()
                        && db.restaurant_org(b.restaurant_id) == Some(organization_id)
                })
                .ok_or_else(|| CustomError::not_found("Bill not found"))?;
            append_items(&mut db.bills[idx], customer_name, items, OrderItemStatus::Active);
            Ok(Self::visible(&db.bills[idx]))
        })
    }

    async fn confirm_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db.bill_index(organization_id, bill_id)?;
            if db.bills[idx].status != BillStatus::Pending {
                return Err(CustomError::conflict("Bill is not pending"));
            }
            if let Some(table_id) = db.bills[idx].table_id {
                let taken = db.bills.iter().any(|b| {
                    b.id != bill_id
                        && b.table_id == Some(table_id)
                        && b.status == BillStatus::Active
                        && db.restaurant_org(b.restaurant_id) == Some(organization_id)
                });
                if taken {
                    return Err(CustomError::conflict("Table is not available"));
                }
            }
            db.bills[idx].status = BillStatus::Active;
            Ok(Self::visible(&db.bills[idx]))
        })
    }

    async fn decline_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db.bill_index(organization_id, bill_id)?;
            let bill = &mut db.bills[idx];
            if bill.status != BillStatus::Pending {
                return Err(CustomError::conflict("Bill is not pending"));
            }
            for order in &mut bill.orders {
                for item in &mut order.items {
                    if item.status == OrderItemStatus::Pending {
                        item.status = OrderItemStatus::Declined;
                    }
                }
            }
            bill.status = BillStatus::Declined;
            bill.closed_at = Some(time::helper::get_utc_now());
            Ok(Self::visible(bill))
        })
    }

    async fn close_one(&self, organization_id: Uuid, bill_id: Uuid) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db.bill_index(organization_id, bill_id)?;
            if db.bills[idx].status != BillStatus::Active {
                return Err(CustomError::conflict("Bill is not active"));
            }
            let has_pending = db.bills[idx]
                .orders
                .iter()
                .flat_map(|o| o.items.iter())
                .any(|i| i.status == OrderItemStatus::Pending);
            if has_pending {
                return Err(CustomError::conflict("Bill has pending order items"));
            }
            let restaurant_id = db.bills[idx].restaurant_id;
            let fee = db
                .restaurants
                .iter()
                .find(|r| r.id == restaurant_id)
                .map(|r| r.service_fee_in_percentage)
                .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
            let bill = &mut db.bills[idx];
            for order in &mut bill.orders {
                for item in &mut order.items {
                    if item.status == OrderItemStatus::Active {
                        item.status = OrderItemStatus::Closed;
                    }
                }
            }
            bill.status = BillStatus::Closed;
            bill.closed_at = Some(time::helper::get_utc_now());
            bill.payed_service_fee_in_percentage = Some(fee);
            Ok(Self::visible(bill))
        })
    }

    async fn set_items_status(
        &self,
        organization_id: Uuid,
        bill_id: Uuid,
        item_ids: &[Uuid],
        from: &[OrderItemStatus],
        to: OrderItemStatus,
    ) -> Result<Bill, CustomError> {
        self.with(|db| {
            let idx = db.bill_index(organization_id, bill_id)?;
            let bill = &mut db.bills[idx];
            if bill.status != BillStatus::Active {
                return Err(CustomError::conflict("Bill is not active"));
            }
            for order in &mut bill.orders {
                for item in &mut order.items {
                    if item_ids.contains(&item.id) && from.contains(&item.status) {
                        item.status = to;
                    }
                }
            }
            Ok(Self::visible(bill))
        })
    }
}

fn new_items(items: &[NewOrderItem], status: OrderItemStatus) -> Vec<OrderItem> {
    items
        .iter()
        .map(|item| OrderItem {
            id: Uuid::now_v7(),
            menu_item_id: item.menu_item_id,
            payed_value: item.payed_value,
            status,
        })
        .collect()
}

fn new_order(customer_name: &str, items: &[NewOrderItem], status: OrderItemStatus) -> Order {
    Order {
        id: Uuid::now_v7(),
        customer_name: customer_name.to_string(),
        items: new_items(items, status),
    }
}

fn append_items(bill: &mut Bill, customer_name: &str, items: &[NewOrderItem], status: OrderItemStatus) {
    match bill
        .orders
        .iter_mut()
        .find(|o| o.customer_name == customer_name)
    {
        Some(order) => order.items.extend(new_items(items, status)),
        None => bill.orders.push(new_order(customer_name, items, status)),
    }
}

impl MenuItemsStore for MemStore {
    async fn find_many_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError> {
        self.with(|db| {
            Ok(db
                .menu_items
                .iter()
                .filter(|i| item_ids.contains(&i.id) && db.item_is_active(i, Some(restaurant_id)))
                .map(resolved)
                .collect())
        })
    }

    async fn find_many_active_in_organization(
        &self,
        organization_id: Uuid,
        item_ids: &[Uuid],
    ) -> Result<Vec<ResolvedMenuItem>, CustomError> {
        self.with(|db| {
            Ok(db
                .menu_items
                .iter()
                .filter(|i| {
                    i.organization_id == organization_id
                        && item_ids.contains(&i.id)
                        && db.item_is_active(i, None)
                })
                .map(resolved)
                .collect())
        })
    }

    async fn list_active_in_restaurant(
        &self,
        restaurant_id: Uuid,
    ) -> Result<Vec<MenuItem>, CustomError> {
        self.with(|db| {
            Ok(db
                .menu_items
                .iter()
                .filter(|i| db.item_is_active(i, Some(restaurant_id)))
                .map(full)
                .collect())
        })
    }

    async fn create_many(
        &self,
        organization_id: Uuid,
        items: &[CreatableMenuItem],
    ) -> Result<Vec<MenuItem>, CustomError> {
        self.with(|db| {
            let mut created = Vec::with_capacity(items.len());
            for item in items {
                let record = MemMenuItem {
                    id: Uuid::now_v7(),
                    organization_id,
                    menu_id: item.menu_id,
                    name: item.name.clone(),
                    description: item.description.clone(),
                    price_value: item.price_value,
                    price_discount: item.price_discount,
                };
                created.push(full(&record));
                db.menu_items.push(record);
            }
            Ok(created)
        })
    }

    async fn update_one(
        &self,
        organization_id: Uuid,
        item_id: Uuid,
        changes: &UpdatableMenuItem,
    ) -> Result<MenuItem, CustomError> {
        self.with(|db| {
            let item = db
                .menu_items
                .iter_mut()
                .find(|i| i.id == item_id && i.organization_id == organization_id)
                .ok_or_else(|| CustomError::not_found("Not found"))?;
            if let Some(name) = &changes.name {
                item.name = name.clone();
            }
            if let Some(description) = &changes.description {
                item.description = description.clone();
            }
            if let Some(price_value) = changes.price_value {
                item.price_value = price_value;
            }
            if let Some(price_discount) = changes.price_discount {
                item.price_discount = Some(price_discount);
            }
            Ok(full(item))
        })
    }

    async fn detach_one(&self, organization_id: Uuid, item_id: Uuid) -> Result<(), CustomError> {
        self.with(|db| {
            let item = db
                .menu_items
                .iter_mut()
                .find(|i| i.id == item_id && i.organization_id == organization_id)
                .ok_or_else(|| CustomError::not_found("Not found"))?;
            item.menu_id = None;
            Ok(())
        })
    }
}

fn resolved(item: &MemMenuItem) -> ResolvedMenuItem {
    ResolvedMenuItem {
        id: item.id,
        price_value: item.price_value,
        price_discount: item.price_discount,
    }
}

fn full(item: &MemMenuItem) -> MenuItem {
    MenuItem {
        id: item.id,
        menu_id: item.menu_id,
        name: item.name.clone(),
        description: item.description.clone(),
        price_value: item.price_value,
        price_discount: item.price_discount,
    }
}

impl RestaurantsStore for MemStore {
    async fn find_by_id(&self, restaurant_id: Uuid) -> Result<Option<Restaurant>, CustomError> {
        self.with(|db| {
            Ok(db
                .restaurants
                .iter()
                .find(|r| r.id == restaurant_id)
                .map(restaurant))
        })
    }

    async fn find_for_organization(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Restaurant>, CustomError> {
        self.with(|db| {
            Ok(db
                .restaurants
                .iter()
                .find(|r| r.organization_id == organization_id)
                .map(restaurant))
        })
    }

    async fn update_for_organization(
        &self,
        organization_id: Uuid,
        changes: &UpdatableRestaurant,
    ) -> Result<Restaurant, CustomError> {
        self.with(|db| {
            let record = db
                .restaurants
                .iter_mut()
                .find(|r| r.organization_id == organization_id)
                .ok_or_else(|| CustomError::not_found("Restaurant not found"))?;
            if let Some(name) = &changes.name {
                record.name = name.clone();
            }
            if let Some(address) = &changes.address {
                record.address = address.clone();
            }
            if let Some(fee) = changes.service_fee_in_percentage {
                record.service_fee_in_percentage = fee;
            }
            Ok(restaurant(record))
        })
    }
}

fn restaurant(record: &MemRestaurant) -> Restaurant {
    Restaurant {
        id: record.id,
        organization_id: record.organization_id,
        name: record.name.clone(),
        address: record.address.clone(),
        service_fee_in_percentage: record.service_fee_in_percentage,
        tables: record.tables.clone(),
    }
}

impl UsersStore for MemStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<LoggedUser>, CustomError> {
        self.with(|db| {
            Ok(db.users.iter().find(|u| u.api_token == token).map(|u| LoggedUser {
                id: u.id,
                organization_id: u.organization_id,
                role: u.role,
            }))
        })
    }
}
