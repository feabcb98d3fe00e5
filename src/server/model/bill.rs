//! bill aggregate: a bill owns orders, an order owns the items one customer asked for

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BillStatus {
    Pending,
    Active,
    Closed,
    Declined,
}

impl BillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Declined => "declined",
        }
    }

    /// a bill still occupies its table in these statuses
    pub fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl FromStr for BillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "declined" => Ok(Self::Declined),
            other => Err(format!("invalid bill status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OrderItemStatus {
    Pending,
    Active,
    Closed,
    Declined,
    Removed,
}

impl OrderItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Declined => "declined",
            Self::Removed => "removed",
        }
    }

    const ALL: [Self; 5] = [
        Self::Pending,
        Self::Active,
        Self::Closed,
        Self::Declined,
        Self::Removed,
    ];

    /// legal edges of the item state machine, nothing moves backward and
    /// nothing re-enters `pending`
    pub fn may_become(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Declined)
                | (Self::Pending, Self::Removed)
                | (Self::Active, Self::Removed)
                | (Self::Active, Self::Closed)
        )
    }

    /// the statuses a bulk operation may move into `to`; everything else is
    /// an illegal edge and simply matches zero items
    pub fn sources(to: Self) -> Vec<Self> {
        Self::ALL.into_iter().filter(|s| s.may_become(to)).collect()
    }

    /// statuses hidden from normal bill reads, kept for history only
    pub fn is_hidden(self) -> bool {
        matches!(self, Self::Declined | Self::Removed)
    }
}

impl FromStr for OrderItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            "declined" => Ok(Self::Declined),
            "removed" => Ok(Self::Removed),
            other => Err(format!("invalid order item status: {other}")),
        }
    }
}

/// price captured the moment an item lands on an order; menu edits after
/// this point must not change what the customer pays
pub(crate) fn captured_payed_value(price_value: Decimal, price_discount: Option<Decimal>) -> Decimal {
    (price_value - price_discount.unwrap_or(Decimal::ZERO)).max(Decimal::ZERO)
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Bill {
    pub id: Uuid,
    #[serde(rename = "restaurantID")]
    pub restaurant_id: Uuid,
    #[serde(rename = "tableID")]
    pub table_id: Option<Uuid>,
    pub status: BillStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "closedAt")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(rename = "payedServiceFeeInPercentage")]
    pub payed_service_fee_in_percentage: Option<Decimal>,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct Order {
    pub id: Uuid,
    #[serde(rename = "customerName")]
    pub customer_name: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OrderItem {
    pub id: Uuid,
    #[serde(rename = "menuItemID")]
    pub menu_item_id: Uuid,
    #[serde(rename = "payedValue")]
    pub payed_value: Decimal,
    pub status: OrderItemStatus,
}

/// a not-yet-persisted order item with its price already frozen
#[derive(Debug, Clone)]
pub(crate) struct NewOrderItem {
    pub menu_item_id: Uuid,
    pub payed_value: Decimal,
}

#[derive(Debug, Clone)]
pub(crate) struct NewOrder {
    pub customer_name: String,
    pub items: Vec<NewOrderItem>,
}

/// bills query window for staff reporting
#[derive(Debug, Clone)]
pub(crate) struct BillRangeFilter {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status_list: Vec<BillStatus>,
}

// request payloads

#[derive(Debug, Deserialize)]
pub(crate) struct CreatableOrderItem {
    #[serde(rename = "itemID")]
    pub item_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatableOrder {
    pub items: Vec<CreatableOrderItem>,
}

/// body of the public open-bill endpoint, keyed by customer name
pub(crate) type CreatableOrders = BTreeMap<String, CreatableOrder>;

#[derive(Debug, Deserialize)]
pub(crate) struct OpenBillParams {
    #[serde(rename = "restaurantID")]
    pub restaurant_id: Uuid,
    #[serde(rename = "tableID")]
    pub table_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddPendingItemsParams {
    #[serde(rename = "restaurantID")]
    pub restaurant_id: Uuid,
    #[serde(rename = "customerName")]
    pub customer_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenConfirmedBillRequest {
    #[serde(rename = "tableID")]
    pub table_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddConfirmedItemsRequest {
    #[serde(rename = "menuItemIDs")]
    pub menu_item_ids: Vec<Uuid>,
    #[serde(rename = "customerName")]
    pub customer_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetManyBillsParams {
    #[serde(rename = "startDate")]
    pub start_date: DateTime<Utc>,
    #[serde(rename = "endDate")]
    pub end_date: DateTime<Utc>,
    /// comma separated, e.g. `closed,declined`
    #[serde(rename = "statusList")]
    pub status_list: String,
}
