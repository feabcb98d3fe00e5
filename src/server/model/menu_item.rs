use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// what the snapshot resolver hands back: just enough to freeze a price
#[derive(Debug, Clone)]
pub(crate) struct ResolvedMenuItem {
    pub id: Uuid,
    pub price_value: Decimal,
    pub price_discount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct MenuItem {
    pub id: Uuid,
    #[serde(rename = "menuID")]
    pub menu_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    #[serde(rename = "priceValue")]
    pub price_value: Decimal,
    #[serde(rename = "priceDiscount")]
    pub price_discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatableMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "priceValue")]
    pub price_value: Decimal,
    #[serde(rename = "priceDiscount")]
    pub price_discount: Option<Decimal>,
    #[serde(rename = "menuID")]
    pub menu_id: Option<Uuid>,
}

/// partial update; absent fields keep their current value
#[derive(Debug, Deserialize)]
pub(crate) struct UpdatableMenuItem {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "priceValue")]
    pub price_value: Option<Decimal>,
    #[serde(rename = "priceDiscount")]
    pub price_discount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListMenuItemsParams {
    #[serde(rename = "restaurantID")]
    pub restaurant_id: Uuid,
}
