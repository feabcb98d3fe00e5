pub(crate) mod bills;
pub(crate) mod error;
pub(crate) mod menu_items;
pub(crate) mod restaurants;

/// how long the heavy reporting query may run before the caller gets a timeout
pub(crate) const DB_TIMEOUT_SECONDS: u64 = 5;
