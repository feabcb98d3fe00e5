pub(crate) mod connection;
pub(crate) mod pool;

/// how long repositories wait for a pooled connection before reporting busy
pub(crate) const DB_ACQUIRE_TIMEOUT_SECONDS: u64 = 3;
