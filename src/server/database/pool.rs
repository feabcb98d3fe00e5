use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Error;
use log::{error, info, warn};
use tokio::task::JoinSet;
use tokio::time;
use tokio_postgres::Client;

use crate::server::database::connection::Connection;

const ACQUIRE_POLL_INTERVAL_MILLIS: u64 = 25;

struct CommonPool<C> {
    /// pool name, only used in logs
    name: String,
    /// connections in the pool, handed out in a FIFO manner
    connections: Mutex<VecDeque<C>>,
}

/// a fixed-size FIFO pool; a checked-out [`Connection`] returns itself on drop
pub(crate) struct Pool<C>(Arc<CommonPool<C>>);

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Pool<C> {
        Pool(self.0.clone())
    }
}

impl<C> Pool<C> {
    pub const DEFAULT_SIZE: usize = 10;

    /// create an empty pool; fill it with [`Pool::init`] or by releasing clients into it
    pub fn new(name: &str) -> Self {
        Self(Arc::new(CommonPool {
            name: name.to_string(),
            connections: Mutex::new(VecDeque::with_capacity(Self::DEFAULT_SIZE)),
        }))
    }

    /// acquire a connection, polling until `timeout` seconds elapse; `None` means the
    /// pool stayed empty for the whole window and the caller should back off
    pub async fn acquire(&self, timeout: u64) -> Option<Connection<C>> {
        let deadline = time::Instant::now() + Duration::from_secs(timeout);
        loop {
            if let Some(client) = self.pop() {
                return Some(Connection::new(client, self.clone()));
            }
            if time::Instant::now() >= deadline {
                warn!(
                    "timed out acquiring a connection from pool={} after {}s",
                    self.0.name, timeout
                );
                return None;
            }
            time::sleep(Duration::from_millis(ACQUIRE_POLL_INTERVAL_MILLIS)).await;
        }
    }

    pub(super) fn release(&self, client: C) {
        if let Ok(mut connections) = self.0.connections.lock() {
            connections.push_back(client);
        }
    }

    fn pop(&self) -> Option<C> {
        self.0
            .connections
            .lock()
            .ok()
            .and_then(|mut connections| connections.pop_front())
    }
}

impl Pool<Client> {
    /// fill the pool with `DEFAULT_SIZE` connections, established concurrently
    pub async fn init(&self, conn_str: &str) -> Result<(), Error> {
        let mut set = JoinSet::new();
        for _ in 0..Self::DEFAULT_SIZE {
            let conn_str = conn_str.to_string();
            set.spawn(async move { connect_util::connect(conn_str.as_str()).await });
        }
        while let Some(res) = set.join_next().await {
            match res {
                Ok(Ok(client)) => {
                    info!("connection created for pool={}", self.0.name);
                    self.release(client);
                }
                Ok(Err(e)) => return Err(e),
                Err(e) => {
                    error!("join_next failed when joining, {}", e);
                }
            };
        }
        Ok(())
    }
}

pub(crate) mod connect_util {
    use anyhow::{Context, Error};
    use log::error;
    use tokio_postgres::{Client, NoTls};

    pub async fn connect(conn_str: &str) -> Result<Client, Error> {
        let (client, conn) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .context("failed to create connection")?;
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                error!("connection returned error and aborted, {}", e);
            }
        });
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let pool = Pool::<u8>::new("test");
        assert!(pool.acquire(0).await.is_none());

        pool.release(1);
        {
            let conn = match pool.acquire(1).await {
                Some(conn) => conn,
                None => panic!("should get some"),
            };
            assert_eq!(*conn, 1);
            assert!(pool.acquire(0).await.is_none());
        } // conn drops here, and is released automatically

        assert!(pool.acquire(1).await.is_some());
        assert!(pool.acquire(1).await.is_some());
    }

    #[tokio::test]
    async fn acquire_is_fifo() {
        let pool = Pool::<u8>::new("test");
        pool.release(1);
        pool.release(2);

        let first = pool.acquire(1).await.map(|c| *c);
        assert_eq!(first, Some(1));
    }
}
