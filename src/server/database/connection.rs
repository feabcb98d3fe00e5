use std::ops::{Deref, DerefMut};

use crate::server::database::pool::Pool;

/// a pooled client; hands itself back to its pool when dropped
pub(crate) struct Connection<C> {
    client: Option<C>,
    pool: Pool<C>,
}

impl<C> Connection<C> {
    pub fn new(client: C, pool: Pool<C>) -> Self {
        Self {
            client: Some(client),
            pool,
        }
    }
}

impl<C> Deref for Connection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client.as_ref().expect("connection already released")
    }
}

impl<C> DerefMut for Connection<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client.as_mut().expect("connection already released")
    }
}

impl<C> Drop for Connection<C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}
