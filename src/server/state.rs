use crate::server::repository::PgStore;
use crate::server::service::bills::BillsService;

#[derive(Clone)]
pub(crate) struct AppState {
    store: PgStore,
}

impl AppState {
    pub fn new(store: PgStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PgStore {
        &self.store
    }

    /// the bill lifecycle manager over the shared store; cloning the store
    /// only bumps the pool handles
    pub fn bills(&self) -> BillsService<PgStore> {
        BillsService::new(self.store.clone())
    }
}
