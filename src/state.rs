use std::sync::Arc;

use crate::auth::SessionKeys;
use crate::config::Settings;
use crate::payments::DynPaymentGateway;
use crate::publisher::EventPublisher;
use crate::store::DynStore;

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub payments: DynPaymentGateway,
    pub events: EventPublisher,
    pub sessions: Arc<SessionKeys>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings, store: DynStore, payments: DynPaymentGateway, events: EventPublisher) -> Self {
        Self { store, payments, events, sessions: Arc::new(SessionKeys::new(&settings)), settings: Arc::new(settings) }
    }
}
