//! Shared application state injected into every handler.

use std::sync::Arc;

use crate::{
    config::Config,
    identity::IdentityProvider,
    services::{entitlement_service::EntitlementPolicy, guard::IssuanceGuard},
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub identity: Arc<dyn IdentityProvider>,
    pub config: Arc<Config>,
    pub guard: IssuanceGuard,
    pub entitlements: Arc<EntitlementPolicy>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            guard: config.guard(),
            entitlements: Arc::new(config.entitlement_policy()),
            config: Arc::new(config),
            store,
            identity,
        }
    }
}
