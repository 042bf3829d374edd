//! Shared application state.

use std::sync::Arc;

use meshsim_netem::NetworkController;

use crate::registry::PeerRegistry;

/// State shared across all request handlers.
///
/// The controller and the registry each own their lock; no request ever
/// holds both.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    controller: NetworkController,
    registry: PeerRegistry,
}

impl AppState {
    pub fn new(controller: NetworkController, registry: PeerRegistry) -> Self {
        Self {
            inner: Arc::new(Inner {
                controller,
                registry,
            }),
        }
    }

    pub fn controller(&self) -> &NetworkController {
        &self.inner.controller
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.inner.registry
    }
}
