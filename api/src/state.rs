use std::sync::Arc;

use arb_core::QueryFacade;

/// Shared application state accessible from all API handlers. The API
/// crate owns no business state of its own — everything is read
/// through the facade, which is in turn backed by the core's registry
/// and repo.
pub struct AppState {
    pub facade: Arc<QueryFacade>,
}

impl AppState {
    pub fn new(facade: Arc<QueryFacade>) -> Self {
        Self { facade }
    }
}
