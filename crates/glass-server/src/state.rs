//! Application state shared across request handlers

use glass_auth::Authenticator;
use glass_store::SecretService;
use std::sync::Arc;

/// Shared application state
///
/// Cloned per request; resources are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    /// The secured secret service serving all `/v1` routes
    pub secrets: Arc<dyn SecretService>,

    /// Authenticator used by the auth middleware
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Assemble state from wired resources
    pub fn new(secrets: Arc<dyn SecretService>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            secrets,
            authenticator,
        }
    }
}
