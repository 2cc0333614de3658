//! Shared HTTP adapter state.
//!
//! Handlers accept this state via `actix_web::web::Data` so they only depend
//! on domain ports and stay testable without infrastructure.

use std::sync::Arc;

use crate::domain::RegistrationService;
use crate::domain::ports::{
    AuthVerifier, CodeAdministration, NetworkQuery, NetworkStore, RegistrationCommand,
};

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// Resolves bearer tokens to verified callers.
    pub auth: Arc<dyn AuthVerifier>,
    /// Registration entry point.
    pub registration: Arc<dyn RegistrationCommand>,
    /// Network visibility queries.
    pub network: Arc<dyn NetworkQuery>,
    /// Code moderation commands.
    pub admin: Arc<dyn CodeAdministration>,
}

impl HttpState {
    /// Wire every driving port to one [`RegistrationService`] instance.
    pub fn for_service<S>(
        service: Arc<RegistrationService<S>>,
        auth: Arc<dyn AuthVerifier>,
    ) -> Self
    where
        S: NetworkStore + 'static,
    {
        Self {
            auth,
            registration: Arc::clone(&service) as Arc<dyn RegistrationCommand>,
            network: Arc::clone(&service) as Arc<dyn NetworkQuery>,
            admin: service,
        }
    }
}
