//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod auth_verifier;
mod network_store;
mod registration;

#[cfg(test)]
pub use auth_verifier::MockAuthVerifier;
pub use auth_verifier::{AuthVerifier, FixtureAuthVerifier, VerifiedCaller};
pub use network_store::{CodeRecord, DirectReferral, NetworkSession, NetworkStore, StoreError};
#[cfg(test)]
pub use registration::{MockCodeAdministration, MockNetworkQuery, MockRegistrationCommand};
pub use registration::{
    CodeAdministration, NetworkQuery, NetworkSummary, RegistrationCommand, RegistrationOutcome,
    RegistrationRequest,
};
