//! TALOWA referral network backend.
//!
//! Server-side core of the referral programme: atomic registration with
//! referral crediting, global code uniqueness, cumulative team-size
//! aggregation over the materialised ancestor chain, and the nine-tier rank
//! ladder. Hexagonal layout: domain logic behind driving ports, stores
//! behind driven ports, with HTTP as the only inbound adapter.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
