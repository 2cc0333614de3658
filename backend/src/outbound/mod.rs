//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations; they contain no crediting or validation logic.
//!
//! - **memory**: process-local store with optimistic commit-time conflict
//!   detection; the default for tests and database-less local runs.
//! - **postgres**: PostgreSQL-backed store using sqlx with SERIALIZABLE
//!   transactions.

pub mod memory;
pub mod postgres;
