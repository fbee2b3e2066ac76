//! Test Utilities Crate
//!
//! Shared test infrastructure for the travel back office.
//!
//! # Modules
//!
//! - `fixtures`: Predictable money, dates, identifiers, tenants and customers
//! - `builders`: Builders for service inputs and gateway webhook bodies
//! - `harness`: Application services wired over in-memory adapters
//! - `database`: PostgreSQL testcontainers with migrations applied
//! - `assertions`: Assertions over ledger and invoice invariants
//! - `generators`: Property-based test data generators

pub mod fixtures;
pub mod builders;
pub mod harness;
pub mod database;
pub mod assertions;
pub mod generators;

pub use fixtures::*;
pub use builders::*;
pub use harness::{TestHarness, WEBHOOK_SECRET};
pub use database::*;
pub use assertions::*;
pub use generators::*;
