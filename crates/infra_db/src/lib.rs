//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the travel back office, built on SQLx.
//!
//! # Storage model
//!
//! Quotes, bookings, invoices and payments are stored whole as JSONB keyed
//! by `(tenant_id, id)`. Natural keys (quote number and version, booking,
//! invoice and transaction numbers) carry unique constraints per tenant and
//! every row holds a `lock_version` that writers must match.
//!
//! Sequence counters live in their own table and advance with a single
//! upsert, so allocation never reads-then-writes.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresFinancialStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/travel")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresFinancialStore::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool, MIGRATOR};
pub use error::DatabaseError;
pub use adapters::{PostgresCounterStore, PostgresFinancialStore, PostgresTenantDirectory};
