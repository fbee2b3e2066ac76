//! Domain Adapters
//!
//! Implementations of the service and sequence ports over PostgreSQL.
//!
//! ```rust,ignore
//! let store: Arc<dyn FinancialStore> = Arc::new(PostgresFinancialStore::new(pool.clone()));
//! let counters: Arc<dyn CounterStore> = Arc::new(PostgresCounterStore::new(pool));
//! ```

pub mod financial_store;
pub mod sequence;

pub use financial_store::PostgresFinancialStore;
pub use sequence::{PostgresCounterStore, PostgresTenantDirectory};
