//! Repository implementations
//!
//! Repositories own the SQL. All statements are runtime-checked queries so
//! the crate builds without a live database.

pub mod documents;
pub mod sequences;
pub mod events;

pub use documents::{DocumentRepository, StoredDocument};
pub use sequences::{CounterRepository, TenantRepository};
pub use events::ProcessedEventRepository;
