//! SQLite persistence layer
//!
//! The pooled database handle plus repository implementations of the core
//! persistence ports. Uniqueness constraints live in the schema, not the
//! application: (`user_id`, `provider`) for connections and
//! (`user_id`, `source`, `source_event_id`) for local events.

mod connection_repository;
mod event_repository;
mod manager;

pub use connection_repository::SqliteConnectionRepository;
pub use event_repository::SqliteLocalEventRepository;
pub use manager::Database;
