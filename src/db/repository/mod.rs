//! Database repositories
//!
//! Repository functions for database access, separating data access logic
//! from business logic.

pub mod channels;
pub mod settings;

// Re-export commonly used items
pub use channels::ChannelWriter;
