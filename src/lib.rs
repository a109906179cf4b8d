//! YouTube video fetcher library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod fetcher;
pub mod ingestion;
pub mod query;
pub mod server;
pub mod sqlite_persistence;
pub mod video_store;

// Re-export commonly used types for convenience
pub use server::{run_server, RequestsLoggingLevel};
pub use video_store::{SqliteVideoStore, VideoStore};
