//! Vaultsync server: versioned document store with per-vault change feeds,
//! server-side three-way merge on bulk pushes, and content-addressed
//! attachment storage.

pub mod blobs;
pub mod config;
pub mod database;
pub mod http_server;
pub mod state;

pub use config::Config;
pub use http_server::router;
pub use state::{State, StateSetupError};
