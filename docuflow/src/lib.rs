pub mod api;
pub mod config;

pub use api::{router, run_server, AppState};
