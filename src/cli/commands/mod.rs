//! CLI command implementations.

mod config;
mod doctor;
mod fetch;
mod serve;
mod tracks;

pub use config::run_config;
pub use doctor::run_doctor;
pub use fetch::{run_fetch, FetchArgs};
pub use serve::run_serve;
pub use tracks::run_tracks;
