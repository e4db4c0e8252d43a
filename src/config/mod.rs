//! Configuration module for tubescript.
//!
//! Settings come from a TOML file; secrets and overrides come from the
//! process environment, captured once at startup.

mod environment;
mod settings;

pub use environment::{Environment, LANGUAGES_ENV};
pub use settings::{
    CookieSettings, FallbackSettings, GeneralSettings, PrimarySettings, ServerSettings, Settings,
};
