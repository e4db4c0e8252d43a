//! Config command implementation.

use crate::cli::{ConfigAction, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the config command.
pub fn run_config(action: &ConfigAction, settings: &Settings, config_path: Option<&str>) -> Result<()> {
    let path = config_path
        .map(Settings::expand_path)
        .unwrap_or_else(Settings::default_config_path);

    match action {
        ConfigAction::Show => {
            if !path.exists() {
                Output::status(&format!("{} not found; showing defaults", path.display()));
            }
            println!("{}", settings.to_toml()?);
        }

        ConfigAction::Path => {
            println!("{}", path.display());
        }
    }

    Ok(())
}
