//! Pre-flight checks before long-running operations.
//!
//! Validates that required tools and configuration are available
//! before starting work that would otherwise fail midway.

use crate::error::{Result, TubescriptError};
use std::process::Command;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// Fallback-only acquisition requires yt-dlp.
    Fallback { yt_dlp_path: &'a str },
    /// Serving requires an API key unless anonymous access is allowed.
    Serve {
        api_key: Option<&'a str>,
        allow_anonymous: bool,
    },
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation<'_>) -> Result<()> {
    match operation {
        Operation::Fallback { yt_dlp_path } => check_tool(yt_dlp_path),
        Operation::Serve {
            allow_anonymous: true,
            ..
        } => Ok(()),
        Operation::Serve {
            api_key: Some(key), ..
        } if !key.is_empty() => Ok(()),
        Operation::Serve { .. } => Err(TubescriptError::Config(
            "No API key configured. Set API_KEY (or server.api_key_env) or pass --allow-anonymous"
                .to_string(),
        )),
    }
}

fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(TubescriptError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TubescriptError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(TubescriptError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_requires_key_unless_anonymous() {
        assert!(check(Operation::Serve {
            api_key: None,
            allow_anonymous: false,
        })
        .is_err());
        assert!(check(Operation::Serve {
            api_key: Some(""),
            allow_anonymous: false,
        })
        .is_err());
        assert!(check(Operation::Serve {
            api_key: Some("secret"),
            allow_anonymous: false,
        })
        .is_ok());
        assert!(check(Operation::Serve {
            api_key: None,
            allow_anonymous: true,
        })
        .is_ok());
    }

    #[test]
    fn test_missing_tool() {
        let err = check(Operation::Fallback {
            yt_dlp_path: "/nonexistent/yt-dlp",
        })
        .unwrap_err();
        assert!(matches!(err, TubescriptError::ToolNotFound(_)));
    }
}
