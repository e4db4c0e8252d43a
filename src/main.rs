//! tubescript CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tubescript::cli::{commands, Cli, Commands, Output};
use tubescript::config::{Environment, Settings};
use tubescript::TubescriptError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so transcript output on stdout stays clean.
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("tubescript={}", log_level)),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<TubescriptError>() {
            Some(err) => Output::failure(err),
            None => Output::error(&format!("{:#}", e)),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    let env = Environment::capture(&settings);
    settings.apply_env(&env);

    // Execute command
    match cli.command {
        Commands::Fetch {
            video,
            languages,
            format,
            preserve_formatting,
            no_translate,
            output,
            tier,
        } => {
            let args = commands::FetchArgs {
                video,
                languages,
                format,
                preserve_formatting,
                no_translate,
                output,
                tier,
            };
            commands::run_fetch(args, settings, &env).await?;
        }

        Commands::Tracks { video, json, tier } => {
            commands::run_tracks(&video, json, &tier, settings, &env).await?;
        }

        Commands::Serve {
            host,
            port,
            allow_anonymous,
        } => {
            commands::run_serve(host, port, allow_anonymous, settings, &env).await?;
        }

        Commands::Doctor {
            cookie_check,
            cookies,
        } => {
            commands::run_doctor(cookie_check, cookies, settings, &env).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, &settings, cli.config.as_deref())?;
        }
    }

    Ok(())
}
