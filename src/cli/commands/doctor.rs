//! Doctor command - verify yt-dlp, configuration and cookie credentials.

use crate::cli::Output;
use crate::config::{Environment, Settings};
use crate::cookies::{decode_bundle, validate_netscape, CookieResolver, CookieSource};
use crate::sources::{validate_settings, FallbackFetcher};
use crate::transcript::VideoId;
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(
    cookie_check: Option<String>,
    cookies: Option<String>,
    settings: Settings,
    env: &Environment,
) -> anyhow::Result<()> {
    Output::header("tubescript Doctor");
    println!();
    println!("Checking fallback tooling, configuration and credentials...\n");

    let mut checks = Vec::new();

    let fetcher = FallbackFetcher::new(&settings.fallback, settings.temp_dir());

    let tools = vec![check_yt_dlp(&fetcher, &settings).await];
    print_section("External Tools", &tools);
    checks.extend(tools);

    let config = vec![check_config_file(), check_fallback_settings(&settings)];
    print_section("Configuration", &config);
    checks.extend(config);

    let credentials = check_cookie_sources(&settings, env);
    print_section("Cookie Credentials", &credentials);
    checks.extend(credentials);

    let server = vec![check_api_key(&settings, env)];
    print_section("HTTP Service", &server);
    checks.extend(server);

    if let Some(video) = cookie_check {
        let access = vec![check_cookie_access(&fetcher, &settings, env, &video, cookies.as_deref()).await];
        print_section("Cookie Check", &access);
        checks.extend(access);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using tubescript.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! tubescript is ready to use.");
    }

    Ok(())
}

async fn check_yt_dlp(fetcher: &FallbackFetcher, settings: &Settings) -> CheckResult {
    let name = "yt-dlp";
    match fetcher.tool_version().await {
        Ok(version) => CheckResult::ok(name, &version),
        Err(e) if !settings.fallback.enabled => CheckResult::warning(
            name,
            &format!("{} (fallback disabled)", e),
            install_hint_ytdlp(),
        ),
        Err(e) => CheckResult::error(name, &e.to_string(), install_hint_ytdlp()),
    }
}

fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to override defaults", config_path.display()),
        )
    }
}

fn check_fallback_settings(settings: &Settings) -> CheckResult {
    let name = "Fallback options";
    if !settings.fallback.enabled {
        return CheckResult::warning(
            name,
            "fallback tier disabled",
            "Set fallback.enabled = true to recover from blocked requests",
        );
    }

    match validate_settings(&settings.fallback) {
        Ok(()) => CheckResult::ok(
            name,
            &format!(
                "subtitle format {}, timeout {}s",
                settings.fallback.subtitle_format, settings.fallback.timeout_seconds
            ),
        ),
        Err(e) => CheckResult::error(
            name,
            &e.to_string(),
            "Remove media selection options from fallback.extra_args",
        ),
    }
}

fn check_cookie_sources(settings: &Settings, env: &Environment) -> Vec<CheckResult> {
    let mut results = Vec::new();
    let bundle_name = settings.cookies.env_var.as_str();

    if let Some(bundle) = &env.cookie_bundle {
        results.push(match decode_bundle(bundle) {
            Ok(contents) => CheckResult::ok(
                bundle_name,
                &format!("valid cookie bundle ({} cookies)", count_cookies(&contents)),
            ),
            Err(e) => CheckResult::error(
                bundle_name,
                &e.to_string(),
                "Store cookies.txt base64-encoded: base64 -w0 cookies.txt",
            ),
        });
    }

    if let Some(file) = &settings.cookies.file {
        let path = Settings::expand_path(file);
        let check = std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|contents| {
                validate_netscape(&contents)
                    .map(|_| count_cookies(&contents))
                    .map_err(|e| e.to_string())
            });
        results.push(match check {
            Ok(count) => CheckResult::ok(
                "Cookie file",
                &format!("{} ({} cookies)", path.display(), count),
            ),
            Err(e) => CheckResult::error(
                "Cookie file",
                &format!("{}: {}", path.display(), e),
                "Export cookies.txt in Netscape format from a signed-in browser",
            ),
        });
    }

    if let Some(browser) = &settings.cookies.browser {
        results.push(if env.interactive {
            CheckResult::ok("Browser cookies", browser)
        } else {
            CheckResult::warning(
                "Browser cookies",
                &format!("{} ignored (not an interactive session)", browser),
                &format!("Headless hosts need {} or cookies.file", bundle_name),
            )
        });
    }

    if results.is_empty() {
        results.push(CheckResult::warning(
            "Cookies",
            "no cookie credential configured",
            &format!(
                "Members-only and age-gated videos need {} or cookies.file",
                bundle_name
            ),
        ));
    }

    results
}

fn check_api_key(settings: &Settings, env: &Environment) -> CheckResult {
    let name = settings.server.api_key_env.as_str();
    match &env.api_key {
        Some(key) if key.len() > 8 => CheckResult::ok(
            name,
            &format!("configured ({}...)", key.chars().take(4).collect::<String>()),
        ),
        Some(_) => CheckResult::warning(name, "configured but short", "Use a longer random key"),
        None => CheckResult::warning(
            name,
            "not set",
            "tubescript serve refuses to start without it unless --allow-anonymous is given",
        ),
    }
}

async fn check_cookie_access(
    fetcher: &FallbackFetcher,
    settings: &Settings,
    env: &Environment,
    video: &str,
    cookies: Option<&str>,
) -> CheckResult {
    let name = "Restricted video";
    let hint = "Re-export cookies from a browser signed in to an account with access";

    let video_id = match VideoId::parse(video) {
        Ok(id) => id,
        Err(e) => return CheckResult::error(name, &e.to_string(), "Pass a video ID or URL"),
    };
    let override_source = match cookies.map(str::parse::<CookieSource>).transpose() {
        Ok(source) => source,
        Err(e) => return CheckResult::error(name, &e.to_string(), hint),
    };

    let resolver = CookieResolver::new(settings, env);
    match resolver
        .check(fetcher, &video_id, override_source.as_ref())
        .await
    {
        Ok(health) if health.accessible => CheckResult::ok(
            name,
            &format!(
                "'{}' accessible via {} cookies",
                health.title.unwrap_or_default(),
                health.origin
            ),
        ),
        Ok(health) => CheckResult::error(
            name,
            &health
                .error
                .unwrap_or_else(|| format!("{} not accessible", video_id)),
            hint,
        ),
        Err(e) => CheckResult::error(name, &e.to_string(), hint),
    }
}

/// Number of cookie entries in a Netscape cookies.txt.
fn count_cookies(contents: &str) -> usize {
    contents
        .lines()
        .map(|line| line.strip_prefix("#HttpOnly_").unwrap_or(line))
        .filter(|line| !line.starts_with('#') && line.split('\t').count() == 7)
        .count()
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install -U yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}
