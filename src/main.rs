//! Smoke-test CLI for the Gestor front-end
//!
//! Run against an already-running dev server:
//!   gestor-e2e
//! or let it start one:
//!   gestor-e2e --spawn-server 'npx expo start --web --non-interactive'

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gestor_e2e::runner::{RunnerConfig, SmokeRunner};
use gestor_e2e::script::BrowserKind;
use gestor_e2e::server::DevServerConfig;
use gestor_e2e::visual::VisualConfig;
use gestor_e2e::SmokeResult;

#[derive(Parser, Debug)]
#[command(name = "gestor-e2e")]
#[command(about = "Headless-browser smoke tests for the Gestor front-end")]
struct Args {
    /// Candidate dev-server URL (repeatable, probed in order)
    #[arg(short, long = "url")]
    urls: Vec<String>,

    /// Path to flow specs directory
    #[arg(short, long, default_value = "specs")]
    specs: PathBuf,

    /// Run only flows carrying this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only a specific flow by name
    #[arg(short, long)]
    name: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Run in headless mode
    #[arg(long, default_value = "true")]
    headless: bool,

    /// Connect timeout per candidate URL, in seconds
    #[arg(long, default_value = "15")]
    connect_timeout_secs: u64,

    /// Override every visibility-assertion timeout, in seconds
    #[arg(long)]
    assert_timeout_secs: Option<u64>,

    /// Viewport width (overrides each flow's viewport)
    #[arg(long)]
    viewport_width: Option<u32>,

    /// Viewport height (overrides each flow's viewport)
    #[arg(long)]
    viewport_height: Option<u32>,

    /// User agent (overrides each flow's user agent)
    #[arg(long)]
    user_agent: Option<String>,

    /// Directory screenshots are written to
    #[arg(long, default_value = "smoke-results/screenshots")]
    screenshot_dir: PathBuf,

    /// Output directory for the JSON report
    #[arg(short, long, default_value = "smoke-results")]
    output: PathBuf,

    /// Spawn the dev server with this shell command instead of probing
    #[arg(long)]
    spawn_server: Option<String>,

    /// URL the spawned server will listen on
    #[arg(long, default_value = "http://localhost:19006")]
    spawn_server_url: String,

    /// Update visual baselines from this run's screenshots
    #[arg(long)]
    update_baselines: bool,

    /// Visual diff threshold (percentage)
    #[arg(long, default_value = "0.5")]
    visual_threshold: f64,

    /// Exit nonzero when a flow fails (default records the failure,
    /// saves the debugging screenshot, and exits 0)
    #[arg(long)]
    check: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let args = Args::parse();
    let check = args.check;

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(run(args)) {
        Ok(all_passed) => {
            if all_passed || !check {
                std::process::exit(0);
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> SmokeResult<bool> {
    let browser = match args.browser.as_str() {
        "firefox" => BrowserKind::Firefox,
        "webkit" => BrowserKind::Webkit,
        _ => BrowserKind::Chromium,
    };

    let candidates = if args.urls.is_empty() {
        gestor_e2e::probe::default_candidates()
    } else {
        args.urls
    };

    let spawn_server = args.spawn_server.map(|command| DevServerConfig {
        command,
        url: args.spawn_server_url.clone(),
        ..Default::default()
    });

    let config = RunnerConfig {
        candidates,
        connect_timeout: Duration::from_secs(args.connect_timeout_secs),
        browser,
        headless: args.headless,
        assert_timeout_ms: args.assert_timeout_secs.map(|s| s * 1000),
        viewport_width: args.viewport_width,
        viewport_height: args.viewport_height,
        user_agent: args.user_agent,
        screenshot_dir: args.screenshot_dir.clone(),
        specs_dir: args.specs,
        output_dir: args.output.clone(),
        spawn_server,
        visual: VisualConfig {
            actual_dir: args.screenshot_dir,
            threshold: args.visual_threshold,
            auto_update: args.update_baselines,
            ..Default::default()
        },
    };

    let mut runner = SmokeRunner::new(config);

    let report = if let Some(name) = args.name {
        runner.run_named(&name).await?
    } else if let Some(tag) = args.tag {
        runner.run_tagged(&tag).await?
    } else {
        runner.run_all().await?
    };

    if args.update_baselines {
        runner.update_baselines()?;
    }

    runner.write_report(&report)?;

    Ok(report.failed == 0)
}
