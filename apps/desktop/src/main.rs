use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{AttackSession, HttpAttackService, SessionOptions, SessionStatus};
use shared::domain::Epsilon;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod affordance;
mod config;
mod render;
mod repl;

use config::{load_settings, normalize_service_url};

#[derive(Parser, Debug)]
#[command(name = "attack-demo", about = "FGSM adversarial attack demo client")]
struct Args {
    /// Base URL of the attack service.
    #[arg(long)]
    service_url: Option<String>,
    /// Request deadline in seconds; 0 waits indefinitely.
    #[arg(long)]
    timeout: Option<u64>,
    /// Settings file (defaults to ./attack-demo.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Run a single attack on this PNG/JPEG image instead of the interactive prompt.
    #[arg(long)]
    image: Option<PathBuf>,
    /// Perturbation strength, snapped to 0.000-0.200 in steps of 0.005.
    #[arg(long)]
    epsilon: Option<String>,
    /// Write the adversarial image here after a successful attack.
    #[arg(long, requires = "image")]
    save_adversarial: Option<PathBuf>,
    /// Print a JSON report instead of the text view.
    #[arg(long, requires = "image")]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = &args.service_url {
        settings.service_url = normalize_service_url(url)?;
    }
    if let Some(timeout) = args.timeout {
        settings.request_timeout_secs = timeout;
    }

    let epsilon = match &args.epsilon {
        Some(raw) => affordance::parse_epsilon(raw)?,
        None => Epsilon::snapped(settings.default_epsilon)
            .context("configured default epsilon is not a number")?,
    };

    let service =
        HttpAttackService::from_service_url(&settings.service_url, settings.request_timeout())?;
    info!(endpoint = %service.endpoint(), "attack service configured");
    let session = AttackSession::new(
        Arc::new(service),
        SessionOptions {
            request_timeout: settings.request_timeout(),
            initial_epsilon: epsilon,
        },
    );

    match args.image {
        Some(image) => run_once(&session, &image, args.save_adversarial, args.json).await,
        None => {
            repl::run(session).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_once(
    session: &AttackSession,
    image: &std::path::Path,
    save_adversarial: Option<PathBuf>,
    json: bool,
) -> Result<ExitCode> {
    let picked = affordance::pick_image(image).await?;
    session.select_image(picked.name, picked.kind, picked.bytes);

    let status = session.submit().await;
    let snapshot = session.snapshot();

    if json {
        if let Some(report) = render::build_report(&snapshot) {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    } else {
        let original = snapshot
            .image
            .as_ref()
            .and_then(|image| session.previews().resolve(&image.preview_uri));
        print!("{}", render::render_snapshot(&snapshot, original.as_deref()));
    }

    match status {
        SessionStatus::Succeeded(result) => {
            if let Some(path) = save_adversarial {
                tokio::fs::write(&path, &result.adversarial_image)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "saved adversarial image");
            }
            Ok(ExitCode::SUCCESS)
        }
        other => {
            warn!(status = ?other, "attack did not complete");
            Ok(ExitCode::FAILURE)
        }
    }
}
