//! Interactive mode: line commands drive the session while a spawned task
//! renders every status change.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use client_core::{AttackSession, SessionEvent, SessionStatus};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{error::RecvError, Receiver},
};
use tracing::{info, warn};

use crate::{affordance, render};

const HELP: &str = "\
commands:
  open <path>       select a PNG or JPEG image
  epsilon <value>   set perturbation strength (0.000-0.200, step 0.005)
  run               submit the attack
  cancel            abort the request in flight
  status            show the current state
  save <path>       write the adversarial image
  help              show this help
  quit              exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Open(PathBuf),
    Epsilon(String),
    Run,
    Cancel,
    Status,
    Save(PathBuf),
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "open" | "o" if !rest.is_empty() => ReplCommand::Open(PathBuf::from(rest)),
        "epsilon" | "eps" | "e" if !rest.is_empty() => ReplCommand::Epsilon(rest.to_string()),
        "save" if !rest.is_empty() => ReplCommand::Save(PathBuf::from(rest)),
        "open" | "o" | "epsilon" | "eps" | "e" | "save" => {
            return Err(format!("`{verb}` needs an argument"));
        }
        "run" | "r" | "attack" => ReplCommand::Run,
        "cancel" => ReplCommand::Cancel,
        "status" | "s" => ReplCommand::Status,
        "help" | "h" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command `{other}`; type `help`")),
    };
    Ok(Some(command))
}

pub async fn run(session: Arc<AttackSession>) -> Result<()> {
    println!("FGSM Adversarial Attack Demo");
    println!("{HELP}");

    let events = session.subscribe_events();
    let renderer = tokio::spawn(render_events(session.clone(), events, |text| {
        print!("{text}")
    }));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match command {
            ReplCommand::Open(path) => match affordance::pick_image(&path).await {
                Ok(picked) => session.select_image(picked.name, picked.kind, picked.bytes),
                Err(err) => println!("{err:#}"),
            },
            ReplCommand::Epsilon(raw) => match affordance::parse_epsilon(&raw) {
                Ok(epsilon) => {
                    session.set_epsilon(epsilon.value());
                    println!("Epsilon (Perturbation): {}", epsilon.label());
                }
                Err(err) => println!("{err:#}"),
            },
            ReplCommand::Run => {
                let session = session.clone();
                tokio::spawn(async move {
                    session.submit().await;
                });
            }
            ReplCommand::Cancel => {
                if !session.cancel() {
                    println!("No request in flight.");
                }
            }
            ReplCommand::Status => print!("{}", snapshot_text(&session)),
            ReplCommand::Save(path) => {
                let Some(result) = session.status().result().cloned() else {
                    println!("No adversarial image to save yet.");
                    continue;
                };
                match tokio::fs::write(&path, &result.adversarial_image).await {
                    Ok(()) => println!("Saved adversarial image to {}", path.display()),
                    Err(err) => println!("failed to write {}: {err}", path.display()),
                }
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
        }
    }

    if session.cancel() {
        info!("attack: cancelled in-flight request on exit");
    }
    renderer.abort();
    Ok(())
}

/// Emits the text for every session event in `events`. The receiver is
/// subscribed by the caller so nothing sent before the task starts is lost.
async fn render_events<F>(
    session: Arc<AttackSession>,
    mut events: Receiver<SessionEvent>,
    mut emit: F,
) where
    F: FnMut(String),
{
    loop {
        match events.recv().await {
            Ok(SessionEvent::StatusChanged(SessionStatus::AwaitingResponse)) => {
                emit("Attacking...\n".to_string());
            }
            Ok(SessionEvent::StatusChanged(SessionStatus::Idle)) => {}
            Ok(SessionEvent::StatusChanged(_)) => emit(snapshot_text(&session)),
            Ok(SessionEvent::ImageSelected { name, .. }) => emit(format!("Selected {name}\n")),
            Ok(SessionEvent::SubmitIgnored) => {
                emit("A request is already in flight.\n".to_string());
            }
            Ok(SessionEvent::EpsilonChanged(_)) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "repl: renderer lagged behind session events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn snapshot_text(session: &AttackSession) -> String {
    let snapshot = session.snapshot();
    let original = snapshot
        .image
        .as_ref()
        .and_then(|image| session.previews().resolve(&image.preview_uri));
    render::render_snapshot(&snapshot, original.as_deref())
}
