mod actions;
mod config;
mod engine;
mod layout;
mod modal;
mod model;
mod store;
mod transport;

use std::io::{self, BufRead, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use config::VenueConfig;
use engine::SyncEngine;
use store::PresetStore;
use transport::{LogPort, SignalValue, SurfaceEvent, SurfacePort};

/// Multi-surface binding engine for a lighting rig.
#[derive(Debug, Parser)]
#[command(name = "stagesync", version, about)]
struct Args {
    /// Venue configuration file (JSON); the built-in demo venue when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preset database path, overriding the configured one
    #[arg(long)]
    db: Option<PathBuf>,

    /// Print the demo venue configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(err) = run(args) {
        error!("[MAIN] fatal: {:#}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(&VenueConfig::demo())?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => {
            info!("[MAIN] loading venue config from {}", path.display());
            VenueConfig::load(path)?
        }
        None => {
            info!("[MAIN] no config given, using the demo venue");
            VenueConfig::demo()
        }
    };
    config.validate().context("invalid venue config")?;
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let store = PresetStore::open(&config.db_path)
        .with_context(|| format!("opening preset store {}", config.db_path.display()))?;
    let rig = config.build_rig()?;
    let ports: Vec<Box<dyn SurfacePort>> = config
        .surfaces
        .iter()
        .map(|name| Box::new(LogPort::new(name.clone())) as Box<dyn SurfacePort>)
        .collect();

    let mut engine = SyncEngine::new(config, rig, store, ports)?;
    repl(&mut engine)
}

/// Line-oriented event injector standing in for real surface transports.
/// Each command forges one inbound event (a press expands to the press and
/// release edges) and hands it to the engine.
fn repl(engine: &mut SyncEngine) -> Result<()> {
    println!("commands: press <surface> <channel> | hold <surface> <channel> <0|1>");
    println!("          set <surface> <channel> <0-65535> | text <surface> <channel> <text>");
    println!("          quit");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        if command == "quit" || command == "exit" {
            return Ok(());
        }

        let Some((surface, events)) = parse_command(command, &mut parts) else {
            warn!("[REPL] bad command: {}", line.trim());
            continue;
        };
        if !engine.surface_names().any(|name| name == surface) {
            warn!("[REPL] unknown surface {:?}", surface);
            continue;
        }
        for event in events {
            engine.dispatch(&surface, event)?;
        }
    }
}

fn parse_command(
    command: &str,
    parts: &mut std::str::SplitWhitespace<'_>,
) -> Option<(String, Vec<SurfaceEvent>)> {
    let surface = parts.next()?.to_string();
    let channel = parts.next()?.parse().ok()?;
    let events = match command {
        "press" => vec![
            SurfaceEvent {
                channel,
                value: SignalValue::Bool(true),
            },
            SurfaceEvent {
                channel,
                value: SignalValue::Bool(false),
            },
        ],
        "hold" => {
            let level = match parts.next()? {
                "0" => false,
                "1" => true,
                _ => return None,
            };
            vec![SurfaceEvent {
                channel,
                value: SignalValue::Bool(level),
            }]
        }
        "set" => vec![SurfaceEvent {
            channel,
            value: SignalValue::U16(parts.next()?.parse().ok()?),
        }],
        "text" => {
            let text = parts.collect::<Vec<_>>().join(" ");
            vec![SurfaceEvent {
                channel,
                value: SignalValue::Text(text),
            }]
        }
        _ => return None,
    };
    Some((surface, events))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Option<(String, Vec<SurfaceEvent>)> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?;
        parse_command(command, &mut parts)
    }

    #[test]
    fn press_expands_to_both_edges() {
        let (surface, events) = parse("press booth 1006").unwrap();
        assert_eq!(surface, "booth");
        assert_eq!(
            events,
            [
                SurfaceEvent {
                    channel: 1006,
                    value: SignalValue::Bool(true)
                },
                SurfaceEvent {
                    channel: 1006,
                    value: SignalValue::Bool(false)
                },
            ]
        );
    }

    #[test]
    fn set_and_text_carry_their_payloads() {
        let (_, events) = parse("set booth 1101 32768").unwrap();
        assert_eq!(events[0].value, SignalValue::U16(32768));

        let (_, events) = parse("text booth 2001 Warm Sunset").unwrap();
        assert_eq!(events[0].value, SignalValue::Text("Warm Sunset".into()));
    }

    #[test]
    fn malformed_commands_are_rejected() {
        assert!(parse("press booth").is_none());
        assert!(parse("hold booth 5 2").is_none());
        assert!(parse("set booth 5 70000").is_none());
        assert!(parse("wiggle booth 5").is_none());
    }
}
