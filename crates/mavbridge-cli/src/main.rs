//! `mavbridge-cli` – MAVLink ↔ MQTT bridge shell
//!
//! This binary:
//!
//! 1. Loads `~/.mavbridge/config.toml` (writing defaults on first run) and
//!    applies `MAVBRIDGE_*` environment overrides.
//! 2. Opens the vehicle link named by `[link] connection` (the built-in
//!    simulator by default, or a live MAVLink address) and wires it to an
//!    MQTT session through a [`Bridge`].
//! 3. Ticks the bridge on a fixed period while reading console commands
//!    (`mqtt set|connect|status|disconnect`) from stdin.
//! 4. Stops on `quit`, `exit` or **Ctrl-C**, closing the broker session.

mod config;
mod console;

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

use mavbridge_link::{MavlinkLink, SimVehicle, VehicleLink};
use mavbridge_middleware::{BridgeSettings, MqttBus};
use mavbridge_runtime::{Bridge, init_tracing};

use crate::console::Flow;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filter, MAVBRIDGE_LOG_FORMAT=json for JSON lines,
    // OTEL_EXPORTER_OTLP_ENDPOINT for span export.  Console replies still
    // go through println!.
    let _otel = init_tracing("mavbridge");

    print_banner();

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; use `quit` to exit");
    }

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);

    // ── Tokio runtime for the MQTT event loop ─────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("mavbridge-mqtt")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start tokio runtime");
            eprintln!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };

    // ── Bridge ────────────────────────────────────────────────────────────
    let vehicle = match open_vehicle(&cfg) {
        Ok(link) => link,
        Err(e) => {
            error!(error = %e, "Failed to open vehicle link");
            eprintln!("{}: {}", "Fatal".red().bold(), e);
            std::process::exit(1);
        }
    };
    let settings = cfg.settings().unwrap_or_else(|e| {
        println!("{}: {}", "Config error".red(), e);
        println!("  Using default MQTT settings.");
        BridgeSettings::default()
    });
    let bus = Arc::new(MqttBus::new(runtime.handle().clone()));
    let mut bridge = Bridge::new(vehicle, bus, settings);

    println!(
        "  Broker: {}  (type {} to connect, {} for commands)\n",
        bridge.settings().endpoint.dimmed(),
        "mqtt connect".bold().cyan(),
        "help".bold().cyan()
    );

    let lines = spawn_stdin_reader();
    run_loop(&mut bridge, &lines, &shutdown, cfg.tick_interval());

    bridge.disconnect();
    println!("{}", "  ✓ Exiting MAVBridge.".green());
}

fn open_vehicle(cfg: &config::Config) -> Result<Box<dyn VehicleLink>, mavbridge_types::BridgeError> {
    if cfg.uses_simulator() {
        println!(
            "  Simulated vehicle: system {} component {}",
            cfg.link.system_id.to_string().bold(),
            cfg.link.component_id.to_string().bold()
        );
        return Ok(Box::new(
            SimVehicle::new()
                .with_system_id(cfg.link.system_id)
                .with_component_id(cfg.link.component_id)
                .with_telemetry_interval(cfg.heartbeat_interval()),
        ));
    }

    let address = cfg.link.connection.trim();
    let link = MavlinkLink::connect(address)?
        .with_source(cfg.link.source_system, cfg.link.source_component);
    println!("  Vehicle link: {}", address.bold());
    Ok(Box::new(link))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tick loop
// ─────────────────────────────────────────────────────────────────────────────

fn run_loop(
    bridge: &mut Bridge,
    lines: &mpsc::Receiver<String>,
    shutdown: &AtomicBool,
    tick: std::time::Duration,
) {
    let mut stdout = io::stdout();
    let mut stdin_open = true;
    prompt(&mut stdout);

    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();

        while stdin_open {
            match lines.try_recv() {
                Ok(line) => {
                    if console::run_command(bridge, &line, &mut stdout) == Flow::Quit {
                        shutdown.store(true, Ordering::SeqCst);
                        break;
                    }
                    prompt(&mut stdout);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("stdin closed; bridge keeps running until Ctrl-C");
                    stdin_open = false;
                }
            }
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        bridge.tick();

        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("mavbridge-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        eprintln!("{}: {}", "Read error".red(), e);
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start console reader; commands unavailable");
    }
    rx
}

fn prompt(stdout: &mut io::Stdout) {
    print!("{} ", "mavbridge>".bold().cyan());
    stdout.flush().ok();
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __  ______ _   ______       _     __         "#.bold().cyan());
    println!("{}", r#"  /  |/  / _ | | / / __ )_____(_)___/ /__ ____  "#.bold().cyan());
    println!("{}", r#" / /|_/ / __ | |/ / __  / __/ / _  / _ `/ -_) "#.bold().cyan());
    println!("{}", r#"/_/  /_/_/ |_|___/____/_/ /_/\_,_/\_, /\__/  "#.bold().cyan());
    println!("{}", r#"                                 /___/        "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "MAVBridge".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  MAVLink ↔ MQTT telemetry and command bridge");
    println!();
}
