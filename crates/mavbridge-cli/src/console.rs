//! Console – line commands for the interactive shell.
//!
//! Supported commands:
//!   mqtt                          – usage
//!   mqtt set                      – list settings
//!   mqtt set <name>               – show one setting
//!   mqtt set <name> <value>       – change a setting
//!   mqtt connect                  – open the broker session
//!   mqtt status                   – connection state, queue depth, counters
//!   mqtt disconnect               – close the broker session
//!   help                          – show this list
//!   quit | exit                   – leave

use colored::Colorize;
use std::io::Write;

use mavbridge_middleware::BridgeSettings;
use mavbridge_runtime::Bridge;

pub const USAGE: &str = "Usage: mqtt <set|connect|status|disconnect>";

/// Whether the shell should keep going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Execute one console line against `bridge`, writing any reply to `out`.
pub fn run_command(bridge: &mut Bridge, line: &str, out: &mut impl Write) -> Flow {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => {}
        ["help"] => cmd_help(out),
        ["quit"] | ["exit"] => {
            let _ = writeln!(out, "{}", "Goodbye.".green());
            return Flow::Quit;
        }
        ["mqtt", rest @ ..] => cmd_mqtt(bridge, rest, out),
        [other, ..] => {
            let _ = writeln!(
                out,
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "help".bold()
            );
        }
    }
    Flow::Continue
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help(out: &mut impl Write) {
    let _ = writeln!(out, "{}", "MAVBridge Commands".bold().underline());
    let _ = writeln!(out, "  {}  – list / show / change settings", "mqtt set [name [value]]".bold().cyan());
    let _ = writeln!(out, "  {}             – connect to the broker", "mqtt connect".bold().cyan());
    let _ = writeln!(out, "  {}              – session and queue status", "mqtt status".bold().cyan());
    let _ = writeln!(out, "  {}          – close the broker session", "mqtt disconnect".bold().cyan());
    let _ = writeln!(out, "  {}              – exit", "quit  exit".bold().cyan());
}

fn cmd_mqtt(bridge: &mut Bridge, args: &[&str], out: &mut impl Write) {
    match args {
        ["set", rest @ ..] => cmd_set(bridge, rest, out),
        ["connect"] => match bridge.connect() {
            Ok(()) => {
                let _ = writeln!(
                    out,
                    "  Connecting to {} …",
                    bridge.settings().endpoint.bold()
                );
            }
            Err(e) => {
                let _ = writeln!(out, "{}: {}", "Connect failed".red(), e);
            }
        },
        ["status"] => {
            let _ = writeln!(out, "{}", bridge.status());
        }
        ["disconnect"] => {
            bridge.disconnect();
            let _ = writeln!(out, "  {}", "Disconnected.".green());
        }
        _ => {
            let _ = writeln!(out, "{USAGE}");
        }
    }
}

fn cmd_set(bridge: &mut Bridge, args: &[&str], out: &mut impl Write) {
    match args {
        [] => {
            for (name, value) in bridge.settings().iter() {
                let _ = writeln!(out, "  {:<16} {}", name, value.yellow());
            }
        }
        [name] => match bridge.settings().get(name) {
            Some(value) => {
                let _ = writeln!(out, "  {:<16} {}", name, value.yellow());
            }
            None => unknown_setting(name, out),
        },
        [name, value @ ..] => {
            let value = value.join(" ");
            match bridge.set_setting(name, &value) {
                Ok(()) => {
                    let _ = writeln!(out, "  {} {} = {}", "✓".green(), name, value.bold());
                }
                Err(mavbridge_types::BridgeError::UnknownSetting(_)) => unknown_setting(name, out),
                Err(e) => {
                    let _ = writeln!(out, "{}: {}", "Error".red(), e);
                }
            }
        }
    }
}

fn unknown_setting(name: &str, out: &mut impl Write) {
    let _ = writeln!(out, "{} '{}'", "Unknown setting:".red(), name.yellow());
    let candidates = BridgeSettings::completions(name);
    let candidates = if candidates.is_empty() {
        BridgeSettings::names().to_vec()
    } else {
        candidates
    };
    let _ = writeln!(out, "  Known settings: {}", candidates.join(", "));
}
