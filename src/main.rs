//! simbridge - headless console shell over the command bridge
//!
//! Thin glue around the library crates: parses arguments, resolves the
//! backend once, registers a stdout log callback, then runs a line-oriented
//! command loop on the tokio runtime. All engineering lives in
//! `simbridge-session`; this binary is interface-boundary plumbing.

use std::path::PathBuf;

use clap::Parser;

use simbridge_core::prelude::*;
use simbridge_session::{
    create_backend, parse_sys_bus_params, BackendKind, BridgeConfig, CommandBridge,
};

/// Async control bridge for interactive simulation backends
#[derive(Parser, Debug)]
#[command(name = "simbridge")]
#[command(about = "Async control bridge for interactive simulation backends", long_about = None)]
struct Args {
    /// Script to load at startup
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Backend selection: auto, console or substitute
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Simulator binary to spawn for the console backend
    #[arg(long)]
    binary: Option<String>,

    /// Comma-separated key=value pairs for system bus parameters
    /// (e.g. 'cpu=cortex-m4,freq=72000000')
    #[arg(long)]
    sys_bus_params: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    simbridge_core::logging::init()?;

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = BridgeConfig::load(&cwd);
    if let Some(kind) = args.backend {
        config.backend = kind;
    }
    if let Some(binary) = args.binary {
        config.binary = binary;
    }
    if let Some(raw) = &args.sys_bus_params {
        config.sys_bus_params.extend(parse_sys_bus_params(raw));
    }

    let backend = create_backend(&config)?;
    info!("backend resolved: {}", backend.name());
    let bridge = CommandBridge::new(backend)?;

    bridge.setup_logging(|line| println!("{line}")).await?;

    if let Some(script) = &args.script {
        match bridge.load(script.clone()).await {
            Ok(()) => println!("loaded {}", script.display()),
            Err(e) => eprintln!("load failed: {e}"),
        }
    }

    run_shell(&bridge).await?;

    bridge.cleanup().await
}

/// Minimal interactive loop: one command per line, log lines interleave on
/// stdout as the delivery task drains them.
async fn run_shell(bridge: &CommandBridge) -> Result<()> {
    use tokio::io::AsyncBufReadExt;

    println!("commands: load <path> | start | pause | reset | read <addr> [width] | status | quit");
    println!("anything else is sent to the backend console verbatim");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();

        let outcome = match verb {
            "quit" | "exit" => break,
            "start" => bridge.start().await,
            "pause" => bridge.pause().await,
            "reset" => bridge.reset().await,
            "status" => {
                println!(
                    "simulation is {}",
                    if bridge.is_running() { "running" } else { "stopped" }
                );
                Ok(())
            }
            "load" => match words.next() {
                Some(path) => bridge.load(path).await,
                None => Err(Error::invalid_argument("usage: load <path>")),
            },
            "read" => read_command(bridge, words.next(), words.next()).await,
            _ => bridge.send_command(line).await.map(|_| ()),
        };

        if let Err(e) = outcome {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

async fn read_command(
    bridge: &CommandBridge,
    addr: Option<&str>,
    width: Option<&str>,
) -> Result<()> {
    let addr = addr.ok_or_else(|| Error::invalid_argument("usage: read <addr> [width]"))?;
    let addr = parse_address(addr)?;
    let width = match width {
        Some(w) => w
            .parse::<u8>()
            .map_err(|_| Error::invalid_argument(format!("invalid width: {w}")))?,
        None => 4,
    };

    let value = bridge.read_memory(addr, width).await?;
    println!("[{addr:#010x}] = {value:#x}");
    Ok(())
}

fn parse_address(raw: &str) -> Result<u64> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|_| Error::invalid_argument(format!("invalid address: {raw}")))
}
