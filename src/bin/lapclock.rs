//! lapclock - live lap timing in the terminal
//!
//! Connects to a telemetry bridge, prints the running clock and reads session
//! commands from stdin.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use lapclock::{
    BridgeConfig, JsonlLapStore, LapStore, LiveTiming, MemoryLapStore, SessionContext, SessionKind,
    TimingView, UpdateRate, format_lap_time,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "lapclock")]
#[command(about = "Live lap timing from a sim-racing telemetry bridge")]
#[command(version)]
#[command(long_about = "
lapclock connects to a telemetry bridge running next to the simulator and
shows the current lap time. The clock follows the simulator whenever it
reports a lap time and keeps ticking locally otherwise.

Commands (one per line on stdin):
  connect [host]   connect to a bridge, or reconnect to the last one
  disconnect       close the bridge connection
  start | stop     run or pause the local stopwatch
  lap              capture the current time as a lap
  reset            zero the clock and discard captured laps
  save             hand captured laps to the lap store
  quit             exit
")]
struct Cli {
    /// Bridge host or address to connect to on startup
    #[arg(long)]
    host: Option<String>,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Circuit the laps are recorded for
    #[arg(long, default_value = "unknown")]
    circuit: String,

    /// Car the laps are recorded for
    #[arg(long, default_value = "unknown")]
    car: String,

    /// Session kind (qualifying or race)
    #[arg(long, default_value_t = SessionKind::Race)]
    kind: SessionKind,

    /// Append saved laps to this JSON-lines file instead of keeping them in memory
    #[arg(long)]
    laps_file: Option<PathBuf>,

    /// URL of the page hosting this client, for the mixed-content check
    #[arg(long)]
    page_url: Option<String>,

    /// How often the status line refreshes, in Hz (0 for every update)
    #[arg(long, default_value_t = 10)]
    refresh_hz: u32,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

enum Input {
    Connect(Option<String>),
    Disconnect,
    Start,
    Stop,
    Lap,
    Reset,
    Save,
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let input = match words.next()? {
            "connect" => Input::Connect(words.next().map(str::to_string)),
            "disconnect" => Input::Disconnect,
            "start" => Input::Start,
            "stop" => Input::Stop,
            "lap" => Input::Lap,
            "reset" => Input::Reset,
            "save" => Input::Save,
            "quit" | "exit" => Input::Quit,
            _ => return None,
        };
        Some(input)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr so they don't interleave with the status line
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lapclock={log_level}").into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    if cli.host.is_some() {
        config.host = cli.host.clone();
    }
    if cli.page_url.is_some() {
        config.page_url = cli.page_url.clone();
    }

    let store: Arc<dyn LapStore> = match &cli.laps_file {
        Some(path) => {
            info!("Saving laps to {}", path.display());
            Arc::new(JsonlLapStore::new(path))
        }
        None => Arc::new(MemoryLapStore::new()),
    };

    let connect_on_start = config.host.is_some();
    let timing = LiveTiming::builder()
        .config(config)
        .lap_store(store)
        .context(SessionContext::new(&cli.circuit, &cli.car, cli.kind))
        .spawn()
        .context("starting timing session")?;

    let mut notices = timing.notices();
    tokio::spawn(async move {
        while let Some(notice) = notices.next().await {
            println!("\n{notice}");
        }
    });

    let mut views = timing.updates(UpdateRate::Max(cli.refresh_hz));
    tokio::spawn(async move {
        while let Some(view) = views.next().await {
            print!("\r{:<72}", status_line(&view));
            let _ = std::io::stdout().flush();
        }
    });

    if connect_on_start {
        // Failures surface as notices
        let _ = timing.connect(None).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(input) = Input::parse(&line) else {
            println!("\nunknown command: {}", line.trim());
            continue;
        };

        match input {
            Input::Connect(host) => {
                if let Err(e) = timing.connect(host.as_deref()).await {
                    debug!("Connect rejected: {}", e);
                }
            }
            Input::Disconnect => {
                timing.disconnect().await?;
            }
            Input::Start => {
                timing.start().await?;
            }
            Input::Stop => {
                timing.stop().await?;
            }
            Input::Lap => match timing.lap().await? {
                Some(lap) => println!("\nLap {}: {}", lap.seq, format_lap_time(lap.elapsed_ms)),
                None => println!("\nNo lap to capture"),
            },
            Input::Reset => timing.reset().await?,
            Input::Save => {
                if let Err(e) = timing.flush().await {
                    debug!("Save incomplete: {}", e);
                }
            }
            Input::Quit => break,
        }
    }

    timing.shutdown().await;
    println!();
    Ok(())
}

fn status_line(view: &TimingView) -> String {
    let best = view.best_ms.map(format_lap_time).unwrap_or_else(|| "--:--.--".to_string());
    let t = &view.telemetry;
    format!(
        "{:?} | {} {:?} | best {} | laps {} | {} km/h gear {} {} rpm",
        view.connection,
        format_lap_time(view.elapsed_ms),
        view.clock,
        best,
        view.laps.len(),
        t.speed_kmh,
        t.gear,
        t.rpm,
    )
}
