//! CCTV console — entry point.
//!
//! ```text
//! cctv-console                    Run with defaults
//! cctv-console --config <path>    Use custom config TOML
//! cctv-console --video <dir>      Play frames from <dir>
//! cctv-console --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use cctv_core::{DisplayRegistry, SnapshotClient, StreamingController, TransportChannel};

use cctv_console::config::ConsoleConfig;
use cctv_console::console::{Command, render_report, status_line, write_results};
use cctv_console::footage::load_footage;
use cctv_console::sink::{FileSink, run_render_loop};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cctv-console", about = "CCTV frame-streaming console")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "cctv-console.toml")]
    config: PathBuf,

    /// Backend WebSocket endpoint (overrides config). Example: ws://10.0.0.5:8000/ws/video
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory of frames to play (overrides config).
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ConsoleConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ConsoleConfig::load(&cli.config);
    if let Some(endpoint) = cli.endpoint {
        config.stream.endpoint = endpoint;
    }
    if let Some(dir) = cli.video {
        config.source.frames_dir = dir;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("cctv-console v{}", env!("CARGO_PKG_VERSION"));
    config.stream.validate()?;

    // ── 1. Load the footage ─────────────────────────────────────

    let source = Arc::new(load_footage(
        &config.source.frames_dir,
        config.source.fps,
        config.source.looping,
    )?);
    if source.is_empty() {
        warn!(
            "no frames in {}; nothing will be streamed",
            config.source.frames_dir.display()
        );
    }

    // ── 2. Connect and start the pipeline ───────────────────────

    let (channel, events) = TransportChannel::connect(&config.stream.endpoint);
    info!(endpoint = channel.endpoint(), "streaming to backend");
    let controller = StreamingController::spawn(
        &config.stream,
        source.clone(),
        channel,
        events,
        DisplayRegistry::new(),
    );

    let render_task = tokio::spawn(run_render_loop(
        controller.render_view(),
        FileSink::new(&config.render.output_path),
    ));

    let snaps = SnapshotClient::new(&config.query.snaps_url);
    debug!(url = snaps.url(), "snapshot endpoint");

    // ── 3. Command loop ─────────────────────────────────────────

    println!("commands: play | pause | query <text> | status | quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin error: {e}");
                break;
            }
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };

        match command {
            Command::Play => {
                source.play();
                controller.start();
            }
            Command::Pause => {
                source.pause();
                controller.stop();
            }
            Command::Query(text) => {
                let snaps = snaps.clone();
                let results_dir = config.query.results_dir.clone();
                tokio::spawn(async move {
                    let saved = match snaps.fetch(&text).await {
                        Ok(frames) => write_results(&results_dir, &frames),
                        Err(e) => Err(e),
                    };
                    match saved {
                        Ok(saved) => print!("{}", render_report(&text, &saved)),
                        Err(e) => error!("query failed: {e}"),
                    }
                });
            }
            Command::Status => {
                println!(
                    "{}",
                    status_line(
                        controller.session(),
                        controller.connection_state(),
                        &controller.stats()
                    )
                );
            }
            Command::Quit => break,
        }
    }

    // ── 4. Shutdown ─────────────────────────────────────────────

    info!("shutting down");
    controller.shutdown().await;
    match render_task.await {
        Ok(Ok(sink)) => info!(frames = sink.frames_written(), "render sink closed"),
        Ok(Err(e)) | Err(e) => warn!("render task failed: {e}"),
    }

    Ok(())
}
