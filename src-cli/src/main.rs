mod config;

use clap::Parser;
use config::{load_config, OutputFormat};
use crossbeam_channel::{bounded, select, Sender};
use screenwatch_core::{
    EventSink, ManualSignalSource, NotificationKind, PowerState, SignalSource,
    SubscriptionBridge,
};
use screenwatch_platform::{ChannelSink, SysfsSignalSource};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

/// Stream display power events (ON / OFF) to stdout.
#[derive(Debug, Parser)]
#[command(name = "screenwatch", version)]
struct Args {
    /// Config file (JSON). Defaults to <config_dir>/screenwatch/config.json.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format, overrides the config file.
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Read raw notification actions (e.g. `screen_off`) from stdin instead of sysfs.
    #[arg(long)]
    stdin: bool,
}

#[derive(serde::Serialize)]
struct EventLine<'a> {
    channel: &'a str,
    state: PowerState,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "screenwatch=info,screenwatch_core=info,screenwatch_platform=info".into()
            }),
        )
        .try_init();
}

fn emit(format: OutputFormat, channel: &str, state: PowerState) {
    match format {
        OutputFormat::Text => println!("{}", state),
        OutputFormat::Json => match serde_json::to_string(&EventLine { channel, state }) {
            Ok(line) => println!("{}", line),
            Err(error) => warn!(?error, "Failed to encode event"),
        },
    }
}

/// Feed stdin lines into `source` until EOF, then request shutdown.
fn spawn_stdin_reader(source: Arc<ManualSignalSource>, shutdown_tx: Sender<()>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => {
                    source.raise(NotificationKind::from_action(&line));
                }
                Err(error) => {
                    error!(?error, "stdin read failed");
                    break;
                }
            }
        }
        info!("stdin closed");
        let _ = shutdown_tx.try_send(());
    });
}

fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load config");
            return ExitCode::FAILURE;
        }
    };
    let format = args.format.unwrap_or(config.format);

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

    let source: Arc<dyn SignalSource> = if args.stdin {
        let manual = Arc::new(ManualSignalSource::new());
        spawn_stdin_reader(manual.clone(), shutdown_tx.clone());
        manual
    } else {
        Arc::new(SysfsSignalSource::new(config.source.clone()))
    };

    let ctrlc_tx = shutdown_tx.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        let _ = ctrlc_tx.try_send(());
    }) {
        warn!(?error, "Failed to install Ctrl-C handler");
    }

    let mut bridge = SubscriptionBridge::new(config.channel.clone(), source);
    let (sink, event_rx) = ChannelSink::bounded(64);
    let sink: Arc<dyn EventSink> = sink;

    if let Err(err) = bridge.on_attach(&sink) {
        warn!(error = %err, "Attached without an active observer");
    }
    info!(channel = bridge.channel(), stdin = args.stdin, "screenwatch running");

    loop {
        select! {
            recv(event_rx) -> event => match event {
                Ok(state) => emit(format, bridge.channel(), state),
                Err(_) => break,
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    bridge.on_teardown();
    // Events delivered before teardown are still queued.
    for state in event_rx.try_iter() {
        emit(format, bridge.channel(), state);
    }

    info!("screenwatch stopped");
    ExitCode::SUCCESS
}
