//! `rtstt` — command-line front end for the ingestion core (spec §6).

use std::process::ExitCode;

use clap::Parser;

use rtstt_core::config::{self, AppConfig, DriverKind};
use rtstt_core::driver;
use rtstt_core::error::CoreError;
use rtstt_core::session::{ControllerEvent, SessionController};

/// Streams captured microphone audio to a speech-to-text backend over a
/// WebSocket connection.
// `config::apply_env_overrides` already implements the `RTSTT_*` env layer
// (spec §6) including keys with no CLI equivalent (reconnect backoff, VAD
// thresholds); these flags are deliberately left without clap's own `env`
// attribute so the two layers can't race on precedence for the same key.
#[derive(Parser, Debug)]
#[command(name = "rtstt", version, about)]
struct Cli {
    /// Destination WebSocket URL (ws:// or wss://).
    #[arg(long)]
    ws_url: Option<String>,

    /// Capture backend: native, portable, synthetic, or auto.
    #[arg(long, value_enum)]
    driver: Option<DriverKind>,

    /// Input device id; omit for the backend's default.
    #[arg(long)]
    device_id: Option<String>,

    /// Target sample rate in Hz.
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Number of channels; the core always downmixes to mono.
    #[arg(long)]
    channels: Option<u16>,

    /// Target chunk duration in milliseconds.
    #[arg(long)]
    chunk_ms: Option<u32>,

    /// Ring buffer capacity, in seconds of audio.
    #[arg(long)]
    buffer_seconds: Option<f32>,

    /// Enable VAD gating (bypass by default).
    #[arg(long)]
    vad_enabled: Option<bool>,

    /// Exit automatically after this many seconds (for smoke tests).
    #[arg(long)]
    test_duration: Option<u64>,

    /// Log verbosity: error, warn, info, debug, trace.
    #[arg(long, default_value = "info", env = "RTSTT_LOG_LEVEL")]
    log_level: String,

    /// List available input devices for the selected driver and exit.
    #[arg(long)]
    list_devices: bool,
}

fn build_config(cli: &Cli) -> Result<AppConfig, CoreError> {
    // Layering order (spec §6): defaults, then environment, then explicit
    // CLI flags last so they always win.
    let mut cfg = AppConfig::default();
    config::apply_env_overrides(&mut cfg).map_err(CoreError::Config)?;

    if let Some(v) = &cli.ws_url {
        cfg.ws_url = v.clone();
    }
    if let Some(v) = cli.driver {
        cfg.driver = v;
    }
    if cli.device_id.is_some() {
        cfg.device_id = cli.device_id.clone();
    }
    if let Some(v) = cli.sample_rate {
        cfg.sample_rate = v;
    }
    if let Some(v) = cli.channels {
        cfg.channels = v;
    }
    if let Some(v) = cli.chunk_ms {
        cfg.chunk_ms = v;
    }
    if let Some(v) = cli.buffer_seconds {
        cfg.buffer_seconds = v;
    }
    if let Some(v) = cli.vad_enabled {
        cfg.vad.enabled = v;
    }
    if cli.test_duration.is_some() {
        cfg.test_duration_s = cli.test_duration;
    }

    cfg.validate().map_err(CoreError::Config)?;
    Ok(cfg)
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    if cli.list_devices {
        return list_devices(&cli);
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            print_structured_failure("config", &e);
            return ExitCode::from(2);
        }
    };

    let mut controller = SessionController::new(config.clone());
    let mut events = controller
        .take_event_receiver()
        .expect("event receiver is available immediately after construction");

    if let Err(e) = controller.start().await {
        print_structured_failure("start", &e);
        return exit_code_for_start_failure(&e);
    }

    // The network task can end on its own (spec §8 scenario 5: reconnect
    // retries exhausted) with nobody ever calling `stop()`. Without this,
    // the select! below only learns about it via `last_stop_outcome()`,
    // which requires `stop()` to have already run — so a run with no
    // `--test-duration` and no SIGINT would hang forever past exhaustion
    // instead of exiting 4. `permanent_failure_tx` fires at most once.
    let (permanent_failure_tx, mut permanent_failure_rx) = tokio::sync::oneshot::channel::<()>();
    let mut permanent_failure_tx = Some(permanent_failure_tx);

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ControllerEvent::StateChanged(state) => log::info!("session state: {state:?}"),
                ControllerEvent::Reply(text) => log::debug!("reply: {text}"),
                ControllerEvent::Error(message) => log::warn!("recoverable error: {message}"),
                ControllerEvent::Stopped(rtstt_core::session::StopOutcome::PermanentFailure) => {
                    if let Some(tx) = permanent_failure_tx.take() {
                        let _ = tx.send(());
                    }
                }
                ControllerEvent::Stopped(_) => {}
            }
        }
    });

    let test_duration = config.test_duration_s.map(std::time::Duration::from_secs);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("received interrupt, stopping session");
            let _ = controller.stop().await;
            event_task.abort();
            return ExitCode::from(130);
        }
        _ = &mut permanent_failure_rx => {
            log::warn!("reconnect attempts exhausted, stopping session");
        }
        _ = async {
            match test_duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        } => {
            log::info!("test duration elapsed, stopping session");
        }
    }

    let _ = controller.stop().await;
    event_task.abort();

    match controller.last_stop_outcome() {
        Some(rtstt_core::session::StopOutcome::PermanentFailure) => {
            print_structured_failure(
                "reconnect",
                &"reconnect attempts exhausted (reconnect.max_retries)".to_string(),
            );
            ExitCode::from(4)
        }
        _ => {
            print_final_stats(&controller.stats());
            ExitCode::SUCCESS
        }
    }
}

/// Prints the final statistics snapshot on clean stop (spec §7: "on clean
/// stop it prints the final statistics snapshot"), as one line of JSON so
/// it's both human-scannable and trivially machine-parseable.
fn print_final_stats(stats: &rtstt_core::session::SessionStatsSnapshot) {
    match serde_json::to_string(stats) {
        Ok(json) => println!("{json}"),
        Err(e) => log::warn!("failed to serialize final statistics: {e}"),
    }
}

/// Prints a single-line structured failure message on unrecoverable
/// failure (spec §7: "identifying kind and cause").
fn print_structured_failure(kind: &str, cause: &impl std::fmt::Display) {
    let line = serde_json::json!({ "kind": kind, "cause": cause.to_string() });
    eprintln!("{line}");
    log::error!("{kind} failure: {cause}");
}

fn exit_code_for_start_failure(err: &CoreError) -> ExitCode {
    match err {
        CoreError::Config(_) => ExitCode::from(2),
        CoreError::Device(device_err) => {
            ExitCode::from(rtstt_core::session::device_error_exit_code(device_err) as u8)
        }
        _ => ExitCode::from(4),
    }
}

fn list_devices(cli: &Cli) -> ExitCode {
    let kind = cli.driver.unwrap_or_default();
    let built = if kind == DriverKind::Auto {
        driver::factory::build(DriverKind::Native).or_else(|_| driver::factory::build(DriverKind::Portable))
    } else {
        driver::factory::build(kind)
    };

    let built = match built {
        Ok(d) => d,
        Err(e) => {
            log::error!("could not initialize driver: {e}");
            return ExitCode::from(3);
        }
    };

    match built.enumerate_devices() {
        Ok(devices) => {
            for device in devices {
                println!(
                    "{}\t{}{}",
                    device.id,
                    device.human_name,
                    if device.is_default { "\t(default)" } else { "" }
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("failed to enumerate devices: {e}");
            ExitCode::from(3)
        }
    }
}
