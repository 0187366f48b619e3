use cabinet_bridge::config::BridgeConfig;
use cabinet_bridge::events::{HostSoundPlayer, SoundPlayer};
use cabinet_bridge::gamepad::{ButtonPress, PollerHandle, PollerSettings};
use cabinet_bridge::host::{forward_to_host, HostApi, HostConsoleLayer};
use cabinet_bridge::overlay::HeadlessSurfaces;
use cabinet_bridge::rpc::CallCorrelator;
use cabinet_bridge::session::WindowSession;
use cabinet_bridge::transport::WsTransport;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let console_lines = setup()?;

    let config = load_config().await?;
    info!(
        "Starting window {} against {}",
        config.host.window, config.host.url
    );

    let (transport, channel) = WsTransport::spawn(config.transport_settings());
    let transport = Arc::new(transport);
    let correlator = Arc::new(CallCorrelator::with_timeout(
        transport.clone(),
        config.call_timeout(),
    ));

    tokio::spawn(forward_to_host(
        HostApi::new(correlator.clone()),
        console_lines,
    ));

    let sound: Arc<dyn SoundPlayer> = Arc::new(HostSoundPlayer::new(HostApi::new(
        correlator.clone(),
    )));
    let session = WindowSession::new(
        config.clone(),
        correlator,
        Arc::new(HeadlessSurfaces::default()),
        Some(sound),
    );

    let (press_tx, press_rx) = mpsc::unbounded_channel();
    if config.gamepad.enabled {
        let settings = PollerSettings {
            frame_interval: config.frame_interval(),
        };
        tokio::spawn(start_poller_when_primary(
            session.clone(),
            settings,
            press_tx,
        ));
    } else {
        drop(press_tx);
    }

    tokio::select! {
        _ = session.clone().run(channel, press_rx) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|e| eyre!("Failed to listen for ctrl-c: {}", e))?;
            info!("Interrupted");
        }
    }

    transport.shutdown();
    info!("Window {} stopped", session.window_name());
    Ok(())
}

/// Only the primary window reads the gamepads. Which window that is comes from
/// the host's answer in the first ready sequence, not from the config.
async fn start_poller_when_primary(
    session: Arc<WindowSession>,
    settings: PollerSettings,
    press_tx: mpsc::UnboundedSender<ButtonPress>,
) -> Option<PollerHandle> {
    let mut primary = session.subscribe_primary();
    if primary.wait_for(|p| *p == Some(true)).await.is_err() {
        return None;
    }

    match PollerHandle::spawn(settings, session.gate().clone(), press_tx) {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Continuing without gamepad input: {}", e);
            None
        }
    }
}

fn setup() -> Result<mpsc::UnboundedReceiver<String>> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    Ok(setup_logging_env())
}

/// Pretty terminal output plus the host console relay. Returns the relay's
/// queue, drained once the host link exists.
fn setup_logging_env() -> mpsc::UnboundedReceiver<String> {
    let (console, lines) = HostConsoleLayer::new();
    tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .pretty(),
        )
        .with(console)
        .init();
    lines
}

/// First argument overrides the config location
async fn load_config() -> Result<BridgeConfig> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(BridgeConfig::default_path);
    info!("Using config {}", path.display());

    BridgeConfig::load_or_create(&path)
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))
}
