use std::path::Path;
use std::sync::Arc;

use log::{error, info, warn};

use space_ambient::audio::{CpalSinkFactory, PlaybackEngine, SymphoniaDecoder, TrackStore};
use space_ambient::cli::CliApp;
use space_ambient::config::AmbientConfig;
use space_ambient::coordination::Coordination;
use space_ambient::error::{AudioError, PlayerError};
use space_ambient::host::HostLoop;
use space_ambient::logging::AudioLogger;
use space_ambient::monitor::kwin::is_kde_session;
use space_ambient::monitor::{
    ActivityMonitor, KWinWindowEnumerator, MediaShortcutListener, NoWindowEnumerator, PactlMixer,
    WindowEnumerator,
};

fn main() -> Result<(), PlayerError> {
    let cli = CliApp::parse();

    if let Err(e) = AudioLogger::init(cli.log_level.as_deref()) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    run(cli).inspect_err(display_startup_error)
}

fn run(cli: CliApp) -> Result<(), PlayerError> {
    let config_path = cli.config_path();
    let mut config = AmbientConfig::load(config_path.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;

    // Must happen before any thread exists; the sound server reads it when our stream connects
    announce_stream_properties(&config);

    let store = Arc::new(load_catalog(&config.track_directory)?);
    let coordination = Coordination::new();
    let logger = AudioLogger::new();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| AudioError::InitializationFailed(format!("Failed to build host loop: {}", e)))?;

    let monitor_settings = config.monitor_settings();
    let desktop_integration = config.desktop_integration && is_kde_session();
    let windows: Box<dyn WindowEnumerator> = if desktop_integration {
        Box::new(KWinWindowEnumerator::new(monitor_settings.query_timeout))
    } else {
        info!("KDE desktop integration off: no window report, no media shortcut");
        Box::new(NoWindowEnumerator)
    };
    let monitor = ActivityMonitor::new(
        windows,
        Box::new(PactlMixer::new().with_timeout(monitor_settings.query_timeout)),
        &monitor_settings,
        coordination.clone(),
        logger.clone(),
    );
    let mut host = HostLoop::new(monitor, coordination.clone(), &monitor_settings);

    // Stay silent until the desktop has been checked once
    if host.check_now() {
        info!("Other audio already playing, starting paused");
    }

    let signal_coordination = coordination.clone();
    let wake = host.wake_handle();
    ctrlc::set_handler(move || {
        signal_coordination.request_shutdown();
        wake.wake();
    })
    .map_err(|e| AudioError::InitializationFailed(format!("Failed to install signal handler: {}", e)))?;

    let engine = PlaybackEngine::new(
        store,
        Box::new(SymphoniaDecoder::new()),
        Box::new(CpalSinkFactory::new(config.sink_settings())),
        coordination.clone(),
        config.engine_timings(),
        logger,
    );
    let handle = engine
        .spawn()
        .map_err(|e| AudioError::InitializationFailed(format!("Failed to start playback thread: {}", e)))?;

    info!("{} running", config.application_name);
    runtime.block_on(async {
        if desktop_integration {
            let listener = MediaShortcutListener::new(host.wake_handle());
            tokio::spawn(async move {
                if let Err(e) = listener.listen().await {
                    warn!("{}", e.user_message());
                }
            });
        }
        host.run().await
    });

    coordination.request_shutdown();
    if handle.join().is_err() {
        error!("Playback thread panicked");
    }
    info!("{} stopped", config.application_name);
    Ok(())
}

fn load_catalog(dir: &Path) -> Result<TrackStore, PlayerError> {
    let store = TrackStore::load_directory(dir)?;
    if store.is_empty() {
        warn!("No ambient tracks found in {}", dir.display());
    }
    Ok(store)
}

fn announce_stream_properties(config: &AmbientConfig) {
    let props = format!(
        "application.name='{}' media.role='{}'",
        config.application_name, config.stream_role
    );
    std::env::set_var("PULSE_PROP", props);
}

fn display_startup_error(err: &PlayerError) {
    eprintln!("{}: {}", err.severity().as_str(), err.user_message());
    if err.is_recoverable() {
        eprintln!("The condition may clear on its own; starting again can succeed.");
    }
    let suggestions = err.recovery_suggestions();
    if !suggestions.is_empty() {
        eprintln!("Suggestions:");
        for suggestion in suggestions {
            eprintln!("  - {}", suggestion);
        }
    }
}
