use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use parking_lot::Mutex;
use ratatui::{backend::CrosstermBackend, Terminal};
use rspotify::{clients::OAuthClient, AuthCodeSpotify, Config, Token};

use tunely::auth::{self, OAuthSettings};
use tunely::backend::{signal_channel, LocalProvider, PlaybackBackend, RemoteProvider, RodioElement, SignalSender};
use tunely::config::{AppConfig, Args, RemoteMode};
use tunely::logging;
use tunely::model::{sample_tracks, BackendKind, PlaylistStore};
use tunely::remote::{ConnectDevice, DemoService, RemoteService, SpotifyClient};
use tunely::ui::{self, SharedUiState, UiController, UiState};
use tunely::{EventBus, PlaybackCoordinator};

const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const INPUT_POLL: Duration = Duration::from_millis(50);

/// Remote side of the player, as far as it could be brought up
enum RemoteSetup {
    LocalOnly,
    Demo(Arc<DemoService>),
    Spotify {
        client: SpotifyClient,
        device: ConnectDevice,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args)?;

    let _log_guard = match logging::init_logging(&config.logging) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Tunely starting ===");

    let events = EventBus::new();
    let (signals, mut signal_rx) = signal_channel();

    let element = RodioElement::new(signals.clone(), config.player.volume).context("Failed to open audio output")?;
    let local: Arc<dyn PlaybackBackend> = Arc::new(LocalProvider::new(Arc::new(element)));

    let playlist = if config.player.load_samples {
        sample_tracks(&config.player.music_dir)
    } else {
        Vec::new()
    };

    let mut coordinator =
        PlaybackCoordinator::new(local, playlist, events.clone()).with_settings(config.coordinator_settings());

    let remote_signals = signals.for_kind(BackendKind::Remote);
    let remote = setup_remote(&config, config.remote_mode(&args), &remote_signals).await;
    let device_name = config.remote.device_name.clone();

    let spotify = match &remote {
        RemoteSetup::LocalOnly => {
            tracing::info!("Running in local-only mode");
            None
        }
        RemoteSetup::Demo(service) => {
            coordinator = coordinator.with_service(service.clone());
            None
        }
        RemoteSetup::Spotify { client, device } => {
            let service: Arc<dyn RemoteService> = Arc::new(client.clone());
            coordinator = coordinator
                .with_remote(Arc::new(RemoteProvider::new(service.clone())))
                .with_service(service);
            device.announce(client.clone(), &config.connect_settings(), remote_signals.clone());
            Some(client.clone())
        }
    };

    let ui_state: SharedUiState = Arc::new(Mutex::new(UiState::new(coordinator.playlist(), config.player.volume)));
    UiState::attach(&ui_state, &events);

    let pump = coordinator.clone();
    tokio::spawn(async move {
        while let Some((kind, signal)) = signal_rx.recv().await {
            if let Err(e) = pump.handle_signal(kind, signal).await {
                tracing::debug!(backend = kind.name(), error = %e, "Signal handling failed");
            }
        }
        tracing::debug!("Signal channel closed");
    });

    if let Err(e) = coordinator.set_volume(config.player.volume).await {
        tracing::warn!(error = %e, "Could not apply initial volume");
    }

    let store = PlaylistStore::open(&config.storage.cache_dir);
    let controller = UiController::new(coordinator.clone(), ui_state.clone(), store);
    let library = controller.clone();
    tokio::spawn(async move { library.load_library().await });

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &ui_state, &controller, spotify, &device_name).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    if let Err(e) = coordinator.pause().await {
        tracing::debug!(error = %e, "Pause on exit failed");
    }
    if let RemoteSetup::Spotify { device, .. } = &remote {
        device.shutdown();
    }

    tracing::info!("Tunely shutting down");
    Ok(())
}

/// Sign in and start the Connect device. Any failure leaves the player
/// usable: with the demo catalogue when allowed, otherwise local-only.
async fn setup_remote(config: &AppConfig, mode: RemoteMode, signals: &SignalSender) -> RemoteSetup {
    match mode {
        RemoteMode::Disabled => RemoteSetup::LocalOnly,
        RemoteMode::Demo => RemoteSetup::Demo(Arc::new(DemoService::new(&config.player.music_dir))),
        RemoteMode::Spotify => match connect_spotify(config, signals).await {
            Ok((client, device)) => RemoteSetup::Spotify { client, device },
            Err(e) if config.remote.demo_fallback => {
                tracing::warn!(error = ?e, "Spotify unavailable, falling back to demo mode");
                RemoteSetup::Demo(Arc::new(DemoService::new(&config.player.music_dir)))
            }
            Err(e) => {
                tracing::warn!(error = ?e, "Spotify unavailable, continuing with local playback");
                RemoteSetup::LocalOnly
            }
        },
    }
}

async fn connect_spotify(config: &AppConfig, signals: &SignalSender) -> Result<(SpotifyClient, ConnectDevice)> {
    let oauth = OAuthSettings::from_config(config);
    let auth_result = auth::perform_oauth_flow(&oauth).await?;

    let rspotify_client = setup_rspotify(auth_result.rspotify_token.clone()).await?;
    let user = rspotify_client.me().await.context("rspotify authentication failed")?;
    tracing::info!(user_id = %user.id, "rspotify authorized successfully");

    let client = SpotifyClient::new(
        rspotify_client,
        oauth,
        auth_result.refresh_token.clone(),
        auth_result.rspotify_token.expires_at,
    );
    let device = ConnectDevice::start(auth_result, &config.connect_settings(), signals.clone()).await?;
    tracing::info!(device = device.device_name(), user = %device.username(), "Connect device started");

    Ok((client, device))
}

async fn setup_rspotify(access_token: Token) -> Result<AuthCodeSpotify> {
    let spotify = AuthCodeSpotify::with_config(
        Default::default(),
        Default::default(),
        Config {
            token_cached: false,
            token_refreshing: false,
            ..Default::default()
        },
    );

    match spotify.token.lock().await {
        Ok(mut guard) => *guard = Some(access_token),
        Err(_) => anyhow::bail!("rspotify token lock poisoned"),
    }
    tracing::debug!("rspotify client initialized");
    Ok(spotify)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ui_state: &SharedUiState,
    controller: &UiController,
    spotify: Option<SpotifyClient>,
    device_name: &str,
) -> io::Result<()> {
    let mut last_token_check = Instant::now();

    loop {
        if last_token_check.elapsed() >= TOKEN_CHECK_INTERVAL {
            last_token_check = Instant::now();
            if let Some(spotify) = spotify.clone() {
                tokio::spawn(async move {
                    if let Err(e) = spotify.refresh_token_if_needed().await {
                        tracing::warn!(error = %e, "Token refresh check failed");
                    }
                });
            }
        }

        ui_state.lock().expire_notification(Instant::now());
        let snapshot = ui_state.lock().clone();
        terminal.draw(|f| ui::render(f, &snapshot, device_name))?;

        if event::poll(INPUT_POLL)? {
            if let Event::Key(key) = event::read()? {
                controller.handle_key_event(key);
            }
        }

        if controller.should_quit() {
            break;
        }
    }

    Ok(())
}
