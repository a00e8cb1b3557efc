//! Maestro - interactive playback session shell
//!
//! Drives the session library end to end against the simulated engine:
//! typed commands stand in for touch gestures, camera labels, and voice
//! transcripts, and session events print as they arrive.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use async_trait::async_trait;
use maestro::config::{Config, Tuning};
use maestro::engine::SimulatedEngine;
use maestro::events::{EventBus, SessionEvent};
use maestro::input::{
    Command, ControlSignal, GestureSampler, NormalizedInput, ScriptedRecognizer,
    SpeechSynthesizer, TouchEvent, TouchNormalizer, VoiceControl, VoiceError, VoicePipeline,
};
use maestro::playback::{PlaybackSession, SessionHandle, Track};

/// Command-line arguments for maestro
#[derive(Parser, Debug)]
#[command(name = "maestro")]
#[command(about = "Multi-modal playback session shell")]
#[command(version)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "MAESTRO_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, env = "MAESTRO_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = match &args.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(format!("maestro={}", level)),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "maestro=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Maestro v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = match &args.config {
        Some(path) => Config::load(path)
            .await
            .context("Failed to load configuration")?,
        None => Config::default(),
    };

    let engine = Arc::new(SimulatedEngine::new());
    let tracks = demo_tracks();
    for track in &tracks {
        engine.add_track(&track.uri, demo_duration_ms(&track.id)).await;
    }

    let bus = EventBus::new(config.tuning.event_capacity);
    spawn_event_printer(&bus);

    let session = PlaybackSession::spawn(engine.clone(), bus.clone(), config.tuning.clone());
    session
        .open(tracks, 0)
        .await
        .context("Failed to open the demo queue")?;

    let (input_tx, mut input_rx) = mpsc::channel::<NormalizedInput>(16);
    let typed = Arc::new(TypedVoice::default());
    let voice = VoiceControl::new(
        typed.clone(),
        Arc::new(ConsoleSpeech),
        session.clone(),
        bus.clone(),
        &config.tuning,
    );

    let mut shell = Shell {
        session: session.clone(),
        touch: TouchNormalizer::new(&config.tuning),
        voice,
        typed,
        recognizer: Arc::new(ScriptedRecognizer::new()),
        bus,
        tuning: config.tuning,
        input_tx,
        sampler_cancel: None,
    };

    print_help();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !shell.handle_line(line.trim()).await? {
                        break;
                    }
                }
                None => break,
            },
            Some(outcome) = input_rx.recv() => {
                if !shell.route(Some(outcome)).await? {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    shell.camera_off();
    session.close().await?;
    info!("Session closed");
    Ok(())
}

/// Interactive shell state: the session handle plus one driver per modality
struct Shell {
    session: SessionHandle,
    touch: TouchNormalizer,
    voice: VoiceControl,
    typed: Arc<TypedVoice>,
    recognizer: Arc<ScriptedRecognizer>,
    bus: EventBus,
    tuning: Tuning,
    input_tx: mpsc::Sender<NormalizedInput>,
    sampler_cancel: Option<CancellationToken>,
}

impl Shell {
    /// Parse one typed line; returns false when the shell should exit
    async fn handle_line(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(command) => command,
            None => return Ok(true),
        };

        match command {
            "tap" => return self.route(self.touch.normalize(TouchEvent::Tap)).await,
            "hold" => {
                return self
                    .route(self.touch.normalize(TouchEvent::LongPress))
                    .await
            }
            "swipe" => {
                let event = match parts.next() {
                    Some("left") => Some(TouchEvent::PanEnd { dx: -120.0, dy: 0.0 }),
                    Some("right") => Some(TouchEvent::PanEnd { dx: 120.0, dy: 0.0 }),
                    _ => {
                        println!("usage: swipe left|right");
                        None
                    }
                };
                if let Some(event) = event {
                    return self.route(self.touch.normalize(event)).await;
                }
            }
            "pan" => match parts.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(dy) => {
                    return self
                        .route(self.touch.normalize(TouchEvent::PanUpdate { dx: 0.0, dy }))
                        .await
                }
                None => println!("usage: pan <dy-px>  (negative pans up and raises volume)"),
            },
            "pinch" => return self.route(self.touch.normalize(TouchEvent::PinchEnd)).await,
            "camera" => match parts.next() {
                Some("on") => self.camera_on(),
                Some("off") => self.camera_off(),
                Some(label) => self.recognizer.push(label).await,
                None => println!("usage: camera on|off|<label>"),
            },
            "say" => {
                let text = parts.collect::<Vec<_>>().join(" ");
                self.voice_round(text).await;
            }
            "seek" => match parts.next().and_then(|v| v.parse::<u64>().ok()) {
                Some(position_ms) => self.apply(Command::SeekTo(position_ms)).await,
                None => println!("usage: seek <ms>"),
            },
            "vol" => match parts.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(percent) => self.apply(Command::SetVolume(percent / 100.0)).await,
                None => println!("usage: vol <0..100>"),
            },
            "status" => self.print_status().await?,
            "help" => print_help(),
            "quit" | "exit" => return Ok(false),
            other => println!("Unknown command '{}' (help lists them)", other),
        }
        Ok(true)
    }

    /// Dispatch a normalized input; returns false on an Exit signal
    async fn route(&mut self, outcome: Option<NormalizedInput>) -> Result<bool> {
        match outcome {
            Some(NormalizedInput::Playback(command)) => {
                self.apply(command).await;
                Ok(true)
            }
            Some(NormalizedInput::Control(ControlSignal::ShowDetails)) => {
                self.show_details().await?;
                Ok(true)
            }
            Some(NormalizedInput::Control(ControlSignal::DisableGestureInput)) => {
                self.camera_off();
                Ok(true)
            }
            Some(NormalizedInput::Control(ControlSignal::Exit)) => Ok(false),
            None => Ok(true),
        }
    }

    async fn apply(&self, command: Command) {
        if let Err(e) = self.session.apply(command).await {
            println!("error: {}", e);
        }
    }

    fn camera_on(&mut self) {
        if self.sampler_cancel.is_some() {
            println!("Camera gestures already on");
            return;
        }
        let sampler = GestureSampler::new(
            self.recognizer.clone(),
            self.input_tx.clone(),
            self.bus.clone(),
            &self.tuning,
        );
        self.sampler_cancel = Some(sampler.cancellation_token());
        sampler.spawn();
        println!("Camera gestures on (try: camera wave_right)");
    }

    fn camera_off(&mut self) {
        if let Some(cancel) = self.sampler_cancel.take() {
            cancel.cancel();
            println!("Camera gestures off");
        }
    }

    async fn voice_round(&self, text: String) {
        if !text.is_empty() {
            self.typed.set(text).await;
        }
        println!("Listening...");
        if let Err(e) = self.voice.listen_once().await {
            println!("voice: {}", e);
        }
    }

    async fn print_status(&self) -> Result<()> {
        let snapshot = self.session.snapshot().await?;
        println!(
            "state: {:?}  shuffle: {}  repeat: {:?}  volume: {:.0}%",
            snapshot.state,
            if snapshot.shuffled { "on" } else { "off" },
            snapshot.repeat,
            snapshot.volume * 100.0
        );
        if let Some(track) = &snapshot.track {
            println!(
                "track {}/{}: {} by {}  [{} / {} ms]",
                snapshot.queue_index.map(|i| i + 1).unwrap_or(0),
                snapshot.queue_len,
                track.name,
                track.artist_name,
                snapshot.position_ms,
                snapshot.duration_ms
            );
        }
        Ok(())
    }

    async fn show_details(&self) -> Result<()> {
        let snapshot = self.session.snapshot().await?;
        match snapshot.track {
            Some(track) => {
                println!("Track:  {}", track.name);
                println!("Artist: {}", track.artist_name);
                if let Some(art) = &track.album_image_uri {
                    println!("Art:    {}", art);
                }
                println!("At:     {} / {} ms", snapshot.position_ms, snapshot.duration_ms);
            }
            None => println!("Nothing open"),
        }
        Ok(())
    }
}

/// Voice pipeline fed by typed text instead of a microphone
#[derive(Default)]
struct TypedVoice {
    transcript: Mutex<Option<String>>,
}

impl TypedVoice {
    async fn set(&self, text: String) {
        *self.transcript.lock().await = Some(text);
    }
}

#[async_trait]
impl VoicePipeline for TypedVoice {
    async fn start_capture(&self) -> std::result::Result<(), VoiceError> {
        Ok(())
    }

    async fn finish_capture(&self) -> std::result::Result<String, VoiceError> {
        match self.transcript.lock().await.take() {
            Some(text) => Ok(text),
            None => Err(VoiceError::Transcription("nothing captured".to_string())),
        }
    }
}

/// Prints spoken feedback to the terminal
struct ConsoleSpeech;

#[async_trait]
impl SpeechSynthesizer for ConsoleSpeech {
    async fn speak(&self, text: &str) {
        println!("speech: \"{}\"", text);
    }
}

fn spawn_event_printer(bus: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::QueueOpened { length, .. } => println!("Queue opened: {} tracks", length),
        SessionEvent::TrackStarted { track, index, .. } => {
            println!("> [{}] {} by {}", index + 1, track.name, track.artist_name)
        }
        SessionEvent::StateChanged { new_state, .. } => println!("state: {:?}", new_state),
        SessionEvent::VolumeChanged { new_volume, .. } => {
            println!("volume: {:.0}%", new_volume * 100.0)
        }
        SessionEvent::ShuffleChanged { enabled, .. } => {
            println!("shuffle: {}", if *enabled { "on" } else { "off" })
        }
        SessionEvent::RepeatChanged { mode, .. } => println!("repeat: {:?}", mode),
        SessionEvent::QueueEnded { .. } => println!("Queue finished"),
        SessionEvent::ModalityDisabled { modality, reason, .. } => {
            println!("{:?} input disabled: {}", modality, reason)
        }
        SessionEvent::Feedback { message, .. } => println!("feedback: {}", message),
        // Progress ticks would swamp the terminal
        SessionEvent::Progress { .. } => {}
    }
}

fn demo_tracks() -> Vec<Track> {
    [
        ("Driftwood", "Orchard Lane"),
        ("Glass Harbor", "Midnight Caravan"),
        ("Northern Line", "Copper Crows"),
        ("Salt and Static", "Vera Moss"),
        ("Last Orbit", "Echo District"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (name, artist))| Track {
        id: format!("demo-{}", i + 1),
        uri: format!("demo://track/{}", i + 1),
        name: name.to_string(),
        artist_name: artist.to_string(),
        album_image_uri: Some(format!("demo://art/{}", i + 1)),
    })
    .collect()
}

/// Demo durations, varied so completion behavior is easy to watch
fn demo_duration_ms(track_id: &str) -> u64 {
    match track_id {
        "demo-1" => 24_000,
        "demo-2" => 31_000,
        "demo-3" => 19_000,
        "demo-4" => 27_000,
        _ => 35_000,
    }
}

fn print_help() {
    println!("Touch:");
    println!("  tap               toggle play/pause");
    println!("  hold              restart current track");
    println!("  swipe left|right  next / previous track");
    println!("  pan <dy-px>       volume (negative pans up, louder)");
    println!("  pinch             show track details");
    println!("Camera:");
    println!("  camera on|off     start/stop gesture sampling");
    println!("  camera <label>    queue a label: wave_left wave_right thumbs_up");
    println!("                    three_fingers open_palm two_fingers");
    println!("Voice:");
    println!("  say <text>        run a voice round with this transcript");
    println!("  say               run a voice round that hears nothing");
    println!("Other:");
    println!("  seek <ms> / vol <0..100> / status / help / quit");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
