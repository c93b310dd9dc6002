//! rodio-backed media element
//!
//! rodio's output stream is not `Send`, so a dedicated thread owns the stream
//! and the sink. The element talks to it over a command channel and reads a
//! shared status snapshot that the thread refreshes on every tick.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;

use crate::error::{PlayerError, Result};

use super::{BackendSignal, MediaElement, SignalSender};

const TICK: Duration = Duration::from_millis(250);

enum Command {
    Load {
        src: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Play {
        reply: oneshot::Sender<Result<()>>,
    },
    Pause,
    Seek(f64),
    Volume(f64),
}

#[derive(Clone, Copy, Debug)]
struct Status {
    current_time: f64,
    duration: Option<f64>,
    volume: f64,
}

pub struct RodioElement {
    commands: std_mpsc::Sender<Command>,
    status: Arc<Mutex<Status>>,
}

impl RodioElement {
    /// Open the default output device on a dedicated audio thread
    pub fn new(signals: SignalSender, initial_volume: f64) -> anyhow::Result<Self> {
        let (commands, command_rx) = std_mpsc::channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);
        let status = Arc::new(Mutex::new(Status {
            current_time: 0.0,
            duration: None,
            volume: initial_volume,
        }));

        let thread_status = status.clone();
        thread::Builder::new()
            .name("tunely-audio".into())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                AudioThread {
                    _stream: stream,
                    handle,
                    sink: None,
                    playing: false,
                    status: thread_status,
                    signals,
                }
                .run(command_rx);
            })
            .context("Failed to spawn audio thread")?;

        ready_rx
            .recv()
            .context("Audio thread exited during startup")?
            .map_err(|e| anyhow::anyhow!("No audio output device: {e}"))?;

        tracing::info!("Local audio output ready");
        Ok(Self { commands, status })
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlayerError::Playback("audio thread has stopped".into()))
    }

    async fn request(&self, build: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await
            .map_err(|_| PlayerError::Playback("audio thread dropped request".into()))?
    }
}

#[async_trait]
impl MediaElement for RodioElement {
    async fn load(&self, src: &str) -> Result<()> {
        let src = src.to_string();
        self.request(|reply| Command::Load { src, reply }).await
    }

    async fn play(&self) -> Result<()> {
        self.request(|reply| Command::Play { reply }).await
    }

    fn pause(&self) {
        let _ = self.send(Command::Pause);
    }

    fn current_time(&self) -> f64 {
        self.status.lock().current_time
    }

    fn set_current_time(&self, seconds: f64) {
        self.status.lock().current_time = seconds;
        let _ = self.send(Command::Seek(seconds));
    }

    fn duration(&self) -> Option<f64> {
        self.status.lock().duration
    }

    fn volume(&self) -> f64 {
        self.status.lock().volume
    }

    fn set_volume(&self, level: f64) {
        let _ = self.send(Command::Volume(level));
    }
}

struct AudioThread {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    playing: bool,
    status: Arc<Mutex<Status>>,
    signals: SignalSender,
}

impl AudioThread {
    fn run(mut self, commands: std_mpsc::Receiver<Command>) {
        loop {
            match commands.recv_timeout(TICK) {
                Ok(command) => self.handle(command),
                Err(std_mpsc::RecvTimeoutError::Timeout) => self.tick(),
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("Audio thread exiting");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Load { src, reply } => {
                let _ = reply.send(self.load(&src));
            }
            Command::Play { reply } => {
                let result = match &self.sink {
                    Some(sink) => {
                        sink.play();
                        self.playing = true;
                        Ok(())
                    }
                    None => Err(PlayerError::Playback("no source loaded".into())),
                };
                let _ = reply.send(result);
            }
            Command::Pause => {
                if let Some(sink) = &self.sink {
                    sink.pause();
                }
                self.playing = false;
            }
            Command::Seek(seconds) => {
                if let Some(sink) = &self.sink {
                    if let Err(e) = sink.try_seek(Duration::from_secs_f64(seconds.max(0.0))) {
                        tracing::warn!(error = %e, seconds, "Seek failed");
                        self.signals.send(BackendSignal::Error(format!("seek failed: {e}")));
                    }
                }
                self.publish_position();
            }
            Command::Volume(level) => {
                if let Some(sink) = &self.sink {
                    sink.set_volume(level as f32);
                }
                self.status.lock().volume = level;
                self.signals.send(BackendSignal::Volume(level));
            }
        }
    }

    fn load(&mut self, src: &str) -> Result<()> {
        let file = File::open(src).map_err(|e| PlayerError::load(src, e.to_string()))?;
        let source = Decoder::new(BufReader::new(file)).map_err(|e| PlayerError::load(src, e.to_string()))?;
        let duration = source.total_duration().map(|d| d.as_secs_f64());

        // A fresh sink per source drops whatever was queued before.
        let sink = Sink::try_new(&self.handle).map_err(|e| PlayerError::load(src, e.to_string()))?;
        sink.pause();
        sink.set_volume(self.status.lock().volume as f32);
        sink.append(source);

        self.sink = Some(sink);
        self.playing = false;
        {
            let mut status = self.status.lock();
            status.current_time = 0.0;
            status.duration = duration;
        }
        tracing::debug!(src, ?duration, "Decoded local source");
        Ok(())
    }

    fn tick(&mut self) {
        if !self.playing {
            return;
        }
        let Some(sink) = &self.sink else { return };

        if sink.empty() {
            self.playing = false;
            let mut status = self.status.lock();
            if let Some(duration) = status.duration {
                status.current_time = duration;
            }
            drop(status);
            self.signals.send(BackendSignal::Ended);
            return;
        }
        self.publish_position();
    }

    fn publish_position(&self) {
        let Some(sink) = &self.sink else { return };
        let current = sink.get_pos().as_secs_f64();
        let duration = {
            let mut status = self.status.lock();
            status.current_time = current;
            status.duration.unwrap_or(0.0)
        };
        self.signals.send(BackendSignal::Position { current, duration });
    }
}
