// src/acquisition/worker.rs
//! Background acquisition thread
//!
//! The worker owns the board driver for the lifetime of one stream. It reads
//! frames, mirrors each decoded sample to the sink, appends it to the shared
//! buffer and flips the start signal on the first sample. Configuration
//! commands for inline boards arrive over a channel and are applied between
//! frames. Stopping hands the driver and the sink back to the caller.

use crate::acquisition::ring_buffer::SampleBuffer;
use crate::acquisition::start_signal::{StartOutcome, StartSignal};
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::{BoardDriver, FrameStatus};
use crate::hal::types::{ConfigAck, Sample};
use crate::streaming::StreamSink;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

const ERROR_BACKOFF: Duration = Duration::from_millis(10);
const CONFIG_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct ConfigRequest {
    command: String,
    reply: Sender<BoardResult<ConfigAck>>,
}

/// Handle to a running acquisition thread
pub struct AcquisitionHandle {
    keep_alive: Arc<AtomicBool>,
    start_signal: Arc<StartSignal>,
    commands: Sender<ConfigRequest>,
    thread: JoinHandle<WorkerParts>,
}

/// What a finished worker gives back
pub struct WorkerParts {
    pub driver: Box<dyn BoardDriver>,
    pub sink: Box<dyn StreamSink>,
}

impl AcquisitionHandle {
    /// Move `driver` into a new acquisition thread. The thread gives up and
    /// reports [`StartOutcome::NoData`] if nothing decodes within
    /// `startup_timeout`.
    pub fn spawn(
        driver: Box<dyn BoardDriver>,
        buffer: Arc<SampleBuffer>,
        sink: Box<dyn StreamSink>,
        startup_timeout: Duration,
    ) -> BoardResult<Self> {
        let keep_alive = Arc::new(AtomicBool::new(true));
        let start_signal = Arc::new(StartSignal::new());
        let (commands, inbox) = channel::unbounded();

        let worker = Worker {
            driver,
            buffer,
            sink,
            keep_alive: keep_alive.clone(),
            start_signal: start_signal.clone(),
            inbox,
            startup_timeout,
        };

        let name = format!("{}-acquisition", worker.driver.kind());
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())
            .map_err(|e| BoardError::transport("spawn acquisition thread", e))?;

        Ok(Self {
            keep_alive,
            start_signal,
            commands,
            thread,
        })
    }

    /// Block until the worker reports its first sample, gives up, or
    /// `timeout` elapses
    pub fn wait_started(&self, timeout: Duration) -> Option<StartOutcome> {
        self.start_signal.wait_timeout(timeout)
    }

    /// Hand a configuration command to the worker and wait for the driver's
    /// answer
    pub fn configure(&self, command: &str) -> BoardResult<ConfigAck> {
        let (reply, answer) = channel::bounded(1);
        self.commands
            .send(ConfigRequest {
                command: command.to_string(),
                reply,
            })
            .map_err(|_| BoardError::NotRunning)?;

        match answer.recv_timeout(CONFIG_REPLY_TIMEOUT) {
            Ok(result) => result,
            Err(channel::RecvTimeoutError::Timeout) => Err(BoardError::WriteFailure(format!(
                "command {:?}: acquisition thread did not answer within {:?}",
                command, CONFIG_REPLY_TIMEOUT
            ))),
            Err(channel::RecvTimeoutError::Disconnected) => Err(BoardError::NotRunning),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Clear the keep-alive flag, join the thread and take the driver and
    /// sink back
    pub fn stop(self) -> BoardResult<WorkerParts> {
        self.keep_alive.store(false, Ordering::SeqCst);
        self.thread.join().map_err(|_| {
            error!("acquisition thread panicked");
            BoardError::transport(
                "join acquisition thread",
                std::io::Error::other("acquisition thread panicked"),
            )
        })
    }
}

struct Worker {
    driver: Box<dyn BoardDriver>,
    buffer: Arc<SampleBuffer>,
    sink: Box<dyn StreamSink>,
    keep_alive: Arc<AtomicBool>,
    start_signal: Arc<StartSignal>,
    inbox: Receiver<ConfigRequest>,
    startup_timeout: Duration,
}

impl Worker {
    fn run(mut self) -> WorkerParts {
        let kind = self.driver.kind();
        info!(board = %kind, "acquisition thread started");

        let began = Instant::now();
        let mut started = false;
        let mut frame = Vec::with_capacity(32);
        let mut decoded: u64 = 0;
        let mut malformed: u64 = 0;

        while self.keep_alive.load(Ordering::SeqCst) {
            self.apply_pending_commands();

            frame.clear();
            match self.driver.read_frame(&mut frame) {
                Ok(FrameStatus::Decoded) => {
                    for sample in frame.drain(..) {
                        self.publish(sample);
                        decoded += 1;
                    }
                    if !started {
                        started = true;
                        self.start_signal.set(StartOutcome::Started);
                        debug!(board = %kind, elapsed = ?began.elapsed(), "first sample decoded");
                    }
                }
                Ok(FrameStatus::Malformed) => {
                    malformed += 1;
                    trace!(board = %kind, "dropped malformed frame");
                }
                Ok(FrameStatus::Idle) => {}
                Err(err) => {
                    debug!(board = %kind, error = %err, "frame read failed");
                    thread::sleep(ERROR_BACKOFF);
                }
            }

            if !started && began.elapsed() >= self.startup_timeout {
                error!(board = %kind, timeout = ?self.startup_timeout, "no data received from board");
                self.start_signal.set(StartOutcome::NoData);
                break;
            }
        }

        info!(board = %kind, decoded, malformed, "acquisition thread exiting");
        WorkerParts {
            driver: self.driver,
            sink: self.sink,
        }
    }

    fn publish(&mut self, sample: Sample) {
        if let Err(err) = self.sink.push(&sample.channels, sample.timestamp) {
            warn!(error = %err, "stream sink rejected sample");
        }
        self.buffer.push(sample);
    }

    fn apply_pending_commands(&mut self) {
        loop {
            match self.inbox.try_recv() {
                Ok(request) => {
                    let result = self.driver.configure(&request.command, true);
                    // The caller may have given up waiting.
                    let _ = request.reply.send(result);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }
}
