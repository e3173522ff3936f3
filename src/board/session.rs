// src/board/session.rs
//! Session controller: the lifecycle state machine shared by every model
//!
//! A [`Board`] wraps one [`BoardDriver`]. Lifecycle calls are serialized by
//! the session lock. The sample buffer sits behind its own lock so data
//! retrieval never waits on a slow prepare or stop.

use crate::acquisition::{reshape, AcquisitionHandle, SampleBuffer, StartOutcome, WorkerParts};
use crate::board::registry::{InstanceRegistry, RegistryToken};
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::{BoardDriver, ConfigPolicy};
use crate::hal::types::{BoardDescriptor, BoardKind, BoardState, ConfigAck};
use crate::streaming::{resolve_sink, StreamSink};
use ndarray::Array2;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One board and its session
pub struct Board {
    kind: BoardKind,
    channel_count: usize,
    policy: ConfigPolicy,
    registry: InstanceRegistry,
    session: Mutex<Session>,
    buffer: RwLock<Option<Arc<SampleBuffer>>>,
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("kind", &self.kind)
            .field("channel_count", &self.channel_count)
            .finish_non_exhaustive()
    }
}

struct Session {
    state: BoardState,
    /// `None` while the driver is on loan to the acquisition thread
    driver: Option<Box<dyn BoardDriver>>,
    worker: Option<AcquisitionHandle>,
    slot: Option<RegistryToken>,
}

impl Board {
    pub fn new(driver: Box<dyn BoardDriver>, registry: InstanceRegistry) -> Self {
        Self {
            kind: driver.kind(),
            channel_count: driver.channel_count(),
            policy: driver.config_policy(),
            registry,
            session: Mutex::new(Session {
                state: BoardState::Unprepared,
                driver: Some(driver),
                worker: None,
                slot: None,
            }),
            buffer: RwLock::new(None),
        }
    }

    pub fn kind(&self) -> BoardKind {
        self.kind
    }

    pub fn descriptor(&self) -> BoardDescriptor {
        self.kind.descriptor()
    }

    pub fn state(&self) -> BoardState {
        self.session.lock().state
    }

    /// Open the transport and run the model handshake. A no-op when the
    /// session is already prepared.
    pub fn prepare_session(&self) -> BoardResult<()> {
        let mut session = self.session.lock();
        if session.state.is_prepared() {
            debug!(board = %self.kind, "session already prepared");
            return Ok(());
        }

        let slot = self.registry.acquire(self.kind)?;
        let driver = session
            .driver
            .as_mut()
            .ok_or_else(|| BoardError::not_ready("board driver was lost"))?;
        if let Err(err) = driver.open() {
            error!(board = %self.kind, error = %err, "failed to prepare session");
            return Err(err);
        }

        session.slot = Some(slot);
        session.state = BoardState::Prepared;
        info!(board = %self.kind, "session prepared");
        Ok(())
    }

    /// Allocate a fresh buffer of `buffer_capacity` samples, resolve the
    /// sink and block until the first sample arrives
    pub fn start_stream(&self, buffer_capacity: usize, sink: Option<&str>) -> BoardResult<()> {
        let mut session = self.session.lock();
        match session.state {
            BoardState::Streaming => return Err(BoardError::AlreadyRunning),
            BoardState::Prepared => {}
            BoardState::Unprepared | BoardState::Released => {
                return Err(BoardError::not_ready("prepare_session must be called first"))
            }
        }

        let buffer = Arc::new(SampleBuffer::new(buffer_capacity, self.channel_count)?);
        let sink = resolve_sink(sink)?;
        *self.buffer.write() = Some(buffer.clone());

        self.launch(&mut session, buffer, sink)
    }

    /// Stop the acquisition thread and send the stop command. The session
    /// is `Prepared` afterwards even when the stop command fails.
    pub fn stop_stream(&self) -> BoardResult<()> {
        let mut session = self.session.lock();
        self.halt(&mut session)
    }

    /// Tear everything down. Teardown failures are logged, never returned.
    pub fn release_session(&self) -> BoardResult<()> {
        let mut session = self.session.lock();
        if session.state == BoardState::Streaming {
            if let Err(err) = self.halt(&mut session) {
                warn!(board = %self.kind, error = %err, "failed to stop stream during release");
            }
        }
        if session.state == BoardState::Prepared {
            if let Some(driver) = session.driver.as_mut() {
                if let Err(err) = driver.close() {
                    warn!(board = %self.kind, error = %err, "failed to close board");
                }
            }
        }

        session.slot = None;
        *self.buffer.write() = None;
        session.state = BoardState::Released;
        info!(board = %self.kind, "session released");
        Ok(())
    }

    /// Send a model-specific configuration command
    pub fn config_board(&self, command: &str) -> BoardResult<ConfigAck> {
        let mut session = self.session.lock();
        match (session.state, self.policy) {
            (BoardState::Prepared, _) => match session.driver.as_mut() {
                Some(driver) => driver.configure(command, false),
                None => Err(BoardError::not_ready("board driver was lost")),
            },
            (BoardState::Streaming, ConfigPolicy::Inline) => match session.worker.as_ref() {
                Some(worker) => worker.configure(command),
                None => Err(BoardError::NotRunning),
            },
            (BoardState::Streaming, ConfigPolicy::PauseStream) => self.reconfigure_paused(&mut session, command),
            _ => Err(BoardError::not_ready("prepare_session must be called first")),
        }
    }

    /// Samples currently buffered
    pub fn get_board_data_count(&self) -> BoardResult<usize> {
        Ok(self.current_buffer()?.data_count())
    }

    /// Remove up to `max_samples` oldest samples, channel-major with the
    /// timestamps in the last row
    pub fn get_board_data(&self, max_samples: usize) -> BoardResult<Array2<f64>> {
        let samples = self.current_buffer()?.drain(max_samples);
        Ok(reshape(&samples, self.channel_count))
    }

    /// Copy up to `max_samples` newest samples without removing them
    pub fn get_current_board_data(&self, max_samples: usize) -> BoardResult<Array2<f64>> {
        let samples = self.current_buffer()?.peek(max_samples);
        Ok(reshape(&samples, self.channel_count))
    }

    fn current_buffer(&self) -> BoardResult<Arc<SampleBuffer>> {
        self.buffer
            .read()
            .clone()
            .ok_or_else(|| BoardError::not_ready("no buffer allocated, start_stream was never called"))
    }

    fn launch(&self, session: &mut Session, buffer: Arc<SampleBuffer>, sink: Box<dyn StreamSink>) -> BoardResult<()> {
        let mut driver = session
            .driver
            .take()
            .ok_or_else(|| BoardError::not_ready("board driver was lost"))?;
        if let Err(err) = driver.send_start() {
            session.driver = Some(driver);
            return Err(err);
        }

        let timeout = driver.startup_timeout();
        let worker = AcquisitionHandle::spawn(driver, buffer, sink, timeout)?;

        if worker.wait_started(timeout) == Some(StartOutcome::Started) {
            session.worker = Some(worker);
            session.state = BoardState::Streaming;
            info!(board = %self.kind, "stream started");
            return Ok(());
        }

        let WorkerParts { mut driver, .. } = self.reap(session, worker)?;
        if let Err(err) = driver.send_stop() {
            warn!(board = %self.kind, error = %err, "failed to stop board after startup timeout");
        }
        session.driver = Some(driver);
        Err(BoardError::SynchronizationTimeout(timeout))
    }

    fn halt(&self, session: &mut Session) -> BoardResult<()> {
        if session.state != BoardState::Streaming {
            return Err(BoardError::NotRunning);
        }
        let parts = self.join_worker(session)?;
        let mut driver = parts.driver;
        let stopped = driver.send_stop();
        session.driver = Some(driver);
        if stopped.is_ok() {
            info!(board = %self.kind, "stream stopped");
        }
        stopped
    }

    fn join_worker(&self, session: &mut Session) -> BoardResult<WorkerParts> {
        session.state = BoardState::Prepared;
        let worker = session.worker.take().ok_or(BoardError::NotRunning)?;
        self.reap(session, worker)
    }

    /// Join the worker. A thread that died takes the driver with it, so the
    /// session is released and its registry slot freed.
    fn reap(&self, session: &mut Session, worker: AcquisitionHandle) -> BoardResult<WorkerParts> {
        worker.stop().map_err(|err| {
            error!(board = %self.kind, error = %err, "acquisition thread lost the driver, releasing session");
            session.slot = None;
            session.state = BoardState::Released;
            err
        })
    }

    /// Stop, configure and restart with the same buffer and sink
    fn reconfigure_paused(&self, session: &mut Session, command: &str) -> BoardResult<ConfigAck> {
        info!(board = %self.kind, "pausing stream to configure board");
        let WorkerParts { mut driver, sink } = self.join_worker(session)?;

        let configured = driver.send_stop().and_then(|_| driver.configure(command, false));
        session.driver = Some(driver);
        let ack = configured?;

        let buffer = self.current_buffer()?;
        self.launch(session, buffer, sink)?;
        Ok(ack)
    }
}

impl Drop for Board {
    fn drop(&mut self) {
        if self.session.get_mut().state.is_prepared() {
            let _ = self.release_session();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hal::traits::FrameStatus;
    use crate::hal::types::Sample;
    use parking_lot::Mutex as PlMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Script {
        calls: PlMutex<Vec<String>>,
        silent: AtomicBool,
        faulty: AtomicBool,
    }

    struct ScriptedDriver {
        script: Arc<Script>,
        tick: f64,
        policy: ConfigPolicy,
    }

    impl ScriptedDriver {
        fn new(policy: ConfigPolicy) -> (Self, Arc<Script>) {
            let script = Arc::new(Script::default());
            let driver = Self {
                script: script.clone(),
                tick: 0.0,
                policy,
            };
            (driver, script)
        }

        fn log(&self, call: impl Into<String>) {
            self.script.calls.lock().push(call.into());
        }
    }

    impl BoardDriver for ScriptedDriver {
        fn kind(&self) -> BoardKind {
            BoardKind::AuraXr
        }

        fn config_policy(&self) -> ConfigPolicy {
            self.policy
        }

        fn startup_timeout(&self) -> Duration {
            Duration::from_millis(200)
        }

        fn open(&mut self) -> BoardResult<()> {
            self.log("open");
            Ok(())
        }

        fn send_start(&mut self) -> BoardResult<()> {
            self.log("start");
            Ok(())
        }

        fn read_frame(&mut self, out: &mut Vec<Sample>) -> BoardResult<FrameStatus> {
            std::thread::sleep(Duration::from_millis(2));
            if self.script.faulty.load(Ordering::SeqCst) {
                panic!("device fault");
            }
            if self.script.silent.load(Ordering::SeqCst) {
                return Ok(FrameStatus::Idle);
            }
            self.tick += 1.0;
            out.push(Sample::new(vec![self.tick; 22], self.tick));
            Ok(FrameStatus::Decoded)
        }

        fn send_stop(&mut self) -> BoardResult<()> {
            self.log("stop");
            Ok(())
        }

        fn configure(&mut self, command: &str, streaming: bool) -> BoardResult<ConfigAck> {
            self.log(format!("config {} streaming={}", command, streaming));
            Ok(ConfigAck::Accepted)
        }

        fn close(&mut self) -> BoardResult<()> {
            self.log("close");
            Ok(())
        }
    }

    fn board(policy: ConfigPolicy) -> (Board, Arc<Script>) {
        let (driver, script) = ScriptedDriver::new(policy);
        (Board::new(Box::new(driver), InstanceRegistry::new()), script)
    }

    #[test]
    fn test_lifecycle_errors() {
        let (board, _) = board(ConfigPolicy::Inline);
        assert_eq!(board.start_stream(100, None).unwrap_err().kind(), ErrorKind::NotReady);
        assert_eq!(board.stop_stream().unwrap_err().kind(), ErrorKind::NotRunning);
        assert_eq!(board.get_board_data_count().unwrap_err().kind(), ErrorKind::NotReady);
        assert_eq!(board.config_board("x").unwrap_err().kind(), ErrorKind::NotReady);

        board.prepare_session().unwrap();
        board.prepare_session().unwrap();
        board.start_stream(100, None).unwrap();
        assert_eq!(board.start_stream(100, None).unwrap_err().kind(), ErrorKind::AlreadyRunning);
        board.stop_stream().unwrap();
        assert_eq!(board.stop_stream().unwrap_err().kind(), ErrorKind::NotRunning);
    }

    #[test]
    fn test_invalid_capacity_sends_nothing() {
        let (board, script) = board(ConfigPolicy::Inline);
        board.prepare_session().unwrap();

        assert_eq!(board.start_stream(0, None).unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            board.start_stream(100, Some("bogus://x:1")).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(*script.calls.lock(), vec!["open"]);
        assert_eq!(board.state(), BoardState::Prepared);
    }

    #[test]
    fn test_buffer_survives_stop() {
        let (board, _) = board(ConfigPolicy::Inline);
        board.prepare_session().unwrap();
        board.start_stream(1000, None).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        board.stop_stream().unwrap();

        let count = board.get_board_data_count().unwrap();
        assert!(count > 0);
        let peeked = board.get_current_board_data(5).unwrap();
        assert_eq!(peeked.nrows(), 23);
        assert_eq!(board.get_board_data_count().unwrap(), count);

        let drained = board.get_board_data(count).unwrap();
        assert_eq!(drained.ncols(), count);
        assert_eq!(board.get_board_data_count().unwrap(), 0);

        board.release_session().unwrap();
        assert_eq!(board.get_board_data_count().unwrap_err().kind(), ErrorKind::NotReady);
    }

    #[test]
    fn test_startup_timeout_returns_to_prepared() {
        let (board, script) = board(ConfigPolicy::Inline);
        script.silent.store(true, Ordering::SeqCst);
        board.prepare_session().unwrap();

        let err = board.start_stream(100, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SynchronizationTimeout);
        assert_eq!(board.state(), BoardState::Prepared);
        assert_eq!(*script.calls.lock(), vec!["open", "start", "stop"]);

        script.silent.store(false, Ordering::SeqCst);
        board.start_stream(100, None).unwrap();
        assert_eq!(board.state(), BoardState::Streaming);
    }

    #[test]
    fn test_inline_config_goes_through_worker() {
        let (board, script) = board(ConfigPolicy::Inline);
        board.prepare_session().unwrap();
        board.config_board("~4").unwrap();
        board.start_stream(100, None).unwrap();
        board.config_board("x1").unwrap();
        board.stop_stream().unwrap();

        let calls = script.calls.lock().clone();
        assert_eq!(
            calls,
            vec!["open", "config ~4 streaming=false", "start", "config x1 streaming=true", "stop"]
        );
    }

    #[test]
    fn test_pause_policy_restarts_stream() {
        let (board, script) = board(ConfigPolicy::PauseStream);
        board.prepare_session().unwrap();
        board.start_stream(100, None).unwrap();
        board.config_board("x1").unwrap();
        assert_eq!(board.state(), BoardState::Streaming);
        board.release_session().unwrap();

        let calls = script.calls.lock().clone();
        assert_eq!(
            calls,
            vec!["open", "start", "stop", "config x1 streaming=false", "start", "stop", "close"]
        );
        assert_eq!(board.state(), BoardState::Released);
    }

    #[test]
    fn test_release_allows_prepare_again() {
        let (board, script) = board(ConfigPolicy::Inline);
        board.prepare_session().unwrap();
        board.release_session().unwrap();
        board.release_session().unwrap();
        board.prepare_session().unwrap();
        assert_eq!(*script.calls.lock(), vec!["open", "close", "open"]);
    }

    #[test]
    fn test_dead_worker_releases_session() {
        let registry = InstanceRegistry::new();
        let (driver, script) = ScriptedDriver::new(ConfigPolicy::Inline);
        let board = Board::new(Box::new(driver), registry.clone());
        board.prepare_session().unwrap();
        script.faulty.store(true, Ordering::SeqCst);

        let err = board.start_stream(100, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert_eq!(board.state(), BoardState::Released);
        assert_eq!(registry.live_count(BoardKind::AuraXr), 0);

        let err = board.prepare_session().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotReady);
        board.release_session().unwrap();
    }

    #[test]
    fn test_drop_releases_registry_slot() {
        let registry = InstanceRegistry::new();
        let (driver, _) = ScriptedDriver::new(ConfigPolicy::Inline);
        let board = Board::new(Box::new(driver), registry.clone());
        board.prepare_session().unwrap();
        assert_eq!(registry.live_count(BoardKind::AuraXr), 1);
        drop(board);
        assert_eq!(registry.live_count(BoardKind::AuraXr), 0);
    }
}
