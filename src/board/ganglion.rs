// src/board/ganglion.rs
//! Ganglion: 4-channel BLE board reached through the vendor library

use crate::config::constants::ganglion::{
    DEFAULT_START_COMMAND, DEFAULT_STOP_COMMAND, DEFAULT_TIMEOUT, IMPEDANCE_START_COMMAND, IMPEDANCE_STOP_COMMAND,
    MAX_TIMEOUT_SECS,
};
use crate::config::constants::timing::VENDOR_POLL_INTERVAL;
use crate::decode::delta::GanglionDecoder;
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::{BoardDriver, ConfigPolicy, FrameStatus};
use crate::hal::types::{BoardKind, ConfigAck, Sample};
use crate::hal::vendor::GanglionLibrary;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

pub struct GanglionBoard {
    library: Box<dyn GanglionLibrary>,
    serial_port: Option<String>,
    mac_address: Option<String>,
    timeout_s: u64,
    decoder: GanglionDecoder,
    start_command: &'static str,
    stop_command: &'static str,
}

impl GanglionBoard {
    /// `timeout_s` bounds discovery and stream startup; 0 picks 15 s
    pub fn new(
        library: Box<dyn GanglionLibrary>,
        serial_port: Option<String>,
        mac_address: Option<String>,
        timeout_s: u64,
    ) -> Self {
        Self {
            library,
            serial_port,
            mac_address: mac_address.filter(|mac| !mac.is_empty()),
            timeout_s,
            decoder: GanglionDecoder::new(),
            start_command: DEFAULT_START_COMMAND,
            stop_command: DEFAULT_STOP_COMMAND,
        }
    }

    fn timeout(&self) -> Duration {
        match self.timeout_s {
            0 => DEFAULT_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    /// Commands `send_start` and `send_stop` will use
    pub fn stream_commands(&self) -> (&'static str, &'static str) {
        (self.start_command, self.stop_command)
    }
}

impl BoardDriver for GanglionBoard {
    fn kind(&self) -> BoardKind {
        BoardKind::Ganglion
    }

    fn config_policy(&self) -> ConfigPolicy {
        ConfigPolicy::PauseStream
    }

    fn startup_timeout(&self) -> Duration {
        self.timeout()
    }

    fn open(&mut self) -> BoardResult<()> {
        if self.timeout_s > MAX_TIMEOUT_SECS {
            return Err(BoardError::invalid(format!(
                "timeout must be in 0..={} seconds, got {}",
                MAX_TIMEOUT_SECS, self.timeout_s
            )));
        }
        let port = match self.serial_port.as_deref() {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => return Err(BoardError::invalid("serial port is not specified")),
        };

        let timeout = self.timeout();
        self.library
            .initialize(&port, timeout)
            .map_err(|e| e.into_board_error("ganglion initialize"))?;

        if self.mac_address.is_none() {
            info!("mac address is not specified, searching for any ganglion");
        }
        if let Err(err) = self.library.open(self.mac_address.as_deref()) {
            let _ = self.library.release();
            return Err(err.into_board_error("ganglion open"));
        }
        debug!(port, mac = ?self.mac_address, "ganglion connected");
        Ok(())
    }

    fn send_start(&mut self) -> BoardResult<()> {
        self.decoder = GanglionDecoder::new();
        self.library
            .start_stream(self.start_command)
            .map_err(|e| BoardError::WriteFailure(format!("start stream: {}", e)))
    }

    fn read_frame(&mut self, out: &mut Vec<Sample>) -> BoardResult<FrameStatus> {
        let Some(frame) = self.library.get_data() else {
            std::thread::sleep(VENDOR_POLL_INTERVAL);
            return Ok(FrameStatus::Idle);
        };
        match self.decoder.decode(&frame.data, frame.timestamp, out) {
            Ok(_) => Ok(FrameStatus::Decoded),
            Err(err) => {
                trace!(error = %err, "dropped ganglion frame");
                Ok(FrameStatus::Malformed)
            }
        }
    }

    fn send_stop(&mut self) -> BoardResult<()> {
        self.library
            .stop_stream(self.stop_command)
            .map_err(|e| BoardError::WriteFailure(format!("stop stream: {}", e)))
    }

    fn configure(&mut self, command: &str, _streaming: bool) -> BoardResult<ConfigAck> {
        // impedance mode is driven by the stream commands, so only the pair changes
        if command.starts_with(IMPEDANCE_START_COMMAND) {
            info!("switching to impedance mode");
            self.start_command = IMPEDANCE_START_COMMAND;
            self.stop_command = IMPEDANCE_STOP_COMMAND;
        } else if command.starts_with(IMPEDANCE_STOP_COMMAND) {
            info!("switching back to data mode");
            self.start_command = DEFAULT_START_COMMAND;
            self.stop_command = DEFAULT_STOP_COMMAND;
        } else {
            self.library
                .config_board(command)
                .map_err(|e| BoardError::WriteFailure(format!("command {:?}: {}", command, e)))?;
        }
        Ok(ConfigAck::Accepted)
    }

    fn close(&mut self) -> BoardResult<()> {
        let closed = self.library.close();
        if let Err(err) = self.library.release() {
            warn!(error = %err, "failed to release ganglion library");
        }
        closed.map_err(|e| e.into_board_error("ganglion close"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hal::simulator::{GanglionProbe, SimulatedGanglion};

    fn board(timeout_s: u64) -> (GanglionBoard, GanglionProbe) {
        let library = SimulatedGanglion::default();
        let probe = library.probe();
        let board = GanglionBoard::new(Box::new(library), Some("/dev/ttyACM0".into()), None, timeout_s);
        (board, probe)
    }

    #[test]
    fn test_timeout_range() {
        let (mut board, probe) = board(601);
        assert_eq!(board.open().unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert!(probe.calls().is_empty());

        let (board, _) = self::board(0);
        assert_eq!(board.startup_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_missing_serial_port() {
        let mut board = GanglionBoard::new(Box::new(SimulatedGanglion::default()), None, None, 0);
        assert_eq!(board.open().unwrap_err().kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_open_passes_timeout_to_library() {
        let (mut board, probe) = board(30);
        board.open().unwrap();
        assert_eq!(probe.calls(), vec!["initialize(/dev/ttyACM0, 30s)", "open()"]);
        assert!(probe.is_open());
    }

    #[test]
    fn test_device_not_found_is_transport_failure() {
        let (mut board, probe) = board(0);
        probe.set_device_missing(true);
        assert_eq!(board.open().unwrap_err().kind(), ErrorKind::TransportFailure);
        assert!(probe.calls().contains(&"release()".to_string()));
    }

    #[test]
    fn test_impedance_commands_swap_stream_commands() {
        let (mut board, probe) = board(0);
        board.open().unwrap();

        board.configure("z", false).unwrap();
        assert_eq!(board.stream_commands(), ("z", "Z"));
        board.configure("Z", false).unwrap();
        assert_eq!(board.stream_commands(), ("b", "s"));

        board.configure("x1", false).unwrap();
        assert_eq!(probe.calls().last().map(String::as_str), Some("config_board(x1)"));
    }

    #[test]
    fn test_read_frame_decodes_simulated_stream() {
        let (mut board, _probe) = board(0);
        board.open().unwrap();
        board.send_start().unwrap();

        let mut out = Vec::new();
        for _ in 0..100 {
            if board.read_frame(&mut out).unwrap() == FrameStatus::Decoded {
                break;
            }
        }
        assert!(!out.is_empty());
        assert_eq!(out[0].channel_count(), 13);
    }
}
