// src/board/cyton.rs
//! Cyton: 8-channel board on a serial link, 33-byte packets

use crate::config::constants::serial::{
    DEFAULT_BAUD_RATE, HANDSHAKE_READ_TIMEOUT, MAX_EMPTY_WELCOME_READS, MAX_WELCOME_READS, WELCOME_MARKER,
};
use crate::config::constants::timing::{DEFAULT_STARTUP_TIMEOUT, STREAM_READ_TIMEOUT};
use crate::decode::serial_packet::{decode_packet, PacketAssembler};
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::{write_command, BoardDriver, ConfigPolicy, FrameStatus, Transport};
use crate::hal::transport::SerialTransport;
use crate::hal::types::{BoardKind, ConfigAck, Sample};
use crate::utils::time::{system_clock, SharedClock};
use std::io;
use std::time::Duration;
use tracing::{debug, error, trace};

const READ_CHUNK: usize = 512;

pub struct CytonBoard {
    transport: Box<dyn Transport>,
    serial_port: Option<String>,
    assembler: PacketAssembler,
    clock: SharedClock,
    rx: Vec<u8>,
    handshake_timeout: Duration,
}

impl CytonBoard {
    /// Driver over an arbitrary transport. `serial_port` is only checked for
    /// presence.
    pub fn new(transport: Box<dyn Transport>, serial_port: Option<String>) -> Self {
        Self {
            transport,
            serial_port,
            assembler: PacketAssembler::new(),
            clock: system_clock(),
            rx: vec![0u8; READ_CHUNK],
            handshake_timeout: HANDSHAKE_READ_TIMEOUT,
        }
    }

    /// Driver over a real serial port
    pub fn serial(serial_port: Option<&str>, baud_rate: Option<u32>) -> Self {
        let port = serial_port.unwrap_or_default();
        let transport = SerialTransport::new(port, baud_rate.unwrap_or(DEFAULT_BAUD_RATE));
        Self::new(Box::new(transport), serial_port.map(str::to_string))
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Per-byte timeout while waiting for the welcome marker
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Wait for `$$$`, one byte at a time
    fn status_check(&mut self) -> BoardResult<()> {
        let mut byte = [0u8; 1];
        let mut matched = 0;
        let mut empty = 0;

        for _ in 0..MAX_WELCOME_READS {
            if self.transport.read(&mut byte)? == 0 {
                empty += 1;
                if empty > MAX_EMPTY_WELCOME_READS {
                    break;
                }
                continue;
            }
            empty = 0;
            if byte[0] == WELCOME_MARKER[matched] {
                matched += 1;
                if matched == WELCOME_MARKER.len() {
                    return Ok(());
                }
            } else {
                matched = usize::from(byte[0] == WELCOME_MARKER[0]);
            }
        }

        error!("board doesn't send welcome characters");
        Err(BoardError::transport(
            "cyton handshake",
            io::Error::new(io::ErrorKind::TimedOut, "board did not send the welcome marker"),
        ))
    }
}

impl BoardDriver for CytonBoard {
    fn kind(&self) -> BoardKind {
        BoardKind::Cyton
    }

    fn config_policy(&self) -> ConfigPolicy {
        ConfigPolicy::Inline
    }

    fn startup_timeout(&self) -> Duration {
        DEFAULT_STARTUP_TIMEOUT
    }

    fn open(&mut self) -> BoardResult<()> {
        match self.serial_port.as_deref() {
            Some(port) if !port.is_empty() => debug!(port, "opening cyton"),
            _ => return Err(BoardError::invalid("serial port is not specified")),
        }

        self.transport.open()?;
        self.transport.set_read_timeout(self.handshake_timeout)?;
        let ready = write_command(self.transport.as_mut(), "v").and_then(|_| self.status_check());
        if let Err(err) = ready {
            let _ = self.transport.close();
            return Err(err);
        }
        self.transport.set_read_timeout(STREAM_READ_TIMEOUT)
    }

    fn send_start(&mut self) -> BoardResult<()> {
        self.assembler = PacketAssembler::new();
        write_command(self.transport.as_mut(), "b")
    }

    fn read_frame(&mut self, out: &mut Vec<Sample>) -> BoardResult<FrameStatus> {
        let n = self.transport.read(&mut self.rx)?;
        if n == 0 {
            return Ok(FrameStatus::Idle);
        }
        self.assembler.extend(&self.rx[..n]);

        let timestamp = self.clock.now_secs();
        let mut decoded = 0;
        let mut rejected = 0;
        while let Some(packet) = self.assembler.next_packet() {
            match decode_packet(&packet, timestamp) {
                Ok(sample) => {
                    out.push(sample);
                    decoded += 1;
                }
                Err(err) => {
                    trace!(error = %err, "rejected serial packet");
                    self.assembler.resync(&packet);
                    rejected += 1;
                }
            }
        }

        Ok(match (decoded, rejected) {
            (0, 0) => FrameStatus::Idle,
            (0, _) => FrameStatus::Malformed,
            _ => FrameStatus::Decoded,
        })
    }

    fn send_stop(&mut self) -> BoardResult<()> {
        write_command(self.transport.as_mut(), "s")
    }

    fn configure(&mut self, command: &str, _streaming: bool) -> BoardResult<ConfigAck> {
        if command.is_empty() || !command.is_ascii() {
            return Err(BoardError::invalid(format!("invalid config command {:?}", command)));
        }
        write_command(self.transport.as_mut(), command)?;
        Ok(ConfigAck::Accepted)
    }

    fn close(&mut self) -> BoardResult<()> {
        self.transport.close()
    }
}
