// src/board/xr.rs
//! AuraXR and NovaXR: UDP boards streaming fixed-point transactions

use crate::config::constants::timing::{
    DEFAULT_STARTUP_TIMEOUT, DRAIN_READ_TIMEOUT, IDLE_READ_TIMEOUT, MAX_DRAIN_ATTEMPTS, STREAM_READ_TIMEOUT,
};
use crate::config::constants::xr::{
    AURA_SAMPLING_RATE_COMMAND, DEFAULT_IP_ADDRESS, DEFAULT_PORT, MAX_RESPONSE_SIZE, NOVA_SAMPLING_RATE_COMMAND,
    RESET_COMMAND, TRANSACTION_ACK, TRANSACTION_SIZE,
};
use crate::decode::fixed_point::{FixedPointDecoder, TemperatureEncoding};
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::{write_command, BoardDriver, ConfigPolicy, FrameStatus, Transport};
use crate::hal::transport::UdpTransport;
use crate::hal::types::{BoardKind, ConfigAck, IpProtocol, Sample};
use crate::utils::time::{system_clock, SharedClock};
use std::io;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Firmware family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrFlavor {
    Aura,
    Nova,
}

impl XrFlavor {
    pub fn kind(self) -> BoardKind {
        match self {
            XrFlavor::Aura => BoardKind::AuraXr,
            XrFlavor::Nova => BoardKind::NovaXr,
        }
    }

    /// Command forcing the default sampling rate during prepare
    pub fn sampling_rate_command(self) -> &'static str {
        match self {
            XrFlavor::Aura => AURA_SAMPLING_RATE_COMMAND,
            XrFlavor::Nova => NOVA_SAMPLING_RATE_COMMAND,
        }
    }

    fn temperature(self) -> TemperatureEncoding {
        match self {
            XrFlavor::Aura => TemperatureEncoding::Unsigned,
            XrFlavor::Nova => TemperatureEncoding::Signed,
        }
    }
}

pub struct XrBoard {
    flavor: XrFlavor,
    protocol: IpProtocol,
    transport: Box<dyn Transport>,
    decoder: FixedPointDecoder,
    clock: SharedClock,
    start_time: f64,
    rx: Vec<u8>,
    drain_timeout: Duration,
    ack_timeout: Duration,
}

impl XrBoard {
    /// Driver over an arbitrary transport
    pub fn new(flavor: XrFlavor, transport: Box<dyn Transport>) -> Self {
        Self {
            flavor,
            protocol: IpProtocol::Udp,
            transport,
            decoder: FixedPointDecoder::new(flavor.temperature()),
            clock: system_clock(),
            start_time: 0.0,
            rx: vec![0u8; MAX_RESPONSE_SIZE],
            drain_timeout: DRAIN_READ_TIMEOUT,
            ack_timeout: IDLE_READ_TIMEOUT,
        }
    }

    /// Driver over UDP. A missing address uses the board's access point.
    pub fn udp(flavor: XrFlavor, ip_address: Option<&str>, port: Option<u16>, protocol: IpProtocol) -> Self {
        let host = match ip_address.filter(|ip| !ip.is_empty()) {
            Some(ip) => ip.to_string(),
            None => {
                info!("use default IP address {}", DEFAULT_IP_ADDRESS);
                DEFAULT_IP_ADDRESS.to_string()
            }
        };
        let transport = UdpTransport::new(host, port.unwrap_or(DEFAULT_PORT));
        let mut board = Self::new(flavor, Box::new(transport));
        board.protocol = protocol;
        board
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Per-read timeout used while draining after the stop command
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Read timeout for command acknowledgements outside streaming
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Wall-clock time recorded when the begin command was sent
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    fn handshake(&mut self) -> BoardResult<()> {
        for command in [RESET_COMMAND, self.flavor.sampling_rate_command()] {
            match self.configure(command, false) {
                Ok(ack) if ack.is_success() => {}
                Ok(_) => {
                    return Err(BoardError::WriteFailure(format!(
                        "board rejected default setting {:?}",
                        command
                    )))
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Read until something other than a full data transaction arrives.
    /// At most `MAX_DRAIN_ATTEMPTS` stale transactions are skipped.
    fn read_ack(&mut self, command: &str) -> BoardResult<ConfigAck> {
        let mut skipped = 0;
        loop {
            match self.transport.read(&mut self.rx)? {
                0 => {
                    error!(command, "no acknowledgement received");
                    return Err(BoardError::transport(
                        "xr acknowledgement",
                        io::Error::new(io::ErrorKind::TimedOut, format!("no acknowledgement for {:?}", command)),
                    ));
                }
                TRANSACTION_SIZE if skipped < MAX_DRAIN_ATTEMPTS => skipped += 1,
                TRANSACTION_SIZE => {
                    error!(command, skipped, "board keeps streaming, acknowledgement lost");
                    return Err(BoardError::transport(
                        "xr acknowledgement",
                        io::Error::other(format!("board is still streaming, no acknowledgement for {:?}", command)),
                    ));
                }
                _ => break,
            }
        }

        let ack = ConfigAck::from_response_byte(self.rx[0]);
        match ack {
            ConfigAck::Accepted => {}
            ConfigAck::Invalid => error!(command, "invalid command"),
            ConfigAck::Warning(byte) => warn!(command, byte, "unknown char received"),
        }
        Ok(ack)
    }
}

impl BoardDriver for XrBoard {
    fn kind(&self) -> BoardKind {
        self.flavor.kind()
    }

    fn config_policy(&self) -> ConfigPolicy {
        ConfigPolicy::Inline
    }

    fn startup_timeout(&self) -> Duration {
        DEFAULT_STARTUP_TIMEOUT
    }

    fn open(&mut self) -> BoardResult<()> {
        if self.protocol == IpProtocol::Tcp {
            return Err(BoardError::invalid(format!("{} only supports UDP", self.kind())));
        }
        self.transport.open()?;
        self.transport.set_read_timeout(self.ack_timeout)?;

        if let Err(err) = self.handshake() {
            error!(board = %self.kind(), error = %err, "failed to apply default settings");
            let _ = self.transport.close();
            return Err(err);
        }
        Ok(())
    }

    fn send_start(&mut self) -> BoardResult<()> {
        self.transport.set_read_timeout(STREAM_READ_TIMEOUT)?;
        write_command(self.transport.as_mut(), "b")?;
        self.start_time = self.clock.now_secs();
        Ok(())
    }

    fn read_frame(&mut self, out: &mut Vec<Sample>) -> BoardResult<FrameStatus> {
        let n = self.transport.read(&mut self.rx)?;
        if n == 0 {
            return Ok(FrameStatus::Idle);
        }
        if n != TRANSACTION_SIZE {
            trace!(expected = TRANSACTION_SIZE, read = n, "short transaction");
            return Ok(FrameStatus::Malformed);
        }

        if let Err(err) = self.transport.write(TRANSACTION_ACK) {
            debug!(error = %err, "failed to acknowledge transaction");
        }
        let decoded = self
            .decoder
            .decode_transaction(&self.rx[..n], self.start_time, out);
        Ok(if decoded > 0 {
            FrameStatus::Decoded
        } else {
            FrameStatus::Malformed
        })
    }

    fn send_stop(&mut self) -> BoardResult<()> {
        write_command(self.transport.as_mut(), "s")?;

        // free the socket of frames sent before the device saw the stop
        self.transport.set_read_timeout(self.drain_timeout)?;
        let mut drained = false;
        for _ in 0..MAX_DRAIN_ATTEMPTS {
            match self.transport.read(&mut self.rx) {
                Ok(0) | Err(_) => {
                    drained = true;
                    break;
                }
                Ok(_) => {}
            }
        }
        self.transport.set_read_timeout(self.ack_timeout)?;

        if drained {
            Ok(())
        } else {
            error!("command \"s\" was sent but streaming is still running");
            Err(BoardError::WriteFailure(
                "command \"s\" was sent but streaming is still running".to_string(),
            ))
        }
    }

    fn configure(&mut self, command: &str, streaming: bool) -> BoardResult<ConfigAck> {
        debug!(board = %self.kind(), command, "configuring board");
        write_command(self.transport.as_mut(), command)?;
        if streaming {
            return Ok(ConfigAck::Accepted);
        }
        self.read_ack(command)
    }

    fn close(&mut self) -> BoardResult<()> {
        self.transport.close()
    }
}
