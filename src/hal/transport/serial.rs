// src/hal/transport/serial.rs
//! Serial port transport backed by the `serialport` crate

use crate::config::constants::serial::{OPEN_RETRY_ATTEMPTS, OPEN_RETRY_BASE_DELAY_MS};
use crate::config::constants::timing::STREAM_READ_TIMEOUT;
use crate::error::{BoardError, BoardResult, IoResultExt};
use crate::hal::traits::Transport;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Serial link to a board or dongle
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialTransport {
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            read_timeout: STREAM_READ_TIMEOUT,
            port: None,
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Names of serial ports visible to the OS
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }

    fn port_mut(&mut self) -> BoardResult<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| BoardError::not_ready(format!("serial port {} is not open", self.port_name)))
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> BoardResult<()> {
        if self.port.is_some() {
            return Err(BoardError::invalid(format!(
                "port {} already open",
                self.port_name
            )));
        }

        debug!(port = %self.port_name, baud = self.baud_rate, "opening serial port");
        let mut attempt = 1;
        loop {
            let result = serialport::new(&self.port_name, self.baud_rate)
                .timeout(self.read_timeout)
                .open();
            match result {
                Ok(port) => {
                    self.port = Some(port);
                    return Ok(());
                }
                Err(err) if attempt >= OPEN_RETRY_ATTEMPTS => return Err(err.into()),
                Err(err) => {
                    warn!(port = %self.port_name, attempt, error = %err, "failed to open serial port, retrying");
                    std::thread::sleep(Duration::from_millis(
                        OPEN_RETRY_BASE_DELAY_MS * attempt as u64,
                    ));
                    attempt += 1;
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                trace!("serial read timed out");
                Ok(0)
            }
            Err(e) => Err(BoardError::transport("serial read", e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> BoardResult<usize> {
        let port = self.port_mut()?;
        let written = port.write(data).transport_err("serial write")?;
        port.flush().transport_err("serial flush")?;
        Ok(written)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> BoardResult<()> {
        self.read_timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeout)?;
        }
        Ok(())
    }

    fn close(&mut self) -> BoardResult<()> {
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "serial port closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}
