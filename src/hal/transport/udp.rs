// src/hal/transport/udp.rs
//! Connected UDP client transport

use crate::config::constants::timing::IDLE_READ_TIMEOUT;
use crate::error::{BoardError, BoardResult, IoResultExt};
use crate::hal::traits::Transport;
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::time::Duration;
use tracing::{debug, info};

/// Datagram client bound to an ephemeral local port and connected to one peer
pub struct UdpTransport {
    host: String,
    port: u16,
    read_timeout: Duration,
    socket: Option<UdpSocket>,
}

impl UdpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: IDLE_READ_TIMEOUT,
            socket: None,
        }
    }

    pub fn peer(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn socket(&self) -> BoardResult<&UdpSocket> {
        self.socket
            .as_ref()
            .ok_or_else(|| BoardError::not_ready(format!("socket to {} is not connected", self.peer())))
    }
}

// zero would disable the timeout on a std socket
fn effective_timeout(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

impl Transport for UdpTransport {
    fn open(&mut self) -> BoardResult<()> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).transport_err("udp bind")?;
        socket
            .connect((self.host.as_str(), self.port))
            .transport_err("udp connect")?;
        socket
            .set_read_timeout(Some(effective_timeout(self.read_timeout)))
            .transport_err("udp set timeout")?;

        info!(peer = %self.peer(), "udp socket connected");
        self.socket = Some(socket);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        match self.socket()?.recv(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(BoardError::transport("udp receive", e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> BoardResult<usize> {
        self.socket()?.send(data).transport_err("udp send")
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> BoardResult<()> {
        self.read_timeout = timeout;
        if let Some(socket) = self.socket.as_ref() {
            socket
                .set_read_timeout(Some(effective_timeout(timeout)))
                .transport_err("udp set timeout")?;
        }
        Ok(())
    }

    fn close(&mut self) -> BoardResult<()> {
        if self.socket.take().is_some() {
            debug!(peer = %self.peer(), "udp socket closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}
