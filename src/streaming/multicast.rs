// src/streaming/multicast.rs
//! UDP sink mirroring samples to a (usually multicast) group

use crate::error::{BoardError, BoardResult, IoResultExt};
use crate::streaming::StreamSink;
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use tracing::debug;

/// Sends one datagram per sample: channel values then the timestamp, each a
/// little-endian `f64`
pub struct MulticastSink {
    socket: UdpSocket,
    target: SocketAddr,
    scratch: Vec<u8>,
}

impl MulticastSink {
    pub fn connect(address: &str, port: u16) -> BoardResult<Self> {
        let ip: IpAddr = address
            .parse()
            .map_err(|_| BoardError::invalid(format!("invalid sink address {:?}", address)))?;
        let target = SocketAddr::new(ip, port);

        let bind = if ip.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).transport_err("sink bind")?;
        if let IpAddr::V4(v4) = ip {
            if v4.is_multicast() {
                socket.set_multicast_ttl_v4(1).transport_err("sink ttl")?;
            }
        }
        debug!(%target, "udp sink ready");
        Ok(Self {
            socket,
            target,
            scratch: Vec::new(),
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

/// Datagram layout used by [`MulticastSink`]
pub fn encode_datagram(channels: &[f64], timestamp: f64, out: &mut Vec<u8>) {
    out.clear();
    for value in channels.iter().chain(std::iter::once(&timestamp)) {
        out.extend_from_slice(&value.to_le_bytes());
    }
}

impl StreamSink for MulticastSink {
    fn push(&mut self, channels: &[f64], timestamp: f64) -> io::Result<()> {
        encode_datagram(channels, timestamp, &mut self.scratch);
        self.socket.send_to(&self.scratch, self.target)?;
        Ok(())
    }
}
