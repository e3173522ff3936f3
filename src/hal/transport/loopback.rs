// src/hal/transport/loopback.rs
//! In-memory transport pair for driving boards without hardware

use crate::error::{BoardError, BoardResult};
use crate::hal::traits::Transport;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Host half of an in-memory link. Each message sent by the device half is
/// delivered by one or more `read` calls; partial reads keep the remainder.
pub struct LoopbackTransport {
    to_device: Sender<Vec<u8>>,
    from_device: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    read_timeout: Duration,
    open: bool,
    max_write: Option<usize>,
    fail_open: Arc<AtomicBool>,
}

/// Device half: injects frames and observes commands written by the host
#[derive(Clone)]
pub struct LoopbackDevice {
    to_host: Sender<Vec<u8>>,
    from_host: Receiver<Vec<u8>>,
    fail_open: Arc<AtomicBool>,
}

impl LoopbackTransport {
    /// Create a connected host/device pair
    pub fn pair() -> (LoopbackTransport, LoopbackDevice) {
        let (to_device, from_host) = channel::unbounded();
        let (to_host, from_device) = channel::unbounded();
        let fail_open = Arc::new(AtomicBool::new(false));

        let host = LoopbackTransport {
            to_device,
            from_device,
            pending: Vec::new(),
            read_timeout: Duration::from_millis(100),
            open: false,
            max_write: None,
            fail_open: fail_open.clone(),
        };
        let device = LoopbackDevice {
            to_host,
            from_host,
            fail_open,
        };
        (host, device)
    }

    /// Accept at most `limit` bytes per write, to exercise short writes
    pub fn limit_write_size(&mut self, limit: usize) {
        self.max_write = Some(limit);
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self) -> BoardResult<()> {
        if self.fail_open.load(Ordering::Acquire) {
            return Err(BoardError::transport(
                "loopback open",
                std::io::Error::new(std::io::ErrorKind::NotFound, "device unplugged"),
            ));
        }
        self.open = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> BoardResult<usize> {
        if !self.open {
            return Err(BoardError::not_ready("loopback transport is closed"));
        }
        if self.pending.is_empty() {
            match self.from_device.recv_timeout(self.read_timeout) {
                Ok(message) => self.pending = message,
                Err(RecvTimeoutError::Timeout) => return Ok(0),
                Err(RecvTimeoutError::Disconnected) => {
                    // device half dropped; behave like a silent link
                    std::thread::sleep(self.read_timeout);
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> BoardResult<usize> {
        if !self.open {
            return Err(BoardError::not_ready("loopback transport is closed"));
        }
        let n = self.max_write.map_or(data.len(), |limit| limit.min(data.len()));
        // a dropped device half swallows writes like an unplugged cable
        let _ = self.to_device.send(data[..n].to_vec());
        Ok(n)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> BoardResult<()> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn close(&mut self) -> BoardResult<()> {
        self.open = false;
        self.pending.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl LoopbackDevice {
    /// Queue one message for the host
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.to_host.send(bytes.into());
    }

    /// Next message written by the host, waiting up to `timeout`
    pub fn recv_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_host.recv_timeout(timeout).ok()
    }

    /// Every message written by the host so far
    pub fn drain_written(&self) -> Vec<Vec<u8>> {
        self.from_host.try_iter().collect()
    }

    /// Make the next `open` on the host half fail
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Release);
    }
}
