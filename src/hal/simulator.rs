// src/hal/simulator.rs
//! Device emulators used by the tests and demos
//!
//! [`XrEmulator`] is a UDP peer speaking the XR command protocol and
//! streaming fixed-point transactions. [`SimulatedGanglion`] stands in for
//! the Ganglion vendor library and produces delta-compressed frames.
//! Both generate bounded random counts from a seeded RNG.

use crate::config::constants::xr::{PACKAGES_PER_TRANSACTION, TRANSACTION_SIZE};
use crate::decode::delta::{encode_absolute_frame, encode_delta_frame, encode_impedance_frame};
use crate::decode::fixed_point::PackageFields;
use crate::error::{BoardResult, IoResultExt};
use crate::hal::vendor::{GanglionFrame, GanglionLibrary, VendorError};
use crate::utils::time::current_timestamp_secs;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Signal generation settings shared by the emulators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// RNG seed for reproducible streams
    pub seed: u64,
    /// Largest absolute raw count emitted for an ADC channel
    pub amplitude_counts: i32,
    /// Device sampling rate, used to advance the device clock
    pub sampling_rate_hz: u32,
    /// Interval between transactions or frames
    pub frame_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            amplitude_counts: 50_000,
            sampling_rate_hz: 250,
            frame_interval: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Default)]
struct XrState {
    streaming: bool,
    silent: bool,
    commands: Vec<String>,
    rejected: HashSet<String>,
}

/// UDP peer emulating an AuraXR/NovaXR board on the loopback interface
pub struct XrEmulator {
    address: SocketAddr,
    state: Arc<Mutex<XrState>>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl XrEmulator {
    /// Bind an ephemeral loopback port and start serving
    pub fn spawn(config: SimulatorConfig) -> BoardResult<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0").transport_err("emulator bind")?;
        socket
            .set_read_timeout(Some(Duration::from_millis(5)))
            .transport_err("emulator timeout")?;
        let address = socket.local_addr().transport_err("emulator address")?;

        let state = Arc::new(Mutex::new(XrState::default()));
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let state = state.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("xr-emulator".into())
                .spawn(move || serve_xr(socket, config, state, running))
                .map_err(|e| crate::error::BoardError::transport("spawn emulator", e))?
        };
        debug!(%address, "xr emulator listening");

        Ok(Self {
            address,
            state,
            running,
            thread: Some(thread),
        })
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Commands received so far, excluding transaction acks
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    /// Accept `b` but never send data
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Answer `I` to `command`
    pub fn reject(&self, command: &str) {
        self.state.lock().rejected.insert(command.to_string());
    }
}

impl Drop for XrEmulator {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn serve_xr(socket: UdpSocket, config: SimulatorConfig, state: Arc<Mutex<XrState>>, running: Arc<AtomicBool>) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut peer: Option<SocketAddr> = None;
    let mut stream_started = Instant::now();
    let mut package_index: u8 = 0;
    let mut next_frame = Instant::now();
    let mut buf = [0u8; 256];
    let sample_period_us = 1e6 / f64::from(config.sampling_rate_hz.max(1));
    let mut device_samples: u64 = 0;

    while running.load(Ordering::SeqCst) {
        if let Ok((n, from)) = socket.recv_from(&mut buf) {
            peer = Some(from);
            let command = String::from_utf8_lossy(&buf[..n]).into_owned();
            let reply = {
                let mut state = state.lock();
                match command.as_str() {
                    "a" => None,
                    "b" => {
                        state.commands.push(command);
                        state.streaming = true;
                        stream_started = Instant::now();
                        device_samples = 0;
                        None
                    }
                    "s" => {
                        state.commands.push(command);
                        state.streaming = false;
                        None
                    }
                    _ => {
                        let answer = if state.rejected.contains(&command) { b'I' } else { b'A' };
                        state.commands.push(command);
                        Some(answer)
                    }
                }
            };
            if let Some(answer) = reply {
                let _ = socket.send_to(&[answer], from);
            }
        }

        let (streaming, silent) = {
            let state = state.lock();
            (state.streaming, state.silent)
        };
        let Some(target) = peer else { continue };
        if !streaming || silent || Instant::now() < next_frame {
            continue;
        }
        next_frame = Instant::now() + config.frame_interval;

        let mut transaction = Vec::with_capacity(TRANSACTION_SIZE);
        for _ in 0..PACKAGES_PER_TRANSACTION {
            let mut counts = [0i32; 16];
            for count in counts.iter_mut() {
                *count = rng.gen_range(-config.amplitude_counts..=config.amplitude_counts);
            }
            let fields = PackageFields {
                index: package_index,
                eda: rng.gen_range(0.0..5.0),
                counts,
                battery: 87,
                temperature_centi: 3650,
                ppg_red: rng.gen_range(0..100_000),
                ppg_ir: rng.gen_range(0..100_000),
                device_time_us: device_samples as f64 * sample_period_us,
            };
            transaction.extend_from_slice(&fields.encode());
            package_index = package_index.wrapping_add(1);
            device_samples += 1;
        }
        trace!(elapsed = ?stream_started.elapsed(), "emulator sending transaction");
        let _ = socket.send_to(&transaction, target);
    }
}

#[derive(Debug, Default)]
struct GanglionState {
    initialized: bool,
    open: bool,
    streaming: bool,
    silent: bool,
    device_missing: bool,
    start_command: Option<String>,
    calls: Vec<String>,
}

/// Observer for a [`SimulatedGanglion`] that has been moved into a board
#[derive(Debug, Clone)]
pub struct GanglionProbe {
    state: Arc<Mutex<GanglionState>>,
}

impl GanglionProbe {
    /// Library calls in order, as `name(argument)`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Keep streaming flags but deliver no frames
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// Make the next `open` fail as if no device answered
    pub fn set_device_missing(&self, missing: bool) {
        self.state.lock().device_missing = missing;
    }
}

/// In-process replacement for the Ganglion vendor library
pub struct SimulatedGanglion {
    state: Arc<Mutex<GanglionState>>,
    config: SimulatorConfig,
    rng: StdRng,
    last: Option<[i32; 4]>,
    tag: u8,
    next_frame: Instant,
}

impl SimulatedGanglion {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(GanglionState::default())),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            last: None,
            tag: 0,
            next_frame: Instant::now(),
        }
    }

    pub fn probe(&self) -> GanglionProbe {
        GanglionProbe {
            state: self.state.clone(),
        }
    }

    fn record(&self, call: &str, argument: &str) {
        self.state.lock().calls.push(format!("{}({})", call, argument));
    }

    /// Step that survives the low-bit sign convention: non-negative even or
    /// negative odd
    fn representable_step(&mut self) -> i32 {
        let magnitude = self.rng.gen_range(0..500) * 2;
        if self.rng.gen_bool(0.5) {
            magnitude
        } else {
            -magnitude - 1
        }
    }

    fn next_counts(&mut self, previous: [i32; 4]) -> [i32; 4] {
        let limit = self.config.amplitude_counts;
        let mut next = previous;
        for value in next.iter_mut() {
            let mut step = self.representable_step();
            // decoded value is previous - step; steer back toward zero
            if (*value > limit && step < 0) || (*value < -limit && step > 0) {
                step = -step - 1;
            }
            *value -= step;
        }
        next
    }

    fn next_data_frame(&mut self) -> [u8; 20] {
        let previous = match self.last {
            Some(previous) => previous,
            None => {
                let limit = self.config.amplitude_counts;
                let start = [
                    self.rng.gen_range(-limit..=limit),
                    self.rng.gen_range(-limit..=limit),
                    self.rng.gen_range(-limit..=limit),
                    self.rng.gen_range(-limit..=limit),
                ];
                self.last = Some(start);
                return encode_absolute_frame(start);
            }
        };

        self.tag = if self.tag >= 100 { 1 } else { self.tag + 1 };
        let first = self.next_counts(previous);
        let second = self.next_counts(first);
        let accel: i8 = self.rng.gen_range(-64..=64);
        match encode_delta_frame(self.tag, previous, first, second, accel) {
            Ok(frame) => {
                self.last = Some(second);
                frame
            }
            Err(_) => {
                // restart the chain with an absolute frame
                self.last = Some(previous);
                encode_absolute_frame(previous)
            }
        }
    }

    fn next_impedance_frame(&mut self) -> [u8; 20] {
        self.tag = if (201..205).contains(&self.tag) { self.tag + 1 } else { 201 };
        let value = self.rng.gen_range(1..2000);
        encode_impedance_frame(self.tag, value)
    }
}

impl Default for SimulatedGanglion {
    fn default() -> Self {
        Self::new(SimulatorConfig {
            sampling_rate_hz: 200,
            frame_interval: Duration::from_millis(5),
            ..SimulatorConfig::default()
        })
    }
}

impl GanglionLibrary for SimulatedGanglion {
    fn initialize(&mut self, serial_port: &str, timeout: Duration) -> Result<(), VendorError> {
        self.record("initialize", &format!("{}, {}s", serial_port, timeout.as_secs()));
        self.state.lock().initialized = true;
        Ok(())
    }

    fn open(&mut self, mac_address: Option<&str>) -> Result<(), VendorError> {
        self.record("open", mac_address.unwrap_or(""));
        let mut state = self.state.lock();
        if !state.initialized {
            return Err(VendorError::NotInitialized);
        }
        if state.device_missing {
            return Err(VendorError::DeviceNotFound(mac_address.map(str::to_string)));
        }
        state.open = true;
        Ok(())
    }

    fn start_stream(&mut self, command: &str) -> Result<(), VendorError> {
        self.record("start_stream", command);
        let mut state = self.state.lock();
        if !state.open {
            return Err(VendorError::CallFailed { call: "start_stream", code: 1 });
        }
        state.streaming = true;
        state.start_command = Some(command.to_string());
        drop(state);
        self.last = None;
        self.tag = 0;
        Ok(())
    }

    fn stop_stream(&mut self, command: &str) -> Result<(), VendorError> {
        self.record("stop_stream", command);
        self.state.lock().streaming = false;
        Ok(())
    }

    fn config_board(&mut self, command: &str) -> Result<(), VendorError> {
        self.record("config_board", command);
        if self.state.lock().open {
            Ok(())
        } else {
            Err(VendorError::CallFailed { call: "config_board", code: 1 })
        }
    }

    fn get_data(&mut self) -> Option<GanglionFrame> {
        let impedance = {
            let state = self.state.lock();
            if !state.streaming || state.silent {
                return None;
            }
            state.start_command.as_deref() == Some("z")
        };
        if Instant::now() < self.next_frame {
            return None;
        }
        self.next_frame = Instant::now() + self.config.frame_interval;

        let data = if impedance {
            self.next_impedance_frame()
        } else {
            self.next_data_frame()
        };
        Some(GanglionFrame {
            data,
            timestamp: current_timestamp_secs(),
        })
    }

    fn close(&mut self) -> Result<(), VendorError> {
        self.record("close", "");
        let mut state = self.state.lock();
        state.open = false;
        state.streaming = false;
        Ok(())
    }

    fn release(&mut self) -> Result<(), VendorError> {
        self.record("release", "");
        self.state.lock().initialized = false;
        Ok(())
    }
}
