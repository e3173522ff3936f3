// src/config/constants.rs
//! Board-wide constants: capture limits, timeouts, wire sizes and scales

/// Sample buffer limits
pub mod buffer {
    /// Upper bound for `start_stream` buffer capacity (one day at 250 Hz)
    pub const MAX_CAPTURE_SAMPLES: usize = 86_400 * 250;
    pub const DEFAULT_BUFFER_CAPACITY: usize = 450_000;
}

/// Timing constants shared by the session controller and workers
pub mod timing {
    use std::time::Duration;

    /// Default startup window for boards without a configurable timeout
    pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5);
    /// Per-call transport read timeout used while streaming
    pub const STREAM_READ_TIMEOUT: Duration = Duration::from_millis(100);
    /// Sleep between empty polls of a vendor library
    pub const VENDOR_POLL_INTERVAL: Duration = Duration::from_millis(10);
    /// Read timeout used while draining a device after the stop command
    pub const DRAIN_READ_TIMEOUT: Duration = Duration::from_secs(2);
    /// Read timeout restored once draining completes
    pub const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(5);
    pub const MAX_DRAIN_ATTEMPTS: u32 = 25;
}

/// Serial (Cyton-family) constants
pub mod serial {
    use std::time::Duration;

    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    pub const PACKET_SIZE: usize = 33;
    pub const START_BYTE: u8 = 0xA0;
    pub const STOP_BYTE_MIN: u8 = 0xC0;
    pub const STOP_BYTE_MAX: u8 = 0xCF;
    /// Stop byte marking accelerometer data in the aux bytes
    pub const STOP_BYTE_ACCEL: u8 = 0xC0;
    /// Stop byte marking analog reads in the aux bytes
    pub const STOP_BYTE_ANALOG: u8 = 0xC1;
    pub const WELCOME_MARKER: &[u8] = b"$$$";
    pub const MAX_WELCOME_READS: usize = 500;
    pub const MAX_EMPTY_WELCOME_READS: usize = 5;
    pub const HANDSHAKE_READ_TIMEOUT: Duration = Duration::from_secs(1);
    pub const OPEN_RETRY_ATTEMPTS: u32 = 3;
    pub const OPEN_RETRY_BASE_DELAY_MS: u64 = 100;
}

/// UDP XR-family constants
pub mod xr {
    pub const DEFAULT_IP_ADDRESS: &str = "192.168.4.1";
    pub const DEFAULT_PORT: u16 = 2390;
    pub const PACKAGE_SIZE: usize = 72;
    pub const PACKAGES_PER_TRANSACTION: usize = 19;
    pub const TRANSACTION_SIZE: usize = PACKAGE_SIZE * PACKAGES_PER_TRANSACTION;
    /// Receive buffer used for config acknowledgements
    pub const MAX_RESPONSE_SIZE: usize = 8192;
    pub const RESET_COMMAND: &str = "d";
    pub const AURA_SAMPLING_RATE_COMMAND: &str = "~6";
    pub const NOVA_SAMPLING_RATE_COMMAND: &str = "~5";
    pub const TRANSACTION_ACK: &[u8] = b"a";
}

/// Ganglion constants
pub mod ganglion {
    use std::time::Duration;

    pub const FRAME_SIZE: usize = 20;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const MAX_TIMEOUT_SECS: u64 = 600;
    pub const DEFAULT_START_COMMAND: &str = "b";
    pub const DEFAULT_STOP_COMMAND: &str = "s";
    pub const IMPEDANCE_START_COMMAND: &str = "z";
    pub const IMPEDANCE_STOP_COMMAND: &str = "Z";
}

/// Channel scales, in microvolts per LSB unless noted
pub mod scale {
    pub const ADS1299_VREF: f64 = 4.5;
    const FULL_SCALE: f64 = 8_388_607.0; // 2^23 - 1

    pub const XR_EEG_MAIN_BOARD: f64 = ADS1299_VREF / FULL_SCALE / 8.0 * 1_000_000.0;
    pub const XR_EEG_SISTER_BOARD: f64 = ADS1299_VREF / FULL_SCALE / 12.0 * 1_000_000.0;
    pub const XR_EMG: f64 = ADS1299_VREF / FULL_SCALE / 4.0 * 1_000_000.0;

    pub const CYTON_EEG: f64 = ADS1299_VREF / FULL_SCALE / 24.0 * 1_000_000.0;
    /// g per LSB
    pub const CYTON_ACCEL: f64 = 0.002 / 16.0;

    pub const GANGLION_EEG: f64 = 1_200_000.0 / (FULL_SCALE * 1.5 * 51.0);
    /// g per LSB
    pub const GANGLION_ACCEL: f64 = 0.032;
}

/// Configuration discovery
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "biosig.toml";
    pub const LOCAL_CONFIG_FILE: &str = "biosig.local.toml";
    pub const ENV_PREFIX: &str = "BIOSIG_";
}
