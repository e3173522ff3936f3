// tests/xr_session.rs
//! XR boards driven end to end against the UDP emulator

use biosig_hal::board::{Board, InstanceRegistry, XrBoard, XrFlavor};
use biosig_hal::config::constants::xr::TRANSACTION_SIZE;
use biosig_hal::hal::simulator::{SimulatorConfig, XrEmulator};
use biosig_hal::hal::transport::LoopbackTransport;
use biosig_hal::hal::{BoardState, ConfigAck, IpProtocol};
use biosig_hal::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn xr_board(flavor: XrFlavor, emulator: &XrEmulator, registry: &InstanceRegistry) -> Board {
    let driver = XrBoard::udp(flavor, Some("127.0.0.1"), Some(emulator.port()), IpProtocol::Udp)
        .with_drain_timeout(Duration::from_millis(50));
    Board::new(Box::new(driver), registry.clone())
}

#[test]
fn test_full_session_against_emulator() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).expect("Failed to start emulator");
    let registry = InstanceRegistry::new();
    let board = xr_board(XrFlavor::Aura, &emulator, &registry);

    board.prepare_session().expect("Failed to prepare");
    assert_eq!(emulator.commands(), vec!["d", "~6"]);

    board.start_stream(10_000, None).expect("Failed to start stream");
    assert_eq!(board.state(), BoardState::Streaming);
    std::thread::sleep(Duration::from_millis(150));

    // inline while streaming, no ack is awaited
    assert_eq!(board.config_board("x1").unwrap(), ConfigAck::Accepted);

    board.stop_stream().expect("Failed to stop stream");
    assert!(!emulator.is_streaming());
    assert_eq!(emulator.commands(), vec!["d", "~6", "b", "x1", "s"]);

    let count = board.get_board_data_count().unwrap();
    assert!(count >= 19, "expected at least one transaction, got {}", count);
    assert_eq!(count % 19, 0);

    let data = board.get_board_data(count).unwrap();
    assert_eq!(data.nrows(), 23);
    let timestamps = data.row(22);
    for pair in timestamps.as_slice().unwrap().windows(2) {
        assert!(pair[1] >= pair[0]);
    }

    board.release_session().unwrap();
    assert_eq!(board.state(), BoardState::Released);
}

#[test]
fn test_nova_uses_its_own_rate_command() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    let board = xr_board(XrFlavor::Nova, &emulator, &InstanceRegistry::new());

    board.prepare_session().unwrap();
    assert_eq!(emulator.commands(), vec!["d", "~5"]);
    assert_eq!(board.descriptor().sampling_rate_hz, 500);
}

#[test]
fn test_config_ack_when_not_streaming() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    emulator.reject("x9");
    let board = xr_board(XrFlavor::Aura, &emulator, &InstanceRegistry::new());
    board.prepare_session().unwrap();

    assert_eq!(board.config_board("x1").unwrap(), ConfigAck::Accepted);
    assert_eq!(board.config_board("x9").unwrap(), ConfigAck::Invalid);
}

#[test]
fn test_rejected_default_setting_fails_prepare() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    emulator.reject("~6");
    let board = xr_board(XrFlavor::Aura, &emulator, &InstanceRegistry::new());

    let err = board.prepare_session().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WriteFailure);
    assert_eq!(board.state(), BoardState::Unprepared);
}

#[test]
fn test_silent_board_times_out_and_stays_prepared() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    emulator.set_silent(true);
    let board = xr_board(XrFlavor::Aura, &emulator, &InstanceRegistry::new());
    board.prepare_session().unwrap();

    let err = board.start_stream(1000, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SynchronizationTimeout);
    assert_eq!(board.state(), BoardState::Prepared);
    assert_eq!(emulator.commands().last().map(String::as_str), Some("s"));

    // the buffer allocated for the failed start is still readable
    assert_eq!(board.get_board_data_count().unwrap(), 0);

    emulator.set_silent(false);
    board.start_stream(1000, None).expect("Restart after timeout failed");
    board.stop_stream().unwrap();
}

#[test]
fn test_invalid_capacity_does_no_io() {
    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    let board = xr_board(XrFlavor::Aura, &emulator, &InstanceRegistry::new());
    board.prepare_session().unwrap();

    for capacity in [0, usize::MAX] {
        let err = board.start_stream(capacity, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(emulator.commands(), vec!["d", "~6"]);
}

#[test]
fn test_file_sink_mirrors_every_sample() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.csv");
    let descriptor = format!("file://{}:w", path.display());

    let emulator = XrEmulator::spawn(SimulatorConfig::default()).unwrap();
    let board = xr_board(XrFlavor::Aura, &emulator, &InstanceRegistry::new());
    board.prepare_session().unwrap();
    board.start_stream(100_000, Some(&descriptor)).unwrap();
    std::thread::sleep(Duration::from_millis(100));
    board.stop_stream().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<&str> = content.lines().collect();
    assert_eq!(rows.len(), board.get_board_data_count().unwrap());
    assert_eq!(rows[0].split(',').count(), 23);
}

#[test]
fn test_config_against_runaway_stream_is_bounded() {
    let (host, device) = LoopbackTransport::pair();
    let driver = XrBoard::new(XrFlavor::Aura, Box::new(host)).with_ack_timeout(Duration::from_millis(200));
    let board = Board::new(Box::new(driver), InstanceRegistry::new());

    device.send(b"A".to_vec());
    device.send(b"A".to_vec());
    board.prepare_session().unwrap();

    // the device ignores everything and keeps sending full transactions
    let running = Arc::new(AtomicBool::new(true));
    let feeder = {
        let running = Arc::clone(&running);
        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                device.send(vec![0u8; TRANSACTION_SIZE]);
                std::thread::sleep(Duration::from_millis(1));
            }
        })
    };

    let started = Instant::now();
    let err = board.config_board("x1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(board.state(), BoardState::Prepared);

    running.store(false, Ordering::Relaxed);
    feeder.join().unwrap();
    board.release_session().unwrap();
}
