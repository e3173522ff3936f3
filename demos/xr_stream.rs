//! XR Stream Demo
//!
//! Runs a full session against the in-process XR emulator: prepare, stream
//! for two seconds while mirroring to a CSV file, reconfigure, stop and
//! print a summary of the retrieved table.
//!
//! Set `BIOSIG_BOARD_IP_ADDRESS` (and optionally `BIOSIG_BOARD_IP_PORT`) to
//! talk to a real board instead.

use biosig_hal::board::{Board, BoardFactory, InstanceRegistry};
use biosig_hal::config::ConfigLoader;
use biosig_hal::hal::simulator::{SimulatorConfig, XrEmulator};
use biosig_hal::hal::BoardKind;
use biosig_hal::logging;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("biosig-hal XR Stream Demo");
    println!("=========================");

    let mut config = ConfigLoader::new().load()?;
    logging::init(&config.logging)?;

    // keep the emulator alive for the whole session
    let emulator = if config.board.ip_address.is_some() {
        None
    } else {
        let emulator = XrEmulator::spawn(SimulatorConfig::default())?;
        config.board.ip_address = Some("127.0.0.1".into());
        config.board.ip_port = Some(emulator.port());
        Some(emulator)
    };
    if !matches!(config.board.kind, BoardKind::AuraXr | BoardKind::NovaXr) {
        config.board.kind = BoardKind::AuraXr;
    }

    let registry = InstanceRegistry::new();
    let board = BoardFactory::create(&config, &registry)?;
    let descriptor = board.descriptor();
    println!("Board: {} ({} channels, {} Hz)", descriptor.name, descriptor.channel_count, descriptor.sampling_rate_hz);
    println!("Emulated: {}", emulator.is_some());

    run_session(&board, config.stream.buffer_capacity, config.stream.sink.as_deref())?;

    board.release_session()?;
    println!("Session released");
    Ok(())
}

fn run_session(board: &Board, capacity: usize, sink: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    board.prepare_session()?;
    println!("Session prepared");

    let sink = sink.unwrap_or("file://xr_stream.csv:w");
    board.start_stream(capacity, Some(sink))?;
    println!("Streaming into {}", sink);

    std::thread::sleep(Duration::from_secs(1));
    let ack = board.config_board("~6")?;
    println!("Reconfigured while streaming: {:?}", ack);
    std::thread::sleep(Duration::from_secs(1));

    board.stop_stream()?;
    let newest = board.get_current_board_data(5)?;
    let data = board.get_board_data(usize::MAX)?;
    println!();
    println!("Retrieved {} samples ({} rows)", data.ncols(), data.nrows());
    let timestamp_row = board.descriptor().timestamp_row;
    println!("Last timestamps: {:?}", newest.row(timestamp_row).to_vec());
    Ok(())
}
