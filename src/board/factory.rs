// src/board/factory.rs
//! Build a [`Board`] from a [`BoardConfig`]

use crate::board::cyton::CytonBoard;
use crate::board::ganglion::GanglionBoard;
use crate::board::registry::InstanceRegistry;
use crate::board::session::Board;
use crate::board::xr::{XrBoard, XrFlavor};
use crate::config::BoardConfig;
use crate::error::{BoardError, BoardResult};
use crate::hal::traits::BoardDriver;
use crate::hal::types::BoardKind;
use crate::hal::vendor::GanglionLibrary;
use tracing::debug;

pub struct BoardFactory;

impl BoardFactory {
    /// Board over the transport its model uses: a serial port for Cyton and
    /// UDP for the XR family. Ganglion needs a vendor library, see
    /// [`BoardFactory::create_with_library`].
    pub fn create(config: &BoardConfig, registry: &InstanceRegistry) -> BoardResult<Board> {
        let driver = Self::driver(config)?;
        Ok(Board::new(driver, registry.clone()))
    }

    /// Ganglion board backed by `library`
    pub fn create_with_library(
        config: &BoardConfig,
        registry: &InstanceRegistry,
        library: Box<dyn GanglionLibrary>,
    ) -> BoardResult<Board> {
        if config.board.kind != BoardKind::Ganglion {
            return Err(BoardError::invalid(format!(
                "a vendor library only drives ganglion boards, not {}",
                config.board.kind
            )));
        }
        let settings = &config.board;
        let driver = GanglionBoard::new(
            library,
            settings.serial_port.clone(),
            settings.mac_address.clone(),
            settings.timeout_s,
        );
        Ok(Board::new(Box::new(driver), registry.clone()))
    }

    fn driver(config: &BoardConfig) -> BoardResult<Box<dyn BoardDriver>> {
        let settings = &config.board;
        debug!(board = %settings.kind, "creating board driver");
        let driver: Box<dyn BoardDriver> = match settings.kind {
            BoardKind::Cyton => Box::new(CytonBoard::serial(
                settings.serial_port.as_deref(),
                Some(settings.baud_rate),
            )),
            BoardKind::AuraXr | BoardKind::NovaXr => {
                let flavor = if settings.kind == BoardKind::AuraXr {
                    XrFlavor::Aura
                } else {
                    XrFlavor::Nova
                };
                Box::new(XrBoard::udp(
                    flavor,
                    settings.ip_address.as_deref(),
                    settings.ip_port,
                    settings.ip_protocol,
                ))
            }
            BoardKind::Ganglion => {
                return Err(BoardError::invalid(
                    "ganglion requires a vendor library binding, use create_with_library",
                ))
            }
        };
        Ok(driver)
    }
}
