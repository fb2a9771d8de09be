//! The byte-stream the bus runs over.

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, Parity, StopBits};

use crate::bus::BusError;

/// Anything the bus can run over: the real serial port, or the loopback
/// used for offline runs and tests.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

/// Opens the servo serial port: 1 Mbps, 8N1, 1-second timeout.
///
/// The timeout bounds every bus read; a servo that fails to answer within
/// it surfaces as a timeout error, which the orchestrator treats as fatal.
pub fn open_serial(path: &str) -> Result<Box<dyn Transport>, BusError> {
    let port = serialport::new(path, 1_000_000)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_secs(1))
        .open()
        .map_err(|e| BusError::Open {
            path: path.to_owned(),
            source: e,
        })?;
    Ok(Box::new(port))
}
