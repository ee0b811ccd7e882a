//! Error types for the I/O subsystem.
//!
//! The only soft failure in the subsystem (a disk unit that cannot be opened)
//! is reported through the controller status word and never shows up here.
//! Everything in [`PioError`] is fatal to the emulation: the caller is expected
//! to print the diagnostic and stop.

use thiserror::Error;

use crate::dispatch::IoClass;

/// Errors that terminate emulation.
#[derive(Error, Debug)]
pub enum PioError {
    #[error("unimplemented {class} device '{device:02o} function '{func:02o}")]
    Unsupported { class: IoClass, func: u8, device: u8 },

    #[error("word '{0:06o} is not an I/O instruction")]
    NotIoInstruction(u16),

    #[error("unrecognized channel order {order} at '{oar:o}")]
    UnrecognizedOrder { order: u8, oar: u16 },

    #[error("channel program interrupt through '{vector:o} at '{oar:o} is not supported")]
    InterruptOrder { vector: u16, oar: u16 },

    #[error("device '{0:02o} not supported, so I/O hangs")]
    DeviceHang(u8),

    #[error("DMA channel '{channel:o} count register '{register:06o} is not a negative word count")]
    InvalidDmaCount { channel: u16, register: u16 },

    #[error("short read from {file}: expected {expected} bytes, got {got}")]
    ShortRead {
        file: String,
        expected: usize,
        got: usize,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for I/O subsystem operations.
pub type PioResult<T> = Result<T, PioError>;
