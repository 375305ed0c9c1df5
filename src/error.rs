//! Error types for the shadow-casting engine

use thiserror::Error;

/// Engine-level errors surfaced to the host
#[derive(Debug, Error)]
pub enum EngineError {
    /// The host runs the engine inside a sandbox without renderer access
    #[error("shadow casting must run outside the sandbox")]
    Sandboxed,

    /// A block opcode the command surface does not know
    #[error("unknown block opcode: {0}")]
    UnknownOpcode(String),

    /// Block arguments were not an object
    #[error("block arguments for {opcode} must be an object")]
    InvalidArguments { opcode: String },

    /// Writing an overlay to disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to read a sprite's current costume pixels
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OccluderError {
    /// The costume is still loading
    #[error("costume for sprite '{0}' is not loaded yet")]
    NotLoaded(String),

    /// The pixel buffer does not match the reported dimensions
    #[error("pixel buffer is {got} bytes, expected {expected} for {width}x{height}")]
    Malformed {
        width: usize,
        height: usize,
        expected: usize,
        got: usize,
    },
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
