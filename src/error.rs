//! Error handling for the soundscape engine.
//!
//! Nothing in the engine aborts the process: every failure below degrades to
//! silence or a no-op at the call site, plus a diagnostic.

use thiserror::Error;

use crate::engine::EngineState;
use crate::layer::LayerId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AmbientError>;

/// Main error type for engine operations.
#[derive(Error, Debug)]
pub enum AmbientError {
    /// An audio node or the output device could not be allocated.
    #[error("initialization failed: {reason}")]
    Initialization { reason: String },

    /// A single note/noise event could not be placed on the transport.
    #[error("could not schedule {layer} event at {at_seconds:.3}s: {reason}")]
    Schedule {
        layer: LayerId,
        at_seconds: f64,
        reason: String,
    },

    #[error("{layer} layer has been disposed")]
    LayerDisposed { layer: LayerId },

    #[error("engine is {state}, operation requires a ready engine")]
    NotReady { state: EngineState },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("audio device error: {reason}")]
    Device { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV export error: {0}")]
    Wav(#[from] hound::Error),
}

impl AmbientError {
    /// Stable code for this error, suitable for logs and the JS facade.
    pub fn error_code(&self) -> &'static str {
        match self {
            AmbientError::Initialization { .. } => "INITIALIZATION_ERROR",
            AmbientError::Schedule { .. } => "SCHEDULE_FAILURE",
            AmbientError::LayerDisposed { .. } => "LAYER_DISPOSED",
            AmbientError::NotReady { .. } => "NOT_READY",
            AmbientError::Config { .. } => "CONFIG_ERROR",
            AmbientError::Device { .. } => "DEVICE_ERROR",
            AmbientError::Io(_) => "IO_ERROR",
            AmbientError::Json(_) => "SERIALIZATION_ERROR",
            AmbientError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Whether the caller may retry the failed operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AmbientError::Initialization { .. }
                | AmbientError::Schedule { .. }
                | AmbientError::Device { .. }
        )
    }

    pub(crate) fn init(reason: impl Into<String>) -> Self {
        AmbientError::Initialization {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        AmbientError::Config {
            reason: reason.into(),
        }
    }
}
