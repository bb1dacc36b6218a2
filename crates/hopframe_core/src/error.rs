//! Engine Error Types

use thiserror::Error;

use crate::config::CapacityConfig;

/// Reasons a configuration is refused before it reaches the components
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid channel count: {0}")]
    InvalidChannels(usize),

    #[error("Invalid maximum frame size: {0} (must be at least 2)")]
    InvalidMaxFrameSize(usize),

    #[error("{stage} frame size {frame_size} outside [{min}, {max}]")]
    FrameSizeOutOfRange {
        stage: &'static str,
        frame_size: usize,
        min: usize,
        max: usize,
    },

    #[error("Analysis hop size {0} must be 0 (disabled) or at least 1 sample")]
    InvalidAnalysisHop(f64),

    #[error("Analysis hop offset {0} must be finite")]
    InvalidAnalysisOffset(f64),

    #[error("Synthesis hop size {hop_size} outside [1, {frame_size}]")]
    SynthesisHopOutOfRange { hop_size: usize, frame_size: usize },

    #[error("Lookahead of {requested} frames exceeds maximum {max}")]
    LookaheadTooLong { requested: usize, max: usize },
}

/// Errors that can occur in the framing engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Framing error: {0}")]
    Framing(#[from] hopframe_dsp::FramingError),

    #[error("Capacity cannot change at runtime (running {running:?}, requested {requested:?})")]
    CapacityChanged {
        running: CapacityConfig,
        requested: CapacityConfig,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
