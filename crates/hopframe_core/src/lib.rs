//! Hopframe Core - Engine Composition and Configuration
//!
//! Builds on [`hopframe_dsp`] to provide a ready-made analysis/synthesis
//! engine driven by a serializable configuration:
//! - [`EngineConfig`]: capacity, analysis and synthesis parameters with presets
//! - [`FramingEngine`]: frame extraction on the dry input plus in-place
//!   overlap-add resynthesis with optional lookahead
//!
//! # Logging
//!
//! Configuration paths log through `tracing`. The per-block processing path
//! never logs.

mod config;
mod engine;
mod error;

pub use config::{AnalysisConfig, CapacityConfig, EngineConfig, SynthesisConfig};
pub use engine::FramingEngine;
pub use error::{ConfigError, EngineError, EngineResult};

// Re-export the primitives so most users only need this crate
pub use hopframe_dsp::{
    FrameContext, FrameExtractor, FrameMut, FrameProcessor, FramingError, Lookahead, OverlapAdd,
    Passthrough, ProcessorChain,
};
