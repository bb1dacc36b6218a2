//! Engine Configuration

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EngineResult};

/// Storage maxima, fixed for the lifetime of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityConfig {
    /// Largest frame any stage may use, in samples
    pub max_frame_size: usize,

    /// Number of audio channels buffers are allocated for
    pub max_channels: usize,

    /// Longest lookahead, in frames
    pub max_delay_frames: usize,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_frame_size: 2048,
            max_channels: 2,
            max_delay_frames: 8,
        }
    }
}

/// Analysis (frame extraction) parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub frame_size: usize,

    /// Samples between frames; fractional values allowed, 0 disables analysis
    pub hop_size: f64,

    /// Initial hop phase in samples
    #[serde(default)]
    pub hop_offset: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 512.0,
            hop_offset: 0.0,
        }
    }
}

impl AnalysisConfig {
    /// Frames emitted per second at `sample_rate`
    pub fn frame_rate(&self, sample_rate: f32) -> f32 {
        if self.hop_size <= 0.0 {
            0.0
        } else {
            (sample_rate as f64 / self.hop_size) as f32
        }
    }
}

/// Synthesis (overlap-add) parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub frame_size: usize,
    pub hop_size: usize,

    #[serde(default)]
    pub hop_offset: usize,

    /// Frames the transform output is held back by
    #[serde(default)]
    pub lookahead_frames: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            frame_size: 1024,
            hop_size: 256,
            hop_offset: 0,
            lookahead_frames: 0,
        }
    }
}

impl SynthesisConfig {
    /// How many frames cover each output sample
    pub fn overlap_factor(&self) -> f32 {
        self.frame_size as f32 / self.hop_size.max(1) as f32
    }

    /// Input-to-output delay in samples
    pub fn latency_samples(&self) -> usize {
        self.frame_size + self.lookahead_frames * self.hop_size
    }

    /// Input-to-output delay in milliseconds at `sample_rate`
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.latency_samples() as f32 / sample_rate as f32) * 1000.0
    }
}

/// Overall engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub capacity: CapacityConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

impl EngineConfig {
    /// Create config optimized for low latency
    pub fn low_latency() -> Self {
        Self {
            capacity: CapacityConfig {
                max_frame_size: 512,
                max_channels: 2,
                max_delay_frames: 2,
            },
            analysis: AnalysisConfig {
                frame_size: 512,
                hop_size: 128.0,
                hop_offset: 0.0,
            },
            synthesis: SynthesisConfig {
                frame_size: 256, // ~5.3ms at 48kHz
                hop_size: 128,
                hop_offset: 0,
                lookahead_frames: 0,
            },
        }
    }

    /// Create config optimized for frequency resolution
    pub fn high_resolution() -> Self {
        Self {
            capacity: CapacityConfig {
                max_frame_size: 4096,
                max_channels: 2,
                max_delay_frames: 8,
            },
            analysis: AnalysisConfig {
                frame_size: 4096,
                hop_size: 1024.0,
                hop_offset: 0.0,
            },
            synthesis: SynthesisConfig {
                frame_size: 4096,
                hop_size: 1024,
                hop_offset: 0,
                lookahead_frames: 2,
            },
        }
    }

    /// Validate configuration
    ///
    /// Stricter than the components themselves: values they would silently
    /// clamp are rejected here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacity = &self.capacity;
        if capacity.max_channels == 0 {
            return Err(ConfigError::InvalidChannels(capacity.max_channels));
        }
        if capacity.max_frame_size < 2 {
            return Err(ConfigError::InvalidMaxFrameSize(capacity.max_frame_size));
        }

        let analysis = &self.analysis;
        if analysis.frame_size == 0 || analysis.frame_size > capacity.max_frame_size {
            return Err(ConfigError::FrameSizeOutOfRange {
                stage: "analysis",
                frame_size: analysis.frame_size,
                min: 1,
                max: capacity.max_frame_size,
            });
        }
        let hop = analysis.hop_size;
        if !hop.is_finite() || (hop != 0.0 && hop < 1.0) {
            return Err(ConfigError::InvalidAnalysisHop(hop));
        }
        if !analysis.hop_offset.is_finite() {
            return Err(ConfigError::InvalidAnalysisOffset(analysis.hop_offset));
        }

        let synthesis = &self.synthesis;
        if synthesis.frame_size < 2 || synthesis.frame_size > capacity.max_frame_size {
            return Err(ConfigError::FrameSizeOutOfRange {
                stage: "synthesis",
                frame_size: synthesis.frame_size,
                min: 2,
                max: capacity.max_frame_size,
            });
        }
        if synthesis.hop_size == 0 || synthesis.hop_size > synthesis.frame_size {
            return Err(ConfigError::SynthesisHopOutOfRange {
                hop_size: synthesis.hop_size,
                frame_size: synthesis.frame_size,
            });
        }
        if synthesis.lookahead_frames > capacity.max_delay_frames {
            return Err(ConfigError::LookaheadTooLong {
                requested: synthesis.lookahead_frames,
                max: capacity.max_delay_frames,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Self::default()),
            "low-latency" => Some(Self::low_latency()),
            "high-resolution" => Some(Self::high_resolution()),
            _ => None,
        }
    }
}
