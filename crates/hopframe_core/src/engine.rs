//! Framing Engine - Analysis and Synthesis in One Callback
//!
//! Wires the primitives together the way a plugin uses them:
//!
//! ```text
//! block ──┬──> FrameExtractor<A>            (observes the dry input)
//!         │
//!         └──> OverlapAdd<Lookahead<S>> ──> block (rewritten in place)
//! ```
//!
//! Configuration is validated here, then staged on the components, which
//! commit it at the top of their next processing call.

use hopframe_dsp::{FrameExtractor, FrameProcessor, FramingError, Lookahead, OverlapAdd};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

pub struct FramingEngine<A: FrameProcessor, S: FrameProcessor> {
    config: EngineConfig,
    analysis: FrameExtractor<A>,
    synthesis: OverlapAdd<Lookahead<S>>,
    bypass: bool,
}

impl<A: FrameProcessor, S: FrameProcessor> FramingEngine<A, S> {
    /// Build an engine and preallocate every buffer from `config.capacity`.
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(config: EngineConfig, analysis: A, synthesis: S) -> EngineResult<Self> {
        config.validate()?;

        let capacity = config.capacity;
        let lookahead = Lookahead::new(
            synthesis,
            capacity.max_frame_size,
            capacity.max_channels,
            capacity.max_delay_frames,
        );

        let mut engine = Self {
            config: config.clone(),
            analysis: FrameExtractor::new(capacity.max_frame_size, capacity.max_channels, analysis),
            synthesis: OverlapAdd::new(capacity.max_frame_size, capacity.max_channels, lookahead),
            bypass: false,
        };
        engine.stage(None);

        info!(
            "Framing engine created: {} channels, analysis {}/{}, synthesis {}/{}, latency {} samples",
            capacity.max_channels,
            config.analysis.frame_size,
            config.analysis.hop_size,
            config.synthesis.frame_size,
            config.synthesis.hop_size,
            engine.latency_samples()
        );
        Ok(engine)
    }

    /// Validate `config` and stage it for the next [`process`](Self::process) call.
    ///
    /// Capacity is fixed at construction. On error the running configuration
    /// is left untouched.
    pub fn apply_config(&mut self, config: EngineConfig) -> EngineResult<()> {
        if let Err(e) = config.validate() {
            warn!("Rejected framing config: {}", e);
            return Err(e.into());
        }
        if config.capacity != self.config.capacity {
            warn!("Rejected framing config: capacity change requires a new engine");
            return Err(EngineError::CapacityChanged {
                running: self.config.capacity,
                requested: config.capacity,
            });
        }

        let previous = std::mem::replace(&mut self.config, config);
        self.stage(Some(&previous));

        info!(
            "Framing config staged: analysis {}/{}, synthesis {}/{} (lookahead {}), latency {} samples",
            self.config.analysis.frame_size,
            self.config.analysis.hop_size,
            self.config.synthesis.frame_size,
            self.config.synthesis.hop_size,
            self.config.synthesis.lookahead_frames,
            self.latency_samples()
        );
        Ok(())
    }

    /// Push the current config into the components, touching only what changed
    fn stage(&mut self, previous: Option<&EngineConfig>) {
        let analysis = self.config.analysis;
        if previous.map_or(true, |p| p.analysis != analysis) {
            // A new frame size or phase invalidates the history; a new hop alone keeps phase
            let immediate = previous.map_or(true, |p| {
                p.analysis.frame_size != analysis.frame_size
                    || p.analysis.hop_offset != analysis.hop_offset
            });
            let hop_offset = if immediate { analysis.hop_offset } else { 0.0 };
            self.analysis
                .set_params(analysis.frame_size, analysis.hop_size, immediate, hop_offset);
            debug!("Analysis params staged (immediate: {})", immediate);
        }

        let synthesis = self.config.synthesis;
        if previous.map_or(true, |p| p.synthesis != synthesis) {
            self.synthesis
                .set_params(synthesis.frame_size, synthesis.hop_size, synthesis.hop_offset);
            self.synthesis
                .processor_mut()
                .set_frames(synthesis.lookahead_frames);
            debug!("Synthesis params staged, overlap factor {}", synthesis.overlap_factor());
        }
    }

    /// Run analysis on the dry block, then resynthesize it in place.
    ///
    /// Channel count and buffer lengths are checked before either stage runs,
    /// so a rejected block leaves every component untouched.
    ///
    /// # Real-time Safety
    /// No allocations, no locks, no logging.
    pub fn process<U>(&mut self, buffers: &mut [U], n_samps: usize) -> EngineResult<()>
    where
        U: AsRef<[f32]> + AsMut<[f32]>,
    {
        let max_channels = self.config.capacity.max_channels;
        if buffers.len() > max_channels {
            return Err(FramingError::TooManyChannels {
                requested: buffers.len(),
                max: max_channels,
            }
            .into());
        }
        for (channel, buffer) in buffers.iter().enumerate() {
            let actual = buffer.as_ref().len();
            if actual < n_samps {
                return Err(FramingError::BufferTooShort {
                    channel,
                    required: n_samps,
                    actual,
                }
                .into());
            }
        }

        self.analysis.stream_to_frame(buffers, n_samps)?;
        if !self.bypass {
            self.synthesis.overlap_add_in_place(buffers, n_samps)?;
        }
        Ok(())
    }

    /// Schedule a reset of both paths for the next call
    pub fn reset(&mut self) {
        self.analysis.reset();
        self.synthesis.reset();
        debug!("Framing engine reset scheduled");
    }

    /// Delay between a sample entering and leaving the synthesis path
    pub fn latency_samples(&self) -> usize {
        self.config.synthesis.latency_samples()
    }

    /// Skip resynthesis and pass blocks through untouched.
    ///
    /// Leaving bypass restarts the synthesis path from silence so stale
    /// overlap from before the bypass is never played.
    pub fn set_bypass(&mut self, bypass: bool) {
        if self.bypass == bypass {
            return;
        }
        self.bypass = bypass;
        if !bypass {
            self.synthesis.reset();
        }
        info!("Framing engine bypass: {}", bypass);
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn analysis_processor(&self) -> &A {
        self.analysis.processor()
    }

    pub fn analysis_processor_mut(&mut self) -> &mut A {
        self.analysis.processor_mut()
    }

    pub fn synthesis_processor(&self) -> &S {
        self.synthesis.processor().inner()
    }

    pub fn synthesis_processor_mut(&mut self) -> &mut S {
        self.synthesis.processor_mut().inner_mut()
    }

    /// Shift the next analysis hop by `shift` samples
    pub fn offset_analysis_hop(&mut self, shift: f64) {
        self.analysis.offset_hop(shift);
    }
}
