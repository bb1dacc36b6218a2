//! Hopframe DSP - Block-size Decoupling and Real-time Framing
//!
//! This crate provides the framing primitives that sit between an audio
//! callback and frame-based payload code (windowing, FFT analysis,
//! spectral denoising, metering):
//! - [`CircularStream`]: multi-channel ring buffer in input or output mode
//! - [`FrameExtractor`]: arbitrary blocks in, fixed frames out at a fractional hop
//! - [`OverlapAdd`]: frame transform and overlap-add resynthesis in one pass
//! - [`FrameDelay`]: delay line measured in whole frames
//! - [`Lookahead`]: processor adapter realigning frames through a `FrameDelay`
//!
//! # Architecture
//!
//! Every buffer is allocated once, at construction, from the configured
//! channel and frame maxima. Processing calls never allocate, never lock and
//! never grow storage: a request beyond a maximum fails with
//! [`FramingError`] and leaves all state untouched.
//!
//! Configuration calls (`set_params`, `offset_hop`, `reset`) are deferred and
//! committed at the top of the next processing call. Configuration and
//! processing must run on the same thread or be serialized by the caller.

mod buffer;
mod circular;
mod delay;
mod error;
mod extractor;
mod lookahead;
mod overlap;
mod processor;

pub use buffer::{ChannelBuffer, FrameMut};
pub use circular::{CircularStream, StreamMode};
pub use delay::FrameDelay;
pub use error::{FramingError, FramingResult};
pub use extractor::FrameExtractor;
pub use lookahead::Lookahead;
pub use overlap::OverlapAdd;
pub use processor::{FrameContext, FrameProcessor, Passthrough, ProcessorChain};
