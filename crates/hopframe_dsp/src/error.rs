//! Framing Error Types

use thiserror::Error;

use crate::circular::StreamMode;

/// Capacity violations reported by the framing primitives.
///
/// Every variant means the call was dropped as a whole: nothing was
/// written, read or advanced on any channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Too many channels: requested {requested}, configured for {max}")]
    TooManyChannels { requested: usize, max: usize },

    #[error("Block of {requested} samples exceeds ring capacity {capacity}")]
    BlockTooLarge { requested: usize, capacity: usize },

    #[error("Frame size {requested} exceeds maximum {max}")]
    FrameTooLarge { requested: usize, max: usize },

    #[error("Delay of {requested} frames exceeds maximum {max}")]
    DelayTooLong { requested: usize, max: usize },

    #[error("Channel {channel} buffer too short: need {required} samples, got {actual}")]
    BufferTooShort {
        channel: usize,
        required: usize,
        actual: usize,
    },

    #[error("Not enough output accumulated: requested {requested}, {available} available")]
    NotEnoughOutput { requested: usize, available: usize },

    #[error("Invalid frame size: {0}")]
    InvalidFrameSize(usize),

    #[error("Output has {output} channels, input has {input}")]
    ChannelMismatch { input: usize, output: usize },

    #[error("Operation requires a stream in {expected:?} mode")]
    WrongMode { expected: StreamMode },
}

/// Result type alias for framing operations
pub type FramingResult<T> = Result<T, FramingError>;

/// Check that each caller slice holds at least `required` samples.
pub(crate) fn check_lengths<T: AsRef<[f32]>>(buffers: &[T], required: usize) -> FramingResult<()> {
    for (channel, buffer) in buffers.iter().enumerate() {
        let actual = buffer.as_ref().len();
        if actual < required {
            return Err(FramingError::BufferTooShort {
                channel,
                required,
                actual,
            });
        }
    }
    Ok(())
}

/// Mutable counterpart of [`check_lengths`].
pub(crate) fn check_lengths_mut<T: AsMut<[f32]>>(
    buffers: &mut [T],
    required: usize,
) -> FramingResult<()> {
    for (channel, buffer) in buffers.iter_mut().enumerate() {
        let actual = buffer.as_mut().len();
        if actual < required {
            return Err(FramingError::BufferTooShort {
                channel,
                required,
                actual,
            });
        }
    }
    Ok(())
}
