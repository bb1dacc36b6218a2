//! Frame Extractor
//!
//! Decouples the caller's per-call block length from a fixed analysis
//! frame. Incoming samples are accumulated in an input-mode
//! [`CircularStream`]; every `hop_size` samples (fractional hops allowed)
//! the most recent `frame_size` samples are copied out and handed to the
//! processor.
//!
//! # Deferred configuration
//!
//! `set_params`, `offset_hop` and `reset` only record a request. The
//! request is committed at the top of the next `stream_to_frame` call, so
//! reconfiguring never tears a block in half. This is NOT a thread-safety
//! mechanism: configuration and processing must be serialized by the caller.

use crate::buffer::ChannelBuffer;
use crate::circular::{CircularStream, StreamMode};
use crate::error::{check_lengths, FramingError, FramingResult};
use crate::processor::{FrameContext, FrameProcessor};

/// Configuration waiting for the next processing call
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingParams {
    frame_size: usize,
    hop_size: f64,
    reset_stream: bool,
    /// Hard value for the hop counter, replacing the running count
    hop_counter: Option<f64>,
    /// Additive one-shot nudge to the hop counter
    hop_shift: f64,
}

pub struct FrameExtractor<P: FrameProcessor> {
    stream: CircularStream,
    frame: ChannelBuffer,
    frame_size: usize,
    hop_size: f64,
    /// Hop position at the last fire or commit
    hop_counter: f64,
    /// Whole samples streamed since `hop_counter` was last settled. Kept
    /// apart so the float position never depends on call boundaries.
    elapsed: usize,
    pending: PendingParams,
    processor: P,
}

/// Normalise a requested hop: `0` (or NaN) disables, anything else is at least one sample
fn clamp_hop(hop_size: f64) -> f64 {
    let hop = hop_size.abs();
    if hop.is_nan() || hop == 0.0 {
        0.0
    } else {
        hop.max(1.0)
    }
}

/// Offset reported for a hop counter left after a fire
fn fractional_offset(hop_counter: f64) -> f64 {
    let remainder = hop_counter.fract();
    if remainder <= 0.0 {
        0.0
    } else {
        (1.0 - remainder).clamp(0.0, 1.0 - f64::EPSILON)
    }
}

impl<P: FrameProcessor> FrameExtractor<P> {
    /// Create an extractor for frames up to `max_frame_size` samples.
    ///
    /// Starts with `frame_size = max_frame_size` and the hop disabled.
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(max_frame_size: usize, max_channels: usize, processor: P) -> Self {
        let max_frame_size = max_frame_size.max(1);
        Self {
            stream: CircularStream::new(max_frame_size, max_channels, StreamMode::Input),
            frame: ChannelBuffer::new(max_channels, max_frame_size),
            frame_size: max_frame_size,
            hop_size: 0.0,
            hop_counter: 0.0,
            elapsed: 0,
            pending: PendingParams {
                frame_size: max_frame_size,
                hop_size: 0.0,
                reset_stream: false,
                hop_counter: None,
                hop_shift: 0.0,
            },
            processor,
        }
    }

    /// Request a new frame and hop size.
    ///
    /// With `immediate`, the hop counter restarts at `hop_offset` and the
    /// sample history is cleared. Otherwise the running hop phase is kept and
    /// `hop_offset` is applied as a one-shot nudge (see [`offset_hop`]).
    ///
    /// [`offset_hop`]: FrameExtractor::offset_hop
    pub fn set_params(&mut self, frame_size: usize, hop_size: f64, immediate: bool, hop_offset: f64) {
        self.pending.frame_size = frame_size.clamp(1, self.stream.capacity());
        self.pending.hop_size = clamp_hop(hop_size);
        if immediate {
            // A non-finite start would never reach a boundary
            self.pending.hop_counter = Some(if hop_offset.is_finite() { hop_offset } else { 0.0 });
            self.pending.hop_shift = 0.0;
            self.pending.reset_stream = true;
        } else {
            self.offset_hop(hop_offset);
        }
    }

    /// Shift the next hop by `shift` samples (positive fires sooner)
    pub fn offset_hop(&mut self, shift: f64) {
        if shift.is_finite() {
            self.pending.hop_shift += shift;
        }
    }

    /// Schedule a full reset of history and hop phase for the next call
    pub fn reset(&mut self) {
        self.pending.reset_stream = true;
        self.pending.hop_counter = Some(0.0);
        self.pending.hop_shift = 0.0;
    }

    /// Latest requested frame size
    pub fn frame_size(&self) -> usize {
        self.pending.frame_size
    }

    /// Latest requested hop size (`0` = disabled)
    pub fn hop_size(&self) -> f64 {
        self.pending.hop_size
    }

    pub fn max_frame_size(&self) -> usize {
        self.stream.capacity()
    }

    pub fn max_channels(&self) -> usize {
        self.stream.channels()
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    pub fn into_processor(self) -> P {
        self.processor
    }

    /// Swap pending configuration into the active state
    fn commit_pending(&mut self) {
        let pending = &mut self.pending;
        if pending.reset_stream {
            self.stream.reset();
            self.processor.reset();
            pending.reset_stream = false;
        }
        if let Some(counter) = pending.hop_counter.take() {
            self.hop_counter = counter;
            self.elapsed = 0;
        }
        if pending.hop_shift != 0.0 {
            self.hop_counter += self.elapsed as f64 + pending.hop_shift;
            self.elapsed = 0;
            pending.hop_shift = 0.0;
        }
        self.frame_size = pending.frame_size;
        self.hop_size = pending.hop_size;
    }

    /// Feed `n_samps` samples per channel, firing the processor on every hop.
    ///
    /// The emitted frames depend only on the sample sequence, never on how
    /// it is split across calls.
    ///
    /// # Real-time Safety
    /// No allocations. O(channels × (n_samps + frames fired × frame_size)).
    pub fn stream_to_frame<T: AsRef<[f32]>>(&mut self, channels: &[T], n_samps: usize) -> FramingResult<()> {
        let n_chans = channels.len();
        if n_chans > self.stream.channels() {
            return Err(FramingError::TooManyChannels {
                requested: n_chans,
                max: self.stream.channels(),
            });
        }
        check_lengths(channels, n_samps)?;

        self.commit_pending();

        let mut position = 0;
        while position < n_samps {
            let remaining = n_samps - position;
            if self.hop_size <= 0.0 {
                self.write_chunk(channels, position, remaining)?;
                break;
            }

            // Whole samples from the last settle point to the next boundary
            let target = (self.hop_size - self.hop_counter).ceil().max(0.0) as usize;
            let until_hop = target.saturating_sub(self.elapsed);
            if until_hop > 0 {
                let chunk = until_hop.min(remaining);
                self.write_chunk(channels, position, chunk)?;
                self.elapsed += chunk;
                position += chunk;
            }

            if self.elapsed >= target {
                self.fire(n_chans)?;
            }
        }
        Ok(())
    }

    /// Write through the ring in pieces no larger than its capacity
    fn write_chunk<T: AsRef<[f32]>>(&mut self, channels: &[T], offset: usize, len: usize) -> FramingResult<()> {
        let capacity = self.stream.capacity();
        let mut written = 0;
        while written < len {
            let piece = (len - written).min(capacity);
            self.stream.write(channels, piece, offset + written)?;
            written += piece;
        }
        Ok(())
    }

    fn fire(&mut self, n_chans: usize) -> FramingResult<()> {
        // Closed form: a large shift collapses to a single fire
        let counter = self.hop_counter + self.elapsed as f64;
        self.hop_counter = ((counter - self.hop_size) % self.hop_size).max(0.0);
        self.elapsed = 0;
        let context = FrameContext::new(n_chans, self.frame_size, fractional_offset(self.hop_counter));

        let mut frame = self.frame.frame_mut(n_chans, self.frame_size);
        self.stream.read_frame(&mut frame)?;
        self.processor.process(&mut frame, &context);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameMut;

    /// Records every frame (first channel) and offset it is handed
    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<f32>>,
        offsets: Vec<f64>,
        channels: Vec<usize>,
    }

    impl FrameProcessor for Recorder {
        fn process(&mut self, frame: &mut FrameMut<'_>, context: &FrameContext) {
            self.frames.push(frame.channel(0).to_vec());
            self.offsets.push(context.fractional_offset);
            self.channels.push(context.channels);
        }
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_disabled_hop_never_fires() {
        let mut extractor = FrameExtractor::new(16, 1, Recorder::default());
        extractor.stream_to_frame(&[ramp(100)], 100).unwrap();
        assert!(extractor.processor().frames.is_empty());
    }

    #[test]
    fn test_fires_once_per_hop() {
        let mut extractor = FrameExtractor::new(8, 1, Recorder::default());
        extractor.set_params(4, 2.0, true, 0.0);

        let input = ramp(10);
        for chunk in input.chunks(3) {
            extractor.stream_to_frame(&[chunk], chunk.len()).unwrap();
        }

        let recorder = extractor.processor();
        assert_eq!(recorder.frames.len(), 5);
        assert_eq!(recorder.frames[0], vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(recorder.frames[1], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(recorder.frames[4], vec![6.0, 7.0, 8.0, 9.0]);
        assert!(recorder.offsets.iter().all(|&o| o == 0.0));
    }

    #[test]
    fn test_fractional_hop_offsets() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 2.5, true, 0.0);
        extractor.stream_to_frame(&[ramp(10)], 10).unwrap();

        // Boundaries at 2.5, 5.0, 7.5, 10.0 land after samples 3, 5, 8, 10
        let recorder = extractor.processor();
        assert_eq!(recorder.frames.len(), 4);
        assert_eq!(recorder.frames[0], vec![0.0, 0.0, 1.0, 2.0]);
        assert_eq!(recorder.frames[1], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(recorder.offsets, vec![0.5, 0.0, 0.5, 0.0]);
    }

    #[test]
    fn test_immediate_offset_advances_first_hop() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(2, 4.0, true, 3.0);
        let input: Vec<f32> = (1..=6).map(|i| i as f32).collect();
        extractor.stream_to_frame(&[input], 6).unwrap();

        assert_eq!(
            extractor.processor().frames,
            vec![vec![0.0, 1.0], vec![4.0, 5.0]]
        );
    }

    #[test]
    fn test_offset_hop_is_one_shot() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 4.0, true, 0.0);
        extractor.stream_to_frame(&[ramp(2)], 2).unwrap();

        // Pull the next hop two samples earlier
        extractor.offset_hop(2.0);
        extractor.stream_to_frame(&[ramp(1)], 1).unwrap();
        assert_eq!(extractor.processor().frames.len(), 1);

        extractor.stream_to_frame(&[ramp(4)], 4).unwrap();
        assert_eq!(extractor.processor().frames.len(), 2);
    }

    #[test]
    fn test_large_shift_fires_once() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 2.0, true, 0.0);
        extractor.offset_hop(1.0e6);
        extractor.stream_to_frame(&[ramp(1)], 1).unwrap();
        assert_eq!(extractor.processor().frames.len(), 1);
    }

    #[test]
    fn test_reset_is_deferred() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 4.0, true, 0.0);
        extractor.stream_to_frame(&[[1.0, 1.0, 1.0]], 3).unwrap();

        extractor.reset();
        extractor.stream_to_frame(&[[2.0, 2.0, 2.0, 2.0]], 4).unwrap();

        // Hop count restarted and history was cleared before the new samples
        let recorder = extractor.processor();
        assert_eq!(recorder.frames, vec![vec![2.0; 4]]);
    }

    #[test]
    fn test_hop_clamping() {
        let mut extractor = FrameExtractor::new(8, 1, Recorder::default());
        extractor.set_params(100, -3.0, false, 0.0);
        assert_eq!(extractor.frame_size(), 8);
        assert_eq!(extractor.hop_size(), 3.0);

        extractor.set_params(0, 0.25, false, 0.0);
        assert_eq!(extractor.frame_size(), 1);
        assert_eq!(extractor.hop_size(), 1.0);

        extractor.set_params(4, f64::NAN, false, 0.0);
        assert_eq!(extractor.hop_size(), 0.0);
    }

    #[test]
    fn test_non_finite_immediate_offset_starts_at_zero() {
        for offset in [f64::NEG_INFINITY, f64::INFINITY, f64::NAN] {
            let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
            extractor.set_params(4, 2.0, true, offset);
            extractor.stream_to_frame(&[ramp(64)], 64).unwrap();
            assert_eq!(extractor.processor().frames.len(), 32, "offset {}", offset);

            extractor.offset_hop(100.0);
            extractor.set_params(4, 2.0, false, 5.0);
            extractor.stream_to_frame(&[ramp(64)], 64).unwrap();
            assert!(extractor.processor().frames.len() > 32);
        }
    }

    #[test]
    fn test_too_many_channels_rejected() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 1.0, true, 0.0);
        let result = extractor.stream_to_frame(&[ramp(4), ramp(4)], 4);
        assert!(matches!(result, Err(FramingError::TooManyChannels { .. })));

        // The rejected call did not commit the pending reset or fire
        extractor.stream_to_frame(&[[5.0]], 1).unwrap();
        assert_eq!(extractor.processor().frames, vec![vec![0.0, 0.0, 0.0, 5.0]]);
    }

    #[test]
    fn test_block_larger_than_ring() {
        let mut extractor = FrameExtractor::new(4, 1, Recorder::default());
        extractor.set_params(4, 0.0, true, 0.0);
        extractor.stream_to_frame(&[ramp(11)], 11).unwrap();

        extractor.set_params(4, 1.0, false, 0.0);
        extractor.stream_to_frame(&[[11.0]], 1).unwrap();
        assert_eq!(extractor.processor().frames, vec![vec![8.0, 9.0, 10.0, 11.0]]);
    }

    #[test]
    fn test_multichannel_frames() {
        let mut extractor = FrameExtractor::new(4, 2, Recorder::default());
        extractor.set_params(2, 2.0, true, 0.0);
        extractor.stream_to_frame(&[[1.0, 2.0], [3.0, 4.0]], 2).unwrap();
        assert_eq!(extractor.processor().channels, vec![2]);
    }
}
