//! Lookahead Processor Adapter
//!
//! Wraps a [`FrameProcessor`] so its output frames come out `frames`
//! hops late. A transform that decides about frame `n` using frames up to
//! `n + k` runs on the newest frame and the result is realigned by a
//! [`FrameDelay`] of `k` frames.

use crate::buffer::FrameMut;
use crate::delay::FrameDelay;
use crate::processor::{FrameContext, FrameProcessor};

pub struct Lookahead<P: FrameProcessor> {
    inner: P,
    delay: FrameDelay,
    frames: usize,
}

impl<P: FrameProcessor> Lookahead<P> {
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(inner: P, max_frame_size: usize, max_channels: usize, max_frames: usize) -> Self {
        Self {
            inner,
            delay: FrameDelay::new(max_frame_size, max_channels, max_frames),
            frames: 0,
        }
    }

    /// Set the lookahead in frames, clamped to the configured maximum
    pub fn set_frames(&mut self, frames: usize) {
        self.frames = frames.min(self.delay.max_delay_frames());
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn max_frames(&self) -> usize {
        self.delay.max_delay_frames()
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut P {
        &mut self.inner
    }
}

impl<P: FrameProcessor> FrameProcessor for Lookahead<P> {
    fn process(&mut self, frame: &mut FrameMut<'_>, context: &FrameContext) {
        self.inner.process(frame, context);
        // Zero still records history so a later lookahead starts warm
        if self.delay.delay_frame(frame, self.frames).is_err() {
            // A frame the delay cannot hold would come out misaligned
            for lane in frame.channels_mut() {
                lane.fill(0.0);
            }
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.delay.reset();
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Passthrough;

    fn run(lookahead: &mut Lookahead<Passthrough>, value: f32) -> Vec<f32> {
        let mut samples = vec![value; 2];
        let mut frame = FrameMut::from_mono(&mut samples);
        lookahead.process(&mut frame, &FrameContext::new(1, 2, 0.0));
        samples
    }

    #[test]
    fn test_zero_lookahead_is_transparent() {
        let mut lookahead = Lookahead::new(Passthrough, 4, 1, 2);
        assert_eq!(run(&mut lookahead, 1.0), vec![1.0, 1.0]);
    }

    #[test]
    fn test_frames_are_realigned() {
        let mut lookahead = Lookahead::new(Passthrough, 4, 1, 2);
        lookahead.set_frames(2);
        assert_eq!(run(&mut lookahead, 1.0), vec![0.0, 0.0]);
        assert_eq!(run(&mut lookahead, 2.0), vec![0.0, 0.0]);
        assert_eq!(run(&mut lookahead, 3.0), vec![1.0, 1.0]);
        assert_eq!(run(&mut lookahead, 4.0), vec![2.0, 2.0]);
    }

    #[test]
    fn test_oversized_frame_is_silenced() {
        let mut lookahead = Lookahead::new(Passthrough, 2, 1, 1);
        let mut samples = vec![1.0_f32; 4];
        let mut frame = FrameMut::from_mono(&mut samples);
        lookahead.process(&mut frame, &FrameContext::new(1, 4, 0.0));
        assert_eq!(samples, vec![0.0; 4]);

        // Frames that fit are still delayed normally
        assert_eq!(run(&mut lookahead, 3.0), vec![3.0, 3.0]);
    }

    #[test]
    fn test_set_frames_clamped() {
        let mut lookahead = Lookahead::new(Passthrough, 4, 1, 2);
        lookahead.set_frames(10);
        assert_eq!(lookahead.frames(), 2);
    }
}
