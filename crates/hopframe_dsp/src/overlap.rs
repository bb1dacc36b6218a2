//! Overlap-Add Resynthesis
//!
//! The synthesis mirror of [`FrameExtractor`](crate::FrameExtractor):
//! input samples roll into a per-channel history, every `hop_size` samples
//! the last `frame_size` of them are transformed by the processor, and the
//! transformed frame is summed into a rolling output ring that the same
//! call drains. Output lags input by exactly `frame_size` samples.
//!
//! # Buffer layout
//!
//! ```text
//! input ring   [ 0 .. frame_size | frame_size .. 2*frame_size ]
//!                 every sample is written to both halves, so the
//!                 frame ending at `io` is always in[io .. io+frame_size]
//! output ring  [ 0 .. frame_size ]   read at `io`, then refilled
//! ```
//!
//! Parameter changes are staged and applied at the top of the next call,
//! forcing a full reset so an in-flight overlap region is never corrupted.

use crate::buffer::ChannelBuffer;
use crate::error::{check_lengths, check_lengths_mut, FramingError, FramingResult};
use crate::processor::{FrameContext, FrameProcessor};

/// Staged parameters, applied with a full reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagedParams {
    frame_size: usize,
    hop_size: usize,
    hop_offset: usize,
}

pub struct OverlapAdd<P: FrameProcessor> {
    input_ring: ChannelBuffer,
    output_ring: ChannelBuffer,
    frame: ChannelBuffer,
    max_frame_size: usize,
    frame_size: usize,
    hop_size: usize,
    hop_offset: usize,
    /// Rolling position shared by both rings, `< frame_size`
    io_pointer: usize,
    /// Samples since the last hop boundary, `< hop_size`
    hop_pointer: usize,
    staged: StagedParams,
    reset_requested: bool,
    processor: P,
}

impl<P: FrameProcessor> OverlapAdd<P> {
    /// Create a resynthesizer for frames up to `max_frame_size` samples.
    ///
    /// Starts at `frame_size = max_frame_size` with 50% overlap.
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(max_frame_size: usize, max_channels: usize, processor: P) -> Self {
        let max_frame_size = max_frame_size.max(2);
        let params = StagedParams {
            frame_size: max_frame_size,
            hop_size: max_frame_size / 2,
            hop_offset: 0,
        };
        Self {
            input_ring: ChannelBuffer::new(max_channels, 2 * max_frame_size),
            output_ring: ChannelBuffer::new(max_channels, max_frame_size),
            frame: ChannelBuffer::new(max_channels, max_frame_size),
            max_frame_size,
            frame_size: params.frame_size,
            hop_size: params.hop_size,
            hop_offset: 0,
            io_pointer: 0,
            hop_pointer: 0,
            staged: params,
            reset_requested: false,
            processor,
        }
    }

    /// Stage new frame, hop and initial hop phase.
    ///
    /// `frame_size` is clamped to `[2, max_frame_size]`, `hop_size` to
    /// `[1, frame_size]`. `hop_offset` is the number of samples already
    /// counted towards the first hop after the reset.
    pub fn set_params(&mut self, frame_size: usize, hop_size: usize, hop_offset: usize) {
        let frame_size = frame_size.clamp(2, self.max_frame_size);
        let hop_size = hop_size.clamp(1, frame_size);
        self.staged = StagedParams {
            frame_size,
            hop_size,
            hop_offset: hop_offset % hop_size,
        };
        self.reset_requested = true;
    }

    /// Schedule a full reset for the top of the next call
    pub fn reset(&mut self) {
        self.reset_requested = true;
    }

    /// Latest requested frame size
    pub fn frame_size(&self) -> usize {
        self.staged.frame_size
    }

    /// Latest requested hop size
    pub fn hop_size(&self) -> usize {
        self.staged.hop_size
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn max_channels(&self) -> usize {
        self.output_ring.channels()
    }

    /// Delay between a sample entering and the same sample leaving
    pub fn latency(&self) -> usize {
        self.staged.frame_size
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

    fn commit_staged(&mut self) {
        if !self.reset_requested {
            return;
        }
        self.reset_requested = false;
        self.frame_size = self.staged.frame_size;
        self.hop_size = self.staged.hop_size;
        self.hop_offset = self.staged.hop_offset;

        self.input_ring.fill(0.0);
        self.output_ring.fill(0.0);
        self.io_pointer = 0;
        self.hop_pointer = self.hop_offset;
        self.processor.reset();
    }

    fn check_channels(&self, channels: usize) -> FramingResult<()> {
        if channels > self.output_ring.channels() {
            return Err(FramingError::TooManyChannels {
                requested: channels,
                max: self.output_ring.channels(),
            });
        }
        Ok(())
    }

    /// Process `n_samps` samples per channel from `input` into `output`.
    ///
    /// The channel count is `input.len()`; `output` must provide at least as
    /// many channels.
    ///
    /// # Real-time Safety
    /// No allocations. O(channels × n_samps × frame_size / hop_size).
    pub fn overlap_add<T, U>(&mut self, input: &[T], output: &mut [U], n_samps: usize) -> FramingResult<()>
    where
        T: AsRef<[f32]>,
        U: AsMut<[f32]>,
    {
        let n_chans = input.len();
        self.check_channels(n_chans)?;
        if output.len() < n_chans {
            return Err(FramingError::ChannelMismatch {
                input: n_chans,
                output: output.len(),
            });
        }
        check_lengths(input, n_samps)?;
        check_lengths_mut(&mut output[..n_chans], n_samps)?;

        for (src, dst) in input.iter().zip(output.iter_mut()) {
            dst.as_mut()[..n_samps].copy_from_slice(&src.as_ref()[..n_samps]);
        }
        self.run(&mut output[..n_chans], n_samps);
        Ok(())
    }

    /// Process `n_samps` samples per channel, replacing input with output.
    pub fn overlap_add_in_place<U: AsMut<[f32]>>(&mut self, buffers: &mut [U], n_samps: usize) -> FramingResult<()> {
        self.check_channels(buffers.len())?;
        check_lengths_mut(buffers, n_samps)?;
        self.run(buffers, n_samps);
        Ok(())
    }

    fn run<U: AsMut<[f32]>>(&mut self, buffers: &mut [U], n_samps: usize) {
        self.commit_staged();

        let frame_size = self.frame_size;
        let mut position = 0;
        while position < n_samps {
            // Never cross a hop boundary, the ring end or the block end in one step
            let loop_size = (self.hop_size - self.hop_pointer)
                .min(frame_size - self.io_pointer)
                .min(n_samps - position);

            let io = self.io_pointer;
            for (ch, buffer) in buffers.iter_mut().enumerate() {
                let block = &mut buffer.as_mut()[position..position + loop_size];
                let history = self.input_ring.channel_mut(ch);
                let (base, mirror) = history.split_at_mut(frame_size);
                base[io..io + loop_size].copy_from_slice(block);
                mirror[io..io + loop_size].copy_from_slice(block);
                block.copy_from_slice(&self.output_ring.channel(ch)[io..io + loop_size]);
            }

            position += loop_size;
            self.hop_pointer += loop_size;
            self.io_pointer += loop_size;
            if self.io_pointer == frame_size {
                self.io_pointer = 0;
            }
            if self.hop_pointer == self.hop_size {
                self.hop_pointer = 0;
                self.process_frame(buffers.len());
            }
        }
    }

    fn process_frame(&mut self, n_chans: usize) {
        let frame_size = self.frame_size;
        let io = self.io_pointer;
        let overlap = frame_size - self.hop_size;

        let mut frame = self.frame.frame_mut(n_chans, frame_size);
        for (ch, lane) in frame.channels_mut().enumerate() {
            lane.copy_from_slice(&self.input_ring.channel(ch)[io..io + frame_size]);
        }

        let context = FrameContext::new(n_chans, frame_size, 0.0);
        self.processor.process(&mut frame, &context);

        for (ch, lane) in frame.channels_mut().enumerate() {
            let ring = &mut self.output_ring.channel_mut(ch)[..frame_size];
            for (i, &sample) in lane.iter().enumerate() {
                let pos = (io + i) % frame_size;
                if i < overlap {
                    ring[pos] += sample;
                } else {
                    // Already drained during the last hop
                    ring[pos] = sample;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameMut;
    use crate::processor::Passthrough;

    fn ramp(len: usize) -> Vec<f32> {
        (1..=len).map(|i| i as f32).collect()
    }

    #[test]
    fn test_identity_without_overlap_delays_by_frame() {
        let mut ola = OverlapAdd::new(8, 1, Passthrough);
        ola.set_params(4, 4, 0);

        let input = ramp(12);
        let mut output = vec![vec![0.0; 12]];
        ola.overlap_add(&[&input], &mut output, 12).unwrap();

        let mut expected = vec![0.0; 4];
        expected.extend_from_slice(&input[..8]);
        assert_eq!(output[0], expected);
    }

    #[test]
    fn test_half_overlap_doubles_identity() {
        // Without a window each sample is covered by two frames
        let mut ola = OverlapAdd::new(4, 1, Passthrough);
        ola.set_params(4, 2, 0);

        let mut buffer = vec![vec![1.0_f32; 16]];
        ola.overlap_add_in_place(&mut buffer, 16).unwrap();
        assert_eq!(&buffer[0][8..], &[2.0; 8]);
    }

    #[test]
    fn test_processor_sees_latest_frame() {
        let mut seen = Vec::new();
        let mut ola = OverlapAdd::new(4, 1, |frame: &mut FrameMut<'_>, ctx: &FrameContext| {
            assert_eq!(ctx.frame_size, 4);
            assert_eq!(ctx.fractional_offset, 0.0);
            seen.push(frame.channel(0).to_vec());
        });
        ola.set_params(4, 2, 0);

        let mut buffer = vec![ramp(6)];
        ola.overlap_add_in_place(&mut buffer, 6).unwrap();
        drop(ola);

        assert_eq!(
            seen,
            vec![
                vec![0.0, 0.0, 1.0, 2.0],
                vec![1.0, 2.0, 3.0, 4.0],
                vec![3.0, 4.0, 5.0, 6.0],
            ]
        );
    }

    #[test]
    fn test_hop_offset_moves_first_frame() {
        let mut fired = 0;
        let mut ola = OverlapAdd::new(8, 1, |_: &mut FrameMut<'_>, _: &FrameContext| fired += 1);
        ola.set_params(8, 4, 3);

        let mut buffer = vec![vec![0.0_f32; 1]];
        ola.overlap_add_in_place(&mut buffer, 1).unwrap();
        drop(ola);
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_params_are_staged_and_clamped() {
        let mut ola = OverlapAdd::new(16, 1, Passthrough);
        ola.set_params(100, 0, 0);
        assert_eq!(ola.frame_size(), 16);
        assert_eq!(ola.hop_size(), 1);

        ola.set_params(1, 10, 0);
        assert_eq!(ola.frame_size(), 2);
        assert_eq!(ola.hop_size(), 2);
        assert_eq!(ola.latency(), 2);
    }

    #[test]
    fn test_reconfigure_clears_overlap() {
        let mut ola = OverlapAdd::new(8, 1, Passthrough);
        ola.set_params(4, 2, 0);
        let mut buffer = vec![vec![1.0_f32; 8]];
        ola.overlap_add_in_place(&mut buffer, 8).unwrap();

        ola.set_params(4, 4, 0);
        let mut buffer = vec![vec![0.0_f32; 4]];
        ola.overlap_add_in_place(&mut buffer, 4).unwrap();
        assert_eq!(buffer[0], vec![0.0; 4]);
    }

    #[test]
    fn test_too_many_channels_rejected() {
        let mut ola = OverlapAdd::new(8, 1, Passthrough);
        let mut buffers = vec![vec![1.0_f32; 4], vec![1.0; 4]];
        assert!(matches!(
            ola.overlap_add_in_place(&mut buffers, 4),
            Err(FramingError::TooManyChannels { requested: 2, max: 1 })
        ));
        assert_eq!(buffers[0], vec![1.0; 4]);
    }

    #[test]
    fn test_rejected_call_keeps_staged_state() {
        let input = ramp(12);

        let mut ola = OverlapAdd::new(8, 1, Passthrough);
        let mut warm = vec![vec![1.0_f32; 5]];
        ola.overlap_add_in_place(&mut warm, 5).unwrap();
        ola.set_params(4, 2, 1);

        let mut stereo = vec![input.clone(), input.clone()];
        assert!(ola.overlap_add_in_place(&mut stereo, 12).is_err());
        let mut short = vec![vec![0.0_f32; 3]];
        assert!(ola.overlap_add_in_place(&mut short, 12).is_err());

        let mut fresh = OverlapAdd::new(8, 1, Passthrough);
        fresh.set_params(4, 2, 1);
        let mut expected = vec![input.clone()];
        fresh.overlap_add_in_place(&mut expected, 12).unwrap();

        let mut actual = vec![input.clone()];
        ola.overlap_add_in_place(&mut actual, 12).unwrap();
        assert_eq!(actual, expected);

        // Same for a pending reset, which must also survive a rejected call
        ola.reset();
        let mut output = [vec![0.0_f32; 12]];
        assert!(ola.overlap_add(&[input.clone(), input.clone()], &mut output, 12).is_err());

        let mut fresh = OverlapAdd::new(8, 1, Passthrough);
        fresh.set_params(4, 2, 1);
        let mut expected = vec![input.clone()];
        fresh.overlap_add_in_place(&mut expected, 12).unwrap();

        let mut actual = vec![input];
        ola.overlap_add_in_place(&mut actual, 12).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_short_output_rejected() {
        let mut ola = OverlapAdd::new(8, 2, Passthrough);
        let input = [vec![1.0_f32; 4], vec![1.0; 4]];
        let mut output = [vec![0.0_f32; 4]];
        assert_eq!(
            ola.overlap_add(&input, &mut output, 4),
            Err(FramingError::ChannelMismatch { input: 2, output: 1 })
        );
        assert_eq!(output[0], vec![0.0; 4]);
    }
}
