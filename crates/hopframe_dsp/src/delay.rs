//! Frame Delay Line
//!
//! Delays whole frames rather than samples. Each channel owns a ring of
//! `max_delay_frames + 1` slots of `max_frame_size` samples. The frame is
//! written before the delayed frame is read, and the extra slot is what lets
//! a delay of zero hand back the frame that was just written.

use crate::buffer::{ChannelBuffer, FrameMut};
use crate::error::{check_lengths, check_lengths_mut, FramingError, FramingResult};

#[derive(Debug, Clone)]
pub struct FrameDelay {
    /// Lane per channel; slot `s` occupies `[s * max_frame_size, (s + 1) * max_frame_size)`
    slots: ChannelBuffer,
    max_frame_size: usize,
    slot_count: usize,
    write_pointer: usize,
    /// Frames written since the last reset, saturating at `slot_count`
    valid_frame_count: usize,
    /// Frame size of the previous call; slot geometry is keyed to it
    frame_size: usize,
}

impl FrameDelay {
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(max_frame_size: usize, max_channels: usize, max_delay_frames: usize) -> Self {
        let slot_count = max_delay_frames + 1;
        Self {
            slots: ChannelBuffer::new(max_channels, slot_count * max_frame_size),
            max_frame_size,
            slot_count,
            write_pointer: 0,
            valid_frame_count: 0,
            frame_size: 0,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn max_channels(&self) -> usize {
        self.slots.channels()
    }

    pub fn max_delay_frames(&self) -> usize {
        self.slot_count - 1
    }

    /// Frames of history currently available
    pub fn valid_frames(&self) -> usize {
        self.valid_frame_count
    }

    /// Forget all stored frames
    pub fn reset(&mut self) {
        self.slots.fill(0.0);
        self.write_pointer = 0;
        self.valid_frame_count = 0;
    }

    fn validate(&self, channels: usize, frame_size: usize, frame_delay: usize) -> FramingResult<()> {
        if frame_size == 0 {
            return Err(FramingError::InvalidFrameSize(frame_size));
        }
        if frame_size > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                requested: frame_size,
                max: self.max_frame_size,
            });
        }
        if channels > self.slots.channels() {
            return Err(FramingError::TooManyChannels {
                requested: channels,
                max: self.slots.channels(),
            });
        }
        if frame_delay > self.max_delay_frames() {
            return Err(FramingError::DelayTooLong {
                requested: frame_delay,
                max: self.max_delay_frames(),
            });
        }
        Ok(())
    }

    /// Store one frame from `input` and write the frame from `frame_delay`
    /// calls ago into `output`.
    ///
    /// The channel count is `input.len()`; `output` must provide at least as
    /// many channels. Output is silent until enough frames have been stored.
    ///
    /// # Real-time Safety
    /// No allocations. O(channels × frame_size).
    pub fn delay_io<T, U>(
        &mut self,
        input: &[T],
        output: &mut [U],
        frame_size: usize,
        frame_delay: usize,
    ) -> FramingResult<()>
    where
        T: AsRef<[f32]>,
        U: AsMut<[f32]>,
    {
        let n_chans = input.len();
        self.validate(n_chans, frame_size, frame_delay)?;
        if output.len() < n_chans {
            return Err(FramingError::ChannelMismatch {
                input: n_chans,
                output: output.len(),
            });
        }
        check_lengths(input, frame_size)?;
        check_lengths_mut(&mut output[..n_chans], frame_size)?;

        for (src, dst) in input.iter().zip(output.iter_mut()) {
            dst.as_mut()[..frame_size].copy_from_slice(&src.as_ref()[..frame_size]);
        }
        let lanes = output[..n_chans].iter_mut().map(|lane| &mut lane.as_mut()[..frame_size]);
        self.exchange(lanes, frame_size, frame_delay);
        Ok(())
    }

    /// Like [`delay_io`](FrameDelay::delay_io), replacing each frame with its delayed counterpart.
    pub fn delay_in_place<U: AsMut<[f32]>>(
        &mut self,
        frames: &mut [U],
        frame_size: usize,
        frame_delay: usize,
    ) -> FramingResult<()> {
        self.validate(frames.len(), frame_size, frame_delay)?;
        check_lengths_mut(frames, frame_size)?;
        let lanes = frames.iter_mut().map(|lane| &mut lane.as_mut()[..frame_size]);
        self.exchange(lanes, frame_size, frame_delay);
        Ok(())
    }

    /// Delay a processor frame in place; its length is the frame size.
    pub fn delay_frame(&mut self, frame: &mut FrameMut<'_>, frame_delay: usize) -> FramingResult<()> {
        let frame_size = frame.len();
        self.validate(frame.channels(), frame_size, frame_delay)?;
        self.exchange(frame.channels_mut(), frame_size, frame_delay);
        Ok(())
    }

    /// Write-before-read core shared by both entry points
    fn exchange<'a, I>(&mut self, lanes: I, frame_size: usize, frame_delay: usize)
    where
        I: Iterator<Item = &'a mut [f32]>,
    {
        if frame_size != self.frame_size {
            self.reset();
            self.frame_size = frame_size;
        }

        let stride = self.max_frame_size;
        let write_start = self.write_pointer * stride;
        // Cold start: the requested frame was never written
        let read_start = if frame_delay > self.valid_frame_count {
            None
        } else {
            let slot = (self.write_pointer + self.slot_count - frame_delay) % self.slot_count;
            Some(slot * stride)
        };

        for (ch, frame) in lanes.enumerate() {
            let lane = self.slots.channel_mut(ch);
            lane[write_start..write_start + frame_size].copy_from_slice(frame);
            match read_start {
                Some(start) => frame.copy_from_slice(&lane[start..start + frame_size]),
                None => frame.fill(0.0),
            }
        }

        self.write_pointer = (self.write_pointer + 1) % self.slot_count;
        self.valid_frame_count = (self.valid_frame_count + 1).min(self.slot_count);
    }
}
