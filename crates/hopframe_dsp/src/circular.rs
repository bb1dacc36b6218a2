//! Circular Sample Stream
//!
//! Fixed-capacity, multi-channel ring buffer with two behaviours selected
//! at construction:
//!
//! - [`StreamMode::Input`]: rolling history. Writes overwrite forward from
//!   the cursor; reads fetch the most recently written samples.
//! - [`StreamMode::Output`]: accumulator. Writes add into samples that have
//!   not been read yet and overwrite past them; reads drain from the cursor.
//!
//! Every transfer is at most two contiguous copies: `[cursor, capacity)`
//! followed by `[0, remainder)`.

use crate::buffer::{ring_spans, ChannelBuffer, FrameMut};
use crate::error::{check_lengths, check_lengths_mut, FramingError, FramingResult};

/// Behaviour of a [`CircularStream`], fixed for its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct CircularStream {
    buffers: ChannelBuffer,
    capacity: usize,
    mode: StreamMode,
    /// Write position (Input) or read position (Output), always `< capacity`
    counter: usize,
    /// Output mode: accumulated samples not yet read, `<= capacity`
    write_offset: usize,
}

impl CircularStream {
    /// Create a zeroed stream.
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(capacity: usize, channels: usize, mode: StreamMode) -> Self {
        Self {
            buffers: ChannelBuffer::new(channels, capacity),
            capacity,
            mode,
            counter: 0,
            write_offset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn channels(&self) -> usize {
        self.buffers.channels()
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Samples written but not yet read (always 0 in Input mode)
    pub fn pending(&self) -> usize {
        self.write_offset
    }

    /// Raw ring contents of one channel, in storage order
    pub fn channel(&self, index: usize) -> &[f32] {
        self.buffers.channel(index)
    }

    fn check_request(&self, channels: usize, size: usize) -> FramingResult<()> {
        if channels > self.buffers.channels() {
            return Err(FramingError::TooManyChannels {
                requested: channels,
                max: self.buffers.channels(),
            });
        }
        if size > self.capacity {
            return Err(FramingError::BlockTooLarge {
                requested: size,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Write `size` samples from each input slice, starting at `in_offset`.
    ///
    /// # Real-time Safety
    /// No allocations. O(channels × size).
    pub fn write<T: AsRef<[f32]>>(
        &mut self,
        inputs: &[T],
        size: usize,
        in_offset: usize,
    ) -> FramingResult<()> {
        self.check_request(inputs.len(), size)?;
        check_lengths(inputs, in_offset + size)?;
        if size == 0 {
            return Ok(());
        }

        let (first, second) = ring_spans(self.counter, size, self.capacity);
        match self.mode {
            StreamMode::Input => {
                for (ch, input) in inputs.iter().enumerate() {
                    let src = &input.as_ref()[in_offset..in_offset + size];
                    let ring = self.buffers.channel_mut(ch);
                    let split = first.len();
                    ring[first.clone()].copy_from_slice(&src[..split]);
                    ring[second.clone()].copy_from_slice(&src[split..]);
                }
                self.counter = (self.counter + size) % self.capacity;
            }
            StreamMode::Output => {
                // Positions [0, write_offset) from the cursor still hold unread output
                let overlap = self.write_offset.min(size);
                for (ch, input) in inputs.iter().enumerate() {
                    let src = &input.as_ref()[in_offset..in_offset + size];
                    let ring = self.buffers.channel_mut(ch);
                    for (i, &sample) in src.iter().enumerate() {
                        let pos = if i < first.len() {
                            first.start + i
                        } else {
                            i - first.len()
                        };
                        if i < overlap {
                            ring[pos] += sample;
                        } else {
                            ring[pos] = sample;
                        }
                    }
                }
                self.write_offset = self.write_offset.max(size);
            }
        }
        Ok(())
    }

    /// Read `size` samples into each output slice, starting at `out_offset`.
    ///
    /// Input mode returns the last `size` samples written, oldest first, and
    /// leaves the cursor in place. Output mode drains `size` accumulated
    /// samples and fails if fewer are pending.
    ///
    /// # Real-time Safety
    /// No allocations. O(channels × size).
    pub fn read<U: AsMut<[f32]>>(
        &mut self,
        outputs: &mut [U],
        size: usize,
        out_offset: usize,
    ) -> FramingResult<()> {
        self.check_request(outputs.len(), size)?;
        check_lengths_mut(outputs, out_offset + size)?;

        let start = match self.mode {
            StreamMode::Input => (self.counter + self.capacity - size) % self.capacity.max(1),
            StreamMode::Output => {
                if size > self.write_offset {
                    return Err(FramingError::NotEnoughOutput {
                        requested: size,
                        available: self.write_offset,
                    });
                }
                self.counter
            }
        };
        if size == 0 {
            return Ok(());
        }

        let (first, second) = ring_spans(start, size, self.capacity);
        let split = first.len();
        for (ch, output) in outputs.iter_mut().enumerate() {
            let dst = &mut output.as_mut()[out_offset..out_offset + size];
            let ring = self.buffers.channel(ch);
            dst[..split].copy_from_slice(&ring[first.clone()]);
            dst[split..].copy_from_slice(&ring[second.clone()]);
        }

        if self.mode == StreamMode::Output {
            self.counter = (self.counter + size) % self.capacity;
            self.write_offset -= size;
        }
        Ok(())
    }

    /// Input mode: fill `frame` with the last `frame.len()` samples of each
    /// of its channels, oldest first.
    pub fn read_frame(&self, frame: &mut FrameMut<'_>) -> FramingResult<()> {
        let size = frame.len();
        self.check_request(frame.channels(), size)?;
        if self.mode != StreamMode::Input {
            return Err(FramingError::WrongMode {
                expected: StreamMode::Input,
            });
        }
        if size == 0 {
            return Ok(());
        }

        let start = (self.counter + self.capacity - size) % self.capacity;
        let (first, second) = ring_spans(start, size, self.capacity);
        let split = first.len();
        for (ch, lane) in frame.channels_mut().enumerate() {
            let ring = self.buffers.channel(ch);
            lane[..split].copy_from_slice(&ring[first.clone()]);
            lane[split..].copy_from_slice(&ring[second.clone()]);
        }
        Ok(())
    }

    /// Zero the ring and rewind the cursor
    pub fn reset(&mut self) {
        self.buffers.fill(0.0);
        self.counter = 0;
        self.write_offset = 0;
    }
}
