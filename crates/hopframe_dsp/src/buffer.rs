//! Multi-channel Sample Storage
//!
//! All framing primitives keep their samples in a single flat allocation
//! indexed by `(channel, sample)`. The arena is sized once from the
//! configured channel and length maxima and never grows, so the processing
//! path never touches the allocator.

use std::ops::Range;

/// Flat, fixed-capacity storage for `channels` lanes of `stride` samples.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    data: Vec<f32>,
    channels: usize,
    stride: usize,
}

impl ChannelBuffer {
    /// Allocate a zeroed arena.
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn new(channels: usize, stride: usize) -> Self {
        Self {
            data: vec![0.0; channels * stride],
            channels,
            stride,
        }
    }

    /// Number of channel lanes
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel lane
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        let start = index * self.stride;
        &self.data[start..start + self.stride]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.stride;
        &mut self.data[start..start + self.stride]
    }

    /// Fill every lane with `value`
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Borrow the leading `channels × len` region as a processor frame.
    ///
    /// # Panics
    /// Panics if the region exceeds the arena (a bug in the caller).
    #[inline]
    pub fn frame_mut(&mut self, channels: usize, len: usize) -> FrameMut<'_> {
        assert!(channels <= self.channels && len <= self.stride);
        FrameMut {
            data: &mut self.data[..channels * self.stride],
            stride: self.stride,
            len,
        }
    }
}

/// Borrowed view of a fixed-length, multi-channel frame.
///
/// Processors may rewrite any sample but can never change the frame
/// length or channel count.
#[derive(Debug)]
pub struct FrameMut<'a> {
    data: &'a mut [f32],
    stride: usize,
    len: usize,
}

impl<'a> FrameMut<'a> {
    /// Wrap a caller-owned single-channel slice.
    pub fn from_mono(samples: &'a mut [f32]) -> Self {
        let len = samples.len();
        Self {
            data: samples,
            stride: len,
            len,
        }
    }

    /// Samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn channels(&self) -> usize {
        if self.stride == 0 {
            0
        } else {
            self.data.len() / self.stride
        }
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        let start = index * self.stride;
        &self.data[start..start + self.len]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.stride;
        &mut self.data[start..start + self.len]
    }

    /// Iterate channel slices mutably, in channel order
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> + '_ {
        let len = self.len;
        self.data
            .chunks_exact_mut(self.stride.max(1))
            .map(move |lane| &mut lane[..len])
    }
}

/// Split `len` positions starting at `start` on a ring of `capacity` into
/// the contiguous run up to the end and the wrapped remainder from zero.
///
/// `len == capacity` starting at zero yields one full run and an empty
/// remainder.
#[inline]
pub(crate) fn ring_spans(start: usize, len: usize, capacity: usize) -> (Range<usize>, Range<usize>) {
    let first_end = (start + len).min(capacity);
    let wrapped = len - (first_end - start);
    (start..first_end, 0..wrapped)
}
