//! Frame Processor Trait
//!
//! The single seam through which payload code (windowing, spectral
//! analysis, denoising, metering) is attached to the framing engines.
//! A processor is chosen once, when the owning component is built.

use crate::buffer::FrameMut;

/// Context passed to processors alongside each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub channels: usize,
    pub frame_size: usize,
    /// Position of the exact hop boundary inside the last sample interval
    /// of the frame, in `[0, 1)`. Always `0` for integer hops.
    pub fractional_offset: f64,
}

impl FrameContext {
    pub fn new(channels: usize, frame_size: usize, fractional_offset: f64) -> Self {
        Self {
            channels,
            frame_size,
            fractional_offset,
        }
    }
}

/// Trait for code that runs once per emitted frame
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
///
/// The frame may be rewritten in place; its length is fixed.
pub trait FrameProcessor: Send {
    fn process(&mut self, frame: &mut FrameMut<'_>, context: &FrameContext);

    /// Clear internal state. Called whenever the owner performs a full reset.
    fn reset(&mut self) {}

    /// Human-readable name for debugging/logging
    fn name(&self) -> &'static str {
        "frame processor"
    }
}

/// Processor that leaves every frame untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl FrameProcessor for Passthrough {
    #[inline]
    fn process(&mut self, _frame: &mut FrameMut<'_>, _context: &FrameContext) {}

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

impl<F> FrameProcessor for F
where
    F: FnMut(&mut FrameMut<'_>, &FrameContext) + Send,
{
    #[inline]
    fn process(&mut self, frame: &mut FrameMut<'_>, context: &FrameContext) {
        self(frame, context)
    }

    fn name(&self) -> &'static str {
        "closure"
    }
}

/// A chain of processors applied sequentially to the same frame
pub struct ProcessorChain {
    processors: Vec<Box<dyn FrameProcessor>>,
}

impl ProcessorChain {
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Add a processor to the end of the chain
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn add<P: FrameProcessor + 'static>(&mut self, processor: P) {
        self.processors.push(Box::new(processor));
    }

    /// Builder form of [`ProcessorChain::add`]
    pub fn with<P: FrameProcessor + 'static>(mut self, processor: P) -> Self {
        self.add(processor);
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProcessor for ProcessorChain {
    #[inline]
    fn process(&mut self, frame: &mut FrameMut<'_>, context: &FrameContext) {
        for processor in &mut self.processors {
            processor.process(frame, context);
        }
    }

    fn reset(&mut self) {
        for processor in &mut self.processors {
            processor.reset();
        }
    }

    fn name(&self) -> &'static str {
        "processor chain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test processor that just inverts the frame
    struct InvertProcessor;

    impl FrameProcessor for InvertProcessor {
        fn process(&mut self, frame: &mut FrameMut<'_>, _context: &FrameContext) {
            for lane in frame.channels_mut() {
                for sample in lane.iter_mut() {
                    *sample = -*sample;
                }
            }
        }

        fn name(&self) -> &'static str {
            "Inverter"
        }
    }

    fn context(len: usize) -> FrameContext {
        FrameContext::new(1, len, 0.0)
    }

    #[test]
    fn test_passthrough_leaves_frame() {
        let mut samples = vec![0.5, -0.5];
        let mut frame = FrameMut::from_mono(&mut samples);
        Passthrough.process(&mut frame, &context(2));
        assert_eq!(samples, vec![0.5, -0.5]);
    }

    #[test]
    fn test_closure_is_processor() {
        let mut calls = 0;
        let mut scale = |frame: &mut FrameMut<'_>, _: &FrameContext| {
            calls += 1;
            frame.channel_mut(0).iter_mut().for_each(|s| *s *= 2.0);
        };
        let mut samples = vec![1.0, 2.0];
        scale.process(&mut FrameMut::from_mono(&mut samples), &context(2));
        assert_eq!(samples, vec![2.0, 4.0]);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = ProcessorChain::new();
        assert!(chain.is_empty());

        let mut samples = vec![0.5, -0.5];
        chain.process(&mut FrameMut::from_mono(&mut samples), &context(2));
        assert_eq!(samples, vec![0.5, -0.5]);
    }

    #[test]
    fn test_processor_chain_order() {
        // Two inverters should cancel out
        let mut chain = ProcessorChain::new()
            .with(InvertProcessor)
            .with(InvertProcessor);
        assert_eq!(chain.len(), 2);

        let mut samples = vec![0.5, -0.5];
        chain.process(&mut FrameMut::from_mono(&mut samples), &context(2));
        assert_eq!(samples, vec![0.5, -0.5]);

        chain.add(InvertProcessor);
        chain.process(&mut FrameMut::from_mono(&mut samples), &context(2));
        assert_eq!(samples, vec![-0.5, 0.5]);
    }
}
