//! Hopframe demo
//!
//! Streams one second of a stereo test tone through a [`FramingEngine`]
//! in callback-sized blocks: a peak meter watches the dry input while a
//! sqrt-Hann analysis/synthesis pair reconstructs it.
//!
//! Usage: cargo run -p hopframe_core --features demo -- [default|low-latency|high-resolution | '<json>']
//!
//! Set `RUST_LOG=debug` for staging details.

use std::env;
use std::f32::consts::PI;
use std::process::ExitCode;

use hopframe_core::{
    EngineConfig, EngineResult, FrameContext, FrameMut, FrameProcessor, FramingEngine,
    ProcessorChain,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SAMPLE_RATE: usize = 48000;
const BLOCK_SIZE: usize = 480;

/// Peak level of the most recent analysis frame per channel
#[derive(Default)]
struct PeakMeter {
    peaks: [f32; 2],
    frames: usize,
}

impl FrameProcessor for PeakMeter {
    fn process(&mut self, frame: &mut FrameMut<'_>, _context: &FrameContext) {
        for (ch, peak) in self.peaks.iter_mut().enumerate().take(frame.channels()) {
            *peak = frame.channel(ch).iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        }
        self.frames += 1;
    }

    fn reset(&mut self) {
        self.peaks = [0.0; 2];
        self.frames = 0;
    }

    fn name(&self) -> &'static str {
        "peak meter"
    }
}

/// Multiplies each frame by a periodic sqrt-Hann window scaled so that
/// applying it twice sums to unity at the configured overlap.
struct SqrtHann {
    window: Vec<f32>,
}

impl SqrtHann {
    fn new(frame_size: usize, hop_size: usize) -> Self {
        // Hann at hop N/k sums to k/2; split the correction across both passes
        let gain = (2.0 * hop_size as f32 / frame_size as f32).sqrt();
        let window = (0..frame_size)
            .map(|i| {
                let hann = 0.5 - 0.5 * (2.0 * PI * i as f32 / frame_size as f32).cos();
                hann.sqrt() * gain
            })
            .collect();
        Self { window }
    }
}

impl FrameProcessor for SqrtHann {
    fn process(&mut self, frame: &mut FrameMut<'_>, _context: &FrameContext) {
        for lane in frame.channels_mut() {
            for (sample, w) in lane.iter_mut().zip(&self.window) {
                *sample *= w;
            }
        }
    }

    fn name(&self) -> &'static str {
        "sqrt-hann"
    }
}

/// Preset name or inline JSON from the first argument
fn load_config() -> EngineResult<EngineConfig> {
    let Some(arg) = env::args().nth(1) else {
        return Ok(EngineConfig::default());
    };
    match EngineConfig::preset(&arg) {
        Some(config) => {
            info!("Using preset {}", arg);
            Ok(config)
        }
        None => EngineConfig::from_json(&arg),
    }
}

fn run() -> EngineResult<()> {
    let config = load_config()?;
    let synthesis = config.synthesis;
    let channels = config.capacity.max_channels.min(2);

    // Analysis window, then synthesis window
    let chain = ProcessorChain::new()
        .with(SqrtHann::new(synthesis.frame_size, synthesis.hop_size))
        .with(SqrtHann::new(synthesis.frame_size, synthesis.hop_size));
    let mut engine = FramingEngine::new(config, PeakMeter::default(), chain)?;
    let latency = engine.latency_samples();

    let tone: Vec<f32> = (0..SAMPLE_RATE)
        .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    let mut output = vec![vec![0.0_f32; SAMPLE_RATE]; channels];

    let mut block = vec![vec![0.0_f32; BLOCK_SIZE]; channels];
    for start in (0..SAMPLE_RATE).step_by(BLOCK_SIZE) {
        let len = BLOCK_SIZE.min(SAMPLE_RATE - start);
        for lane in block.iter_mut() {
            lane[..len].copy_from_slice(&tone[start..start + len]);
        }
        engine.process(&mut block, len)?;
        for (out, lane) in output.iter_mut().zip(&block) {
            out[start..start + len].copy_from_slice(&lane[..len]);
        }
    }

    // Skip the warm-up where fewer than a full set of frames overlap
    let settled = latency + synthesis.frame_size;
    let max_error = (settled..SAMPLE_RATE)
        .map(|i| (output[0][i] - tone[i - latency]).abs())
        .fold(0.0_f32, f32::max);

    let meter = engine.analysis_processor();
    info!(
        "Processed {} samples in {}-sample blocks: {} analysis frames, last peak {:.3}",
        SAMPLE_RATE, BLOCK_SIZE, meter.frames, meter.peaks[0]
    );
    info!(
        "Latency {} samples ({:.2} ms), max reconstruction error {:.2e}",
        latency,
        synthesis.latency_ms(SAMPLE_RATE as u32),
        max_error
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Demo failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
