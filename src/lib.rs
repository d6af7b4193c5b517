#![forbid(unsafe_code)]

//! Turn a fixed-length sequence of small RGBA frames into one validated
//! animated GIF89a byte buffer: a single global palette shared by every
//! frame, optional transparency and Floyd–Steinberg dithering, GIF-variant
//! LZW compression, and an independent structural re-parse of the output
//! before it is handed back.
//!
//! The engine is a pure synchronous transformation. It never touches the
//! filesystem; persisting the bytes is the caller's job. Each call allocates
//! everything fresh — concurrent exports share no state.

pub mod assemble;
pub mod dither;
pub mod error;
pub mod histogram;
pub mod lab;
pub mod lzw;
pub mod median_cut;
pub mod metrics;
pub mod octree;
pub mod palette;
pub mod validate;

pub use assemble::GifDocument;
pub use dither::DitherMode;
pub use error::GifPipeError;
pub use metrics::QualityReport;
pub use palette::Palette;
pub use validate::{Expectations, ValidationReport};

use tracing::{debug, info};

/// One input frame. Dimensions must match across all frames of a job;
/// `delay_cs` is the display time in centiseconds.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u16,
    pub height: u16,
    pub pixels: Vec<rgb::RGBA<u8>>,
    pub delay_cs: u16,
}

impl Frame {
    pub fn new(width: u16, height: u16, pixels: Vec<rgb::RGBA<u8>>, delay_cs: u16) -> Self {
        Self {
            width,
            height,
            pixels,
            delay_cs,
        }
    }
}

/// One frame's palette indices, referencing the shared [`Palette`] by
/// position. Every index is less than the palette length.
#[derive(Debug, Clone)]
pub struct QuantizedFrame {
    pub indices: Vec<u8>,
}

/// Histogram reduction strategy. Both are deterministic for identical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuantizerStrategy {
    /// Weighted box subdivision. Better palette placement for photographic
    /// content; the default.
    #[default]
    MedianCut,
    /// Octree reduction. Bounded memory on color-rich input.
    Octree,
}

/// Per-export configuration. Every knob is an explicit field here — there is
/// no process-wide state.
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    /// Maximum palette colors (2..=256), including the transparency sentinel
    /// when one is reserved.
    pub max_colors: u32,
    /// Pixels with alpha strictly below this are transparent. 0 disables
    /// transparency entirely.
    pub alpha_threshold: u8,
    pub strategy: QuantizerStrategy,
    /// Off by default.
    pub dither: DitherMode,
    /// Emit the NETSCAPE2.0 infinite-loop extension.
    pub loop_forever: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            max_colors: 256,
            alpha_threshold: 1,
            strategy: QuantizerStrategy::MedianCut,
            dither: DitherMode::None,
            loop_forever: true,
        }
    }
}

impl EncodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_colors(mut self, n: u32) -> Self {
        self.max_colors = n;
        self
    }

    pub fn alpha_threshold(mut self, t: u8) -> Self {
        self.alpha_threshold = t;
        self
    }

    pub fn strategy(mut self, s: QuantizerStrategy) -> Self {
        self.strategy = s;
        self
    }

    pub fn dither(mut self, mode: DitherMode) -> Self {
        self.dither = mode;
        self
    }

    pub fn loop_forever(mut self, looping: bool) -> Self {
        self.loop_forever = looping;
        self
    }
}

/// Cooperative cancellation, polled only at frame boundaries — never
/// mid-pixel or mid-bitstream, so a half-written GIF block can't escape.
pub trait Cancel {
    fn is_cancelled(&self) -> bool;
}

/// A token that never cancels.
pub struct Unstoppable;

impl Cancel for Unstoppable {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Everything one successful export hands back: the validated document, the
/// perceptual quality report, and the validator's own findings.
#[derive(Debug)]
pub struct GifExport {
    pub document: GifDocument,
    pub report: QualityReport,
    pub validation: ValidationReport,
    /// Raw RGB input size over output size.
    pub compression_ratio: f32,
}

/// Build the shared palette and per-frame index arrays.
///
/// See [`encode_gif`] for the full pipeline; this is the quantization half,
/// usable on its own when the caller wants indices without a container.
pub fn quantize(
    frames: &[Frame],
    config: &EncodeConfig,
) -> Result<(Palette, Vec<QuantizedFrame>, QualityReport), GifPipeError> {
    quantize_with_cancel(frames, config, &Unstoppable)
}

fn quantize_with_cancel(
    frames: &[Frame],
    config: &EncodeConfig,
    cancel: &dyn Cancel,
) -> Result<(Palette, Vec<QuantizedFrame>, QualityReport), GifPipeError> {
    validate_inputs(frames, config)?;

    let mut hist = histogram::ColorHistogram::new();
    for (i, frame) in frames.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(GifPipeError::Cancelled { frame: i });
        }
        hist.add_frame(&frame.pixels, config.alpha_threshold);
    }

    let has_transparency = hist.has_transparency();
    let budget = if has_transparency {
        config.max_colors as usize - 1
    } else {
        config.max_colors as usize
    };

    info!(
        distinct_colors = hist.distinct_colors(),
        transparent_pixels = hist.transparent_count(),
        budget,
        "histogram built"
    );

    if hist.distinct_colors() == 0 && !has_transparency {
        return Err(GifPipeError::DegenerateHistogram);
    }

    // Lossless fast path: distinct colors already fit the budget.
    let colors = match hist.exact_palette(budget) {
        Some(exact) => exact,
        None => match config.strategy {
            QuantizerStrategy::MedianCut => median_cut::median_cut(hist.samples(), budget),
            QuantizerStrategy::Octree => octree::octree_reduce(&hist.samples(), budget),
        },
    };

    let palette = Palette::from_colors(colors, has_transparency);
    info!(palette_size = palette.len(), transparent = has_transparency, "palette generated");

    let width = frames[0].width as usize;
    let height = frames[0].height as usize;

    let mut quantized = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(GifPipeError::Cancelled { frame: i });
        }
        let indices = dither::remap_frame(
            &frame.pixels,
            width,
            height,
            &palette,
            config.alpha_threshold,
            config.dither,
        );
        debug!(frame = i, "frame remapped");
        quantized.push(QuantizedFrame { indices });
    }

    let report = metrics::measure(frames, &quantized, &palette, config.alpha_threshold);
    info!(
        mean_delta_e = report.mean_delta_e,
        p95_delta_e = report.p95_delta_e,
        palette_size = report.palette_size,
        "quantization measured"
    );

    Ok((palette, quantized, report))
}

/// Run the full pipeline: quantize → LZW/assemble → self-validate.
///
/// Returns either a complete, validated GIF or an error — never partial
/// output. Cancellation discards all intermediate state.
#[tracing::instrument(level = "info", skip(frames, config, cancel), fields(frames = frames.len()))]
pub fn encode_gif(
    frames: &[Frame],
    config: &EncodeConfig,
    cancel: &dyn Cancel,
) -> Result<GifExport, GifPipeError> {
    let started = std::time::Instant::now();

    let (palette, quantized, report) = quantize_with_cancel(frames, config, cancel)?;

    if cancel.is_cancelled() {
        return Err(GifPipeError::Cancelled { frame: frames.len() });
    }

    let width = frames[0].width;
    let height = frames[0].height;
    let delays: Vec<u16> = frames.iter().map(|f| f.delay_cs).collect();

    let document = assemble::assemble(
        &palette,
        &quantized,
        &delays,
        width,
        height,
        config.loop_forever,
    )?;

    info!(size_bytes = document.size_bytes, frames = document.frame_count, "container assembled");

    let validation = validate::validate(
        &document.bytes,
        &Expectations {
            width,
            height,
            frame_count: frames.len(),
            loop_forever: config.loop_forever,
        },
    );

    if !validation.is_valid {
        return Err(GifPipeError::ValidationFailed {
            errors: validation.errors,
        });
    }

    let raw_size = frames.len() * width as usize * height as usize * 3;
    let compression_ratio = if document.size_bytes > 0 {
        raw_size as f32 / document.size_bytes as f32
    } else {
        0.0
    };

    info!(
        size_bytes = document.size_bytes,
        compression_ratio,
        mean_delta_e = report.mean_delta_e,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "encoding complete"
    );

    Ok(GifExport {
        document,
        report,
        validation,
        compression_ratio,
    })
}

fn validate_inputs(frames: &[Frame], config: &EncodeConfig) -> Result<(), GifPipeError> {
    if frames.is_empty() {
        return Err(GifPipeError::EmptyInput);
    }
    if config.max_colors < 2 || config.max_colors > 256 {
        return Err(GifPipeError::InvalidMaxColors(config.max_colors));
    }

    let expected_width = frames[0].width;
    let expected_height = frames[0].height;

    for (index, frame) in frames.iter().enumerate() {
        if frame.width == 0 || frame.height == 0 {
            return Err(GifPipeError::ZeroDimension);
        }
        if frame.width != expected_width || frame.height != expected_height {
            return Err(GifPipeError::MixedDimensions {
                index,
                width: frame.width,
                height: frame.height,
                expected_width,
                expected_height,
            });
        }
        let expected_len = frame.width as usize * frame.height as usize;
        if frame.pixels.len() != expected_len {
            return Err(GifPipeError::DimensionMismatch {
                index,
                len: frame.pixels.len(),
                width: frame.width,
                height: frame.height,
            });
        }
    }

    Ok(())
}
