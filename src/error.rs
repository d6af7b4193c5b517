use thiserror::Error;

/// Failure surface of one export. The caller gets either a complete,
/// validated GIF or exactly one of these — there is no partial-success mode.
#[derive(Debug, Error)]
pub enum GifPipeError {
    #[error("frame dimensions cannot be zero")]
    ZeroDimension,

    #[error("frame {index} pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        index: usize,
        len: usize,
        width: u16,
        height: u16,
    },

    #[error("frame {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    MixedDimensions {
        index: usize,
        width: u16,
        height: u16,
        expected_width: u16,
        expected_height: u16,
    },

    #[error("no frames provided")]
    EmptyInput,

    #[error("max_colors must be between 2 and 256, got {0}")]
    InvalidMaxColors(u32),

    /// Histogram reduction produced zero usable samples. Unreachable for any
    /// non-empty opaque input; transparent-only inputs take the sentinel path.
    #[error("histogram reduced to zero usable samples")]
    DegenerateHistogram,

    /// An index stream referenced a color outside the shared palette.
    /// Indicates a bug in the remap stage, not an input condition.
    #[error("palette index {index} out of range for palette of {palette_len} colors")]
    IndexOutOfRange { index: u8, palette_len: usize },

    /// An LZW code escaped the current bit width. The 12-bit cap is supposed
    /// to be enforced by a Clear Code before this can happen; fatal.
    #[error("LZW code {code} does not fit in {width} bits")]
    LzwCodeOverflow { code: u16, width: u32 },

    /// The assembled bytes failed the independent self-check. The buffer is
    /// never handed back in this state.
    #[error("assembled GIF failed self-check: {}", errors.join("; "))]
    ValidationFailed { errors: Vec<String> },

    /// Export was cancelled at a frame boundary; all partial state discarded.
    #[error("export cancelled before frame {frame}")]
    Cancelled { frame: usize },
}
