//! Width-aware multi-line truncation for rendered text.
//!
//! The pipeline is:
//! 1. [`TextNormalizer`] flattens plain text or (X)HTML markup into
//!    [`NormalizedText`] (paragraphs of words).
//! 2. A [`MeasurementContext`] measures strings under one [`FontContext`]
//!    through an injected [`TextMeasurer`].
//! 3. [`fit`] / [`LineFitter`] binary-searches word and grapheme boundaries to
//!    produce at most `max_lines` [`Line`]s, ellipsizing the last one when the
//!    full text does not fit.
//!
//! Host integration (container width, resize notifications, frame retries)
//! lives in the `ellipsize-render` crate.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod error;
pub mod fit;
pub mod font;
pub mod measure;
pub mod normalize;

pub use error::{FontParseError, NormalizeError};
pub use fit::{fit, FitParams, Line, LineDecision, LineEnd, LineFitter, TruncationResult};
pub use font::{FontContext, FontStyle};
pub use measure::{
    HeuristicMeasurer, LineWidth, MeasureCacheLimits, MeasureCacheStats, MeasurementContext,
    TextMeasurer,
};
pub use normalize::{Content, NormalizeLimits, NormalizedText, Paragraph, TextNormalizer};

/// Default truncation marker.
pub const DEFAULT_ELLIPSIS: &str = "...";
