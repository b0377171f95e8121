use core::fmt;

use ellipsize::{MeasureCacheLimits, DEFAULT_ELLIPSIS};
use serde::{Deserialize, Serialize};

/// Maximum line count, or disabled truncation.
///
/// Deserializes from `false`, `true` (one line) or an integer; zero and
/// negative integers disable truncation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawLineBudget", into = "RawLineBudget")]
pub enum LineBudget {
    /// Pass the content through untouched.
    Disabled,
    /// At most this many lines (always >= 1).
    Limit(usize),
}

impl Default for LineBudget {
    fn default() -> Self {
        Self::Limit(1)
    }
}

impl LineBudget {
    /// Budget from a signed count; `<= 0` disables.
    pub fn from_count(count: i64) -> Self {
        match usize::try_from(count) {
            Ok(0) | Err(_) => Self::Disabled,
            Ok(n) => Self::Limit(n),
        }
    }

    pub fn is_disabled(self) -> bool {
        matches!(self, Self::Disabled)
    }

    /// Line count handed to the fitter; `0` when disabled.
    pub fn max_lines(self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::Limit(n) => n,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RawLineBudget {
    Flag(bool),
    Count(i64),
}

impl From<RawLineBudget> for LineBudget {
    fn from(raw: RawLineBudget) -> Self {
        match raw {
            RawLineBudget::Flag(false) => Self::Disabled,
            RawLineBudget::Flag(true) => Self::default(),
            RawLineBudget::Count(n) => Self::from_count(n),
        }
    }
}

impl From<LineBudget> for RawLineBudget {
    fn from(budget: LineBudget) -> Self {
        match budget {
            LineBudget::Disabled => Self::Flag(false),
            LineBudget::Limit(n) => Self::Count(i64::try_from(n).unwrap_or(i64::MAX)),
        }
    }
}

/// How long to keep retrying while the container has no width.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry on every frame until a width appears.
    #[default]
    Unbounded,
    /// Give up after this many deferred attempts.
    Bounded(u32),
}

/// Caller-facing options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReflowOptions {
    /// Explicit target width in pixels; overrides the container width.
    /// `None` and `0` both mean "measure the container".
    pub width: Option<f32>,
    /// Marker appended to the truncated line.
    pub ellipsis: String,
    pub lines: LineBudget,
    /// Trim trailing whitespace on the truncated line, cascading to earlier
    /// lines when that empties it.
    pub trim_whitespace: bool,
    pub retry: RetryPolicy,
    pub measure_cache: MeasureCacheLimits,
}

impl Default for ReflowOptions {
    fn default() -> Self {
        Self {
            width: None,
            ellipsis: DEFAULT_ELLIPSIS.to_string(),
            lines: LineBudget::default(),
            trim_whitespace: false,
            retry: RetryPolicy::default(),
            measure_cache: MeasureCacheLimits::default(),
        }
    }
}

impl ReflowOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReflowOptionsError> {
        serde_json::from_str(json).map_err(ReflowOptionsError)
    }

    pub fn with_width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }

    pub fn with_lines(mut self, lines: LineBudget) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_trim_whitespace(mut self, trim: bool) -> Self {
        self.trim_whitespace = trim;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The explicit width, if it overrides the container.
    pub(crate) fn explicit_width(&self) -> Option<f32> {
        self.width.filter(|w| *w != 0.0 && !w.is_nan())
    }
}

/// Failure loading [`ReflowOptions`] from JSON.
#[derive(Debug)]
pub struct ReflowOptionsError(serde_json::Error);

impl ReflowOptionsError {
    /// 1-based line of the offending input.
    pub fn line(&self) -> usize {
        self.0.line()
    }

    pub fn column(&self) -> usize {
        self.0.column()
    }
}

impl fmt::Display for ReflowOptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid reflow options: {}", self.0)
    }
}

impl std::error::Error for ReflowOptionsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}
