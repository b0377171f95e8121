//! Error types for normalization and font parsing.

use core::fmt;

/// Structured error for markup normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizeError {
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional tokenizer/read offset in bytes.
    pub token_offset: Option<usize>,
    /// Optional source context (which tokenizer step failed).
    pub source: Option<Box<str>>,
}

impl NormalizeError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().into_boxed_str(),
            token_offset: None,
            source: None,
        }
    }

    pub(crate) fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.token_offset = Some(token_offset);
        self
    }

    pub(crate) fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into().into_boxed_str());
        self
    }
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "normalize:{}: {}", self.code, self.message)?;
        if let Some(source) = self.source.as_deref() {
            write!(f, " [source={}]", source)?;
        }
        if let Some(token_offset) = self.token_offset {
            write!(f, " [token_offset={}]", token_offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for NormalizeError {}

/// Error returned when a CSS `font` shorthand cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontParseError {
    /// Input was empty or whitespace only.
    Empty,
    /// No `<number>px` size token was found.
    MissingSize,
    /// The size token was present but not a positive number.
    InvalidSize(String),
    /// Nothing followed the size token.
    MissingFamily,
}

impl fmt::Display for FontParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "font shorthand is empty"),
            Self::MissingSize => write!(f, "font shorthand has no <n>px size"),
            Self::InvalidSize(raw) => write!(f, "invalid font size: {}", raw),
            Self::MissingFamily => write!(f, "font shorthand has no family"),
        }
    }
}

impl std::error::Error for FontParseError {}
