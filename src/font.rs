//! Font description used as the unit of measurement invalidation.

use core::fmt;
use core::str::FromStr;

use crate::error::FontParseError;

/// Font slant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

impl FontStyle {
    /// CSS keyword for this style.
    pub fn as_css(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Italic => "italic",
            Self::Oblique => "oblique",
        }
    }

    /// Whether glyphs are slanted.
    pub fn is_slanted(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

/// Resolved font properties for a measurement burst.
///
/// The fitter treats this as opaque. Any field change invalidates cached widths.
#[derive(Clone, Debug, PartialEq)]
pub struct FontContext {
    /// Numeric weight (100..=900).
    pub weight: u16,
    pub style: FontStyle,
    /// Font size in pixels.
    pub size_px: f32,
    /// Family name or generic family (`serif`, `sans-serif`, `monospace`).
    pub family: String,
}

impl Default for FontContext {
    fn default() -> Self {
        Self {
            weight: 400,
            style: FontStyle::Normal,
            size_px: 16.0,
            family: "sans-serif".to_string(),
        }
    }
}

impl FontContext {
    /// Create a regular-weight, upright font description.
    pub fn new(family: impl Into<String>, size_px: f32) -> Self {
        Self {
            family: family.into(),
            size_px,
            ..Self::default()
        }
    }

    /// Set the numeric weight, clamped to `100..=900`.
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight.clamp(100, 900);
        self
    }

    /// Set the slant.
    pub fn with_style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    /// True for weights at or above 700.
    pub fn is_bold(&self) -> bool {
        self.weight >= 700
    }

    /// True when the family names a fixed-pitch face.
    pub fn is_monospace(&self) -> bool {
        let family = self.family.to_ascii_lowercase();
        family.contains("mono") || family.contains("fixed") || family.contains("courier")
    }

    /// Render as a CSS `font` shorthand: `<weight> <style> <size>px <family>`.
    pub fn to_css(&self) -> String {
        format!(
            "{} {} {}px {}",
            self.weight,
            self.style.as_css(),
            trim_float(self.size_px),
            self.family
        )
    }
}

impl fmt::Display for FontContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl FromStr for FontContext {
    type Err = FontParseError;

    /// Parse a CSS-like shorthand, e.g. `bold italic 14px "Inter", sans-serif`.
    ///
    /// Weight and style keywords may appear in any order before the size token.
    /// Everything after the size (minus an optional `/line-height`) is the family.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(FontParseError::Empty);
        }

        let mut font = FontContext::default();
        let mut rest = trimmed;
        loop {
            let (token, tail) = match rest.find(char::is_whitespace) {
                Some(idx) => (&rest[..idx], rest[idx..].trim_start()),
                None => (rest, ""),
            };
            if token.is_empty() {
                return Err(FontParseError::MissingSize);
            }
            let lower = token.to_ascii_lowercase();
            match lower.as_str() {
                "normal" => {}
                "italic" => font.style = FontStyle::Italic,
                "oblique" => font.style = FontStyle::Oblique,
                "bold" => font.weight = 700,
                "bolder" => font.weight = 900,
                "lighter" => font.weight = 300,
                _ if lower.ends_with("px") || lower.contains("px/") => {
                    let size_token = lower.split('/').next().unwrap_or_default();
                    let raw = size_token.trim_end_matches("px");
                    let size = raw
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite() && *v > 0.0)
                        .ok_or_else(|| FontParseError::InvalidSize(token.to_string()))?;
                    font.size_px = size;
                    let family = tail.trim();
                    if family.is_empty() {
                        return Err(FontParseError::MissingFamily);
                    }
                    font.family = first_family(family);
                    return Ok(font);
                }
                _ => match lower.parse::<u16>() {
                    Ok(weight) if (1..=1000).contains(&weight) => {
                        font.weight = weight.clamp(100, 900);
                    }
                    _ => return Err(FontParseError::MissingSize),
                },
            }
            if tail.is_empty() {
                return Err(FontParseError::MissingSize);
            }
            rest = tail;
        }
    }
}

fn first_family(stack: &str) -> String {
    stack
        .split(',')
        .map(|f| f.trim().trim_matches('"').trim_matches('\''))
        .find(|f| !f.is_empty())
        .unwrap_or("sans-serif")
        .to_string()
}

fn trim_float(value: f32) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
