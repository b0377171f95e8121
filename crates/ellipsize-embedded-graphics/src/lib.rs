//! embedded-graphics measurer and renderer for `ellipsize` results.
//!
//! [`EgTextMeasurer`] reports the cell widths of the same mono fonts that
//! [`EgTruncateRenderer`] draws with, so fitted lines never overflow the
//! display once rendered.

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

use embedded_graphics::{
    mono_font::{
        ascii::{
            FONT_10X20, FONT_6X13_BOLD, FONT_6X13_ITALIC, FONT_6X9, FONT_7X13_BOLD,
            FONT_7X13_ITALIC, FONT_7X14, FONT_7X14_BOLD, FONT_8X13, FONT_8X13_BOLD,
            FONT_8X13_ITALIC, FONT_9X18, FONT_9X18_BOLD,
        },
        MonoFont, MonoTextStyle,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use ellipsize::{FontContext, LineEnd, TextMeasurer, TruncationResult};
use std::borrow::Cow;
use std::sync::Arc;

/// Backend-local font identifier used for metrics and rasterization dispatch.
pub type FontId = u8;

/// Why font mapping had to fall back to a nearby face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontFallbackReason {
    UnknownFamily,
    UnknownFontId,
    UnsupportedWeightItalic,
}

/// Resolved font selection for a [`FontContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontSelection {
    pub font_id: FontId,
    pub fallback_reason: Option<FontFallbackReason>,
}

/// Backend-provided metrics for a specific font id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FontMetrics {
    pub char_width: i32,
    pub space_width: i32,
    pub line_height: i32,
}

/// Font abstraction used by the measurer and the renderer.
pub trait FontBackend {
    fn resolve_font(&self, font: &FontContext) -> FontSelection;
    fn metrics(&self, font_id: FontId) -> FontMetrics;

    /// Glyphs actually drawn for `text`; may substitute characters the face
    /// lacks.
    fn displayed_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>;
}

/// `TextMeasurer` adapter backed by this crate's `FontBackend` metrics.
#[derive(Clone, Debug)]
pub struct EgTextMeasurer<B = MonoFontBackend> {
    backend: B,
}

impl EgTextMeasurer<MonoFontBackend> {
    /// Create a default measurer using the mono backend.
    pub fn new() -> Self {
        Self {
            backend: MonoFontBackend,
        }
    }

    /// Shared trait object for controller wiring.
    pub fn shared() -> Arc<dyn TextMeasurer> {
        Arc::new(Self::new())
    }
}

impl Default for EgTextMeasurer<MonoFontBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> EgTextMeasurer<B>
where
    B: FontBackend,
{
    /// Create a measurer using an explicit backend.
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B> TextMeasurer for EgTextMeasurer<B>
where
    B: FontBackend + Send + Sync,
{
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        let selection = self.backend.resolve_font(font);
        let metrics = self.backend.metrics(selection.font_id);
        let shown = self.backend.displayed_text(text);

        let mut chars = 0i32;
        let mut spaces = 0i32;
        for ch in shown.chars() {
            if ch == ' ' {
                spaces += 1;
            } else {
                chars += 1;
            }
        }
        (chars * metrics.char_width + spaces * metrics.space_width).max(0) as f32
    }
}

/// Mono-font backend mapping size buckets and weight/slant onto the
/// embedded-graphics ASCII fonts.
#[derive(Clone, Copy, Debug, Default)]
pub struct MonoFontBackend;

impl MonoFontBackend {
    const SIZE_SMALL: FontId = 0;
    const SIZE_MEDIUM: FontId = 1;
    const SIZE_LARGE: FontId = 2;
    const SIZE_XL: FontId = 3;

    const VARIANT_REGULAR: FontId = 0;
    const VARIANT_ITALIC: FontId = 1;
    const VARIANT_BOLD: FontId = 2;
    const VARIANT_BOLD_ITALIC: FontId = 3;

    fn encode_font_id(size_bucket: FontId, variant: FontId) -> FontId {
        (size_bucket << 2) | (variant & 0x03)
    }

    fn decode_font_id(font_id: FontId) -> (FontId, FontId) {
        ((font_id >> 2) & 0x03, font_id & 0x03)
    }

    fn size_bucket_for(font: &FontContext) -> FontId {
        if font.size_px >= 24.0 {
            Self::SIZE_XL
        } else if font.size_px >= 20.0 {
            Self::SIZE_LARGE
        } else if font.size_px >= 16.0 {
            Self::SIZE_MEDIUM
        } else {
            Self::SIZE_SMALL
        }
    }

    fn style_variant_for(font: &FontContext) -> FontId {
        let bold = font.is_bold();
        let slanted = font.style.is_slanted();
        match (bold, slanted) {
            (true, true) => Self::VARIANT_BOLD_ITALIC,
            (true, false) => Self::VARIANT_BOLD,
            (false, true) => Self::VARIANT_ITALIC,
            (false, false) => Self::VARIANT_REGULAR,
        }
    }

    fn font_for(font_id: FontId) -> (&'static MonoFont<'static>, Option<FontFallbackReason>) {
        let (size_bucket, variant) = Self::decode_font_id(font_id);
        match (size_bucket, variant) {
            (Self::SIZE_SMALL, Self::VARIANT_REGULAR) => (&FONT_6X9, None),
            (Self::SIZE_SMALL, Self::VARIANT_ITALIC) => (&FONT_6X13_ITALIC, None),
            (Self::SIZE_SMALL, Self::VARIANT_BOLD) => (&FONT_6X13_BOLD, None),
            (Self::SIZE_SMALL, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_6X13_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_MEDIUM, Self::VARIANT_REGULAR) => (&FONT_7X14, None),
            (Self::SIZE_MEDIUM, Self::VARIANT_ITALIC) => (&FONT_7X13_ITALIC, None),
            (Self::SIZE_MEDIUM, Self::VARIANT_BOLD) => (&FONT_7X14_BOLD, None),
            (Self::SIZE_MEDIUM, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_7X13_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_LARGE, Self::VARIANT_REGULAR) => (&FONT_8X13, None),
            (Self::SIZE_LARGE, Self::VARIANT_ITALIC) => (&FONT_8X13_ITALIC, None),
            (Self::SIZE_LARGE, Self::VARIANT_BOLD) => (&FONT_8X13_BOLD, None),
            (Self::SIZE_LARGE, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_8X13_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_XL, Self::VARIANT_REGULAR) => (&FONT_10X20, None),
            (Self::SIZE_XL, Self::VARIANT_ITALIC) => (
                &FONT_9X18,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            (Self::SIZE_XL, Self::VARIANT_BOLD) => (&FONT_9X18_BOLD, None),
            (Self::SIZE_XL, Self::VARIANT_BOLD_ITALIC) => (
                &FONT_9X18_BOLD,
                Some(FontFallbackReason::UnsupportedWeightItalic),
            ),
            _ => (&FONT_8X13, Some(FontFallbackReason::UnknownFontId)),
        }
    }

    fn style_for(font_id: FontId) -> MonoTextStyle<'static, BinaryColor> {
        let (font, _) = Self::font_for(font_id);
        MonoTextStyle::new(font, BinaryColor::On)
    }

    fn family_supported(family: &str) -> bool {
        matches!(
            family.trim().to_ascii_lowercase().as_str(),
            "monospace" | "mono" | "fixed" | "serif" | "sans-serif"
        )
    }
}

impl FontBackend for MonoFontBackend {
    fn resolve_font(&self, font: &FontContext) -> FontSelection {
        let mut fallback_reason =
            (!Self::family_supported(&font.family)).then_some(FontFallbackReason::UnknownFamily);

        let font_id =
            Self::encode_font_id(Self::size_bucket_for(font), Self::style_variant_for(font));
        let (_, style_fallback) = Self::font_for(font_id);
        if style_fallback.is_some() {
            fallback_reason = style_fallback;
        }
        if let Some(reason) = fallback_reason {
            log::trace!("Font {} mapped to mono id {} ({:?})", font, font_id, reason);
        }

        FontSelection {
            font_id,
            fallback_reason,
        }
    }

    fn metrics(&self, font_id: FontId) -> FontMetrics {
        let style = Self::style_for(font_id);
        let width = style.font.character_size.width as i32;
        FontMetrics {
            char_width: width,
            space_width: width,
            line_height: style.font.character_size.height as i32,
        }
    }

    fn displayed_text<'a>(&self, text: &'a str) -> Cow<'a, str> {
        normalize_text_for_mono(text)
    }

    fn draw_text_run<D>(
        &self,
        display: &mut D,
        font_id: FontId,
        text: &str,
        origin: Point,
    ) -> Result<i32, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let style = Self::style_for(font_id);
        let normalized = normalize_text_for_mono(text);
        Text::with_baseline(normalized.as_ref(), origin, style, Baseline::Top).draw(display)?;
        Ok((normalized.chars().count() as i32) * (style.font.character_size.width as i32))
    }
}

fn normalize_text_for_mono(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|ch| {
        matches!(
            ch,
            '\u{00A0}' // nbsp
                | '\u{2007}' // figure space
                | '\u{202F}' // narrow nbsp
                | '\u{2013}' // en dash
                | '\u{2014}' // em dash
                | '\u{2018}' // left single quote
                | '\u{2019}' // right single quote
                | '\u{201C}' // left double quote
                | '\u{201D}' // right double quote
                | '\u{2026}' // ellipsis
        )
    }) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => out.push(' '),
            '\u{2013}' | '\u{2014}' => out.push('-'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            '\u{201C}' | '\u{201D}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Layout settings for [`EgTruncateRenderer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EgTruncateConfig {
    /// Clear display before drawing.
    pub clear_first: bool,
    /// Top-left corner of the first line.
    pub origin: Point,
    /// Extra pixels between wrapped lines.
    pub line_gap_px: i32,
    /// Extra pixels after a forced paragraph break.
    pub paragraph_gap_px: i32,
}

impl Default for EgTruncateConfig {
    fn default() -> Self {
        Self {
            clear_first: true,
            origin: Point::zero(),
            line_gap_px: 2,
            paragraph_gap_px: 4,
        }
    }
}

/// What a render pass drew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EgRenderReport {
    pub lines_drawn: usize,
    pub ellipsis_drawn: bool,
    /// Widest drawn line including the ellipsis.
    pub max_line_width_px: i32,
    /// Bottom edge of the last line, relative to the origin.
    pub height_px: i32,
    pub font_fallback: Option<FontFallbackReason>,
}

/// Draws a [`TruncationResult`] top-down, appending the ellipsis after the
/// truncated line.
#[derive(Clone, Debug)]
pub struct EgTruncateRenderer<B = MonoFontBackend> {
    cfg: EgTruncateConfig,
    backend: B,
}

impl Default for EgTruncateRenderer<MonoFontBackend> {
    fn default() -> Self {
        Self::new(EgTruncateConfig::default())
    }
}

impl EgTruncateRenderer<MonoFontBackend> {
    pub fn new(cfg: EgTruncateConfig) -> Self {
        Self {
            cfg,
            backend: MonoFontBackend,
        }
    }
}

impl<B> EgTruncateRenderer<B>
where
    B: FontBackend,
{
    /// Create renderer with config and backend.
    pub fn with_backend(cfg: EgTruncateConfig, backend: B) -> Self {
        Self { cfg, backend }
    }

    pub fn config(&self) -> EgTruncateConfig {
        self.cfg
    }

    /// Render `result` as laid out for `font`.
    pub fn render<D>(
        &self,
        result: &TruncationResult,
        font: &FontContext,
        ellipsis: &str,
        display: &mut D,
    ) -> Result<EgRenderReport, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        if self.cfg.clear_first {
            display.clear(BinaryColor::Off)?;
        }
        let selection = self.backend.resolve_font(font);
        let metrics = self.backend.metrics(selection.font_id);
        let mut report = EgRenderReport {
            font_fallback: selection.fallback_reason,
            ..EgRenderReport::default()
        };

        let mut y = self.cfg.origin.y;
        for line in &result.lines {
            let origin = Point::new(self.cfg.origin.x, y);
            let mut width = if line.text.is_empty() {
                0
            } else {
                self.backend
                    .draw_text_run(display, selection.font_id, &line.text, origin)?
            };
            if line.end == LineEnd::Truncated && !ellipsis.is_empty() {
                let ellipsis_origin = Point::new(origin.x + width, y);
                width += self.backend.draw_text_run(
                    display,
                    selection.font_id,
                    ellipsis,
                    ellipsis_origin,
                )?;
                report.ellipsis_drawn = true;
            }
            report.lines_drawn += 1;
            report.max_line_width_px = report.max_line_width_px.max(width);
            report.height_px = y + metrics.line_height - self.cfg.origin.y;

            y += metrics.line_height
                + match line.end {
                    LineEnd::Paragraph { .. } => self.cfg.paragraph_gap_px,
                    _ => self.cfg.line_gap_px,
                };
        }
        Ok(report)
    }
}
