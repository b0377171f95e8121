//! Width measurement under a font.
//!
//! [`TextMeasurer`] is the injected capability (real glyph metrics live in
//! backend crates). [`MeasurementContext`] binds one measurer to the currently
//! applied [`FontContext`] and ellipsis, caching widths until the font changes.

use core::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use crate::font::FontContext;
use crate::DEFAULT_ELLIPSIS;

/// Text measurement hook for glyph-accurate line fitting.
pub trait TextMeasurer: Send + Sync {
    /// Measure rendered text width for the provided font.
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        (**self).measure_text_px(text, font)
    }
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for Box<T> {
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        (**self).measure_text_px(text, font)
    }
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for Arc<T> {
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        (**self).measure_text_px(text, font)
    }
}

/// Font-metric-free measurer based on per-glyph em-width classes.
///
/// Used where no font backend is available (CLI, previews, tests). Results
/// are deterministic for a given `(text, font)` pair.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeuristicMeasurer {
    /// Extra spacing added between adjacent glyphs.
    pub letter_spacing_px: f32,
}

impl HeuristicMeasurer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_letter_spacing(mut self, letter_spacing_px: f32) -> Self {
        self.letter_spacing_px = letter_spacing_px;
        self
    }
}

impl TextMeasurer for HeuristicMeasurer {
    fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
        heuristic_measure_text(text, font, self.letter_spacing_px)
    }
}

fn heuristic_measure_text(text: &str, font: &FontContext, letter_spacing: f32) -> f32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let proportional = !font.is_monospace();
    let mut em_sum = 0.0f32;
    if proportional {
        for ch in text.chars() {
            em_sum += proportional_glyph_em_width(ch);
        }
    } else {
        for ch in text.chars() {
            em_sum += if ch == ' ' { 0.52 } else { 0.58 };
        }
    }

    let family = font.family.to_ascii_lowercase();
    let mut family_scale = if family.contains("sans") {
        0.99
    } else if family.contains("serif") {
        1.03
    } else {
        1.00
    };
    if font.is_bold() {
        family_scale += 0.03;
    }
    if font.style.is_slanted() {
        family_scale += 0.01;
    }
    if font.size_px >= 24.0 {
        family_scale += 0.01;
    }

    let mut width = em_sum * font.size_px * family_scale;
    if chars > 1 {
        width += (chars as f32 - 1.0) * letter_spacing;
    }
    width.max(0.0)
}

fn proportional_glyph_em_width(ch: char) -> f32 {
    match ch {
        ' ' => 0.32,
        '\t' => 1.28,
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => 0.32,
        '\u{2026}' => 0.84,
        'i' | 'l' | 'I' | '|' | '!' => 0.24,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.23,
        '-' | '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' => 0.34,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.30,
        'f' | 't' | 'j' | 'r' => 0.34,
        'm' | 'w' | 'M' | 'W' | '@' | '%' | '&' | '#' => 0.74,
        c if c.is_ascii_digit() => 0.52,
        c if c.is_ascii_uppercase() => 0.64,
        c if c.is_ascii_lowercase() => 0.52,
        c if c.is_whitespace() => 0.32,
        c if c.is_ascii_punctuation() => 0.42,
        c if is_zero_width(c) => 0.0,
        c if is_wide(c) => 1.0,
        _ => 0.56,
    }
}

fn is_zero_width(ch: char) -> bool {
    matches!(ch as u32, 0x0300..=0x036F | 0x200B..=0x200D | 0xFE00..=0xFE0F)
}

fn is_wide(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60 | 0x1F300..=0x1FAFF
    )
}

/// Bounds for the per-font width cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MeasureCacheLimits {
    /// Maximum cached strings before the cache is cleared. `0` disables caching.
    pub max_entries: usize,
}

impl Default for MeasureCacheLimits {
    fn default() -> Self {
        Self { max_entries: 4096 }
    }
}

/// Cache counters since the context was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeasureCacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Font changes and overflow clears.
    pub invalidations: u64,
    /// Entries currently held.
    pub entries: usize,
}

/// Anything the line fitter can ask for a width.
pub trait LineWidth {
    /// Width of `text` under the current font.
    fn width(&self, text: &str) -> f32;
}

impl<F> LineWidth for F
where
    F: Fn(&str) -> f32,
{
    fn width(&self, text: &str) -> f32 {
        self(text)
    }
}

/// The single measurement context owned by one truncating component.
///
/// The applied font must be refreshed with [`MeasurementContext::apply_font`]
/// before every measurement burst; a change drops every cached width.
#[derive(Debug)]
pub struct MeasurementContext<M> {
    measurer: M,
    font: FontContext,
    ellipsis: String,
    limits: MeasureCacheLimits,
    cache: RefCell<HashMap<String, f32>>,
    ellipsis_width: Cell<Option<f32>>,
    stats: Cell<MeasureCacheStats>,
}

impl<M: TextMeasurer> MeasurementContext<M> {
    pub fn new(measurer: M, font: FontContext) -> Self {
        Self {
            measurer,
            font,
            ellipsis: DEFAULT_ELLIPSIS.to_string(),
            limits: MeasureCacheLimits::default(),
            cache: RefCell::new(HashMap::new()),
            ellipsis_width: Cell::new(None),
            stats: Cell::new(MeasureCacheStats::default()),
        }
    }

    pub fn with_ellipsis(mut self, ellipsis: impl Into<String>) -> Self {
        self.set_ellipsis(ellipsis);
        self
    }

    pub fn with_cache_limits(mut self, limits: MeasureCacheLimits) -> Self {
        self.set_cache_limits(limits);
        self
    }

    pub fn font(&self) -> &FontContext {
        &self.font
    }

    pub fn ellipsis(&self) -> &str {
        &self.ellipsis
    }

    pub fn measurer(&self) -> &M {
        &self.measurer
    }

    /// Reconfigure for `font`. Returns `true` when the font changed and the
    /// cache was dropped.
    pub fn apply_font(&mut self, font: &FontContext) -> bool {
        if self.font == *font {
            return false;
        }
        log::debug!("Applying font {} (was {})", font, self.font);
        self.font = font.clone();
        self.invalidate();
        true
    }

    pub fn set_ellipsis(&mut self, ellipsis: impl Into<String>) {
        let ellipsis = ellipsis.into();
        if ellipsis != self.ellipsis {
            self.ellipsis = ellipsis;
            self.ellipsis_width.set(None);
        }
    }

    pub fn set_cache_limits(&mut self, limits: MeasureCacheLimits) {
        self.limits = limits;
        let cache = self.cache.get_mut();
        if cache.len() > limits.max_entries {
            cache.clear();
            let mut stats = self.stats.get();
            stats.entries = 0;
            self.stats.set(stats);
        }
    }

    /// Width of `text` under the applied font.
    pub fn measure(&self, text: &str) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let mut stats = self.stats.get();
        if let Some(width) = self.cache.borrow().get(text).copied() {
            stats.hits += 1;
            self.stats.set(stats);
            return width;
        }
        stats.misses += 1;
        let width = sanitize_width(self.measurer.measure_text_px(text, &self.font));
        if self.limits.max_entries > 0 {
            let mut cache = self.cache.borrow_mut();
            if cache.len() >= self.limits.max_entries {
                log::debug!(
                    "Measure cache reached {} entries; clearing",
                    self.limits.max_entries
                );
                cache.clear();
                stats.invalidations += 1;
            }
            cache.insert(text.to_string(), width);
            stats.entries = cache.len();
        }
        self.stats.set(stats);
        width
    }

    /// Width of the configured ellipsis under the applied font.
    pub fn measure_ellipsis(&self) -> f32 {
        if let Some(width) = self.ellipsis_width.get() {
            return width;
        }
        let width = sanitize_width(self.measurer.measure_text_px(&self.ellipsis, &self.font));
        self.ellipsis_width.set(Some(width));
        width
    }

    pub fn cache_stats(&self) -> MeasureCacheStats {
        self.stats.get()
    }

    fn invalidate(&mut self) {
        self.cache.get_mut().clear();
        self.ellipsis_width.set(None);
        let mut stats = self.stats.get();
        stats.invalidations += 1;
        stats.entries = 0;
        self.stats.set(stats);
    }
}

impl<M: TextMeasurer> LineWidth for MeasurementContext<M> {
    fn width(&self, text: &str) -> f32 {
        self.measure(text)
    }
}

fn sanitize_width(width: f32) -> f32 {
    if width.is_nan() || width < 0.0 {
        0.0
    } else {
        width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontStyle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMeasurer {
        calls: AtomicUsize,
    }

    impl TextMeasurer for CountingMeasurer {
        fn measure_text_px(&self, text: &str, font: &FontContext) -> f32 {
            self.calls.fetch_add(1, Ordering::Relaxed);
            text.chars().count() as f32 * font.size_px / 2.0
        }
    }

    fn counting() -> CountingMeasurer {
        CountingMeasurer {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn heuristic_width_is_monotonic_in_prefix_length() {
        let measurer = HeuristicMeasurer::new();
        let font = FontContext::default();
        let text = "Lorem Ipsum is simply dummy text";
        let mut last = 0.0;
        for (idx, _) in text.char_indices().skip(1) {
            let width = measurer.measure_text_px(&text[..idx], &font);
            assert!(width >= last, "width shrank at {}", idx);
            last = width;
        }
    }

    #[test]
    fn heuristic_width_scales_with_weight_and_size() {
        let measurer = HeuristicMeasurer::new();
        let regular = FontContext::new("Inter", 16.0);
        let bold = regular.clone().with_weight(700);
        let large = FontContext::new("Inter", 32.0);
        let base = measurer.measure_text_px("Hello", &regular);
        assert!(measurer.measure_text_px("Hello", &bold) > base);
        assert!(measurer.measure_text_px("Hello", &large) > base * 1.9);

        let semibold = regular.clone().with_weight(600);
        assert_eq!(measurer.measure_text_px("Hello", &semibold), base);
        let italic = regular.clone().with_style(FontStyle::Italic);
        assert!(measurer.measure_text_px("Hello", &italic) > base);
    }

    #[test]
    fn heuristic_monospace_ignores_glyph_class() {
        let measurer = HeuristicMeasurer::new();
        let font = FontContext::new("monospace", 10.0);
        assert_eq!(
            measurer.measure_text_px("iiii", &font),
            measurer.measure_text_px("mmmm", &font)
        );
    }

    #[test]
    fn letter_spacing_adds_between_glyphs_only() {
        let font = FontContext::new("monospace", 10.0);
        let plain = HeuristicMeasurer::new();
        let spaced = HeuristicMeasurer::new().with_letter_spacing(2.0);
        assert_eq!(
            spaced.measure_text_px("abcd", &font),
            plain.measure_text_px("abcd", &font) + 6.0
        );
        assert_eq!(
            spaced.measure_text_px("a", &font),
            plain.measure_text_px("a", &font)
        );
        assert_eq!(spaced.measure_text_px("", &font), 0.0);
    }

    #[test]
    fn context_caches_until_font_changes() {
        let mut ctx = MeasurementContext::new(counting(), FontContext::new("serif", 10.0));
        assert_eq!(ctx.measure("abcd"), 20.0);
        assert_eq!(ctx.measure("abcd"), 20.0);
        assert_eq!(ctx.measurer().calls.load(Ordering::Relaxed), 1);

        assert!(!ctx.apply_font(&FontContext::new("serif", 10.0)));
        assert_eq!(ctx.measure("abcd"), 20.0);
        assert_eq!(ctx.measurer().calls.load(Ordering::Relaxed), 1);

        assert!(ctx.apply_font(&FontContext::new("serif", 20.0)));
        assert_eq!(ctx.measure("abcd"), 40.0);
        assert_eq!(ctx.measurer().calls.load(Ordering::Relaxed), 2);

        let stats = ctx.cache_stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn ellipsis_width_follows_font_and_marker() {
        let mut ctx = MeasurementContext::new(counting(), FontContext::new("serif", 10.0));
        assert_eq!(ctx.measure_ellipsis(), 15.0);
        ctx.set_ellipsis("\u{2026}");
        assert_eq!(ctx.measure_ellipsis(), 5.0);
        ctx.apply_font(&FontContext::new("serif", 4.0));
        assert_eq!(ctx.measure_ellipsis(), 2.0);
    }

    #[test]
    fn cache_clears_when_full() {
        let ctx = MeasurementContext::new(counting(), FontContext::default())
            .with_cache_limits(MeasureCacheLimits { max_entries: 2 });
        ctx.measure("a");
        ctx.measure("b");
        ctx.measure("c");
        let stats = ctx.cache_stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn zero_entry_limit_disables_cache() {
        let ctx = MeasurementContext::new(counting(), FontContext::default())
            .with_cache_limits(MeasureCacheLimits { max_entries: 0 });
        ctx.measure("same");
        ctx.measure("same");
        assert_eq!(ctx.measurer().calls.load(Ordering::Relaxed), 2);
        assert_eq!(ctx.cache_stats().entries, 0);
    }

    #[test]
    fn negative_and_nan_widths_are_clamped() {
        struct Broken;
        impl TextMeasurer for Broken {
            fn measure_text_px(&self, text: &str, _font: &FontContext) -> f32 {
                if text.len() % 2 == 0 {
                    f32::NAN
                } else {
                    -3.0
                }
            }
        }
        let ctx = MeasurementContext::new(Broken, FontContext::default());
        assert_eq!(ctx.measure("ab"), 0.0);
        assert_eq!(ctx.measure("abc"), 0.0);
    }

    #[test]
    fn closures_measure_lines() {
        let width = |text: &str| text.len() as f32;
        assert_eq!(LineWidth::width(&width, "four"), 4.0);
    }
}
