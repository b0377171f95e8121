//! Binary-search line fitting with a measured ellipsis.
//!
//! Lines are filled greedily by a word-count binary search. On the last line
//! budget the remaining words are flattened into one string and a second
//! binary search over grapheme boundaries finds the longest prefix that still
//! leaves room for the ellipsis.

use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::measure::LineWidth;
use crate::normalize::{NormalizedText, Paragraph};

/// Inputs that are not text or measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitParams {
    /// Width budget per line, in pixels.
    pub target_width: f32,
    /// Line budget; `0` disables truncation.
    pub max_lines: usize,
    /// Measured width of the ellipsis reserved on the truncated line.
    pub ellipsis_width: f32,
    /// Strip trailing whitespace from the truncated line, cascading into
    /// earlier lines when that empties it.
    pub trim_trailing_whitespace: bool,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            target_width: 0.0,
            max_lines: 1,
            ellipsis_width: 0.0,
            trim_trailing_whitespace: false,
        }
    }
}

impl FitParams {
    pub fn new(target_width: f32, max_lines: usize) -> Self {
        Self {
            target_width,
            max_lines,
            ..Self::default()
        }
    }

    pub fn with_ellipsis_width(mut self, ellipsis_width: f32) -> Self {
        self.ellipsis_width = ellipsis_width;
        self
    }

    pub fn with_trim_trailing_whitespace(mut self, trim: bool) -> Self {
        self.trim_trailing_whitespace = trim;
        self
    }
}

/// What follows a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnd {
    /// Soft wrap; the original separator was one space.
    Wrap,
    /// Forced break(s). `breaks > 1` means blank paragraphs were skipped.
    Paragraph { breaks: usize },
    /// End of content.
    Final,
    /// Truncation point; the ellipsis goes here.
    Truncated,
}

impl LineEnd {
    fn separator(self) -> Option<(&'static str, usize)> {
        match self {
            Self::Wrap => Some((" ", 1)),
            Self::Paragraph { breaks } => Some(("\n", breaks)),
            Self::Final | Self::Truncated => None,
        }
    }
}

/// One output line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub end: LineEnd,
}

impl Line {
    fn new(text: impl Into<String>, end: LineEnd) -> Self {
        Self {
            text: text.into(),
            end,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.end == LineEnd::Truncated
    }
}

/// Fitted lines and whether content was cut.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TruncationResult {
    pub lines: Vec<Line>,
    pub truncated: bool,
}

impl TruncationResult {
    /// Result for a width no text can fit in.
    pub fn nothing_fits() -> Self {
        Self {
            lines: Vec::new(),
            truncated: true,
        }
    }

    /// Join lines with their original separators.
    ///
    /// For an untruncated result this is the canonical normalized text.
    pub fn rejoin(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.text);
            if let Some((sep, count)) = line.end.separator() {
                for _ in 0..count {
                    out.push_str(sep);
                }
            }
        }
        out
    }

    pub fn last_line(&self) -> Option<&Line> {
        self.lines.last()
    }

    /// Line texts as displayed, with `ellipsis` after the truncation point.
    pub fn render_with_ellipsis(&self, ellipsis: &str) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| {
                if line.is_truncated() {
                    let mut text = String::with_capacity(line.text.len() + ellipsis.len());
                    text.push_str(&line.text);
                    text.push_str(ellipsis);
                    text
                } else {
                    line.text.clone()
                }
            })
            .collect()
    }
}

/// Outcome of sizing one line budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineDecision {
    /// Emit this many words from the current paragraph.
    Emit { words: usize },
    /// End here: flatten what remains and cut at a grapheme with the ellipsis.
    Ellipsize,
}

/// Reusable fitter bound to one set of [`FitParams`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LineFitter {
    params: FitParams,
}

impl LineFitter {
    pub fn new(params: FitParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> FitParams {
        self.params
    }

    /// Fit `text` with `measure`.
    pub fn fit<W: LineWidth + ?Sized>(&self, measure: &W, text: &NormalizedText) -> TruncationResult {
        fit(measure, text, self.params)
    }

    /// Decide how a line budget is spent on `words`, the unconsumed words of
    /// the current paragraph.
    ///
    /// The last budget always ellipsizes. Otherwise the longest word prefix
    /// that fits is emitted; when not even one word fits the budget is
    /// retried on the ellipsis path instead of emitting an empty line.
    pub fn decide<W: LineWidth + ?Sized>(
        &self,
        measure: &W,
        words: &[String],
        last_budget: bool,
    ) -> LineDecision {
        let joined = JoinedWords::new(words);
        let full_fits = measure.width(joined.as_str()) <= self.params.target_width;
        decide_line(measure, &joined, full_fits, last_budget, self.params.target_width)
    }
}

/// Fit `text` into at most `params.max_lines` lines of `params.target_width`.
///
/// Pure and total: degenerate widths produce [`TruncationResult::nothing_fits`],
/// as does truncating when the ellipsis alone is wider than the target.
/// `max_lines == 0` passes the text through as one untruncated line.
pub fn fit<W: LineWidth + ?Sized>(
    measure: &W,
    text: &NormalizedText,
    params: FitParams,
) -> TruncationResult {
    if params.max_lines == 0 {
        return TruncationResult {
            lines: vec![Line::new(text.to_string(), LineEnd::Final)],
            truncated: false,
        };
    }
    if text.is_empty() {
        return TruncationResult {
            lines: vec![Line::new(String::new(), LineEnd::Final)],
            truncated: false,
        };
    }
    if !params.target_width.is_finite() || params.target_width <= 0.0 {
        log::debug!(
            "Target width {} leaves no room for text",
            params.target_width
        );
        return TruncationResult::nothing_fits();
    }

    let paragraphs = text.paragraphs();
    let mut lines: Vec<Line> = Vec::with_capacity(params.max_lines.min(16));
    let mut cursor = Cursor::default();
    let mut line_no = 1usize;

    while line_no <= params.max_lines {
        let Some(paragraph) = paragraphs.get(cursor.paragraph) else {
            break;
        };
        let words = &paragraph.words()[cursor.word..];
        let joined = JoinedWords::new(words);
        let full_fits = measure.width(joined.as_str()) <= params.target_width;
        let last_paragraph = cursor.paragraph + 1 == paragraphs.len();

        if full_fits && last_paragraph {
            lines.push(Line::new(joined.as_str(), LineEnd::Final));
            return TruncationResult {
                lines,
                truncated: false,
            };
        }

        let last_budget = line_no == params.max_lines;
        let decision = decide_line(measure, &joined, full_fits, last_budget, params.target_width);

        match decision {
            LineDecision::Ellipsize => {
                if line_no < params.max_lines {
                    log::trace!(
                        "No word fits on line {}; ellipsizing at grapheme level",
                        line_no
                    );
                }
                let rest = flatten_remaining(paragraphs, cursor);
                let prefix = ellipsis_prefix(measure, &rest, params);
                if prefix.is_empty() && params.ellipsis_width > params.target_width {
                    log::debug!(
                        "Ellipsis width {} exceeds target width {}",
                        params.ellipsis_width,
                        params.target_width
                    );
                    return TruncationResult::nothing_fits();
                }
                lines.push(Line::new(prefix, LineEnd::Truncated));
                if params.trim_trailing_whitespace {
                    trim_truncated_tail(measure, &mut lines, params);
                }
                return TruncationResult {
                    lines,
                    truncated: true,
                };
            }
            LineDecision::Emit { words: count } => {
                let end = if count < words.len() {
                    cursor.word += count;
                    LineEnd::Wrap
                } else {
                    let breaks = cursor.advance_paragraph(paragraphs);
                    LineEnd::Paragraph { breaks }
                };
                lines.push(Line::new(joined.prefix(count), end));
                line_no += 1;
            }
        }
    }

    // Content ran out between budgets; the last emitted line ends the text.
    if let Some(last) = lines.last_mut() {
        last.end = LineEnd::Final;
    }
    TruncationResult {
        lines,
        truncated: false,
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Cursor {
    paragraph: usize,
    word: usize,
}

impl Cursor {
    /// Move past the current paragraph and any blank ones after it; returns
    /// the number of forced breaks crossed.
    fn advance_paragraph(&mut self, paragraphs: &[Paragraph]) -> usize {
        let mut breaks = 1;
        self.paragraph += 1;
        self.word = 0;
        while paragraphs
            .get(self.paragraph)
            .is_some_and(Paragraph::is_blank)
        {
            self.paragraph += 1;
            breaks += 1;
        }
        breaks
    }
}

/// Words joined by single spaces, with each word's end offset.
struct JoinedWords {
    text: String,
    ends: SmallVec<[usize; 32]>,
}

impl JoinedWords {
    fn new(words: &[String]) -> Self {
        let capacity = words.iter().map(|w| w.len() + 1).sum();
        let mut text = String::with_capacity(capacity);
        let mut ends = SmallVec::with_capacity(words.len());
        for (idx, word) in words.iter().enumerate() {
            if idx > 0 {
                text.push(' ');
            }
            text.push_str(word);
            ends.push(text.len());
        }
        Self { text, ends }
    }

    fn as_str(&self) -> &str {
        &self.text
    }

    fn len(&self) -> usize {
        self.ends.len()
    }

    /// First `count` words, space-joined.
    fn prefix(&self, count: usize) -> &str {
        match count {
            0 => "",
            n => &self.text[..self.ends[n.min(self.ends.len()) - 1]],
        }
    }
}

fn decide_line<W: LineWidth + ?Sized>(
    measure: &W,
    joined: &JoinedWords,
    full_fits: bool,
    last_budget: bool,
    target_width: f32,
) -> LineDecision {
    if last_budget {
        LineDecision::Ellipsize
    } else if full_fits {
        LineDecision::Emit {
            words: joined.len(),
        }
    } else {
        decide_words(measure, joined, target_width)
    }
}

/// Largest word count whose joined prefix fits `target_width`.
fn decide_words<W: LineWidth + ?Sized>(
    measure: &W,
    joined: &JoinedWords,
    target_width: f32,
) -> LineDecision {
    let mut lower = 0usize;
    let mut upper = joined.len();
    while lower < upper {
        let middle = lower + (upper - lower) / 2;
        if measure.width(joined.prefix(middle + 1)) <= target_width {
            lower = middle + 1;
        } else {
            upper = middle;
        }
    }
    if lower == 0 {
        LineDecision::Ellipsize
    } else {
        LineDecision::Emit { words: lower }
    }
}

/// Every unconsumed word, paragraph breaks discarded.
fn flatten_remaining(paragraphs: &[Paragraph], cursor: Cursor) -> String {
    let remaining = || {
        paragraphs
            .iter()
            .enumerate()
            .skip(cursor.paragraph)
            .flat_map(move |(idx, paragraph)| {
                let skip = if idx == cursor.paragraph { cursor.word } else { 0 };
                paragraph.words().iter().skip(skip)
            })
    };
    let mut out = String::with_capacity(remaining().map(|word| word.len() + 1).sum());
    for (idx, word) in remaining().enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Longest grapheme prefix of `text` that fits alongside the ellipsis.
fn ellipsis_prefix<'a, W: LineWidth + ?Sized>(
    measure: &W,
    text: &'a str,
    params: FitParams,
) -> &'a str {
    let fits =
        |end: usize| measure.width(&text[..end]) + params.ellipsis_width <= params.target_width;
    let mut graphemes = text
        .grapheme_indices(true)
        .map(|(idx, grapheme)| idx + grapheme.len());
    let mut ends: SmallVec<[usize; 64]> = SmallVec::new();

    // Gallop: double the window until its last prefix overflows or the text
    // runs out, so long remainders are never fully segmented.
    loop {
        let want = (ends.len() * 2).max(16);
        ends.extend(graphemes.by_ref().take(want - ends.len()));
        match ends.last() {
            Some(&end) if ends.len() == want && fits(end) => {}
            _ => break,
        }
    }

    let mut lower = 0usize;
    let mut upper = ends.len();
    while lower < upper {
        let middle = lower + (upper - lower) / 2;
        if fits(ends[middle]) {
            lower = middle + 1;
        } else {
            upper = middle;
        }
    }
    match lower {
        0 => "",
        n => &text[..ends[n - 1]],
    }
}

/// Trim the truncated line; while that leaves it empty, drop it and make the
/// previous line the truncation point instead.
fn trim_truncated_tail<W: LineWidth + ?Sized>(
    measure: &W,
    lines: &mut Vec<Line>,
    params: FitParams,
) {
    while let Some(last) = lines.last_mut() {
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);
        if !last.text.is_empty() {
            return;
        }
        lines.pop();
        let Some(previous) = lines.last_mut() else {
            return;
        };
        let shortened = ellipsis_prefix(measure, &previous.text, params).len();
        previous.text.truncate(shortened);
        previous.end = LineEnd::Truncated;
    }
}
