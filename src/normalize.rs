//! Flatten rendered content into paragraphs of words.
//!
//! Plain text and (X)HTML markup both reduce to [`NormalizedText`]: the text a
//! reader would see, with forced line breaks as paragraph boundaries and
//! breaking whitespace as word boundaries.

use core::fmt;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::NormalizeError;

/// Hard limits applied while flattening markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizeLimits {
    /// Maximum markup payload accepted, in bytes.
    pub max_input_bytes: usize,
    /// Maximum tracked element nesting; deeper elements are flattened.
    pub max_nesting: usize,
}

impl Default for NormalizeLimits {
    fn default() -> Self {
        Self {
            max_input_bytes: 1024 * 1024,
            max_nesting: 64,
        }
    }
}

/// One paragraph: the words between two forced breaks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Paragraph {
    words: Vec<String>,
}

impl Paragraph {
    /// Build a paragraph, dropping empty words.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words
                .into_iter()
                .map(Into::into)
                .filter(|w: &String| !w.is_empty())
                .collect(),
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// True for a bare break with no words.
    pub fn is_blank(&self) -> bool {
        self.words.is_empty()
    }
}

/// Plain text with explicit paragraph/word structure.
///
/// Leading and trailing blank paragraphs are dropped on construction, so the
/// first and last paragraphs always carry words unless the text is empty.
/// The canonical string form joins words with one space and paragraphs with
/// `\n`; normalizing that string again yields an equal value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedText {
    paragraphs: Vec<Paragraph>,
}

impl NormalizedText {
    /// Build from paragraphs, trimming blank paragraphs at both ends.
    pub fn from_paragraphs(mut paragraphs: Vec<Paragraph>) -> Self {
        while paragraphs.last().is_some_and(Paragraph::is_blank) {
            paragraphs.pop();
        }
        let leading = paragraphs
            .iter()
            .take_while(|p| p.is_blank())
            .count();
        paragraphs.drain(..leading);
        Self { paragraphs }
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// True when there is nothing to measure.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.words.len()).sum()
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, paragraph) in self.paragraphs.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            for (word_idx, word) in paragraph.words.iter().enumerate() {
                if word_idx > 0 {
                    f.write_str(" ")?;
                }
                f.write_str(word)?;
            }
        }
        Ok(())
    }
}

/// Renderable content handed to the normalizer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Content {
    /// Plain text; `\r\n`, `\r` and `\n` are forced breaks.
    Plain(String),
    /// (X)HTML fragment; flattened the way it would render.
    Markup(String),
}

impl Content {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn markup(markup: impl Into<String>) -> Self {
        Self::Markup(markup.into())
    }

    /// The raw source string.
    pub fn as_source(&self) -> &str {
        match self {
            Self::Plain(text) | Self::Markup(text) => text,
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Plain(String::new())
    }
}

/// Converts content into [`NormalizedText`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TextNormalizer {
    limits: NormalizeLimits,
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: NormalizeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> NormalizeLimits {
        self.limits
    }

    /// Normalize either content flavor.
    pub fn normalize(&self, content: &Content) -> Result<NormalizedText, NormalizeError> {
        match content {
            Content::Plain(text) => Ok(normalize_plain(text)),
            Content::Markup(markup) => self.normalize_markup(markup),
        }
    }

    /// Flatten an (X)HTML fragment into its rendered text.
    pub fn normalize_markup(&self, markup: &str) -> Result<NormalizedText, NormalizeError> {
        if markup.len() > self.limits.max_input_bytes {
            return Err(NormalizeError::new(
                "NORMALIZE_INPUT_TOO_LARGE",
                format!(
                    "markup is {} bytes, limit is {}",
                    markup.len(),
                    self.limits.max_input_bytes
                ),
            ));
        }

        let mut reader = Reader::from_reader(markup.as_bytes());
        reader.config_mut().trim_text(false);
        reader.config_mut().check_end_names = false;
        let mut buf = Vec::with_capacity(64);
        let mut builder = ParagraphBuilder::default();
        let mut stack: Vec<String> = Vec::with_capacity(8);
        let mut skip_depth = 0usize;
        let mut nesting_overflow = 0usize;
        let mut entity_buf = String::with_capacity(16);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if should_skip_tag(&tag) {
                        skip_depth += 1;
                        buf.clear();
                        continue;
                    }
                    if skip_depth > 0 {
                        buf.clear();
                        continue;
                    }
                    if tag == "br" {
                        builder.force_break();
                    } else if is_block_tag(&tag) {
                        builder.block_boundary();
                    }
                    if is_void_tag(&tag) {
                        buf.clear();
                        continue;
                    }
                    if stack.len() >= self.limits.max_nesting {
                        nesting_overflow += 1;
                        log::warn!(
                            "Element nesting depth {} exceeds max_nesting ({}); flattening",
                            stack.len() + nesting_overflow,
                            self.limits.max_nesting
                        );
                    } else {
                        stack.push(tag);
                    }
                }
                Ok(Event::Empty(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if skip_depth > 0 || should_skip_tag(&tag) {
                        buf.clear();
                        continue;
                    }
                    if tag == "br" {
                        builder.force_break();
                    } else if is_block_tag(&tag) {
                        builder.block_boundary();
                    }
                }
                Ok(Event::End(e)) => {
                    let tag = decode_tag_name(&reader, e.name().as_ref())?;
                    if should_skip_tag(&tag) {
                        skip_depth = skip_depth.saturating_sub(1);
                        buf.clear();
                        continue;
                    }
                    if skip_depth > 0 || is_void_tag(&tag) {
                        buf.clear();
                        continue;
                    }
                    if is_block_tag(&tag) {
                        builder.block_boundary();
                    }
                    if nesting_overflow > 0 {
                        nesting_overflow -= 1;
                    } else if let Some(pos) = stack.iter().rposition(|open| *open == tag) {
                        stack.truncate(pos);
                    }
                }
                Ok(Event::Text(e)) => {
                    if skip_depth > 0 {
                        buf.clear();
                        continue;
                    }
                    let text = e.decode().map_err(|err| {
                        NormalizeError::new(
                            "NORMALIZE_TOKENIZE_ERROR",
                            format!("Decode error: {:?}", err),
                        )
                        .with_source("text node decode")
                        .with_token_offset(reader_token_offset(&reader))
                    })?;
                    builder.push_text(text.as_ref(), is_preformatted_context(&stack));
                }
                Ok(Event::CData(e)) => {
                    if skip_depth > 0 {
                        buf.clear();
                        continue;
                    }
                    let text = reader.decoder().decode(&e).map_err(|err| {
                        NormalizeError::new(
                            "NORMALIZE_TOKENIZE_ERROR",
                            format!("Decode error: {:?}", err),
                        )
                        .with_source("cdata decode")
                        .with_token_offset(reader_token_offset(&reader))
                    })?;
                    builder.push_text(text.as_ref(), is_preformatted_context(&stack));
                }
                Ok(Event::GeneralRef(e)) => {
                    if skip_depth > 0 {
                        buf.clear();
                        continue;
                    }
                    let entity_name = e.decode().map_err(|err| {
                        NormalizeError::new(
                            "NORMALIZE_TOKENIZE_ERROR",
                            format!("Decode error: {:?}", err),
                        )
                        .with_source("entity decode")
                        .with_token_offset(reader_token_offset(&reader))
                    })?;
                    entity_buf.clear();
                    entity_buf.push('&');
                    entity_buf.push_str(entity_name.as_ref());
                    entity_buf.push(';');
                    match quick_xml::escape::unescape(&entity_buf) {
                        Ok(resolved) => {
                            builder.push_text(resolved.as_ref(), is_preformatted_context(&stack))
                        }
                        Err(_) => match html_entity(entity_name.as_ref()) {
                            Some(ch) => builder.push_char(ch),
                            None => {
                                log::debug!("Keeping unknown entity {} literally", entity_buf);
                                builder.push_text(&entity_buf, true);
                            }
                        },
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(NormalizeError::new(
                        "NORMALIZE_TOKENIZE_ERROR",
                        format!("XML error: {:?}", err),
                    )
                    .with_source("xml tokenizer")
                    .with_token_offset(reader_token_offset(&reader)));
                }
            }
            buf.clear();
        }

        Ok(builder.finish())
    }
}

/// Normalize plain text; every newline variant is one forced break.
pub fn normalize_plain(text: &str) -> NormalizedText {
    let mut builder = ParagraphBuilder::default();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                builder.force_break();
            }
            '\n' | '\u{2028}' | '\u{2029}' => builder.force_break(),
            _ => builder.push_char(ch),
        }
    }
    builder.finish()
}

/// Accumulates words and paragraphs while text streams in.
#[derive(Debug, Default)]
struct ParagraphBuilder {
    paragraphs: Vec<Paragraph>,
    words: Vec<String>,
    word: String,
}

impl ParagraphBuilder {
    fn push_char(&mut self, ch: char) {
        if is_breaking_space(ch) {
            self.end_word();
        } else {
            self.word.push(ch);
        }
    }

    fn push_text(&mut self, text: &str, preserve_newlines: bool) {
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if preserve_newlines && matches!(ch, '\n' | '\r') {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                self.force_break();
            } else {
                self.push_char(ch);
            }
        }
    }

    fn end_word(&mut self) {
        if !self.word.is_empty() {
            self.words.push(core::mem::take(&mut self.word));
        }
    }

    /// A `<br>` or newline: always closes the paragraph, even when blank.
    fn force_break(&mut self) {
        self.end_word();
        self.paragraphs.push(Paragraph {
            words: core::mem::take(&mut self.words),
        });
    }

    /// Block element edge: starts a new paragraph only if words are pending.
    fn block_boundary(&mut self) {
        self.end_word();
        if !self.words.is_empty() {
            self.force_break();
        }
    }

    fn finish(mut self) -> NormalizedText {
        self.end_word();
        if !self.words.is_empty() {
            self.force_break();
        }
        NormalizedText::from_paragraphs(self.paragraphs)
    }
}

fn is_breaking_space(ch: char) -> bool {
    ch.is_whitespace() && !matches!(ch, '\u{00A0}' | '\u{2007}' | '\u{202F}')
}

fn reader_token_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn decode_tag_name(reader: &Reader<&[u8]>, raw: &[u8]) -> Result<String, NormalizeError> {
    let decoded = reader.decoder().decode(raw).map_err(|err| {
        NormalizeError::new(
            "NORMALIZE_TOKENIZE_ERROR",
            format!("Decode error: {:?}", err),
        )
        .with_source("tag name decode")
        .with_token_offset(reader_token_offset(reader))
    })?;
    let local_name = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    Ok(local_name.to_ascii_lowercase())
}

fn should_skip_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "head" | "noscript" | "template")
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "br" | "hr" | "img" | "input" | "meta" | "link" | "wbr" | "area" | "source" | "col"
    )
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "li"
            | "ul"
            | "ol"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "blockquote"
            | "pre"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "table"
            | "tr"
            | "figure"
            | "figcaption"
            | "hr"
            | "address"
            | "dd"
            | "dt"
    )
}

fn is_preformatted_context(stack: &[String]) -> bool {
    stack
        .iter()
        .any(|tag| matches!(tag.as_str(), "pre" | "textarea"))
}

fn html_entity(name: &str) -> Option<char> {
    let ch = match name {
        "nbsp" => '\u{00A0}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "middot" => '\u{00B7}',
        "bull" => '\u{2022}',
        _ => return None,
    };
    Some(ch)
}
