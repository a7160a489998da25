//! Markdown-to-sentence extraction
//!
//! Walks a CommonMark (+ footnotes) event stream and keeps only prose that
//! is worth reading aloud: paragraphs, list items, blockquotes, link text
//! and inline code terms. Code blocks, headings, tables and images are
//! skipped wholesale. The collected text is then split into sentences and
//! passed through the line normalizer.

use once_cell::sync::Lazy;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::normalizer::TextNormalizer;
use crate::patterns as pat;

/// Sentence-ending punctuation: CJK full stops anywhere, ASCII terminators
/// only when followed by whitespace or end of input.
static SENTENCE_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[。！？]|[.!?](\s|$)").expect("static pattern must compile"));

static HORIZONTAL_WS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("static pattern must compile"));

static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("static pattern must compile"));

/// Dotted technical tokens that must not be treated as sentence ends.
const PROTECTED_TOKENS: &[&str] = &[
    ".New()",
    ".Load()",
    ".Call()",
    ".com/",
    ".org/",
    ".net/",
    ".go",
];

/// Extracts TTS-ready sentences from a complete Markdown document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownExtractor {
    normalizer: TextNormalizer,
}

impl MarkdownExtractor {
    pub fn new() -> Self {
        Self {
            normalizer: TextNormalizer::new(),
        }
    }

    /// Produce the ordered list of speakable sentences for a document.
    ///
    /// Every sentence has already been normalized and passed the validity
    /// predicate; callers can hand them straight to the dispatcher.
    pub fn extract(&self, markdown: &str) -> Vec<String> {
        let text = self.collect_prose(markdown);

        self.split_sentences(&text)
            .into_iter()
            .filter_map(|sentence| {
                let processed = self.normalizer.normalize(&sentence);
                (!processed.is_empty() && self.normalizer.is_valid(&processed))
                    .then_some(processed)
            })
            .collect()
    }

    /// Walk the event stream and collect prose, one paragraph per line.
    fn collect_prose(&self, markdown: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let parser = Parser::new_ext(markdown, options);

        let mut out = String::new();
        let mut code_depth = 0usize;
        let mut heading_depth = 0usize;
        let mut table_depth = 0usize;
        let mut image_depth = 0usize;

        for event in parser {
            match event {
                Event::Start(tag) => match tag {
                    Tag::CodeBlock(_) => code_depth += 1,
                    Tag::Heading { .. } => heading_depth += 1,
                    Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {
                        table_depth += 1
                    }
                    Tag::Image { .. } => image_depth += 1,
                    _ => {}
                },
                Event::End(end) => match end {
                    TagEnd::CodeBlock => code_depth = code_depth.saturating_sub(1),
                    TagEnd::Heading(_) => heading_depth = heading_depth.saturating_sub(1),
                    TagEnd::Table | TagEnd::TableHead | TagEnd::TableRow | TagEnd::TableCell => {
                        table_depth = table_depth.saturating_sub(1)
                    }
                    TagEnd::Image => image_depth = image_depth.saturating_sub(1),
                    TagEnd::Paragraph | TagEnd::Item => {
                        if table_depth == 0 && heading_depth == 0 {
                            out.push('\n');
                        }
                    }
                    _ => {}
                },
                Event::Text(text) => {
                    if code_depth == 0 && heading_depth == 0 && table_depth == 0 && image_depth == 0
                    {
                        out.push_str(&text);
                        out.push(' ');
                    }
                }
                // Inline code is usually a technical term worth hearing;
                // keep the content, never the backticks.
                Event::Code(code) => {
                    if code_depth == 0 && heading_depth == 0 && table_depth == 0 && image_depth == 0
                    {
                        out.push_str(&code);
                        out.push(' ');
                    }
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    if code_depth == 0 && heading_depth == 0 && table_depth == 0 && image_depth == 0
                    {
                        if let Some(inner) = extract_html_text(&html) {
                            out.push_str(&inner);
                            out.push(' ');
                        }
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if code_depth == 0 && heading_depth == 0 && table_depth == 0 && image_depth == 0
                    {
                        out.push(' ');
                    }
                }
                _ => {}
            }
        }

        let out = HORIZONTAL_WS.replace_all(&out, " ");
        let out = BLANK_LINES.replace_all(&out, "\n");
        out.trim().to_string()
    }

    /// Split collected prose into sentences, keeping the terminating
    /// punctuation attached. Dotted technical tokens are masked first so
    /// `.com/` or `.New()` never produce a split.
    fn split_sentences(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut sentences = Vec::new();

        for paragraph in text.split('\n') {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let masked = mask_protected(paragraph);

            let mut last = 0;
            for m in SENTENCE_END.find_iter(&masked) {
                let piece = masked[last..m.end()].trim();
                if !piece.is_empty() {
                    sentences.push(unmask_protected(piece));
                }
                last = m.end();
            }
            let tail = masked[last..].trim();
            if !tail.is_empty() {
                sentences.push(unmask_protected(tail));
            }
        }

        sentences
    }
}

/// Strip tags from an HTML fragment and return its text content, or None
/// when the fragment must be skipped entirely (scripts, styles, images).
fn extract_html_text(html: &str) -> Option<String> {
    let lowered = html.to_lowercase();
    if lowered.contains("<script") || lowered.contains("<style") || lowered.contains("<img") {
        return None;
    }

    let text = pat::HTML_TAG.replace_all(html, " ");
    let mut text = text.into_owned();
    for (entity, decoded) in [
        ("&nbsp;", " "),
        ("&amp;", "&"),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&apos;", "'"),
    ] {
        text = text.replace(entity, decoded);
    }

    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

fn mask_protected(text: &str) -> String {
    let mut masked = text.to_string();
    for (i, token) in PROTECTED_TOKENS.iter().enumerate() {
        masked = masked.replace(token, &format!("\u{E000}{i}\u{E001}"));
    }
    masked
}

fn unmask_protected(text: &str) -> String {
    let mut restored = text.to_string();
    for (i, token) in PROTECTED_TOKENS.iter().enumerate() {
        restored = restored.replace(&format!("\u{E000}{i}\u{E001}"), token);
    }
    restored
}
