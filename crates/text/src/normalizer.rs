//! Line-level text normalization for speech synthesis
//!
//! Turns an arbitrary source line into either a clean utterance string or a
//! drop signal. The transformation passes run in a fixed order; later
//! passes depend on what earlier ones have already removed (escapes are
//! resolved before emphasis stripping, emoji go before whitespace
//! collapse), so the order is part of the contract.

use crate::patterns as pat;

/// Canonical HTML entities that decode to text; all other named entities
/// are dropped outright.
const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&nbsp;", " "),
];

/// Normalizes raw text lines into speakable utterances and decides which
/// lines are worth synthesizing at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Run the full transformation pipeline over one line.
    pub fn normalize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let text = self.strip_non_speech(text);
        let text = self.unescape(&text);
        let text = self.strip_emphasis(&text);
        let text = self.replace_lone_symbols(&text);
        let text = self.strip_emoji(&text);
        let text = self.collapse_whitespace(&text);
        // Brackets of every family pass through untouched.
        self.space_han_latin_boundaries(&text)
    }

    /// Pass 1: remove block-level spans that have no spoken value.
    fn strip_non_speech(&self, text: &str) -> String {
        let text = pat::FENCED_CODE.replace_all(text, "\n");
        let text = pat::TILDE_CODE.replace_all(&text, "\n");
        let text = pat::INDENTED_CODE.replace_all(&text, "");

        let text = self.strip_tables(&text);

        let text = pat::IMAGE.replace_all(&text, "");
        let text = pat::HTML_IMAGE.replace_all(&text, "");

        // Links keep their text; bare URLs and emails disappear.
        let text = pat::LINK.replace_all(&text, "${1}");
        let text = pat::BARE_URL.replace_all(&text, "");
        let text = pat::EMAIL.replace_all(&text, "");

        let text = pat::HTML_TAG.replace_all(&text, "");
        let text = pat::HTML_ENTITY.replace_all(&text, |caps: &regex::Captures<'_>| {
            let entity = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            HTML_ENTITIES
                .iter()
                .find(|(name, _)| *name == entity)
                .map(|(_, decoded)| (*decoded).to_string())
                .unwrap_or_default()
        });

        let text = pat::HORIZONTAL_RULE.replace_all(&text, "");
        let text = pat::BLOCKQUOTE_MARKER.replace_all(&text, "");
        let text = pat::TASK_LIST_MARKER.replace_all(&text, "");
        let text = pat::LIST_MARKER.replace_all(&text, "");
        let text = pat::ORDERED_LIST_MARKER.replace_all(&text, "");

        let text = pat::STRIKETHROUGH.replace_all(&text, "${1}");
        let text = pat::STRIKETHROUGH_RESIDUE.replace_all(&text, "");
        let text = pat::UNDERSCORE_EMPHASIS.replace_all(&text, "${1}");
        let text = pat::UNDERSCORE_RESIDUE.replace_all(&text, "");
        pat::SINGLE_UNDERSCORE.replace_all(&text, "${1}").into_owned()
    }

    /// Drop table rows and separator rows, tracking whether we are inside
    /// a pipe-delimited table so trailing rows without pipes end it.
    fn strip_tables(&self, text: &str) -> String {
        let mut kept: Vec<&str> = Vec::new();
        let mut in_table = false;

        for line in text.split('\n') {
            let trimmed = line.trim();

            if self.is_table_row(trimmed) || self.is_table_separator(trimmed) {
                in_table = true;
                continue;
            }
            if in_table && !trimmed.contains('|') {
                in_table = false;
            }
            if !in_table {
                kept.push(line);
            }
        }

        kept.join("\n")
    }

    /// Pass 2: resolve backslash escapes so later passes see plain text.
    fn unescape(&self, text: &str) -> String {
        let text = text.replace("\\n", " ").replace("\\t", " ").replace("\\r", "");
        pat::ESCAPED_PUNCT.replace_all(&text, "${1}").into_owned()
    }

    /// Pass 3: strip inline Markdown emphasis, keeping the emphasized text.
    fn strip_emphasis(&self, text: &str) -> String {
        let text = pat::BOLD.replace_all(text, "${1}");
        let text = pat::BOLD_RESIDUE.replace_all(&text, "");
        let text = pat::ITALIC.replace_all(&text, "${1}");
        let text = pat::ITALIC_RESIDUE.replace_all(&text, "");
        let text = pat::CODE_SPAN.replace_all(&text, "${1}");
        let text = pat::CODE_SPAN_RESIDUE.replace_all(&text, "");
        let text = pat::HEADING.replace_all(&text, "${1}");
        pat::LINK.replace_all(&text, "${1}").into_owned()
    }

    /// Pass 4: read lone symbols aloud, unless the line carries a context
    /// (email, URL, price, …) in which the symbol is structural.
    fn replace_lone_symbols(&self, text: &str) -> String {
        let guarded = pat::SPECIAL_CONTEXTS.iter().any(|re| re.is_match(text));
        if guarded {
            return text.to_string();
        }

        let mut out = text.to_string();
        for entry in pat::SPOKEN_SYMBOLS.iter() {
            out = entry
                .lone
                .replace_all(&out, |caps: &regex::Captures<'_>| {
                    caps.get(0)
                        .map(|m| m.as_str().replacen(entry.symbol, entry.spoken, 1))
                        .unwrap_or_default()
                })
                .into_owned();
        }
        out
    }

    /// Pass 5: emoji carry no speech; remove them and their plumbing.
    fn strip_emoji(&self, text: &str) -> String {
        pat::EMOJI.replace_all(text, "").into_owned()
    }

    /// Pass 6: collapse whitespace runs and trim.
    fn collapse_whitespace(&self, text: &str) -> String {
        pat::WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
    }

    /// Pass 7: exactly one space between adjacent Han and Latin characters,
    /// so mixed-script text gets a natural pause.
    fn space_han_latin_boundaries(&self, text: &str) -> String {
        let text = pat::HAN_THEN_LATIN.replace_all(text, "${1} ${2}");
        pat::LATIN_THEN_HAN.replace_all(&text, "${1} ${2}").into_owned()
    }

    /// Whether a raw line deserves a synthesize call at all.
    pub fn is_valid(&self, text: &str) -> bool {
        // Indented code is judged on the raw line; everything else on the
        // trimmed form.
        if text.starts_with("    ") && !text.trim().is_empty() && self.looks_like_code(text.trim())
        {
            return false;
        }

        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if self.starts_with_emoji(text) {
            return false;
        }
        if self.is_code_line(text) {
            return false;
        }
        if self.is_table_row(text) || self.is_table_separator(text) {
            return false;
        }
        if pat::IMAGE_LINE.is_match(text) || pat::HTML_IMAGE_LINE.is_match(text) {
            return false;
        }
        if pat::PURE_URL_PATTERNS.iter().any(|re| re.is_match(text)) {
            return false;
        }
        if pat::PURE_MARKUP_PATTERNS.iter().any(|re| re.is_match(text)) {
            return false;
        }
        if text.chars().count() < 2 {
            return false;
        }

        text.chars()
            .any(|c| c.is_alphabetic() || c.is_numeric())
            || pat::HAN_CHAR.is_match(text)
    }

    /// Shorten text to fit a backend limit, preferring sentence ends, then
    /// pause marks, then word boundaries, with a hard cut as last resort.
    pub fn split_to_fit(&self, text: &str, max_chars: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        if max_chars == 0 || chars.len() <= max_chars {
            return text.to_string();
        }

        let window: String = chars[..max_chars].iter().collect();

        for ends in [
            &["。", "！", "？", ".", "!", "?"][..],
            &["，", "；", ",", ";"][..],
        ] {
            if let Some((pos, mark)) = ends
                .iter()
                .filter_map(|mark| window.rfind(mark).map(|pos| (pos, *mark)))
                .max_by_key(|(pos, _)| *pos)
            {
                if pos > 0 {
                    return window[..pos + mark.len()].to_string();
                }
            }
        }

        if let Some(pos) = window.rfind(' ') {
            if pos > 0 {
                return window[..pos].to_string();
            }
        }

        window
    }

    fn is_code_line(&self, text: &str) -> bool {
        if text.starts_with("```") || text.ends_with("```") {
            return true;
        }
        if text.starts_with("~~~") || text.ends_with("~~~") {
            return true;
        }
        self.looks_like_code(text)
    }

    fn looks_like_code(&self, text: &str) -> bool {
        pat::CODE_LINE_PATTERNS.iter().any(|re| re.is_match(text))
    }

    fn is_table_row(&self, line: &str) -> bool {
        if !line.contains('|') {
            return false;
        }
        if line.starts_with("```") || line.starts_with("~~~") {
            return false;
        }
        line.matches('|').count() >= 2
    }

    fn is_table_separator(&self, line: &str) -> bool {
        if !line.contains('|') || !line.contains('-') {
            return false;
        }
        let cleaned: String = line.chars().filter(|c| *c != ' ').collect();
        pat::TABLE_SEPARATOR.is_match(&cleaned)
    }

    fn starts_with_emoji(&self, text: &str) -> bool {
        let Some(first) = text.chars().next() else {
            return false;
        };
        let cp = first as u32;
        pat::EMOJI_RANGES
            .iter()
            .any(|(lo, hi)| cp >= *lo && cp <= *hi)
    }
}
