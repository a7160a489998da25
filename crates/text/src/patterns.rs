//! Compiled pattern tables for the normalization pipeline
//!
//! Every regex used by the normalizer lives here, compiled once. The pass
//! order in `normalizer.rs` depends on these doing exactly what they say:
//! reordering passes changes behavior.

use once_cell::sync::Lazy;
use regex::Regex;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern must compile")
}

// ---------------------------------------------------------------------------
// Block-level non-speech spans
// ---------------------------------------------------------------------------

/// Fenced code blocks with an optional language tag: ```lang ... ```
pub static FENCED_CODE: Lazy<Regex> = Lazy::new(|| re(r"(?s)```[a-zA-Z0-9]*[ \t]*\n.*?\n```[ \t]*"));

/// Tilde-fenced code blocks: ~~~ ... ~~~
pub static TILDE_CODE: Lazy<Regex> = Lazy::new(|| re(r"(?s)~~~[a-zA-Z0-9]*[ \t]*\n.*?\n~~~[ \t]*"));

/// Indented code: four leading spaces
pub static INDENTED_CODE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^    .*$"));

/// Markdown image: ![alt](url)
pub static IMAGE: Lazy<Regex> = Lazy::new(|| re(r"!\[[^\]]*\]\([^)]+\)"));

/// HTML <img> tag
pub static HTML_IMAGE: Lazy<Regex> = Lazy::new(|| re(r"(?i)<img[^>]*>"));

/// Markdown link: [text](url) — text is kept
pub static LINK: Lazy<Regex> = Lazy::new(|| re(r"\[([^\]]+)\]\([^)]+\)"));

/// Bare URLs (http, https, ftp, www.)
pub static BARE_URL: Lazy<Regex> = Lazy::new(|| re(r"https?://[^\s]+|ftp://[^\s]+|www\.[^\s]+"));

/// Email addresses
pub static EMAIL: Lazy<Regex> = Lazy::new(|| re(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"));

/// Any HTML tag (content is preserved, tag removed)
pub static HTML_TAG: Lazy<Regex> = Lazy::new(|| re(r"<[^>]*>"));

/// Named or numeric HTML entity
pub static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| re(r"&[a-zA-Z0-9#]+;"));

/// Horizontal rule: a line of ---, *** or ___
pub static HORIZONTAL_RULE: Lazy<Regex> = Lazy::new(|| re(r"(?m)^[-*_]{3,}[ \t]*$"));

/// Leading blockquote marker
pub static BLOCKQUOTE_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?m)^>\s*"));

/// Task-list marker: - [ ] / - [x]
pub static TASK_LIST_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?m)^[-*+]\s*\[[x\s]\]\s*"));

/// Unordered list marker
pub static LIST_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?m)^[-*+]\s+"));

/// Ordered list marker
pub static ORDERED_LIST_MARKER: Lazy<Regex> = Lazy::new(|| re(r"(?m)^\d+\.\s+"));

/// Strikethrough span: ~~text~~ (text kept)
pub static STRIKETHROUGH: Lazy<Regex> = Lazy::new(|| re(r"~~([^~]+)~~"));

/// Residual unpaired strikethrough markers
pub static STRIKETHROUGH_RESIDUE: Lazy<Regex> = Lazy::new(|| re(r"~~"));

/// Double-underscore emphasis: __text__ (text kept)
pub static UNDERSCORE_EMPHASIS: Lazy<Regex> = Lazy::new(|| re(r"__([^_]+)__"));

/// Residual unpaired __ markers
pub static UNDERSCORE_RESIDUE: Lazy<Regex> = Lazy::new(|| re(r"__"));

/// Single-underscore emphasis: _text_ (text kept)
pub static SINGLE_UNDERSCORE: Lazy<Regex> = Lazy::new(|| re(r"_([^_\s][^_]*[^_\s])_"));

// ---------------------------------------------------------------------------
// Escapes and inline emphasis
// ---------------------------------------------------------------------------

/// Backslash-escaped ASCII punctuation, the escape is dropped
pub static ESCAPED_PUNCT: Lazy<Regex> = Lazy::new(|| re(r"\\([!-/:-@\[-`{-~])"));

/// Bold span: **text** (text kept)
pub static BOLD: Lazy<Regex> = Lazy::new(|| re(r"\*\*([^*\n]+?)\*\*"));

/// Residual ** markers
pub static BOLD_RESIDUE: Lazy<Regex> = Lazy::new(|| re(r"\*\*"));

/// Italic span: *text* (text kept)
pub static ITALIC: Lazy<Regex> = Lazy::new(|| re(r"\*([^*\n]+?)\*"));

/// Residual * markers
pub static ITALIC_RESIDUE: Lazy<Regex> = Lazy::new(|| re(r"\*"));

/// Inline code span: `text` (text kept)
pub static CODE_SPAN: Lazy<Regex> = Lazy::new(|| re(r"`([^`]+)`"));

/// Residual backticks
pub static CODE_SPAN_RESIDUE: Lazy<Regex> = Lazy::new(|| re("`"));

/// Heading marker: leading #'s, title kept
pub static HEADING: Lazy<Regex> = Lazy::new(|| re(r"(?m)^#+\s*(.+)$"));

// ---------------------------------------------------------------------------
// Spoken symbol replacement
// ---------------------------------------------------------------------------

/// A lone symbol with its spoken replacement and the match pattern
/// requiring whitespace or a string boundary on both sides.
pub struct SpokenSymbol {
    pub symbol: &'static str,
    pub spoken: &'static str,
    pub lone: Regex,
}

fn spoken(symbol: &'static str, spoken: &'static str) -> SpokenSymbol {
    let escaped = regex::escape(symbol);
    SpokenSymbol {
        symbol,
        spoken,
        lone: re(&format!(r"(\s|^){escaped}(\s|$)")),
    }
}

/// Symbols read aloud (or dropped) when they stand alone
pub static SPOKEN_SYMBOLS: Lazy<Vec<SpokenSymbol>> = Lazy::new(|| {
    vec![
        spoken("@", "at"),
        spoken("#", ""),
        spoken("$", "美元"),
        spoken("%", "百分号"),
        spoken("^", ""),
        spoken("&", ""),
        spoken("*", ""),
        spoken("+", "加"),
        spoken("=", "等于"),
        spoken("|", ""),
        spoken("~", ""),
        spoken("`", ""),
        spoken("<", "小于"),
        spoken(">", "大于"),
        spoken("[", "左方括号"),
        spoken("]", "右方括号"),
        spoken("{", "左大括号"),
        spoken("}", "右大括号"),
    ]
});

/// Contexts in which a symbol is meaningful and must not be replaced:
/// email, URL, price, percentage, decimal, identifier, starred text,
/// phone number, dotted filename or domain.
pub static SPECIAL_CONTEXTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"\w+@\w+\.\w+"),
        re(r"https?://[^\s]+"),
        re(r"\$\d+"),
        re(r"\d+%"),
        re(r"\d+\.\d+"),
        re(r"#[a-zA-Z_]\w*"),
        re(r"\*+[^*]*\*+"),
        re(r"\+\d+(-\d+)*"),
        re(r"[a-zA-Z0-9]+\.[a-zA-Z0-9]+"),
    ]
});

// ---------------------------------------------------------------------------
// Emoji
// ---------------------------------------------------------------------------

/// Emoji and emoji plumbing, stripped wholesale before whitespace collapse.
///
/// Ranges: emoticons, misc symbols & pictographs, transport & map,
/// regional indicators, misc symbols, dingbats, supplemental symbols,
/// enclosed alphanumerics, mahjong/playing cards, CJK squared words,
/// skin-tone modifiers, variation selectors and the zero-width joiner.
pub static EMOJI: Lazy<Regex> = Lazy::new(|| {
    re(concat!(
        r"[\x{1F600}-\x{1F64F}]|[\x{1F300}-\x{1F5FF}]|[\x{1F680}-\x{1F6FF}]",
        r"|[\x{1F1E0}-\x{1F1FF}]|[\x{2600}-\x{26FF}]|[\x{2700}-\x{27BF}]",
        r"|[\x{1F900}-\x{1F9FF}]|[\x{1F018}-\x{1F270}]|[\x{238C}-\x{2454}]",
        r"|[\x{20D0}-\x{20FF}]|[\x{1F170}-\x{1F251}]|[\x{1F004}\x{1F0CF}\x{1F18E}]",
        r"|[\x{3030}\x{303D}]|[\x{3297}\x{3299}]|[\x{1F3FB}-\x{1F3FF}]",
        r"|[\x{FE00}-\x{FE0F}]|\x{200D}",
    ))
});

// ---------------------------------------------------------------------------
// Whitespace and language boundaries
// ---------------------------------------------------------------------------

pub static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| re(r"\s+"));

/// Han character directly followed by a Latin letter
pub static HAN_THEN_LATIN: Lazy<Regex> = Lazy::new(|| re(r"(\p{Han})([A-Za-z])"));

/// Latin letter directly followed by a Han character
pub static LATIN_THEN_HAN: Lazy<Regex> = Lazy::new(|| re(r"([A-Za-z])(\p{Han})"));

pub static HAN_CHAR: Lazy<Regex> = Lazy::new(|| re(r"\p{Han}"));

// ---------------------------------------------------------------------------
// Validity predicate
// ---------------------------------------------------------------------------

/// Lines that look like source code even though they contain letters
pub static CODE_LINE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^func\s+\w+\s*\("),
        re(r"^package\s+\w+"),
        re(r"^import\s+"),
        re(r"^class\s+\w+"),
        re(r"^def\s+\w+\s*\("),
        re(r"^if\s*\(.*\)\s*\{"),
        re(r"^for\s*\(.*\)\s*\{"),
        re(r"^for\s+\w+\s*:=.*\{"),
        re(r"^while\s*\(.*\)\s*\{"),
        re(r"^\s*\{"),
        re(r"^\s*\}"),
        re(r"^\s*return\s*;?\s*$"),
        re(r"fmt\.Print"),
        re(r"console\.log"),
        re(r"System\.out\.print"),
    ]
});

/// A line that is an image and nothing else
pub static IMAGE_LINE: Lazy<Regex> = Lazy::new(|| re(r"^!\[[^\]]*\]\([^)]+\)"));

/// A line that is a single <img> tag
pub static HTML_IMAGE_LINE: Lazy<Regex> = Lazy::new(|| re(r"(?i)^<img[^>]*>"));

/// Lines consisting of a URL or an email address and nothing else
pub static PURE_URL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^https?://[^\s]+$"),
        re(r"^ftp://[^\s]+$"),
        re(r"^www\.[^\s]+$"),
        re(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"),
    ]
});

/// Table separator row after spaces are removed, e.g. |---|:--:|
pub static TABLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| re(r"^\|?(:?-+:?\|)+:?-+:?\|?$"));

/// Pure markup lines: heading scaffolding, separators, empty list or
/// quote or task markers, fences, HTML comments, lone HTML tags.
pub static PURE_MARKUP_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        re(r"^#+\s*$"),
        re(r"^#+\s+.*$"),
        re(r"^\*+\s*$"),
        re(r"^-+\s*$"),
        re(r"^=+\s*$"),
        re(r"^_+\s*$"),
        re(r"^#+[^a-zA-Z\p{Han}]*$"),
        re(r"^\*{3,}[^a-zA-Z\p{Han}]*$"),
        re(r"^-{3,}[^a-zA-Z\p{Han}]*$"),
        re(r"^##.*$"),
        re(r"^\*\*\(.*$"),
        re(r"^---.*$"),
        re(r"^\|[-:|\s]+\|$"),
        re(r"^>\s*$"),
        re(r"^[-*+]\s*$"),
        re(r"^\d+\.\s*$"),
        re(r"^[-*+]\s*\[[\sx]\]\s*$"),
        re(r"^\s*`{3}\s*$"),
        re(r"^\s*~{3}\s*$"),
        re(r"^<!--.*-->$"),
        re(r"^<[^>]+>\s*$"),
    ]
});

/// Emoji ranges checked against the first codepoint of a line
pub const EMOJI_RANGES: &[(u32, u32)] = &[
    (0x1F600, 0x1F64F),
    (0x1F300, 0x1F5FF),
    (0x1F680, 0x1F6FF),
    (0x1F1E0, 0x1F1FF),
    (0x2600, 0x26FF),
    (0x2700, 0x27BF),
    (0x1F900, 0x1F9FF),
    (0x1F018, 0x1F270),
    (0x238C, 0x2454),
    (0x1F170, 0x1F251),
    (0x1F004, 0x1F0CF),
    (0x1F18E, 0x1F18E),
    (0x3030, 0x303D),
    (0x3297, 0x3299),
    (0x1F3FB, 0x1F3FF),
    (0xFE0F, 0xFE0F),
    (0x200D, 0x200D),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_tables_compile() {
        assert!(!CODE_LINE_PATTERNS.is_empty());
        assert!(!PURE_MARKUP_PATTERNS.is_empty());
        assert!(!SPECIAL_CONTEXTS.is_empty());
        assert_eq!(SPOKEN_SYMBOLS.len(), 18);
    }

    #[test]
    fn fenced_code_matches_language_tag() {
        let text = "```rust\nfn main() {}\n```\n";
        assert!(FENCED_CODE.is_match(text));
    }

    #[test]
    fn lone_symbol_requires_boundaries() {
        let at = &SPOKEN_SYMBOLS[0];
        assert!(at.lone.is_match("mention @ someone"));
        assert!(!at.lone.is_match("user@example"));
    }

    #[test]
    fn table_separator_shapes() {
        assert!(TABLE_SEPARATOR.is_match("|---|---|"));
        assert!(TABLE_SEPARATOR.is_match("|:--:|--:|"));
        assert!(!TABLE_SEPARATOR.is_match("| a | b |"));
    }
}
