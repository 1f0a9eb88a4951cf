use unicode_segmentation::UnicodeSegmentation;
use crate::analysis::charset::char_len;
use crate::analysis::token::{BoolToken, ParseHints, Word};
use crate::core::config::Config;
use crate::core::error::ErrorKind;

/// Tokenizer settings derived from the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerOptions {
    pub min_word_len: usize,
    pub max_word_len: usize,
    pub hyphen_is_delim: bool,
    pub strict_utf8: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        TokenizerOptions::from(&Config::default())
    }
}

impl From<&Config> for TokenizerOptions {
    fn from(config: &Config) -> Self {
        TokenizerOptions {
            min_word_len: config.min_word_len,
            max_word_len: config.max_word_len,
            hyphen_is_delim: config.hyphen_is_delim,
            strict_utf8: config.strict_utf8,
        }
    }
}

/// Byte-buffer tokenizer shared by indexing and both query modes
#[derive(Debug, Clone, Copy, Default)]
pub struct FtTokenizer {
    pub options: TokenizerOptions,
}

impl FtTokenizer {
    pub fn new(options: TokenizerOptions) -> Self {
        FtTokenizer { options }
    }

    /// Words of a document or natural-language query
    pub fn words<'a>(&self, buf: &'a [u8]) -> Words<'a> {
        Words {
            units: Units::new(buf, self.options),
            options: self.options,
        }
    }

    /// Words and operators of a boolean-mode query
    pub fn boolean_tokens<'a>(&self, buf: &'a [u8]) -> BoolTokens<'a> {
        BoolTokens {
            units: Units::new(buf, self.options),
            options: self.options,
            hints: ParseHints::default(),
            at_boundary: true,
            in_phrase: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitClass {
    Core,         // Letter, digit or '_': may start a word
    Misc(char),   // '\'' and, when hyphens are not delimiters, '-'
    Space,
    Other(char),
    Invalid,
}

#[derive(Debug, Clone, Copy)]
struct Unit {
    start: usize,
    end: usize,
    class: UnitClass,
}

/// Grapheme-cluster walk over a byte buffer that may contain malformed UTF-8
#[derive(Clone)]
struct Units<'a> {
    buf: &'a [u8],
    pos: usize,
    run: &'a str,      // Current valid UTF-8 run
    run_start: usize,
    options: TokenizerOptions,
    failed: bool,
}

impl<'a> Units<'a> {
    fn new(buf: &'a [u8], options: TokenizerOptions) -> Self {
        Units {
            buf,
            pos: 0,
            run: "",
            run_start: 0,
            options,
            failed: false,
        }
    }

    fn classify(&self, first: char) -> UnitClass {
        if first.is_alphanumeric() || first == '_' {
            UnitClass::Core
        } else if first == '\'' || (first == '-' && !self.options.hyphen_is_delim) {
            UnitClass::Misc(first)
        } else if first.is_whitespace() {
            UnitClass::Space
        } else {
            UnitClass::Other(first)
        }
    }

    fn next_unit(&mut self) -> Option<Unit> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }

        if self.pos >= self.run_start + self.run.len() {
            let rest = &self.buf[self.pos..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.run = text;
                    self.run_start = self.pos;
                }
                Err(e) if e.valid_up_to() > 0 => {
                    // The prefix was just validated, so this cannot fail
                    self.run = std::str::from_utf8(&rest[..e.valid_up_to()]).unwrap_or("");
                    self.run_start = self.pos;
                }
                Err(e) => {
                    let bad = e.error_len().unwrap_or(rest.len());
                    let unit = Unit {
                        start: self.pos,
                        end: self.pos + bad,
                        class: UnitClass::Invalid,
                    };
                    self.pos += bad;
                    return Some(unit);
                }
            }
        }

        let text = &self.run[self.pos - self.run_start..];
        let grapheme = text.graphemes(true).next()?;
        let first = grapheme.chars().next()?;
        let unit = Unit {
            start: self.pos,
            end: self.pos + grapheme.len(),
            class: self.classify(first),
        };
        self.pos = unit.end;
        Some(unit)
    }

    fn peek_unit(&self) -> Option<Unit> {
        self.clone().next_unit()
    }

    /// Extend a word that starts with `first`; trailing misc characters are not part of it
    fn scan_word(&mut self, first: Unit) -> (usize, usize) {
        let mut end = first.end;
        while let Some(unit) = self.peek_unit() {
            match unit.class {
                UnitClass::Core => {
                    self.next_unit();
                    end = unit.end;
                }
                UnitClass::Misc(_) => {
                    self.next_unit();
                }
                _ => break,
            }
        }
        (first.start, end)
    }

    /// Handle a malformed byte: a separator, or the end of input in strict mode
    fn on_invalid(&mut self, unit: Unit) -> bool {
        if self.options.strict_utf8 {
            tracing::debug!(offset = unit.start, "malformed UTF-8, tokenization stopped");
            self.failed = true;
            return false;
        }
        true
    }
}

fn length_ok(bytes: &[u8], options: &TokenizerOptions, bypass_min: bool) -> bool {
    let len = char_len(bytes);
    if len > options.max_word_len {
        tracing::trace!(len, kind = ?ErrorKind::WordTooLong, "word dropped");
        return false;
    }
    bypass_min || len >= options.min_word_len
}

/// Lazy word iterator (natural mode and indexing)
pub struct Words<'a> {
    units: Units<'a>,
    options: TokenizerOptions,
}

impl<'a> Iterator for Words<'a> {
    type Item = Word<'a>;

    fn next(&mut self) -> Option<Word<'a>> {
        while let Some(unit) = self.units.next_unit() {
            match unit.class {
                UnitClass::Core => {
                    let (start, end) = self.units.scan_word(unit);
                    let buf = self.units.buf;
                    let bytes = &buf[start..end];
                    if length_ok(bytes, &self.options, false) {
                        return Some(Word { bytes, offset: start });
                    }
                }
                UnitClass::Invalid => {
                    if !self.units.on_invalid(unit) {
                        return None;
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Lazy boolean-mode token iterator
pub struct BoolTokens<'a> {
    units: Units<'a>,
    options: TokenizerOptions,
    hints: ParseHints,
    at_boundary: bool,  // A sign here applies to the next word or group
    in_phrase: bool,
}

impl<'a> BoolTokens<'a> {
    fn take_hints(&mut self) -> ParseHints {
        std::mem::take(&mut self.hints)
    }
}

impl<'a> Iterator for BoolTokens<'a> {
    type Item = BoolToken<'a>;

    fn next(&mut self) -> Option<BoolToken<'a>> {
        while let Some(unit) = self.units.next_unit() {
            match unit.class {
                UnitClass::Core => {
                    let (start, end) = self.units.scan_word(unit);
                    let mut hints = self.take_hints();
                    self.at_boundary = false;
                    if let Some(next) = self.units.peek_unit() {
                        if next.class == UnitClass::Other('*') {
                            self.units.next_unit();
                            hints.trunc = true;
                        }
                    }
                    let buf = self.units.buf;
                    let bytes = &buf[start..end];
                    if length_ok(bytes, &self.options, hints.trunc) {
                        return Some(BoolToken::Word(Word { bytes, offset: start }, hints));
                    }
                }
                UnitClass::Other('"') => {
                    self.at_boundary = true;
                    if self.in_phrase {
                        self.in_phrase = false;
                        self.hints = ParseHints::default();
                        return Some(BoolToken::PhraseEnd);
                    }
                    self.in_phrase = true;
                    return Some(BoolToken::PhraseStart(self.take_hints()));
                }
                UnitClass::Other('(') if !self.in_phrase => {
                    self.at_boundary = true;
                    return Some(BoolToken::OpenGroup(self.take_hints()));
                }
                UnitClass::Other(')') if !self.in_phrase => {
                    self.at_boundary = true;
                    self.hints = ParseHints::default();
                    return Some(BoolToken::CloseGroup);
                }
                UnitClass::Other('+') | UnitClass::Other('-') | UnitClass::Misc('-')
                    if !self.in_phrase && self.at_boundary =>
                {
                    let plus = unit.class == UnitClass::Other('+');
                    self.hints.apply_sign(plus);
                }
                UnitClass::Space => {
                    self.hints = ParseHints::default();
                    self.at_boundary = true;
                }
                UnitClass::Invalid => {
                    if !self.units.on_invalid(unit) {
                        return None;
                    }
                    self.hints = ParseHints::default();
                    self.at_boundary = true;
                }
                _ => {
                    self.hints = ParseHints::default();
                    self.at_boundary = false;
                }
            }
        }
        None
    }
}
