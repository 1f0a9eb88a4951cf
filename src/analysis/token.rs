/// A word as it appears in the scanned buffer (not yet collation-folded)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub bytes: &'a [u8],
    pub offset: usize,  // Byte offset in the scanned buffer
}

impl<'a> Word<'a> {
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'a, str> {
        String::from_utf8_lossy(self.bytes)
    }
}

/// Operator state collected in front of a boolean-mode word or group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseHints {
    pub plusminus: i8,  // Net '+' minus '-' count, clamped to [-5, 5]
    pub pmsign: bool,   // Last sign seen was '-'
    pub yesno: i8,      // -1 must not, 0 optional, +1 must
    pub trunc: bool,    // Word followed by '*'
}

impl ParseHints {
    pub const MAX_PLUSMINUS: i8 = 5;

    pub fn apply_sign(&mut self, plus: bool) {
        let step = if plus { 1 } else { -1 };
        self.plusminus = (self.plusminus + step).clamp(-Self::MAX_PLUSMINUS, Self::MAX_PLUSMINUS);
        self.pmsign = !plus;
        self.yesno = self.plusminus.signum();
    }
}

/// Boolean-mode lexer output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolToken<'a> {
    Word(Word<'a>, ParseHints),
    OpenGroup(ParseHints),
    CloseGroup,
    PhraseStart(ParseHints),
    PhraseEnd,
}
