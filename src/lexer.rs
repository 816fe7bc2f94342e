//! # Music-Text Scanner
//!
//! Character-level scanner for the tune body. The parser drives it one
//! item at a time: [`Lexer::next_item`] matches the next token at the
//! cursor, and [`Lexer::take_spacing`] consumes the gap that follows it,
//! so that spans plus spacing cover the music text without holes.
//!
//! ## Matcher Priority
//! The first character at the cursor selects the matcher:
//! - `|` or `:` - bar line, longest glyph first, then any fused variant
//!   digits
//! - `[` - inline field `[K:`/`[L:`/`[M:`/`[P:`, else variant ending
//!   `[1`, else the `[|` bar line, else a chord `[CEG]`
//! - `(` - tuplet marker
//! - `{` - grace-note group
//! - `<` or `>` - broken-rhythm marker
//! - `"` / `!` - a note with attached metadata when one follows, else a
//!   standalone chord symbol / annotation / decoration
//! - anything else - the note pattern (decorations, accidental, pitch or
//!   rest, duration suffix, tie)
//!
//! A character no matcher accepts is reported as an ill-formed token with
//! its offset and a short snippet.
//!
//! ## Related Modules
//! - [`crate::parser`] - drives the scanner and assembles bars
//! - [`crate::parser::barline`] (internal) - the bar-line glyph table

use crate::ast::{
    Accidental, BrokenDirection, FieldKind, NoteName, Pitch, Spacing, Span, VariantRange,
};
use crate::error::AbcError;
use crate::parser::barline;

/// One matched item and the exact byte range it was matched from.
#[derive(Debug, PartialEq)]
pub(crate) struct Scanned {
    pub span: Span,
    pub item: Item,
}

/// Raw matcher output, before the parser turns it into tokens.
#[derive(Debug, PartialEq)]
pub(crate) enum Item {
    BarLine { fused: Option<FusedVariant> },
    VariantEnding { numbers: Vec<VariantRange> },
    Field { field: FieldKind, value: String },
    Tuplet { p: u32, q: Option<u32>, r: Option<u32> },
    Grace { notes: Vec<ScannedNote> },
    Broken { direction: BrokenDirection, dots: u8 },
    Quoted(String),
    Decoration(String),
    Note(ScannedNote),
}

/// Variant digits fused directly onto a bar-line glyph, as in `|1` or
/// `:|2`. The span covers the digits only.
#[derive(Debug, PartialEq)]
pub(crate) struct FusedVariant {
    pub span: Span,
    pub numbers: Vec<VariantRange>,
}

/// A matched note pattern. The duration multiplier is kept as a raw
/// `num/den` pair; the parser applies the unit length and any open
/// tuplet.
#[derive(Debug, PartialEq)]
pub(crate) struct ScannedNote {
    pub head: Head,
    pub num: i64,
    pub den: i64,
    pub tied: bool,
    pub decorations: Vec<String>,
    pub chord_symbol: Option<String>,
    pub annotation: Option<String>,
}

/// What the note pattern matched at its core.
#[derive(Debug, PartialEq)]
pub(crate) enum Head {
    Pitch(Pitch),
    Chord(Vec<Pitch>),
    /// `z` or the invisible rest `x`.
    Rest,
    /// The `y` spacer.
    Spacer,
}

pub(crate) struct Lexer<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Consume a run of ASCII digits. Empty input reads as 0; oversized
    /// numbers saturate instead of wrapping.
    fn read_number(&mut self) -> u32 {
        let mut value: u32 = 0;
        while let Some(digit) = self.peek().and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(digit);
            self.bump();
        }
        value
    }

    fn ill_formed(&self, offset: usize) -> AbcError {
        let snippet: String = self.text[offset..].chars().take(8).collect();
        AbcError::IllFormedToken { offset, snippet }
    }

    /// Skip spaces and tabs before the first token of the body.
    pub fn skip_leading_blanks(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    /// Consume the gap after a token: spaces, tabs, back-quotes, and at
    /// most one newline together with the next line's indent.
    pub fn take_spacing(&mut self) -> Spacing {
        let start = self.pos;
        let mut backquotes = 0;
        let mut saw_whitespace = false;
        let mut newline_after = false;
        loop {
            match self.peek() {
                Some(' ' | '\t') => {
                    saw_whitespace = true;
                    self.bump();
                }
                Some('`') => {
                    backquotes += 1;
                    self.bump();
                }
                Some('\n') => {
                    saw_whitespace = true;
                    newline_after = true;
                    self.bump();
                    while matches!(self.peek(), Some(' ' | '\t')) {
                        self.bump();
                    }
                    break;
                }
                _ => break,
            }
        }
        Spacing {
            text: self.text[start..self.pos].to_string(),
            backquotes,
            beam_break: saw_whitespace,
            newline_after,
        }
    }

    /// Match the next item at the cursor. `Ok(None)` at end of input.
    pub fn next_item(&mut self) -> Result<Option<Scanned>, AbcError> {
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let scanned = match c {
            '|' | ':' => self
                .match_bar_line()
                .ok_or_else(|| self.ill_formed(start))?,
            '[' => {
                if self.at_inline_field() {
                    self.match_field()?
                } else if self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
                    self.match_variant()
                } else if self.rest().starts_with("[|") {
                    self.match_bar_line()
                        .ok_or_else(|| self.ill_formed(start))?
                } else {
                    self.match_note().ok_or_else(|| self.ill_formed(start))?
                }
            }
            '(' => self.match_tuplet()?,
            '{' => self.match_grace()?,
            '<' | '>' => self.match_broken(c),
            '"' => match self.match_note() {
                Some(scanned) => scanned,
                None => self.match_quoted().ok_or_else(|| self.ill_formed(start))?,
            },
            '!' => match self.match_note() {
                Some(scanned) => scanned,
                None => self.match_bang().ok_or_else(|| self.ill_formed(start))?,
            },
            _ => self.match_note().ok_or_else(|| self.ill_formed(start))?,
        };
        Ok(Some(scanned))
    }

    fn match_bar_line(&mut self) -> Option<Scanned> {
        let start = self.pos;
        let glyph = barline::GLYPHS
            .iter()
            .copied()
            .find(|glyph| self.rest().starts_with(*glyph))?;
        self.pos += glyph.len();
        let fused = if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            let digits_start = self.pos;
            let numbers = self.read_variant_numbers();
            Some(FusedVariant {
                span: Span::new(digits_start, self.pos - digits_start),
                numbers,
            })
        } else {
            None
        };
        Some(Scanned {
            span: Span::new(start, glyph.len()),
            item: Item::BarLine { fused },
        })
    }

    /// A pass list: `1`, `1,2`, `1-3,5-7`. A separator is consumed only
    /// when another number actually follows, so `|1,` leaves the comma
    /// alone.
    fn read_variant_numbers(&mut self) -> Vec<VariantRange> {
        let mut numbers = Vec::new();
        loop {
            let from = self.read_number();
            let mut to = from;
            if self.peek() == Some('-') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
                to = self.read_number();
            }
            numbers.push(VariantRange { from, to });
            if self.peek() == Some(',') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
                self.bump();
            } else {
                break;
            }
        }
        numbers
    }

    fn match_variant(&mut self) -> Scanned {
        let start = self.pos;
        self.bump(); // [
        let numbers = self.read_variant_numbers();
        Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::VariantEnding { numbers },
        }
    }

    fn at_inline_field(&self) -> bool {
        let bytes = self.text.as_bytes();
        bytes.get(self.pos) == Some(&b'[')
            && matches!(bytes.get(self.pos + 1), Some(b'K' | b'L' | b'M' | b'P'))
            && bytes.get(self.pos + 2) == Some(&b':')
    }

    fn match_field(&mut self) -> Result<Scanned, AbcError> {
        let start = self.pos;
        self.bump(); // [
        let field = self
            .bump()
            .and_then(FieldKind::from_letter)
            .ok_or_else(|| self.ill_formed(start))?;
        self.bump(); // :
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                None | Some('\n') => return Err(self.ill_formed(start)),
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        Ok(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Field { field, value },
        })
    }

    fn match_tuplet(&mut self) -> Result<Scanned, AbcError> {
        let start = self.pos;
        self.bump(); // (
        if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
            return Err(self.ill_formed(start));
        }
        let p = self.read_number();
        if p == 0 {
            return Err(self.ill_formed(start));
        }
        let q = self.tuplet_slot();
        let r = self.tuplet_slot();
        Ok(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Tuplet { p, q, r },
        })
    }

    /// One `:n` slot of a tuplet marker. The colon is consumed only when a
    /// slot really follows it; an empty slot (`(3::2`) reads as `None`.
    fn tuplet_slot(&mut self) -> Option<u32> {
        if self.peek() != Some(':') {
            return None;
        }
        match self.peek_at(1) {
            Some(b) if b.is_ascii_digit() || b == b':' => {}
            _ => return None,
        }
        self.bump();
        let n = self.read_number();
        (n > 0).then_some(n)
    }

    fn match_grace(&mut self) -> Result<Scanned, AbcError> {
        let start = self.pos;
        self.bump(); // {
        self.eat('/'); // acciaccatura slash
        let mut notes = Vec::new();
        loop {
            while matches!(self.peek(), Some(' ' | '\t')) {
                self.bump();
            }
            match self.peek() {
                Some('}') => {
                    self.bump();
                    break;
                }
                None | Some('\n') => return Err(self.ill_formed(start)),
                _ => match self.note_pattern() {
                    Some(note) => notes.push(note),
                    None => return Err(self.ill_formed(start)),
                },
            }
        }
        Ok(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Grace { notes },
        })
    }

    fn match_broken(&mut self, marker: char) -> Scanned {
        let start = self.pos;
        self.bump();
        let mut dots: u8 = 1;
        while dots < 3 && self.peek() == Some(marker) {
            self.bump();
            dots += 1;
        }
        let direction = if marker == '>' {
            BrokenDirection::LengthenPrevious
        } else {
            BrokenDirection::LengthenNext
        };
        Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Broken { direction, dots },
        }
    }

    fn match_quoted(&mut self) -> Option<Scanned> {
        let start = self.pos;
        let text = self.quoted_string()?;
        Some(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Quoted(text),
        })
    }

    fn match_bang(&mut self) -> Option<Scanned> {
        let start = self.pos;
        let text = self.bang_string()?;
        Some(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Decoration(text),
        })
    }

    fn match_note(&mut self) -> Option<Scanned> {
        let start = self.pos;
        let note = self.note_pattern()?;
        Some(Scanned {
            span: Span::new(start, self.pos - start),
            item: Item::Note(note),
        })
    }

    /// The note pattern: metadata prefix, accidental, head, duration
    /// suffix, tie. On any failure the cursor is restored to where the
    /// pattern started.
    fn note_pattern(&mut self) -> Option<ScannedNote> {
        let start = self.pos;
        let mut decorations = Vec::new();
        let mut chord_symbol = None;
        let mut annotation = None;
        loop {
            match self.peek() {
                Some('"') => match self.quoted_string() {
                    Some(text) => {
                        if is_annotation(&text) {
                            annotation = Some(text);
                        } else {
                            chord_symbol = Some(text);
                        }
                    }
                    None => {
                        self.pos = start;
                        return None;
                    }
                },
                Some('!') => match self.bang_string() {
                    Some(text) => decorations.push(text),
                    None => {
                        self.pos = start;
                        return None;
                    }
                },
                Some(c) if is_symbol_decoration(c) => {
                    self.bump();
                    decorations.push(c.to_string());
                }
                _ => break,
            }
        }
        let accidental = self.accidental();
        let head = if let Some((name, base_octave)) = self.peek().and_then(letter_pitch) {
            self.bump();
            let octave = base_octave.saturating_add(self.octave_marks());
            Head::Pitch(Pitch {
                name,
                accidental,
                octave,
            })
        } else {
            match self.peek() {
                Some('z' | 'x') if accidental.is_none() => {
                    self.bump();
                    Head::Rest
                }
                Some('y') if accidental.is_none() => {
                    self.bump();
                    Head::Spacer
                }
                Some('[') if accidental.is_none() => match self.chord_body() {
                    Some(pitches) => Head::Chord(pitches),
                    None => {
                        self.pos = start;
                        return None;
                    }
                },
                _ => {
                    self.pos = start;
                    return None;
                }
            }
        };
        let (num, den) = self.duration_suffix();
        let tied = self.eat('-');
        Some(ScannedNote {
            head,
            num,
            den,
            tied,
            decorations,
            chord_symbol,
            annotation,
        })
    }

    fn accidental(&mut self) -> Option<Accidental> {
        let rest = self.rest();
        let (accidental, len) = if rest.starts_with("^^") {
            (Accidental::DoubleSharp, 2)
        } else if rest.starts_with('^') {
            (Accidental::Sharp, 1)
        } else if rest.starts_with("__") {
            (Accidental::DoubleFlat, 2)
        } else if rest.starts_with('_') {
            (Accidental::Flat, 1)
        } else if rest.starts_with('=') {
            (Accidental::Natural, 1)
        } else {
            return None;
        };
        self.pos += len;
        Some(accidental)
    }

    fn octave_marks(&mut self) -> i8 {
        let mut offset: i8 = 0;
        loop {
            if self.eat('\'') {
                offset = offset.saturating_add(1);
            } else if self.eat(',') {
                offset = offset.saturating_sub(1);
            } else {
                return offset;
            }
        }
    }

    /// The pitches of a `[...]` chord. Per-pitch duration suffixes and
    /// ties are accepted but the chord as a whole carries the suffix that
    /// follows the closing bracket.
    fn chord_body(&mut self) -> Option<Vec<Pitch>> {
        let start = self.pos;
        self.bump(); // [
        let mut pitches = Vec::new();
        loop {
            if self.eat(']') {
                if pitches.is_empty() {
                    self.pos = start;
                    return None;
                }
                return Some(pitches);
            }
            let accidental = self.accidental();
            let (name, base_octave) = match self.peek().and_then(letter_pitch) {
                Some(found) => found,
                None => {
                    self.pos = start;
                    return None;
                }
            };
            self.bump();
            let octave = base_octave.saturating_add(self.octave_marks());
            pitches.push(Pitch {
                name,
                accidental,
                octave,
            });
            self.duration_suffix();
            self.eat('-');
        }
    }

    /// Duration multiplier after a head: `3`, `/2`, `3/2`, `//`. A bare
    /// slash halves; a zero denominator is treated as 1.
    fn duration_suffix(&mut self) -> (i64, i64) {
        let mut num: i64 = 1;
        if self.peek().is_some_and(|c| c.is_ascii_digit()) {
            num = i64::from(self.read_number());
        }
        let mut den: i64 = 1;
        while self.eat('/') {
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                den = den.saturating_mul(i64::from(self.read_number()).max(1));
            } else {
                den = den.saturating_mul(2);
            }
        }
        (num, den)
    }

    /// Quoted text, closed on the same line. On failure the cursor is
    /// restored and the caller decides what the quote was.
    fn quoted_string(&mut self) -> Option<String> {
        let start = self.pos;
        self.bump(); // "
        let mut content = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    return Some(content);
                }
                None | Some('\n') => {
                    self.pos = start;
                    return None;
                }
                Some(c) => {
                    content.push(c);
                    self.bump();
                }
            }
        }
    }

    /// `!...!` decoration text, closed on the same line.
    fn bang_string(&mut self) -> Option<String> {
        let start = self.pos;
        self.bump(); // !
        let mut content = String::new();
        loop {
            match self.peek() {
                Some('!') => {
                    self.bump();
                    return Some(content);
                }
                None | Some('\n') => {
                    self.pos = start;
                    return None;
                }
                Some(c) => {
                    content.push(c);
                    self.bump();
                }
            }
        }
    }
}

/// Map a source letter to its note name and base octave: uppercase sits in
/// the reference octave, lowercase one above.
fn letter_pitch(c: char) -> Option<(NoteName, i8)> {
    match c {
        'A'..='G' => Some((NoteName::from_letter(c)?, 0)),
        'a'..='g' => Some((NoteName::from_letter(c)?, 1)),
        _ => None,
    }
}

/// Single-character decorations that prefix a note.
fn is_symbol_decoration(c: char) -> bool {
    matches!(
        c,
        '.' | '~' | 'H' | 'L' | 'M' | 'O' | 'P' | 'S' | 'T' | 'u' | 'v'
    )
}

/// Quoted text with a placement prefix is an annotation, anything else a
/// chord symbol.
pub(crate) fn is_annotation(text: &str) -> bool {
    text.starts_with(['^', '_', '<', '>', '@'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> Vec<Scanned> {
        let mut lexer = Lexer::new(text);
        lexer.skip_leading_blanks();
        let mut items = Vec::new();
        loop {
            match lexer.next_item() {
                Ok(Some(scanned)) => {
                    lexer.take_spacing();
                    items.push(scanned);
                }
                Ok(None) => break,
                Err(error) => panic!("unexpected scan error: {}", error),
            }
        }
        items
    }

    fn single(text: &str) -> Scanned {
        let mut items = scan(text);
        assert_eq!(items.len(), 1, "expected one item in {:?}", text);
        items.remove(0)
    }

    #[test]
    fn test_longest_bar_line_glyph_wins() {
        let items = scan(":|: A");
        assert_eq!(items[0].span, Span::new(0, 3));
        assert!(matches!(items[0].item, Item::BarLine { fused: None }));
    }

    #[test]
    fn test_fused_variant_digits() {
        let items = scan(":|2");
        match &items[0].item {
            Item::BarLine { fused: Some(fused) } => {
                assert_eq!(fused.span, Span::new(2, 1));
                assert_eq!(fused.numbers, vec![VariantRange { from: 2, to: 2 }]);
            }
            other => panic!("expected fused bar line, got {:?}", other),
        }
        // glyph span excludes the digits
        assert_eq!(items[0].span, Span::new(0, 2));
    }

    #[test]
    fn test_variant_list_with_ranges() {
        let scanned = single("[1-3,5-7");
        match scanned.item {
            Item::VariantEnding { numbers } => {
                assert_eq!(
                    numbers,
                    vec![
                        VariantRange { from: 1, to: 3 },
                        VariantRange { from: 5, to: 7 },
                    ]
                );
            }
            other => panic!("expected variant ending, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_field() {
        let scanned = single("[M:3/4]");
        assert_eq!(scanned.span, Span::new(0, 7));
        match scanned.item {
            Item::Field { field, value } => {
                assert_eq!(field, FieldKind::Meter);
                assert_eq!(value, "3/4");
            }
            other => panic!("expected field, got {:?}", other),
        }
    }

    #[test]
    fn test_chord_not_mistaken_for_field() {
        let scanned = single("[CEG]");
        match scanned.item {
            Item::Note(note) => match note.head {
                Head::Chord(pitches) => assert_eq!(pitches.len(), 3),
                other => panic!("expected chord head, got {:?}", other),
            },
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_tuplet_slots() {
        assert!(matches!(
            single("(3").item,
            Item::Tuplet { p: 3, q: None, r: None }
        ));
        assert!(matches!(
            single("(3:2").item,
            Item::Tuplet { p: 3, q: Some(2), r: None }
        ));
        assert!(matches!(
            single("(3::2").item,
            Item::Tuplet { p: 3, q: None, r: Some(2) }
        ));
        assert!(matches!(
            single("(5:4:5").item,
            Item::Tuplet { p: 5, q: Some(4), r: Some(5) }
        ));
    }

    #[test]
    fn test_tuplet_without_digit_is_an_error() {
        let mut lexer = Lexer::new("(x");
        let result = lexer.next_item();
        assert!(matches!(
            result,
            Err(AbcError::IllFormedToken { offset: 0, .. })
        ));
    }

    #[test]
    fn test_grace_group() {
        let scanned = single("{/ab}");
        match scanned.item {
            Item::Grace { notes } => {
                assert_eq!(notes.len(), 2);
                assert!(matches!(notes[0].head, Head::Pitch(_)));
            }
            other => panic!("expected grace group, got {:?}", other),
        }
    }

    #[test]
    fn test_note_with_metadata_prefix() {
        let scanned = single("\"Am\"!trill!.^c'2-");
        match scanned.item {
            Item::Note(note) => {
                assert_eq!(note.chord_symbol.as_deref(), Some("Am"));
                assert_eq!(note.decorations, vec!["trill".to_string(), ".".to_string()]);
                assert_eq!(note.num, 2);
                assert_eq!(note.den, 1);
                assert!(note.tied);
                match note.head {
                    Head::Pitch(pitch) => {
                        assert_eq!(pitch.name, NoteName::C);
                        assert_eq!(pitch.accidental, Some(Accidental::Sharp));
                        assert_eq!(pitch.octave, 2); // lowercase plus one mark
                    }
                    other => panic!("expected pitch head, got {:?}", other),
                }
            }
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_annotation_prefix_is_not_a_chord_symbol() {
        let scanned = single("\"^slowly\"A");
        match scanned.item {
            Item::Note(note) => {
                // the placement prefix stays in the text
                assert_eq!(note.annotation.as_deref(), Some("^slowly"));
                assert!(note.chord_symbol.is_none());
            }
            other => panic!("expected note, got {:?}", other),
        }
    }

    #[test]
    fn test_standalone_quoted_text_falls_back() {
        let items = scan("\"Am\" |");
        assert!(matches!(&items[0].item, Item::Quoted(text) if text == "Am"));
        assert!(matches!(items[1].item, Item::BarLine { .. }));
    }

    #[test]
    fn test_duration_suffixes() {
        let note = |text: &str| match single(text).item {
            Item::Note(note) => note,
            other => panic!("expected note, got {:?}", other),
        };
        assert_eq!((note("A").num, note("A").den), (1, 1));
        assert_eq!((note("A3/2").num, note("A3/2").den), (3, 2));
        assert_eq!((note("A/").num, note("A/").den), (1, 2));
        assert_eq!((note("A//").num, note("A//").den), (1, 4));
        assert_eq!((note("A/4").num, note("A/4").den), (1, 4));
    }

    #[test]
    fn test_octave_marks() {
        let pitch = |text: &str| match single(text).item {
            Item::Note(note) => match note.head {
                Head::Pitch(pitch) => pitch,
                other => panic!("expected pitch, got {:?}", other),
            },
            other => panic!("expected note, got {:?}", other),
        };
        assert_eq!(pitch("C").octave, 0);
        assert_eq!(pitch("c").octave, 1);
        assert_eq!(pitch("c'").octave, 2);
        assert_eq!(pitch("C,,").octave, -2);
    }

    #[test]
    fn test_broken_rhythm_dots() {
        assert!(matches!(
            single(">").item,
            Item::Broken {
                direction: BrokenDirection::LengthenPrevious,
                dots: 1
            }
        ));
        assert!(matches!(
            single("<<").item,
            Item::Broken {
                direction: BrokenDirection::LengthenNext,
                dots: 2
            }
        ));
        assert!(matches!(single(">>>").item, Item::Broken { dots: 3, .. }));
    }

    #[test]
    fn test_unmatchable_character_reports_offset() {
        let mut lexer = Lexer::new("A &");
        lexer.next_item().unwrap();
        lexer.take_spacing();
        let result = lexer.next_item();
        match result {
            Err(AbcError::IllFormedToken { offset, snippet }) => {
                assert_eq!(offset, 2);
                assert_eq!(snippet, "&");
            }
            other => panic!("expected an ill-formed token error, got {:?}", other),
        }
    }

    #[test]
    fn test_spacing_backquotes_glue_beams() {
        let mut lexer = Lexer::new("A`B C");
        lexer.next_item().unwrap();
        let glued = lexer.take_spacing();
        assert_eq!(glued.text, "`");
        assert_eq!(glued.backquotes, 1);
        assert!(!glued.beam_break);
        lexer.next_item().unwrap();
        let broken = lexer.take_spacing();
        assert!(broken.beam_break);
        assert!(!broken.newline_after);
    }

    #[test]
    fn test_spacing_swallows_one_newline_and_indent() {
        let mut lexer = Lexer::new("A\n  B");
        lexer.next_item().unwrap();
        let spacing = lexer.take_spacing();
        assert_eq!(spacing.text, "\n  ");
        assert!(spacing.newline_after);
        assert!(spacing.beam_break);
        let next = lexer.next_item();
        assert!(matches!(next, Ok(Some(_))));
    }
}
