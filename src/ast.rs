//! # Tune Data Model
//!
//! This module defines the structures produced by the tokenizing parser and
//! annotated by the bar-structure analyzer.
//!
//! ## Type Hierarchy
//! ```text
//! Tune
//!   ├── bars: Vec<Bar>
//!   │     └── tokens: Vec<Token>
//!   │           ├── span: Span (byte range into music_text)
//!   │           ├── spacing: Spacing (the gap after the token)
//!   │           └── kind: TokenKind
//!   │                 ├── Note (pitch, duration, tie, chord, metadata)
//!   │                 ├── Silence (rest with duration)
//!   │                 ├── Dummy (the zero-duration spacer `y`)
//!   │                 ├── Grace (zero-duration ornament notes)
//!   │                 ├── InlineField ([K:..] [L:..] [M:..] [P:..])
//!   │                 ├── Tuplet ((p, (p:q, (p:q:r markers)
//!   │                 ├── BrokenRhythm (> or <, 1-3 dots)
//!   │                 ├── ChordSymbol / Annotation / Decoration
//!   │                 └── VariantEnding ([1, [1-3,5-7, fused |2)
//!   ├── bar_lines: Vec<BarLine> (classification + analyzer annotations)
//!   ├── unit_length / meter / tonal_base (running values after the parse)
//!   ├── initial_meter (header meter, seeds the analyzer)
//!   └── header_lines / music_text / newline_offsets (reconstruction data)
//! ```
//!
//! ## Key Concepts
//!
//! ### Source spans
//! Every token and bar line records the exact byte range it was matched
//! from, so slicing `music_text` reproduces the original notation and
//! collaborators can splice edits at token boundaries. Concatenating the
//! spans and spacing of all tokens and bar lines in source order rebuilds
//! `music_text` verbatim.
//!
//! ### Durations
//! Durations are exact rational numbers (`Fraction`); a note letter with
//! no suffix lasts one unit length. No duration math ever goes through
//! floating point.
//!
//! ### Bars vs bar lines
//! `bars` holds only non-empty bars. Every bar-line glyph produces a
//! `BarLine` record, including glyphs that close an empty bar (a lead-in
//! `|:`, a final `|]` right after a repeat), so the two sequences are
//! aligned by source position, not by index.

use num_rational::Rational64;
use serde::Serialize;

/// Exact rational duration. `Fraction::new(num, den)` reduces to lowest
/// terms; comparisons and arithmetic never approximate.
pub type Fraction = Rational64;

/// Byte range of a matched piece of `music_text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// One past the last byte of the match.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// The range form, for slicing the music text.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }
}

/// The raw gap following a token or bar line: spaces, tabs, back-quotes,
/// and at most one newline plus the next line's indent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Spacing {
    /// Verbatim gap text.
    pub text: String,
    /// Number of back-quotes in the gap. Back-quotes glue a beam across
    /// the gap instead of breaking it.
    pub backquotes: usize,
    /// True when the gap contains real whitespace, which ends a beam group.
    pub beam_break: bool,
    /// True when the gap runs over a line end.
    pub newline_after: bool,
}

/// The seven note letters, in scale order starting from C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Scale-degree index within one octave (C=0 .. B=6).
    pub fn scale_index(&self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 1,
            NoteName::E => 2,
            NoteName::F => 3,
            NoteName::G => 4,
            NoteName::A => 5,
            NoteName::B => 6,
        }
    }

    /// The note letter for an upper- or lowercase source character.
    pub fn from_letter(c: char) -> Option<NoteName> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for NoteName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        };
        write!(f, "{}", letter)
    }
}

/// Accidental prefix of a pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Accidental {
    Sharp,       // ^
    DoubleSharp, // ^^
    Flat,        // _
    DoubleFlat,  // __
    Natural,     // =
}

/// A concrete pitch: letter, optional accidental, octave offset.
///
/// The octave offset is relative to the uppercase-letter octave: a
/// lowercase source letter adds one, each `'` adds one, each `,`
/// subtracts one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pitch {
    pub name: NoteName,
    pub accidental: Option<Accidental>,
    pub octave: i8,
}

impl Pitch {
    /// Diatonic height, for ordering the pitches of a chord.
    pub fn height(&self) -> i32 {
        i32::from(self.octave) * 7 + self.name.scale_index()
    }
}

/// A sounded note or chord. For a chord, `chord` lists every pitch and
/// `pitch` repeats the topmost one by diatonic height, which is the pitch
/// melodic-contour consumers follow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub pitch: Pitch,
    pub duration: Fraction,
    pub tied: bool,
    pub decorations: Vec<String>,
    pub chord_symbol: Option<String>,
    pub annotation: Option<String>,
    pub chord: Option<Vec<Pitch>>,
}

/// Which side of a broken-rhythm pair is lengthened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BrokenDirection {
    /// `>` - the note before the marker is lengthened.
    LengthenPrevious,
    /// `<` - the note after the marker is lengthened.
    LengthenNext,
}

/// The four fields that may change mid-tune via `[X:...]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Key,        // K
    UnitLength, // L
    Meter,      // M
    Part,       // P
}

impl FieldKind {
    pub fn from_letter(c: char) -> Option<FieldKind> {
        match c {
            'K' => Some(FieldKind::Key),
            'L' => Some(FieldKind::UnitLength),
            'M' => Some(FieldKind::Meter),
            'P' => Some(FieldKind::Part),
            _ => None,
        }
    }
}

/// One entry of a variant-ending list: a single pass number (`from == to`)
/// or an inclusive range (`1-3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VariantRange {
    pub from: u32,
    pub to: u32,
}

/// Payload of one matched token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    Note(Note),
    /// A rest: `z`, or the invisible `x`.
    Silence { duration: Fraction },
    /// The `y` spacer: layout only, zero duration.
    Dummy,
    /// A grace-note group. The notes carry zero duration and are excluded
    /// from all bar-duration accounting.
    Grace { notes: Vec<Note> },
    /// `[K:..]` / `[L:..]` / `[M:..]` / `[P:..]`; also mirrored onto the
    /// bar line that closes the bar it appears in.
    InlineField { field: FieldKind, value: String },
    /// `(p:q:r` - the next `r` notes fit `p` into the time of `q`.
    Tuplet { p: u32, q: u32, r: u32 },
    /// `>` / `<` between two equal-duration notes.
    BrokenRhythm { direction: BrokenDirection, dots: u8 },
    /// Standalone quoted text naming a chord ("Am").
    ChordSymbol(String),
    /// Standalone quoted text with a placement prefix (^ _ < > @).
    Annotation(String),
    /// Standalone `!...!` decoration.
    Decoration(String),
    /// `[1`, `[1-3,5-7`, or the digits fused onto a bar line (`|2`).
    VariantEnding { numbers: Vec<VariantRange> },
}

/// One matched token: source span, the gap after it, and the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub span: Span,
    pub spacing: Spacing,
    pub kind: TokenKind,
}

impl Token {
    /// Duration that counts toward filling a bar. `None` for everything
    /// except sounded notes and rests.
    pub fn real_duration(&self) -> Option<Fraction> {
        match &self.kind {
            TokenKind::Note(note) => Some(note.duration),
            TokenKind::Silence { duration } => Some(*duration),
            _ => None,
        }
    }
}

/// The tokens between two bar lines (or before the first bar line, or
/// after the last one). Only non-empty bars are materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub tokens: Vec<Token>,
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Meter {
    pub num: u32,
    pub den: u32,
}

impl Meter {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Parse a meter value: `6/8`, the common-time shorthand `C` (4/4), or
    /// the cut-time shorthand `C|` (2/2).
    pub fn parse(text: &str) -> Option<Meter> {
        let text = text.trim();
        match text {
            "C" => return Some(Meter::new(4, 4)),
            "C|" => return Some(Meter::new(2, 2)),
            _ => {}
        }
        let (num, den) = text.split_once('/')?;
        let num: u32 = num.trim().parse().ok()?;
        let den: u32 = den.trim().parse().ok()?;
        if num == 0 || den == 0 {
            return None;
        }
        Some(Meter::new(num, den))
    }

    /// Duration of one full bar.
    pub fn fraction(&self) -> Fraction {
        Fraction::new(i64::from(self.num), i64::from(self.den))
    }

    /// Compound meters (6/8, 9/8, 12/8, ...) group beats in threes; the
    /// distinction decides the default tuplet ratio for p = 5, 7, 9.
    pub fn is_compound(&self) -> bool {
        self.num > 3 && self.num % 3 == 0
    }
}

impl std::fmt::Display for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Classification of a bar-line glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarLineKind {
    Regular,     // |
    Double,      // ||
    Final,       // |]
    RepeatStart, // |:  [|
    RepeatEnd,   // :|
    RepeatBoth,  // ::  :|:  :||:
    /// A bar line with variant-ending digits fused onto it (`|1`, `:|2`).
    VariantEnding,
    /// Recognized as a bar line but none of the known glyphs.
    Other,
}

/// Duration bookkeeping attached to a bar line by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativeDuration {
    /// Real-note duration of the bar this line closes.
    pub since_last_bar_line: Fraction,
    /// Accumulated duration since the last complete musical bar, this
    /// segment included.
    pub since_last_complete: Fraction,
}

/// One bar-line glyph: classification from the parser, plus annotations
/// filled in by the bar-structure analyzer (`None` / `false` until it
/// runs).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarLine {
    pub kind: BarLineKind,
    /// Everything except a plain `|`: double bars, final bars, repeat
    /// boundaries, variant endings.
    pub is_section_break: bool,
    /// Opens a repeated section (`|:`, `[|`, the repeat-both glyphs).
    pub is_repeat_left: bool,
    /// Closes a repeated section (`:|`, the repeat-both glyphs, and
    /// `:|`-fused variant endings).
    pub is_repeat_right: bool,
    pub span: Span,
    pub spacing: Spacing,
    /// Raw value of an inline key change in the closed bar.
    pub new_key: Option<String>,
    /// Meter from an inline `M:` change; takes effect for the next bar.
    pub new_meter: Option<Meter>,
    /// Unit length from an inline `L:` change.
    pub new_unit_length: Option<Fraction>,
    /// Part label from an inline `P:` change.
    pub new_part: Option<String>,
    /// Musical bar number. 0 for anacrusis segments; `None` only for a bar
    /// line preceding any music.
    pub bar_number: Option<u32>,
    /// Zero-based alternative index while inside a variant-ending group.
    pub variant_id: Option<u32>,
    /// The closed bar holds less than a full meter of music.
    pub is_partial: bool,
    /// This partial segment brings the accumulated chain up to a full bar.
    pub completes_music_bar: bool,
    pub cumulative_duration: Option<CumulativeDuration>,
}

/// Everything one parse produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tune {
    pub bars: Vec<Bar>,
    pub bar_lines: Vec<BarLine>,
    /// Unit note length as of the end of the parse.
    pub unit_length: Fraction,
    /// Meter as of the end of the parse.
    pub meter: Meter,
    /// Tonic letter as of the end of the parse.
    pub tonal_base: NoteName,
    /// Meter from the header, before any inline change. The analyzer
    /// starts from this value.
    pub initial_meter: Meter,
    /// Raw header lines, in order.
    pub header_lines: Vec<String>,
    /// The comment-stripped, continuation-joined body that every span
    /// indexes into.
    pub music_text: String,
    /// Byte offsets of the line breaks inside `music_text`.
    pub newline_offsets: Vec<usize>,
}

/// Options for `parse_with_options`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Stop scanning as soon as this many non-empty bars exist.
    pub max_bars: Option<usize>,
}

/// Options for `analyze_bars`. The default computes everything, unbounded.
#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    pub bar_numbers: bool,
    pub is_partial: bool,
    pub cumulative_duration: bool,
    /// `Some(2)` requests half-bar midpoints; any other value disables
    /// them.
    pub divide_bars_by: Option<u32>,
    /// Truncate the bar-line list right after the line that receives this
    /// number.
    pub stop_after_bar_number: Option<u32>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            bar_numbers: true,
            is_partial: true,
            cumulative_duration: true,
            divide_bars_by: None,
            stop_after_bar_number: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_parse_fraction() {
        assert_eq!(Meter::parse("6/8"), Some(Meter::new(6, 8)));
        assert_eq!(Meter::parse(" 3/4 "), Some(Meter::new(3, 4)));
        assert_eq!(Meter::parse("C"), Some(Meter::new(4, 4)));
        assert_eq!(Meter::parse("C|"), Some(Meter::new(2, 2)));
        assert_eq!(Meter::parse("waltz"), None);
        assert_eq!(Meter::parse("0/4"), None);
    }

    #[test]
    fn test_meter_compound() {
        assert!(Meter::new(6, 8).is_compound());
        assert!(Meter::new(9, 8).is_compound());
        assert!(Meter::new(12, 8).is_compound());
        assert!(!Meter::new(3, 4).is_compound()); // three beats, not grouped in threes
        assert!(!Meter::new(4, 4).is_compound());
        assert!(!Meter::new(2, 4).is_compound());
    }

    #[test]
    fn test_pitch_height_orders_chord_notes() {
        let low = Pitch {
            name: NoteName::G,
            accidental: None,
            octave: 0,
        };
        let high = Pitch {
            name: NoteName::C,
            accidental: None,
            octave: 1,
        };
        assert!(high.height() > low.height());
        // same letter, one octave apart
        let e = Pitch {
            name: NoteName::E,
            accidental: None,
            octave: 0,
        };
        let e_up = Pitch {
            name: NoteName::E,
            accidental: None,
            octave: 1,
        };
        assert_eq!(e_up.height() - e.height(), 7);
    }

    #[test]
    fn test_span_slices_text() {
        let text = "FA | d2";
        let span = Span::new(5, 2);
        assert_eq!(&text[span.range()], "d2");
        assert_eq!(span.end(), 7);
    }

    #[test]
    fn test_fraction_is_exact() {
        let third = Fraction::new(1, 3);
        let sum = third + third + third;
        assert_eq!(sum, Fraction::from_integer(1));
        assert_eq!(Fraction::new(2, 8), Fraction::new(1, 4));
    }
}
