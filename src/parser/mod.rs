//! # Tune Parser
//!
//! ## Purpose
//! Turns ABC source into a [`Tune`]: the header is split off and reduced
//! to the three values that drive duration math (unit note length, meter,
//! tonal base), the body is joined into a single `music_text` with
//! comments stripped and `\` continuations applied, and the scanner's
//! items are assembled into bars of tokens separated by classified bar
//! lines.
//!
//! The parser keeps running state while it walks the body: inline
//! `[K:..]` `[L:..]` `[M:..]` `[P:..]` fields update it mid-tune, an open
//! tuplet scales the next notes, and a broken-rhythm marker is held until
//! the note that resolves it. Each bar line receives the field changes
//! staged inside the bar it closes, so the later bar-structure pass can
//! follow meter changes without re-reading tokens.
//!
//! ## Entry Point
//! [`parse`] for whole tunes, [`parse_with_options`] to bound the number
//! of scanned bars.
//!
//! ## Example
//! ```
//! use abctune::parse;
//!
//! let tune = parse("X:1\nT:Sample\nM:4/4\nL:1/4\nK:G\nGABc|d4|\n").unwrap();
//! assert_eq!(tune.bars.len(), 2);
//! assert_eq!(tune.bar_lines.len(), 2);
//! assert_eq!(tune.music_text, "GABc|d4|");
//! ```
//!
//! ## Related Modules
//! - [`crate::ast`] - the produced data model
//! - [`crate::bars`] - annotates the produced bar lines with musical bar
//!   structure

pub(crate) mod barline;

use std::mem;

use crate::ast::{
    Bar, BarLine, BrokenDirection, FieldKind, Fraction, Meter, Note, NoteName, ParseOptions,
    Pitch, Spacing, Span, Token, TokenKind, Tune,
};
use crate::error::AbcError;
use crate::lexer::{is_annotation, FusedVariant, Head, Item, Lexer, Scanned, ScannedNote};

/// Parse a whole tune.
pub fn parse(source: &str) -> Result<Tune, AbcError> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse a tune, stopping early once `options.max_bars` non-empty bars
/// have been closed. Bar lines and tokens past the bound are never
/// scanned.
pub fn parse_with_options(source: &str, options: &ParseOptions) -> Result<Tune, AbcError> {
    let header = split_header(source)?;
    let state = ParseState {
        unit_length: header.unit_length,
        meter: header.meter,
        tonal_base: header.tonal_base,
        tuplet: None,
    };
    let (bars, bar_lines, state) = scan_body(&header.music_text, state, options.max_bars)?;
    Ok(Tune {
        bars,
        bar_lines,
        unit_length: state.unit_length,
        meter: state.meter,
        tonal_base: state.tonal_base,
        initial_meter: header.meter,
        header_lines: header.header_lines,
        music_text: header.music_text,
        newline_offsets: header.newline_offsets,
    })
}

struct Header {
    header_lines: Vec<String>,
    unit_length: Fraction,
    meter: Meter,
    tonal_base: NoteName,
    music_text: String,
    newline_offsets: Vec<usize>,
}

/// Split the source into header lines and the joined music text.
///
/// The header is the leading run of `X:`-style field lines. For the body,
/// `%` comments are stripped whole-line-blind (a `%` inside quotes also
/// starts a comment), blank lines vanish, and a trailing `\` joins the
/// next line without a newline. Everything else is kept verbatim so that
/// token spans index into the original characters.
fn split_header(source: &str) -> Result<Header, AbcError> {
    let mut header_lines = Vec::new();
    let mut music_text = String::new();
    let mut newline_offsets = Vec::new();
    let mut in_header = true;
    let mut continued = false;
    for line in source.lines() {
        let without_comment = match line.find('%') {
            Some(at) => &line[..at],
            None => line,
        };
        if without_comment.trim().is_empty() {
            continue;
        }
        if in_header && is_header_line(line) {
            header_lines.push(line.to_string());
            continue;
        }
        in_header = false;
        if !music_text.is_empty() && !continued {
            newline_offsets.push(music_text.len());
            music_text.push('\n');
        }
        let (content, continues) = match without_comment.trim_end().strip_suffix('\\') {
            Some(head) => (head, true),
            None => (without_comment, false),
        };
        music_text.push_str(content);
        continued = continues;
    }
    let mut unit_length = None;
    let mut meter = None;
    let mut tonal_base = None;
    for line in &header_lines {
        let without_comment = match line.find('%') {
            Some(at) => &line[..at],
            None => line.as_str(),
        };
        let Some((letter, value)) = split_field(without_comment) else {
            continue;
        };
        match letter {
            'L' => {
                if let Some(parsed) = parse_fraction(value) {
                    unit_length = Some(parsed);
                }
            }
            'M' => {
                if let Some(parsed) = Meter::parse(value) {
                    meter = Some(parsed);
                }
            }
            // the last K: with a recognizable tonic wins
            'K' => {
                if let Some(base) = tonal_base_of(value) {
                    tonal_base = Some(base);
                }
            }
            _ => {}
        }
    }
    let tonal_base = tonal_base.ok_or(AbcError::MissingTonalBase)?;
    Ok(Header {
        header_lines,
        unit_length: unit_length.unwrap_or_else(|| Fraction::new(1, 8)),
        meter: meter.unwrap_or(Meter { num: 4, den: 4 }),
        tonal_base,
        music_text,
        newline_offsets,
    })
}

fn is_header_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.first().is_some_and(u8::is_ascii_uppercase) && bytes.get(1) == Some(&b':')
}

fn split_field(line: &str) -> Option<(char, &str)> {
    if !is_header_line(line) {
        return None;
    }
    Some((char::from(line.as_bytes()[0]), &line[2..]))
}

/// `1/8`, `3/4`, or a bare positive integer.
fn parse_fraction(text: &str) -> Option<Fraction> {
    let text = text.trim();
    match text.split_once('/') {
        Some((num, den)) => {
            let num: i64 = num.trim().parse().ok()?;
            let den: i64 = den.trim().parse().ok()?;
            if num <= 0 || den <= 0 {
                return None;
            }
            Some(Fraction::new(num, den))
        }
        None => {
            let num: i64 = text.parse().ok()?;
            (num > 0).then(|| Fraction::from_integer(num))
        }
    }
}

/// First character of a key value, when it names a note letter. `K:Gm`,
/// `K:D mixolydian` and plain `K:C` all work; `K:Hp` yields nothing.
fn tonal_base_of(value: &str) -> Option<NoteName> {
    NoteName::from_letter(value.trim().chars().next()?)
}

/// Running values the body scan threads along. Inline fields replace
/// them; an open tuplet scales upcoming notes until its countdown runs
/// out.
#[derive(Debug, Clone, Copy)]
struct ParseState {
    unit_length: Fraction,
    meter: Meter,
    tonal_base: NoteName,
    tuplet: Option<TupletState>,
}

#[derive(Debug, Clone, Copy)]
struct TupletState {
    p: u32,
    q: u32,
    remaining: u32,
}

/// Field changes staged inside the open bar, waiting for the bar line
/// that closes it.
#[derive(Debug, Default)]
struct PendingFields {
    key: Option<String>,
    meter: Option<Meter>,
    unit_length: Option<Fraction>,
    part: Option<String>,
}

/// Where the most recent real-duration token lives: still in the open
/// bar, or already inside a closed one. Broken rhythm may reach across a
/// bar line, so closing a bar re-points `Current` references.
#[derive(Debug, Clone, Copy)]
enum RealRef {
    Current(usize),
    Closed(usize, usize),
}

struct PendingBroken {
    direction: BrokenDirection,
    dots: u8,
    previous: Option<RealRef>,
}

fn scan_body(
    text: &str,
    state: ParseState,
    max_bars: Option<usize>,
) -> Result<(Vec<Bar>, Vec<BarLine>, ParseState), AbcError> {
    let mut parser = Parser {
        lexer: Lexer::new(text),
        text,
        state,
        bars: Vec::new(),
        bar_lines: Vec::new(),
        current: Vec::new(),
        pending_fields: PendingFields::default(),
        pending_broken: None,
        last_real: None,
        max_bars,
    };
    parser.run()?;
    Ok((parser.bars, parser.bar_lines, parser.state))
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    text: &'a str,
    state: ParseState,
    bars: Vec<Bar>,
    bar_lines: Vec<BarLine>,
    current: Vec<Token>,
    pending_fields: PendingFields,
    pending_broken: Option<PendingBroken>,
    last_real: Option<RealRef>,
    max_bars: Option<usize>,
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<(), AbcError> {
        self.lexer.skip_leading_blanks();
        loop {
            let before = self.lexer.pos();
            let scanned = match self.lexer.next_item()? {
                Some(scanned) => scanned,
                None => break,
            };
            debug_assert!(self.lexer.pos() > before, "scanner failed to advance");
            if self.handle(scanned)? {
                return Ok(());
            }
        }
        if !self.current.is_empty() {
            let tokens = mem::take(&mut self.current);
            self.bars.push(Bar { tokens });
        }
        Ok(())
    }

    /// Process one scanned item. Returns `true` when the bar bound is
    /// reached and scanning should stop.
    fn handle(&mut self, scanned: Scanned) -> Result<bool, AbcError> {
        let Scanned { span, item } = scanned;
        match item {
            Item::BarLine { fused } => return Ok(self.close_bar(span, fused)),
            Item::Note(note) => {
                let spacing = self.lexer.take_spacing();
                self.push_note(span, spacing, note);
            }
            Item::Grace { notes } => {
                let spacing = self.lexer.take_spacing();
                let notes = notes.into_iter().filter_map(grace_note).collect();
                self.push_token(span, spacing, TokenKind::Grace { notes });
            }
            Item::Field { field, value } => {
                let spacing = self.lexer.take_spacing();
                self.apply_field(field, &value);
                self.push_token(span, spacing, TokenKind::InlineField { field, value });
            }
            Item::Tuplet { p, q, r } => {
                if self.state.tuplet.is_some() {
                    return Err(AbcError::NestedTuplet { offset: span.start });
                }
                let spacing = self.lexer.take_spacing();
                let q = q.unwrap_or_else(|| default_tuplet_q(p, &self.state.meter));
                let r = r.unwrap_or(p);
                self.state.tuplet = Some(TupletState { p, q, remaining: r });
                self.push_token(span, spacing, TokenKind::Tuplet { p, q, r });
            }
            Item::Broken { direction, dots } => {
                let spacing = self.lexer.take_spacing();
                self.pending_broken = Some(PendingBroken {
                    direction,
                    dots,
                    previous: self.last_real,
                });
                self.push_token(span, spacing, TokenKind::BrokenRhythm { direction, dots });
            }
            Item::Quoted(text) => {
                let spacing = self.lexer.take_spacing();
                let kind = if is_annotation(&text) {
                    TokenKind::Annotation(text)
                } else {
                    TokenKind::ChordSymbol(text)
                };
                self.push_token(span, spacing, kind);
            }
            Item::Decoration(text) => {
                let spacing = self.lexer.take_spacing();
                self.push_token(span, spacing, TokenKind::Decoration(text));
            }
            Item::VariantEnding { numbers } => {
                let spacing = self.lexer.take_spacing();
                self.push_token(span, spacing, TokenKind::VariantEnding { numbers });
            }
        }
        Ok(false)
    }

    fn push_token(&mut self, span: Span, spacing: Spacing, kind: TokenKind) {
        self.current.push(Token {
            span,
            spacing,
            kind,
        });
    }

    fn mark_last_real(&mut self) {
        self.last_real = Some(RealRef::Current(self.current.len() - 1));
    }

    fn push_note(&mut self, span: Span, spacing: Spacing, scanned: ScannedNote) {
        let ScannedNote {
            head,
            num,
            den,
            tied,
            decorations,
            chord_symbol,
            annotation,
        } = scanned;
        let (pitch, chord) = match head {
            Head::Spacer => {
                self.push_token(span, spacing, TokenKind::Dummy);
                return;
            }
            Head::Rest => {
                let base = self.state.unit_length * Fraction::new(num, den);
                let scaled = self.scaled_duration(base);
                let duration = self.resolve_broken(scaled);
                self.push_token(span, spacing, TokenKind::Silence { duration });
                self.mark_last_real();
                return;
            }
            Head::Pitch(pitch) => (pitch, None),
            Head::Chord(pitches) => (top_pitch(&pitches), Some(pitches)),
        };
        let base = self.state.unit_length * Fraction::new(num, den);
        let scaled = self.scaled_duration(base);
        let duration = self.resolve_broken(scaled);
        self.push_token(
            span,
            spacing,
            TokenKind::Note(Note {
                pitch,
                duration,
                tied,
                decorations,
                chord_symbol,
                annotation,
                chord,
            }),
        );
        self.mark_last_real();
    }

    /// Apply the open tuplet, if any, and advance its countdown.
    fn scaled_duration(&mut self, base: Fraction) -> Fraction {
        let mut tuplet = match self.state.tuplet {
            Some(tuplet) => tuplet,
            None => return base,
        };
        let scaled = base * Fraction::new(i64::from(tuplet.q), i64::from(tuplet.p));
        tuplet.remaining = tuplet.remaining.saturating_sub(1);
        self.state.tuplet = (tuplet.remaining > 0).then_some(tuplet);
        scaled
    }

    /// Resolve a pending broken-rhythm marker against this note. The pair
    /// is rescaled only when both sides had equal duration; otherwise the
    /// marker stays a purely notational token.
    fn resolve_broken(&mut self, duration: Fraction) -> Fraction {
        let pending = match self.pending_broken.take() {
            Some(pending) => pending,
            None => return duration,
        };
        let previous = match pending.previous {
            Some(previous) => previous,
            None => return duration,
        };
        let prev_duration = match self.token_at(previous).real_duration() {
            Some(found) => found,
            None => return duration,
        };
        if prev_duration != duration {
            return duration;
        }
        let factor = 1i64 << pending.dots;
        let lengthen = Fraction::new(2 * factor - 1, factor);
        let shorten = Fraction::new(1, factor);
        let (previous_factor, next_factor) = match pending.direction {
            BrokenDirection::LengthenPrevious => (lengthen, shorten),
            BrokenDirection::LengthenNext => (shorten, lengthen),
        };
        self.scale_real_at(previous, previous_factor);
        duration * next_factor
    }

    fn token_at(&mut self, at: RealRef) -> &mut Token {
        match at {
            RealRef::Current(index) => &mut self.current[index],
            RealRef::Closed(bar, index) => &mut self.bars[bar].tokens[index],
        }
    }

    fn scale_real_at(&mut self, at: RealRef, factor: Fraction) {
        match &mut self.token_at(at).kind {
            TokenKind::Note(note) => note.duration *= factor,
            TokenKind::Silence { duration } => *duration *= factor,
            _ => {}
        }
    }

    /// Update the running state from an inline field and stage the change
    /// for the bar line that closes this bar.
    fn apply_field(&mut self, field: FieldKind, value: &str) {
        match field {
            FieldKind::Key => {
                if let Some(base) = tonal_base_of(value) {
                    self.state.tonal_base = base;
                }
                self.pending_fields.key = Some(value.trim().to_string());
            }
            FieldKind::UnitLength => {
                if let Some(parsed) = parse_fraction(value) {
                    self.state.unit_length = parsed;
                    self.pending_fields.unit_length = Some(parsed);
                }
            }
            FieldKind::Meter => {
                if let Some(parsed) = Meter::parse(value) {
                    self.state.meter = parsed;
                    self.pending_fields.meter = Some(parsed);
                }
            }
            FieldKind::Part => {
                self.pending_fields.part = Some(value.trim().to_string());
            }
        }
    }

    /// Close the open bar at a bar-line glyph. Returns `true` once the
    /// bar bound is reached.
    fn close_bar(&mut self, span: Span, fused: Option<FusedVariant>) -> bool {
        let glyph = &self.text[span.range()];
        let mut class = barline::classify(glyph);
        if fused.is_some() {
            class = barline::fuse_variant(class);
        }
        // a fused line's gap belongs to the variant token scanned after it
        let spacing = if fused.is_some() {
            Spacing::default()
        } else {
            self.lexer.take_spacing()
        };
        let fields = mem::take(&mut self.pending_fields);
        if !self.current.is_empty() {
            let index = self.bars.len();
            let tokens = mem::take(&mut self.current);
            self.bars.push(Bar { tokens });
            if let Some(RealRef::Current(at)) = self.last_real {
                self.last_real = Some(RealRef::Closed(index, at));
            }
            if let Some(pending) = self.pending_broken.as_mut() {
                if let Some(RealRef::Current(at)) = pending.previous {
                    pending.previous = Some(RealRef::Closed(index, at));
                }
            }
        }
        self.bar_lines.push(BarLine {
            kind: class.kind,
            is_section_break: class.is_section_break,
            is_repeat_left: class.is_repeat_left,
            is_repeat_right: class.is_repeat_right,
            span,
            spacing,
            new_key: fields.key,
            new_meter: fields.meter,
            new_unit_length: fields.unit_length,
            new_part: fields.part,
            bar_number: None,
            variant_id: None,
            is_partial: false,
            completes_music_bar: false,
            cumulative_duration: None,
        });
        if let Some(max) = self.max_bars {
            if self.bars.len() >= max {
                return true;
            }
        }
        if let Some(fused) = fused {
            let spacing = self.lexer.take_spacing();
            self.push_token(
                fused.span,
                spacing,
                TokenKind::VariantEnding {
                    numbers: fused.numbers,
                },
            );
        }
        false
    }
}

/// Default time-slot count when a tuplet marker omits `q`.
fn default_tuplet_q(p: u32, meter: &Meter) -> u32 {
    match p {
        3 | 6 => 2,
        2 | 4 | 8 => 3,
        5 | 7 | 9 => {
            if meter.is_compound() {
                3
            } else {
                2
            }
        }
        _ => 2,
    }
}

/// A grace ornament keeps its pitch and metadata but no duration.
fn grace_note(scanned: ScannedNote) -> Option<Note> {
    let ScannedNote {
        head,
        tied,
        decorations,
        chord_symbol,
        annotation,
        ..
    } = scanned;
    let (pitch, chord) = match head {
        Head::Pitch(pitch) => (pitch, None),
        Head::Chord(pitches) => (top_pitch(&pitches), Some(pitches)),
        Head::Rest | Head::Spacer => return None,
    };
    Some(Note {
        pitch,
        duration: Fraction::from_integer(0),
        tied,
        decorations,
        chord_symbol,
        annotation,
        chord,
    })
}

/// The topmost pitch of a chord by diatonic height; the first one wins a
/// tie. Chords are non-empty by construction.
fn top_pitch(pitches: &[Pitch]) -> Pitch {
    let mut top = pitches[0];
    for pitch in &pitches[1..] {
        if pitch.height() > top.height() {
            top = *pitch;
        }
    }
    top
}
