//! # abctune
//!
//! A bar-structure parser for ABC music notation.
//!
//! The crate turns a tune's text into typed tokens with exact source
//! spans, then derives the musical bar structure from them: bar numbers
//! (with a pickup bar numbered 0), partial-bar chains, repeat-variant
//! branches, and optional half-bar split offsets. Every token knows the
//! byte range it came from, so collaborators can slice and splice the
//! music text at token boundaries without re-parsing.
//!
//! ## Pipeline
//! 1. **Parse** ([`parser`]): split the header from the body, join the
//!    body into one `music_text` (comments stripped, `\` continuations
//!    applied), and scan it into bars of tokens separated by classified
//!    bar lines, applying unit length, tuplets, broken rhythms, and
//!    inline field changes along the way.
//! 2. **Analyze** ([`bars`]): walk the bars again and annotate each bar
//!    line with its musical bar number, partial/completion flags, exact
//!    cumulative durations, and variant-ending ids.
//!
//! ## Example
//! ```
//! use abctune::analyze;
//!
//! let tune = analyze("X:1\nT:Pickup\nM:4/4\nL:1/8\nK:D\nFA|d2cd BAFA|\n").unwrap();
//! assert_eq!(tune.bar_lines[0].bar_number, Some(0)); // two-note pickup
//! assert!(tune.bar_lines[0].is_partial);
//! assert_eq!(tune.bar_lines[1].bar_number, Some(1));
//! ```

pub mod ast;
pub mod bars;
pub mod error;
mod lexer;
pub mod parser;

pub use ast::*;
pub use bars::analyze_bars;
pub use error::AbcError;
pub use parser::{parse, parse_with_options};

/// Parse a tune and annotate its bar lines with the default analyzer
/// options. The one-call path for callers that want everything.
pub fn analyze(source: &str) -> Result<Tune, AbcError> {
    let mut tune = parse(source)?;
    let meter = tune.initial_meter;
    analyze_bars(&tune.bars, &mut tune.bar_lines, meter, &AnalyzeOptions::default());
    Ok(tune)
}
