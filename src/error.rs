//! # Error Types
//!
//! This module defines all error types for the abctune parser.
//!
//! Errors carry byte offsets into the music text (the header-stripped,
//! continuation-joined body) so callers can point at the offending glyph.
//!
//! ## Error Types
//! - `MissingTonalBase` - The tune has no usable `K:` header field
//! - `NestedTuplet` - A tuplet marker opened while another tuplet is active
//! - `IllFormedToken` - A span of music text matches no token class
//!
//! ## Usage
//! ```rust
//! use abctune::{analyze, AbcError};
//!
//! let source = "X:1\nK:D\nCDEF|";
//! match analyze(source) {
//!     Ok(tune) => println!("{} bar lines", tune.bar_lines.len()),
//!     Err(AbcError::MissingTonalBase) => eprintln!("tune has no key field"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbcError {
    /// The tune header has no `K:` field, or its value names no note letter.
    ///
    /// The tonal base is mandatory: pitch-relative consumers downstream
    /// cannot interpret the melody without it.
    ///
    /// # Example
    /// ```
    /// # use abctune::AbcError;
    /// let err = AbcError::MissingTonalBase;
    /// assert_eq!(err.to_string(), "Missing tonal base: the tune has no usable K: field");
    /// ```
    #[error("Missing tonal base: the tune has no usable K: field")]
    MissingTonalBase,

    /// A tuplet marker was found while a previous tuplet was still open.
    ///
    /// The notation defines no semantics for nested tuplets, so the parse
    /// aborts rather than guessing.
    ///
    /// # Example
    /// ```
    /// # use abctune::AbcError;
    /// let err = AbcError::NestedTuplet { offset: 12 };
    /// assert_eq!(err.to_string(), "Nested tuplet marker at offset 12");
    /// ```
    #[error("Nested tuplet marker at offset {offset}")]
    NestedTuplet { offset: usize },

    /// The scanner reached text that matches no token class.
    ///
    /// `offset` indexes the music text; `snippet` shows the start of the
    /// unmatched text.
    ///
    /// # Example
    /// ```
    /// # use abctune::AbcError;
    /// let err = AbcError::IllFormedToken { offset: 4, snippet: "&".to_string() };
    /// assert_eq!(err.to_string(), "Ill-formed token at offset 4: '&'");
    /// ```
    #[error("Ill-formed token at offset {offset}: '{snippet}'")]
    IllFormedToken { offset: usize, snippet: String },
}
