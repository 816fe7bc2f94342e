//! # Bar-Line Glyphs
//!
//! The recognized bar-line glyphs and their classification. The table is
//! ordered longest first so that a greedy prefix match picks `:||:` over
//! `:|`, and `|]` over `|`. Digits fused directly onto a glyph (`|1`,
//! `:|2`) are handled by the scanner, which then reclassifies the line
//! through [`fuse_variant`].

use crate::ast::BarLineKind;

/// Every recognized glyph, longest first. Match by prefix, take the first
/// hit.
pub(crate) const GLYPHS: [&str; 9] = [":||:", ":|:", "::", ":|", "|:", "||", "|]", "[|", "|"];

/// Classification of one glyph: kind plus the derived flags.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Classification {
    pub kind: BarLineKind,
    pub is_section_break: bool,
    pub is_repeat_left: bool,
    pub is_repeat_right: bool,
}

/// Classify a glyph from [`GLYPHS`]. Anything else lands on
/// `BarLineKind::Other`, which still counts as a section break.
pub(crate) fn classify(glyph: &str) -> Classification {
    let kind = match glyph {
        "|" => BarLineKind::Regular,
        "||" => BarLineKind::Double,
        "|]" => BarLineKind::Final,
        "|:" | "[|" => BarLineKind::RepeatStart,
        ":|" => BarLineKind::RepeatEnd,
        "::" | ":|:" | ":||:" => BarLineKind::RepeatBoth,
        _ => BarLineKind::Other,
    };
    Classification {
        kind,
        is_section_break: kind != BarLineKind::Regular,
        is_repeat_left: matches!(kind, BarLineKind::RepeatStart | BarLineKind::RepeatBoth),
        is_repeat_right: matches!(kind, BarLineKind::RepeatEnd | BarLineKind::RepeatBoth),
    }
}

/// Reclassify a glyph that has variant digits fused onto it. The repeat
/// flags of the underlying glyph survive (`:|2` still closes a repeat).
pub(crate) fn fuse_variant(class: Classification) -> Classification {
    Classification {
        kind: BarLineKind::VariantEnding,
        is_section_break: true,
        ..class
    }
}
