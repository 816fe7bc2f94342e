//! Integration tests for the abctune parser
//!
//! Tests the full pipeline from ABC source to annotated bar structure.

use abctune::{
    analyze, analyze_bars, parse, parse_with_options, AbcError, AnalyzeOptions, BarLineKind,
    Fraction, Meter, NoteName, ParseOptions, TokenKind,
};

fn bar_numbers(tune: &abctune::Tune) -> Vec<Option<u32>> {
    tune.bar_lines.iter().map(|line| line.bar_number).collect()
}

#[test]
fn test_parse_full_jig_tune() {
    // four full 6/8 bars, closed by a repeat-end bar line
    let source = r#"X:1
T:The Sandy Lane
R:jig
M:6/8
L:1/8
K:G
% tokens on a comment line never reach the scanner
GAB ABc|Bcd cBA|GAB ABc|BAG A3:|
"#;
    let tune = analyze(source).unwrap();
    assert_eq!(tune.header_lines.len(), 6);
    assert_eq!(tune.tonal_base, NoteName::G);
    assert_eq!(tune.meter, Meter::new(6, 8));
    assert_eq!(tune.unit_length, Fraction::new(1, 8));
    assert_eq!(tune.music_text, "GAB ABc|Bcd cBA|GAB ABc|BAG A3:|");
    assert_eq!(tune.bars.len(), 4);
    assert_eq!(tune.bar_lines.len(), 4);
    assert_eq!(tune.bar_lines[3].kind, BarLineKind::RepeatEnd);
    assert!(tune.bar_lines[3].is_repeat_right);
    assert_eq!(
        bar_numbers(&tune),
        vec![Some(1), Some(2), Some(3), Some(4)]
    );
    assert!(tune.bar_lines.iter().all(|line| !line.is_partial));
}

#[test]
fn test_anacrusis_bar_is_numbered_zero() {
    // FA is a quarter-note pickup into the first full bar
    let source = r#"X:1
T:Pickup
M:4/4
L:1/8
K:D
FA|d2cd BAFA|D2FA d2cd|
"#;
    let tune = analyze(source).unwrap();
    assert_eq!(bar_numbers(&tune), vec![Some(0), Some(1), Some(2)]);
    assert!(tune.bar_lines[0].is_partial);
    assert!(!tune.bar_lines[0].completes_music_bar);
    let pickup = tune.bar_lines[0].cumulative_duration.unwrap();
    assert_eq!(pickup.since_last_bar_line, Fraction::new(1, 4));
}

#[test]
fn test_variant_alternatives_share_bar_numbers() {
    // both endings replay bar 2; only their alternative id differs
    let source = r#"X:1
T:Two Endings
M:4/4
L:1/8
K:D
d2cd BAFA|[1ABde fdec:|[2ABde fddc||
"#;
    let tune = analyze(source).unwrap();
    assert_eq!(bar_numbers(&tune), vec![Some(1), Some(2), Some(2)]);
    assert_eq!(tune.bar_lines[0].variant_id, None);
    assert_eq!(tune.bar_lines[1].variant_id, Some(0));
    assert_eq!(tune.bar_lines[2].variant_id, Some(1));
    assert!(tune.bar_lines[1].is_repeat_right);
}

#[test]
fn test_fused_variant_digits_resume_numbering() {
    // |1 and :|2 fuse the digits onto the bar line; numbering resumes at
    // 3 after the group
    let source = r#"X:1
M:4/4
L:1/4
K:G
G4|1A4:|2B4||c4|]
"#;
    let tune = analyze(source).unwrap();
    assert_eq!(
        bar_numbers(&tune),
        vec![Some(1), Some(2), Some(2), Some(3)]
    );
    assert_eq!(tune.bar_lines[0].kind, BarLineKind::VariantEnding);
    assert_eq!(tune.bar_lines[1].kind, BarLineKind::VariantEnding);
    assert!(tune.bar_lines[1].is_repeat_right, "the :| half still closes the repeat");
    assert_eq!(tune.bar_lines[3].kind, BarLineKind::Final);
    // the fused digits open the next bar as a variant token
    assert!(matches!(
        tune.bars[1].tokens[0].kind,
        TokenKind::VariantEnding { .. }
    ));
    assert!(matches!(
        tune.bars[2].tokens[0].kind,
        TokenKind::VariantEnding { .. }
    ));
    assert_eq!(tune.bar_lines[1].variant_id, Some(0));
    assert_eq!(tune.bar_lines[2].variant_id, Some(1));
}

#[test]
fn test_max_bars_stops_the_scan_promptly() {
    let source = r#"X:1
K:C
CDEF|GABc|cdef|gabc|
"#;
    let options = ParseOptions { max_bars: Some(2) };
    let tune = parse_with_options(source, &options).unwrap();
    assert_eq!(tune.bars.len(), 2);
    assert_eq!(tune.bar_lines.len(), 2);
    // the body text is assembled before scanning and keeps every bar
    assert_eq!(tune.music_text, "CDEF|GABc|cdef|gabc|");
}

#[test]
fn test_stop_after_bar_number_truncates_annotations() {
    let source = r#"X:1
M:4/4
L:1/4
K:C
C4|D4|E4|F4|
"#;
    let mut tune = parse(source).unwrap();
    let meter = tune.initial_meter;
    let options = AnalyzeOptions {
        stop_after_bar_number: Some(2),
        ..AnalyzeOptions::default()
    };
    analyze_bars(&tune.bars, &mut tune.bar_lines, meter, &options);
    assert_eq!(tune.bar_lines.len(), 2);
    assert_eq!(tune.bar_lines[1].bar_number, Some(2));
    // the parse itself keeps all four bars
    assert_eq!(tune.bars.len(), 4);
}

#[test]
fn test_half_bar_midpoints_in_compound_meter() {
    // half of a 6/8 bar is three eighth notes; the offset lands on the
    // first note of the second beat group
    let source = r#"X:1
M:6/8
L:1/8
K:G
GAB ABc|Bcd cBA|]
"#;
    let mut tune = parse(source).unwrap();
    let meter = tune.initial_meter;
    let options = AnalyzeOptions {
        divide_bars_by: Some(2),
        ..AnalyzeOptions::default()
    };
    let midpoints = analyze_bars(&tune.bars, &mut tune.bar_lines, meter, &options);
    assert_eq!(midpoints, Some(vec![4, 12]));
    assert_eq!(&tune.music_text[4..7], "ABc");
    assert_eq!(&tune.music_text[12..15], "cBA");
}

#[test]
fn test_spans_and_spacing_reconstruct_the_source() {
    // a continuation line, back-quote beaming, a tuplet, grace notes,
    // broken rhythm, an inline key change, and both variant forms
    let source = r#"X:1
T:Reconstruction
M:4/4
L:1/8
K:Em
GA|B2 `c2 (3def {/g}a2|\
"Em"g2>f2 [K:D][1d4:|[2e2f2|]
"#;
    let tune = analyze(source).unwrap();
    let mut pieces: Vec<(usize, String)> = Vec::new();
    for bar in &tune.bars {
        for token in &bar.tokens {
            pieces.push((
                token.span.start,
                format!(
                    "{}{}",
                    &tune.music_text[token.span.range()],
                    token.spacing.text
                ),
            ));
        }
    }
    for line in &tune.bar_lines {
        pieces.push((
            line.span.start,
            format!(
                "{}{}",
                &tune.music_text[line.span.range()],
                line.spacing.text
            ),
        ));
    }
    pieces.sort_by_key(|(start, _)| *start);
    let rebuilt: String = pieces.into_iter().map(|(_, text)| text).collect();
    assert_eq!(rebuilt, tune.music_text);
    // the trailing backslash joined both physical lines
    assert!(tune.newline_offsets.is_empty());
    // the inline key change rides the bar line closing its bar
    assert_eq!(tune.bar_lines[2].new_key.as_deref(), Some("D"));
    assert_eq!(
        bar_numbers(&tune),
        vec![Some(0), Some(1), Some(2), Some(2)]
    );
    // d4 and e2f2 each finish the musical bar the lead-in g2>f2 started
    assert!(tune.bar_lines[2].is_partial);
    assert!(tune.bar_lines[2].completes_music_bar);
    assert!(tune.bar_lines[3].is_partial);
    assert!(tune.bar_lines[3].completes_music_bar);
}

#[test]
fn test_tuplet_and_broken_rhythm_durations() {
    // (3ABc squeezes three eighths into a quarter; d>e dots the pair
    let source = r#"X:1
M:4/4
L:1/8
K:C
(3ABc d>e|
"#;
    let tune = parse(source).unwrap();
    let durations: Vec<_> = tune.bars[0]
        .tokens
        .iter()
        .filter_map(|token| token.real_duration())
        .collect();
    assert_eq!(
        durations,
        vec![
            Fraction::new(1, 12),
            Fraction::new(1, 12),
            Fraction::new(1, 12),
            Fraction::new(3, 16),
            Fraction::new(1, 16),
        ]
    );
}

#[test]
fn test_json_serialization_shape() {
    let source = r#"X:1
M:4/4
L:1/8
K:C
C8|
"#;
    let tune = analyze(source).unwrap();
    let value = serde_json::to_value(&tune).unwrap();
    assert_eq!(value["tonal_base"], serde_json::json!("C"));
    // exact fractions serialize as [numerator, denominator] pairs
    assert_eq!(value["unit_length"], serde_json::json!([1, 8]));
    assert_eq!(value["bar_lines"][0]["bar_number"], serde_json::json!(1));
    assert_eq!(value["bar_lines"][0]["kind"], serde_json::json!("Regular"));
    assert!(value["bars"].is_array());
}

#[test]
fn test_error_messages_carry_offsets() {
    let missing = parse("X:1\nM:4/4\nL:1/8\nCDEF|\n");
    assert!(matches!(missing, Err(AbcError::MissingTonalBase)));

    let nested = parse("X:1\nK:C\n(3C(3DE|\n");
    match nested {
        Err(AbcError::NestedTuplet { offset }) => assert_eq!(offset, 3),
        other => panic!("expected a nested tuplet error, got {:?}", other),
    }

    let ill = parse("X:1\nK:C\nCD&E|\n");
    match ill {
        Err(err @ AbcError::IllFormedToken { .. }) => {
            assert_eq!(err.to_string(), "Ill-formed token at offset 2: '&E|'");
        }
        other => panic!("expected an ill-formed token error, got {:?}", other),
    }
}
