//! # Bar-Structure Analyzer
//!
//! ## Purpose
//! Walks the parser's bars and bar lines a second time and annotates each
//! bar line with musical structure: the musical bar number (anacrusis
//! segments are numbered 0), whether the closed bar is partial and
//! whether it completes a musical bar spread over several partial
//! segments, exact cumulative durations, and the zero-based alternative
//! id while inside a variant-ending group.
//!
//! Numbering follows repeats the way a player reads them: when a variant
//! group opens, the numbering state is snapshotted, and every later
//! alternative restores it, so all alternatives of one group share the
//! same bar numbers and only their `variant_id` differs. After the group,
//! numbering resumes past the highest number any alternative reached.
//!
//! The analyzer never re-tokenizes. It reads token durations the parser
//! already computed, follows meter changes recorded on bar lines, and
//! writes its results back into the `BarLine` records in place.
//!
//! ## Entry Point
//! [`analyze_bars`]. Midpoint offsets are returned separately when
//! requested via `divide_bars_by = Some(2)`.
//!
//! ## Example
//! ```
//! use abctune::{analyze_bars, parse, AnalyzeOptions};
//!
//! let mut tune = parse("X:1\nM:4/4\nL:1/8\nK:C\nFA|DEFG ABcd|\n").unwrap();
//! let meter = tune.initial_meter;
//! analyze_bars(&tune.bars, &mut tune.bar_lines, meter, &AnalyzeOptions::default());
//! assert_eq!(tune.bar_lines[0].bar_number, Some(0)); // anacrusis
//! assert_eq!(tune.bar_lines[1].bar_number, Some(1));
//! ```
//!
//! ## Related Modules
//! - [`crate::parser`] - produces the bars and bar lines analyzed here
//! - [`crate::ast`] - the annotated `BarLine` fields

use crate::ast::{
    AnalyzeOptions, Bar, BarLine, CumulativeDuration, Fraction, Meter, TokenKind,
};

/// Numbering state captured when a variant-ending group opens; restored
/// verbatim at the start of every later alternative in the group.
#[derive(Debug, Clone, Copy)]
struct BranchPoint {
    bar_number: u32,
    since_last_complete: Fraction,
    last_complete: Option<usize>,
    meter: Meter,
    full_bar: Fraction,
}

#[derive(Debug, Clone, Copy)]
struct VariantGroup {
    branch: BranchPoint,
    variant_id: u32,
    /// Highest bar number any alternative has reached; numbering resumes
    /// one past it when the group exits.
    max_bar_number: u32,
}

/// Annotate `bar_lines` in place with musical bar structure.
///
/// `meter` seeds the full-bar duration; meter changes recorded on bar
/// lines take effect for the bars after them. When
/// `options.divide_bars_by` is `Some(2)`, the returned vector holds one
/// half-bar source offset per bar that reaches its halfway mark.
pub fn analyze_bars(
    bars: &[Bar],
    bar_lines: &mut Vec<BarLine>,
    meter: Meter,
    options: &AnalyzeOptions,
) -> Option<Vec<usize>> {
    let zero = Fraction::from_integer(0);
    let mut midpoints = options
        .divide_bars_by
        .filter(|divisor| *divisor == 2)
        .map(|_| Vec::new());
    let mut skipped: Vec<usize> = Vec::new();
    let mut line_index = 0;
    let mut current_bar_number: u32 = 1;
    let mut since_last_complete = zero;
    let mut last_complete: Option<usize> = None;
    let mut meter = meter;
    let mut full_bar = meter.fraction();
    let mut variant: Option<VariantGroup> = None;
    let mut stopped = false;

    for (bar_index, bar) in bars.iter().enumerate() {
        // bar lines that closed empty bars sit before this bar's first
        // token; step over them now and fill them in afterwards
        if let Some(first) = bar.tokens.first() {
            while line_index < bar_lines.len()
                && bar_lines[line_index].span.start < first.span.start
            {
                skipped.push(line_index);
                line_index += 1;
            }
        }
        if let Some(collected) = midpoints.as_mut() {
            if let Some(offset) = midpoint(bar, full_bar) {
                collected.push(offset);
            }
        }
        let mut bar_duration = zero;
        for token in &bar.tokens {
            if matches!(token.kind, TokenKind::VariantEnding { .. }) {
                match variant {
                    None => {
                        // music before the marker still belongs to the
                        // shared lead-in, not to the first alternative
                        since_last_complete += bar_duration;
                        variant = Some(VariantGroup {
                            branch: BranchPoint {
                                bar_number: current_bar_number,
                                since_last_complete,
                                last_complete,
                                meter,
                                full_bar,
                            },
                            variant_id: 0,
                            max_bar_number: current_bar_number.saturating_sub(1),
                        });
                    }
                    Some(mut group) => {
                        let branch = group.branch;
                        current_bar_number = branch.bar_number;
                        since_last_complete = branch.since_last_complete;
                        last_complete = branch.last_complete;
                        meter = branch.meter;
                        full_bar = branch.full_bar;
                        group.variant_id += 1;
                        variant = Some(group);
                    }
                }
                bar_duration = zero;
            } else if let Some(duration) = token.real_duration() {
                bar_duration += duration;
            }
        }
        if line_index >= bar_lines.len() {
            continue;
        }
        let is_partial = bar_duration < full_bar;
        let completes = is_partial && since_last_complete + bar_duration >= full_bar;
        let assigned = if is_partial && last_complete.is_none() {
            0
        } else {
            current_bar_number
        };
        let line = &mut bar_lines[line_index];
        if options.bar_numbers {
            line.bar_number = Some(assigned);
        }
        if options.is_partial {
            line.is_partial = is_partial;
            line.completes_music_bar = completes;
        }
        if options.cumulative_duration {
            line.cumulative_duration = Some(CumulativeDuration {
                since_last_bar_line: bar_duration,
                since_last_complete: if is_partial {
                    since_last_complete + bar_duration
                } else {
                    bar_duration
                },
            });
        }
        if let Some(group) = variant.as_mut() {
            if options.bar_numbers {
                line.variant_id = Some(group.variant_id);
            }
            group.max_bar_number = group.max_bar_number.max(assigned);
        }
        let is_section_break = line.is_section_break;
        let carried_meter = line.new_meter;
        if !is_partial || completes {
            current_bar_number = assigned + 1;
            since_last_complete = zero;
            last_complete = Some(line_index);
        } else {
            since_last_complete += bar_duration;
        }
        if is_section_break {
            if let Some(group) = variant {
                let next_opens_variant = bars
                    .get(bar_index + 1)
                    .and_then(|next| next.tokens.first())
                    .is_some_and(|token| {
                        matches!(token.kind, TokenKind::VariantEnding { .. })
                    });
                if !next_opens_variant {
                    current_bar_number = group.max_bar_number + 1;
                    variant = None;
                }
            }
        }
        if let Some(new_meter) = carried_meter {
            meter = new_meter;
            full_bar = meter.fraction();
        }
        if options.stop_after_bar_number == Some(assigned) {
            bar_lines.truncate(line_index + 1);
            stopped = true;
            break;
        }
        line_index += 1;
    }
    if !stopped {
        while line_index < bar_lines.len() {
            skipped.push(line_index);
            line_index += 1;
        }
    }
    backfill_skipped(bar_lines, &skipped);
    midpoints
}

/// Copy annotations forward onto bar lines that closed empty bars, so no
/// line is left unclassified. A skipped line before any annotated one
/// stays unnumbered.
fn backfill_skipped(bar_lines: &mut [BarLine], skipped: &[usize]) {
    for &index in skipped {
        if index == 0 || index >= bar_lines.len() {
            continue;
        }
        let (before, after) = bar_lines.split_at_mut(index);
        let previous = &before[index - 1];
        let line = &mut after[0];
        if line.bar_number.is_none() {
            line.bar_number = previous.bar_number;
        }
        if line.variant_id.is_none() {
            line.variant_id = previous.variant_id;
        }
        if line.cumulative_duration.is_none() {
            line.cumulative_duration = previous.cumulative_duration;
        }
    }
}

/// Source offset just past the token that brings the bar to half its
/// meter, stepped over the run of blanks that follows it. Bars that hit a
/// variant-ending token before the halfway mark yield nothing.
fn midpoint(bar: &Bar, full_bar: Fraction) -> Option<usize> {
    let half = full_bar / 2;
    let mut filled = Fraction::from_integer(0);
    for token in &bar.tokens {
        if matches!(token.kind, TokenKind::VariantEnding { .. }) {
            return None;
        }
        let Some(duration) = token.real_duration() else {
            continue;
        };
        filled += duration;
        if filled >= half {
            return Some(token.span.end() + leading_blank_len(&token.spacing.text));
        }
    }
    None
}

fn leading_blank_len(text: &str) -> usize {
    text.bytes()
        .take_while(|b| matches!(b, b' ' | b'\t'))
        .count()
}
