use std::env;
use std::fs;
use std::process;

use abctune::{analyze_bars, parse_with_options, AnalyzeOptions, ParseOptions, Tune};
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    tune: &'a Tune,
    midpoints: Option<Vec<usize>>,
}

fn usage() -> ! {
    eprintln!("Usage: abctune [--json] [--midpoints] [--max-bars <n>] [--stop-after <n>] <tune.abc>");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        usage();
    }

    // Parse flags
    let mut json = false;
    let mut midpoints = false;
    let mut max_bars: Option<usize> = None;
    let mut stop_after: Option<u32> = None;
    let mut input_path: Option<&String> = None;
    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--json" => json = true,
            "--midpoints" => midpoints = true,
            "--max-bars" => {
                index += 1;
                max_bars = match args.get(index).and_then(|v| v.parse::<usize>().ok()) {
                    Some(n) => Some(n),
                    None => {
                        eprintln!("Error: --max-bars expects a number");
                        process::exit(1);
                    }
                };
            }
            "--stop-after" => {
                index += 1;
                stop_after = match args.get(index).and_then(|v| v.parse::<u32>().ok()) {
                    Some(n) => Some(n),
                    None => {
                        eprintln!("Error: --stop-after expects a number");
                        process::exit(1);
                    }
                };
            }
            other if other.starts_with("--") => {
                eprintln!("Error: unknown option '{}'", other);
                usage();
            }
            _ => {
                if input_path.replace(&args[index]).is_some() {
                    eprintln!("Error: more than one input file");
                    usage();
                }
            }
        }
        index += 1;
    }
    let input_path = match input_path {
        Some(path) => path,
        None => usage(),
    };

    // Read input file
    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    // Parse
    let options = ParseOptions { max_bars };
    let mut tune = match parse_with_options(&source, &options) {
        Ok(tune) => tune,
        Err(e) => {
            eprintln!("Parse error: {}", e);
            process::exit(1);
        }
    };

    // Analyze bar structure
    let analyze_options = AnalyzeOptions {
        divide_bars_by: if midpoints { Some(2) } else { None },
        stop_after_bar_number: stop_after,
        ..AnalyzeOptions::default()
    };
    let meter = tune.initial_meter;
    let found = analyze_bars(&tune.bars, &mut tune.bar_lines, meter, &analyze_options);

    // Output
    if json {
        let report = Report {
            tune: &tune,
            midpoints: found,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing result: {}", e);
                process::exit(1);
            }
        }
    } else {
        print_summary(&tune, found.as_deref());
    }
}

fn print_summary(tune: &Tune, midpoints: Option<&[usize]>) {
    println!(
        "meter {}  unit length {}  tonal base {}  ({} bars, {} bar lines)",
        tune.meter,
        tune.unit_length,
        tune.tonal_base,
        tune.bars.len(),
        tune.bar_lines.len()
    );
    for line in &tune.bar_lines {
        let glyph = &tune.music_text[line.span.range()];
        let number = match line.bar_number {
            Some(number) => number.to_string(),
            None => "-".to_string(),
        };
        let mut notes: Vec<String> = Vec::new();
        if let Some(cumulative) = &line.cumulative_duration {
            notes.push(format!("duration {}", cumulative.since_last_bar_line));
        }
        if line.is_partial {
            notes.push("partial".to_string());
        }
        if line.completes_music_bar {
            notes.push("completes".to_string());
        }
        if let Some(id) = line.variant_id {
            notes.push(format!("variant {}", id));
        }
        println!("  {:<4} bar {:>3}  {}", glyph, number, notes.join(", "));
    }
    if let Some(offsets) = midpoints {
        println!("half-bar offsets: {:?}", offsets);
    }
}
