// src/main.rs
// Command-line front end for the RAW Writer

use std::env;
use std::process;

use raw_writer::{load_csv, rename_trace, CsvOptions, MergeOptions, WaveformSet};
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage: raw_writer <command> <args> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  convert <file.csv> <output.raw> [--normal]");
    eprintln!("      Convert a trace export to a binary RAW file");
    eprintln!("  merge <base.csv> <other.csv> <output.raw> [--align] [--error <e>] [--rename <fmt>]");
    eprintln!("      Add every trace of <other> to <base> and write the result");
    eprintln!("  info <file.csv>");
    eprintln!("      Display what the RAW file would contain");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  raw_writer convert capture.csv capture.raw");
    eprintln!("  raw_writer merge run1.csv run2.csv merged.raw --align --rename {{}}_run2");
    eprintln!("  raw_writer info capture.csv");
}

fn fail(message: String) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load(input_file: &str, fast_access: bool) -> WaveformSet {
    let options = CsvOptions {
        fast_access,
        ..CsvOptions::default()
    };
    load_csv(input_file, &options)
        .unwrap_or_else(|e| fail(format!("loading '{}': {}", input_file, e)))
}

fn save(raw: &WaveformSet, output_file: &str) {
    if let Err(e) = raw.save(output_file) {
        fail(format!("writing RAW file '{}': {}", output_file, e));
    }
}

/// First imported name that would duplicate a trace already in `raw`, or
/// another imported trace, once the rename template is applied.
fn find_name_collision(raw: &WaveformSet, names: &[&str], options: &MergeOptions) -> Option<String> {
    let mut renamed: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let new_name = rename_trace(name, options);
        if raw.name_exists(&new_name) || renamed.contains(&new_name) {
            return Some(new_name);
        }
        renamed.push(new_name);
    }
    None
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        print_usage();
        process::exit(1);
    }

    let command = &args[1];

    match command.as_str() {
        "info" => {
            let raw = load(&args[2], true);
            print_set_info(&raw);
        }

        "convert" => {
            if args.len() < 4 {
                eprintln!("Error: Missing output file argument");
                print_usage();
                process::exit(1);
            }

            let normal = args[4..].iter().any(|a| a == "--normal");
            let raw = load(&args[2], !normal);
            save(&raw, &args[3]);

            println!("Successfully converted {} to {}", args[2], args[3]);
            println!("Traces: {}, points: {}", raw.len(), raw.num_points());
        }

        "merge" => {
            if args.len() < 5 {
                eprintln!("Error: Missing arguments");
                print_usage();
                process::exit(1);
            }

            let mut options = MergeOptions::default();
            let mut rest = args[5..].iter();
            while let Some(flag) = rest.next() {
                match flag.as_str() {
                    "--align" => options.force_axis_alignment = true,
                    "--error" => {
                        let value = rest
                            .next()
                            .unwrap_or_else(|| fail("--error needs a value".to_string()));
                        options.admissible_error = value
                            .parse()
                            .unwrap_or_else(|_| fail(format!("invalid error value '{}'", value)));
                    }
                    "--rename" => {
                        options.rename_format = rest
                            .next()
                            .unwrap_or_else(|| fail("--rename needs a format".to_string()))
                            .clone();
                    }
                    other => fail(format!("unknown option '{}'", other)),
                }
            }

            let mut raw = load(&args[2], true);
            let other = load(&args[3], true);
            let names: Vec<&str> = other.traces().iter().skip(1).map(|t| t.name()).collect();

            if let Some(name) = find_name_collision(&raw, &names, &options) {
                fail(format!(
                    "trace '{}' would appear twice in '{}', pick another name with --rename (e.g. --rename {{}}_2)",
                    name, args[4]
                ));
            }

            if let Err(e) = raw.merge_from(&other, &names, &options) {
                fail(format!("merging '{}' into '{}': {}", args[3], args[2], e));
            }
            save(&raw, &args[4]);

            println!("Merged {} traces into {}", names.len(), args[4]);
            println!("Traces: {}, points: {}", raw.len(), raw.num_points());
        }

        _ => {
            eprintln!("Error: Unknown command '{}'", command);
            print_usage();
            process::exit(1);
        }
    }
}

fn print_set_info(raw: &WaveformSet) {
    println!("RAW File Information");
    println!("====================");
    println!();
    println!("Plotname: {}", raw.plot_title().unwrap_or(""));
    println!("Flags: {}", raw.flags());
    println!("No. Variables: {}", raw.len());
    println!("No. Points: {}", raw.num_points());
    println!("Binary payload: {} bytes", raw.payload_len());
    println!();

    println!("Variables:");
    for (idx, trace) in raw.traces().iter().enumerate() {
        let min = trace.values().iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = trace.values().iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        println!(
            "  {}\t{}\t{}\tmin={:.6e}, max={:.6e}",
            idx,
            trace.name(),
            trace.kind(),
            min,
            max
        );
    }
}
