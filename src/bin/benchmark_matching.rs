use std::fs;
use std::path::Path;
use std::time::Instant;
use warpscope::matcher::{match_lines, split_lines};
use warpscope::snapshot::PatternSnapshot;
use warpscope::store::PatternFile;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <log_file> <pattern_file>", args[0]);
        std::process::exit(1);
    }

    let content = fs::read_to_string(&args[1])?;
    let pattern_text = fs::read_to_string(&args[2])?;
    let file = PatternFile::parse(&pattern_text, Path::new(&args[2]))?;
    let snapshot = PatternSnapshot::from_patterns(file.patterns);
    let lines = split_lines(&content);

    println!("Benchmarking pattern matching: {} lines x {} patterns...", lines.len(), snapshot.len());

    // Warmup
    let _ = match_lines(&lines[..lines.len().min(100)], &snapshot);

    let start = Instant::now();
    let result = match_lines(&lines, &snapshot);
    let duration = start.elapsed();
    let lines_per_sec = lines.len() as f64 / duration.as_secs_f64();

    println!("Results:");
    println!("  Total time: {:.3}s", duration.as_secs_f64());
    println!("  Lines per second: {:.0}", lines_per_sec);
    println!("  Patterns matched: {} / {}", result.len(), snapshot.len());
    for rec in &result {
        println!("  {} -> {}", rec.pattern, rec.line.trim());
    }

    Ok(())
}
