//! Query CLI: maps an index file and answers count/locate for a pattern.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use csidx::format::MappedIndex;

/// Cap on how many positions a query prints.
const LOCATE_LIMIT: usize = 100;

#[derive(Parser)]
#[command(name = "csidx-query")]
#[command(about = "Count and locate a pattern in an FM-index")]
struct Args {
    /// Index file produced by csidx-build
    index: PathBuf,

    /// Pattern bytes to search for
    pattern: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mapped = MappedIndex::open(&args.index)
        .with_context(|| format!("cannot open {}", args.index.display()))?;
    let index = mapped.any_index()?;

    let pattern = args.pattern.as_bytes();
    let count = index.count(pattern);
    println!("count: {count}");

    if count > 0 && !pattern.is_empty() {
        let mut positions = index.locate(pattern, LOCATE_LIMIT)?;
        positions.sort_unstable();
        let shown = positions.len();
        let rendered: Vec<String> = positions.iter().map(|p| p.to_string()).collect();
        println!("positions: {}", rendered.join(", "));
        if count > shown {
            println!("({} more not shown)", count - shown);
        }
    }
    Ok(())
}
