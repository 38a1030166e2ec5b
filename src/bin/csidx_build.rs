//! Index builder CLI: reads a text file, builds the FM-index, writes the
//! binary index next to it.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use csidx::config::BuildConfig;
use csidx::fm::{BlockFmIndex, FmIndex, LearnedFmIndex};
use csidx::format::{write_index, write_learned_index};

#[derive(Parser)]
#[command(name = "csidx-build")]
#[command(about = "Build an FM-index over a byte text")]
struct Args {
    /// Input text file
    input: PathBuf,

    /// Output index path (defaults to <input>.idx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Don't append a '$' sentinel (use when the text already ends in one)
    #[arg(long)]
    no_sentinel: bool,

    /// Use the learned rank backend instead of the block backend
    #[arg(long)]
    learned: bool,

    /// Disable the cache-oblivious vEB wavelet layout
    #[arg(long)]
    no_veb: bool,

    /// Suffix-array sampling stride
    #[arg(long, default_value_t = 32)]
    ssa_stride: u32,

    /// Show index statistics after the build
    #[arg(long)]
    stats: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut text = std::fs::read(&args.input)
        .with_context(|| format!("cannot read {}", args.input.display()))?;
    if text.is_empty() {
        bail!("{} is empty", args.input.display());
    }
    if !args.no_sentinel && text.last() != Some(&b'$') && text.last() != Some(&0) {
        text.push(b'$');
        eprintln!("appended '$' sentinel");
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("idx"));
    let config = BuildConfig {
        ssa_stride: args.ssa_stride,
        use_learned_occ: args.learned,
        use_veb_layout: !args.no_veb && !args.learned,
        ..BuildConfig::default()
    };

    let start = Instant::now();
    let mem_bytes;
    if args.learned {
        let index: LearnedFmIndex = FmIndex::build(&text, &config)?;
        mem_bytes = index.size_in_bytes();
        write_learned_index(&output, &index, &config)?;
    } else {
        let index: BlockFmIndex = FmIndex::build(&text, &config)?;
        mem_bytes = index.size_in_bytes();
        write_index(&output, &index, &config)?;
    }
    let elapsed = start.elapsed();

    println!(
        "indexed {} bytes into {} in {:.1?}",
        text.len(),
        output.display(),
        elapsed
    );
    if args.stats {
        let file_len = std::fs::metadata(&output)?.len();
        println!("text length:  {} bytes", text.len());
        println!("memory size:  {mem_bytes} bytes");
        println!("file size:    {file_len} bytes");
        println!(
            "size ratio:   {:.2}x",
            file_len as f64 / text.len() as f64
        );
        println!("ssa stride:   {}", config.ssa_stride);
        println!(
            "rank backend: {}",
            if args.learned { "learned" } else { "block" }
        );
    }
    Ok(())
}
