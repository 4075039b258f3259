//! tarzst - tar + zstd archiver

use anyhow::{anyhow, Context, Result};
use archiver_core::{registry, EntryKind, Format, PartialArchive, TarZst, TarZstOptions, ZstdOptions, TAR_ZST_ID};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            output,
            inputs,
            level,
            no_checksum,
            remove_partial,
            no_overwrite,
        } => {
            println!("tarzst - Creating archive: {}", output.display());
            println!("Input sources: {} items", inputs.len());

            let format = TarZst::with_options(TarZstOptions {
                compression: ZstdOptions {
                    level,
                    include_checksum: !no_checksum,
                    ..ZstdOptions::default()
                },
                partial: if remove_partial { PartialArchive::Remove } else { PartialArchive::Keep },
                overwrite: !no_overwrite,
            });

            if !format.matches(&output) {
                println!("Note: {} does not end in .tar.zst or .tzst", output.display());
            }

            let pb = spinner("Compressing...");
            let result = format.make_with_report(&output, &inputs);
            pb.finish_and_clear();
            let report = result.with_context(|| format!("Failed to create {}", output.display()))?;

            let compressed = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
            let ratio = if report.bytes_in > 0 {
                (compressed as f64 / report.bytes_in as f64) * 100.0
            } else {
                0.0
            };

            println!("Archive creation complete!");
            println!("  Entries: {}", report.entries);
            println!("  Tar size: {} bytes", report.bytes_in);
            println!("  Compressed size: {} bytes", compressed);
            println!("  Ratio: {:.2}%", ratio);
            Ok(())
        }

        Commands::Extract { input, output, overwrite } => {
            println!("Extracting archive: {} to {}", input.display(), output.display());
            let (id, _) = lookup(&input)?;
            if id != TAR_ZST_ID {
                return Err(anyhow!("{}: {} archives cannot be extracted here", input.display(), id));
            }

            let format = TarZst::with_options(TarZstOptions { overwrite, ..TarZstOptions::default() });
            let pb = spinner("Extracting...");
            let result = format.open_with_count(&input, &output);
            pb.finish_and_clear();
            let count = result.with_context(|| format!("Failed to extract {}", input.display()))?;

            println!("Extraction complete: {} entries", count);
            Ok(())
        }

        Commands::List { archive } => {
            let (_, format) = lookup(&archive)?;
            let entries = format
                .list(&archive)
                .with_context(|| format!("Failed to list {}", archive.display()))?;

            for entry in &entries {
                let kind = match entry.kind {
                    EntryKind::File => '-',
                    EntryKind::Directory => 'd',
                    EntryKind::Symlink => 'l',
                    EntryKind::HardLink => 'h',
                    EntryKind::Other => '?',
                };
                println!("{}{:04o} {:>12} {}", kind, entry.mode & 0o7777, entry.size, entry.path.display());
            }
            println!("{} entries", entries.len());
            Ok(())
        }

        Commands::Detect { paths } => {
            for path in &paths {
                match registry::global().detect(path) {
                    Some((id, _)) => println!("{}: {}", path.display(), id),
                    None => println!("{}: unknown", path.display()),
                }
            }
            Ok(())
        }
    }
}

fn lookup(path: &Path) -> Result<(&'static str, &'static dyn Format)> {
    registry::global()
        .detect(path)
        .ok_or_else(|| anyhow!("{}: not a recognized archive", path.display()))
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
