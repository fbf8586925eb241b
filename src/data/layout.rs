//! On-disk layout of the output directory:
//!
//! ```text
//! <outdir>/<TICKER>/<TICKER>_options_<tag>_filtered.csv   fetched chains
//! <outdir>/<TICKER>/<TICKER>_options_enriched.csv         enriched row set
//! <outdir>/<TICKER>/<TICKER>_strike_buckets_summary.csv   bucket summary
//! <outdir>/YYYY/MM/DD/enriched/<TICKER>/...               dated snapshots
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

const OPTION_FILE_SUFFIX: &str = "_filtered.csv";
const SNAPSHOT_DIR: &str = "enriched";

pub fn ticker_dir(outdir: &Path, ticker: &str) -> PathBuf {
    outdir.join(ticker)
}

pub fn enriched_path(outdir: &Path, ticker: &str) -> PathBuf {
    ticker_dir(outdir, ticker).join(format!("{ticker}_options_enriched.csv"))
}

pub fn summary_path(outdir: &Path, ticker: &str) -> PathBuf {
    ticker_dir(outdir, ticker).join(format!("{ticker}_strike_buckets_summary.csv"))
}

/// Option chain files in a ticker directory, sorted by name. A missing
/// directory yields no files.
pub fn option_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(OPTION_FILE_SUFFIX))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// `<outdir>/YYYY/MM/DD/enriched`
pub fn snapshot_dir(outdir: &Path, date: NaiveDate) -> PathBuf {
    outdir
        .join(format!("{:04}", date.year()))
        .join(format!("{:02}", date.month()))
        .join(format!("{:02}", date.day()))
        .join(SNAPSHOT_DIR)
}

fn is_year_dir(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() == 4 && n.chars().all(|c| c.is_ascii_digit()))
}

/// Move every top-level child of `outdir` (other than year directories and
/// `enriched`) into the dated snapshot directory. An existing entry with
/// the same name in the snapshot is replaced.
pub fn snapshot(outdir: &Path, date: NaiveDate) -> Result<Vec<PathBuf>> {
    if !outdir.is_dir() {
        warn!(outdir = %outdir.display(), "output directory does not exist, nothing to snapshot");
        return Ok(Vec::new());
    }

    let dest_root = snapshot_dir(outdir, date);
    std::fs::create_dir_all(&dest_root)
        .with_context(|| format!("creating snapshot directory {}", dest_root.display()))?;
    info!(dest = %dest_root.display(), "moving output into snapshot");

    let mut children: Vec<PathBuf> = std::fs::read_dir(outdir)
        .with_context(|| format!("listing {}", outdir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| !is_year_dir(p) && p.file_name().is_some_and(|n| n != SNAPSHOT_DIR))
        .collect();
    children.sort();

    let mut moved = Vec::with_capacity(children.len());
    for child in children {
        let Some(name) = child.file_name() else { continue };
        let target = dest_root.join(name);
        if target.exists() {
            warn!(target = %target.display(), "replacing existing snapshot entry");
            let removed = if target.is_dir() {
                std::fs::remove_dir_all(&target)
            } else {
                std::fs::remove_file(&target)
            };
            removed.with_context(|| format!("removing {}", target.display()))?;
        }
        std::fs::rename(&child, &target)
            .with_context(|| format!("moving {} -> {}", child.display(), target.display()))?;
        info!(from = %child.display(), to = %target.display(), "moved");
        moved.push(target);
    }

    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_paths() {
        let out = Path::new("csv_out");
        assert_eq!(
            summary_path(out, "AAPL"),
            Path::new("csv_out/AAPL/AAPL_strike_buckets_summary.csv")
        );
        assert_eq!(
            snapshot_dir(out, ymd(2025, 1, 7)),
            Path::new("csv_out/2025/01/07/enriched")
        );
    }

    #[test]
    fn test_missing_ticker_dir_has_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(option_files(&tmp.path().join("NOPE")).unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_moves_ticker_dirs_only() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        std::fs::create_dir_all(out.join("AAPL")).unwrap();
        std::fs::write(out.join("AAPL/AAPL_options_enriched.csv"), "x").unwrap();
        std::fs::create_dir_all(out.join("2024/12/31/enriched/MSFT")).unwrap();

        let moved = snapshot(out, ymd(2025, 1, 7)).unwrap();

        assert_eq!(moved, vec![out.join("2025/01/07/enriched/AAPL")]);
        assert!(!out.join("AAPL").exists());
        assert!(out.join("2025/01/07/enriched/AAPL/AAPL_options_enriched.csv").exists());
        assert!(out.join("2024/12/31/enriched/MSFT").exists());
    }

    #[test]
    fn test_snapshot_replaces_same_day_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path();
        std::fs::create_dir_all(out.join("2025/01/07/enriched/AAPL")).unwrap();
        std::fs::write(out.join("2025/01/07/enriched/AAPL/old.csv"), "old").unwrap();
        std::fs::create_dir_all(out.join("AAPL")).unwrap();
        std::fs::write(out.join("AAPL/new.csv"), "new").unwrap();

        snapshot(out, ymd(2025, 1, 7)).unwrap();

        let snap = out.join("2025/01/07/enriched/AAPL");
        assert!(snap.join("new.csv").exists());
        assert!(!snap.join("old.csv").exists());
    }
}
