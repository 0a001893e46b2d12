use std::{
    io::{self, Write},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use clap::Parser;

use crate::recent::{EntryKind, FileStore, RecentEntry, RecentStore};

use super::AppConfig;

/// Show the files and directories opened most recently.
#[derive(Debug, Parser)]
pub struct RecentCommand {
    /// Forget every entry instead of listing them.
    #[clap(long)]
    pub clear: bool,
}

impl RecentCommand {
    pub fn run(self, config: &AppConfig) -> anyhow::Result<()> {
        let dir = config
            .config_dir
            .as_deref()
            .context("Could not locate a config directory for mdview")?;
        let mut store = RecentStore::new(FileStore::new(dir));

        if self.clear {
            store.clear().context("Could not clear recent entries")?;
            log::info!("Cleared recent entries");
            return Ok(());
        }

        let stdout = io::stdout();
        print_entries(&mut stdout.lock(), &store.list(), SystemTime::now())?;

        Ok(())
    }
}

fn print_entries(out: &mut impl Write, entries: &[RecentEntry], now: SystemTime) -> io::Result<()> {
    if entries.is_empty() {
        return writeln!(out, "No recent entries.");
    }

    for entry in entries {
        let kind = match entry.kind {
            EntryKind::File => "file",
            EntryKind::Directory => "dir ",
        };
        writeln!(
            out,
            "{kind}  {:<24} {:>12}  {}",
            entry.name,
            format_age(entry.opened_at, now),
            entry.path.display()
        )?;
    }

    Ok(())
}

/// Rough age of an entry, rounded to whole units.
fn format_age(opened_at: u64, now: SystemTime) -> String {
    let opened = UNIX_EPOCH + Duration::from_millis(opened_at);
    let age = now.duration_since(opened).unwrap_or_default();

    let rounded = match age.as_secs() {
        0 => return "just now".to_owned(),
        secs if secs < 60 => Duration::from_secs(secs),
        secs if secs < 3600 => Duration::from_secs(secs / 60 * 60),
        secs if secs < 86400 => Duration::from_secs(secs / 3600 * 3600),
        secs => Duration::from_secs(secs / 86400 * 86400),
    };

    format!("{} ago", humantime::format_duration(rounded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn at(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn ages_round_to_largest_unit() {
        assert_eq!(format_age(1_000, at(1_500)), "just now");
        assert_eq!(format_age(0, at(42_000)), "42s ago");
        assert_eq!(format_age(0, at(150_000)), "2m ago");
        assert_eq!(format_age(0, at(3 * 3_600_000 + 5_000)), "3h ago");
        assert_eq!(format_age(0, at(2 * 86_400_000 + 60_000)), "2days ago");
    }

    #[test]
    fn clock_skew_counts_as_just_now() {
        assert_eq!(format_age(10_000, at(5_000)), "just now");
    }

    #[test]
    fn entries_are_printed_in_order() {
        let entries = vec![
            RecentEntry {
                path: PathBuf::from("/docs/a.md"),
                name: "a.md".to_owned(),
                kind: EntryKind::File,
                opened_at: 0,
            },
            RecentEntry {
                path: PathBuf::from("/docs"),
                name: "docs".to_owned(),
                kind: EntryKind::Directory,
                opened_at: 0,
            },
        ];

        let mut out = Vec::new();
        print_entries(&mut out, &entries, at(60_000)).unwrap();
        let out = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("file  a.md"));
        assert!(lines[1].starts_with("dir   docs"));
        assert!(lines[0].contains("1m ago"));
    }

    #[test]
    fn empty_history_says_so() {
        let mut out = Vec::new();
        print_entries(&mut out, &[], at(0)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No recent entries.\n");
    }
}
