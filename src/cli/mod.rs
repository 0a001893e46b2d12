//! Defines mdview's CLI through clap types.

mod recent;
mod view;

use std::{
    env,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use clap::Parser;
use thiserror::Error;

use crate::settings::{self, Settings, SettingsError};

pub use self::recent::RecentCommand;
pub use self::view::{parse_command, Command, CommandParseError, ViewCommand};

/// Command line options that mdview accepts, defined using the clap crate.
#[derive(Debug, Parser)]
#[clap(name = "mdview", version, about)]
pub struct Options {
    #[clap(flatten)]
    pub global: GlobalOptions,

    /// Subcommand to run in this invocation.
    #[clap(subcommand)]
    pub subcommand: Subcommand,
}

impl Options {
    pub fn run(self, config: &AppConfig) -> anyhow::Result<()> {
        match self.subcommand {
            Subcommand::View(subcommand) => subcommand.run(config),
            Subcommand::Recent(subcommand) => subcommand.run(config),
        }
    }
}

#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Sets verbosity level. Can be specified multiple times.
    #[clap(long("verbose"), short, global(true), action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Set color behavior. Valid values are auto, always, and never.
    #[clap(long("color"), global(true), default_value("auto"))]
    pub color: ColorChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl FromStr for ColorChoice {
    type Err = ColorChoiceParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        match source {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(ColorChoiceParseError {
                attempted: source.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Error)]
#[error("Invalid color choice '{attempted}'. Valid values are: auto, always, never")]
pub struct ColorChoiceParseError {
    attempted: String,
}

#[derive(Debug, Parser)]
pub enum Subcommand {
    View(ViewCommand),
    Recent(RecentCommand),
}

impl Subcommand {
    pub fn command_name(&self) -> &'static str {
        match self {
            Subcommand::View(_) => "view",
            Subcommand::Recent(_) => "recent",
        }
    }
}

/// Everything a command needs from the environment before it starts.
#[derive(Debug, Default)]
pub struct AppConfig {
    pub config_dir: Option<PathBuf>,
    pub settings: Settings,
}

impl AppConfig {
    /// Locates the config directory and reads settings from it. A broken
    /// settings file is handed back so the caller can report it once logging
    /// is up; defaults are used in its place.
    pub fn load() -> (Self, Option<SettingsError>) {
        let config_dir = settings::config_dir();

        let (settings, error) = match config_dir.as_deref().map(Settings::load) {
            Some(Ok(settings)) => (settings, None),
            Some(Err(err)) => (Settings::default(), Some(err)),
            None => (Settings::default(), None),
        };

        (
            Self {
                config_dir,
                settings,
            },
            error,
        )
    }
}

/// Makes `path` absolute against the working directory. Existing paths are
/// also canonicalized so that `..` and symlinks do not leak into history.
pub fn resolve_path(path: &Path) -> anyhow::Result<PathBuf> {
    if let Ok(canonical) = fs_err::canonicalize(path) {
        return Ok(canonical);
    }

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = env::current_dir().context("Could not determine the working directory")?;
        Ok(cwd.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn color_choice_parsing() {
        assert_eq!("never".parse::<ColorChoice>().unwrap(), ColorChoice::Never);
        let err = "sometimes".parse::<ColorChoice>().unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn view_accepts_optional_path() {
        let options = Options::try_parse_from(["mdview", "-vv", "view", "notes.md"]).unwrap();
        assert_eq!(options.global.verbosity, 2);
        assert_eq!(options.subcommand.command_name(), "view");

        let options = Options::try_parse_from(["mdview", "view", "--ephemeral"]).unwrap();
        match options.subcommand {
            Subcommand::View(view) => {
                assert!(view.ephemeral);
                assert!(view.path.is_none());
            }
            other => panic!("unexpected subcommand {other:?}"),
        }
    }

    #[test]
    fn resolve_path_canonicalizes_existing_paths() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a");
        fs_err::create_dir(&nested).unwrap();

        let resolved = resolve_path(&nested.join("..").join("a")).unwrap();
        assert_eq!(resolved, fs_err::canonicalize(&nested).unwrap());
    }

    #[test]
    fn resolve_path_keeps_missing_absolute_paths() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.md");

        assert_eq!(resolve_path(&missing).unwrap(), missing);
    }
}
