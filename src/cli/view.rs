use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    thread,
};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{select, Receiver};
use livefs::WatchEvent;
use thiserror::Error;

use crate::{
    host::{Host, LocalHost, Picker},
    listing::listing_hint,
    outline::{extract_headings, extract_image_sources},
    paths::resolve_image_src,
    recent::{FileStore, KeyValueStore, MemoryStore},
    sync_client::{OpenOutcome, Reconciliation, SyncClient},
};

use super::{resolve_path, AppConfig};

const HELP: &str = "\
Commands:
  open [PATH]      open a file or directory (prompts when PATH is omitted)
  dir [PATH]       browse a directory (prompts when PATH is omitted)
  up               browse the parent directory
  ls               show the sidebar
  expand PATH      expand a subdirectory in the sidebar
  collapse PATH    collapse a subdirectory in the sidebar
  select PATH      activate a sidebar entry
  recent [N]       list recent entries, or reopen entry N
  scroll OFFSET    record the scroll offset of the open document
  toc              show the document's headings
  show             print the open document
  close            close the document
  help             show this message
  quit             exit";

/// Browse Markdown files interactively, following changes made on disk.
#[derive(Debug, Parser)]
pub struct ViewCommand {
    /// File or directory to open on startup.
    pub path: Option<PathBuf>,

    /// Keep the history of opened entries in memory only.
    #[clap(long)]
    pub ephemeral: bool,
}

impl ViewCommand {
    pub fn run(self, config: &AppConfig) -> anyhow::Result<()> {
        let store: Box<dyn KeyValueStore> = match (&config.config_dir, self.ephemeral) {
            (Some(dir), false) => Box::new(FileStore::new(dir)),
            _ => {
                log::debug!("Recent entries are kept in memory only");
                Box::new(MemoryStore::new())
            }
        };

        let (host, events) = LocalHost::new(config.settings.watch_timing());
        let lines = spawn_stdin_reader().context("Could not start reading input")?;

        let mut shell = Shell::new(SyncClient::new(host, store), lines.clone(), io::stdout());

        if let Some(path) = &self.path {
            let path = resolve_path(path)?;
            shell.open(&path)?;
        }
        shell.greet()?;

        loop {
            select! {
                recv(lines) -> line => match line {
                    Ok(line) => {
                        if shell.execute(&line)? == Flow::Quit {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                recv(events) -> event => match event {
                    Ok(event) => shell.handle_event(event)?,
                    Err(_) => break,
                },
            }
        }

        Ok(())
    }
}

/// Forwards stdin line by line. The thread spends its life blocked on a read,
/// so it is detached instead of joined.
fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (sender, receiver) = crossbeam_channel::unbounded();

    thread::Builder::new()
        .name("stdin reader".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        log::warn!("Could not read input: {}", err);
                        break;
                    }
                }
            }
        })?;

    Ok(receiver)
}

/// One line of shell input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(Option<PathBuf>),
    Dir(Option<PathBuf>),
    Up,
    List,
    Expand(PathBuf),
    Collapse(PathBuf),
    Select(PathBuf),
    Recent(Option<usize>),
    Scroll(f64),
    Toc,
    Show,
    Close,
    Help,
    Quit,
    Nothing,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Unknown command '{0}'. Type `help` for a list of commands.")]
    Unknown(String),

    #[error("`{command}` needs an argument")]
    MissingArgument { command: &'static str },

    #[error("`{command}` expects a number, got '{value}'")]
    InvalidNumber {
        command: &'static str,
        value: String,
    },
}

pub fn parse_command(line: &str) -> Result<Command, CommandParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let argument = (!rest.is_empty()).then_some(rest);

    let required_path = |command: &'static str| {
        argument
            .map(PathBuf::from)
            .ok_or(CommandParseError::MissingArgument { command })
    };

    let command = match word {
        "" => Command::Nothing,
        "open" => Command::Open(argument.map(PathBuf::from)),
        "dir" => Command::Dir(argument.map(PathBuf::from)),
        "up" => Command::Up,
        "ls" => Command::List,
        "expand" => Command::Expand(required_path("expand")?),
        "collapse" => Command::Collapse(required_path("collapse")?),
        "select" => Command::Select(required_path("select")?),
        "recent" => match argument {
            None => Command::Recent(None),
            Some(value) => match value.parse::<usize>() {
                Ok(index) if index > 0 => Command::Recent(Some(index)),
                _ => {
                    return Err(CommandParseError::InvalidNumber {
                        command: "recent",
                        value: value.to_owned(),
                    })
                }
            },
        },
        "scroll" => {
            let value = argument.ok_or(CommandParseError::MissingArgument { command: "scroll" })?;
            match value.parse::<f64>() {
                Ok(offset) if offset.is_finite() => Command::Scroll(offset.max(0.0)),
                _ => {
                    return Err(CommandParseError::InvalidNumber {
                        command: "scroll",
                        value: value.to_owned(),
                    })
                }
            }
        }
        "toc" => Command::Toc,
        "show" => Command::Show,
        "close" => Command::Close,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandParseError::Unknown(other.to_owned())),
    };

    Ok(command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Stands in for the native file dialogs by reading the next input line.
/// An empty line cancels.
struct PathPrompt {
    lines: Receiver<String>,
}

impl PathPrompt {
    fn next_path(&mut self) -> Option<PathBuf> {
        let line = self.lines.recv().ok()?;
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        resolve_path(Path::new(line)).ok()
    }
}

impl Picker for PathPrompt {
    fn pick_file(&mut self) -> Option<PathBuf> {
        self.next_path()
    }

    fn pick_directory(&mut self) -> Option<PathBuf> {
        self.next_path()
    }
}

/// Text presentation of a [`SyncClient`].
struct Shell<H, S, W> {
    client: SyncClient<H, S>,
    prompt: PathPrompt,
    out: W,
}

impl<H: Host, S: KeyValueStore, W: Write> Shell<H, S, W> {
    fn new(client: SyncClient<H, S>, lines: Receiver<String>, out: W) -> Self {
        Self {
            client,
            prompt: PathPrompt { lines },
            out,
        }
    }

    fn greet(&mut self) -> io::Result<()> {
        writeln!(self.out, "Type `help` for a list of commands.")
    }

    fn execute(&mut self, line: &str) -> anyhow::Result<Flow> {
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                writeln!(self.out, "{err}")?;
                return Ok(Flow::Continue);
            }
        };

        log::trace!("Running {:?}", command);

        match command {
            Command::Nothing => {}
            Command::Open(Some(path)) => self.open(&resolve_path(&path)?)?,
            Command::Open(None) => {
                writeln!(self.out, "File to open (empty line cancels):")?;
                self.out.flush()?;
                let outcome = self.client.open_file_dialog(&mut self.prompt);
                self.report_open(outcome)?;
            }
            Command::Dir(Some(path)) => {
                let path = resolve_path(&path)?;
                match self.client.open_directory(&path) {
                    OpenOutcome::Failed => {
                        writeln!(self.out, "Could not open {}.", path.display())?
                    }
                    outcome => self.report_open(outcome)?,
                }
            }
            Command::Dir(None) => {
                writeln!(self.out, "Directory to browse (empty line cancels):")?;
                self.out.flush()?;
                let outcome = self.client.open_directory_dialog(&mut self.prompt);
                self.report_open(outcome)?;
            }
            Command::Up => {
                if self.client.navigate_up() {
                    self.print_tree()?;
                } else {
                    writeln!(self.out, "There is no readable folder above this one.")?;
                }
            }
            Command::List => self.print_tree()?,
            Command::Expand(path) => {
                let path = self.sidebar_path(&path)?;
                let is_folder = self
                    .client
                    .tree()
                    .find(&path)
                    .is_some_and(|entry| entry.is_directory);

                if is_folder {
                    self.client.expand(&path);
                    self.print_tree()?;
                } else {
                    writeln!(self.out, "{} is not a folder in the sidebar.", path.display())?;
                }
            }
            Command::Collapse(path) => {
                let path = self.sidebar_path(&path)?;
                self.client.collapse(&path);
                self.print_tree()?;
            }
            Command::Select(path) => {
                let path = self.sidebar_path(&path)?;
                match self.client.tree().find(&path).cloned() {
                    Some(entry) => {
                        let outcome = self.client.select_entry(&entry);
                        self.report_open(outcome)?;
                    }
                    None => writeln!(self.out, "{} is not in the sidebar.", path.display())?,
                }
            }
            Command::Recent(None) => self.print_recent()?,
            Command::Recent(Some(index)) => {
                let entries = self.client.recent_entries();
                match entries.get(index - 1) {
                    Some(entry) => {
                        let outcome = self.client.open_recent(entry);
                        self.report_open(outcome)?;
                    }
                    None => writeln!(self.out, "There is no recent entry {index}.")?,
                }
            }
            Command::Scroll(offset) => {
                if self.client.document().is_some() {
                    self.client.set_scroll_offset(offset);
                } else {
                    writeln!(self.out, "No document open.")?;
                }
            }
            Command::Toc => self.print_toc()?,
            Command::Show => self.print_document()?,
            Command::Close => {
                self.client.close_document();
                writeln!(self.out, "Closed.")?;
            }
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    fn open(&mut self, path: &Path) -> io::Result<()> {
        let outcome = self.client.open_path(path);
        if outcome == OpenOutcome::Failed {
            writeln!(self.out, "Could not open {}.", path.display())?;
            return Ok(());
        }
        self.report_open(outcome)
    }

    fn handle_event(&mut self, event: WatchEvent) -> io::Result<()> {
        let path = event.path().to_path_buf();

        match self.client.handle_event(event) {
            Reconciliation::DocumentRefreshed => {
                writeln!(self.out, "{} changed on disk and was reloaded.", path.display())?;
                if let Some(offset) = self.client.saved_scroll_offset(&path) {
                    if offset > 0.0 {
                        writeln!(self.out, "(previously scrolled to {offset})")?;
                    }
                }
            }
            Reconciliation::DirectoryRefreshed => self.print_tree()?,
            Reconciliation::Stale => {}
        }

        Ok(())
    }

    fn report_open(&mut self, outcome: OpenOutcome) -> io::Result<()> {
        match outcome {
            OpenOutcome::Opened => {
                if let Some(document) = self.client.document() {
                    writeln!(self.out, "Opened {}.", document.path.display())?;
                }
                if self.client.current_directory().is_some() {
                    self.print_tree()?;
                }
                Ok(())
            }
            OpenOutcome::Cancelled => writeln!(self.out, "Cancelled."),
            OpenOutcome::Failed => writeln!(self.out, "Could not open that entry."),
        }
    }

    /// Sidebar arguments are relative to the browsed directory.
    fn sidebar_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        match self.client.current_directory() {
            Some(root) if path.is_relative() => Ok(root.join(path)),
            _ => resolve_path(path),
        }
    }

    fn print_tree(&mut self) -> io::Result<()> {
        let Some(root) = self.client.current_directory() else {
            return writeln!(self.out, "No directory open.");
        };
        writeln!(self.out, "{}", root.display())?;

        let tree = self.client.tree();
        if let Some(hint) = listing_hint(tree.entries()) {
            writeln!(self.out, "  {}", hint.message())?;
        }

        let open = self.client.document().map(|document| document.path.as_path());
        for row in tree.rows() {
            let marker = match (row.entry.is_directory, row.expanded) {
                (true, true) => "v ",
                (true, false) => "> ",
                (false, _) if Some(row.entry.path.as_path()) == open => "* ",
                (false, _) => "  ",
            };
            let suffix = if row.entry.is_directory { "/" } else { "" };

            writeln!(
                self.out,
                "  {}{}{}{}",
                "  ".repeat(row.depth),
                marker,
                row.entry.name,
                suffix
            )?;
        }

        Ok(())
    }

    fn print_recent(&mut self) -> io::Result<()> {
        let entries = self.client.recent_entries();
        if entries.is_empty() {
            return writeln!(self.out, "No recent entries.");
        }

        for (index, entry) in entries.iter().enumerate() {
            writeln!(
                self.out,
                "{:>3}. {} ({})",
                index + 1,
                entry.name,
                entry.path.display()
            )?;
        }

        Ok(())
    }

    fn print_toc(&mut self) -> io::Result<()> {
        let Some(document) = self.client.document() else {
            return writeln!(self.out, "No document open.");
        };

        let headings = extract_headings(&document.content);
        if headings.is_empty() {
            return writeln!(self.out, "No headings.");
        }

        for heading in headings {
            let indent = "  ".repeat(usize::from(heading.level.saturating_sub(1)));
            writeln!(self.out, "{indent}- {} (#{})", heading.text, heading.id)?;
        }

        Ok(())
    }

    fn print_document(&mut self) -> io::Result<()> {
        let Some(document) = self.client.document() else {
            return writeln!(self.out, "No document open.");
        };

        writeln!(self.out, "== {} ==", document.path.display())?;
        writeln!(self.out, "{}", document.content)?;

        let sources = extract_image_sources(&document.content);
        if !sources.is_empty() {
            let base = self
                .client
                .base_path()
                .map(|base| base.to_string_lossy().into_owned());

            writeln!(self.out, "Images:")?;
            for source in sources {
                writeln!(self.out, "  {}", resolve_image_src(Some(&source), base.as_deref()))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    #[test]
    fn parses_commands_with_and_without_arguments() {
        assert_eq!(parse_command("  "), Ok(Command::Nothing));
        assert_eq!(parse_command("open"), Ok(Command::Open(None)));
        assert_eq!(
            parse_command("open  my notes.md "),
            Ok(Command::Open(Some(PathBuf::from("my notes.md"))))
        );
        assert_eq!(parse_command("recent 2"), Ok(Command::Recent(Some(2))));
        assert_eq!(parse_command("scroll 12.5"), Ok(Command::Scroll(12.5)));
        assert_eq!(parse_command("scroll -3"), Ok(Command::Scroll(0.0)));
        assert_eq!(parse_command("exit"), Ok(Command::Quit));
    }

    #[test]
    fn rejects_bad_commands() {
        assert_eq!(
            parse_command("expand"),
            Err(CommandParseError::MissingArgument { command: "expand" })
        );
        assert_eq!(
            parse_command("recent 0"),
            Err(CommandParseError::InvalidNumber {
                command: "recent",
                value: "0".to_owned(),
            })
        );
        assert_eq!(
            parse_command("scroll NaN"),
            Err(CommandParseError::InvalidNumber {
                command: "scroll",
                value: "NaN".to_owned(),
            })
        );
        assert_eq!(
            parse_command("frobnicate"),
            Err(CommandParseError::Unknown("frobnicate".to_owned()))
        );
    }

    struct Fixture {
        dir: TempDir,
        shell: Shell<LocalHost, MemoryStore, Vec<u8>>,
        input: Sender<String>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            fs_err::write(dir.path().join("readme.md"), "# Readme\n\n![logo](img/logo.png)\n")
                .unwrap();
            fs_err::create_dir(dir.path().join("guides")).unwrap();
            fs_err::write(dir.path().join("guides").join("intro.md"), "## Intro\n").unwrap();

            let (host, _events) = LocalHost::new(Default::default());
            let (input, lines) = crossbeam_channel::unbounded();
            let shell = Shell::new(SyncClient::new(host, MemoryStore::new()), lines, Vec::new());

            Self { dir, shell, input }
        }

        fn run(&mut self, line: &str) -> String {
            self.shell.out.clear();
            self.shell.execute(line).unwrap();
            String::from_utf8(self.shell.out.clone()).unwrap()
        }
    }

    #[test]
    fn browsing_and_expanding() {
        let mut fixture = Fixture::new();
        let root = fixture.dir.path().display().to_string();

        let listing = fixture.run(&format!("dir {root}"));
        assert!(listing.contains("> guides/"));
        assert!(listing.contains("readme.md"));

        let expanded = fixture.run("expand guides");
        assert!(expanded.contains("v guides/"));
        assert!(expanded.contains("intro.md"));

        let missing = fixture.run("expand nowhere");
        assert!(missing.contains("is not a folder in the sidebar"));
    }

    #[test]
    fn missing_directory_is_reported_and_not_browsed() {
        let mut fixture = Fixture::new();
        let missing = fixture.dir.path().join("gone").display().to_string();

        assert!(fixture.run(&format!("dir {missing}")).contains("Could not open"));
        assert!(fixture.shell.client.current_directory().is_none());
        assert!(fixture.run("recent").contains("No recent entries."));
    }

    #[test]
    fn selecting_a_file_shows_outline_and_images() {
        let mut fixture = Fixture::new();
        let root = fixture.dir.path().display().to_string();
        fixture.run(&format!("dir {root}"));

        let opened = fixture.run("select readme.md");
        assert!(opened.contains("* readme.md"));

        assert_eq!(fixture.run("toc"), "- Readme (#readme)\n");

        let shown = fixture.run("show");
        assert!(shown.contains("# Readme"));
        assert!(shown.contains("file:///"));
        assert!(shown.contains("img/logo.png"));
    }

    #[test]
    fn prompt_reads_next_line_and_empty_cancels() {
        let mut fixture = Fixture::new();

        fixture.input.send(String::new()).unwrap();
        assert!(fixture.run("open").contains("Cancelled."));

        let readme = fixture.dir.path().join("readme.md");
        fixture.input.send(readme.display().to_string()).unwrap();
        let opened = fixture.run("open");
        assert!(opened.contains("Opened"));
        assert!(fixture.shell.client.document().is_some());
    }

    #[test]
    fn recent_lists_and_reopens() {
        let mut fixture = Fixture::new();
        let root = fixture.dir.path().display().to_string();
        fixture.run(&format!("open {root}"));
        fixture.run("select readme.md");
        fixture.run("close");

        let listed = fixture.run("recent");
        assert!(listed.contains("1. readme.md"));
        assert!(listed.contains("2. "));

        fixture.run("recent 1");
        assert!(fixture.shell.client.document().is_some());
        assert!(fixture.run("recent 9").contains("no recent entry 9"));
    }

    #[test]
    fn quit_stops_the_loop() {
        let mut fixture = Fixture::new();
        assert_eq!(fixture.shell.execute("quit").unwrap(), Flow::Quit);
        assert_eq!(fixture.shell.execute("help").unwrap(), Flow::Continue);
    }
}
