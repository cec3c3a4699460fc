//! Line sources feeding the read loop.

use crate::builtin::BUILTINS;
use crate::external::search_dirs;
use anyhow::{Context as _, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Context, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, Movement, RepeatCount,
};
use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// What a line source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One line, without its terminator.
    Line(String),
    /// The user interrupted with nothing typed.
    Interrupted,
    /// No more input.
    Eof,
}

/// Provider of one raw input line per loop iteration.
pub trait LineSource {
    /// Show `prompt` and wait for the next line.
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;
}

/// Line source over any buffered reader, e.g. a pipe or a file.
///
/// The prompt is written to `prompt_out` before every read. A last line
/// without a trailing newline is still returned.
pub struct BufReadSource<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> BufReadSource<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineSource for BufReadSource<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        write!(self.prompt_out, "{}", prompt)?;
        self.prompt_out.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line).context("reading a line")? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(ReadOutcome::Line(line))
    }
}

/// Ctrl-C discards a partly typed line but interrupts an empty one.
struct InterruptHandler;

fn interrupt_action(pending: &str) -> Cmd {
    if pending.is_empty() {
        Cmd::Interrupt
    } else {
        Cmd::Kill(Movement::WholeBuffer)
    }
}

impl ConditionalEventHandler for InterruptHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        Some(interrupt_action(ctx.line()))
    }
}

/// Tab completion of the command word: builtins and programs on the shell's
/// search path.
#[derive(Debug, Default)]
pub struct ShellHelper {
    search_path: String,
}

impl ShellHelper {
    /// `search_path` is the shell's `PATH` value.
    pub fn new(search_path: Option<String>) -> Self {
        Self {
            search_path: search_path.unwrap_or_default(),
        }
    }

    fn command_candidates(&self, prefix: &str) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = BUILTINS
            .iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| name.to_string())
            .collect();

        for dir in search_dirs(&self.search_path) {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                if name.starts_with(prefix) && is_executable(&entry.path()) {
                    names.insert(name.to_string());
                }
            }
        }
        names
    }
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path).is_ok_and(|m| !m.is_dir() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    fs::metadata(path).is_ok_and(|m| !m.is_dir())
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        // Only the first word names a command.
        if before.trim_start().contains(char::is_whitespace) {
            return Ok((pos, Vec::new()));
        }
        let start = before.len() - before.trim_start().len();
        let prefix = &before[start..];

        let candidates = self
            .command_candidates(prefix)
            .into_iter()
            .map(|name| Pair {
                replacement: format!("{} ", name),
                display: name,
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Interactive line editor with history and completion.
pub struct InteractiveEditor {
    editor: Editor<ShellHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl InteractiveEditor {
    /// Set up the editor, loading `history_file` if it exists. Completion
    /// looks for programs on `search_path`.
    pub fn new(history_file: Option<PathBuf>, search_path: Option<String>) -> Result<Self> {
        let mut editor = Editor::new().context("initializing the line editor")?;
        editor.set_helper(Some(ShellHelper::new(search_path)));
        editor.bind_sequence(
            KeyEvent::ctrl('C'),
            EventHandler::Conditional(Box::new(InterruptHandler)),
        );

        if let Some(path) = &history_file {
            if path.exists() {
                if let Err(e) = editor.load_history(path) {
                    log::warn!("cannot load history from {}: {}", path.display(), e);
                }
            }
        }
        Ok(Self {
            editor,
            history_file,
        })
    }
}

impl LineSource for InteractiveEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err).context("reading from the terminal"),
        }
    }
}

impl Drop for InteractiveEditor {
    fn drop(&mut self) {
        if let Some(path) = &self.history_file {
            if let Err(e) = self.editor.save_history(path) {
                log::warn!("cannot save history to {}: {}", path.display(), e);
            }
        }
    }
}
