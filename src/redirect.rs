//! Output and error stream redirection.
//!
//! [`extract`] pulls the redirection operators out of a token list and
//! [`RedirectPlan::open`] turns what it found into the streams of one
//! command invocation.

use crate::command::{Stdout, Streams};
use crate::env::Environment;
use crate::error::describe;
use crate::io_adapters::Console;
use regex::Regex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::sync::LazyLock;
use thiserror::Error;

// `>`, `>>` and their explicit `1`/`2` descriptor forms. Nothing else.
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([12]?)(>>?)$").expect("redirection operator pattern"));

/// A recognized redirection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectOp {
    /// `>` or `1>`
    StdoutTruncate,
    /// `>>` or `1>>`
    StdoutAppend,
    /// `2>`
    StderrTruncate,
    /// `2>>`
    StderrAppend,
}

impl RedirectOp {
    /// Recognize `token` as an operator. Only exact matches count.
    pub fn parse(token: &str) -> Option<Self> {
        let caps = OPERATOR_RE.captures(token)?;
        let stderr = caps.get(1).is_some_and(|fd| fd.as_str() == "2");
        let append = caps.get(2).is_some_and(|op| op.as_str() == ">>");
        Some(match (stderr, append) {
            (false, false) => Self::StdoutTruncate,
            (false, true) => Self::StdoutAppend,
            (true, false) => Self::StderrTruncate,
            (true, true) => Self::StderrAppend,
        })
    }

    pub fn is_stderr(self) -> bool {
        matches!(self, Self::StderrTruncate | Self::StderrAppend)
    }

    pub fn is_append(self) -> bool {
        matches!(self, Self::StdoutAppend | Self::StderrAppend)
    }
}

impl fmt::Display for RedirectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::StdoutTruncate => ">",
            Self::StdoutAppend => ">>",
            Self::StderrTruncate => "2>",
            Self::StderrAppend => "2>>",
        };
        f.write_str(symbol)
    }
}

/// Errors raised while extracting or applying redirections.
#[derive(Debug, Error)]
pub enum RedirectError {
    /// An operator was the last token of the line.
    #[error("syntax error: missing redirection target after `{0}'")]
    MissingTarget(RedirectOp),
    /// The target file could not be opened.
    #[error("{path}: {}", describe(.source))]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// One operator with its target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub op: RedirectOp,
    pub target: String,
}

impl Redirection {
    fn open(&self, env: &Environment) -> Result<File, RedirectError> {
        let path = env.resolve(&self.target);
        let mut options = OpenOptions::new();
        if self.op.is_append() {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        log::debug!("opening {} for `{}'", path.display(), self.op);
        options
            .create(true)
            .open(&path)
            .map_err(|source| RedirectError::Open {
                path: self.target.clone(),
                source,
            })
    }
}

/// The active redirections of one command line.
///
/// stdin has no operator and is always inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectPlan {
    pub stdout: Option<Redirection>,
    pub stderr: Option<Redirection>,
}

impl RedirectPlan {
    /// Open the redirection targets, falling back to `console` for the rest.
    ///
    /// stdout is opened before stderr; if opening stderr fails, the already
    /// opened stdout file is closed again before returning.
    pub fn open(&self, env: &Environment, console: &Console) -> Result<Streams, RedirectError> {
        let stdout: Box<dyn Stdout> = match &self.stdout {
            Some(r) => Box::new(r.open(env)?),
            None => console.stdout(),
        };
        let stderr: Box<dyn Stdout> = match &self.stderr {
            Some(r) => Box::new(r.open(env)?),
            None => console.stderr(),
        };
        Ok(Streams {
            stdin: console.stdin(),
            stdout,
            stderr,
        })
    }
}

/// Strip redirections from `tokens`.
///
/// Everything from the leftmost operator onwards is removed from the returned
/// arguments. The first stdout operator and the first stderr operator of the
/// whole line are the active ones; later ones of the same stream are ignored.
/// The token after each operator is its target, even if it looks like an
/// operator itself.
///
/// # Errors
/// [`RedirectError::MissingTarget`] if an operator ends the line.
pub fn extract(mut tokens: Vec<String>) -> Result<(Vec<String>, RedirectPlan), RedirectError> {
    let mut plan = RedirectPlan::default();
    let mut cut: Option<usize> = None;

    let mut idx = 0;
    while let Some(token) = tokens.get(idx) {
        let Some(op) = RedirectOp::parse(token) else {
            idx += 1;
            continue;
        };
        let target = tokens
            .get(idx + 1)
            .ok_or(RedirectError::MissingTarget(op))?;
        cut.get_or_insert(idx);

        let slot = if op.is_stderr() {
            &mut plan.stderr
        } else {
            &mut plan.stdout
        };
        if slot.is_none() {
            *slot = Some(Redirection {
                op,
                target: target.clone(),
            });
        }
        idx += 2;
    }

    if let Some(cut) = cut {
        tokens.truncate(cut);
    }
    Ok((tokens, plan))
}
