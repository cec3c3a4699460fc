use crate::lexer::LexingError;
use crate::redirect::RedirectError;
use std::io;
use thiserror::Error;

/// Errors surfaced while running one command line.
///
/// Most of them are reported to the user and the read loop carries on; see
/// [`ShellError::is_fatal`] for the ones that end the session.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The line could not be split into tokens.
    #[error(transparent)]
    Lexing(#[from] LexingError),
    /// A redirection was malformed or its target could not be opened.
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    /// An external program could not be started.
    #[error("{program}: {}", describe(.source))]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Writing to an output stream failed.
    #[error("write error: {0}")]
    Output(#[from] io::Error),
    /// The line source stopped working.
    #[error("cannot read input: {0}")]
    LineSource(String),
}

impl ShellError {
    /// Whether the shell should terminate instead of reporting and continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Output(_) | Self::LineSource(_))
    }

    /// Exit status recorded for a command that failed with this error.
    pub fn status(&self) -> i32 {
        match self {
            Self::Lexing(_) | Self::Redirect(RedirectError::MissingTarget(_)) => 2,
            Self::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => 126,
            Self::Spawn { .. } => 127,
            _ => 1,
        }
    }
}

/// Short, shell-style description of an I/O error, without the `(os error N)` suffix.
pub fn describe(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        io::ErrorKind::NotADirectory => "Not a directory".to_string(),
        io::ErrorKind::IsADirectory => "Is a directory".to_string(),
        _ => {
            let text = err.to_string();
            match text.find(" (os error") {
                Some(idx) => text[..idx].to_string(),
                None => text,
            }
        }
    }
}
