use crate::command::ExitCode;
use std::collections::HashMap;
use std::env as stdenv;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Mutable, user-level view of the process state shared by all commands.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `last_status`: exit code of the most recently executed command.
/// - an exit request raised by the `exit` builtin.
///
/// An environment is either bound to the process, in which case changing the
/// directory also changes the directory of the shell process itself, or
/// isolated, which keeps tests from touching global process state.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    current_dir: PathBuf,
    /// Exit code of the last command, in the spirit of `$?`.
    pub last_status: ExitCode,
    exit_request: Option<ExitCode>,
    bound_to_process: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            last_status: 0,
            exit_request: None,
            bound_to_process: true,
        }
    }

    /// Create an environment detached from the process, with exactly `vars`.
    pub fn isolated(vars: HashMap<String, String>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars,
            current_dir: current_dir.into(),
            last_status: 0,
            exit_request: None,
            bound_to_process: false,
        }
    }

    /// Get the value of a variable, or `None` when it is not set.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The working directory commands run in.
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Change the working directory.
    ///
    /// Relative paths are resolved against the current directory. The stored
    /// directory is canonical.
    ///
    /// # Errors
    /// Any I/O error from looking up the target; `NotADirectory` if it is a file.
    pub fn change_dir(&mut self, target: &Path) -> io::Result<()> {
        let new_dir = self.current_dir.join(target);
        if !fs::metadata(&new_dir)?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", new_dir.display()),
            ));
        }
        let canonical = fs::canonicalize(&new_dir)?;
        if self.bound_to_process {
            stdenv::set_current_dir(&canonical)?;
        }
        log::debug!("working directory is now {}", canonical.display());
        self.current_dir = canonical;
        Ok(())
    }

    /// Resolve `path` the way commands running in this environment see it.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        self.current_dir.join(path)
    }

    /// Ask the read loop to stop after the current command.
    pub fn request_exit(&mut self, code: ExitCode) {
        self.exit_request = Some(code);
    }

    /// The code passed to [`Environment::request_exit`], if any.
    pub fn exit_request(&self) -> Option<ExitCode> {
        self.exit_request
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
