//! A small interactive shell.
//!
//! A command line goes through four steps: the [`lexer`] splits it into
//! tokens honoring quotes and backslash escapes, the [`redirect`] module strips
//! `>`, `>>`, `2>` and `2>>` operators and opens their files, and the
//! [`Interpreter`] hands the remaining arguments to the first command factory
//! that recognizes the name: one of the [`BUILTINS`], or an external program
//! found on `PATH`.
//!
//! The public modules [`command`] and [`env`] expose traits and types for
//! implementing your own commands and for interacting with the shell state.
//! Lines come from a [`editor::LineSource`]; [`config`] holds the command-line
//! settings of the `minishell` binary.

mod builtin;
pub mod command;
pub mod config;
pub mod editor;
pub mod env;
pub mod error;
mod external;
mod interpreter;
mod io_adapters;
pub mod lexer;
pub mod redirect;

pub use builtin::BUILTINS;
pub use error::ShellError;
pub use external::{find_in_path, find_on_search_path, resolve_program};
pub use interpreter::{Interpreter, default_commands};
pub use io_adapters::{Captured, Console};
