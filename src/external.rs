use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

/// Command that is not a builtin.
pub struct ExternalCommand {
    program: PathBuf,
    argv: Vec<String>,
}

impl ExternalCommand {
    /// `argv[0]` is what the child sees as its own name.
    pub fn new(program: PathBuf, argv: Vec<String>) -> Self {
        Self { program, argv }
    }

    fn name(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or_default()
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[String],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let program = resolve_program(env, name)?;
        log::debug!("{} resolved to {}", name, program.display());
        let argv = std::iter::once(name.to_string())
            .chain(args.iter().cloned())
            .collect();
        Some(Box::new(ExternalCommand::new(program, argv)))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        streams: Streams,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let Streams {
            stdin,
            stdout,
            mut stderr,
        } = streams;

        // The streams are handed over to the child below; catch the usual
        // failure while stderr can still be written to.
        if let Err(source) = check_executable(&self.program) {
            let err = ShellError::Spawn {
                program: self.name().to_string(),
                source,
            };
            writeln!(stderr, "{}", err)?;
            return Ok(err.status());
        }

        let mut cmd = std::process::Command::new(&self.program);
        set_arg0(&mut cmd, self.name());
        cmd.args(self.argv.iter().skip(1))
            .env_clear()
            .envs(env.vars.iter())
            .current_dir(env.current_dir())
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .stderr(stderr.stdio());

        let exit_status = cmd
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|source| ShellError::Spawn {
                program: self.name().to_string(),
                source,
            })?;
        log::debug!("{} exited with {}", self.program.display(), exit_status);
        Ok(match exit_status.code() {
            Some(x) => x,
            None => terminated_by_signal(exit_status),
        })
    }
}

#[cfg(unix)]
fn set_arg0(cmd: &mut std::process::Command, name: &str) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut std::process::Command, _name: &str) {}

#[cfg(unix)]
fn check_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if fs::metadata(path)?.permissions().mode() & 0o111 == 0 {
        return Err(io::Error::from(io::ErrorKind::PermissionDenied));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_executable(path: &Path) -> io::Result<()> {
    fs::metadata(path).map(|_| ())
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command name to the program to run.
///
/// The search path is consulted first; when it has no match, `name` itself is
/// tried as a path relative to the working directory. Directories never match.
pub fn resolve_program(env: &Environment, name: &str) -> Option<PathBuf> {
    let from_search_path = find_on_search_path(env, name);
    if from_search_path.is_some() {
        return from_search_path;
    }
    if name.is_empty() {
        return None;
    }
    let literal = env.resolve(name);
    is_file_like(&literal).then_some(literal)
}

/// Like [`find_in_path`] with the `PATH` of `env`. Relative entries are taken
/// relative to the shell's working directory.
pub fn find_on_search_path(env: &Environment, name: &str) -> Option<PathBuf> {
    let search_path = env.get_var("PATH")?;
    let dirs = search_dirs(&search_path).map(|dir| {
        if dir.is_relative() {
            env.resolve(dir).components().collect()
        } else {
            dir
        }
    });
    find_in_dirs(dirs, name)
}

/// Search the directories of `search_path` for a non-directory named `name`.
///
/// `search_path` is split on the platform separator. Empty entries are
/// skipped and a trailing separator on an entry is ignored. A `name` that is
/// an absolute path is never looked up. Returns `None` if no directory
/// contains a match, including when `search_path` is empty.
pub fn find_in_path(search_path: &str, name: &str) -> Option<PathBuf> {
    find_in_dirs(search_dirs(search_path), name)
}

/// Non-empty entries of a `PATH`-style list, in order.
pub(crate) fn search_dirs(search_path: &str) -> impl Iterator<Item = PathBuf> + '_ {
    std::env::split_paths(search_path).filter(|dir| !dir.as_os_str().is_empty())
}

fn find_in_dirs(dirs: impl Iterator<Item = PathBuf>, name: &str) -> Option<PathBuf> {
    // Joining an absolute name would discard the directory.
    if name.is_empty() || Path::new(name).has_root() {
        return None;
    }
    dirs.map(|dir| dir.join(name))
        .find(|candidate| is_file_like(candidate))
}

fn is_file_like(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| !meta.is_dir())
}
