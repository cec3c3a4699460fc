use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Streams};
use crate::env::Environment;
use crate::error::{ShellError, describe};
use crate::external::find_on_search_path;
use crate::interpreter::Factory;
use std::io::Write;
use std::path::Path;

/// Names of every builtin, in registration order.
pub const BUILTINS: [&str; 5] = ["exit", "echo", "type", "pwd", "cd"];

/// Built-in commands known to the shell at compile time.
///
/// Builtins take their operands verbatim and run in-process, sharing the
/// [`Environment`] with the shell.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Build the command from its operands (the name is not included).
    fn from_args(args: &[String]) -> Self;

    /// Executes the command using provided output streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(
        self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut streams: Streams,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let result =
            <T as BuiltinCommand>::execute(*self, &mut streams.stdout, &mut streams.stderr, env);
        streams.stdout.flush()?;
        match result {
            Err(e) if !e.is_fatal() => {
                writeln!(streams.stderr, "{}", e)?;
                Ok(e.status())
            }
            other => other,
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[String],
    ) -> Option<Box<dyn ExecutableCommand>> {
        (name == T::name()).then(|| Box::new(T::from_args(args)) as Box<dyn ExecutableCommand>)
    }
}

/// Print the current working directory to standard output.
pub struct Pwd;

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn from_args(_args: &[String]) -> Self {
        Pwd
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        writeln!(stdout, "{}", env.current_dir().display())?;
        Ok(0)
    }
}

/// Change the current working directory.
///
/// `~` stands for `$HOME`, which is also the target when none is given.
pub struct Cd {
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn from_args(args: &[String]) -> Self {
        Cd {
            target: args.first().cloned(),
        }
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let mut dir = self.target.unwrap_or_else(|| "~".to_string());
        if dir == "~" {
            if let Some(home) = env.get_var("HOME").filter(|h| !h.is_empty()) {
                dir = home;
            }
        }

        match env.change_dir(Path::new(&dir)) {
            Ok(()) => Ok(0),
            Err(e) => {
                writeln!(stderr, "cd: {}: {}", dir, describe(&e))?;
                Ok(1)
            }
        }
    }
}

/// Exit the shell.
///
/// A missing or non-numeric code means 0.
pub struct Exit {
    pub code: ExitCode,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn from_args(args: &[String]) -> Self {
        let code = args
            .first()
            .and_then(|arg| arg.parse().ok())
            .unwrap_or(0);
        Exit { code }
    }

    fn execute(
        self,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        env.request_exit(self.code);
        Ok(self.code)
    }
}

/// Write the arguments to standard output, separated by spaces and
/// followed by a newline.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn from_args(args: &[String]) -> Self {
        Echo {
            args: args.to_vec(),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        writeln!(stdout, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

/// Tell how each name would be interpreted if used as a command.
pub struct Type {
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn from_args(args: &[String]) -> Self {
        Type {
            names: args.to_vec(),
        }
    }

    fn execute(
        self,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode, ShellError> {
        let mut status = 0;
        for name in &self.names {
            if BUILTINS.contains(&name.as_str()) {
                writeln!(stdout, "{} is a shell builtin", name)?;
            } else if let Some(path) = find_on_search_path(env, name) {
                writeln!(stdout, "{} is {}", name, path.display())?;
            } else {
                writeln!(stdout, "{}: not found", name)?;
                status = 1;
            }
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    struct Output {
        code: ExitCode,
        stdout: String,
        stderr: String,
    }

    fn run<T: BuiltinCommand>(args: &[&str], env: &mut Environment) -> Output {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let code = T::from_args(&args)
            .execute(&mut out, &mut err, env)
            .expect("builtin failed");
        Output {
            code,
            stdout: String::from_utf8(out).unwrap(),
            stderr: String::from_utf8(err).unwrap(),
        }
    }

    fn temp_env() -> (tempfile::TempDir, PathBuf, Environment) {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        let env = Environment::isolated(HashMap::new(), &root);
        (tmp, root, env)
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let (_tmp, root, mut env) = temp_env();
        let out = run::<Pwd>(&[], &mut env);
        assert_eq!(out.code, 0);
        assert_eq!(out.stdout, format!("{}\n", root.display()));
    }

    #[test]
    fn test_echo_joins_with_spaces() {
        let (_tmp, _root, mut env) = temp_env();
        assert_eq!(run::<Echo>(&["hello", "world"], &mut env).stdout, "hello world\n");
        assert_eq!(run::<Echo>(&[], &mut env).stdout, "\n");
        assert_eq!(run::<Echo>(&["a  b", "-n"], &mut env).stdout, "a  b -n\n");
    }

    #[test]
    fn test_cd_to_absolute_and_relative_path() {
        let (_tmp, root, mut env) = temp_env();
        fs::create_dir(root.join("inner")).unwrap();

        let out = run::<Cd>(&[root.join("inner").to_str().unwrap()], &mut env);
        assert_eq!(out.code, 0);
        assert_eq!(env.current_dir(), root.join("inner"));

        run::<Cd>(&[".."], &mut env);
        assert_eq!(env.current_dir(), root);

        run::<Cd>(&["./inner"], &mut env);
        assert_eq!(env.current_dir(), root.join("inner"));
    }

    #[test]
    fn test_cd_tilde_uses_home() {
        let (_tmp, root, mut env) = temp_env();
        fs::create_dir(root.join("home")).unwrap();
        env.set_var("HOME", root.join("home").to_str().unwrap());

        run::<Cd>(&["~"], &mut env);
        assert_eq!(env.current_dir(), root.join("home"));

        run::<Cd>(&[".."], &mut env);
        run::<Cd>(&[], &mut env);
        assert_eq!(env.current_dir(), root.join("home"));
    }

    #[test]
    fn test_cd_tilde_without_home_is_literal() {
        let (_tmp, root, mut env) = temp_env();
        let out = run::<Cd>(&["~"], &mut env);
        assert_eq!(out.code, 1);
        assert_eq!(out.stderr, "cd: ~: No such file or directory\n");
        assert_eq!(env.current_dir(), root);
    }

    #[test]
    fn test_cd_nonexistent_path_reports() {
        let (_tmp, root, mut env) = temp_env();
        let out = run::<Cd>(&["/nonexistent_dir_for_cd_test"], &mut env);
        assert_eq!(out.code, 1);
        assert_eq!(out.stdout, "");
        assert_eq!(
            out.stderr,
            "cd: /nonexistent_dir_for_cd_test: No such file or directory\n"
        );
        assert_eq!(env.current_dir(), root);
    }

    #[test]
    fn test_cd_into_file_reports() {
        let (_tmp, root, mut env) = temp_env();
        fs::write(root.join("file.txt"), "x").unwrap();
        let out = run::<Cd>(&["file.txt"], &mut env);
        assert_eq!(out.code, 1);
        assert_eq!(out.stderr, "cd: file.txt: Not a directory\n");
    }

    #[test]
    fn test_exit_codes() {
        let (_tmp, _root, mut env) = temp_env();
        assert_eq!(run::<Exit>(&["3"], &mut env).code, 3);
        assert_eq!(env.exit_request(), Some(3));

        let (_tmp, _root, mut env) = temp_env();
        assert_eq!(run::<Exit>(&[], &mut env).code, 0);
        assert_eq!(env.exit_request(), Some(0));

        let (_tmp, _root, mut env) = temp_env();
        assert_eq!(run::<Exit>(&["abc"], &mut env).code, 0);
        assert_eq!(env.exit_request(), Some(0));
    }

    #[test]
    #[cfg(unix)]
    fn test_type_reports_builtins_paths_and_missing() {
        let (_tmp, _root, mut env) = temp_env();
        env.set_var("PATH", "/nonexistent:/bin");

        let out = run::<Type>(&["cd"], &mut env);
        assert_eq!(out.stdout, "cd is a shell builtin\n");
        assert_eq!(out.code, 0);

        let out = run::<Type>(&["sh"], &mut env);
        assert_eq!(out.stdout, "sh is /bin/sh\n");

        let out = run::<Type>(&["nonexistent-cmd-xyz"], &mut env);
        assert_eq!(out.stdout, "nonexistent-cmd-xyz: not found\n");
        assert_eq!(out.stderr, "");
        assert_eq!(out.code, 1);

        let out = run::<Type>(&["echo", "type", "exit", "pwd"], &mut env);
        assert_eq!(
            out.stdout,
            "echo is a shell builtin\ntype is a shell builtin\nexit is a shell builtin\npwd is a shell builtin\n"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_type_does_not_search_path_for_absolute_names() {
        let (_tmp, _root, mut env) = temp_env();
        env.set_var("PATH", "/nonexistent-dir-xyz");
        let out = run::<Type>(&["/bin/sh"], &mut env);
        assert_eq!(out.stdout, "/bin/sh: not found\n");
        assert_eq!(out.code, 1);
    }

    #[test]
    fn test_type_reads_path_on_every_call() {
        let (_tmp, root, mut env) = temp_env();
        fs::create_dir(root.join("bin")).unwrap();
        fs::write(root.join("bin").join("mytool"), "").unwrap();

        assert_eq!(run::<Type>(&["mytool"], &mut env).stdout, "mytool: not found\n");

        env.set_var("PATH", root.join("bin").to_str().unwrap());
        assert_eq!(
            run::<Type>(&["mytool"], &mut env).stdout,
            format!("mytool is {}\n", root.join("bin").join("mytool").display())
        );
    }

    #[test]
    fn test_factory_matches_only_its_name() {
        let (_tmp, _root, env) = temp_env();
        assert!(Factory::<Echo>::default().try_create(&env, "echo", &[]).is_some());
        assert!(Factory::<Echo>::default().try_create(&env, "ECHO", &[]).is_none());
        assert!(Factory::<Pwd>::default().try_create(&env, "echo", &[]).is_none());
    }
}
