use crate::command::{CommandFactory, ExitCode, Streams};
use crate::editor::{LineSource, ReadOutcome};
use crate::env::Environment;
use crate::error::ShellError;
use crate::io_adapters::Console;
use crate::lexer::{self, QuoteMode};
use crate::redirect;
use std::io::Write;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate: BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The builtins, in the order of [`BUILTINS`](crate::BUILTINS), followed by
/// the external command launcher.
pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Type>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried, in order, to create commands by name. See [`Default`] for the
/// factories included out of the box.
///
/// Example
/// ```
/// use minishell::{Console, Interpreter};
/// let (console, captured) = Console::captured();
/// let mut sh = Interpreter::default().with_console(console);
/// let code = sh.execute_line("echo 'hello   world'").unwrap();
/// assert_eq!(code, 0);
/// assert_eq!(captured.stdout(), "hello   world\n");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    console: Console,
    quote_mode: QuoteMode,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(env: Environment, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env,
            commands,
            console: Console::Process,
            quote_mode: QuoteMode::Lenient,
        }
    }

    /// Interpreter with the default commands running in `env`.
    pub fn with_env(env: Environment) -> Self {
        Self::new(env, default_commands())
    }

    /// Use `console` for every stream a command line does not redirect.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn with_quote_mode(mut self, mode: QuoteMode) -> Self {
        self.quote_mode = mode;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Exit code of the most recent command.
    pub fn last_status(&self) -> ExitCode {
        self.env.last_status
    }

    /// Set once `exit` has run; the caller should stop feeding lines.
    pub fn exit_request(&self) -> Option<ExitCode> {
        self.env.exit_request()
    }

    /// Tokenize, redirect and run one command line.
    ///
    /// Problems the user caused (bad quoting, unknown commands, unreadable
    /// redirection targets, ...) are reported on the console or the
    /// redirected streams and turned into an exit code. A blank line runs
    /// nothing and keeps the previous status.
    ///
    /// # Errors
    /// Only [fatal](ShellError::is_fatal) errors are returned.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode, ShellError> {
        let status = match self.prepare(line) {
            Ok(None) => return Ok(self.env.last_status),
            Ok(Some((args, streams))) => match self.dispatch(&args, streams) {
                Ok(status) => status,
                Err(e) => self.report(e)?,
            },
            Err(e) => self.report(e)?,
        };
        self.env.last_status = status;
        Ok(status)
    }

    /// Read and execute lines until end of input, an interrupt on an empty
    /// line, or `exit`.
    ///
    /// Returns the code the shell process should exit with.
    pub fn repl(
        &mut self,
        source: &mut dyn LineSource,
        prompt: &str,
    ) -> Result<ExitCode, ShellError> {
        loop {
            let outcome = source
                .read_line(prompt)
                .map_err(|e| ShellError::LineSource(format!("{:#}", e)))?;
            let line = match outcome {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => {
                    log::debug!("interrupted on an empty line, leaving");
                    return Ok(0);
                }
                ReadOutcome::Eof => {
                    log::debug!("end of input");
                    return Ok(0);
                }
            };

            self.execute_line(&line)?;
            if let Some(code) = self.env.exit_request() {
                return Ok(code);
            }
        }
    }

    fn prepare(&self, line: &str) -> Result<Option<(Vec<String>, Streams)>, ShellError> {
        let tokens = lexer::split_into_tokens(line, self.quote_mode)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        let (args, plan) = redirect::extract(tokens)?;
        let streams = plan.open(&self.env, &self.console)?;
        Ok(Some((args, streams)))
    }

    fn dispatch(&mut self, args: &[String], mut streams: Streams) -> Result<ExitCode, ShellError> {
        // A line of only redirections creates the files and runs nothing.
        let Some((name, rest)) = args.split_first() else {
            return Ok(0);
        };
        log::debug!("dispatching {:?}", args);

        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, rest) {
                return cmd.execute(streams, &mut self.env);
            }
        }

        writeln!(streams.stdout, "{}: command not found", name)?;
        streams.stdout.flush()?;
        Ok(127)
    }

    fn report(&self, err: ShellError) -> Result<ExitCode, ShellError> {
        if err.is_fatal() {
            return Err(err);
        }
        log::debug!("reporting {:?}", err);
        let mut stderr = self.console.stderr();
        writeln!(stderr, "{}", err)?;
        stderr.flush()?;
        Ok(err.status())
    }
}

impl Default for Interpreter {
    /// Create an interpreter bound to the current process with the default
    /// set of commands:
    /// - built-ins: `exit`, `echo`, `type`, `pwd`, `cd`
    /// - external command launcher
    fn default() -> Self {
        Self::with_env(Environment::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::BUILTINS;
    use crate::editor::BufReadSource;
    use crate::io_adapters::Captured;
    use std::collections::HashMap;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn shell() -> (tempfile::TempDir, PathBuf, Interpreter, Captured) {
        let tmp = tempfile::tempdir().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        let mut vars = HashMap::new();
        vars.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        let (console, captured) = Console::captured();
        let sh = Interpreter::with_env(Environment::isolated(vars, &root)).with_console(console);
        (tmp, root, sh, captured)
    }

    #[test]
    fn test_every_builtin_has_a_factory() {
        let (_tmp, _root, sh, _captured) = shell();
        for name in BUILTINS {
            let created = sh
                .commands
                .iter()
                .take(BUILTINS.len())
                .any(|f| f.try_create(&sh.env, name, &[]).is_some());
            assert!(created, "no factory for {}", name);
        }
    }

    #[test]
    fn test_blank_line_keeps_status() {
        let (_tmp, _root, mut sh, captured) = shell();
        sh.execute_line("nonexistent-cmd-xyz").unwrap();
        assert_eq!(sh.execute_line("   \t ").unwrap(), 127);
        assert_eq!(captured.stdout(), "nonexistent-cmd-xyz: command not found\n");
    }

    #[test]
    fn test_echo_with_quotes() {
        let (_tmp, _root, mut sh, captured) = shell();
        sh.execute_line(r#"echo "a  b" 'c\d' e\ f"#).unwrap();
        assert_eq!(captured.stdout(), "a  b c\\d e f\n");
    }

    #[test]
    fn test_redirect_builtin_output_to_file() {
        let (_tmp, root, mut sh, captured) = shell();
        sh.execute_line("echo first > out.txt").unwrap();
        sh.execute_line("echo second 1>> out.txt").unwrap();
        assert_eq!(fs::read_to_string(root.join("out.txt")).unwrap(), "first\nsecond\n");
        assert_eq!(captured.stdout(), "");
    }

    #[test]
    fn test_command_not_found_goes_to_redirected_stdout() {
        let (_tmp, root, mut sh, captured) = shell();
        let code = sh.execute_line("nonexistent-cmd-xyz arg > nf.txt").unwrap();
        assert_eq!(code, 127);
        assert_eq!(
            fs::read_to_string(root.join("nf.txt")).unwrap(),
            "nonexistent-cmd-xyz: command not found\n"
        );
        assert_eq!(captured.stdout(), "");
    }

    #[test]
    fn test_cd_error_goes_to_redirected_stderr() {
        let (_tmp, root, mut sh, captured) = shell();
        sh.execute_line("cd missing 2> err.txt").unwrap();
        assert_eq!(
            fs::read_to_string(root.join("err.txt")).unwrap(),
            "cd: missing: No such file or directory\n"
        );
        assert_eq!(captured.stderr(), "");
        assert_eq!(sh.last_status(), 1);
    }

    #[test]
    fn test_missing_redirect_target_is_reported() {
        let (_tmp, _root, mut sh, captured) = shell();
        assert_eq!(sh.execute_line("echo hi >").unwrap(), 2);
        assert_eq!(
            captured.stderr(),
            "syntax error: missing redirection target after `>'\n"
        );
        assert_eq!(captured.stdout(), "");
    }

    #[test]
    fn test_unopenable_redirect_target_is_reported() {
        let (_tmp, _root, mut sh, captured) = shell();
        assert_eq!(sh.execute_line("echo hi > no/such/dir/x").unwrap(), 1);
        assert_eq!(captured.stderr(), "no/such/dir/x: No such file or directory\n");
        assert_eq!(captured.stdout(), "");
    }

    #[test]
    fn test_only_redirection_creates_file() {
        let (_tmp, root, mut sh, _captured) = shell();
        assert_eq!(sh.execute_line("> created.txt").unwrap(), 0);
        assert!(root.join("created.txt").exists());
    }

    #[test]
    fn test_strict_quotes_reject_unterminated_input() {
        let (_tmp, _root, sh, captured) = shell();
        let mut sh = sh.with_quote_mode(QuoteMode::Strict);
        assert_eq!(sh.execute_line("echo 'oops").unwrap(), 2);
        assert_eq!(
            captured.stderr(),
            "unexpected EOF while looking for matching `''\n"
        );
        assert_eq!(captured.stdout(), "");
    }

    #[test]
    fn test_repl_stops_at_exit() {
        let (_tmp, _root, mut sh, captured) = shell();
        let input = "echo one\nexit 3\necho never\n";
        let mut source = BufReadSource::new(Cursor::new(input), Vec::new());
        assert_eq!(sh.repl(&mut source, "$ ").unwrap(), 3);
        assert_eq!(captured.stdout(), "one\n");
    }

    #[test]
    fn test_repl_end_of_input_exits_zero() {
        let (_tmp, _root, mut sh, captured) = shell();
        let mut source = BufReadSource::new(Cursor::new("nonexistent-cmd-xyz\necho last"), Vec::new());
        assert_eq!(sh.repl(&mut source, "$ ").unwrap(), 0);
        assert_eq!(
            captured.stdout(),
            "nonexistent-cmd-xyz: command not found\nlast\n"
        );
    }

    struct Scripted {
        outcomes: std::collections::VecDeque<ReadOutcome>,
        reads: usize,
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, _prompt: &str) -> anyhow::Result<ReadOutcome> {
            self.reads += 1;
            Ok(self.outcomes.pop_front().unwrap_or(ReadOutcome::Eof))
        }
    }

    #[test]
    fn test_repl_interrupt_ends_loop_gracefully() {
        let (_tmp, _root, mut sh, captured) = shell();
        let mut source = Scripted {
            outcomes: [
                ReadOutcome::Line("echo a".into()),
                ReadOutcome::Interrupted,
                ReadOutcome::Line("echo never".into()),
            ]
            .into(),
            reads: 0,
        };
        assert_eq!(sh.repl(&mut source, "$ ").unwrap(), 0);
        assert_eq!(source.reads, 2);
        assert_eq!(source.outcomes.len(), 1);
        assert_eq!(captured.stdout(), "a\n");
    }

    #[test]
    fn test_fatal_line_source_error() {
        struct Broken;
        impl LineSource for Broken {
            fn read_line(&mut self, _prompt: &str) -> anyhow::Result<ReadOutcome> {
                anyhow::bail!("terminal went away")
            }
        }
        let (_tmp, _root, mut sh, _captured) = shell();
        let err = sh.repl(&mut Broken, "$ ").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "cannot read input: terminal went away");
    }
}
