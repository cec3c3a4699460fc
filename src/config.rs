use crate::lexer::QuoteMode;
use argh::FromArgs;
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(FromArgs, Debug)]
/// A small interactive shell with builtins, PATH lookup and output redirection.
pub struct Args {
    #[argh(option, default = "String::from(\"$ \")")]
    /// prompt shown before every line.
    pub prompt: String,

    #[argh(switch)]
    /// reject lines with an unterminated quote instead of closing it at the end of the line.
    pub strict_quotes: bool,

    #[argh(option)]
    /// file the command history is loaded from and saved to.
    pub history_file: Option<PathBuf>,

    #[argh(switch)]
    /// read plain lines from stdin even when it is a terminal.
    pub no_editor: bool,

    #[argh(option, short = 'c')]
    /// run this single command line and exit with its status.
    pub command: Option<String>,
}

/// Settings of one shell session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub prompt: String,
    pub quote_mode: QuoteMode,
    pub history_file: Option<PathBuf>,
    pub editor: bool,
    pub command: Option<String>,
}

impl ShellConfig {
    /// Whether lines should come from the interactive editor.
    pub fn use_editor(&self) -> bool {
        self.editor && std::io::stdin().is_terminal()
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            quote_mode: QuoteMode::Lenient,
            history_file: None,
            editor: true,
            command: None,
        }
    }
}

impl From<Args> for ShellConfig {
    fn from(args: Args) -> Self {
        Self {
            prompt: args.prompt,
            quote_mode: if args.strict_quotes {
                QuoteMode::Strict
            } else {
                QuoteMode::Lenient
            },
            history_file: args.history_file,
            editor: !args.no_editor,
            command: args.command,
        }
    }
}
