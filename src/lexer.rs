//! Lexical analysis of a single command line into argument strings.
//!
//! The lexer is a small finite state machine. It understands single quotes,
//! double quotes and backslash escapes the way a POSIX shell does, but performs
//! no expansion of any kind: every token comes out as a plain string.

use thiserror::Error;

/// How the lexer treats a line that ends while a quote is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteMode {
    /// Accept the accumulated content as the final token.
    #[default]
    Lenient,
    /// Reject the line with [`LexingError::UnterminatedQuote`].
    Strict,
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("unexpected EOF while looking for matching `{0}'")]
    UnterminatedQuote(char),
}

/// Quote context a backslash was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeOrigin {
    Bare,
    DoubleQuoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Bare,
    SingleQuoted,
    DoubleQuoted,
    Escaped(EscapeOrigin),
}

struct LexingFSM {
    state: LexingState,
    tokens: Vec<String>,
    buffer: String,
    // Set once a quote was opened, so that `''` still yields a token.
    in_token: bool,
}

impl LexingFSM {
    fn new() -> Self {
        LexingFSM {
            state: LexingState::Bare,
            tokens: Vec::new(),
            buffer: String::new(),
            in_token: false,
        }
    }

    /// Feeds every character of `line` through the machine and returns the tokens.
    fn make_tokens(mut self, line: &str, mode: QuoteMode) -> Result<Vec<String>, LexingError> {
        for ch in line.chars() {
            match self.state {
                LexingState::Bare => self.handle_bare(ch),
                LexingState::SingleQuoted => self.handle_single_quote(ch),
                LexingState::DoubleQuoted => self.handle_double_quote(ch),
                LexingState::Escaped(origin) => self.handle_escaped(ch, origin),
            }
        }

        match self.state {
            LexingState::SingleQuoted if mode == QuoteMode::Strict => {
                return Err(LexingError::UnterminatedQuote('\''));
            }
            LexingState::DoubleQuoted | LexingState::Escaped(EscapeOrigin::DoubleQuoted)
                if mode == QuoteMode::Strict =>
            {
                return Err(LexingError::UnterminatedQuote('"'));
            }
            // A trailing backslash has nothing left to escape.
            LexingState::Escaped(_) => {
                self.buffer.push('\\');
                self.in_token = true;
            }
            _ => {}
        }

        self.finish_token();
        Ok(self.tokens)
    }

    fn handle_bare(&mut self, ch: char) {
        match ch {
            '\\' => self.state = LexingState::Escaped(EscapeOrigin::Bare),
            '\'' => {
                self.in_token = true;
                self.state = LexingState::SingleQuoted;
            }
            '"' => {
                self.in_token = true;
                self.state = LexingState::DoubleQuoted;
            }
            c if c.is_whitespace() => self.finish_token(),
            c => {
                self.in_token = true;
                self.buffer.push(c);
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Bare,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Bare,
            '\\' => self.state = LexingState::Escaped(EscapeOrigin::DoubleQuoted),
            c => self.buffer.push(c),
        }
    }

    fn handle_escaped(&mut self, ch: char, origin: EscapeOrigin) {
        match origin {
            EscapeOrigin::Bare => {
                self.in_token = true;
                self.buffer.push(ch);
                self.state = LexingState::Bare;
            }
            EscapeOrigin::DoubleQuoted => {
                if !matches!(ch, '\\' | '"' | '$' | '\n') {
                    self.buffer.push('\\');
                }
                self.buffer.push(ch);
                self.state = LexingState::DoubleQuoted;
            }
        }
    }

    fn finish_token(&mut self) {
        if self.in_token {
            self.tokens.push(std::mem::take(&mut self.buffer));
            self.in_token = false;
        }
    }
}

/// Splits one input line into argument tokens.
///
/// Whitespace outside quotes separates tokens, adjacent quoted and unquoted
/// pieces are glued into a single token, and a blank line yields no tokens.
///
/// # Errors
/// Returns [`LexingError::UnterminatedQuote`] only in [`QuoteMode::Strict`].
pub fn split_into_tokens(line: &str, mode: QuoteMode) -> Result<Vec<String>, LexingError> {
    let tokens = LexingFSM::new().make_tokens(line, mode)?;
    log::debug!("tokens = {:?}", tokens);
    Ok(tokens)
}
