use crate::command::{Stdin, Stdout, Streams};
use std::cell::RefCell;
use std::io::{Cursor, Read, Result as IoResult, Write};
use std::process::Stdio;
use std::rc::Rc;

/// Memory-backed reader for commands run against a captured console.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl Stdin for MemReader {
    /// Child processes get no input when the console is captured.
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// Memory-backed writer for capturing output.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    /// Writer appending to an existing shared buffer.
    pub fn sharing(buf: Rc<RefCell<Vec<u8>>>) -> Self {
        Self { buf }
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl Stdout for MemWriter {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::null()
    }
}

/// The process's own standard input, handed to children as-is.
struct InheritedStdin(std::io::Stdin);

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

/// Bytes written to a captured console, shared with the interpreter.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    out: Rc<RefCell<Vec<u8>>>,
    err: Rc<RefCell<Vec<u8>>>,
}

impl Captured {
    /// Everything written to standard output so far, lossily decoded.
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.out.borrow()).into_owned()
    }

    /// Everything written to standard error so far, lossily decoded.
    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.err.borrow()).into_owned()
    }

    /// Forget what was captured so far.
    pub fn clear(&self) {
        self.out.borrow_mut().clear();
        self.err.borrow_mut().clear();
    }
}

/// Where the "inherited" streams of a command point.
///
/// [`Console::Process`] is the shell's real stdin/stdout/stderr. A captured
/// console collects builtin output in memory; child processes then get null
/// streams unless the line redirects them to files.
#[derive(Debug, Clone, Default)]
pub enum Console {
    #[default]
    Process,
    Captured(Captured),
}

impl Console {
    /// New captured console plus a handle to read what it collects.
    pub fn captured() -> (Self, Captured) {
        let captured = Captured::default();
        (Self::Captured(captured.clone()), captured)
    }

    pub fn stdin(&self) -> Box<dyn Stdin> {
        match self {
            Self::Process => Box::new(InheritedStdin(std::io::stdin())),
            Self::Captured(_) => Box::new(MemReader::new(Vec::new())),
        }
    }

    pub fn stdout(&self) -> Box<dyn Stdout> {
        match self {
            Self::Process => Box::new(std::io::stdout()),
            Self::Captured(c) => Box::new(MemWriter::sharing(c.out.clone())),
        }
    }

    pub fn stderr(&self) -> Box<dyn Stdout> {
        match self {
            Self::Process => Box::new(std::io::stderr()),
            Self::Captured(c) => Box::new(MemWriter::sharing(c.err.clone())),
        }
    }

    /// All three streams inherited from the console.
    pub fn streams(&self) -> Streams {
        Streams {
            stdin: self.stdin(),
            stdout: self.stdout(),
            stderr: self.stderr(),
        }
    }
}
