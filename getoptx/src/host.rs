//! The environment getoptx runs in.
//!
//! A shell builtin would read the positional parameters and assign
//! variables directly. A standalone process can only print, so
//! [`ShellHost`] writes assignments as shell source for the caller to
//! `eval`.

use std::io::{self, IsTerminal, Read, Write};

use crate::error::{GetoptxError, Result};

pub trait Host {
    /// Tokens to classify when none were given on the command line.
    fn positional_params(&mut self) -> Result<Vec<String>>;

    /// Default name for diagnostics, if the host knows one.
    fn script_name(&self) -> Option<String>;

    fn assign_scalar(&mut self, name: &str, value: &str) -> Result<()>;

    /// Evaluate an expression such as `name=( words )`.
    fn eval(&mut self, expr: &str) -> Result<()>;

    fn print(&mut self, line: &str) -> Result<()>;

    fn warn(&mut self, msg: &str);
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split NUL-terminated arguments, as written by `printf '%s\0' "$@"`.
pub fn split_nul_args(buf: &[u8]) -> Result<Vec<String>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    let buf = buf.strip_suffix(b"\0").unwrap_or(buf);
    buf.split(|b| *b == 0)
        .map(|arg| {
            String::from_utf8(arg.to_vec())
                .map_err(|_| GetoptxError::NotUtf8(String::from_utf8_lossy(arg).into_owned()))
        })
        .collect()
}

/// Host for the `getoptx` binary: stdout for results, stderr for
/// diagnostics, stdin for positional parameters.
pub struct ShellHost<O: Write, E: Write> {
    out: O,
    err: E,
}

impl ShellHost<io::Stdout, io::Stderr> {
    pub fn new() -> Self {
        ShellHost {
            out: io::stdout(),
            err: io::stderr(),
        }
    }
}

impl Default for ShellHost<io::Stdout, io::Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Write, E: Write> ShellHost<O, E> {
    pub fn with_streams(out: O, err: E) -> Self {
        ShellHost { out, err }
    }

    pub fn into_streams(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> Host for ShellHost<O, E> {
    fn positional_params(&mut self) -> Result<Vec<String>> {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            log::debug!("stdin is a terminal, no positional parameters");
            return Ok(Vec::new());
        }
        let mut buf = Vec::new();
        stdin.lock().read_to_end(&mut buf)?;
        let params = split_nul_args(&buf)?;
        log::debug!("read {} positional parameters from stdin", params.len());
        Ok(params)
    }

    fn script_name(&self) -> Option<String> {
        None
    }

    fn assign_scalar(&mut self, name: &str, value: &str) -> Result<()> {
        if !is_identifier(name) {
            return Err(GetoptxError::NotIdentifier(name.to_string()));
        }
        writeln!(self.out, "{}={}", name, reparse::quote(value))?;
        self.out.flush()?;
        Ok(())
    }

    fn eval(&mut self, expr: &str) -> Result<()> {
        writeln!(self.out, "{}", expr)?;
        self.out.flush()?;
        Ok(())
    }

    fn print(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }

    fn warn(&mut self, msg: &str) {
        let _ = writeln!(self.err, "{}", msg);
    }
}

/// In-memory host for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryHost {
    pub params: Vec<String>,
    pub script: Option<String>,
    pub scalars: Vec<(String, String)>,
    pub evals: Vec<String>,
    pub printed: Vec<String>,
    pub warnings: Vec<String>,
    pub fail_eval: bool,
}

#[cfg(test)]
impl Host for MemoryHost {
    fn positional_params(&mut self) -> Result<Vec<String>> {
        Ok(self.params.clone())
    }

    fn script_name(&self) -> Option<String> {
        self.script.clone()
    }

    fn assign_scalar(&mut self, name: &str, value: &str) -> Result<()> {
        if !is_identifier(name) {
            return Err(GetoptxError::NotIdentifier(name.to_string()));
        }
        self.scalars.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn eval(&mut self, expr: &str) -> Result<()> {
        if self.fail_eval {
            return Err(GetoptxError::Io(io::Error::new(
                io::ErrorKind::Other,
                "eval failed",
            )));
        }
        self.evals.push(expr.to_string());
        Ok(())
    }

    fn print(&mut self, line: &str) -> Result<()> {
        self.printed.push(line.to_string());
        Ok(())
    }

    fn warn(&mut self, msg: &str) {
        self.warnings.push(msg.to_string());
    }
}
