//! Purpose: Single error type shared by the client, the models, and the CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Every fallible operation returns `Result<_, Error>`; callers branch on `kind()`.
//! Invariants: Client-side validation failures are `IllegalArgument` and happen before any write.
//! Invariants: Exit codes are stable once published; new kinds get new codes.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Client,
    IllegalArgument,
    NotFound,
    MultipleFound,
    Api,
    SchemaViolation,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    status: Option<u16>,
    index: Option<usize>,
    pointer: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            status: None,
            index: None,
            pointer: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Position of the offending element in a caller-supplied sequence.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// JSON pointer into the offending document (schema violations).
    pub fn pointer(&self) -> Option<&str> {
        self.pointer.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = Some(pointer.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status: {status})")?;
        }
        if let Some(index) = self.index {
            write!(f, " (index: {index})")?;
        }
        if let Some(pointer) = &self.pointer {
            write!(f, " (at: {pointer})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Client => 2,
        ErrorKind::IllegalArgument => 3,
        ErrorKind::NotFound => 4,
        ErrorKind::MultipleFound => 5,
        ErrorKind::Api => 6,
        ErrorKind::SchemaViolation => 7,
        ErrorKind::Io => 8,
    }
}
