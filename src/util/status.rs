use std::{fmt, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Ok,
    /// Stored data failed an integrity check.
    Corruption,
    InvalidArgument,
    IOError,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Ok => "Ok",
            Code::Corruption => "Corruption",
            Code::InvalidArgument => "Invalid argument",
            Code::IOError => "IO error",
        }
    }
}

/// Outcome of an engine operation.
///
/// An ok status on an exhausted iterator means "end of range"; any other
/// code means the traversal stopped because of a failure. A status is
/// copied into the cursor that hit it and into the completion that reports
/// it, so the message is shared rather than duplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    code: Code,
    message: Option<Arc<str>>,
}

impl Status {
    pub const fn ok() -> Self {
        Status {
            code: Code::Ok,
            message: None,
        }
    }

    fn with_message(code: Code, msg: impl Into<String>) -> Self {
        Status {
            code,
            message: Some(Arc::from(msg.into())),
        }
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::with_message(Code::Corruption, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::with_message(Code::InvalidArgument, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::with_message(Code::IOError, msg)
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn is_corruption(&self) -> bool {
        self.code == Code::Corruption
    }

    pub fn is_io_error(&self) -> bool {
        self.code == Code::IOError
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.code == Code::InvalidArgument
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code.as_str())?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Status {}

impl From<std::io::Error> for Status {
    fn from(err: std::io::Error) -> Self {
        Status::io_error(err.to_string())
    }
}

/// Malformed configuration.
impl From<serde_json::Error> for Status {
    fn from(err: serde_json::Error) -> Self {
        Status::invalid_argument(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Status>;
