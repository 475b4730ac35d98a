use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Expression,
    Pattern,
    StructuredText,
    Shape,
    Serialize,
    Deserialize,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Build,
    Walk,
    Combinator,
    Codec,
}

/// Byte offset into the source text an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub offset: usize,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub stage: ErrorStage,
    pub message: String,
    pub location: Option<Location>,
}

impl Error {
    pub fn expression(message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind: ErrorKind::Expression,
            stage: ErrorStage::Combinator,
            message: message.into(),
            location: Some(Location { offset }),
        }
    }

    pub fn pattern(err: &regex::Error) -> Self {
        Self {
            kind: ErrorKind::Pattern,
            stage: ErrorStage::Combinator,
            message: format!("invalid pattern: {err}"),
            location: None,
        }
    }

    pub fn structured_text(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::StructuredText,
            stage: ErrorStage::Codec,
            message: message.into(),
            location: None,
        }
    }

    pub fn shape(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Shape,
            stage: ErrorStage::Build,
            message: message.into(),
            location: None,
        }
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Serialize,
            stage: ErrorStage::Walk,
            message: message.into(),
            location: None,
        }
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Deserialize,
            stage: ErrorStage::Build,
            message: message.into(),
            location: None,
        }
    }

    pub fn io(err: &std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io,
            stage: ErrorStage::Codec,
            message: format!("io failed: {err}"),
            location: None,
        }
    }

    pub fn with_stage(mut self, stage: ErrorStage) -> Self {
        self.stage = stage;
        self
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::pattern(&err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::io(&err)
    }
}
