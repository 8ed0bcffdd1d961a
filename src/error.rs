use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetrikaErrorCode {
    MissingCounterId,
    InvalidCounterId,
}

impl MetrikaErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetrikaErrorCode::MissingCounterId => "yandex-metrika/missing-counter-id",
            MetrikaErrorCode::InvalidCounterId => "yandex-metrika/invalid-counter-id",
        }
    }
}

/// Configuration error raised from `initialize`. Indicates a caller bug, so
/// it is meant to propagate to the host dispatcher uncaught.
#[derive(Clone, Debug)]
pub struct MetrikaError {
    pub code: MetrikaErrorCode,
    message: String,
}

impl MetrikaError {
    pub fn new(code: MetrikaErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl Display for MetrikaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for MetrikaError {}

pub type MetrikaResult<T> = Result<T, MetrikaError>;

pub fn missing_counter_id(message: impl Into<String>) -> MetrikaError {
    MetrikaError::new(MetrikaErrorCode::MissingCounterId, message)
}

pub fn invalid_counter_id(message: impl Into<String>) -> MetrikaError {
    MetrikaError::new(MetrikaErrorCode::InvalidCounterId, message)
}
