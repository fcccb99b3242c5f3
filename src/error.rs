use failure::Fail;

#[derive(Debug, Fail)]
pub enum ConfigError {
    #[fail(display = "{} must be {}, got '{}'", name, expected, value)]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[fail(display = "Invalid plate pattern: {}", _0)]
    Pattern(#[cause] regex::Error),
    #[fail(display = "Invalid confusable pair '{}', expected two characters", _0)]
    Pair(String),
}

#[derive(Debug, Fail, PartialEq, Eq)]
pub enum CorrectionError {
    #[fail(
        display = "Plate {} has {} ambiguous characters, more than the limit of {}",
        plate, positions, limit
    )]
    TooManyAmbiguous {
        plate: String,
        positions: usize,
        limit: usize,
    },
}

/// The registry owner task has exited, so shared plate state is gone.
#[derive(Debug, Fail, Clone, Copy, PartialEq, Eq)]
#[fail(display = "Registry owner is no longer running")]
pub struct RegistryClosed;

#[derive(Debug, Fail)]
pub enum SessionError {
    #[fail(display = "Recognizer unavailable: {}", _0)]
    Recognizer(failure::Error),
    #[fail(display = "Unable to start frame source {}: {}", source, error)]
    Source {
        source: String,
        error: failure::Error,
    },
    #[fail(display = "Unsupported frame source address '{}'", _0)]
    UnsupportedSource(String),
    #[fail(display = "{}", _0)]
    Registry(#[cause] RegistryClosed),
    #[fail(display = "Capture session task failed: {}", _0)]
    Task(String),
}

impl From<RegistryClosed> for SessionError {
    fn from(e: RegistryClosed) -> Self {
        SessionError::Registry(e)
    }
}
