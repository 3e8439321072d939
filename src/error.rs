/// Failure categories recognized by the tool.
///
/// Each kind maps to a fixed process exit code so scripts can tell a missing
/// dataset apart from a bad flag or an unwritable output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration (bounds, tolerances, window length).
    Usage,
    /// Source missing, unreachable, or malformed. Fatal for the run.
    DataUnavailable,
    /// The solver could not produce an acceptable fit.
    ///
    /// Raised inside `fit` and converted into the "no fit" outcome there; it
    /// never reaches `main`.
    FitDidNotConverge,
    /// Writing the image, the fit file, or driving the terminal failed.
    Render,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Usage => 2,
            ErrorKind::DataUnavailable => 3,
            ErrorKind::FitDidNotConverge => 4,
            ErrorKind::Render => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataUnavailable, message)
    }

    pub fn fit_did_not_converge(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FitDidNotConverge, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let kinds = [
            ErrorKind::Usage,
            ErrorKind::DataUnavailable,
            ErrorKind::FitDidNotConverge,
            ErrorKind::Render,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn display_is_the_bare_message() {
        let err = AppError::data_unavailable("Failed to open CSV 'x.csv'");
        assert_eq!(err.to_string(), "Failed to open CSV 'x.csv'");
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
        assert_eq!(err.exit_code(), 3);
    }
}
