#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedContainer,
    MalformedJson,
    MalformedNodeGraph,
    IndexOutOfRange,
    OutOfRange,
    UnsupportedComponentType,
    TypeMismatch,
    MissingSource,
    UnsupportedRequiredExtension,
    InvalidPrimitive,
    SkeletonBuildFailure,
    EmptyJoints,
    NoCommonRoot,
    JointOutOfRange,
    InverseBindMatrixAccessorMismatch,
    AnimationSamplerMismatch,
    ImageDecodeFailure,
    HostMaterializationFailure,
    Io,
}

impl ErrorKind {
    /// Kinds that abort the whole document load instead of dropping a single entity.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedContainer | ErrorKind::UnsupportedRequiredExtension
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

/// Recovers the kind of a crate error wrapped in an `anyhow::Error`.
///
/// Errors raised by other crates (io, image, base64...) are reported as `None`.
pub fn kind_of(error: &anyhow::Error) -> Option<ErrorKind> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(|error| error.kind())
}

/// Append-only, thread-safe list of `"context: message"` entries.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: parking_lot::Mutex<Vec<String>>,
}

impl ErrorLog {
    pub fn add(&self, context: &str, message: impl std::fmt::Display) {
        let entry = format!("{context}: {message}");
        log::error!("{entry}");
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|entry| entry.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_kind() {
        let error = Error::new(
            ErrorKind::UnsupportedRequiredExtension,
            String::from("KHR_unknown"),
        );

        assert_eq!(
            error.to_string(),
            "UnsupportedRequiredExtension: KHR_unknown"
        );
    }

    #[test]
    fn kind_survives_context() {
        let error: anyhow::Error =
            Error::new(ErrorKind::MissingSource, String::from("buffer 3")).into();
        let error = error.context("Unable to load mesh 0");

        assert_eq!(kind_of(&error), Some(ErrorKind::MissingSource));
    }

    #[test]
    fn log_prefixes_context() {
        let log = ErrorLog::default();
        log.add("LoadMaterial()", "alphaMode is invalid");

        assert_eq!(log.entries(), vec!["LoadMaterial(): alphaMode is invalid"]);
        assert!(log.contains("alphaMode"));

        log.clear();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn foreign_errors_have_no_kind() {
        let error: anyhow::Error =
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();

        assert_eq!(kind_of(&error), None);
    }
}
