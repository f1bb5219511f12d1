use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadAddress(String),
    DirectoryDoesNotExist(String),
    EmptyPrefix,
    InvalidValue(String),
    MissingReplayLog,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadAddress(e) => write!(f, "Bind address error: {}", e),
            ConfigError::DirectoryDoesNotExist(e) => write!(f, "Directory error: {}", e),
            ConfigError::EmptyPrefix => write!(f, "Archive prefix must not be empty"),
            ConfigError::InvalidValue(e) => write!(f, "Invalid value: {}", e),
            ConfigError::MissingReplayLog => write!(f, "No replay log configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures surfaced by the session lifecycle.
///
/// The first three variants are user-facing transition rejections and leave
/// the session untouched. The remaining ones are fatal for a single start or
/// stop call; the session is reset before they are returned.
#[derive(Debug)]
pub enum SessionError {
    AlreadyActive,
    NotActive,
    InvalidSubject(String),
    Inspector(InspectorError),
    Archive(ArchiveError),
    Storage(StorageError),
}

impl SessionError {
    /// Symbolic code reported on the control surface.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::AlreadyActive => "already_active",
            SessionError::NotActive => "not_active",
            SessionError::InvalidSubject(_) => "invalid_subject",
            SessionError::Inspector(_) => "inspector_failed",
            SessionError::Archive(_) => "archive_failed",
            SessionError::Storage(_) => "storage_failed",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyActive => write!(f, "A capture session is already active"),
            SessionError::NotActive => write!(f, "No capture session is active"),
            SessionError::InvalidSubject(e) => write!(f, "Invalid capture subject: {}", e),
            SessionError::Inspector(e) => write!(f, "Inspector error: {}", e),
            SessionError::Archive(e) => write!(f, "Archive error: {}", e),
            SessionError::Storage(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum InspectorError {
    NoSubject,
    AttachFailed(String),
    IoError(std::io::Error),
    MalformedLog { line: usize, reason: String },
}

impl fmt::Display for InspectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectorError::NoSubject => write!(f, "No eligible capture subject"),
            InspectorError::AttachFailed(e) => write!(f, "Attach failed: {}", e),
            InspectorError::IoError(e) => write!(f, "Inspector IO error: {}", e),
            InspectorError::MalformedLog { line, reason } => {
                write!(f, "Malformed event log at line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for InspectorError {}

impl From<std::io::Error> for InspectorError {
    fn from(err: std::io::Error) -> Self {
        InspectorError::IoError(err)
    }
}

/// Archive assembly failures: ZIP32 field-width overflows or an
/// unserializable metadata document.
#[derive(Debug, PartialEq, Eq)]
pub enum ArchiveError {
    TooManyEntries(usize),
    EntryTooLarge { path: String, len: usize },
    NameTooLong { path: String },
    ArchiveTooLarge,
    Manifest(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::TooManyEntries(n) => write!(f, "Too many archive entries: {}", n),
            ArchiveError::EntryTooLarge { path, len } => {
                write!(f, "Entry {} is too large: {} bytes", path, len)
            }
            ArchiveError::NameTooLong { path } => write!(f, "Entry name too long: {}", path),
            ArchiveError::ArchiveTooLarge => write!(f, "Archive exceeds 4 GiB"),
            ArchiveError::Manifest(e) => write!(f, "Manifest serialization failed: {}", e),
        }
    }
}

impl std::error::Error for ArchiveError {}

#[derive(Debug)]
pub enum StorageError {
    WriteFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::WriteFailed => write!(f, "Storage write failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum WebError {
    BindFailed(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::BindFailed(e) => write!(f, "Web server bind failed: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    InspectorError(InspectorError),
    StorageError(StorageError),
    Session(SessionError),
    ChannelClosed,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::InspectorError(e) => write!(f, "Inspector error: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
            ControllerError::Session(e) => write!(f, "{}", e),
            ControllerError::ChannelClosed => write!(f, "Controller event loop is gone"),
        }
    }
}

impl std::error::Error for ControllerError {}
