use std::fmt;

#[derive(Debug, Clone)]
pub enum SnaplinkError {
    /// Short code absent or not resolvable (inactive / logically expired).
    NotFound(String),
    /// Store rejected a create because the code already exists.
    DuplicateCode(String),
    /// Code generation gave up after the configured number of draws.
    GenerationExhausted(String),
    Validation(String),
    /// The authoritative link store could not be reached or failed.
    StoreUnavailable(String),
    /// A click record could not be written.
    PersistenceFailure(String),
    Serialization(String),
    FileOperation(String),
    Config(String),
}

impl SnaplinkError {
    pub fn code(&self) -> &'static str {
        match self {
            SnaplinkError::NotFound(_) => "E001",
            SnaplinkError::DuplicateCode(_) => "E002",
            SnaplinkError::GenerationExhausted(_) => "E003",
            SnaplinkError::Validation(_) => "E004",
            SnaplinkError::StoreUnavailable(_) => "E005",
            SnaplinkError::PersistenceFailure(_) => "E006",
            SnaplinkError::Serialization(_) => "E007",
            SnaplinkError::FileOperation(_) => "E008",
            SnaplinkError::Config(_) => "E009",
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            SnaplinkError::NotFound(_) => "Resource Not Found",
            SnaplinkError::DuplicateCode(_) => "Duplicate Short Code",
            SnaplinkError::GenerationExhausted(_) => "Code Generation Exhausted",
            SnaplinkError::Validation(_) => "Validation Error",
            SnaplinkError::StoreUnavailable(_) => "Link Store Unavailable",
            SnaplinkError::PersistenceFailure(_) => "Click Persistence Failure",
            SnaplinkError::Serialization(_) => "Serialization Error",
            SnaplinkError::FileOperation(_) => "File Operation Error",
            SnaplinkError::Config(_) => "Configuration Error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            SnaplinkError::NotFound(msg)
            | SnaplinkError::DuplicateCode(msg)
            | SnaplinkError::GenerationExhausted(msg)
            | SnaplinkError::Validation(msg)
            | SnaplinkError::StoreUnavailable(msg)
            | SnaplinkError::PersistenceFailure(msg)
            | SnaplinkError::Serialization(msg)
            | SnaplinkError::FileOperation(msg)
            | SnaplinkError::Config(msg) => msg,
        }
    }
}

impl fmt::Display for SnaplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for SnaplinkError {}

// Convenience constructors
impl SnaplinkError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::NotFound(msg.into())
    }

    pub fn duplicate_code<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::DuplicateCode(msg.into())
    }

    pub fn generation_exhausted<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::GenerationExhausted(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Validation(msg.into())
    }

    pub fn store_unavailable<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::StoreUnavailable(msg.into())
    }

    pub fn persistence_failure<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::PersistenceFailure(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Serialization(msg.into())
    }

    pub fn file_operation<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::FileOperation(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        SnaplinkError::Config(msg.into())
    }
}

impl From<std::io::Error> for SnaplinkError {
    fn from(err: std::io::Error) -> Self {
        SnaplinkError::FileOperation(err.to_string())
    }
}

impl From<serde_json::Error> for SnaplinkError {
    fn from(err: serde_json::Error) -> Self {
        SnaplinkError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SnaplinkError {
    fn from(err: toml::de::Error) -> Self {
        SnaplinkError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnaplinkError>;
