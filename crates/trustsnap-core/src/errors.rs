use thiserror::Error;
use trustsnap_core_types::RequestId;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// tests and external API responses. Mutating operations never panic for
/// expected domain failures; they return one of these kinds instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    InvalidInput,
    InvalidVersion,

    // Lookup
    NotFound,

    // Conflicts
    AlreadyExists,
    /// Snapshot submitted as active, or an activation target that cannot be activated
    InvalidActivationTarget,
    /// More than one persisted snapshot claims to be active
    DuplicateActive,

    // Release / rollback
    /// One or more deploy gate checks failed (see `failures()`)
    GateFailure,
    /// Rollback target failed its eligibility checks
    NotEligible,

    // Integration/IO
    Io,
    Serialization,
    Persistence,
    Configuration,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidVersion => "ERR_INVALID_VERSION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::InvalidActivationTarget => "ERR_INVALID_ACTIVATION_TARGET",
            ExErrorKind::DuplicateActive => "ERR_DUPLICATE_ACTIVE",
            ExErrorKind::GateFailure => "ERR_GATE_FAILURE",
            ExErrorKind::NotEligible => "ERR_NOT_ELIGIBLE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Configuration => "ERR_CONFIGURATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// HTTP-shaped status for adapters that surface errors over a web boundary.
    pub fn http_status(&self) -> u16 {
        match self {
            ExErrorKind::InvalidInput | ExErrorKind::InvalidVersion => 400,
            ExErrorKind::NotFound => 404,
            ExErrorKind::AlreadyExists
            | ExErrorKind::InvalidActivationTarget
            | ExErrorKind::DuplicateActive
            | ExErrorKind::NotEligible => 409,
            ExErrorKind::GateFailure => 412,
            ExErrorKind::Io
            | ExErrorKind::Serialization
            | ExErrorKind::Persistence
            | ExErrorKind::Configuration
            | ExErrorKind::Internal => 500,
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification kind plus optional context (operation, version,
/// request id) and, for aggregate failures, the full list of failure details.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    version: Option<String>,
    request_id: Option<RequestId>,
    message: String,
    failures: Vec<String>,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            version: None,
            request_id: None,
            message: String::new(),
            failures: Vec::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add snapshot version context
    pub fn with_version(mut self, version: impl ToString) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach every individual failure behind an aggregate error
    /// (gate check names, eligibility issues).
    pub fn with_failures(mut self, failures: Vec<String>) -> Self {
        self.failures = failures;
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the version context, if any
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Individual failures behind an aggregate error (empty otherwise)
    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(version) = &self.version {
            write!(f, " (version: {})", version)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

impl From<VersionFormatError> for ExError {
    fn from(err: VersionFormatError) -> Self {
        ExError::new(ExErrorKind::InvalidVersion).with_message(err.to_string())
    }
}

// ========== End Error Facility ==========

/// Failure to parse a `vMAJOR.MINOR.PATCH` version string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionFormatError {
    #[error("version must start with 'v': {input}")]
    MissingPrefix { input: String },

    #[error("version must have exactly three numeric components: {input}")]
    WrongComponentCount { input: String },

    #[error("version component '{component}' is not a number in {input}")]
    NonNumericComponent { input: String, component: String },
}
