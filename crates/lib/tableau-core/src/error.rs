//! Error taxonomy shared by every tableau-core operation.

use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingKey(String),
    InvalidSetting { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "missing required setting: {key}"),
            Self::InvalidSetting { name, value } => write!(f, "invalid {name} value: {value}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    JwtFailure {
        status: Option<u16>,
        message: String,
    },
}

impl AuthError {
    #[must_use]
    pub fn jwt(message: impl Into<String>) -> Self {
        Self::JwtFailure {
            status: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::JwtFailure {
            status: Some(status),
            message: body.into(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JwtFailure {
                status: Some(status),
                message,
            } => write!(f, "JWT sign-in rejected with status {status}: {message}"),
            Self::JwtFailure {
                status: None,
                message,
            } => write!(f, "JWT sign-in failed: {message}"),
        }
    }
}

impl Error for AuthError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NotFound(String),
    Empty(&'static str),
    BlankInput(&'static str),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(luid) => write!(f, "no published datasource found for luid {luid}"),
            Self::Empty(what) => write!(f, "invalid or empty response from {what}"),
            Self::BlankInput(field) => write!(f, "{field} is required"),
        }
    }
}

impl Error for ValidationError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    Empty,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "cannot render an empty or malformed row set"),
        }
    }
}

impl Error for FormatError {}

/// Upstream service a transport or decode failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Metadata,
    Vds,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metadata => write!(f, "metadata API"),
            Self::Vds => write!(f, "VizQL Data Service"),
        }
    }
}

#[derive(Debug)]
pub enum TableauError {
    Config(ConfigError),
    Auth(AuthError),
    MetadataApi { status: u16, body: String },
    VdsApi { status: u16, body: String },
    Validation(ValidationError),
    Format(FormatError),
    Transport { service: Service, message: String },
    Decode { service: Service, message: String },
    Runtime(String),
}

impl TableauError {
    pub(crate) fn api(service: Service, status: u16, body: String) -> Self {
        match service {
            Service::Metadata => Self::MetadataApi { status, body },
            Service::Vds => Self::VdsApi { status, body },
        }
    }

    /// Stable error kind name surfaced to tool callers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::MissingKey(_)) => "ConfigError.MissingKey",
            Self::Config(ConfigError::InvalidSetting { .. }) => "ConfigError.InvalidSetting",
            Self::Auth(_) => "AuthError.JwtFailure",
            Self::MetadataApi { .. } => "MetadataApiError",
            Self::VdsApi { .. } => "VdsApiError",
            Self::Validation(ValidationError::NotFound(_)) => "ValidationError.NotFound",
            Self::Validation(ValidationError::Empty(_)) => "ValidationError.Empty",
            Self::Validation(ValidationError::BlankInput(_)) => "ValidationError.BlankInput",
            Self::Format(FormatError::Empty) => "FormatError.Empty",
            Self::Transport { .. } => "TransportError",
            Self::Decode { .. } => "DecodeError",
            Self::Runtime(_) => "RuntimeError",
        }
    }

    /// Upstream HTTP status, when the failure carries one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::MetadataApi { status, .. } | Self::VdsApi { status, .. } => Some(*status),
            Self::Auth(AuthError::JwtFailure { status, .. }) => *status,
            _ => None,
        }
    }

    /// Upstream response body, when the failure carries one.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::MetadataApi { body, .. } | Self::VdsApi { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for TableauError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Auth(err) => write!(f, "{err}"),
            Self::MetadataApi { status, body } => write!(
                f,
                "failed to query metadata API. Status code: {status}. Response: {body}"
            ),
            Self::VdsApi { status, body } => write!(
                f,
                "failed to query VizQL Data Service. Status code: {status}. Response: {body}"
            ),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Format(err) => write!(f, "{err}"),
            Self::Transport { service, message } => {
                write!(f, "request to {service} failed: {message}")
            }
            Self::Decode { service, message } => {
                write!(f, "unreadable response from {service}: {message}")
            }
            Self::Runtime(message) => write!(f, "runtime error: {message}"),
        }
    }
}

impl Error for TableauError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Auth(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Format(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for TableauError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<AuthError> for TableauError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<ValidationError> for TableauError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<FormatError> for TableauError {
    fn from(err: FormatError) -> Self {
        Self::Format(err)
    }
}

pub type TableauResult<T> = Result<T, TableauError>;
