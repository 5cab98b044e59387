use crate::config::ConfigError;

/// Failure reported by a map or content collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    NotInitialized,
    UnknownHandle(u64),
    Failed(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::NotInitialized => write!(f, "map collaborator not initialized"),
            BackendError::UnknownHandle(h) => write!(f, "unknown collaborator handle {h}"),
            BackendError::Failed(msg) => write!(f, "collaborator failure: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Why a controller is not operating.
///
/// Any of these puts the controller into its inline error state; every
/// command then becomes a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    MissingAccessToken,
    Config(ConfigError),
    Init(BackendError),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapError::MissingAccessToken => write!(f, "map unavailable: no access token configured"),
            MapError::Config(e) => write!(f, "map unavailable: {e}"),
            MapError::Init(e) => write!(f, "map failed to initialize: {e}"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::MissingAccessToken => None,
            MapError::Config(e) => Some(e),
            MapError::Init(e) => Some(e),
        }
    }
}

impl From<ConfigError> for MapError {
    fn from(e: ConfigError) -> Self {
        MapError::Config(e)
    }
}

impl From<BackendError> for MapError {
    fn from(e: BackendError) -> Self {
        MapError::Init(e)
    }
}
