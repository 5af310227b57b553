use crate::model::EntityId;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by (or on behalf of) the persistence collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PersistError {
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    #[error("persistence rejected the write: {0}")]
    Rejected(String),

    #[error("record not found in {table}: {id}")]
    NotFound { table: &'static str, id: EntityId },

    #[error("persistence call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Persistence(#[from] PersistError),

    #[error("{0}")]
    Invariant(String),

    #[error("invalid change: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: EntityId },

    #[error("no active project")]
    NoActiveProject,
}

impl StoreError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: EntityId) -> Self {
        Self::NotFound { kind, id }
    }

    /// True when the local state was rolled back after a remote failure.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("settings toml: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ClipboardError {
    #[error("image decode: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has no area")]
    EmptyImage,

    #[error("clipboard json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_errors_convert_into_store_errors() {
        let err: StoreError = PersistError::Unavailable("offline".into()).into();
        assert!(err.is_persistence());
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn invariant_message_is_shown_verbatim() {
        let err = StoreError::invariant("no free scene span");
        assert_eq!(err.to_string(), "no free scene span");
        assert!(!err.is_persistence());
    }
}
