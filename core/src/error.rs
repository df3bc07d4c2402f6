use crate::notification::Category;
use crate::template::FieldRole;
use thiserror::Error;

/// Failures of the text normalizer. Never escape the core: extraction
/// turns them into a soft failure and timestamps fall back to "now".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Not a number: '{0}'")]
    Format(String),

    #[error("Unparseable timestamp: '{0}'")]
    TimestampUnparseable(String),
}

/// Failures of category-specific extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("No {category} template matched")]
    NoTemplateMatched { category: Category },

    #[error("Template '{template}' did not capture {role:?}")]
    MissingField {
        template: &'static str,
        role: FieldRole,
    },

    #[error(transparent)]
    Format(#[from] NormalizeError),
}

impl ExtractionError {
    /// The category whose extraction was attempted, when known.
    pub fn category(&self) -> Option<Category> {
        match self {
            ExtractionError::NoTemplateMatched { category } => Some(*category),
            _ => None,
        }
    }
}

/// Errors of the service layer (store + engine). The pure components never
/// produce these.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Transaction reference is required")]
    MissingReference,

    #[error("Corrupt {column} in row '{row_id}': {reason}")]
    CorruptRow {
        row_id: String,
        column: &'static str,
        reason: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DeskResult<T> = Result<T, DeskError>;
