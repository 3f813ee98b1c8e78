use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Database error: {source}")]
    Database {
        source: mongodb::error::Error,
        collection: Option<String>,
        operation: Option<String>,
    },

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conversion error in '{collection}': {message}")]
    Conversion { collection: String, message: String },

    #[error("Store error: {message}")]
    Store {
        message: String,
        operation: Option<String>,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

impl DbError {
    /// Creates a new Database error with context
    pub fn database(
        error: mongodb::error::Error,
        collection: Option<String>,
        operation: Option<String>,
    ) -> Self {
        Self::Database {
            source: error,
            collection,
            operation,
        }
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conversion(collection: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Conversion {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    pub fn store(message: impl Into<String>, operation: Option<String>) -> Self {
        Self::Store {
            message: message.into(),
            operation,
        }
    }

    /// Creates a new Internal error with optional context
    pub fn internal(message: impl Into<String>, context: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_invalid_query(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }

    /// Gets the error message without the error type prefix
    pub fn message(&self) -> String {
        match self {
            Self::Database { source, .. } => source.to_string(),
            Self::NotFound { collection, id } => format!("{}/{}", collection, id),
            Self::InvalidQuery(message) | Self::Validation(message) => message.clone(),
            Self::Conversion { message, .. } => message.clone(),
            Self::Store { message, .. } => message.clone(),
            Self::Internal { message, .. } => message.clone(),
        }
    }
}

// Manual implementation of From instead of using #[from] for mongodb::error::Error
impl From<mongodb::error::Error> for DbError {
    fn from(error: mongodb::error::Error) -> Self {
        Self::Database {
            source: error,
            collection: None,
            operation: None,
        }
    }
}

impl From<bson::ser::Error> for DbError {
    fn from(error: bson::ser::Error) -> Self {
        Self::internal(
            error.to_string(),
            Some("BSON serialization failed".to_string()),
        )
    }
}

impl From<bson::de::Error> for DbError {
    fn from(error: bson::de::Error) -> Self {
        Self::internal(
            error.to_string(),
            Some("BSON deserialization failed".to_string()),
        )
    }
}
