/// Movie database backed by a JSON file.
pub mod movie_db;
/// Category and answer models shared with the room state.
pub mod models;

use futures::future::BoxFuture;
use thiserror::Error;

use self::models::{Answer, Category, CategoryId, CategoryType};

/// Result alias for content lookups.
pub type ContentResult<T> = Result<T, ContentError>;

/// Failures raised by a content source.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The category does not exist.
    #[error("unknown category `{0}`")]
    UnknownCategory(CategoryId),
    /// The category has no answer attached.
    #[error("category `{0}` has no answers")]
    EmptyCategory(CategoryId),
    /// The database file could not be read.
    #[error("failed to read content database `{path}`")]
    Read {
        /// File that was read.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The database file is not valid JSON for the expected layout.
    #[error("failed to parse content database `{path}`")]
    Parse {
        /// File that was parsed.
        path: String,
        /// Underlying decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Source of quiz categories and answers.
pub trait ContentSource: Send + Sync {
    /// Up to `count` distinct random categories of `kind` (at least one when any exist).
    fn random_categories(
        &self,
        count: usize,
        kind: CategoryType,
    ) -> BoxFuture<'static, ContentResult<Vec<Category>>>;

    /// A random answer belonging to `category`.
    fn random_answer_for_category(
        &self,
        category: CategoryId,
    ) -> BoxFuture<'static, ContentResult<Answer>>;
}
