use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by the recipe core.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// A filter parameter's value does not match its expected grammar.
    #[error("invalid value '{value}' for filter '{param}': {reason}")]
    ParseFailure {
        param: &'static str,
        value: String,
        reason: String,
    },

    /// The bulk import source is missing, unreadable, or malformed.
    #[error("cannot import recipes from {}: {reason}", path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    /// The store holds no recipes yet.
    #[error("no recipes in the store; run `recipedex import <FILE>` first")]
    EmptyStore,
}
