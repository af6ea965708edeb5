//! Recipe dataset store with filtered search and a cleaning bulk importer.

pub mod db;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod query;

pub use error::RecipeError;
