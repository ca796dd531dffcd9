//! Error types shared by the resolver, the schema index and the CLI.
//!
//! Most of the engine degrades instead of failing (empty catalog, empty
//! schema entry, no suggestion). These variants surface only at the
//! collaborator boundary and at the configuration / input layer.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Failed to list objects: {0}")]
    ObjectList(String),

    #[error("Failed to describe {object}: {message}")]
    Describe { object: String, message: String },

    #[error("Object {0} is not present in the metadata snapshot")]
    UnknownObject(String),

    #[error("Failed to read config from {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Failed to read stdin: {0}")]
    StdinRead(#[from] io::Error),

    #[error("Failed to parse input JSON: {0}")]
    InputParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
