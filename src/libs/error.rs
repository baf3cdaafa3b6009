//! Error types for schemasync

use thiserror::Error;

/// Every failure the synchronizer and repository can surface.
///
/// Engine rejections keep the underlying `sqlx::Error` as their source so
/// callers can inspect SQLSTATE codes.
#[derive(Error, Debug)]
pub enum OrmError {
    #[error("unsupported field kind: {0}")]
    UnsupportedFieldKind(String),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("duplicate field {field:?} in table {table:?}")]
    DuplicateField { table: String, field: String },

    #[error("duplicate table {0:?} in schema")]
    DuplicateTable(String),

    #[error("invalid default for {table}.{column}: {reason}")]
    InvalidDefault {
        table: String,
        column: String,
        reason: String,
    },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column {column:?} on table {table:?}")]
    UnknownColumn { table: String, column: String },

    #[error("table {0:?} has no primary key")]
    MissingPrimaryKey(String),

    #[error("update on table {0:?} has no fields to set")]
    EmptyUpdate(String),

    #[error("could not acquire a connection: {0}")]
    ConnectionUnavailable(#[source] sqlx::Error),

    #[error("failed to create table {table:?}: {source}")]
    TableCreationFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to read columns of table {table:?}: {source}")]
    CatalogReadFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to add column {column:?} to table {table:?} (already added: {added:?}): {source}")]
    ColumnAdditionFailed {
        table: String,
        column: String,
        added: Vec<String>,
        #[source]
        source: sqlx::Error,
    },

    #[error("insert into {table:?} failed: {source}")]
    InsertFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("update of {table:?} failed: {source}")]
    UpdateFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("delete from {table:?} failed: {source}")]
    DeleteFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("read from {table:?} failed: {source}")]
    ReadFailed {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("raw statement failed: {0}")]
    RawFailed(#[source] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrmError>;
