//! Field kind to storage column type mapping.

use std::fmt;

use crate::libs::error::Result;
use crate::libs::schema::FieldKind;

/// Storage column type produced for a field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Numeric,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    /// PostgreSQL spelling of the type. Json documents are stored as `JSONB`
    /// so they can be compared and indexed.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Json => "JSONB",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

pub fn map_kind(kind: FieldKind) -> ColumnType {
    match kind {
        FieldKind::String => ColumnType::Text,
        FieldKind::Number => ColumnType::Numeric,
        FieldKind::Boolean => ColumnType::Boolean,
        FieldKind::Date => ColumnType::Timestamp,
        FieldKind::Array | FieldKind::Object | FieldKind::Any => ColumnType::Json,
    }
}

/// Maps a textual kind tag, failing with `UnsupportedFieldKind` for tags
/// outside the closed set.
pub fn map_tag(tag: &str) -> Result<ColumnType> {
    Ok(map_kind(tag.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::error::OrmError;

    #[test]
    fn test_mapping_is_total() {
        let expected = [
            (FieldKind::String, ColumnType::Text),
            (FieldKind::Number, ColumnType::Numeric),
            (FieldKind::Boolean, ColumnType::Boolean),
            (FieldKind::Date, ColumnType::Timestamp),
            (FieldKind::Array, ColumnType::Json),
            (FieldKind::Object, ColumnType::Json),
            (FieldKind::Any, ColumnType::Json),
        ];
        for (kind, column_type) in expected {
            assert_eq!(map_kind(kind), column_type, "{kind}");
            assert!(!map_kind(kind).as_sql().is_empty());
        }
        assert_eq!(FieldKind::ALL.len(), expected.len());
    }

    #[test]
    fn test_map_tag() {
        assert_eq!(map_tag("boolean").unwrap(), ColumnType::Boolean);
        assert_eq!(map_tag("OBJECT").unwrap().as_sql(), "JSONB");
    }

    #[test]
    fn test_map_tag_fails_fast() {
        for tag in ["", "int", "bigint", "uuid", "set"] {
            assert!(matches!(map_tag(tag), Err(OrmError::UnsupportedFieldKind(_))), "{tag}");
        }
    }
}
