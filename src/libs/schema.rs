//! Table descriptors: the caller's static declaration of tables and fields.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::libs::ddl;
use crate::libs::error::{OrmError, Result};

/// Abstract type of a field, independent of the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Any,
}

impl FieldKind {
    pub const ALL: [FieldKind; 7] = [
        FieldKind::String,
        FieldKind::Number,
        FieldKind::Boolean,
        FieldKind::Date,
        FieldKind::Array,
        FieldKind::Object,
        FieldKind::Any,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        }
    }

    /// Kinds stored as json documents.
    pub fn is_json(&self) -> bool {
        matches!(self, FieldKind::Array | FieldKind::Object | FieldKind::Any)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self> {
        FieldKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OrmError::UnsupportedFieldKind(s.to_string()))
    }
}

impl TryFrom<String> for FieldKind {
    type Error = OrmError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Foreign-key target of a column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct References {
    pub table: String,
    pub column: String,
}

impl References {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Column default. Rendered according to the owning field's kind.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Boolean(bool),
    Number(serde_json::Number),
    Text(String),
    Null,
}

impl From<&str> for DefaultValue {
    fn from(value: &str) -> Self {
        DefaultValue::Text(value.to_string())
    }
}

impl From<String> for DefaultValue {
    fn from(value: String) -> Self {
        DefaultValue::Text(value)
    }
}

impl From<bool> for DefaultValue {
    fn from(value: bool) -> Self {
        DefaultValue::Boolean(value)
    }
}

impl From<i64> for DefaultValue {
    fn from(value: i64) -> Self {
        DefaultValue::Number(value.into())
    }
}

/// Constraints and defaults of one column, kept next to (not inside) its kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnMetadata {
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub references: Option<References>,
    pub default_value: Option<DefaultValue>,
    /// Fill the column with a fresh v4 UUID when an insert leaves it out.
    pub generate_uuid: bool,
}

impl ColumnMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.references = Some(References::new(table, column));
        self
    }

    pub fn default_value(mut self, value: impl Into<DefaultValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn generate_uuid(mut self) -> Self {
        self.generate_uuid = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    #[serde(flatten)]
    pub metadata: ColumnMetadata,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind, metadata: ColumnMetadata) -> Self {
        Self {
            name: name.into(),
            kind,
            metadata,
        }
    }

    /// A field without constraints or default.
    pub fn plain(name: impl Into<String>, kind: FieldKind) -> Self {
        Self::new(name, kind, ColumnMetadata::default())
    }
}

/// A table name plus its ordered fields.
///
/// Field order is the column order of `CREATE TABLE`. Columns added later by
/// reconciliation land at the end of the table regardless of their position
/// here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct TableDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
}

#[derive(Deserialize)]
struct RawTable {
    name: String,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
}

impl TryFrom<RawTable> for TableDescriptor {
    type Error = OrmError;

    fn try_from(raw: RawTable) -> Result<Self> {
        TableDescriptor::new(raw.name, raw.fields)
    }
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self> {
        let name = name.into();
        ddl::validate_identifier(&name)?;
        let mut table = Self {
            name,
            fields: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            table.push(field)?;
        }
        Ok(table)
    }

    /// Returns a copy of this descriptor with one more field appended.
    pub fn with_field(mut self, field: FieldDescriptor) -> Result<Self> {
        self.push(field)?;
        Ok(self)
    }

    fn push(&mut self, field: FieldDescriptor) -> Result<()> {
        ddl::validate_identifier(&field.name)?;
        if self.field(&field.name).is_some() {
            return Err(OrmError::DuplicateField {
                table: self.name.clone(),
                field: field.name,
            });
        }
        if let Some(references) = &field.metadata.references {
            ddl::validate_identifier(&references.table)?;
            ddl::validate_identifier(&references.column)?;
        }
        if let Some(default) = &field.metadata.default_value {
            ddl::render_default(field.kind, default).map_err(|reason| {
                OrmError::InvalidDefault {
                    table: self.name.clone(),
                    column: field.name.clone(),
                    reason,
                }
            })?;
        }
        self.fields.push(field);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a column, failing with `UnknownColumn`.
    pub fn column(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| OrmError::UnknownColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.metadata.primary_key)
    }
}

/// The closed set of tables a process knows about.
///
/// Repository calls are only accepted for tables and columns declared here,
/// which keeps caller input out of SQL identifiers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "Vec<TableDescriptor>")]
pub struct Schema {
    tables: Vec<TableDescriptor>,
}

impl TryFrom<Vec<TableDescriptor>> for Schema {
    type Error = OrmError;

    fn try_from(tables: Vec<TableDescriptor>) -> Result<Self> {
        Schema::new(tables)
    }
}

impl Schema {
    pub fn new(tables: Vec<TableDescriptor>) -> Result<Self> {
        let mut schema = Self::default();
        for table in tables {
            schema.add(table)?;
        }
        Ok(schema)
    }

    pub fn add(&mut self, table: TableDescriptor) -> Result<()> {
        if self.tables.iter().any(|t| t.name == table.name) {
            return Err(OrmError::DuplicateTable(table.name));
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| OrmError::UnknownTable(name.to_string()))
    }

    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new(
            "users",
            vec![
                FieldDescriptor::new("id", FieldKind::Number, ColumnMetadata::new().primary_key()),
                FieldDescriptor::new("name", FieldKind::String, ColumnMetadata::new().not_null()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_kind_parse_is_case_insensitive() {
        assert_eq!("Date".parse::<FieldKind>().unwrap(), FieldKind::Date);
        assert_eq!(" any ".parse::<FieldKind>().unwrap(), FieldKind::Any);
    }

    #[test]
    fn test_kind_parse_rejects_unknown_tag() {
        let err = "bigint".parse::<FieldKind>().unwrap_err();
        assert!(matches!(err, OrmError::UnsupportedFieldKind(tag) if tag == "bigint"));
    }

    #[test]
    fn test_descriptor_rejects_duplicate_field() {
        let err = users()
            .with_field(FieldDescriptor::plain("name", FieldKind::String))
            .unwrap_err();
        assert!(matches!(err, OrmError::DuplicateField { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_descriptor_rejects_bad_identifier() {
        let err = TableDescriptor::new("users; drop table x", vec![]).unwrap_err();
        assert!(matches!(err, OrmError::InvalidIdentifier(_)));

        let err = users()
            .with_field(FieldDescriptor::plain("e-mail", FieldKind::String))
            .unwrap_err();
        assert!(matches!(err, OrmError::InvalidIdentifier(_)));
    }

    #[test]
    fn test_descriptor_rejects_mismatched_default() {
        let err = TableDescriptor::new(
            "counters",
            vec![FieldDescriptor::new(
                "hits",
                FieldKind::Number,
                ColumnMetadata::new().default_value("many"),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, OrmError::InvalidDefault { ref column, .. } if column == "hits"));
    }

    #[test]
    fn test_field_lookup_and_primary_key() {
        let table = users();
        assert_eq!(table.primary_key().map(|f| f.name.as_str()), Some("id"));
        assert!(table.field("missing").is_none());
        assert!(matches!(
            table.column("missing"),
            Err(OrmError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_schema_rejects_duplicate_table() {
        let err = Schema::new(vec![users(), users()]).unwrap_err();
        assert!(matches!(err, OrmError::DuplicateTable(name) if name == "users"));
    }

    #[test]
    fn test_schema_unknown_table() {
        let schema = Schema::new(vec![users()]).unwrap();
        assert!(schema.table("users").is_ok());
        assert!(matches!(schema.table("posts"), Err(OrmError::UnknownTable(_))));
    }

    #[test]
    fn test_descriptor_deserializes_from_json() {
        let table: TableDescriptor = serde_json::from_value(serde_json::json!({
            "name": "users",
            "fields": [
                { "name": "id", "kind": "number", "primary_key": true },
                { "name": "active", "kind": "boolean", "default_value": true },
                { "name": "owner", "kind": "number", "references": { "table": "users", "column": "id" } }
            ]
        }))
        .unwrap();

        assert_eq!(table.fields().len(), 3);
        assert!(table.fields()[0].metadata.primary_key);
        assert_eq!(
            table.fields()[1].metadata.default_value,
            Some(DefaultValue::Boolean(true))
        );
        assert_eq!(
            table.fields()[2].metadata.references,
            Some(References::new("users", "id"))
        );
    }

    #[test]
    fn test_descriptor_deserialize_rejects_unknown_kind() {
        let result: std::result::Result<TableDescriptor, _> =
            serde_json::from_value(serde_json::json!({
                "name": "users",
                "fields": [{ "name": "id", "kind": "uuid" }]
            }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unsupported field kind"), "{err}");
    }
}
