//! SQL text assembly.
//!
//! All statements are built here. Identifiers come only from validated
//! descriptors and are always double-quoted; values always travel as bind
//! parameters, with the exception of column defaults, which are rendered
//! as literals in DDL.

use crate::libs::error::{OrmError, Result};
use crate::libs::schema::{DefaultValue, FieldDescriptor, FieldKind, TableDescriptor};
use crate::libs::type_mapper::map_kind;

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Column name under which row-returning statements hand back each row.
pub const RECORD_COLUMN: &str = "record";

pub fn validate_identifier(ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_start && valid_rest && ident.len() <= MAX_IDENTIFIER_LEN {
        Ok(())
    } else {
        Err(OrmError::InvalidIdentifier(ident.to_string()))
    }
}

/// Quotes an identifier that already passed `validate_identifier`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident)
}

/// Quotes a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a default for a field of the given kind.
///
/// Returns the reason as a plain string when the scalar does not fit the
/// kind; the caller attaches table and column.
pub fn render_default(kind: FieldKind, value: &DefaultValue) -> std::result::Result<String, String> {
    match (kind, value) {
        (_, DefaultValue::Null) => Ok("NULL".to_string()),
        (FieldKind::String, DefaultValue::Text(s)) => Ok(quote_literal(s)),
        (FieldKind::Number, DefaultValue::Number(n)) => Ok(n.to_string()),
        (FieldKind::Boolean, DefaultValue::Boolean(b)) => {
            Ok(if *b { "TRUE" } else { "FALSE" }.to_string())
        }
        (FieldKind::Date, DefaultValue::Text(s)) if s.eq_ignore_ascii_case("now") => {
            Ok("CURRENT_TIMESTAMP".to_string())
        }
        (FieldKind::Date, DefaultValue::Text(s)) => Ok(quote_literal(s)),
        (kind, value) if kind.is_json() => {
            let json = match value {
                DefaultValue::Text(s) => serde_json::from_str(s)
                    .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
                DefaultValue::Number(n) => serde_json::Value::Number(n.clone()),
                DefaultValue::Boolean(b) => serde_json::Value::Bool(*b),
                DefaultValue::Null => serde_json::Value::Null,
            };
            Ok(format!("{}::jsonb", quote_literal(&json.to_string())))
        }
        (kind, value) => Err(format!("{value:?} is not a valid {kind} default")),
    }
}

fn default_clause(field: &FieldDescriptor) -> Option<String> {
    let value = field.metadata.default_value.as_ref()?;
    // descriptors validate defaults on construction
    render_default(field.kind, value)
        .ok()
        .map(|rendered| format!(" DEFAULT {}", rendered))
}

/// Column clause used by `CREATE TABLE`.
///
/// Constraints always appear in the order PRIMARY KEY, NOT NULL, UNIQUE,
/// REFERENCES, DEFAULT.
pub fn column_clause(field: &FieldDescriptor) -> String {
    let meta = &field.metadata;
    let mut col_def = format!(
        "{} {}",
        quote_ident(&field.name),
        map_kind(field.kind).as_sql()
    );
    if meta.primary_key {
        col_def.push_str(" PRIMARY KEY");
    }
    if meta.not_null {
        col_def.push_str(" NOT NULL");
    }
    if meta.unique {
        col_def.push_str(" UNIQUE");
    }
    if let Some(references) = &meta.references {
        col_def.push_str(&format!(
            " REFERENCES {}({})",
            quote_ident(&references.table),
            quote_ident(&references.column)
        ));
    }
    if let Some(default) = default_clause(field) {
        col_def.push_str(&default);
    }
    col_def
}

pub fn create_table(table: &TableDescriptor) -> String {
    let cols: Vec<String> = table.fields().iter().map(column_clause).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_ident(table.name()),
        cols.join(", ")
    )
}

/// `ADD COLUMN` statement for a field missing from an existing table.
///
/// Only NOT NULL and DEFAULT are carried over; keys, uniqueness and
/// references are applied at creation time only.
pub fn add_column(table: &TableDescriptor, field: &FieldDescriptor) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table.name()),
        quote_ident(&field.name),
        map_kind(field.kind).as_sql()
    );
    if field.metadata.not_null {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = default_clause(field) {
        sql.push_str(&default);
    }
    sql
}

/// Catalog query listing the columns of one table; binds the table name.
pub fn existing_columns() -> &'static str {
    "SELECT column_name::text AS column_name FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1"
}

/// Positional placeholder cast to the column's storage type.
pub fn placeholder(index: usize, kind: FieldKind) -> String {
    format!("${}::{}", index, map_kind(kind).as_sql())
}

/// Prepares a value for a placeholder of the given kind.
///
/// Json kinds travel as their document text and are parsed by the
/// `::JSONB` cast, so a plain string lands as a json string.
pub fn encode_param(kind: FieldKind, value: &serde_json::Value) -> serde_json::Value {
    if kind.is_json() && !value.is_null() {
        serde_json::Value::String(value.to_string())
    } else {
        value.clone()
    }
}

/// `RETURNING` clause handing each affected row back as one json object.
pub fn returning_record(table: &TableDescriptor) -> String {
    format!(
        "RETURNING to_jsonb({}.*) AS {}",
        quote_ident(table.name()),
        quote_ident(RECORD_COLUMN)
    )
}

/// Select list returning each row as one json object.
pub fn select_record(table: &TableDescriptor) -> String {
    format!(
        "SELECT to_jsonb({}.*) AS {} FROM {}",
        quote_ident(table.name()),
        quote_ident(RECORD_COLUMN),
        quote_ident(table.name())
    )
}

pub fn insert(table: &TableDescriptor, columns: &[&FieldDescriptor]) -> String {
    if columns.is_empty() {
        return format!(
            "INSERT INTO {} DEFAULT VALUES {}",
            quote_ident(table.name()),
            returning_record(table)
        );
    }
    let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| placeholder(i + 1, c.kind))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) {}",
        quote_ident(table.name()),
        names.join(", "),
        placeholders.join(", "),
        returning_record(table)
    )
}

/// `UPDATE ... WHERE <key> = $n`; the key parameter comes after the set values.
pub fn update(table: &TableDescriptor, key: &FieldDescriptor, columns: &[&FieldDescriptor]) -> String {
    let sets: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote_ident(&c.name), placeholder(i + 1, c.kind)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = {} {}",
        quote_ident(table.name()),
        sets.join(", "),
        quote_ident(&key.name),
        placeholder(columns.len() + 1, key.kind),
        returning_record(table)
    )
}

pub fn delete(table: &TableDescriptor, key: &FieldDescriptor) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {} {}",
        quote_ident(table.name()),
        quote_ident(&key.name),
        placeholder(1, key.kind),
        returning_record(table)
    )
}
