//! Generic single-row create/update/delete plus reads, over tables declared
//! in a [`Schema`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::libs::connection::{ConnectionProvider, Lease, Row};
use crate::libs::ddl::{self, RECORD_COLUMN};
use crate::libs::error::{OrmError, Result};
use crate::libs::query_builder::Filter;
use crate::libs::schema::{FieldDescriptor, Schema, TableDescriptor};

/// Each call acquires one connection, runs one autocommitted statement and
/// releases the connection before returning.
#[derive(Clone)]
pub struct Repository {
    provider: Arc<dyn ConnectionProvider>,
    schema: Arc<Schema>,
}

impl Repository {
    pub fn new(provider: Arc<dyn ConnectionProvider>, schema: Arc<Schema>) -> Self {
        Self { provider, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    fn key_of<'a>(&self, table: &'a TableDescriptor) -> Result<&'a FieldDescriptor> {
        table
            .primary_key()
            .ok_or_else(|| OrmError::MissingPrimaryKey(table.name().to_string()))
    }

    async fn run(&self, sql: &str, params: &[Value]) -> std::result::Result<Vec<Row>, sqlx::Error> {
        // acquisition failures surface as the failing operation's error
        let mut lease = Lease::try_acquire(self.provider.as_ref()).await?;
        lease.execute(sql, params).await
    }

    /// Inserts one row built from `fields` in map order and returns it as
    /// stored, defaults included.
    pub async fn insert(&self, table: &str, fields: &Map<String, Value>) -> Result<Row> {
        let descriptor = self.schema.table(table)?;
        let mut columns: Vec<&FieldDescriptor> = Vec::with_capacity(fields.len());
        let mut params: Vec<Value> = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            let field = descriptor.column(name)?;
            columns.push(field);
            params.push(ddl::encode_param(field.kind, value));
        }
        for field in descriptor.fields() {
            if field.metadata.generate_uuid && !fields.contains_key(&field.name) {
                columns.push(field);
                params.push(Value::String(Uuid::new_v4().to_string()));
            }
        }

        let sql = ddl::insert(descriptor, &columns);
        let rows = self.run(&sql, &params).await.map_err(|source| {
            warn!(table = %table, error = %source, "insert failed");
            OrmError::InsertFailed {
                table: table.to_string(),
                source,
            }
        })?;
        debug!(table = %table, "row inserted");
        rows.into_iter()
            .next()
            .map(into_record)
            .ok_or_else(|| OrmError::InsertFailed {
                table: table.to_string(),
                source: sqlx::Error::RowNotFound,
            })
    }

    /// Sets every entry of `fields` on the row whose primary key is `id`.
    /// `Ok(None)` means no row matched.
    pub async fn update(&self, table: &str, id: &Value, fields: &Map<String, Value>) -> Result<Option<Row>> {
        let descriptor = self.schema.table(table)?;
        let key = self.key_of(descriptor)?;
        if fields.is_empty() {
            return Err(OrmError::EmptyUpdate(table.to_string()));
        }
        let mut columns: Vec<&FieldDescriptor> = Vec::with_capacity(fields.len());
        let mut params: Vec<Value> = Vec::with_capacity(fields.len() + 1);
        for (name, value) in fields {
            let field = descriptor.column(name)?;
            columns.push(field);
            params.push(ddl::encode_param(field.kind, value));
        }
        params.push(ddl::encode_param(key.kind, id));

        let sql = ddl::update(descriptor, key, &columns);
        let rows = self.run(&sql, &params).await.map_err(|source| {
            warn!(table = %table, error = %source, "update failed");
            OrmError::UpdateFailed {
                table: table.to_string(),
                source,
            }
        })?;
        Ok(rows.into_iter().next().map(into_record))
    }

    /// Deletes the row whose primary key is `id` and returns its prior
    /// values, or `Ok(None)` when no row matched.
    pub async fn delete(&self, table: &str, id: &Value) -> Result<Option<Row>> {
        let descriptor = self.schema.table(table)?;
        let key = self.key_of(descriptor)?;
        let sql = ddl::delete(descriptor, key);
        let rows = self
            .run(&sql, &[ddl::encode_param(key.kind, id)])
            .await
            .map_err(|source| {
                warn!(table = %table, error = %source, "delete failed");
                OrmError::DeleteFailed {
                    table: table.to_string(),
                    source,
                }
            })?;
        Ok(rows.into_iter().next().map(into_record))
    }

    /// Rows whose columns equal every entry of `conditions`.
    pub async fn read(&self, table: &str, conditions: &Map<String, Value>) -> Result<Vec<Row>> {
        self.search(table, &Filter::from_conditions(conditions)).await
    }

    pub async fn search(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let descriptor = self.schema.table(table)?;
        let (sql, params) = filter.build(descriptor)?;
        let rows = self.run(&sql, &params).await.map_err(|source| {
            warn!(table = %table, error = %source, "read failed");
            OrmError::ReadFailed {
                table: table.to_string(),
                source,
            }
        })?;
        Ok(rows.into_iter().map(into_record).collect())
    }
}

/// Unwraps the json object returned under [`RECORD_COLUMN`]; rows of any
/// other shape pass through unchanged.
fn into_record(mut row: Row) -> Row {
    if row.len() == 1 {
        match row.remove(RECORD_COLUMN) {
            Some(Value::Object(record)) => return record,
            Some(other) => {
                row.insert(RECORD_COLUMN.to_string(), other);
            }
            None => {}
        }
    }
    row
}
