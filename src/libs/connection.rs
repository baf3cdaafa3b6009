//! Connection provider seam and its PostgreSQL implementation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgColumn, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row as _, TypeInfo};
use tracing::debug;

use crate::libs::config::DatabaseConfig;
use crate::libs::error::{OrmError, Result};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// A connection handed out by a [`ConnectionProvider`].
#[async_trait]
pub trait Connection: Send {
    /// Runs one statement with positional parameters and returns its rows.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<Vec<Row>, sqlx::Error>;

    /// Gives the connection back. Consumes the handle, so it runs at most once.
    fn release(self: Box<Self>);
}

#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> std::result::Result<Box<dyn Connection>, sqlx::Error>;
}

/// Scoped acquisition of one connection.
///
/// The connection is released when the lease is dropped: after success,
/// after an error, or when the future owning the lease is cancelled.
pub struct Lease {
    conn: Option<Box<dyn Connection>>,
}

impl Lease {
    pub async fn acquire(provider: &dyn ConnectionProvider) -> Result<Self> {
        Self::try_acquire(provider)
            .await
            .map_err(OrmError::ConnectionUnavailable)
    }

    /// Like [`Lease::acquire`], keeping the provider's own error.
    pub async fn try_acquire(provider: &dyn ConnectionProvider) -> std::result::Result<Self, sqlx::Error> {
        let conn = provider.acquire().await?;
        Ok(Self { conn: Some(conn) })
    }

    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<Vec<Row>, sqlx::Error> {
        debug!(sql = %sql, params = params.len(), "executing statement");
        match self.conn.as_mut() {
            Some(conn) => conn.execute(sql, params).await,
            None => Err(sqlx::Error::PoolClosed),
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.release();
        }
    }
}

/// Provider backed by a `sqlx` PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgProvider {
    pool: PgPool,
}

impl PgProvider {
    pub async fn connect(config: &DatabaseConfig) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConnectionProvider for PgProvider {
    async fn acquire(&self) -> std::result::Result<Box<dyn Connection>, sqlx::Error> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgPooledConnection { conn }))
    }
}

struct PgPooledConnection {
    conn: PoolConnection<Postgres>,
}

#[async_trait]
impl Connection for PgPooledConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> std::result::Result<Vec<Row>, sqlx::Error> {
        let mut query = sqlx::query(sql);
        for value in params {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(&mut *self.conn).await?;
        rows.iter().map(decode_row).collect()
    }

    fn release(self: Box<Self>) {
        // dropping a PoolConnection returns it to the pool
        drop(self.conn);
    }
}

#[derive(Debug, PartialEq)]
enum NumberParam {
    Int(i64),
    Float(f64),
    Text(String),
}

fn number_param(n: &Number) -> NumberParam {
    if let Some(i) = n.as_i64() {
        return NumberParam::Int(i);
    }
    match n.as_f64() {
        Some(f) if n.is_f64() => NumberParam::Float(f),
        // u64 above i64::MAX; the placeholder's ::NUMERIC cast keeps it exact
        _ => NumberParam::Text(n.to_string()),
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        Value::Number(n) => match number_param(n) {
            NumberParam::Int(i) => query.bind(i),
            NumberParam::Float(f) => query.bind(f),
            NumberParam::Text(s) => query.bind(s),
        },
        Value::Bool(b) => query.bind(*b),
        Value::Null => query.bind(None::<String>),
        other => query.bind(sqlx::types::Json(other.clone())),
    }
}

fn decode_row(row: &PgRow) -> std::result::Result<Row, sqlx::Error> {
    let mut map = Map::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), decode_column(row, col)?);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, col: &PgColumn) -> std::result::Result<Value, sqlx::Error> {
    let index = col.ordinal();
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<Decimal>, _>(index) {
        return Ok(v.map(decimal_to_json).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<Value>, _>(index) {
        return Ok(v.unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return Ok(v
            .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            .unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return Ok(v
            .map(|ts| Value::from(ts.to_rfc3339()))
            .unwrap_or(Value::Null));
    }
    Err(sqlx::Error::ColumnDecode {
        index: col.name().to_string(),
        source: format!("no json mapping for column type {}", col.type_info().name()).into(),
    })
}

/// NUMERIC as a json number when the number is exact, otherwise as its
/// decimal text.
fn decimal_to_json(d: Decimal) -> Value {
    let text = d.normalize().to_string();
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = text.parse::<u64>() {
        return Value::from(u);
    }
    match text.parse::<f64>() {
        Ok(f) if f.to_string() == text => Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}
