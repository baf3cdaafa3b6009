#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use schemasync::{Connection, ConnectionProvider, Row};
use serde_json::Value;

type Responder = dyn Fn(&str, &[Value]) -> Result<Vec<Row>, sqlx::Error> + Send + Sync;

/// Every statement seen by a [`MockProvider`], plus acquire/release counts.
#[derive(Default)]
pub struct Recorder {
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl Recorder {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.statements.lock()[index].1.clone()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// Provider whose connections answer every statement through a closure.
pub struct MockProvider {
    recorder: Arc<Recorder>,
    responder: Arc<Responder>,
    exhausted: bool,
}

impl MockProvider {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &[Value]) -> Result<Vec<Row>, sqlx::Error> + Send + Sync + 'static,
    {
        Self {
            recorder: Arc::new(Recorder::default()),
            responder: Arc::new(responder),
            exhausted: false,
        }
    }

    /// Answers every statement with no rows.
    pub fn silent() -> Self {
        Self::new(|_, _| Ok(vec![]))
    }

    /// Every acquire times out.
    pub fn exhausted() -> Self {
        Self {
            exhausted: true,
            ..Self::silent()
        }
    }

    pub fn recorder(&self) -> Arc<Recorder> {
        self.recorder.clone()
    }
}

struct MockConnection {
    recorder: Arc<Recorder>,
    responder: Arc<Responder>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, sqlx::Error> {
        self.recorder
            .statements
            .lock()
            .push((sql.to_string(), params.to_vec()));
        (self.responder)(sql, params)
    }

    fn release(self: Box<Self>) {
        self.recorder.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn acquire(&self) -> Result<Box<dyn Connection>, sqlx::Error> {
        if self.exhausted {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.recorder.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            recorder: self.recorder.clone(),
            responder: self.responder.clone(),
        }))
    }
}

pub fn is_catalog_query(sql: &str) -> bool {
    sql.contains("information_schema.columns")
}

/// Rows as returned by the column catalog query.
pub fn catalog_rows(columns: &[&str]) -> Vec<Row> {
    columns
        .iter()
        .map(|name| {
            let mut row = Row::new();
            row.insert("column_name".into(), Value::from(*name));
            row
        })
        .collect()
}

/// One row as returned by a `RETURNING to_jsonb(...)` statement.
pub fn record_row(record: Value) -> Vec<Row> {
    let mut row = Row::new();
    row.insert("record".into(), record);
    vec![row]
}

pub fn engine_error(message: &str) -> sqlx::Error {
    sqlx::Error::Protocol(message.into())
}
