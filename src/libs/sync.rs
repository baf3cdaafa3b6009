//! Table synchronizer: creates tables from descriptors and widens them as
//! descriptors gain fields.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::libs::connection::{ConnectionProvider, Lease};
use crate::libs::ddl;
use crate::libs::error::{OrmError, Result};
use crate::libs::schema::{Schema, TableDescriptor};

const EVENT_CAPACITY: usize = 64;

/// Where a table stands as far as this synchronizer has seen.
///
/// `reconcile_columns` on a table this synchronizer never ensured moves it
/// straight from `Unknown` to `Reconciled`: a successful pass means the
/// table exists, whoever created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Unknown,
    Created,
    Reconciled,
}

/// Notifications published while synchronizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    TableCreated { table: String },
    ColumnAdded { table: String, column: String },
    Initialized { tables: Vec<String> },
}

/// Columns added by one reconciliation pass, in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub table: String,
    pub added: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

pub struct Synchronizer {
    provider: Arc<dyn ConnectionProvider>,
    states: Mutex<HashMap<String, TableState>>,
    events: broadcast::Sender<SyncEvent>,
}

impl Synchronizer {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            provider,
            states: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn state(&self, table: &str) -> TableState {
        self.states
            .lock()
            .get(table)
            .copied()
            .unwrap_or(TableState::Unknown)
    }

    fn set_state(&self, table: &str, state: TableState) {
        self.states.lock().insert(table.to_string(), state);
    }

    fn emit(&self, event: SyncEvent) {
        // no subscribers is not an error
        let _ = self.events.send(event);
    }

    /// Issues one `CREATE TABLE IF NOT EXISTS` for the descriptor.
    pub async fn ensure_table(&self, table: &TableDescriptor) -> Result<()> {
        let sql = ddl::create_table(table);
        let mut lease = Lease::acquire(self.provider.as_ref()).await?;
        lease.execute(&sql, &[]).await.map_err(|source| {
            warn!(table = %table.name(), error = %source, "table creation failed");
            OrmError::TableCreationFailed {
                table: table.name().to_string(),
                source,
            }
        })?;
        drop(lease);

        info!(table = %table.name(), "table ensured");
        if self.state(table.name()) == TableState::Unknown {
            self.set_state(table.name(), TableState::Created);
        }
        self.emit(SyncEvent::TableCreated {
            table: table.name().to_string(),
        });
        Ok(())
    }

    /// Adds every descriptor field missing from the table, one statement per
    /// column. A failure stops the pass; columns added before it stay.
    pub async fn reconcile_columns(&self, table: &TableDescriptor) -> Result<ReconcileReport> {
        let mut lease = Lease::acquire(self.provider.as_ref()).await?;
        let rows = lease
            .execute(
                ddl::existing_columns(),
                &[Value::String(table.name().to_string())],
            )
            .await
            .map_err(|source| OrmError::CatalogReadFailed {
                table: table.name().to_string(),
                source,
            })?;
        let existing: HashSet<String> = rows
            .iter()
            .filter_map(|row| row.get("column_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        let mut report = ReconcileReport {
            table: table.name().to_string(),
            added: Vec::new(),
        };
        for field in table.fields() {
            if existing.contains(&field.name) {
                continue;
            }
            let sql = ddl::add_column(table, field);
            if let Err(source) = lease.execute(&sql, &[]).await {
                warn!(
                    table = %table.name(),
                    column = %field.name,
                    error = %source,
                    "column addition failed"
                );
                return Err(OrmError::ColumnAdditionFailed {
                    table: table.name().to_string(),
                    column: field.name.clone(),
                    added: report.added,
                    source,
                });
            }
            info!(table = %table.name(), column = %field.name, "column added");
            self.emit(SyncEvent::ColumnAdded {
                table: table.name().to_string(),
                column: field.name.clone(),
            });
            report.added.push(field.name.clone());
        }
        drop(lease);

        self.set_state(table.name(), TableState::Reconciled);
        Ok(report)
    }

    /// Ensures the table exists, then reconciles its columns.
    pub async fn sync(&self, table: &TableDescriptor) -> Result<ReconcileReport> {
        self.ensure_table(table).await?;
        self.reconcile_columns(table).await
    }

    /// Syncs every table in schema order. Tables referenced by foreign keys
    /// must come before the tables referencing them.
    pub async fn sync_all(&self, schema: &Schema) -> Result<Vec<ReconcileReport>> {
        let mut reports = Vec::with_capacity(schema.tables().len());
        for table in schema.tables() {
            reports.push(self.sync(table).await?);
        }
        let tables: Vec<String> = schema.tables().iter().map(|t| t.name().to_string()).collect();
        info!(tables = tables.len(), "database initialized");
        self.emit(SyncEvent::Initialized { tables });
        Ok(reports)
    }
}
