use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;

use crate::libs::config::DatabaseConfig;
use crate::libs::connection::{ConnectionProvider, Lease, PgProvider, Row};
use crate::libs::error::{OrmError, Result};
use crate::libs::repository::Repository;
use crate::libs::schema::Schema;
use crate::libs::sync::{ReconcileReport, SyncEvent, Synchronizer};
use crate::libs::table::{Entity, Table};

/// Entry point tying a connection provider to a schema.
pub struct Orm {
    provider: Arc<dyn ConnectionProvider>,
    schema: Arc<Schema>,
    synchronizer: Synchronizer,
    repository: Repository,
}

impl Orm {
    /// Connects a PostgreSQL pool using `config`.
    pub async fn connect(config: &DatabaseConfig, schema: Schema) -> Result<Self> {
        info!(max_connections = config.max_connections, "connecting to database");
        let provider = PgProvider::connect(config)
            .await
            .map_err(OrmError::ConnectionUnavailable)?;
        Ok(Self::with_provider(Arc::new(provider), schema))
    }

    pub fn with_provider(provider: Arc<dyn ConnectionProvider>, schema: Schema) -> Self {
        let schema = Arc::new(schema);
        Self {
            synchronizer: Synchronizer::new(provider.clone()),
            repository: Repository::new(provider.clone(), schema.clone()),
            provider,
            schema,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Creates and widens every table of the schema, in order.
    pub async fn migrate(&self) -> Result<Vec<ReconcileReport>> {
        self.synchronizer.sync_all(&self.schema).await
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    pub fn repository(&self) -> Repository {
        self.repository.clone()
    }

    /// Typed handle for an entity's table. The table must be part of the schema.
    pub fn table<T: Entity>(&self) -> Result<Table<T>> {
        let descriptor = T::descriptor()?;
        let declared = self.schema.table(descriptor.name())?;
        Ok(Table::new(self.repository(), declared.name()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.synchronizer.subscribe()
    }

    /// Executes a raw SQL statement outside the schema checks.
    pub async fn raw(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut lease = Lease::acquire(self.provider.as_ref()).await?;
        lease.execute(sql, params).await.map_err(OrmError::RawFailed)
    }
}
