use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::libs::connection::Row;
use crate::libs::error::{OrmError, Result};
use crate::libs::query_builder::Filter;
use crate::libs::repository::Repository;
use crate::libs::schema::TableDescriptor;

/// A struct stored as one row of a table.
///
/// Usually implemented with `#[derive(Entity)]`.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    fn descriptor() -> Result<TableDescriptor>;
}

/// A typed handle to a database table.
pub struct Table<T> {
    repository: Repository,
    name: String,
    _marker: PhantomData<T>,
}

impl<T> Table<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Create a new table handle.
    /// ```ignore
    /// let users = Table::<User>::new(orm.repository(), "users");
    /// ```
    pub fn new(repository: Repository, name: &str) -> Self {
        Self {
            repository,
            name: name.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a new record and return it as stored.
    ///
    /// `null` fields are left out so column defaults apply.
    pub async fn insert(&self, item: &T) -> Result<T> {
        let fields = to_fields(item)?;
        let fields: Map<String, Value> = fields.into_iter().filter(|(_, v)| !v.is_null()).collect();
        let row = self.repository.insert(&self.name, &fields).await?;
        from_row(row)
    }

    /// Apply a partial update to the record with primary key `id`.
    ///
    /// # Example
    /// ```ignore
    /// users.update(json!(1), json!({"name": "Joe"})).await?;
    /// ```
    pub async fn update(&self, id: impl Into<Value>, changes: Value) -> Result<Option<T>> {
        let changes = match changes {
            Value::Object(map) => map,
            other => {
                return Err(OrmError::Serialization(serde::de::Error::custom(format!(
                    "updates must be an object, got {other}"
                ))));
            }
        };
        let row = self.repository.update(&self.name, &id.into(), &changes).await?;
        row.map(from_row).transpose()
    }

    /// Delete the record with primary key `id`, returning what was removed.
    pub async fn delete(&self, id: impl Into<Value>) -> Result<Option<T>> {
        let row = self.repository.delete(&self.name, &id.into()).await?;
        row.map(from_row).transpose()
    }

    pub async fn find(&self, filter: Filter) -> Result<Vec<T>> {
        let rows = self.repository.search(&self.name, &filter).await?;
        rows.into_iter().map(from_row).collect()
    }

    pub async fn first(&self, filter: Filter) -> Result<Option<T>> {
        let mut found = self.find(filter.limit(1)).await?;
        Ok(if found.is_empty() { None } else { Some(found.remove(0)) })
    }

    pub async fn all(&self) -> Result<Vec<T>> {
        self.find(Filter::new()).await
    }
}

fn to_fields<T: Serialize>(item: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(item)? {
        Value::Object(map) => Ok(map),
        other => Err(OrmError::Serialization(serde::ser::Error::custom(format!(
            "records must serialize to an object, got {other}"
        )))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Operator {
        id: i64,
        name: String,
        rarity: Option<i64>,
    }

    #[test]
    fn test_to_fields_and_back() {
        let op = Operator {
            id: 1,
            name: "Texas".into(),
            rarity: None,
        };
        let fields = to_fields(&op).unwrap();
        assert_eq!(fields.get("rarity"), Some(&Value::Null));
        let back: Operator = from_row(fields).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(matches!(to_fields(&42), Err(OrmError::Serialization(_))));
    }

    #[test]
    fn test_from_row_reports_shape_mismatch() {
        let mut row = Row::new();
        row.insert("id".into(), json!("not a number"));
        let result: Result<Operator> = from_row(row);
        assert!(matches!(result, Err(OrmError::Serialization(_))));
    }
}
