//! Keeps PostgreSQL tables in step with declared table descriptors and
//! offers generic single-row CRUD over them.
//!
//! ```ignore
//! use schemasync::*;
//!
//! let orm = Orm::connect(&DatabaseConfig::from_env()?, Schema::new(vec![User::descriptor()?])?).await?;
//! orm.migrate().await?;
//! let users = orm.table::<User>()?;
//! let ada = users.insert(&User { id: 1, name: "Ada".into(), email: None }).await?;
//! ```

// lets the derive macro refer to `::schemasync` from inside this crate
extern crate self as schemasync;

pub mod libs;

pub use libs::*;
pub use schemasync_derive::Entity;
