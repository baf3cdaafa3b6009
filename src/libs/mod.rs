pub mod config;
pub mod connection;
pub mod ddl;
pub mod error;
pub mod orm;
pub mod query_builder;
pub mod repository;
pub mod schema;
pub mod sync;
pub mod table;
pub mod type_mapper;

// Re-export them for easier access from the crate root
pub use config::*;
pub use connection::*;
pub use error::*;
pub use orm::*;
pub use query_builder::*;
pub use repository::*;
pub use schema::*;
pub use sync::*;
pub use table::*;
pub use type_mapper::*;
