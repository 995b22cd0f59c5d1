//! # porta-db
//!
//! Driver-independent SQL execution. Application SQL is written once in a
//! vendor-neutral portability syntax, named binds (`:name`) plus
//! `[:op key=value ...]` directives, and runs unmodified against
//! PostgreSQL-, Oracle-, and SQLite-family backends:
//!
//! ```text
//! SELECT account_id, expire_date
//! FROM [:table schema=ident name=account_info]
//! WHERE owner_id = :owner_id
//! ```
//!
//! A [`Cursor`] translates each statement once per backend (caching by
//! raw statement text), marshals the parameter map into the driver's
//! paramstyle, and maps every driver-native error onto one canonical
//! [`ErrorKind`](porta_core::errors::ErrorKind) hierarchy.

pub mod cursor;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod params;
pub mod row;
pub mod scan;
pub mod translate;

pub use cursor::Cursor;
pub use database::{connect, sql_pattern, Connection};
pub use dialect::{descriptor, register_descriptor, DialectContext, DriverDescriptor};
pub use driver::{register_driver, Driver, DriverConnection, DriverCursor};
pub use params::{BindArgs, ParamConverter, ParamStyle};
pub use row::{QueryOne, Row, RowStream};
pub use translate::{translate, Translation};
