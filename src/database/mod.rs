/*!
 * SQLite persistence for the translation ledger.
 *
 * - `schema`: tables and migrations
 * - `connection`: shared connection with blocking-pool access
 * - `models`: job and unit entry records
 * - `repository`: the SQL behind every ledger operation
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{JobRecord, JobStatus, LedgerEntry, UnitCounts};
pub use repository::Repository;
