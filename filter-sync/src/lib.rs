//! #filter-sync
//!
//! Keeps the filter state of a data table in step with two persistence backends: the query string of the page
//! address and a device-resident local store.
//!
//! Each filterable column declares a filter variant (text, number, date, date range, number range, select or
//! multi-select) and, optionally, which backend its value is persisted in. `FilterSync` restores the table's
//! filters from the backends on mount, sanitizing every stored value against its column's metadata, writes only
//! the filters that actually changed when the user edits them, and re-validates stored select values once their
//! option lists finish loading.

pub mod column;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod routing;
pub mod sanitize;
pub mod store;
pub mod table;
pub mod value;

pub use column::ColumnDef;
pub use config::SyncConfig;
pub use engine::FilterSync;
pub use error::FilterSyncError;
pub use filter::{ColumnFilter, FilterKind, FilterVariant, LoadingState, PersistenceTarget, SelectOption};
pub use store::{address::UrlStore, local::LocalStore, FilterStore, MemoryStore};
pub use table::{FilterEntry, FilterTable, FilterUpdate};
