//! The reconciliation engine that keeps a table's filters in step with the address and local stores.
//!
//! A `FilterSync` owns both stores. Each pass takes one snapshot of the stores, computes its writes with the pure
//! functions in `reconcile`, and writes at most one patch per store. Passes are driven by the host:
//!
//! * `mount` once, to get the table's initial filter list and to seed the stores on a first visit,
//! * `set_filters` (or `on_filters_change`) whenever the user changes a filter,
//! * `on_options_loaded` on every render, so that stored select values are re-validated when their options arrive.

pub mod reconcile;

use crate::{
    column::{flatten_columns, ColumnDef},
    config::SyncConfig,
    error::FilterSyncError as Error,
    routing::{persisted_columns, url_codecs, PersistedColumn},
    store::{address::UrlStore, local::LocalStore, BucketPatches, Buckets, FilterStore},
    table::{FilterEntry, FilterTable, FilterUpdate},
};
use log::debug;
use reconcile::{bootstrap_filters, diff_filters, reconcile_loaded, seed_filters, Correction};
use std::{collections::HashMap, path::Path};

/// Reconciles a table's filter list with an address store and a local store
#[derive(Debug)]
pub struct FilterSync<U: FilterStore, L: FilterStore> {
    url: U,
    local: L,
    config: SyncConfig,
    /// Latch for the initial-state seeder
    seeded: bool,
    /// Aggregate "no select filter is loading" status at the last post-load pass
    all_loaded: Option<bool>,
    /// Per column, whether its options were settled at the last post-load pass
    settled: HashMap<String, bool>,
}

impl FilterSync<UrlStore, LocalStore> {
    /// Create an engine over the page's query string and a local store file in `local_dir`.
    ///
    /// The address store is namespaced and given the codecs of the address-persisted filters of `columns`.
    pub fn open(
        query: &str,
        local_dir: &Path,
        columns: &[ColumnDef],
        config: SyncConfig,
    ) -> Result<Self, Error> {
        let mut url = UrlStore::new(query).with_codecs(url_codecs(columns)?);
        if let Some(namespace) = &config.url_namespace {
            url = url.with_namespace(namespace);
        }
        let local = LocalStore::open(local_dir, &config.local_storage_key)?;

        Ok(Self::new(url, local, config))
    }
}

impl<U: FilterStore, L: FilterStore> FilterSync<U, L> {
    pub fn new(url: U, local: L, config: SyncConfig) -> Self {
        Self {
            url,
            local,
            config,
            seeded: false,
            all_loaded: None,
            settled: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn url_store(&self) -> &U {
        &self.url
    }

    pub fn local_store(&self) -> &L {
        &self.local
    }

    /// Give back both stores
    pub fn into_stores(self) -> (U, L) {
        (self.url, self.local)
    }

    fn buckets(&self) -> Buckets {
        Buckets {
            url: self.url.snapshot(),
            local: self.local.snapshot(),
        }
    }

    fn write(&mut self, patches: BucketPatches) -> Result<(), Error> {
        let BucketPatches { url, local } = patches;
        if !url.is_empty() {
            debug!("Writing {} filter key(s) to the address store", url.len());
            self.url.patch(url)?;
        }
        if !local.is_empty() {
            debug!("Writing {} filter key(s) to the local store", local.len());
            self.local.patch(local)?;
        }
        Ok(())
    }

    /// The filter list the table should start with.
    ///
    /// Falls back to `initial` when the stores hold nothing usable.
    pub fn initial_filters(
        &self,
        columns: &[ColumnDef],
        initial: &[FilterEntry],
    ) -> Result<Vec<FilterEntry>, Error> {
        let persisted = persisted_columns(columns)?;
        Ok(bootstrap_filters(
            &persisted,
            &self.buckets(),
            initial,
            self.config.optimistic_loading,
        ))
    }

    /// Persist `initial` if no filter has a stored value yet.
    ///
    /// Runs at most once per engine; later calls do nothing. Returns `true` if anything was written.
    pub fn seed_initial(&mut self, columns: &[ColumnDef], initial: &[FilterEntry]) -> Result<bool, Error> {
        if self.seeded {
            return Ok(false);
        }
        self.seeded = true;

        let persisted = persisted_columns(columns)?;
        let patches = seed_filters(&persisted, &self.buckets(), initial);
        let wrote = !patches.is_empty();
        self.write(patches)?;
        Ok(wrote)
    }

    /// Compute the table's initial filter list, then seed the stores from `initial` on a first visit
    pub fn mount(
        &mut self,
        columns: &[ColumnDef],
        initial: &[FilterEntry],
    ) -> Result<Vec<FilterEntry>, Error> {
        let filters = self.initial_filters(columns, initial)?;
        self.seed_initial(columns, initial)?;
        Ok(filters)
    }

    /// Apply a filter update to `previous` and write the changed filters to their stores.
    ///
    /// Returns the next filter list for the table.
    pub fn on_filters_change<F: Into<FilterUpdate>>(
        &mut self,
        columns: &[ColumnDef],
        previous: &[FilterEntry],
        update: F,
    ) -> Result<Vec<FilterEntry>, Error> {
        let persisted = persisted_columns(columns)?;
        let next = update.into().apply(previous);
        self.write(diff_filters(&persisted, previous, &next))?;
        Ok(next)
    }

    /// Change the filters of a table, persisting the change
    pub fn set_filters<T: FilterTable, F: Into<FilterUpdate>>(
        &mut self,
        columns: &[ColumnDef],
        table: &mut T,
        update: F,
    ) -> Result<(), Error> {
        let previous = table.filters();
        let next = self.on_filters_change(columns, &previous, update)?;
        table.set_filters(next.into());
        Ok(())
    }

    /// Re-validate stored select values whose options just finished loading.
    ///
    /// Does nothing unless the aggregate loading status of the select filters changed since the last call, so it is
    /// safe to call on every render. Returns `true` if a store or the table was corrected.
    ///
    /// The loading status is only remembered once the corrections are written, so a pass whose store write fails
    /// runs again on the next call.
    pub fn on_options_loaded<T: FilterTable>(
        &mut self,
        columns: &[ColumnDef],
        table: &mut T,
    ) -> Result<bool, Error> {
        let all_loaded = flatten_columns(columns)
            .into_iter()
            .filter_map(|column| column.filter.as_ref()?.kind.select_state())
            .all(|state| state.loading.is_settled());
        if self.all_loaded == Some(all_loaded) {
            return Ok(false);
        }

        let persisted = persisted_columns(columns)?;
        let mut settled = self.settled.clone();
        let mut just_loaded: Vec<&PersistedColumn> = Vec::new();
        for column in &persisted {
            let Some(state) = column.filter.kind.select_state() else {
                continue;
            };
            let is_settled = state.loading.is_settled();
            let was_settled = settled.insert(column.id.clone(), is_settled);
            if is_settled && was_settled != Some(true) {
                just_loaded.push(column);
            }
        }

        let result = reconcile_loaded(&just_loaded, &self.buckets(), &table.filters());
        for correction in &result.corrections {
            debug!(
                "Options for filter {} loaded; table value is now {:?}",
                correction.id, correction.value
            );
        }
        let corrected = !result.is_empty();

        self.write(result.patches)?;
        if !result.corrections.is_empty() {
            table.set_filters(apply_corrections(result.corrections));
        }
        self.all_loaded = Some(all_loaded);
        self.settled = settled;
        Ok(corrected)
    }
}

fn apply_corrections(corrections: Vec<Correction>) -> FilterUpdate {
    FilterUpdate::new(move |current| {
        let mut next: Vec<FilterEntry> = current
            .iter()
            .filter(|entry| corrections.iter().all(|correction| correction.id != entry.id))
            .cloned()
            .collect();
        next.extend(corrections.into_iter().filter_map(|correction| {
            correction
                .value
                .map(|value| FilterEntry::new(&correction.id, value))
        }));
        next
    })
}
