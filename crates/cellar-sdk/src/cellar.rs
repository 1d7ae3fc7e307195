//! The [`Cellar`]: store registry and cell registry under one lock.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use cellar_cells::{CellRegistry, InMemoryCellRegistry};
use cellar_schema::{ReconcileReport, SchemaStore};
use cellar_types::Schema;
use tracing::{debug, info};

use crate::accessor::Accessor;
use crate::config::CellarConfig;
use crate::error::{CellarResult, SnapshotError};
use crate::medium::{FileMedium, InMemoryMedium, Medium};
use crate::origin::KeySource;
use crate::snapshot::Snapshot;

/// Everything guarded by the cellar lock.
pub(crate) struct CellarState {
    pub(crate) roots: BTreeMap<String, SchemaStore>,
    pub(crate) cells: InMemoryCellRegistry,
    /// Bumped whenever the whole state is replaced; accessors bound to an
    /// older epoch are expired.
    pub(crate) epoch: u64,
}

impl CellarState {
    fn from_snapshot(snapshot: Snapshot, epoch: u64) -> Self {
        Self {
            roots: snapshot.roots,
            cells: snapshot.uids,
            epoch,
        }
    }
}

/// A schema-backed cell store.
///
/// Maps origins to [`SchemaStore`]s (at most one per origin) and owns the
/// cells those stores point at. Both registries share a single `RwLock`, so
/// a schema migration is never observed half-done and same-origin
/// operations never interleave.
///
/// The cellar reads its persisted state once, at [`Cellar::open`], and
/// writes it only on [`Cellar::flush`]. When to flush is the caller's
/// decision.
pub struct Cellar {
    state: Arc<RwLock<CellarState>>,
    medium: Arc<dyn Medium>,
    config: CellarConfig,
}

impl Cellar {
    /// An empty cellar backed by an in-memory medium.
    pub fn in_memory() -> Self {
        Self {
            state: Arc::new(RwLock::new(CellarState::from_snapshot(Snapshot::default(), 0))),
            medium: Arc::new(InMemoryMedium::new()),
            config: CellarConfig::default(),
        }
    }

    /// Open a cellar from `medium`, or start empty if it holds nothing.
    ///
    /// Both blobs must be present or both absent; a medium holding only one
    /// is refused rather than half-loaded.
    pub fn open(medium: Arc<dyn Medium>, config: CellarConfig) -> CellarResult<Self> {
        let roots = medium.load(&config.roots_file)?;
        let uids = medium.load(&config.uids_file)?;

        let snapshot = match (roots, uids) {
            (None, None) => {
                debug!("medium is empty, starting fresh");
                Snapshot::default()
            }
            (Some(roots), Some(uids)) => Snapshot::from_sections(&roots, &uids)?,
            (None, Some(_)) => return Err(SnapshotError::MissingSection("roots").into()),
            (Some(_), None) => return Err(SnapshotError::MissingSection("uids").into()),
        };
        info!(
            stores = snapshot.roots.len(),
            cells = snapshot.uids.len(),
            "cellar opened"
        );

        Ok(Self {
            state: Arc::new(RwLock::new(CellarState::from_snapshot(snapshot, 0))),
            medium,
            config,
        })
    }

    /// Open the file medium at `config.data_dir`.
    pub fn open_dir(config: CellarConfig) -> CellarResult<Self> {
        let medium = Arc::new(FileMedium::new(config.data_dir.clone()));
        Self::open(medium, config)
    }

    /// Get an accessor for the store of `source`.
    ///
    /// - Unknown origin: the store is created with `schema` (or an empty
    ///   schema when `None`).
    /// - Known origin with `Some(schema)`: the store is migrated to it.
    /// - Known origin with `None`: the store is left untouched.
    ///
    /// Every call returns a fresh accessor; all accessors for one origin see
    /// the same store.
    pub fn retrieve<'a>(
        &self,
        source: impl Into<KeySource<'a>>,
        schema: Option<Schema>,
    ) -> CellarResult<Accessor> {
        let (accessor, _) = self.retrieve_with_report(source, schema)?;
        Ok(accessor)
    }

    /// Like [`Cellar::retrieve`], also returning what the create or
    /// migration did. The report is `None` for a pure retrieval.
    pub fn retrieve_with_report<'a>(
        &self,
        source: impl Into<KeySource<'a>>,
        schema: Option<Schema>,
    ) -> CellarResult<(Accessor, Option<ReconcileReport>)> {
        let origin = source.into().resolve()?;

        let mut guard = self.state.write().expect("lock poisoned");
        let CellarState { roots, cells, epoch } = &mut *guard;

        let report = match roots.get_mut(&origin) {
            Some(store) => match schema {
                Some(schema) => Some(store.reconcile(schema, cells)?),
                None => None,
            },
            None => {
                let schema = schema.unwrap_or_default();
                let fields = schema.len();
                let store = SchemaStore::create(origin.clone(), schema, cells)?;
                roots.insert(origin.clone(), store);
                debug!(%origin, fields, "store created");
                None
            }
        };

        Ok((Accessor::new(Arc::clone(&self.state), origin, *epoch), report))
    }

    /// Origins of all stores, sorted.
    pub fn origins(&self) -> Vec<String> {
        let guard = self.state.read().expect("lock poisoned");
        guard.roots.keys().cloned().collect()
    }

    pub fn contains(&self, origin: &str) -> bool {
        let guard = self.state.read().expect("lock poisoned");
        guard.roots.contains_key(origin)
    }

    /// Number of live cells across all stores.
    pub fn cell_count(&self) -> usize {
        let guard = self.state.read().expect("lock poisoned");
        guard.cells.len()
    }

    /// Copy of the complete current state.
    pub fn snapshot(&self) -> Snapshot {
        let guard = self.state.read().expect("lock poisoned");
        Snapshot {
            roots: guard.roots.clone(),
            uids: guard.cells.clone(),
        }
    }

    /// Export the complete state as one JSON document.
    pub fn export_all(&self) -> CellarResult<String> {
        Ok(self.snapshot().to_json(self.config.pretty)?)
    }

    /// Replace the complete state with the document produced by
    /// [`Cellar::export_all`].
    ///
    /// On any error the current state is left untouched. On success every
    /// outstanding accessor expires.
    pub fn import_all(&self, blob: &str) -> CellarResult<()> {
        let snapshot = Snapshot::from_json(blob)?;
        self.restore(snapshot)
    }

    /// Replace the complete state with `snapshot`, after validating it.
    pub fn restore(&self, snapshot: Snapshot) -> CellarResult<()> {
        snapshot.validate()?;
        let mut guard = self.state.write().expect("lock poisoned");
        let epoch = guard.epoch + 1;
        info!(
            stores = snapshot.roots.len(),
            cells = snapshot.uids.len(),
            epoch,
            "cellar state replaced"
        );
        *guard = CellarState::from_snapshot(snapshot, epoch);
        Ok(())
    }

    /// Write the complete state to the medium.
    pub fn flush(&self) -> CellarResult<()> {
        let (roots, uids) = self.snapshot().to_sections(self.config.pretty)?;
        self.medium.store_all(&[
            (self.config.roots_file.as_str(), roots.as_str()),
            (self.config.uids_file.as_str(), uids.as_str()),
        ])?;
        debug!("cellar flushed");
        Ok(())
    }
}

impl Default for Cellar {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl fmt::Debug for Cellar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.read().expect("lock poisoned");
        f.debug_struct("Cellar")
            .field("store_count", &guard.roots.len())
            .field("cell_count", &guard.cells.len())
            .field("epoch", &guard.epoch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellarError;
    use cellar_types::Value;

    fn player_schema() -> Schema {
        Schema::new()
            .with_field("name", "string")
            .with_field("hp", "number")
    }

    // -----------------------------------------------------------------------
    // Retrieval
    // -----------------------------------------------------------------------

    #[test]
    fn retrieve_creates_store_once() {
        let cellar = Cellar::in_memory();
        cellar.retrieve("player", Some(player_schema())).unwrap();
        cellar.retrieve("player", Some(player_schema())).unwrap();

        assert_eq!(cellar.origins(), vec!["player"]);
        assert_eq!(cellar.cell_count(), 2);
    }

    #[test]
    fn accessors_share_one_store() {
        let cellar = Cellar::in_memory();
        let a = cellar.retrieve("player", Some(player_schema())).unwrap();
        let b = cellar.retrieve("player", None).unwrap();

        a.set("name", "Vik").unwrap();
        assert_eq!(b.get("name").unwrap(), Some(Value::from("Vik")));
    }

    #[test]
    fn retrieve_without_schema_leaves_store_untouched() {
        let cellar = Cellar::in_memory();
        cellar.retrieve("player", Some(player_schema())).unwrap();
        let before = cellar.snapshot();

        let (accessor, report) = cellar.retrieve_with_report("player", None).unwrap();
        assert!(report.is_none());
        assert_eq!(cellar.snapshot(), before);
        assert_eq!(accessor.fields().unwrap(), vec!["hp", "name"]);
    }

    #[test]
    fn retrieve_unknown_origin_without_schema_is_empty() {
        let cellar = Cellar::in_memory();
        let accessor = cellar.retrieve("later", None).unwrap();
        assert!(accessor.fields().unwrap().is_empty());
        assert!(matches!(
            accessor.get("anything"),
            Err(CellarError::UnknownProperty { .. })
        ));
        assert!(cellar.contains("later"));
    }

    #[test]
    fn retrieve_reports_migration() {
        let cellar = Cellar::in_memory();
        cellar.retrieve("player", Some(player_schema())).unwrap();

        let (_, report) = cellar
            .retrieve_with_report("player", Some(Schema::new().with_field("name", "string")))
            .unwrap();
        let report = report.unwrap();
        assert_eq!(report.removed, vec!["hp"]);
        assert_eq!(report.kept, vec!["name"]);
        assert_eq!(cellar.cell_count(), 1);
    }

    #[test]
    fn retrieve_invalid_origin_changes_nothing() {
        let cellar = Cellar::in_memory();
        let err = cellar.retrieve("", Some(player_schema())).unwrap_err();
        assert!(matches!(err, CellarError::InvalidOrigin(_)));
        assert!(cellar.origins().is_empty());
        assert_eq!(cellar.cell_count(), 0);
    }

    #[test]
    fn migration_through_one_accessor_is_seen_by_another() {
        let cellar = Cellar::in_memory();
        let old = cellar.retrieve("player", Some(player_schema())).unwrap();
        cellar
            .retrieve("player", Some(player_schema().with_field("gold", "number")))
            .unwrap();

        old.set("gold", "250").unwrap();
        assert_eq!(old.get_number("gold").unwrap(), Some(250.0));
    }

    // -----------------------------------------------------------------------
    // Accessor validation
    // -----------------------------------------------------------------------

    #[test]
    fn set_coerces_by_declared_type() {
        let cellar = Cellar::in_memory();
        let player = cellar.retrieve("player", Some(player_schema())).unwrap();

        player.set("hp", "42").unwrap();
        assert_eq!(player.get("hp").unwrap(), Some(Value::Number(42.0)));
        player.set("hp", "abc").unwrap();
        assert_eq!(player.get("hp").unwrap(), Some(Value::Number(0.0)));
        player.set("name", 42).unwrap();
        assert_eq!(player.get("name").unwrap(), Some(Value::from("42")));
    }

    #[test]
    fn set_unsupported_type_is_schema_corrupt() {
        let cellar = Cellar::in_memory();
        let store = cellar
            .retrieve("flags", Some(Schema::new().with_field("alive", "boolean")))
            .unwrap();

        let err = store.set("alive", "true").unwrap_err();
        assert!(matches!(err, CellarError::SchemaCorrupt { ref declared, .. } if declared == "boolean"));
        assert_eq!(store.get("alive").unwrap(), Some(Value::from("")));
    }

    #[test]
    fn set_on_vanished_cell_is_update_failed() {
        let cellar = Cellar::in_memory();
        let player = cellar.retrieve("player", Some(player_schema())).unwrap();

        {
            let mut guard = cellar.state.write().unwrap();
            let id = guard.roots["player"].cell_of("hp").unwrap().clone();
            guard.cells.delete(&id);
        }

        assert!(matches!(
            player.set("hp", 5),
            Err(CellarError::UpdateFailed { .. })
        ));
        assert_eq!(player.get("hp").unwrap(), None);
    }

    #[test]
    fn to_map_reads_every_field() {
        let cellar = Cellar::in_memory();
        let player = cellar.retrieve("player", Some(player_schema())).unwrap();
        player.set("name", "Vik").unwrap();
        player.set("hp", 17).unwrap();

        let map = player.to_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["name"], Value::from("Vik"));
        assert_eq!(map["hp"], Value::Number(17.0));
    }

    // -----------------------------------------------------------------------
    // Export / import
    // -----------------------------------------------------------------------

    #[test]
    fn export_import_roundtrip() {
        let source = Cellar::in_memory();
        let player = source.retrieve("player", Some(player_schema())).unwrap();
        player.set("name", "Vik").unwrap();
        player.set("hp", 17).unwrap();
        source
            .retrieve("skills", Some(Schema::new().with_field("archery", "number")))
            .unwrap();

        let target = Cellar::in_memory();
        target.import_all(&source.export_all().unwrap()).unwrap();

        assert_eq!(target.snapshot(), source.snapshot());
        let player = target.retrieve("player", None).unwrap();
        assert_eq!(player.get_string("name").unwrap().as_deref(), Some("Vik"));
        assert_eq!(player.get_number("hp").unwrap(), Some(17.0));
    }

    #[test]
    fn failed_import_keeps_state() {
        let cellar = Cellar::in_memory();
        let player = cellar.retrieve("player", Some(player_schema())).unwrap();
        player.set("name", "Vik").unwrap();
        let before = cellar.snapshot();

        assert!(cellar.import_all(r#"{"roots":{}}"#).is_err());
        assert!(cellar.import_all("{").is_err());
        assert_eq!(cellar.snapshot(), before);
        assert_eq!(player.get_string("name").unwrap().as_deref(), Some("Vik"));
    }

    #[test]
    fn import_expires_outstanding_accessors() {
        let cellar = Cellar::in_memory();
        let player = cellar.retrieve("player", Some(player_schema())).unwrap();
        let blob = cellar.export_all().unwrap();

        cellar.import_all(&blob).unwrap();

        assert!(matches!(
            player.get("name"),
            Err(CellarError::ExpiredAccessor { .. })
        ));
        assert!(matches!(
            player.set("name", "x"),
            Err(CellarError::ExpiredAccessor { .. })
        ));
        let fresh = cellar.retrieve("player", None).unwrap();
        fresh.set("name", "x").unwrap();
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[test]
    fn flush_and_reopen() {
        let medium: Arc<dyn Medium> = Arc::new(InMemoryMedium::new());
        let cellar = Cellar::open(Arc::clone(&medium), CellarConfig::default()).unwrap();
        cellar
            .retrieve("player", Some(player_schema()))
            .unwrap()
            .set("name", "Vik")
            .unwrap();
        cellar.flush().unwrap();

        let reopened = Cellar::open(medium, CellarConfig::default()).unwrap();
        assert_eq!(reopened.snapshot(), cellar.snapshot());
    }

    #[test]
    fn open_dir_persists_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = CellarConfig {
            data_dir: dir.path().join("save"),
            pretty: true,
            ..CellarConfig::default()
        };

        let cellar = Cellar::open_dir(config.clone()).unwrap();
        cellar
            .retrieve("player", Some(player_schema()))
            .unwrap()
            .set("hp", "17")
            .unwrap();
        cellar.flush().unwrap();
        assert!(config.data_dir.join("roots.json").exists());
        assert!(config.data_dir.join("uids.json").exists());

        let reopened = Cellar::open_dir(config).unwrap();
        let player = reopened.retrieve("player", None).unwrap();
        assert_eq!(player.get_number("hp").unwrap(), Some(17.0));
    }

    /// Medium whose writes to one key fail, as on a full disk.
    struct FailingKey {
        inner: InMemoryMedium,
        broken: std::sync::atomic::AtomicBool,
        key: &'static str,
    }

    impl FailingKey {
        fn check(&self, key: &str) -> Result<(), crate::error::MediumError> {
            if key == self.key && self.broken.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            Ok(())
        }
    }

    impl Medium for FailingKey {
        fn load(&self, key: &str) -> Result<Option<String>, crate::error::MediumError> {
            self.inner.load(key)
        }

        fn store(&self, key: &str, blob: &str) -> Result<(), crate::error::MediumError> {
            self.check(key)?;
            self.inner.store(key, blob)
        }

        fn store_all(&self, blobs: &[(&str, &str)]) -> Result<(), crate::error::MediumError> {
            for (key, _) in blobs {
                self.check(key)?;
            }
            self.inner.store_all(blobs)
        }
    }

    #[test]
    fn failed_flush_keeps_previous_save_loadable() {
        let medium = Arc::new(FailingKey {
            inner: InMemoryMedium::new(),
            broken: std::sync::atomic::AtomicBool::new(false),
            key: "uids.json",
        });
        let cellar = Cellar::open(medium.clone(), CellarConfig::default()).unwrap();
        cellar
            .retrieve("player", Some(Schema::new().with_field("name", "string")))
            .unwrap()
            .set("name", "Vik")
            .unwrap();
        cellar.flush().unwrap();
        let saved = cellar.snapshot();

        cellar
            .retrieve("player", Some(Schema::new().with_field("hp", "number")))
            .unwrap();
        medium.broken.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(cellar.flush(), Err(CellarError::Medium(_))));

        let reopened = Cellar::open(medium, CellarConfig::default()).unwrap();
        assert_eq!(reopened.snapshot(), saved);
    }

    #[test]
    fn open_with_one_blob_is_refused() {
        let medium = Arc::new(InMemoryMedium::new());
        medium.store("uids.json", "{}").unwrap();
        let err = Cellar::open(medium, CellarConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CellarError::Snapshot(SnapshotError::MissingSection("roots"))
        ));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_origins() {
        let cellar = Arc::new(Cellar::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cellar = Arc::clone(&cellar);
                std::thread::spawn(move || {
                    let store = cellar
                        .retrieve(format!("slot-{i}"), Some(player_schema()))
                        .unwrap();
                    for n in 0..50 {
                        store.set("hp", n).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cellar.origins().len(), 8);
        assert_eq!(cellar.cell_count(), 16);
        for origin in cellar.origins() {
            let store = cellar.retrieve(origin, None).unwrap();
            assert_eq!(store.get_number("hp").unwrap(), Some(49.0));
        }
    }
}
