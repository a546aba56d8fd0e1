//! DH parameter registry and process-wide shared cache
//!
//! Each authenticator owns a local and a remote parameter map keyed by
//! OID. Population runs once per process against the shared cache; every
//! later authenticator deep-clones the cached entries instead of
//! re-deriving the well-known groups. A `None` entry means "no local
//! preference, defer entirely to peer parameters".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::catalog::{self, DH_PARAMETERS};
use crate::dh::DhParameterSet;
use crate::store::ParamStore;

/// Ordered identifier-to-parameter-set map. BTreeMap iteration order is
/// the negotiation priority order.
pub type DhMap = BTreeMap<String, Option<DhParameterSet>>;

/// Environment variable naming external DH parameter files, semicolon
/// separated.
pub const DH_FILE_ENV: &str = "H323_H235_DH";

/// Where external parameter files come from.
#[derive(Debug, Clone, Default)]
pub enum ParamFileSource {
    /// No external files; built-ins only.
    #[default]
    None,
    /// Explicit ordered path list.
    Paths(Vec<PathBuf>),
    /// Semicolon-separated paths from [`DH_FILE_ENV`].
    Environment,
}

impl ParamFileSource {
    fn resolve(&self) -> Vec<PathBuf> {
        let candidates: Vec<PathBuf> = match self {
            ParamFileSource::None => Vec::new(),
            ParamFileSource::Paths(paths) => paths.clone(),
            ParamFileSource::Environment => std::env::var(DH_FILE_ENV)
                .map(|v| v.split(';').map(PathBuf::from).collect())
                .unwrap_or_default(),
        };
        candidates
            .into_iter()
            .filter(|path| {
                if path.exists() {
                    true
                } else {
                    warn!("DH parameter file not found: {}", path.display());
                    false
                }
            })
            .collect()
    }
}

/// Process-wide cache of populated parameter sets.
///
/// Population is guarded so it logically runs at most once; concurrent
/// callers either populate or clone under the same lock, so a race costs
/// a redundant population, never an inconsistent map.
#[derive(Default)]
pub struct DhSharedCache {
    inner: Mutex<DhMap>,
}

static GLOBAL_CACHE: Lazy<DhSharedCache> = Lazy::new(DhSharedCache::default);

impl DhSharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The one cache shared by all authenticators in the process.
    pub fn global() -> &'static DhSharedCache {
        &GLOBAL_CACHE
    }

    /// Fill `local` with owned parameter sets: cloned from the cache when
    /// warm, otherwise freshly loaded (files first, then built-ins) with
    /// the result retained in the cache. Groups stronger than
    /// `max_strength` bytes are skipped.
    pub fn populate(&self, local: &mut DhMap, source: &ParamFileSource, max_strength: usize) {
        let mut cache = self.inner.lock();
        if !cache.is_empty() {
            clone_into(&cache, local);
            return;
        }
        let fresh = load_dh_map(source, max_strength);
        clone_into(&fresh, local);
        *cache = fresh;
    }

    /// Pre-populate the cache without an authenticator, bounded to
    /// `max_strength`.
    pub fn warm(&self, source: &ParamFileSource, max_strength: usize) {
        let mut cache = self.inner.lock();
        if cache.is_empty() {
            *cache = load_dh_map(source, max_strength);
        }
    }

    /// Drop every cached entry; the next populate reloads from scratch.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

fn clone_into(from: &DhMap, into: &mut DhMap) {
    for (oid, entry) in from {
        into.insert(oid.clone(), entry.clone());
    }
}

/// Build a parameter map from external files and the built-in tables.
/// Per-section failures are logged and skipped; the map degrades to
/// built-ins rather than failing the connection.
fn load_dh_map(source: &ParamFileSource, max_strength: usize) -> DhMap {
    let mut map = DhMap::new();
    map.insert(catalog::OID_H235_V3.to_string(), None);

    for path in source.resolve() {
        load_param_file(&mut map, &path);
    }

    for spec in DH_PARAMETERS {
        if map.contains_key(spec.oid) {
            continue;
        }
        if spec.strength == 0 {
            map.insert(spec.oid.to_string(), None);
        } else if spec.strength <= max_strength {
            match DhParameterSet::from_well_known(
                &spec.prime_bytes(),
                &spec.generator_bytes(),
                spec.strength,
                spec.send,
            ) {
                Ok(set) => {
                    map.insert(spec.oid.to_string(), Some(set));
                }
                Err(e) => warn!("Failed to build DH group {}: {}", spec.oid, e),
            }
        }
        // Groups above max_strength are skipped entirely.
    }

    map
}

fn load_param_file(map: &mut DhMap, path: &Path) {
    let store = match ParamStore::load(path) {
        Ok(store) => store,
        Err(e) => {
            warn!("Failed to read DH parameter file {}: {}", path.display(), e);
            return;
        }
    };
    for section in store.sections() {
        match DhParameterSet::from_store(&store, section) {
            Ok(set) => {
                debug!("Loaded DH parameters for {} from {}", section, path.display());
                map.insert(section.to_string(), Some(set));
            }
            Err(e) => warn!("Skipping DH parameter section {}: {}", section, e),
        }
    }
}

/// Drop every owned entry in a map. Used on authenticator teardown.
pub fn release_all(map: &mut DhMap) {
    map.clear();
}
