//! Loading models from manifest files.
//!
//! A model unit on disk is a JSON manifest listing `{ "kind", "params" }`
//! entries. Kinds are resolved against a [`ModelCatalog`]; exactly one entry
//! must name a registered kind.
//!
//! While a manifest is read the process working directory is switched to the
//! manifest's directory and that directory is pushed onto the loader's search
//! path. Both are reverted when the scope ends, on success or failure.
//!
//! Unloading drops the loader's registry entry for the path. Memory held by
//! factories or by instances still alive elsewhere is released only when the
//! last reference goes away.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::Model;
use crate::domain::error::{EvalError, Result};

/// Builds a model instance from manifest params.
pub type ModelFactory =
    Arc<dyn Fn(&Value, &LoadContext) -> anyhow::Result<Box<dyn Model>> + Send + Sync>;

/// Serializes working-directory switches across loaders.
static CONTEXT_LOCK: Mutex<()> = Mutex::new(());

/// Registered model kinds.
#[derive(Clone, Default)]
pub struct ModelCatalog {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the bundled `constant` and `frequency` models.
    pub fn with_baselines() -> Self {
        let mut catalog = Self::new();
        super::baseline::register_baselines(&mut catalog);
        catalog
    }

    /// Register a factory under `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&Value, &LoadContext) -> anyhow::Result<Box<dyn Model>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ModelManifest {
    models: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    kind: String,
    #[serde(default)]
    params: Value,
}

/// Location information a factory can use to find its own resources.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadContext {
    model_dir: PathBuf,
    search_path: Vec<PathBuf>,
}

impl LoadContext {
    pub fn new(model_dir: PathBuf, search_path: Vec<PathBuf>) -> Self {
        Self {
            model_dir,
            search_path,
        }
    }

    /// Directory containing the manifest.
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Resolve a resource path the way the model author wrote it.
    ///
    /// Relative paths are looked up in the model directory, then along the
    /// search path, and default to the model directory.
    pub fn resolve(&self, resource: &Path) -> PathBuf {
        if resource.is_absolute() {
            return resource.to_path_buf();
        }
        std::iter::once(&self.model_dir)
            .chain(self.search_path.iter())
            .map(|root| root.join(resource))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| self.model_dir.join(resource))
    }
}

/// A discovered model unit, ready to instantiate.
#[derive(Clone)]
pub struct LoadedModel {
    path: PathBuf,
    kind: String,
    params: Value,
    context: LoadContext,
    factory: ModelFactory,
}

impl LoadedModel {
    /// Absolute manifest path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn context(&self) -> &LoadContext {
        &self.context
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish()
    }
}

/// Loads model units and tracks which paths are currently loaded.
#[derive(Debug)]
pub struct ModelLoader {
    catalog: ModelCatalog,
    search_path: Vec<PathBuf>,
    registry: BTreeMap<PathBuf, String>,
}

impl ModelLoader {
    pub fn new(catalog: ModelCatalog) -> Self {
        Self {
            catalog,
            search_path: Vec::new(),
            registry: BTreeMap::new(),
        }
    }

    /// Add a persistent resource root consulted by [`LoadContext::resolve`].
    pub fn with_search_path(mut self, root: PathBuf) -> Self {
        self.search_path.push(root);
        self
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Whether a manifest path is currently registered as loaded.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.registry.contains_key(path)
    }

    /// Read the manifest at `path` and select its single conforming entry.
    pub fn load(&mut self, path: &Path) -> Result<LoadedModel> {
        let (path, context, manifest) = {
            let scope = DirContext::enter(path, &mut self.search_path)?;
            let context = LoadContext::new(scope.dir.clone(), scope.search_path.clone());
            let manifest = read_manifest(&scope.path);
            (scope.path.clone(), context, manifest)
        };
        let manifest = manifest?;

        let mut candidates: Vec<ManifestEntry> = Vec::new();
        for entry in manifest.models {
            if self.catalog.contains(&entry.kind) {
                candidates.push(entry);
            } else {
                debug!(path = %path.display(), kind = %entry.kind, "skipping unknown model kind");
            }
        }
        if candidates.len() != 1 {
            return Err(EvalError::ModelDiscovery {
                path,
                found: candidates.len(),
            });
        }

        let entry = candidates.remove(0);
        let factory = match self.catalog.factories.get(&entry.kind) {
            Some(factory) => factory.clone(),
            None => return Err(EvalError::ModelDiscovery { path, found: 0 }),
        };
        if self
            .registry
            .insert(path.clone(), entry.kind.clone())
            .is_some()
        {
            debug!(path = %path.display(), "model path loaded again");
        }

        Ok(LoadedModel {
            path,
            kind: entry.kind,
            params: entry.params,
            context,
            factory,
        })
    }

    /// Construct a fresh instance of a loaded unit.
    pub fn instantiate(&self, unit: &LoadedModel) -> Result<Box<dyn Model>> {
        (unit.factory)(&unit.params, &unit.context)
            .map_err(|err| EvalError::hook(&unit.kind, "instantiate", err))
    }

    /// Deregister a loaded unit.
    pub fn unload(&mut self, unit: LoadedModel) {
        if self.registry.remove(&unit.path).is_none() {
            warn!(path = %unit.path.display(), "unloading a model that was not registered");
        }
        debug!(path = %unit.path.display(), kind = %unit.kind, "model unloaded");
    }
}

fn read_manifest(path: &Path) -> Result<ModelManifest> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|err| EvalError::Manifest {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Working directory and search path switched to a model's directory.
struct DirContext<'a> {
    path: PathBuf,
    dir: PathBuf,
    previous: PathBuf,
    search_path: &'a mut Vec<PathBuf>,
    _lock: MutexGuard<'static, ()>,
}

impl<'a> DirContext<'a> {
    fn enter(path: &Path, search_path: &'a mut Vec<PathBuf>) -> Result<Self> {
        let lock = CONTEXT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = std::env::current_dir()?;
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            previous.join(path)
        };
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| previous.clone());

        std::env::set_current_dir(&dir)?;
        search_path.push(dir.clone());
        debug!(dir = %dir.display(), "entered model context");

        Ok(Self {
            path,
            dir,
            previous,
            search_path,
            _lock: lock,
        })
    }
}

impl Drop for DirContext<'_> {
    fn drop(&mut self) {
        if let Err(err) = std::env::set_current_dir(&self.previous) {
            warn!(dir = %self.previous.display(), error = %err, "failed to restore working directory");
        }
        if let Some(pos) = self.search_path.iter().rposition(|p| p == &self.dir) {
            self.search_path.remove(pos);
        }
        debug!(dir = %self.dir.display(), "left model context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_kinds_sorted() {
        let catalog = ModelCatalog::with_baselines();
        let kinds: Vec<&str> = catalog.kinds().collect();
        assert_eq!(kinds, vec!["constant", "frequency"]);
        assert!(catalog.contains("constant"));
        assert!(!catalog.contains("mfa"));
    }

    #[test]
    fn test_resolve_prefers_existing_candidate() {
        let model_dir = tempfile::tempdir().unwrap();
        let shared = tempfile::tempdir().unwrap();
        std::fs::write(shared.path().join("prior.txt"), "x").unwrap();

        let ctx = LoadContext::new(
            model_dir.path().to_path_buf(),
            vec![shared.path().to_path_buf()],
        );
        assert_eq!(
            ctx.resolve(Path::new("prior.txt")),
            shared.path().join("prior.txt")
        );
        assert_eq!(
            ctx.resolve(Path::new("missing.txt")),
            model_dir.path().join("missing.txt")
        );
        assert_eq!(ctx.resolve(Path::new("/abs/file")), PathBuf::from("/abs/file"));
    }

    #[test]
    fn test_manifest_params_default_to_null() {
        let manifest: ModelManifest =
            serde_json::from_str(r#"{"models": [{"kind": "frequency"}]}"#).unwrap();
        assert_eq!(manifest.models.len(), 1);
        assert_eq!(manifest.models[0].params, Value::Null);
    }
}
