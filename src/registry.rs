//! Named definition lookup.
//!
//! | Registry | Lookup |
//! |---|---|
//! | [`MemoryRegistry`] | definitions added in code; a later `add` replaces an earlier one of the same name |
//! | [`JsonFileRegistry`] | `<name>.json` looked up across directories, parsed once and cached |
//! | [`StackRegistry`] | ordered layers; the first layer holding a name wins |
//!
//! File names are sanitized before lookup: every character outside
//! `[A-Za-z0-9_-']` becomes `-`, so `"hero/../x"` looks for `hero----x.json`.
//! Misses are remembered, so a hot path asking for an undefined name does not
//! stat the disk on every call.

use crate::definition::{Definition, DefinitionResolver, PictureDefinition, ResolveError};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Picture definition {0} not found")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid definition JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid definition: {0}")]
    Resolve(#[from] ResolveError),
}

/// A named collection of definitions.
pub trait DefinitionRegistry: Send + Sync {
    fn name(&self) -> &str;

    fn has(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Result<Arc<dyn Definition>, RegistryError>;

    fn add(&mut self, definition: Arc<dyn Definition>);

    /// Definitions matching `predicate`, in [`all`](Self::all) order.
    fn filter(&self, predicate: &dyn Fn(&dyn Definition) -> bool) -> MemoryRegistry {
        let mut filtered = MemoryRegistry::new(self.name());
        for definition in self.all() {
            if predicate(definition.as_ref()) {
                filtered.add(definition);
            }
        }
        filtered
    }

    /// Every definition, one per name.
    fn all(&self) -> Vec<Arc<dyn Definition>>;
}

// =========================================================================
// MemoryRegistry
// =========================================================================

#[derive(Debug, Clone)]
pub struct MemoryRegistry {
    name: String,
    definitions: IndexMap<String, Arc<dyn Definition>>,
}

impl MemoryRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definitions: IndexMap::new(),
        }
    }

    pub fn with(mut self, definition: impl Definition + 'static) -> Self {
        self.add(Arc::new(definition));
        self
    }

    /// Merge every definition of `other`, replacing same-named ones.
    pub fn add_all(&mut self, other: &dyn DefinitionRegistry) {
        for definition in other.all() {
            self.add(definition);
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionRegistry for MemoryRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn has(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<Arc<dyn Definition>, RegistryError> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn add(&mut self, definition: Arc<dyn Definition>) {
        self.definitions
            .insert(definition.name().to_string(), definition);
    }

    fn all(&self) -> Vec<Arc<dyn Definition>> {
        self.definitions.values().cloned().collect()
    }
}

// =========================================================================
// JsonFileRegistry
// =========================================================================

#[derive(Default)]
struct FileCache {
    found: IndexMap<String, Arc<dyn Definition>>,
    missing: HashSet<String>,
    /// Files already parsed, whatever name they were asked for under.
    loaded: HashSet<PathBuf>,
    /// Names in `found` that reach a file `all` already lists under another name.
    aliases: HashSet<String>,
    collected: bool,
}

/// Definitions stored as `<name>.json` files in the qualified convention.
pub struct JsonFileRegistry {
    name: String,
    dirs: Vec<PathBuf>,
    resolver: DefinitionResolver,
    cache: Mutex<FileCache>,
}

/// Map a definition name onto a safe file stem.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '\'') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

impl JsonFileRegistry {
    /// Directories are searched in the given order.
    pub fn new<P: Into<PathBuf>>(name: impl Into<String>, dirs: impl IntoIterator<Item = P>) -> Self {
        Self {
            name: name.into(),
            dirs: dirs.into_iter().map(Into::into).collect(),
            resolver: DefinitionResolver::qualified(),
            cache: Mutex::new(FileCache::default()),
        }
    }

    pub fn with_resolver(self, resolver: DefinitionResolver) -> Self {
        Self { resolver, ..self }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    // The cache holds no invariants a panicking holder could break halfway.
    fn cache(&self) -> MutexGuard<'_, FileCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn Definition>, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        let picture = self.resolver.resolve(&value)?;
        Ok(Arc::new(PictureDefinition::new(name, picture)))
    }

    fn find(&self, cache: &mut FileCache, name: &str) -> Option<Arc<dyn Definition>> {
        if let Some(definition) = cache.found.get(name) {
            return Some(Arc::clone(definition));
        }
        if cache.missing.contains(name) {
            return None;
        }

        let file_name = format!("{}.json", sanitize_name(name));
        for dir in &self.dirs {
            let path = dir.join(&file_name);
            if !path.is_file() {
                continue;
            }
            match self.load(name, &path) {
                Ok(definition) => {
                    if !cache.loaded.insert(path) {
                        cache.aliases.insert(name.to_string());
                    }
                    cache.found.insert(name.to_string(), Arc::clone(&definition));
                    return Some(definition);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), "Skipping definition file: {e}");
                }
            }
        }

        cache.missing.insert(name.to_string());
        None
    }

    fn collect(&self, cache: &mut FileCache) {
        if cache.collected {
            return;
        }

        for dir in &self.dirs {
            let files = WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
                });

            for path in files {
                let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                    continue;
                };
                if cache.found.contains_key(&name) || cache.loaded.contains(&path) {
                    continue;
                }
                match self.load(&name, &path) {
                    Ok(definition) => {
                        cache.missing.remove(&name);
                        cache.loaded.insert(path);
                        cache.found.insert(name, definition);
                    }
                    Err(e) => {
                        tracing::debug!(path = %path.display(), "Skipping definition file: {e}");
                    }
                }
            }
        }
        cache.collected = true;
    }
}

impl DefinitionRegistry for JsonFileRegistry {
    fn name(&self) -> &str {
        &self.name
    }

    fn has(&self, name: &str) -> bool {
        let mut cache = self.cache();
        self.find(&mut cache, name).is_some()
    }

    fn get(&self, name: &str) -> Result<Arc<dyn Definition>, RegistryError> {
        let mut cache = self.cache();
        self.find(&mut cache, name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    fn add(&mut self, definition: Arc<dyn Definition>) {
        let cache = self.cache.get_mut().unwrap_or_else(PoisonError::into_inner);
        cache.missing.remove(definition.name());
        cache.aliases.remove(definition.name());
        cache
            .found
            .insert(definition.name().to_string(), definition);
    }

    fn all(&self) -> Vec<Arc<dyn Definition>> {
        let mut cache = self.cache();
        self.collect(&mut cache);
        cache
            .found
            .iter()
            .filter(|(name, _)| !cache.aliases.contains(*name))
            .map(|(_, definition)| Arc::clone(definition))
            .collect()
    }
}

// =========================================================================
// StackRegistry
// =========================================================================

/// Layered registries. Layers are consulted in order, the stack's own
/// definitions last.
pub struct StackRegistry {
    layers: Vec<Box<dyn DefinitionRegistry>>,
    local: MemoryRegistry,
}

impl StackRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            layers: Vec::new(),
            local: MemoryRegistry::new(name),
        }
    }

    pub fn with_layer(mut self, layer: impl DefinitionRegistry + 'static) -> Self {
        self.push_layer(Box::new(layer));
        self
    }

    pub fn push_layer(&mut self, layer: Box<dyn DefinitionRegistry>) {
        self.layers.push(layer);
    }

    fn registries(&self) -> Vec<&dyn DefinitionRegistry> {
        let mut registries: Vec<&dyn DefinitionRegistry> = self
            .layers
            .iter()
            .map(|layer| layer.as_ref() as &dyn DefinitionRegistry)
            .collect();
        registries.push(&self.local);
        registries
    }
}

impl DefinitionRegistry for StackRegistry {
    fn name(&self) -> &str {
        self.local.name()
    }

    fn has(&self, name: &str) -> bool {
        self.registries().into_iter().any(|registry| registry.has(name))
    }

    fn get(&self, name: &str) -> Result<Arc<dyn Definition>, RegistryError> {
        self.registries()
            .into_iter()
            .find(|registry| registry.has(name))
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?
            .get(name)
    }

    fn add(&mut self, definition: Arc<dyn Definition>) {
        self.local.add(definition);
    }

    fn all(&self) -> Vec<Arc<dyn Definition>> {
        let mut seen = HashSet::new();
        self.registries()
            .into_iter()
            .flat_map(|registry| registry.all())
            .filter(|definition| seen.insert(definition.name().to_string()))
            .collect()
    }
}
