use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use super::{ApiConfig, ApiModule};
use crate::models::User;

/// Descriptor
///
/// Content of `<name>.json` in the descriptor directory. An empty file (or `{}`)
/// enables the module with its declared config.
#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    #[serde(default)]
    config: Option<ApiConfig>,
}

/// ApiRegistry
///
/// The table of active API modules. Built-in modules are compiled in; the
/// descriptor directory decides which of them are active and may override their
/// config. The directory is read at construction and on `reload`, never per
/// request, so a request always sees one consistent snapshot of the table.
/// Modules added with `register` survive every reload.
pub struct ApiRegistry {
    builtins: HashMap<String, ApiModule>,
    dir: Option<PathBuf>,
    explicit: RwLock<BTreeMap<String, Arc<ApiModule>>>,
    modules: RwLock<BTreeMap<String, Arc<ApiModule>>>,
}

pub type ApiRegistryState = Arc<ApiRegistry>;

impl Default for ApiRegistry {
    fn default() -> Self {
        Self {
            builtins: HashMap::new(),
            dir: None,
            explicit: RwLock::new(BTreeMap::new()),
            modules: RwLock::new(BTreeMap::new()),
        }
    }
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding exactly `modules`, with no backing directory.
    pub fn from_modules(modules: impl IntoIterator<Item = ApiModule>) -> Self {
        let registry = Self::new();
        for module in modules {
            registry.register(module);
        }
        registry
    }

    /// from_dir
    ///
    /// A registry whose active set is driven by the descriptors in `dir`. When
    /// `dir` does not exist every built-in module is enabled.
    pub fn from_dir(dir: impl Into<PathBuf>, builtins: impl IntoIterator<Item = ApiModule>) -> Self {
        let registry = Self {
            builtins: builtins.into_iter().map(|m| (m.name.clone(), m)).collect(),
            dir: Some(dir.into()),
            explicit: RwLock::new(BTreeMap::new()),
            modules: RwLock::new(BTreeMap::new()),
        };
        registry.reload();
        registry
    }

    /// Adds or replaces a module by name. It stays active across reloads and
    /// takes precedence over a descriptor-enabled module of the same name.
    pub fn register(&self, module: ApiModule) {
        tracing::info!(api = %module.name, "registering API module");
        let name = module.name.clone();
        let module = Arc::new(module);
        self.explicit
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), module.clone());
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, module);
    }

    /// reload
    ///
    /// Rescans the descriptor directory and swaps in the resulting table, with
    /// the explicitly registered modules merged on top. A no-op for registries
    /// without a directory. Returns the number of active modules.
    pub fn reload(&self) -> usize {
        let Some(dir) = &self.dir else {
            return self.len();
        };

        let mut table = scan(dir, &self.builtins);
        {
            let explicit = self.explicit.read().unwrap_or_else(PoisonError::into_inner);
            table.extend(explicit.iter().map(|(name, module)| (name.clone(), module.clone())));
        }
        let count = table.len();
        *self.modules.write().unwrap_or_else(PoisonError::into_inner) = table;
        tracing::info!(dir = %dir.display(), active = count, "API modules loaded");
        count
    }

    pub fn get(&self, name: &str) -> Option<Arc<ApiModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Active modules in name order.
    pub fn modules(&self) -> Vec<Arc<ApiModule>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// widgets
    ///
    /// Renders every module's home-page widget. A widget that fails is logged and
    /// contributes nothing; it never fails the page.
    pub fn widgets(&self, user: Option<&User>) -> Vec<String> {
        self.modules()
            .iter()
            .filter_map(|module| {
                let widget = module.widget.as_ref()?;
                match widget.render(user) {
                    Ok(markup) => Some(markup),
                    Err(e) => {
                        tracing::warn!(api = %module.name, "widget render failed: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn scan(dir: &Path, builtins: &HashMap<String, ApiModule>) -> BTreeMap<String, Arc<ApiModule>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                dir = %dir.display(),
                "API descriptor directory unreadable ({}); enabling all built-in modules",
                e
            );
            return builtins
                .iter()
                .map(|(name, module)| (name.clone(), Arc::new(module.clone())))
                .collect();
        }
    };

    let mut table = BTreeMap::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(builtin) = builtins.get(name) else {
            tracing::warn!(api = %name, "descriptor names no built-in API module; skipped");
            continue;
        };

        match read_descriptor(&path) {
            Ok(descriptor) => {
                let mut module = builtin.clone();
                if let Some(config) = descriptor.config {
                    module.config = Some(config);
                }
                table.insert(name.to_string(), Arc::new(module));
            }
            Err(e) => {
                tracing::error!(api = %name, "invalid descriptor {}: {}", path.display(), e);
            }
        }
    }
    table
}

fn read_descriptor(path: &Path) -> Result<Descriptor, String> {
    let raw = fs::read_to_string(path).map_err(|e| e.to_string())?;
    if raw.trim().is_empty() {
        return Ok(Descriptor::default());
    }
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}
