//! Process-wide component registry and plugin loader.
//!
//! The registry is created lazily on first use and survives repeated
//! init/deinit cycles; a reference count decides when plugin libraries
//! are actually loaded and unloaded. Plugins are shared libraries listed
//! one per line in `$HOME/.omxilmfrc`; each exports a single entry
//! symbol that registers its components back into this module.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

use libloading::Library;
use log::{error, trace, warn};

use crate::component::Component;
use crate::error::{Error, Result};
use crate::types::Version;

/// Name of the entry symbol every plugin library exports.
pub const LIB_ENTRY_SYMBOL: &str = "OMX_MF_LibEntry";

/// File the loader reads, relative to `$HOME`.
pub const RC_FILE_NAME: &str = ".omxilmfrc";

/// Builds a component instance for a requested name.
pub type ConstructorFn = fn(name: &str) -> Result<Component>;

/// Registration record for one component.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ComponentInfo {
    /// Version of the component implementation.
    pub version: Version,
    pub constructor: ConstructorFn,
}

struct Entry {
    info: ComponentInfo,
    aliases: Vec<String>,
    roles: Vec<String>,
}

#[derive(Default)]
struct Inner {
    init_count: u32,
    /// Canonical names in registration order, for enumeration.
    order: Vec<String>,
    entries: BTreeMap<String, Entry>,
    /// Alias -> canonical name.
    aliases: BTreeMap<String, String>,
    libraries: Vec<Library>,
}

/// The process-wide registry.
pub struct Registry {
    inner: Mutex<Inner>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// The singleton, created on first use.
pub fn global() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        inner: Mutex::new(Inner::default()),
    })
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bump the reference count; the first call loads the plugin
    /// libraries listed in the rc file.
    pub fn init(&self) -> Result<()> {
        let first = {
            let mut inner = self.lock();
            inner.init_count += 1;
            inner.init_count == 1
        };
        if first {
            // Entry functions call back into `register_*`; the lock must
            // not be held across them.
            self.load_libraries();
        }
        Ok(())
    }

    /// Drop one reference; the last matching deinit clears the maps and
    /// closes the plugin libraries.
    pub fn deinit(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.init_count == 0 {
            warn!("registry deinit without matching init");
            return Ok(());
        }
        inner.init_count -= 1;
        if inner.init_count == 0 {
            inner.order.clear();
            inner.entries.clear();
            inner.aliases.clear();
            let libs = std::mem::take(&mut inner.libraries);
            drop(inner);
            drop(libs);
        }
        Ok(())
    }

    pub fn init_count(&self) -> u32 {
        self.lock().init_count
    }

    /// Register a component under its canonical name.
    pub fn register_component(&self, name: &str, info: ComponentInfo) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidComponentName);
        }
        let mut inner = self.lock();
        if inner.entries.contains_key(name) || inner.aliases.contains_key(name) {
            error!("component '{}' already registered", name);
            return Err(Error::InvalidComponentName);
        }
        inner.order.push(name.to_owned());
        inner.entries.insert(
            name.to_owned(),
            Entry {
                info,
                aliases: Vec::new(),
                roles: Vec::new(),
            },
        );
        trace!("registered component '{}'", name);
        Ok(())
    }

    /// Register an additional instantiation name for `name`.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        if alias.is_empty() {
            return Err(Error::InvalidComponentName);
        }
        let mut inner = self.lock();
        if inner.entries.contains_key(alias) || inner.aliases.contains_key(alias) {
            error!("alias '{}' already taken", alias);
            return Err(Error::InvalidComponentName);
        }
        let Some(entry) = inner.entries.get_mut(name) else {
            return Err(Error::ComponentNotFound);
        };
        entry.aliases.push(alias.to_owned());
        inner.aliases.insert(alias.to_owned(), name.to_owned());
        trace!("registered alias '{}' for '{}'", alias, name);
        Ok(())
    }

    /// Advertise a role for `name` (canonical or alias).
    pub fn register_role(&self, name: &str, role: &str) -> Result<()> {
        if role.is_empty() {
            return Err(Error::BadParameter);
        }
        let mut inner = self.lock();
        let canonical = match inner.aliases.get(name) {
            Some(c) => c.clone(),
            None => name.to_owned(),
        };
        let Some(entry) = inner.entries.get_mut(&canonical) else {
            return Err(Error::ComponentNotFound);
        };
        if !entry.roles.iter().any(|r| r == role) {
            entry.roles.push(role.to_owned());
        }
        trace!("registered role '{}' for '{}'", role, canonical);
        Ok(())
    }

    /// Instantiate the component registered under `name` (canonical or
    /// alias). The constructor receives the name as requested.
    pub fn make_component(&self, name: &str) -> Result<Component> {
        let constructor = {
            let inner = self.lock();
            let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
            let entry = inner
                .entries
                .get(canonical)
                .ok_or(Error::ComponentNotFound)?;
            entry.info.constructor
        };
        constructor(name)
    }

    /// Canonical name at `index` in registration order; `NoMore` past
    /// the end.
    pub fn name_at(&self, index: u32) -> Result<String> {
        self.lock()
            .order
            .get(index as usize)
            .cloned()
            .ok_or(Error::NoMore)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Aliases registered for `name`.
    pub fn aliases_of(&self, name: &str) -> Result<Vec<String>> {
        self.lock()
            .entries
            .get(name)
            .map(|e| e.aliases.clone())
            .ok_or(Error::ComponentNotFound)
    }

    /// Roles advertised by `name` (canonical or alias).
    pub fn roles_of(&self, name: &str) -> Result<Vec<String>> {
        let inner = self.lock();
        let canonical = inner.aliases.get(name).map(String::as_str).unwrap_or(name);
        inner
            .entries
            .get(canonical)
            .map(|e| e.roles.clone())
            .ok_or(Error::ComponentNotFound)
    }

    /// Canonical names of every component advertising `role`, in
    /// registration order.
    pub fn components_of_role(&self, role: &str) -> Vec<String> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter(|name| {
                inner
                    .entries
                    .get(*name)
                    .is_some_and(|e| e.roles.iter().any(|r| r == role))
            })
            .cloned()
            .collect()
    }

    fn load_libraries(&self) {
        let Some(path) = rc_path() else {
            warn!("HOME not set, no component libraries loaded");
            return;
        };
        let listing = match fs::read_to_string(&path) {
            Ok(listing) => listing,
            Err(e) => {
                trace!("no rc file at {}: {}", path.display(), e);
                return;
            }
        };
        for line in listing.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.load_library(line);
        }
    }

    /// Load one plugin library and run its entry function. Failures are
    /// logged and skipped; a bad plugin never takes the core down.
    fn load_library(&self, path: &str) {
        // Loading runs arbitrary library initialization; the path list
        // comes from the user's own rc file.
        let library = match unsafe { Library::new(path) } {
            Ok(library) => library,
            Err(e) => {
                warn!("library '{}' not loadable, skipped: {}", path, e);
                return;
            }
        };
        let entry = match unsafe {
            library.get::<unsafe extern "C" fn() -> u32>(LIB_ENTRY_SYMBOL.as_bytes())
        } {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "library '{}' has no '{}' entry, skipped: {}",
                    path, LIB_ENTRY_SYMBOL, e
                );
                return;
            }
        };
        let code = unsafe { entry() };
        drop(entry);
        if code != 0 {
            warn!(
                "library '{}' entry failed with {:#010x}, skipped",
                path, code
            );
            return;
        }
        trace!("loaded component library '{}'", path);
        self.lock().libraries.push(library);
    }
}

fn rc_path() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(RC_FILE_NAME))
}

/// Register a component in the process-wide registry.
pub fn register_component(name: &str, info: ComponentInfo) -> Result<()> {
    global().register_component(name, info)
}

/// Register an alias in the process-wide registry.
pub fn register_alias(name: &str, alias: &str) -> Result<()> {
    global().register_alias(name, alias)
}

/// Register a role in the process-wide registry.
pub fn register_role(name: &str, role: &str) -> Result<()> {
    global().register_role(name, role)
}
