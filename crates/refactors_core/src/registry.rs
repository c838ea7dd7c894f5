use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{RefactorError, RefactorResult, RefactorUnit};

const SOURCE_EXTENSION: &str = "rs";

type UnitFactory = Arc<dyn Fn() -> Box<dyn RefactorUnit> + Send + Sync>;

/// Identifier a unit type is registered and logged under.
pub fn refactor_name<T: ?Sized>() -> &'static str {
    type_name::<T>()
}

/// A unit found through the registry or the source directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AvailableUnit {
    pub source: Option<PathBuf>,
    /// False for source files with no registered constructor; those cannot be run.
    pub registered: bool,
}

/// Maps refactor identifiers to constructors.
#[derive(Clone, Default)]
pub struct RefactorRegistry {
    units: BTreeMap<String, UnitFactory>,
}

impl RefactorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its fully-qualified type name.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: RefactorUnit + Default + 'static,
    {
        self.register_with(refactor_name::<T>(), || Box::new(T::default()))
    }

    pub fn register_with<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn RefactorUnit> + Send + Sync + 'static,
    {
        self.units.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> RefactorResult<Box<dyn RefactorUnit>> {
        let factory = self
            .units
            .get(name)
            .ok_or_else(|| RefactorError::unknown(name))?;
        Ok(factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    /// Every registered unit with the source file its name points at, plus source files in
    /// `source_dir` no registered unit claims, keyed by file stem.
    pub fn available(
        &self,
        source_dir: Option<&Path>,
    ) -> RefactorResult<BTreeMap<String, AvailableUnit>> {
        let mut sources = match source_dir {
            Some(dir) => discover_sources(dir)?,
            None => BTreeMap::new(),
        };
        let mut available: BTreeMap<String, AvailableUnit> = self
            .units
            .keys()
            .map(|name| {
                let unit = AvailableUnit {
                    source: sources.remove(&source_hint(name)),
                    registered: true,
                };
                (name.clone(), unit)
            })
            .collect();
        for (stem, path) in sources {
            available.insert(
                stem,
                AvailableUnit {
                    source: Some(path),
                    registered: false,
                },
            );
        }
        Ok(available)
    }
}

impl fmt::Debug for RefactorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefactorRegistry")
            .field("units", &self.units.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Source files in `dir`, keyed by file stem. A missing directory has no sources.
pub fn discover_sources(dir: &Path) -> RefactorResult<BTreeMap<String, PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => {
            return Err(RefactorError::storage(format!(
                "read refactor dir {}: {err}",
                dir.display()
            )));
        }
    };
    let mut sources = BTreeMap::new();
    for entry in entries {
        let path = entry
            .map_err(|err| RefactorError::storage(format!("read refactor dir entry: {err}")))?
            .path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some(SOURCE_EXTENSION)
        {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            sources.insert(stem.to_string(), path.clone());
        }
    }
    Ok(sources)
}

/// File stem a unit name is expected to live in: `app::refactors::BackfillEmails` ->
/// `backfill_emails`.
pub fn source_hint(name: &str) -> String {
    let base = name.split('<').next().unwrap_or(name);
    let last = base.rsplit("::").next().unwrap_or(base);
    let mut hint = String::with_capacity(last.len() + 4);
    for (idx, ch) in last.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 && !hint.ends_with('_') {
                hint.push('_');
            }
            hint.push(ch.to_ascii_lowercase());
        } else {
            hint.push(ch);
        }
    }
    hint
}
