use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use super::Module;
use crate::error::Result;

/// Directory searched for `*.json` modules when none are named explicitly.
pub const DEFAULT_MODULE_DIR: &str = "modules";

/// Resolves the list of module files to load.
///
/// Explicit paths are used verbatim. With none given, every `*.json` file in
/// `default_dir` is used, sorted by name. A missing directory yields nothing.
pub fn discover_modules(explicit: &[String], default_dir: &Path) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit.iter().map(PathBuf::from).collect());
    }

    if !default_dir.is_dir() {
        warn!("module directory does not exist: {}", default_dir.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(default_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads, parses and validates a single module file.
pub fn load_module(path: &Path) -> Result<Module> {
    let data = fs::read_to_string(path)?;
    Module::from_json(&path.display().to_string(), &data)
}

/// Loads every file, skipping (and logging) the ones that fail.
pub fn load_modules(paths: &[PathBuf]) -> Vec<Module> {
    let mut modules = Vec::new();
    for path in paths {
        match load_module(path) {
            Ok(module) => {
                info!("loaded module {}", module.file);
                modules.push(module);
            }
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    modules
}
