pub mod common;
mod go;

pub use go::{FileUnit, GoExtractor, ImportSpec, extract_imports};

use crate::error::{AnalysisError, Result};
use crate::model::{Package, TypeKind};
use crate::parsers::is_go_source;
use crate::parsers::treesitter::TreeSitterParser;
use log::{debug, trace, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Qualifying Go files directly inside `dir`, sorted by name.
pub fn source_files(dir: &Path, include_tests: bool) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| AnalysisError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AnalysisError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && is_go_source(&path, include_tests) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Builds the package declared by the Go files directly in `dir`.
///
/// Returns `Ok(None)` when the directory holds no qualifying source file.
/// Any unreadable or malformed file fails the whole directory.
pub fn extract_package(dir: &Path, import_path: &str, include_tests: bool) -> Result<Option<Package>> {
    let files = source_files(dir, include_tests)?;
    if files.is_empty() {
        trace!("No Go sources in {:?}", dir);
        return Ok(None);
    }

    let mut parser = TreeSitterParser::new()?;
    let extractor = GoExtractor::new();
    let mut package: Option<Package> = None;

    for file_path in &files {
        let content = fs::read_to_string(file_path).map_err(|e| AnalysisError::io(file_path, e))?;
        let unit = extractor.extract_file(&mut parser, file_path, &content)?;

        let current = package
            .get_or_insert_with(|| Package::new(unit.package_name.clone(), dir, import_path));

        if unit.package_name != current.name {
            warn!(
                "Skipping {:?}: declares package {} but {:?} is package {}",
                file_path, unit.package_name, dir, current.name
            );
            continue;
        }

        merge_unit(current, unit);
    }

    let mut package = match package {
        Some(package) => package,
        None => return Ok(None),
    };
    attach_methods(&mut package);

    debug!(
        "Extracted package {} ({}): {} types, {} functions, {} vars, {} consts",
        package.name,
        package.import_path,
        package.types.len(),
        package.functions.len(),
        package.variables.len(),
        package.constants.len()
    );

    Ok(Some(package))
}

fn merge_unit(package: &mut Package, unit: FileUnit) {
    for spec in &unit.imports {
        package.imports.insert(spec.alias_key(), spec.path.clone());
    }
    package.files.push(unit.file_name);
    package.types.extend(unit.types);
    package.functions.extend(unit.functions);
    package.variables.extend(unit.variables);
    package.constants.extend(unit.constants);
}

/// Copies each receiver method's signature onto its declared type.
fn attach_methods(package: &mut Package) {
    for function in &package.functions {
        let Some(receiver) = function.receiver.as_deref() else {
            continue;
        };

        match package.types.iter_mut().find(|t| t.name == receiver) {
            Some(ty) if ty.kind != TypeKind::Interface => {
                if ty.method(&function.name).is_none() {
                    ty.methods.push(function.method_signature());
                }
            }
            Some(_) => {}
            None => trace!(
                "Method {}.{} has no receiver type in package {}",
                receiver, function.name, package.name
            ),
        }
    }
}
