use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::framework;
use crate::resolver::ResolveOptions;

const IMPLEMENTATION_ROOT: &str = "lib";
const REFERENCE_ROOT: &str = "ref";

/// Reference assemblies describe the API surface the compiler should see,
/// so they outrank implementation assemblies for the same framework.
const REFERENCE_BONUS: i32 = 1_000;

/// Picks the assemblies a compilation against `target` should reference
/// from an extracted package directory.
///
/// Every framework subdirectory of `lib/` and `ref/` that is compatible
/// with the target contributes its `.dll` files (resource satellites
/// excluded), scored by how close the directory's moniker is to the
/// target. When several directories ship an assembly of the same name,
/// only the highest-scored copy survives.
pub fn select_artifacts(
    package_dir: &Path,
    target: &str,
    options: &ResolveOptions,
) -> Vec<PathBuf> {
    let mut candidates: Vec<(PathBuf, i32)> = Vec::new();

    for (root_name, bonus) in [(IMPLEMENTATION_ROOT, 0), (REFERENCE_ROOT, REFERENCE_BONUS)] {
        let root = package_dir.join(root_name);
        if !root.is_dir() {
            continue;
        }
        let entries = match fs::read_dir(&root) {
            Ok(entries) => entries,
            Err(err) => {
                options.warn(&format!("cannot list {}: {err}", root.display()));
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(tfm) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if !framework::is_compatible(tfm, target) {
                continue;
            }

            let score = framework::selection_priority(tfm, target) + bonus;
            let mut assemblies = Vec::new();
            if let Err(err) = collect_assemblies(&path, &mut assemblies) {
                options.warn(&format!("cannot walk {}: {err}", path.display()));
            }
            candidates.extend(assemblies.into_iter().map(|assembly| (assembly, score)));
        }
    }

    if candidates.is_empty() {
        // Some packages ship assemblies directly under lib/ with no
        // framework subdirectory at all. Take those as a last resort.
        let lib = package_dir.join(IMPLEMENTATION_ROOT);
        if let Ok(entries) = fs::read_dir(&lib) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() && is_assembly(&path) {
                    candidates.push((path, 0));
                }
            }
        }
        if !candidates.is_empty() {
            options.debug(&format!(
                "{}: no framework-specific assemblies, falling back to loose files under lib/",
                package_dir.display()
            ));
        }
    }

    let mut best: HashMap<String, (PathBuf, i32)> = HashMap::new();
    for (path, score) in candidates {
        let Some(stem) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_lowercase)
        else {
            continue;
        };
        match best.get(&stem) {
            // First seen wins ties so reruns stay stable.
            Some((_, existing)) if *existing >= score => {}
            _ => {
                best.insert(stem, (path, score));
            }
        }
    }

    let mut selected: Vec<PathBuf> = best.into_values().map(|(path, _)| path).collect();
    selected.sort();
    selected
}

fn collect_assemblies(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_assemblies(&path, out)?;
        } else if is_assembly(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_assembly(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    name.ends_with(".dll") && !name.ends_with(".resources.dll")
}
