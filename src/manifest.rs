use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::ResolveError;
use crate::framework;

/// A dependency declared in a package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    /// Absent when the manifest omits the version attribute; the walker
    /// binds such dependencies to the latest published version.
    pub version: Option<String>,
    /// The framework the declaration was scoped to: the enclosing group's
    /// moniker, or the caller's target for ungrouped declarations.
    pub target_framework: Option<String>,
}

/// Reads the `.nuspec` manifest out of a package archive and returns the
/// dependencies that apply to `target`.
pub fn read_dependencies(archive: &[u8], target: &str) -> Result<Vec<Dependency>, ResolveError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))
        .map_err(|err| unreadable(format!("not a zip archive: {err}")))?;

    let nuspec_name = zip
        .file_names()
        .find(|name| name.to_lowercase().ends_with(".nuspec"))
        .map(str::to_string)
        .ok_or_else(|| unreadable("archive contains no .nuspec entry"))?;

    let mut text = String::new();
    zip.by_name(&nuspec_name)
        .map_err(|err| unreadable(format!("cannot open {nuspec_name}: {err}")))?
        .read_to_string(&mut text)
        .map_err(|err| unreadable(format!("cannot read {nuspec_name}: {err}")))?;

    parse_nuspec(&text, target)
}

/// Same as [`read_dependencies`], but against an already-extracted cache
/// entry, so warm resolutions stay off the network.
pub fn read_dependencies_from_dir(
    package_dir: &Path,
    target: &str,
) -> Result<Vec<Dependency>, ResolveError> {
    let nuspec = fs::read_dir(package_dir)
        .map_err(|err| unreadable(format!("cannot list {}: {err}", package_dir.display())))?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("nuspec"))
        })
        .ok_or_else(|| unreadable("package directory contains no .nuspec file"))?;

    let text = fs::read_to_string(&nuspec)
        .map_err(|err| unreadable(format!("cannot read {}: {err}", nuspec.display())))?;

    parse_nuspec(&text, target)
}

fn parse_nuspec(xml: &str, target: &str) -> Result<Vec<Dependency>, ResolveError> {
    let document = Document::parse(xml)
        .map_err(|err| unreadable(format!("malformed nuspec xml: {err}")))?;

    // Lookups go by local element name so the nuspec's default namespace is
    // inherited without spelling out each schema revision's URI.
    let Some(metadata) = child(document.root_element(), "metadata") else {
        return Ok(Vec::new());
    };
    let Some(dependencies) = child(metadata, "dependencies") else {
        return Ok(Vec::new());
    };

    let groups: Vec<Node> = children(dependencies, "group").collect();
    let mut declared = Vec::new();

    if groups.is_empty() {
        // Ungrouped declarations apply to every framework, so they take on
        // the caller's target.
        for node in children(dependencies, "dependency") {
            push_dependency(&mut declared, node, Some(target.to_string()));
        }
    } else {
        for group in groups {
            let group_tfm = group.attribute("targetFramework").unwrap_or("");
            if !framework::is_compatible(group_tfm, target) {
                continue;
            }
            for node in children(group, "dependency") {
                push_dependency(&mut declared, node, Some(group_tfm.to_string()));
            }
        }
    }

    Ok(declared)
}

fn push_dependency(out: &mut Vec<Dependency>, node: Node, target_framework: Option<String>) {
    // Declarations without an id carry no information.
    let Some(id) = node.attribute("id") else {
        return;
    };
    out.push(Dependency {
        id: id.to_string(),
        version: node.attribute("version").map(str::to_string),
        target_framework,
    });
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn children<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn unreadable(reason: impl Into<String>) -> ResolveError {
    ResolveError::ManifestUnreadable(reason.into())
}
