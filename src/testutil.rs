//! Shared fixtures for unit tests: in-memory package archives and a
//! network-free registry stub.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use zip::write::SimpleFileOptions;

use crate::error::ResolveError;
use crate::registry::Registry;
use crate::resolver::ResolveOptions;

pub(crate) fn quiet() -> ResolveOptions {
    ResolveOptions { quiet: true, verbose: false }
}

/// Builds a nupkg-shaped zip archive from (entry name, contents) pairs.
/// Names ending in `/` become directory entries.
pub(crate) fn build_nupkg(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, contents) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }

    writer.finish().unwrap().into_inner()
}

/// Renders a minimal nuspec document. `dependencies_xml` is spliced into
/// the metadata element verbatim.
pub(crate) fn nuspec(id: &str, version: &str, dependencies_xml: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://schemas.microsoft.com/packaging/2013/05/nuspec.xsd">
  <metadata>
    <id>{id}</id>
    <version>{version}</version>
    <authors>tests</authors>
    <description>test fixture</description>
    {dependencies_xml}
  </metadata>
</package>"#
    )
}

/// In-memory [`Registry`] with call counters.
pub(crate) struct StubRegistry {
    packages: Mutex<HashMap<String, Vec<u8>>>,
    latest: Mutex<HashMap<String, String>>,
    downloads: AtomicUsize,
    latest_lookups: AtomicUsize,
}

impl StubRegistry {
    pub(crate) fn new() -> Self {
        Self {
            packages: Mutex::new(HashMap::new()),
            latest: Mutex::new(HashMap::new()),
            downloads: AtomicUsize::new(0),
            latest_lookups: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_package(self, id: &str, version: &str, archive: Vec<u8>) -> Self {
        self.packages
            .lock()
            .unwrap()
            .insert(coord_key(id, version), archive);
        self
    }

    pub(crate) fn with_latest(self, id: &str, version: &str) -> Self {
        self.latest
            .lock()
            .unwrap()
            .insert(id.to_lowercase(), version.to_string());
        self
    }

    pub(crate) fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn latest_lookup_count(&self) -> usize {
        self.latest_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for StubRegistry {
    async fn latest_version(&self, id: &str) -> Result<String, ResolveError> {
        self.latest_lookups.fetch_add(1, Ordering::SeqCst);
        self.latest
            .lock()
            .unwrap()
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| ResolveError::VersionResolutionFailed { id: id.to_string() })
    }

    async fn download_package(&self, id: &str, version: &str) -> Result<Vec<u8>, ResolveError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.packages
            .lock()
            .unwrap()
            .get(&coord_key(id, version))
            .cloned()
            .ok_or_else(|| ResolveError::DownloadFailed {
                id: id.to_string(),
                version: version.to_string(),
                source: "package not present in stub registry".into(),
            })
    }
}

fn coord_key(id: &str, version: &str) -> String {
    format!("{}@{}", id.to_lowercase(), version.to_lowercase())
}
