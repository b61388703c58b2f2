use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::registry::Registry;
use crate::resolver::ResolveOptions;

const CACHE_DIR: &str = ".csrun/cache";
const HASH_SENTINEL: &str = ".package.hash";

/// On-disk store of extracted package archives.
///
/// Each package lives in `<root>/<id>/<version>/` (both lowercased) and
/// holds the archive contents verbatim plus a `.package.hash` sentinel
/// with the base64 SHA-256 of the original archive bytes. An entry counts
/// as valid only when the sentinel and a root-level `.nuspec` are present.
#[derive(Debug)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Cache under the user's home directory, created on first use.
    pub fn new() -> Result<Self, ResolveError> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| ResolveError::InvalidInput("could not find home directory".into()))?;
        Self::at(home_dir.join(CACHE_DIR))
    }

    /// Cache rooted at an explicit directory, created if absent.
    pub fn at(root: impl Into<PathBuf>) -> Result<Self, ResolveError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(ResolveError::InvalidInput("cache root must not be empty".into()));
        }

        if !root.exists() {
            fs::create_dir_all(&root)
                .map_err(|source| ResolveError::Io { path: root.clone(), source })?;
        }

        // Canonical root so every artifact path handed out is absolute.
        let root = root
            .canonicalize()
            .map_err(|source| ResolveError::Io { path: root.clone(), source })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_dir(&self, id: &str, version: &str) -> PathBuf {
        self.root.join(id.to_lowercase()).join(version.to_lowercase())
    }

    /// A usable entry has the hash sentinel and a manifest at its root.
    pub fn is_valid_entry(dir: &Path) -> bool {
        if !dir.join(HASH_SENTINEL).is_file() {
            return false;
        }
        fs::read_dir(dir)
            .map(|entries| {
                entries.flatten().any(|entry| {
                    entry
                        .path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("nuspec"))
                })
            })
            .unwrap_or(false)
    }

    /// Remove the whole cache tree.
    pub fn clear(&self) -> Result<(), ResolveError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)
                .map_err(|source| ResolveError::Io { path: self.root.clone(), source })?;
        }
        Ok(())
    }

    /// Returns the extracted directory for a package, downloading and
    /// extracting the archive when no valid entry exists yet.
    ///
    /// A failed download or extraction tears the partial entry back down
    /// so the next attempt starts from a clean miss.
    pub async fn ensure_cached(
        &self,
        registry: &dyn Registry,
        id: &str,
        version: &str,
        options: &ResolveOptions,
    ) -> Result<PathBuf, ResolveError> {
        let dir = self.entry_dir(id, version);

        if dir.exists() {
            if Self::is_valid_entry(&dir) {
                options.debug(&format!("cache hit for {id}@{version}"));
                return Ok(dir);
            }
            // Stale or partial leftovers from an interrupted extraction.
            fs::remove_dir_all(&dir)
                .map_err(|source| ResolveError::Io { path: dir.clone(), source })?;
        }
        fs::create_dir_all(&dir)
            .map_err(|source| ResolveError::Io { path: dir.clone(), source })?;

        let archive = match registry.download_package(id, version).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = fs::remove_dir_all(&dir);
                return Err(download_failed(id, version, Box::new(err)));
            }
        };

        options.debug(&format!(
            "extracting {id}@{version} ({} bytes) into {}",
            archive.len(),
            dir.display()
        ));

        if let Err(source) = Self::populate(&dir, &archive, options) {
            let _ = fs::remove_dir_all(&dir);
            return Err(download_failed(id, version, source));
        }

        if !Self::is_valid_entry(&dir) {
            let _ = fs::remove_dir_all(&dir);
            return Err(ResolveError::IntegrityCheckFailed {
                id: id.to_string(),
                version: version.to_string(),
            });
        }

        Ok(dir)
    }

    fn populate(
        dir: &Path,
        archive: &[u8],
        options: &ResolveOptions,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut hasher = Sha256::new();
        hasher.update(archive);
        fs::write(dir.join(HASH_SENTINEL), STANDARD.encode(hasher.finalize()))?;

        let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;

            let destination = match safe_destination(dir, entry.enclosed_name(), entry.name()) {
                Ok(path) => path,
                Err(err) => {
                    options.warn(&err.to_string());
                    continue;
                }
            };

            if entry.is_dir() {
                fs::create_dir_all(&destination)?;
                continue;
            }

            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&destination)?;
            std::io::copy(&mut entry, &mut file)?;
        }

        Ok(())
    }
}

/// Joins an archive entry onto the cache entry, rejecting names that would
/// resolve outside of it.
fn safe_destination(
    dir: &Path,
    enclosed: Option<PathBuf>,
    raw_name: &str,
) -> Result<PathBuf, ResolveError> {
    match enclosed {
        Some(relative) => Ok(dir.join(relative)),
        None => Err(ResolveError::PathTraversalAttempt { entry: raw_name.to_string() }),
    }
}

fn download_failed(
    id: &str,
    version: &str,
    source: Box<dyn std::error::Error + Send + Sync>,
) -> ResolveError {
    ResolveError::DownloadFailed {
        id: id.to_string(),
        version: version.to_string(),
        source,
    }
}
