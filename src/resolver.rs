use colored::Colorize;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::artifacts::select_artifacts;
use crate::cache::PackageCache;
use crate::directives::PackageRef;
use crate::error::ResolveError;
use crate::manifest;
use crate::registry::Registry;

/// Console reporting knobs threaded through the resolution pipeline.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub quiet: bool,
    pub verbose: bool,
}

impl ResolveOptions {
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{}", message.cyan());
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{}", message.green());
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{}", message.yellow());
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{}", message.dimmed());
        }
    }
}

/// A package pinned to a concrete version. Identity is case-insensitive on
/// both components.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageCoord {
    pub id: String,
    pub version: String,
}

impl PackageCoord {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self { id: id.into(), version: version.into() }
    }

    /// Dedup key shared by the walker, the cache, and the work maps.
    pub fn cache_key(&self) -> String {
        format!("{}@{}", self.id.to_lowercase(), self.version.to_lowercase())
    }
}

impl fmt::Display for PackageCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(4)
}

type SharedArtifacts = Shared<BoxFuture<'static, Result<Vec<PathBuf>, Arc<ResolveError>>>>;

// Process-wide work tables. Duplicate requests for the same package, cache
// root, and target share one in-flight download; completed selections are
// memoized so later calls skip the semaphore entirely.
static IN_FLIGHT: Lazy<Mutex<HashMap<String, SharedArtifacts>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static COMPLETED: Lazy<Mutex<HashMap<String, Vec<PathBuf>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

enum Slot {
    Ready(Vec<PathBuf>),
    Pending(SharedArtifacts),
}

/// Resolves package references into a flat list of assembly paths.
///
/// Work per package (download, extraction, artifact selection) runs on
/// spawned tasks gated by a counting semaphore; per-package failures are
/// reported and skipped so one broken package cannot sink the whole run.
pub struct Resolver {
    registry: Arc<dyn Registry>,
    cache: Arc<PackageCache>,
    target: String,
    semaphore: Arc<Semaphore>,
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(
        registry: Arc<dyn Registry>,
        cache: PackageCache,
        target: impl Into<String>,
        max_concurrency: usize,
        options: ResolveOptions,
    ) -> Self {
        Self {
            registry,
            cache: Arc::new(cache),
            target: target.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            options,
        }
    }

    /// Walks the transitive dependency closure of `refs` and returns the
    /// selected assembly paths in discovery order.
    pub async fn resolve(&self, refs: &[PackageRef]) -> Result<Vec<PathBuf>, ResolveError> {
        let seeds = self.bind_versions(refs).await;
        let coords = self.walk_dependencies(seeds).await;
        self.options.info(&format!("Resolving {} package(s)...", coords.len()));

        let progress = if self.options.quiet {
            None
        } else {
            let bar = ProgressBar::new(coords.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("##-"),
            );
            bar.set_message("resolving packages");
            Some(bar)
        };

        // Kick off all package work first so downloads overlap under the
        // semaphore, then collect in discovery order.
        let mut dispatched: HashSet<String> = HashSet::new();
        let mut slots: Vec<(PackageCoord, Slot)> = Vec::new();
        for coord in coords {
            if !dispatched.insert(coord.cache_key()) {
                continue;
            }
            let key = self.work_key(&coord);
            let memoized = COMPLETED.lock().unwrap().get(&key).cloned();
            let slot = match memoized {
                Some(paths) => Slot::Ready(paths),
                None => Slot::Pending(self.package_work(&coord, &key)),
            };
            slots.push((coord, slot));
        }

        let mut artifacts: Vec<PathBuf> = Vec::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();
        let mut failures = 0usize;

        for (coord, slot) in slots {
            let outcome = match slot {
                Slot::Ready(paths) => Ok(paths),
                Slot::Pending(work) => {
                    let result = work.await;
                    let key = self.work_key(&coord);
                    IN_FLIGHT.lock().unwrap().remove(&key);
                    if let Ok(paths) = &result {
                        COMPLETED.lock().unwrap().insert(key, paths.clone());
                    }
                    result
                }
            };

            match outcome {
                Ok(paths) => {
                    self.options.debug(&format!(
                        "{} contributed {} assembly path(s)",
                        coord,
                        paths.len()
                    ));
                    for path in paths {
                        if seen_paths.insert(path.clone()) {
                            artifacts.push(path);
                        }
                    }
                }
                Err(err) => {
                    failures += 1;
                    self.options.warn(&format!("skipping {coord}: {err}"));
                }
            }
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = &progress {
            bar.finish_with_message("done");
        }

        if failures > 0 {
            self.options.warn(&format!("{failures} package(s) could not be resolved"));
        }
        self.options.success(&format!("Resolved {} assembly reference(s)", artifacts.len()));

        Ok(artifacts)
    }

    /// Pins versionless references to the latest published version. Refs
    /// that cannot be pinned are dropped with a diagnostic.
    async fn bind_versions(&self, refs: &[PackageRef]) -> Vec<PackageCoord> {
        let mut seeds = Vec::new();
        for package_ref in refs {
            let version = match &package_ref.version {
                Some(version) => version.clone(),
                None => match self.registry.latest_version(&package_ref.id).await {
                    Ok(version) => {
                        self.options
                            .debug(&format!("{} bound to latest version {}", package_ref.id, version));
                        version
                    }
                    Err(err) => {
                        self.options.warn(&format!("dropping {}: {err}", package_ref.id));
                        continue;
                    }
                },
            };
            seeds.push(PackageCoord::new(package_ref.id.clone(), version));
        }
        seeds
    }

    /// Breadth-first closure over package manifests. Each coordinate is
    /// visited at most once; a package whose manifest cannot be read keeps
    /// its place in the result but contributes no children.
    async fn walk_dependencies(&self, seeds: Vec<PackageCoord>) -> Vec<PackageCoord> {
        let mut queue: VecDeque<PackageCoord> = seeds.into_iter().collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut resolved: Vec<PackageCoord> = Vec::new();

        while let Some(coord) = queue.pop_front() {
            if !seen.insert(coord.cache_key()) {
                continue;
            }
            self.options.debug(&format!("walking {coord}"));

            match self.dependencies_of(&coord).await {
                Ok(dependencies) => {
                    for dependency in dependencies {
                        if seen.contains(&dependency.cache_key()) {
                            continue;
                        }
                        queue.push_back(dependency);
                    }
                }
                Err(err) => {
                    self.options
                        .warn(&format!("could not read dependencies of {coord}: {err}"));
                }
            }
            resolved.push(coord);
        }

        resolved
    }

    /// Dependencies of one package that apply to the target framework,
    /// each pinned to a concrete version.
    async fn dependencies_of(
        &self,
        coord: &PackageCoord,
    ) -> Result<Vec<PackageCoord>, ResolveError> {
        let entry = self.cache.entry_dir(&coord.id, &coord.version);
        let declared = if PackageCache::is_valid_entry(&entry) {
            manifest::read_dependencies_from_dir(&entry, &self.target)?
        } else {
            let archive = self
                .registry
                .download_package(&coord.id, &coord.version)
                .await?;
            manifest::read_dependencies(&archive, &self.target)?
        };

        let mut dependencies = Vec::new();
        for dependency in declared {
            let version = match dependency.version {
                Some(version) => version,
                None => match self.registry.latest_version(&dependency.id).await {
                    Ok(version) => version,
                    Err(err) => {
                        self.options
                            .warn(&format!("dropping dependency {}: {err}", dependency.id));
                        continue;
                    }
                },
            };
            dependencies.push(PackageCoord::new(dependency.id, version));
        }
        Ok(dependencies)
    }

    fn work_key(&self, coord: &PackageCoord) -> String {
        format!(
            "{}|{}|{}",
            coord.cache_key(),
            self.cache.root().display(),
            self.target.to_lowercase()
        )
    }

    /// Returns the shared handle for a package's fetch-extract-select
    /// work, starting it when no equivalent work is already in flight.
    /// The task is detached, so cancelling a caller lets it run to
    /// completion and the result still lands in the memo table.
    fn package_work(&self, coord: &PackageCoord, key: &str) -> SharedArtifacts {
        let mut in_flight = IN_FLIGHT.lock().unwrap();
        if let Some(existing) = in_flight.get(key) {
            return existing.clone();
        }

        let registry = Arc::clone(&self.registry);
        let cache = Arc::clone(&self.cache);
        let semaphore = Arc::clone(&self.semaphore);
        let target = self.target.clone();
        let options = self.options.clone();
        let coord = coord.clone();
        let coord_for_panic = coord.clone();

        let task = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.unwrap();
            let dir = cache
                .ensure_cached(registry.as_ref(), &coord.id, &coord.version, &options)
                .await
                .map_err(Arc::new)?;
            Ok(select_artifacts(&dir, &target, &options))
        });

        let work: SharedArtifacts = task
            .map(move |joined| match joined {
                Ok(result) => result,
                Err(err) => Err(Arc::new(ResolveError::DownloadFailed {
                    id: coord_for_panic.id,
                    version: coord_for_panic.version,
                    source: Box::new(err),
                })),
            })
            .boxed()
            .shared();

        in_flight.insert(key.to_string(), work.clone());
        work
    }
}
