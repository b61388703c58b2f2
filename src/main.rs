use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use csrun::cache::PackageCache;
use csrun::directives::parse_directives;
use csrun::framework::DEFAULT_TARGET;
use csrun::registry::NugetRegistry;
use csrun::resolver::{ResolveOptions, Resolver, default_concurrency};

#[derive(Parser)]
#[command(name = "csrun")]
#[command(about = "Resolve NuGet package directives in C# scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a script's package directives and print assembly reference paths
    #[command(visible_alias = "r")]
    Resolve {
        /// The script file to scan for directives
        script: PathBuf,
        /// Target framework moniker to resolve binaries for
        #[arg(short, long, default_value = DEFAULT_TARGET)]
        target: String,
        /// Package cache directory (defaults to ~/.csrun/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Concurrent downloads (defaults to the CPU count)
        #[arg(long)]
        max_concurrency: Option<usize>,
        #[arg(short, long)]
        verbose: bool,
        #[arg(short, long)]
        quiet: bool,
    },
    /// Delete the package cache
    Clean {
        /// Package cache directory (defaults to ~/.csrun/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        #[arg(short, long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            script,
            target,
            cache_dir,
            max_concurrency,
            verbose,
            quiet,
        } => {
            let options = ResolveOptions { quiet, verbose };

            let source = std::fs::read_to_string(&script)?;
            let refs = parse_directives(&source);
            if refs.is_empty() {
                options.info(&format!("{} declares no package directives", script.display()));
                return Ok(());
            }
            options.info(&format!(
                "Found {} package directive(s) in {}",
                refs.len(),
                script.display()
            ));

            let cache = match cache_dir {
                Some(dir) => PackageCache::at(dir)?,
                None => PackageCache::new()?,
            };
            let registry = Arc::new(NugetRegistry::new());
            let concurrency = max_concurrency.unwrap_or_else(default_concurrency);
            let resolver = Resolver::new(registry, cache, target, concurrency, options);

            let paths = resolver.resolve(&refs).await?;
            for path in &paths {
                println!("{}", path.display());
            }
            Ok(())
        }
        Commands::Clean { cache_dir, quiet } => {
            let options = ResolveOptions { quiet, verbose: false };
            let cache = match cache_dir {
                Some(dir) => PackageCache::at(dir)?,
                None => PackageCache::new()?,
            };
            cache.clear()?;
            options.success(&format!("Removed package cache at {}", cache.root().display()));
            Ok(())
        }
    }
}
