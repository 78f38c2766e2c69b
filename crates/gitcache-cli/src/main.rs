use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gitcache_core::BuildTarget;
use gitcache_engine::{
    BuildDecisionEngine, BuildOptions, BuildPipeline, CommandCompiler, CompileRequest, Config,
    ZipPackager,
};
use gitcache_hash::{ContentHasher, Hasher};

#[derive(Parser)]
#[command(name = "gitcache", version)]
struct Cli {
    /// Repository root (defaults to the current directory)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config to .gitcache/gitcache.toml
    Init,

    /// Decide whether an artifact must be rebuilt
    Decide {
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        trigger_path: Option<PathBuf>,
        /// Always rebuild, ignoring recorded builds
        #[arg(long)]
        no_trigger: bool,
    },

    /// Record a successful build of an artifact
    Record {
        #[arg(long)]
        artifact: PathBuf,
        #[arg(long)]
        trigger_path: Option<PathBuf>,
    },

    /// Fingerprint a single file
    Fingerprint { file: PathBuf },

    /// Fingerprint a directory tree
    HashDir { dir: PathBuf },

    /// Print the current revision
    Revision {
        #[arg(long)]
        path: Option<PathBuf>,
        /// Substitute a content hash when the tree is dirty
        #[arg(long)]
        stable: bool,
    },

    /// Report uncommitted changes
    Dirty {
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Compile with the configured command unless the artifact is up to date
    Build {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        os: String,
        #[arg(long)]
        arch: String,
        #[arg(long)]
        trigger_path: Option<PathBuf>,
        #[arg(long)]
        no_trigger: bool,
        /// Package the binary into <destination>.zip
        #[arg(long)]
        zip: bool,
        /// Extra archive entry as SRC=DEST (repeatable, implies --zip)
        #[arg(long = "resource", value_name = "SRC=DEST", value_parser = parse_resource)]
        resources: Vec<(PathBuf, String)>,
    },
}

fn parse_resource(s: &str) -> Result<(PathBuf, String), String> {
    match s.split_once('=') {
        Some((src, dest)) if !src.is_empty() && !dest.is_empty() => Ok((PathBuf::from(src), dest.to_string())),
        _ => Err(format!("expected SRC=DEST, got {s:?}")),
    }
}

fn print(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let repo_root = match cli.repo {
        Some(p) => p,
        None => std::env::current_dir()?,
    };
    let cfg = Config::load_or_default(&repo_root)?;
    debug!(repo = %repo_root.display(), "loaded config");
    let trigger_or_default = |p: Option<PathBuf>| p.unwrap_or_else(|| cfg.trigger_path());

    match cli.cmd {
        Command::Init => {
            let path = Config::config_path(&repo_root);
            if !path.exists() {
                Config::default_for_repo().save_to(&path)?;
            }
            println!("Initialized gitcache in {}", repo_root.display());
        }
        Command::Decide {
            artifact,
            trigger_path,
            no_trigger,
        } => {
            let engine = BuildDecisionEngine::open(&repo_root, &cfg);
            let target = BuildTarget::new(artifact, trigger_or_default(trigger_path))
                .with_trigger_mode(cfg.trigger.enabled && !no_trigger);
            print(&engine.decide(&target))?;
        }
        Command::Record { artifact, trigger_path } => {
            let engine = BuildDecisionEngine::open(&repo_root, &cfg);
            let bytes = engine
                .hasher()
                .read_file(&artifact)
                .with_context(|| format!("read artifact {}", artifact.display()))?;
            let target =
                BuildTarget::new(artifact, trigger_or_default(trigger_path)).with_trigger_mode(cfg.trigger.enabled);
            print(&engine.record_build(&target, &bytes))?;
        }
        Command::Fingerprint { file } => {
            let hasher = Hasher::new();
            print(&hasher.combined_hash(&hasher.read_file(&file)?))?;
        }
        Command::HashDir { dir } => {
            print(&Hasher::new().hash_directory(&dir)?)?;
        }
        Command::Revision { path, stable } => {
            let engine = BuildDecisionEngine::open(&repo_root, &cfg);
            let tracker = engine.tracker();
            let rev = match (path, stable) {
                (None, false) => tracker.current_revision()?,
                (None, true) => tracker.stable_revision_with_fallback()?,
                (Some(p), false) => tracker.revision_for_path(&p)?,
                (Some(p), true) => tracker.stable_revision_with_fallback_for_path(&p)?,
            };
            print(&json!({ "revision": rev }))?;
        }
        Command::Dirty { path } => {
            let engine = BuildDecisionEngine::open(&repo_root, &cfg);
            let tracker = engine.tracker();
            let (dirty, modified) = match &path {
                Some(p) => (tracker.is_dirty_for_path(p), tracker.modified_paths(p)?),
                None => (tracker.is_dirty(), tracker.modified_paths(std::path::Path::new("."))?),
            };
            print(&json!({ "dirty": dirty, "modified": modified }))?;
        }
        Command::Build {
            source,
            destination,
            os,
            arch,
            trigger_path,
            no_trigger,
            zip,
            resources,
        } => {
            let engine = BuildDecisionEngine::open(&repo_root, &cfg);
            let compiler = CommandCompiler::from_config(&cfg.build);
            let pipeline = BuildPipeline::new(engine, Box::new(compiler)).with_packager(Box::new(ZipPackager));
            let request = CompileRequest::new().source(source).destination(destination).os(os).arch(arch);
            let opts = BuildOptions {
                trigger_path: (cfg.trigger.enabled && !no_trigger).then(|| trigger_or_default(trigger_path)),
                package: zip || !resources.is_empty(),
                resources: resources.into_iter().collect::<BTreeMap<_, _>>(),
            };
            print(&pipeline.run(&request, &opts)?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_collects_resources_and_zip_flag() {
        let cli = Cli::try_parse_from([
            "gitcache", "build", "--source", "main.go", "--destination", "out/app", "--os", "linux", "--arch",
            "amd64", "--zip", "--resource", "assets=static", "--resource", "conf/app.json=app.json",
        ])
        .unwrap();
        match cli.cmd {
            Command::Build { zip, resources, .. } => {
                assert!(zip);
                assert_eq!(
                    resources,
                    vec![
                        (PathBuf::from("assets"), "static".to_string()),
                        (PathBuf::from("conf/app.json"), "app.json".to_string()),
                    ]
                );
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn resource_requires_both_sides() {
        assert!(parse_resource("assets").is_err());
        assert!(parse_resource("=static").is_err());
        assert!(parse_resource("assets=").is_err());
    }
}
