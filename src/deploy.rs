//! Deploy tool: resolves the deployment configuration, stages the bundle
//! into a target directory, writes the runtime `.env` file and applies the
//! database migrations.
//!
//! Configuration comes from four layers, lowest precedence first: built-in
//! defaults, a YAML file (`--config_file`), `SIMPLEFEED_*` environment
//! variables and command-line flags. Each layer only overrides the keys it
//! actually sets.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::db::Database;

pub const ENV_PREFIX: &str = "SIMPLEFEED_";

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("No target directory given (use --target or SIMPLEFEED_TARGET)")]
    MissingTarget,

    #[error("Unable to read config file '{}': {source}", path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Invalid config file '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Unable to create directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Unable to copy '{}' to '{}': {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Unable to read environment file '{}': {source}", path.display())]
    EnvRead { path: PathBuf, source: io::Error },

    #[error("Invalid environment file '{}': {reason}", path.display())]
    EnvParse { path: PathBuf, reason: String },

    #[error("Unable to write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl DeployError {
    /// Process exit status: 2 for failed tasks, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::Migration(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(
    name = "simplefeed-deploy",
    about = "Deploy tool for simplefeed.",
    after_help = "examples:\n  Copy the bundle to /srv/simplefeed and migrate its database\n\n    simplefeed-deploy --target /srv/simplefeed"
)]
pub struct DeployArgs {
    /// Directory the bundle is copied into
    #[arg(short = 't', long = "target")]
    pub target: Option<PathBuf>,

    /// SQLite database to migrate, relative to the target unless absolute
    #[arg(long = "db_path", visible_alias = "db")]
    pub db_path: Option<PathBuf>,

    /// YAML file with deploy settings
    #[arg(short = 'c', long = "config_file")]
    pub config_file: Option<PathBuf>,

    /// Comma-separated files and directories to bundle
    #[arg(long = "files_and_dirs", visible_alias = "fd", value_delimiter = ',')]
    pub files_and_dirs: Option<Vec<String>>,

    /// YAML file of environment settings inside the bundle
    #[arg(short = 'e', long = "env_file")]
    pub env_file: Option<String>,

    /// Name of the generated KEY=value file
    #[arg(long = "docker_env", visible_alias = "de")]
    pub docker_env: Option<String>,

    /// Only export the environment settings, then exit
    #[arg(long = "set_env")]
    pub set_env: bool,
}

/// One source of deploy settings. Unset fields leave lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub target: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub files_and_dirs: Option<Vec<String>>,
    pub env_file: Option<String>,
    pub docker_env: Option<String>,
}

impl ConfigLayer {
    pub fn from_yaml_file(path: &Path) -> Result<Self, DeployError> {
        let content = fs::read_to_string(path).map_err(|source| DeployError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content).map_err(|source| DeployError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document sets nothing
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let layer: Option<ConfigLayer> = serde_yaml::from_str(content)?;
        Ok(layer.unwrap_or_default())
    }

    /// Read `SIMPLEFEED_*` variables through `lookup`.
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        Self {
            target: var("TARGET").map(PathBuf::from),
            db_path: var("DB_PATH").map(PathBuf::from),
            files_and_dirs: var("FILES_AND_DIRS").map(|v| split_list(&v)),
            env_file: var("ENV_FILE"),
            docker_env: var("DOCKER_ENV"),
        }
    }

    pub fn from_args(args: &DeployArgs) -> Self {
        Self {
            target: args.target.clone(),
            db_path: args.db_path.clone(),
            files_and_dirs: args.files_and_dirs.as_ref().map(|items| {
                items
                    .iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
            env_file: args.env_file.clone(),
            docker_env: args.docker_env.clone(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Effective deploy settings after all layers are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployConfig {
    pub target: Option<PathBuf>,
    pub db_path: PathBuf,
    pub files_and_dirs: Vec<String>,
    pub env_file: String,
    pub docker_env: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            target: None,
            db_path: PathBuf::from("data/simplefeed.db"),
            files_and_dirs: [
                "Cargo.toml",
                "Cargo.lock",
                "src",
                "migrations",
                "templates",
                "simplefeed.toml",
                "deploy/docker-compose.yml",
                "deploy/Dockerfile",
                "deploy/env.yml",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            env_file: "env.yml".to_string(),
            docker_env: ".env".to_string(),
        }
    }
}

impl DeployConfig {
    /// Fold `layers` over the defaults, lowest precedence first.
    pub fn resolve<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        layers.into_iter().fold(Self::default(), |mut config, layer| {
            config.merge(layer);
            config
        })
    }

    pub fn merge(&mut self, layer: ConfigLayer) {
        if let Some(target) = layer.target {
            self.target = Some(target);
        }
        if let Some(db_path) = layer.db_path {
            self.db_path = db_path;
        }
        if let Some(files_and_dirs) = layer.files_and_dirs {
            self.files_and_dirs = files_and_dirs;
        }
        if let Some(env_file) = layer.env_file {
            self.env_file = env_file;
        }
        if let Some(docker_env) = layer.docker_env {
            self.docker_env = docker_env;
        }
    }
}

/// Collect the configured layers in precedence order: file, env, flags.
pub fn collect_layers<F>(args: &DeployArgs, env: F) -> Result<Vec<ConfigLayer>, DeployError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut layers = Vec::with_capacity(3);
    if let Some(path) = &args.config_file {
        layers.push(ConfigLayer::from_yaml_file(path)?);
    }
    layers.push(ConfigLayer::from_env(env));
    layers.push(ConfigLayer::from_args(args));
    Ok(layers)
}

pub struct Deployer {
    config: DeployConfig,
    target: PathBuf,
    source_root: PathBuf,
}

impl Deployer {
    /// Fails with [`DeployError::MissingTarget`] when no layer set a target.
    pub fn new(config: DeployConfig, source_root: impl Into<PathBuf>) -> Result<Self, DeployError> {
        let target = config.target.clone().ok_or(DeployError::MissingTarget)?;
        Ok(Self {
            config,
            target,
            source_root: source_root.into(),
        })
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Copy every configured item into the target, creating it if needed.
    ///
    /// Directories keep their relative path under the target, files land at
    /// the top of the target. Missing items are skipped.
    pub fn copy_files_and_dirs(&self) -> Result<Vec<PathBuf>, DeployError> {
        if !self.target.is_dir() {
            create_dir(&self.target)?;
        }

        let mut copied = Vec::new();
        for item in &self.config.files_and_dirs {
            let source = self.source_root.join(item);

            if source.is_dir() {
                let dest = self.target.join(item);
                copy_dir(&source, &dest)?;
                copied.push(dest);
            } else if source.is_file() {
                let Some(file_name) = source.file_name() else {
                    warn!("Skipping '{}': no file name", source.display());
                    continue;
                };
                let dest = self.target.join(file_name);
                copy_file(&source, &dest)?;
                copied.push(dest);
            } else {
                warn!("Not found, skipping: {}", source.display());
            }
        }

        Ok(copied)
    }

    /// Path of the environment settings file inside the target.
    pub fn env_file_path(&self) -> PathBuf {
        self.target.join(&self.config.env_file)
    }

    /// Entries of the environment settings file, in file order.
    pub fn read_env(&self) -> Result<Vec<(String, String)>, DeployError> {
        let path = self.env_file_path();
        let content = fs::read_to_string(&path).map_err(|source| DeployError::EnvRead {
            path: path.clone(),
            source,
        })?;
        parse_env_yaml(&content).map_err(|reason| DeployError::EnvParse { path, reason })
    }

    /// Export the environment settings into this process.
    pub fn set_environment(&self) -> Result<usize, DeployError> {
        let entries = self.read_env()?;
        for (key, value) in &entries {
            std::env::set_var(key, value);
        }
        info!("Exported {} environment variables", entries.len());
        Ok(entries.len())
    }

    /// Write the environment settings as `KEY=value` lines.
    pub fn create_docker_env_file(&self) -> Result<PathBuf, DeployError> {
        let entries = self.read_env()?;
        let path = self.target.join(&self.config.docker_env);

        let content: String = entries
            .iter()
            .map(|(key, value)| format!("{}={}\n", key, value))
            .collect();
        fs::write(&path, content).map_err(|source| DeployError::Write {
            path: path.clone(),
            source,
        })?;

        info!("Wrote {} entries to '{}'", entries.len(), path.display());
        Ok(path)
    }

    /// Database file to migrate; relative paths are under the target.
    pub fn database_path(&self) -> PathBuf {
        if self.config.db_path.is_absolute() {
            self.config.db_path.clone()
        } else {
            self.target.join(&self.config.db_path)
        }
    }

    pub async fn apply_migrations(&self) -> Result<(), DeployError> {
        let path = self.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                create_dir(parent)?;
            }
        }
        info!("Applying migrations to '{}'", path.display());

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let db = Database::with_max_connections(&url, 1)
            .await
            .map_err(|e| DeployError::Migration(e.to_string()))?;
        db.initialize()
            .await
            .map_err(|e| DeployError::Migration(e.to_string()))?;

        info!("Migrations applied");
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), DeployError> {
    info!("Create directory '{}'", path.display());
    fs::create_dir_all(path).map_err(|source| DeployError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Recursive copy; existing files at the destination are overwritten.
fn copy_dir(source: &Path, dest: &Path) -> Result<(), DeployError> {
    info!("Copy directory '{}' to '{}'", source.display(), dest.display());

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| DeployError::Copy {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            source: e.into(),
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            create_dir(&target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|source| DeployError::Copy {
                from: entry.path().to_path_buf(),
                to: target.clone(),
                source,
            })?;
        }
    }
    Ok(())
}

fn copy_file(source: &Path, dest: &Path) -> Result<(), DeployError> {
    info!("Copy file '{}' to '{}'", source.display(), dest.display());
    fs::copy(source, dest).map_err(|e| DeployError::Copy {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn parse_env_yaml(content: &str) -> Result<Vec<(String, String)>, String> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    match value {
        serde_yaml::Value::Null => Ok(Vec::new()),
        serde_yaml::Value::Mapping(mapping) => Ok(mapping
            .iter()
            .map(|(k, v)| (yaml_scalar(k), yaml_scalar(v)))
            .collect()),
        _ => Err("expected a mapping of KEY: value".to_string()),
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `--set_env`: this many variables were exported, nothing copied
    EnvironmentSet(usize),
    Deployed,
}

/// Resolve the configuration and perform the deployment.
pub async fn run<F>(args: DeployArgs, source_root: &Path, env: F) -> Result<Outcome, DeployError>
where
    F: Fn(&str) -> Option<String>,
{
    let layers = collect_layers(&args, env)?;
    let config = DeployConfig::resolve(layers);
    let deployer = Deployer::new(config, source_root)?;
    info!("Deploying to '{}'", deployer.target().display());

    if args.set_env {
        let count = deployer.set_environment()?;
        return Ok(Outcome::EnvironmentSet(count));
    }

    deployer.copy_files_and_dirs()?;
    deployer.create_docker_env_file()?;
    deployer.apply_migrations().await?;

    Ok(Outcome::Deployed)
}
