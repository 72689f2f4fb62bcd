//! Per-invocation context: resolved config plus constructors for the
//! services a command needs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;
use crate::docstore::InMemoryDocumentStore;
use crate::error::Result;
use crate::model::{ModelService, build_model_service};
use crate::similarity::{EmbeddingSimilarity, build_embedder};
use crate::storage::SqliteArtifactStore;

pub struct AppContext {
    pub config: Config,
    /// Explicit `--config` path, if one was given.
    pub config_path: Option<PathBuf>,
    pub project_root: PathBuf,
    pub robot_mode: bool,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        Ok(Self {
            config,
            config_path: cli.config.clone(),
            project_root,
            robot_mode: cli.robot,
            verbosity: cli.verbose,
        })
    }

    /// Build a context around an already loaded config.
    #[must_use]
    pub fn with_config(config: Config, robot_mode: bool) -> Self {
        Self {
            config,
            config_path: None,
            project_root: PathBuf::from("."),
            robot_mode,
            verbosity: 0,
        }
    }

    /// `--db` if given, else the configured database path.
    #[must_use]
    pub fn db_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.storage.resolved_db_path())
    }

    pub fn open_store(&self, override_path: Option<&Path>) -> Result<SqliteArtifactStore> {
        let path = self.db_path(override_path);
        debug!(path = %path.display(), "opening run database");
        SqliteArtifactStore::open(&path)
    }

    pub fn model_service(&self) -> Result<Box<dyn ModelService>> {
        build_model_service(&self.config.model)
    }

    pub fn similarity(&self) -> Result<EmbeddingSimilarity> {
        Ok(EmbeddingSimilarity::new(build_embedder(
            &self.config.embedding,
        )?))
    }

    /// Documents from `--docs`, else `pipeline.docs_dir`, else none.
    pub fn document_store(&self, override_dir: Option<&Path>) -> Result<InMemoryDocumentStore> {
        match override_dir.or(self.config.pipeline.docs_dir.as_deref()) {
            Some(dir) => InMemoryDocumentStore::load_dir(dir),
            None => InMemoryDocumentStore::new(),
        }
    }
}
