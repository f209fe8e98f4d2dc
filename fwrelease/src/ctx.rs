use std::path::PathBuf;

use crate::{
    config::ProjectConfig,
    image::ImageLayout,
    metadata::BuildMetadata,
    probe::Commander,
    sign::Signer,
    utils::resolve_path,
};

/// Working directory, project configuration and lazily read build metadata.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub workdir: PathBuf,
    pub config: ProjectConfig,
    metadata: Option<BuildMetadata>,
}

impl AppContext {
    pub fn new(workdir: PathBuf, config: ProjectConfig) -> Self {
        Self {
            workdir,
            config,
            metadata: None,
        }
    }

    /// Loads `.fwrelease.toml` from `workdir`, creating it with defaults when missing.
    pub fn load(workdir: PathBuf) -> anyhow::Result<Self> {
        let config = ProjectConfig::load_or_create(&workdir)?;
        Ok(Self::new(workdir, config))
    }

    pub fn resolve(&self, value: &str) -> PathBuf {
        resolve_path(value, &self.workdir)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.resolve(&self.config.metadata.header)
    }

    pub fn build_metadata(&mut self) -> anyhow::Result<&BuildMetadata> {
        if self.metadata.is_none() {
            let path = self.metadata_path();
            let meta = BuildMetadata::from_file(&path, &self.config.metadata.prefix)?;
            debug!("build metadata from {}: {meta:?}", path.display());
            self.metadata = Some(meta);
        }
        self.metadata
            .as_ref()
            .ok_or_else(|| anyhow!("build metadata not loaded"))
    }

    pub fn layout(&self, bootloader_len: usize) -> ImageLayout {
        ImageLayout {
            bootloader_len,
            header_len: self.config.image.header_len,
            trailer_len: self.config.image.trailer_len,
        }
    }

    pub fn signer(&self) -> anyhow::Result<Signer> {
        Signer::from_config(&self.config.signer, &self.workdir)
    }

    pub fn commander(&self) -> Commander {
        Commander::from_config(&self.config.probe, &self.workdir)
    }
}
