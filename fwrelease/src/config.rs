use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    bootmeta::BootMetaVariant,
    image::{HEADER_LEN, TRAILER_LEN},
    manifest::DEFAULT_URL,
    metadata::DEFAULT_PREFIX,
    probe::DEFAULT_TIMEOUT_SECS,
};

pub const CONFIG_FILE: &str = ".fwrelease.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("can not access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} format error: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("can not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub metadata: MetadataConfig,
    pub image: ImageConfig,
    pub signer: SignerConfig,
    pub manifest: ManifestConfig,
    pub boot_metadata: BootMetadataConfig,
    pub probe: ProbeConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    /// Generated build header, relative to the working directory
    pub header: String,
    /// Macro prefix, e.g. `ALX_BUILD` for `ALX_BUILD_DATE`
    pub prefix: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            header: "alxBuild_GENERATED.h".to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ImageConfig {
    pub header_len: usize,
    pub trailer_len: usize,
    /// Flash address of the first bootloader byte, used for Intel HEX output
    pub flash_base: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            header_len: HEADER_LEN,
            trailer_len: TRAILER_LEN,
            flash_base: 0x0800_0000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SignerConfig {
    /// imgtool invocation, program first
    pub imgtool: Vec<String>,
    /// Private key; signing is local when this file exists
    pub key: Option<String>,
    /// Public key used to encrypt the image when this file exists
    pub encrypt_key: Option<String>,
    /// Sign server settings; signing is remote when this file names a worker
    pub sign_server: Option<String>,
    /// Public key matching the server's signing key, passed with the fixed signature
    pub placeholder_pubkey: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            imgtool: vec![
                "python".to_string(),
                "${workspaceFolder}/Sub/mcuboot/scripts/imgtool.py".to_string(),
            ],
            key: None,
            encrypt_key: None,
            sign_server: Some("${workspaceFolder}/SignServer/sign-server.toml".to_string()),
            placeholder_pubkey: Some(
                "${workspaceFolder}/SignServer/placeholder-pub.pem".to_string(),
            ),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ManifestConfig {
    pub url: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BootMetadataConfig {
    /// Output header path; not generated when empty
    pub output: String,
    pub debug_symbol: String,
    pub update_symbol: String,
    pub variant: BootMetaVariant,
}

impl Default for BootMetadataConfig {
    fn default() -> Self {
        Self {
            output: "${workspaceFolder}/Sub/alxBootMetadata_GENERATED.h".to_string(),
            debug_symbol: "ALX_BUILD_CONFIG_DEBUG".to_string(),
            update_symbol: "ALX_BUILD_CONFIG_FW_UP".to_string(),
            variant: BootMetaVariant::DebugOnly,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub program: String,
    pub device: String,
    pub interface: String,
    pub speed_khz: u32,
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            program: if cfg!(windows) { "JLink.exe" } else { "JLinkExe" }.to_string(),
            device: "STM32F429ZI".to_string(),
            interface: "SWD".to_string(),
            speed_khz: 4000,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProjectConfig {
    pub fn path_in(workdir: &Path) -> PathBuf {
        workdir.join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads `.fwrelease.toml` from `workdir`, writing the defaults first if it is missing.
    pub fn load_or_create(workdir: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(workdir);
        if !path.exists() {
            let config = Self::default();
            config.save(&path)?;
            info!("Created default config {}", path.display());
            return Ok(config);
        }
        Self::load(&path)
    }
}
