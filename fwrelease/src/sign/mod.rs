//! MCUboot image signing through `imgtool`.
//!
//! The signing mode follows what the project has set up: a sign server when its
//! config names a worker, otherwise a local key when the key file exists,
//! otherwise an unsigned (padded, header-only) image.

use std::path::{Path, PathBuf};

use crate::{
    config::SignerConfig,
    image::sibling,
    utils::{Command, Tool, ToolError, resolve_path},
};

pub mod server;

pub use server::SignServerConfig;

/// Per-build `imgtool sign` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignParams {
    pub header_len: usize,
    pub slot_size: u32,
    /// `major.minor.patch+date`
    pub version: String,
}

/// Optional `imgtool sign` flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignExtras {
    pub key: Option<PathBuf>,
    pub encrypt_key: Option<PathBuf>,
    pub vector_to_sign: bool,
    pub fixed_signature: Option<PathBuf>,
    pub fixed_signature_pubkey: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningMode {
    Remote {
        server: SignServerConfig,
        placeholder_pubkey: PathBuf,
    },
    LocalKey {
        key: PathBuf,
        encrypt_key: Option<PathBuf>,
    },
    Unsigned,
}

impl SigningMode {
    pub fn select(config: &SignerConfig, workdir: &Path) -> anyhow::Result<Self> {
        let existing = |p: &Option<String>| {
            p.as_deref()
                .map(|p| resolve_path(p, workdir))
                .filter(|p| p.exists())
        };

        if let Some(path) = config.sign_server.as_deref().map(|p| resolve_path(p, workdir))
            && let Some(server) = SignServerConfig::load(&path)?
            && server.is_enabled()
        {
            let placeholder_pubkey = existing(&config.placeholder_pubkey).ok_or_else(|| {
                anyhow!(
                    "sign server {} is configured but the placeholder public key is missing",
                    path.display()
                )
            })?;
            return Ok(SigningMode::Remote {
                server,
                placeholder_pubkey,
            });
        }

        if let Some(key) = existing(&config.key) {
            return Ok(SigningMode::LocalKey {
                key,
                encrypt_key: existing(&config.encrypt_key),
            });
        }

        Ok(SigningMode::Unsigned)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SigningMode::Remote { .. } => "sign server",
            SigningMode::LocalKey { .. } => "local key",
            SigningMode::Unsigned => "unsigned",
        }
    }
}

/// Files produced by [`Signer::sign`].
#[derive(Debug, Clone, Default)]
pub struct SignOutputs {
    pub signed: PathBuf,
    pub unsigned: Option<PathBuf>,
    pub digest: Option<PathBuf>,
    pub ext_sig: Option<PathBuf>,
}

pub struct Signer {
    imgtool: Vec<String>,
    workdir: PathBuf,
    mode: SigningMode,
}

impl Signer {
    pub fn new(imgtool: Vec<String>, workdir: &Path, mode: SigningMode) -> Self {
        Self {
            imgtool,
            workdir: workdir.to_path_buf(),
            mode,
        }
    }

    pub fn from_config(config: &SignerConfig, workdir: &Path) -> anyhow::Result<Self> {
        let mode = SigningMode::select(config, workdir)?;
        Ok(Self::new(config.imgtool.clone(), workdir, mode))
    }

    /// `imgtool ... sign` with the fixed argument order the bootloader build expects.
    pub fn command(
        &self,
        params: &SignParams,
        extras: &SignExtras,
        input: &Path,
        output: &Path,
    ) -> Result<Command, ToolError> {
        let mut cmd = Command::from_argv(&self.imgtool, &self.workdir, Tool::Signer)?;
        cmd.arg("sign")
            .arg("--header-size")
            .arg(format!("0x{:04X}", params.header_len))
            .arg("--pad-header")
            .arg("--slot-size")
            .arg(format!("0x{:X}", params.slot_size))
            .arg("--version")
            .arg(&params.version)
            .arg("--pad");

        if let Some(key) = &extras.key {
            cmd.arg("--key").arg(key);
        }
        if let Some(enc) = &extras.encrypt_key {
            cmd.arg("--encrypt").arg(enc);
        }
        if extras.vector_to_sign {
            cmd.arg("--vector-to-sign").arg("digest");
        }
        if let Some(sig) = &extras.fixed_signature {
            cmd.arg("--fix-sig").arg(sig);
        }
        if let Some(pubkey) = &extras.fixed_signature_pubkey {
            cmd.arg("--fix-sig-pubkey").arg(pubkey);
        }

        cmd.arg(input).arg(output);
        Ok(cmd)
    }

    fn imgtool(
        &self,
        params: &SignParams,
        extras: &SignExtras,
        input: &Path,
        output: &Path,
    ) -> Result<(), ToolError> {
        self.command(params, extras, input, output)?
            .output_checked()
            .map(|_| ())
    }

    /// Signs `raw`, naming every artifact after `source` (`<stem>_Signed.bin`, ...).
    pub fn sign(
        &self,
        source: &Path,
        raw: &Path,
        params: &SignParams,
    ) -> anyhow::Result<SignOutputs> {
        let signed = sibling(source, "_Signed", "bin");
        let unsigned = sibling(source, "_Unsigned", "bin");
        info!("signing {} ({})", raw.display(), self.mode.name());

        match &self.mode {
            SigningMode::Unsigned => {
                warn!("no signing key configured, {} is unsigned", signed.display());
                self.imgtool(params, &SignExtras::default(), raw, &signed)?;
                Ok(SignOutputs {
                    signed,
                    ..Default::default()
                })
            }
            SigningMode::LocalKey { key, encrypt_key } => {
                self.imgtool(params, &SignExtras::default(), raw, &unsigned)?;
                let extras = SignExtras {
                    key: Some(key.clone()),
                    encrypt_key: encrypt_key.clone(),
                    ..Default::default()
                };
                self.imgtool(params, &extras, raw, &signed)?;
                Ok(SignOutputs {
                    signed,
                    unsigned: Some(unsigned),
                    ..Default::default()
                })
            }
            SigningMode::Remote {
                server,
                placeholder_pubkey,
            } => {
                let digest = sibling(source, "_SHA256", "bin");
                let ext_sig = sibling(source, "_ExtSig", "b64");

                self.imgtool(params, &SignExtras::default(), raw, &unsigned)?;

                let to_sign = SignExtras {
                    vector_to_sign: true,
                    ..Default::default()
                };
                self.imgtool(params, &to_sign, raw, &digest)?;

                server.sign_digest(&digest, &ext_sig, &self.workdir)?;

                let fixed = SignExtras {
                    fixed_signature: Some(ext_sig.clone()),
                    fixed_signature_pubkey: Some(placeholder_pubkey.clone()),
                    ..Default::default()
                };
                self.imgtool(params, &fixed, raw, &signed)?;

                Ok(SignOutputs {
                    signed,
                    unsigned: Some(unsigned),
                    digest: Some(digest),
                    ext_sig: Some(ext_sig),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn params() -> SignParams {
        SignParams {
            header_len: 0x200,
            slot_size: 0x60000,
            version: "1.2.3+2403071530".into(),
        }
    }

    fn signer(mode: SigningMode) -> Signer {
        Signer::new(
            vec!["python".into(), "${workspaceFolder}/imgtool.py".into()],
            Path::new("/proj"),
            mode,
        )
    }

    #[test]
    fn test_base_arguments() {
        let cmd = signer(SigningMode::Unsigned)
            .command(
                &params(),
                &SignExtras::default(),
                Path::new("fw_Raw.bin"),
                Path::new("fw_Signed.bin"),
            )
            .unwrap();
        assert_eq!(
            cmd.cmd_line(),
            "python /proj/imgtool.py sign --header-size 0x0200 --pad-header \
             --slot-size 0x60000 --version 1.2.3+2403071530 --pad fw_Raw.bin fw_Signed.bin"
        );
    }

    #[test]
    fn test_extra_arguments_before_files() {
        let extras = SignExtras {
            key: Some("k.pem".into()),
            encrypt_key: Some("e.pem".into()),
            ..Default::default()
        };
        let cmd = signer(SigningMode::Unsigned)
            .command(&params(), &extras, Path::new("in"), Path::new("out"))
            .unwrap();
        assert!(
            cmd.cmd_line()
                .ends_with("--pad --key k.pem --encrypt e.pem in out")
        );

        let extras = SignExtras {
            fixed_signature: Some("s.b64".into()),
            fixed_signature_pubkey: Some("pub.pem".into()),
            ..Default::default()
        };
        let cmd = signer(SigningMode::Unsigned)
            .command(&params(), &extras, Path::new("in"), Path::new("out"))
            .unwrap();
        assert!(
            cmd.cmd_line()
                .ends_with("--pad --fix-sig s.b64 --fix-sig-pubkey pub.pem in out")
        );
    }

    #[test]
    fn test_empty_imgtool_is_error() {
        let s = Signer::new(vec![], Path::new("/"), SigningMode::Unsigned);
        assert!(
            s.command(&params(), &SignExtras::default(), Path::new("a"), Path::new("b"))
                .is_err()
        );
    }

    #[test]
    fn test_mode_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SignerConfig {
            key: Some("${workspaceFolder}/key.pem".into()),
            ..Default::default()
        };

        // nothing on disk
        assert_eq!(
            SigningMode::select(&config, dir.path()).unwrap(),
            SigningMode::Unsigned
        );

        fs::write(dir.path().join("key.pem"), "k").unwrap();
        assert!(matches!(
            SigningMode::select(&config, dir.path()).unwrap(),
            SigningMode::LocalKey { encrypt_key: None, .. }
        ));

        let server = dir.path().join("SignServer");
        fs::create_dir_all(&server).unwrap();
        fs::write(server.join("sign-server.toml"), "url = \"u\"\nworker = \"\"\n").unwrap();
        assert!(matches!(
            SigningMode::select(&config, dir.path()).unwrap(),
            SigningMode::LocalKey { .. }
        ));

        fs::write(server.join("sign-server.toml"), "url = \"u\"\nworker = \"w\"\n").unwrap();
        assert!(SigningMode::select(&config, dir.path()).is_err());

        fs::write(server.join("placeholder-pub.pem"), "p").unwrap();
        assert!(matches!(
            SigningMode::select(&config, dir.path()).unwrap(),
            SigningMode::Remote { .. }
        ));

        config.sign_server = None;
        assert!(matches!(
            SigningMode::select(&config, dir.path()).unwrap(),
            SigningMode::LocalKey { .. }
        ));
    }
}
