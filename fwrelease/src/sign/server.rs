use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::utils::{Command, Tool, ToolError};

/// Remote signing service, read from its own TOML file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignServerConfig {
    pub url: String,
    /// Signing worker on the server; remote signing is off when empty
    #[serde(default)]
    pub worker: String,
    /// HTTP client invocation, program first
    #[serde(default = "default_client")]
    pub client: Vec<String>,
    /// Extra client arguments, e.g. credentials or certificates
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_client() -> Vec<String> {
    vec!["curl".to_string()]
}

impl SignServerConfig {
    /// `None` when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow!("can not read sign server config {}: {e}", path.display()))?;
        let config = toml::from_str(&text)
            .map_err(|e| anyhow!("sign server config {} format error: {e}", path.display()))?;
        Ok(Some(config))
    }

    pub fn is_enabled(&self) -> bool {
        !self.worker.trim().is_empty()
    }

    fn command(&self, digest: &Path, out: &Path, workdir: &Path) -> Result<Command, ToolError> {
        let mut cmd = Command::from_argv(&self.client, workdir, Tool::HttpClient)?;
        cmd.args(["--silent", "--show-error", "--fail", "-X", "POST"])
            .arg("-F")
            .arg(format!("workerName={}", self.worker))
            .arg("-F")
            .arg(format!("file=@{}", digest.display()))
            .arg("-o")
            .arg(out)
            .args(&self.extra_args)
            .arg(&self.url);
        Ok(cmd)
    }

    /// Posts `digest` to the server and returns the detached signature bytes.
    pub fn request_signature(&self, digest: &Path, workdir: &Path) -> anyhow::Result<Vec<u8>> {
        let out = tempfile::NamedTempFile::new()?;
        self.command(digest, out.path(), workdir)?.output_checked()?;

        let signature = fs::read(out.path())?;
        if signature.is_empty() {
            bail!("sign server {} returned an empty signature", self.url);
        }
        debug!("received {} byte signature", signature.len());
        Ok(signature)
    }

    /// Requests a signature and stores it base64-encoded at `ext_sig`.
    pub fn sign_digest(
        &self,
        digest: &Path,
        ext_sig: &Path,
        workdir: &Path,
    ) -> anyhow::Result<PathBuf> {
        let signature = self.request_signature(digest, workdir)?;
        fs::write(ext_sig, STANDARD.encode(signature))
            .map_err(|e| anyhow!("can not write {}: {e}", ext_sig.display()))?;
        Ok(ext_sig.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SignServerConfig {
        toml::from_str(
            r#"
url = "https://sign.example/api/sign"
worker = "fw-ecdsa"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let c = config();
        assert!(c.is_enabled());
        assert_eq!(c.client, ["curl"]);
        assert!(c.extra_args.is_empty());

        let empty: SignServerConfig = toml::from_str("url = \"x\"\nworker = \" \"").unwrap();
        assert!(!empty.is_enabled());
    }

    #[test]
    fn test_client_command_line() {
        let mut c = config();
        c.extra_args = vec!["--cacert".into(), "${workspaceFolder}/ca.pem".into()];
        let cmd = c
            .command(Path::new("/o/fw_SHA256.bin"), Path::new("/t/sig"), Path::new("/p"))
            .unwrap();
        assert_eq!(
            cmd.cmd_line(),
            "curl --silent --show-error --fail -X POST -F workerName=fw-ecdsa \
             -F file=@/o/fw_SHA256.bin -o /t/sig --cacert /p/ca.pem https://sign.example/api/sign"
        );
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            SignServerConfig::load(&dir.path().join("sign-server.toml"))
                .unwrap()
                .is_none()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_signature_is_base64_encoded() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        // stands in for curl: writes a fixed signature to the `-o` path
        let client = dir.path().join("client.sh");
        fs::write(
            &client,
            "#!/bin/sh\nwhile [ \"$1\" != \"-o\" ]; do shift; done\nprintf 'sig' > \"$2\"\n",
        )
        .unwrap();
        fs::set_permissions(&client, fs::Permissions::from_mode(0o755)).unwrap();

        let mut c = config();
        c.client = vec![client.display().to_string()];
        let digest = dir.path().join("fw_SHA256.bin");
        fs::write(&digest, [0u8; 32]).unwrap();
        let ext_sig = dir.path().join("fw_ExtSig.b64");

        c.sign_digest(&digest, &ext_sig, dir.path()).unwrap();
        assert_eq!(fs::read_to_string(&ext_sig).unwrap(), "c2ln");
    }
}
