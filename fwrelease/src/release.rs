//! Release directories: a dated, versioned folder holding the primary binary and
//! selected side artifacts under one canonical name.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{image::sibling, metadata::BuildMetadata};

/// `{date}_{artifact}_{fw}_V{major}-{minor}-{patch}_{hash}`
pub fn release_dir_name(meta: &BuildMetadata, artifact: &str, fw_name: &str) -> String {
    let v = meta.version();
    format!(
        "{}_{artifact}_{fw_name}_V{}-{}-{}_{}",
        meta.date(),
        v.major,
        v.minor,
        v.patch,
        meta.hash_short()
    )
}

/// Side artifacts copied next to the primary binary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extras {
    pub raw: bool,
    pub signed: bool,
    pub manifest: bool,
    pub combined_hex: bool,
    pub no_boot: bool,
}

impl Extras {
    fn selected(&self) -> Vec<(&'static str, &'static str)> {
        [
            (self.raw, "_Raw", "bin"),
            (self.signed, "_Signed", "bin"),
            (self.manifest, "_Manifest", "json"),
            (self.combined_hex, "_Combined", "hex"),
            (self.no_boot, "_NoBoot", "bin"),
        ]
        .into_iter()
        .filter(|(on, _, _)| *on)
        .map(|(_, suffix, ext)| (suffix, ext))
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Release {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

pub struct Packager<'a> {
    meta: &'a BuildMetadata,
    artifact: String,
    fw_name: String,
    extras: Extras,
}

fn check_name(what: &str, name: &str) -> anyhow::Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        bail!("invalid {what} `{name}`");
    }
    Ok(())
}

impl<'a> Packager<'a> {
    pub fn new(
        meta: &'a BuildMetadata,
        artifact: impl Into<String>,
        fw_name: impl Into<String>,
        extras: Extras,
    ) -> anyhow::Result<Self> {
        let artifact = artifact.into();
        let fw_name = fw_name.into();
        check_name("artifact name", &artifact)?;
        check_name("firmware name", &fw_name)?;
        Ok(Self {
            meta,
            artifact,
            fw_name,
            extras,
        })
    }

    pub fn dir_name(&self) -> String {
        release_dir_name(self.meta, &self.artifact, &self.fw_name)
    }

    /// Recreates the release directory next to `primary` and copies the artifacts in.
    ///
    /// Sources are checked before anything is deleted, so a missing artifact
    /// leaves a previous release untouched.
    pub fn package(&self, primary: &Path) -> anyhow::Result<Release> {
        let name = self.dir_name();
        let parent = primary
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let dir = parent.join(&name);

        let mut copies = vec![(primary.to_path_buf(), dir.join(format!("{name}.bin")))];
        for (suffix, ext) in self.extras.selected() {
            copies.push((
                sibling(primary, suffix, ext),
                dir.join(format!("{name}{suffix}.{ext}")),
            ));
        }
        for (src, _) in &copies {
            if !src.is_file() {
                bail!("release source {} not found", src.display());
            }
        }

        if dir.exists() {
            info!("removing previous release {}", dir.display());
            fs::remove_dir_all(&dir)
                .map_err(|e| anyhow!("can not remove {}: {e}", dir.display()))?;
        }
        fs::create_dir_all(&dir)?;

        let mut files = Vec::with_capacity(copies.len());
        for (src, dst) in copies {
            fs::copy(&src, &dst).map_err(|e| {
                anyhow!("can not copy {} to {}: {e}", src.display(), dst.display())
            })?;
            debug!("{} -> {}", src.display(), dst.display());
            files.push(dst);
        }

        Ok(Release { dir, files })
    }
}

/// First `*.bin` in `dir` that is not a derived image.
pub fn find_app_image(dir: &Path) -> anyhow::Result<PathBuf> {
    bins(dir)?
        .into_iter()
        .find(|p| {
            let name = p.to_string_lossy();
            !["_Signed.bin", "_NoBoot.bin", "_Raw.bin"]
                .iter()
                .any(|s| name.ends_with(s))
        })
        .ok_or_else(|| anyhow!("no application image in {}", dir.display()))
}

pub fn find_signed_image(dir: &Path) -> anyhow::Result<PathBuf> {
    bins(dir)?
        .into_iter()
        .find(|p| p.to_string_lossy().ends_with("_Signed.bin"))
        .ok_or_else(|| anyhow!("no signed image in {}", dir.display()))
}

fn bins(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| anyhow!("can not read {}: {e}", dir.display()))?;
    let mut out = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "bin") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::FwVersion;

    fn meta() -> BuildMetadata {
        BuildMetadata::new(
            "2403071530",
            "1a2b3c4",
            FwVersion {
                major: 1,
                minor: 2,
                patch: 3,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_dir_name() {
        assert_eq!(
            release_dir_name(&meta(), "Nemo", "NemoFw"),
            "2403071530_Nemo_NemoFw_V1-2-3_1a2b3c4"
        );
    }

    #[test]
    fn test_bad_names_rejected() {
        let m = meta();
        assert!(Packager::new(&m, "", "fw", Extras::default()).is_err());
        assert!(Packager::new(&m, "a/b", "fw", Extras::default()).is_err());
        assert!(Packager::new(&m, "a", "..", Extras::default()).is_err());
    }

    #[test]
    fn test_package_recreates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let primary = tmp.path().join("Nemo.bin");
        fs::write(&primary, b"app").unwrap();
        fs::write(tmp.path().join("Nemo_Signed.bin"), b"signed").unwrap();
        fs::write(tmp.path().join("Nemo_Manifest.json"), b"{}").unwrap();

        let m = meta();
        let extras = Extras {
            signed: true,
            manifest: true,
            ..Default::default()
        };
        let packager = Packager::new(&m, "Nemo", "NemoFw", extras).unwrap();

        let dir = tmp.path().join("2403071530_Nemo_NemoFw_V1-2-3_1a2b3c4");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale.txt"), b"old").unwrap();

        let release = packager.package(&primary).unwrap();
        assert_eq!(release.dir, dir);
        assert!(!dir.join("stale.txt").exists());

        let name = "2403071530_Nemo_NemoFw_V1-2-3_1a2b3c4";
        assert_eq!(fs::read(dir.join(format!("{name}.bin"))).unwrap(), b"app");
        assert_eq!(
            fs::read(dir.join(format!("{name}_Signed.bin"))).unwrap(),
            b"signed"
        );
        assert!(dir.join(format!("{name}_Manifest.json")).exists());
        assert_eq!(release.files.len(), 3);

        // same inputs, same result
        let before: Vec<Vec<u8>> = release.files.iter().map(|f| fs::read(f).unwrap()).collect();
        let again = packager.package(&primary).unwrap();
        assert_eq!(again.files, release.files);
        let after: Vec<Vec<u8>> = again.files.iter().map(|f| fs::read(f).unwrap()).collect();
        assert_eq!(after, before);
    }

    #[test]
    fn test_missing_extra_keeps_previous_release() {
        let tmp = tempfile::tempdir().unwrap();
        let primary = tmp.path().join("Nemo.bin");
        fs::write(&primary, b"app").unwrap();

        let m = meta();
        let extras = Extras {
            raw: true,
            ..Default::default()
        };
        let packager = Packager::new(&m, "Nemo", "NemoFw", extras).unwrap();
        let dir = tmp.path().join(packager.dir_name());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("keep.txt"), b"old").unwrap();

        let err = packager.package(&primary).unwrap_err();
        assert!(err.to_string().contains("Nemo_Raw.bin"));
        assert!(dir.join("keep.txt").exists());
    }

    #[test]
    fn test_find_images() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["fw_Signed.bin", "fw_NoBoot.bin", "fw.bin", "notes.txt"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        assert_eq!(find_app_image(tmp.path()).unwrap(), tmp.path().join("fw.bin"));
        assert_eq!(
            find_signed_image(tmp.path()).unwrap(),
            tmp.path().join("fw_Signed.bin")
        );

        let empty = tempfile::tempdir().unwrap();
        assert!(find_app_image(empty.path()).is_err());
    }
}
