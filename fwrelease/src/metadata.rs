//! Build metadata read from the generated `#define` header.
//!
//! The header is produced by the firmware build and looks like:
//!
//! ```text
//! #define ALX_BUILD_DATE 2403071530
//! #define ALX_BUILD_HASH_SHORT "1a2b3c4"
//! #define ALX_BUILD_FW_VER_MAJOR 1
//! ```
//!
//! Fields are looked up by macro name, so reordering or adding lines does not
//! affect parsing.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use serde::Serialize;

pub const DEFAULT_PREFIX: &str = "ALX_BUILD";

const DATE_LEN: usize = 10;
const HASH_SHORT_LEN: usize = 7;

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    #[error("can not read build metadata {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("build metadata is missing `{0}`")]
    MissingKey(String),
    #[error("build metadata `{key}` = `{value}` is invalid: {reason}")]
    Malformed {
        key: String,
        value: String,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, MetadataError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FwVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl fmt::Display for FwVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildMetadata {
    date: String,
    hash_short: String,
    version: FwVersion,
    hash: Option<String>,
    name: Option<String>,
}

impl BuildMetadata {
    pub fn new(
        date: impl Into<String>,
        hash_short: impl Into<String>,
        version: FwVersion,
    ) -> Result<Self> {
        let date = check_date(date.into())?;
        let hash_short = check_hash_short(hash_short.into())?;
        Ok(Self {
            date,
            hash_short,
            version,
            hash: None,
            name: None,
        })
    }

    pub fn from_file(path: &Path, prefix: &str) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| MetadataError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text, prefix)
    }

    pub fn parse(text: &str, prefix: &str) -> Result<Self> {
        let defines = collect_defines(text, prefix);
        let get = |key: &str| {
            defines
                .get(key)
                .cloned()
                .ok_or_else(|| MetadataError::MissingKey(format!("{prefix}_{key}")))
        };

        let date = check_date(get("DATE")?)?;
        let hash_short = check_hash_short(unquote(&get("HASH_SHORT")?).to_string())?;
        let version = FwVersion {
            major: parse_ver(prefix, "FW_VER_MAJOR", &get("FW_VER_MAJOR")?)?,
            minor: parse_ver(prefix, "FW_VER_MINOR", &get("FW_VER_MINOR")?)?,
            patch: parse_ver(prefix, "FW_VER_PATCH", &get("FW_VER_PATCH")?)?,
        };

        Ok(Self {
            date,
            hash_short,
            version,
            hash: defines.get("HASH").map(|v| unquote(v).to_string()),
            name: defines.get("NAME").map(|v| unquote(v).to_string()),
        })
    }

    /// Build date as `YYMMDDHHmm`.
    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn date_number(&self) -> u64 {
        // digits only, checked on construction
        self.date.parse().unwrap_or_default()
    }

    pub fn hash_short(&self) -> &str {
        &self.hash_short
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn version(&self) -> FwVersion {
        self.version
    }

    /// Version string handed to the image signer: `major.minor.patch+date`.
    pub fn signer_version(&self) -> String {
        format!("{}+{}", self.version, self.date)
    }

    /// Renders the header the firmware build generates.
    pub fn render(&self, prefix: &str) -> String {
        let hash = self.hash.clone().unwrap_or_else(|| self.hash_short.clone());
        let hash_u32 = u32::from_str_radix(&self.hash_short, 16).unwrap_or_default();
        let guard = format!("{prefix}_GENERATED_H");
        let name = self.name.as_deref().unwrap_or("Local");

        let mut out = String::new();
        out += &format!("#ifndef {guard}\n#define {guard}\n\n\n");
        out += &format!("#define {prefix}_NAME \"{name}\"\n");
        out += &format!("#define {prefix}_DATE {}\n", self.date);
        out += &format!("#define {prefix}_NUM 0\n");
        out += &format!("#define {prefix}_HASH \"{hash}\"\n");
        out += &format!("#define {prefix}_HASH_SHORT \"{}\"\n", self.hash_short);
        out += &format!("#define {prefix}_HASH_SHORT_UINT32 0x{hash_u32:08X}\n");
        out += &format!("#define {prefix}_REV 0\n");
        out += &format!("#define {prefix}_FW_VER_MAJOR {}\n", self.version.major);
        out += &format!("#define {prefix}_FW_VER_MINOR {}\n", self.version.minor);
        out += &format!("#define {prefix}_FW_VER_PATCH {}\n", self.version.patch);
        out += &format!("\n\n#endif\t// {guard}\n");
        out
    }
}

/// `#define <prefix>_<KEY> <value>` lines keyed by `KEY`.
fn collect_defines(text: &str, prefix: &str) -> BTreeMap<String, String> {
    let mut defines = BTreeMap::new();
    for line in text.lines() {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        if parts.next() != Some("#define") {
            continue;
        }
        let Some(name) = parts.next() else {
            continue;
        };
        let Some(key) = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
        else {
            continue;
        };
        let value = parts.next().unwrap_or("").trim();
        if !value.is_empty() {
            defines.insert(key.to_string(), value.to_string());
        }
    }
    defines
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"')
}

fn check_date(date: String) -> Result<String> {
    if date.len() != DATE_LEN || !date.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MetadataError::Malformed {
            key: "DATE".into(),
            value: date,
            reason: "expected 10 digits (YYMMDDHHmm)",
        });
    }
    Ok(date)
}

fn check_hash_short(hash: String) -> Result<String> {
    if hash.len() != HASH_SHORT_LEN || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(MetadataError::Malformed {
            key: "HASH_SHORT".into(),
            value: hash,
            reason: "expected 7 hex characters",
        });
    }
    Ok(hash)
}

fn parse_ver(prefix: &str, key: &str, value: &str) -> Result<u8> {
    value.trim().parse::<u8>().map_err(|_| MetadataError::Malformed {
        key: format!("{prefix}_{key}"),
        value: value.to_string(),
        reason: "expected an integer in 0..=255",
    })
}
