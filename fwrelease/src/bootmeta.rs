//! Boot metadata header: the signed image's header and trailer as C arrays.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BootMetaVariant {
    /// Real bytes under the debug configuration only.
    #[default]
    DebugOnly,
    /// Real bytes for debug, zero placeholders for the update configuration,
    /// so the update image does not embed a signature of itself.
    DebugAndUpdate,
}

#[derive(Debug, Clone)]
pub struct BootMetadata<'a> {
    pub header: &'a [u8],
    pub trailer: &'a [u8],
    pub debug_symbol: &'a str,
    pub update_symbol: &'a str,
    pub variant: BootMetaVariant,
}

const GUARD: &str = "ALX_BOOT_METADATA_GENERATED_H";

/// `0xAB, 0xCD, ...`
pub fn byte_list(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn array(name: &str, section: &str, bytes: &[u8]) -> String {
    format!(
        "static const unsigned char {name}[0x{:04X}] __attribute__((section(\"{section}\"), used)) = {{{}}};\n",
        bytes.len(),
        byte_list(bytes)
    )
}

impl BootMetadata<'_> {
    pub fn render(&self) -> String {
        let mut out = format!("#ifndef {GUARD}\n#define {GUARD}\n\n\n");

        out += &format!("#if defined({})\n", self.debug_symbol);
        out += &array("app_header", ".app_header", self.header);
        out += &array("app_trailer", ".app_trailer", self.trailer);

        if self.variant == BootMetaVariant::DebugAndUpdate {
            out += &format!("#elif defined({})\n", self.update_symbol);
            out += &array("app_header", ".app_header", &vec![0; self.header.len()]);
            out += &array("app_trailer", ".app_trailer", &vec![0; self.trailer.len()]);
        }
        out += "#endif\n";

        out += &format!("\n\n#endif\t// {GUARD}\n");
        out
    }
}
