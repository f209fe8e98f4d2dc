//! The post-build signing pipeline: slice, sign, manifest, boot metadata, and the
//! optional combined hex and no-boot images.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    bootmeta::BootMetadata,
    ctx::AppContext,
    hexfile::{self, Segment},
    image::{self, ImageLayout, sibling},
    manifest::ReleaseManifest,
    metadata::BuildMetadata,
    sign::{SignOutputs, SignParams},
    ui,
};

#[derive(Debug, Clone)]
pub struct SignArgs {
    /// Build target; the image read is the `.bin` next to it
    pub target: PathBuf,
    pub slot_size: u32,
    pub boot_len: u32,
    pub combined_hex: bool,
    pub no_boot: bool,
    pub boot_meta: bool,
}

#[derive(Debug, Clone)]
pub struct SignReport {
    pub source: PathBuf,
    pub raw: PathBuf,
    pub signed: SignOutputs,
    pub manifest: PathBuf,
    pub boot_meta: Option<PathBuf>,
    pub combined_hex: Option<PathBuf>,
    pub no_boot: Option<PathBuf>,
}

fn write(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data).map_err(|e| anyhow!("can not write {}: {e}", path.display()))?;
    ui::generated(path, data.len());
    Ok(())
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).map_err(|e| anyhow!("can not read {}: {e}", path.display()))
}

pub fn run_sign(ctx: &mut AppContext, args: &SignArgs) -> anyhow::Result<SignReport> {
    let source = args.target.with_extension("bin");
    ui::banner(&format!("sign {}", source.display()));

    let meta: BuildMetadata = ui::phase("Read build metadata", || {
        let meta = ctx.build_metadata()?.clone();
        println!(
            "  date {} version {} hash {}",
            meta.date(),
            meta.version(),
            meta.hash_short()
        );
        Ok(meta)
    })?;

    let layout = ctx.layout(args.boot_len as usize);

    let (raw, app) = ui::phase("Generate _Raw.bin", || {
        let (raw, app) = image::write_raw(&source, &layout)?;
        ui::generated(&raw, app.len());
        Ok((raw, app))
    })?;

    let signed = ui::phase("Generate _Signed.bin", || {
        let signer = ctx.signer()?;
        let params = SignParams {
            header_len: layout.header_len,
            slot_size: args.slot_size,
            version: meta.signer_version(),
        };
        let outputs = signer.sign(&source, &raw, &params)?;
        let bytes = read(&outputs.signed)?;
        check_signed_len(&layout, bytes.len(), app.len())?;
        ui::generated(&outputs.signed, bytes.len());
        Ok((outputs, bytes))
    })?;
    let (outputs, signed_bytes) = signed;

    let manifest = ui::phase("Generate _Manifest.json", || {
        let path = sibling(&source, "_Manifest", "json");
        let manifest =
            ReleaseManifest::new(meta.date_number(), &signed_bytes, &ctx.config.manifest.url);
        manifest.write(&path)?;
        println!("  size {} hash {}", manifest.size, manifest.hash);
        Ok(path)
    })?;

    let boot_cfg = &ctx.config.boot_metadata;
    let boot_meta = if !args.boot_meta {
        None
    } else if boot_cfg.output.trim().is_empty() {
        ui::warn("boot_metadata.output is empty, boot metadata header not generated");
        None
    } else {
        Some(ui::phase("Generate boot metadata header", || {
            let path = ctx.resolve(&boot_cfg.output);
            let text = BootMetadata {
                header: layout.signed_header(&signed_bytes)?,
                trailer: layout.signed_trailer(&signed_bytes, app.len())?,
                debug_symbol: &boot_cfg.debug_symbol,
                update_symbol: &boot_cfg.update_symbol,
                variant: boot_cfg.variant,
            }
            .render();
            write(&path, text.as_bytes())?;
            Ok(path)
        })?)
    };

    let combined_hex = if args.combined_hex {
        Some(ui::phase("Generate _Combined.hex", || {
            let image = read(&source)?;
            let path = sibling(&source, "_Combined", "hex");
            let text = combined_hex(&layout, ctx.config.image.flash_base, &image, &signed_bytes)?;
            write(&path, text.as_bytes())?;
            Ok(path)
        })?)
    } else {
        None
    };

    let no_boot = if args.no_boot {
        Some(ui::phase("Generate _NoBoot.bin", || {
            let image = read(&source)?;
            let path = sibling(&source, "_NoBoot", "bin");
            write(&path, layout.no_boot(&image)?)?;
            Ok(path)
        })?)
    } else {
        None
    };

    Ok(SignReport {
        source,
        raw,
        signed: outputs,
        manifest,
        boot_meta,
        combined_hex,
        no_boot,
    })
}

fn check_signed_len(layout: &ImageLayout, signed: usize, app: usize) -> anyhow::Result<()> {
    let needed = layout.header_len + app + layout.trailer_len;
    if signed < needed {
        bail!(
            "signed image is {signed} bytes, expected at least {needed} \
             (header {:#x} + payload {app} + trailer {:#x})",
            layout.header_len,
            layout.trailer_len
        );
    }
    Ok(())
}

/// Bootloader region of `image` at `flash_base`, `signed` right after it.
pub fn combined_hex(
    layout: &ImageLayout,
    flash_base: u32,
    image: &[u8],
    signed: &[u8],
) -> anyhow::Result<String> {
    let boot = layout.bootloader(image)?;
    let app_addr = u32::try_from(layout.bootloader_len)
        .ok()
        .and_then(|len| flash_base.checked_add(len))
        .ok_or_else(|| anyhow!("bootloader length {:#x} overflows flash", layout.bootloader_len))?;

    hexfile::render(&[
        Segment {
            addr: flash_base,
            data: boot,
        },
        Segment {
            addr: app_addr,
            data: signed,
        },
    ])
}
