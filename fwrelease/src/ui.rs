use std::path::Path;

use byte_unit::Byte;
use colored::Colorize;

/// Runs one pipeline phase between `DO:` and `DONE:`/`FAIL:` lines.
pub fn phase<T>(name: &str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    println!("{}", format!("DO: {name}").bold());
    match f() {
        Ok(v) => {
            println!("{}", format!("DONE: {name}").green());
            Ok(v)
        }
        Err(e) => {
            println!("{}", format!("FAIL: {name}: {e:#}").red());
            Err(e.context(format!("{name} failed")))
        }
    }
}

pub fn banner(title: &str) {
    let line = "-".repeat(title.len() + 4);
    println!("{}", line.cyan());
    println!("{}", format!("  {title}").cyan().bold());
    println!("{}", line.cyan());
}

pub fn warn(msg: impl AsRef<str>) {
    println!("{}", format!("warn: {}", msg.as_ref()).yellow());
}

pub fn size(len: usize) -> String {
    format!("{:#}", Byte::from_u64(len as u64))
}

pub fn generated(path: &Path, len: usize) {
    println!("  {} ({})", path.display(), size(len));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_adds_context() {
        let err = phase::<()>("Generate manifest", || bail!("disk full")).unwrap_err();
        assert_eq!(err.to_string(), "Generate manifest failed");
        assert_eq!(format!("{err:#}"), "Generate manifest failed: disk full");
    }
}
