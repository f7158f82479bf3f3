pub mod deploy;
pub mod gate;
pub mod init;

use std::io::Write;
use std::path::Path;

use anyhow::Context;

/// Append `text` to a file CI reads after the step, creating it if needed.
pub(crate) fn append_to(path: &Path, text: &str) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(text.as_bytes())
        .with_context(|| format!("writing {}", path.display()))
}
