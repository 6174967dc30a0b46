use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// Creates `dir` and any missing parents. On unix the directories created
/// here get `mode`; an existing directory keeps its permissions.
pub fn ensure_dir_with_mode(dir: &Path, mode: u32) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder
        .create(dir)
        .with_context(|| format!("could not create directory {}", dir.display()))
}

/// Sibling path the new content is staged in before it replaces `target`.
fn staging_path(target: &Path) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| anyhow!("{} does not name a file", target.display()))?;
    let mut staged = name.to_os_string();
    staged.push(format!(".{}.partial", std::process::id()));
    Ok(target.with_file_name(staged))
}

/// Replaces `target` with `content` in one rename, so a reader sees either
/// the old file or the new one. A missing parent directory is created with
/// `dir_mode`.
pub fn replace_file(target: &Path, content: &str, dir_mode: u32) -> Result<()> {
    if target.is_dir() {
        return Err(anyhow!("{} is a directory", target.display()));
    }
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_dir_with_mode(parent, dir_mode)?;
    }

    let staged = staging_path(target)?;
    let outcome = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&staged)
        .and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&staged, target));
    if let Err(error) = outcome {
        let _ = std::fs::remove_file(&staged);
        return Err(error).with_context(|| format!("could not replace {}", target.display()));
    }
    Ok(())
}
