use azure_core::error::{ErrorKind, ResultExt};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Name of the `index`-th sample file, counting from one.
pub fn sample_file_name(index: usize) -> String {
    format!("blob_{index:03}.txt")
}

/// Wipes `dir` and fills it with `count` sample files. Each file holds its own
/// name as content.
pub fn generate_sample_files(dir: &Path, count: usize) -> azure_core::Result<Vec<PathBuf>> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(ErrorKind::Io, || format!("failed to remove {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(ErrorKind::Io, || format!("failed to create {}", dir.display()))?;

    (1..=count)
        .map(|index| {
            let name = sample_file_name(index);
            let path = dir.join(&name);
            fs::write(&path, name.as_bytes())
                .with_context(ErrorKind::Io, || format!("failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}

/// Regular files directly under `dir`, sorted by name.
pub fn list_sample_files(dir: &Path) -> azure_core::Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(ErrorKind::Io, || format!("failed to read {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(ErrorKind::Io, || format!("failed to read {}", dir.display()))?;
        let file_type = entry.file_type().with_context(ErrorKind::Io, || {
            format!("failed to stat {}", entry.path().display())
        })?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
