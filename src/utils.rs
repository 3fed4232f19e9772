use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::task;

/// Creates `path` as a directory if it does not exist yet.
pub(crate) async fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::other(format!(
                    "path exists but is not a directory: {}",
                    path.display()
                )));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => tokio::fs::create_dir_all(path).await,
        Err(e) => Err(e),
    }
}

/// Writes `bytes` to `path` via a temp file in the same directory plus an
/// atomic rename, so a failed write leaves no partial artifact behind.
pub(crate) async fn write_atomic(path: &Path, bytes: Vec<u8>) -> io::Result<()> {
    let path = path.to_path_buf();
    task::spawn_blocking(move || {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok::<(), io::Error>(())
    })
    .await
    .map_err(io::Error::other)??;
    Ok(())
}
