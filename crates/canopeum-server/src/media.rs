use std::io;
use std::path::{Path, PathBuf};

use jiff::Timestamp;
use tokio::io::AsyncWriteExt;

/// Names tried before giving up when uploads keep colliding.
const MAX_ATTEMPTS: u32 = 16;

/// Uploaded files on disk, served back under `/media`.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    base_url: String,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        MediaStore {
            root: root.into(),
            base_url: format!("{}/media", public_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Public URL of a stored path.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Write an upload and return its path relative to the root. Existing
    /// files are never overwritten; a colliding name gets a counter.
    pub async fn save(&self, file_name: &str, bytes: &[u8], now: Timestamp) -> io::Result<String> {
        tokio::fs::create_dir_all(&self.root).await?;
        for attempt in 0..MAX_ATTEMPTS {
            let path = stored_name(file_name, now, attempt);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&path))
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };
            file.write_all(bytes).await?;
            file.flush().await?;
            tracing::debug!(%path, size = bytes.len(), "stored upload");
            return Ok(path);
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for upload {file_name:?}"),
        ))
    }

    /// Remove files whose rows are gone. Failures are logged, not returned.
    pub async fn remove_all(&self, paths: &[String]) {
        for path in paths {
            match tokio::fs::remove_file(self.root.join(path)).await {
                Ok(()) => tracing::debug!(%path, "removed upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(%path, error = %e, "failed to remove upload"),
            }
        }
    }
}

/// `%Y%m%d%H%M%S%f` followed by the sanitized base name. Retries add
/// `-<attempt>` after the timestamp.
fn stored_name(file_name: &str, now: Timestamp, attempt: u32) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let mut clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.trim_matches('.').is_empty() {
        clean = "upload".to_string();
    }
    let stamp = format!(
        "{}{:06}",
        now.strftime("%Y%m%d%H%M%S"),
        now.subsec_microsecond()
    );
    match attempt {
        0 => format!("{stamp}_{clean}"),
        n => format!("{stamp}-{n}_{clean}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    fn at() -> Timestamp {
        "2024-06-01T14:03:09.123456Z".parse().unwrap()
    }

    #[test]
    fn names_are_prefixed_and_sanitized() {
        assert_eq!(
            stored_name("photo de site.JPG", at(), 0),
            "20240601140309123456_photo_de_site.JPG"
        );
        assert_eq!(
            stored_name("../../etc/passwd", at(), 0),
            "20240601140309123456_passwd"
        );
        assert_eq!(stored_name("C:\\tmp\\a.png", at(), 0), "20240601140309123456_a.png");
    }

    #[test]
    fn empty_names_get_a_placeholder() {
        assert_eq!(stored_name("", at(), 0), "20240601140309123456_upload");
        assert_eq!(stored_name("..", at(), 0), "20240601140309123456_upload");
    }

    #[test]
    fn urls_hang_off_the_public_url() {
        let media = MediaStore::new("/srv/media", "https://api.canopeum.org/");
        assert_eq!(
            media.url("2024_a.png"),
            "https://api.canopeum.org/media/2024_a.png"
        );
    }

    #[tokio::test]
    async fn saves_and_removes() {
        let root = std::env::temp_dir().join(format!("canopeum-media-{}", std::process::id()));
        let media = MediaStore::new(&root, "http://localhost:8000");
        let path = media.save("leaf.txt", b"green", at()).await.unwrap();
        assert_eq!(tokio::fs::read(root.join(&path)).await.unwrap(), b"green");

        media.remove_all(&[path.clone(), "missing.txt".to_string()]).await;
        assert!(!root.join(&path).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn same_name_in_the_same_instant_keeps_both() {
        let root = std::env::temp_dir().join(format!("canopeum-media-twins-{}", std::process::id()));
        let media = MediaStore::new(&root, "http://localhost:8000");
        let first = media.save("leaf.txt", b"green", at()).await.unwrap();
        let second = media.save("leaf.txt", b"red", at()).await.unwrap();

        assert_eq!(first, "20240601140309123456_leaf.txt");
        assert_eq!(second, "20240601140309123456-1_leaf.txt");
        assert_eq!(tokio::fs::read(root.join(&first)).await.unwrap(), b"green");
        assert_eq!(tokio::fs::read(root.join(&second)).await.unwrap(), b"red");
        let _ = std::fs::remove_dir_all(&root);
    }
}
