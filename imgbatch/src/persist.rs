//! Local storage of downloaded payloads.
//!
//! Payloads are first written to a hidden temporary file next to their destination, then renamed over it, so that a final path
//! never holds a partial write. Two tasks sharing a destination file name simply overwrite each other: last write wins.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::{fs, io};
use url::Url;

const TEMP_EXT: &str = "tmp";

/// Return the file name a payload downloaded from `url` is stored under.
///
/// This is the last path segment, the query string and fragment being already out of the path. Returns `None` when the URL
/// cannot be a base or ends with a `/`.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()?.next_back().filter(|segment| !segment.is_empty())
}

/// Write `bytes` to `destination`, creating missing parent directories.
pub async fn save(bytes: &[u8], destination: &Path) -> io::Result<()> {
    use io::AsyncWriteExt;

    if let Some(parent) = destination.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(destination)?;

    let result = async {
        let file = fs::File::options().write(true).create_new(true).open(&tmp).await?;

        let mut writer = io::BufWriter::new(file);
        writer.write_all(bytes).await?;
        writer.shutdown().await?;
        writer.into_inner().sync_all().await?;

        fs::rename(&tmp, destination).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }

    result
}

/// Return a temporary path, unique within this process, in the same directory as `destination`.
fn temp_path(destination: &Path) -> io::Result<PathBuf> {
    static TEMP_ID: AtomicUsize = AtomicUsize::new(0);

    let name = destination.file_name().ok_or(io::ErrorKind::InvalidInput)?;
    let id = TEMP_ID.fetch_add(1, Ordering::Relaxed);

    let mut tmp = OsString::from(".");
    tmp.push(name);
    tmp.push(format!(".{}.{id}.{TEMP_EXT}", std::process::id()));

    Ok(destination.with_file_name(tmp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name() {
        let name = |url: &str| file_name(&Url::parse(url).unwrap()).map(str::to_owned);

        assert_eq!(name("https://www.kards.com/img/cards/en/a.png").as_deref(), Some("a.png"));
        assert_eq!(name("https://www.kards.com/img/a.png?v=1&w=2").as_deref(), Some("a.png"));
        assert_eq!(name("https://www.kards.com/img/a.png#top").as_deref(), Some("a.png"));
        assert_eq!(name("https://www.kards.com/img/"), None);
        assert_eq!(name("https://www.kards.com"), None);
        assert_eq!(name("mailto:someone@example.com"), None);
    }

    #[test]
    fn test_temp_path() {
        let dest = Path::new("out/a.png");

        let first = temp_path(dest).unwrap();
        let second = temp_path(dest).unwrap();

        assert_ne!(first, second);
        assert_eq!(first.parent(), dest.parent());
        assert!(first.file_name().unwrap().to_str().unwrap().starts_with(".a.png."));
        assert_eq!(first.extension().unwrap(), TEMP_EXT);
        assert!(temp_path(Path::new("/")).is_err());
    }

    #[tokio::test]
    async fn test_save_creates_dirs() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested/images");

        save(b"first", &dir.join("a.png")).await.unwrap();
        // parent now exists, creating it again must not fail
        save(b"second", &dir.join("b.png")).await.unwrap();

        assert_eq!(std::fs::read(dir.join("a.png")).unwrap(), b"first");
        assert_eq!(std::fs::read(dir.join("b.png")).unwrap(), b"second");

        // no temporary file left behind
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_save_last_write_wins() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("a.png");

        save(b"from first url", &dest).await.unwrap();
        save(b"from second url", &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"from second url");
    }

    #[tokio::test]
    async fn test_save_failure() {
        let root = tempfile::tempdir().unwrap();

        // a file standing where the parent directory should be
        let blocker = root.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        assert!(save(b"bytes", &blocker.join("a.png")).await.is_err());
    }
}
