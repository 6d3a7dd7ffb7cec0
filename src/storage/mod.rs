use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use uuid::Uuid;

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum PhotoStorageError {
    #[error("object not found")]
    NotFound,
    #[error("invalid storage reference")]
    InvalidReference,
    #[error("empty file")]
    Empty,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhotoStorageError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Content-addressed-by-reference photo bytes on disk. References are
/// generated here and opaque to everything else; user-supplied names
/// never touch the filesystem.
pub struct PhotoStorage {
    base_path: PathBuf,
}

impl PhotoStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("photos"),
        }
    }

    fn object_path(&self, reference: &str) -> PathBuf {
        // Two-level fanout on the reference prefix keeps directories small.
        let prefix = &reference[0..2];
        self.base_path.join(prefix).join(reference)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    /// Writes the bytes and returns the new opaque reference.
    /// Writes go to a temp file first so a crash never leaves a partial
    /// object at its final path.
    pub async fn save(&self, data: &[u8], extension: &str) -> Result<String, PhotoStorageError> {
        if data.is_empty() {
            return Err(PhotoStorageError::Empty);
        }
        if !ALLOWED_EXTENSIONS.contains(&extension) {
            return Err(PhotoStorageError::InvalidReference);
        }

        let reference = format!("{}.{extension}", Uuid::new_v4());

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;

        let final_path = self.object_path(&reference);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, &final_path).await?;

        Ok(reference)
    }

    /// Opens the referenced object as a byte stream.
    pub async fn open(
        &self,
        reference: &str,
    ) -> Result<(BufReader<File>, i64), PhotoStorageError> {
        validate_reference(reference)?;
        let path = self.object_path(reference);
        let file = File::open(&path).await.map_err(PhotoStorageError::from_io)?;

        let metadata = file.metadata().await?;
        let size = metadata.len() as i64;

        Ok((BufReader::new(file), size))
    }

    pub async fn delete(&self, reference: &str) -> Result<bool, PhotoStorageError> {
        validate_reference(reference)?;
        let path = self.object_path(reference);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PhotoStorageError::Io(e)),
        }
    }
}

fn validate_reference(reference: &str) -> Result<(), PhotoStorageError> {
    let Some((stem, extension)) = reference.split_once('.') else {
        return Err(PhotoStorageError::InvalidReference);
    };

    if Uuid::parse_str(stem).is_err() || !ALLOWED_EXTENSIONS.contains(&extension) {
        return Err(PhotoStorageError::InvalidReference);
    }

    Ok(())
}

#[must_use]
pub fn is_valid_reference(reference: &str) -> bool {
    validate_reference(reference).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn test_data() -> Vec<u8> {
        b"\xff\xd8\xff\xe0fake-jpeg-bytes".to_vec()
    }

    #[tokio::test]
    async fn test_save_and_open() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        let data = test_data();
        let reference = storage.save(&data, "jpg").await.unwrap();
        assert!(is_valid_reference(&reference));

        let (mut reader, size) = storage.open(&reference).await.unwrap();
        assert_eq!(size, data.len() as i64);

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, data);
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        assert!(matches!(
            storage.save(&[], "jpg").await,
            Err(PhotoStorageError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_disallowed_extension_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        assert!(matches!(
            storage.save(&test_data(), "svg").await,
            Err(PhotoStorageError::InvalidReference)
        ));
    }

    #[tokio::test]
    async fn test_open_missing_reference() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        let reference = format!("{}.png", Uuid::new_v4());
        assert!(matches!(
            storage.open(&reference).await,
            Err(PhotoStorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_invalid_reference_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        for bad in ["../../etc/passwd", "not-a-uuid.jpg", "plain", ""] {
            assert!(matches!(
                storage.open(bad).await,
                Err(PhotoStorageError::InvalidReference)
            ));
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = PhotoStorage::new(temp_dir.path());

        let reference = storage.save(&test_data(), "png").await.unwrap();
        assert!(storage.delete(&reference).await.unwrap());
        assert!(!storage.delete(&reference).await.unwrap());
        assert!(matches!(
            storage.open(&reference).await,
            Err(PhotoStorageError::NotFound)
        ));
    }

    #[test]
    fn test_is_valid_reference() {
        assert!(is_valid_reference(&format!("{}.jpg", Uuid::new_v4())));
        assert!(is_valid_reference(&format!("{}.jpeg", Uuid::new_v4())));
        assert!(!is_valid_reference(&format!("{}.gif", Uuid::new_v4())));
        assert!(!is_valid_reference("short"));
    }
}
