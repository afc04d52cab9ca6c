use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use missive_common::{BatchId, MailMessage, MessageId, Session, internal};
use serde::Deserialize;
use tokio::fs;

use crate::{SerializationError, StoreError, ValidationError, store::ContentStore};

const TEMP_SUFFIX: &str = ".tmp";

/// File-based content store
///
/// Every batch gets its own directory below the store root, and every message
/// is one bincode file named after the key the store generated for it:
///
/// ```text
/// <root>/<batch id>/<message id>.bin
/// ```
///
/// # Security
/// - The root must be absolute, free of `..` and outside system directories
/// - Batch ids are only used as directory names if they are a single safe
///   path component
/// - Only files whose names parse as `<ulid>.bin` are ever listed
///
/// # Atomicity
/// Messages are written to a `.tmp` file and linked into place, so a crash
/// never leaves a partially written message visible and an existing message
/// is never replaced. Leftover temporary files are removed by
/// [`FileContentStore::init`].
#[derive(Debug, Clone)]
pub struct FileContentStore {
    path: PathBuf,
}

impl Default for FileContentStore {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/spool/missive"),
        }
    }
}

impl<'de> Deserialize<'de> for FileContentStore {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct FileContentStoreHelper {
            path: PathBuf,
        }

        let helper = FileContentStoreHelper::deserialize(deserializer)?;
        Self::validate_path(&helper.path).map_err(serde::de::Error::custom)?;

        Ok(Self { path: helper.path })
    }
}

impl FileContentStore {
    /// Validate a store root
    ///
    /// # Errors
    /// Returns an error if the path is relative, contains `..`, or points into
    /// a system directory
    fn validate_path(path: &Path) -> Result<(), ValidationError> {
        if path
            .components()
            .any(|component| component == std::path::Component::ParentDir)
        {
            return Err(ValidationError::InvalidPath(format!(
                "store path cannot contain '..' components: {}",
                path.display()
            )));
        }

        if !path.is_absolute() {
            return Err(ValidationError::InvalidPath(format!(
                "store path must be absolute: {}",
                path.display()
            )));
        }

        let sensitive_prefixes = [
            "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/boot", "/sys", "/proc", "/dev",
        ];

        if let Some(prefix) = sensitive_prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix))
        {
            return Err(ValidationError::InvalidPath(format!(
                "store path cannot be in system directory {prefix}: {}",
                path.display()
            )));
        }

        Ok(())
    }

    #[must_use]
    pub fn builder() -> FileContentStoreBuilder {
        FileContentStoreBuilder::default()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepare the store root for use
    ///
    /// Creates the root if it does not exist and removes temporary files and
    /// empty batch directories left behind by a previous run.
    ///
    /// # Errors
    /// - If the root cannot be created or read
    /// - If the root exists but is not a directory
    pub fn init(&self) -> crate::Result<()> {
        internal!("Initialising content store ...");

        if !self.path.try_exists()? {
            internal!("{} does not exist, creating...", self.path.display());
            std::fs::create_dir_all(&self.path)?;
        } else if !self.path.is_dir() {
            return Err(ValidationError::NotDirectory(self.path.display().to_string()).into());
        }

        self.cleanup()
    }

    fn cleanup(&self) -> crate::Result<()> {
        let mut cleaned = 0;

        for batch_dir in std::fs::read_dir(&self.path)? {
            let batch_dir = batch_dir?.path();
            if !batch_dir.is_dir() {
                continue;
            }

            let mut remaining = 0;
            for entry in std::fs::read_dir(&batch_dir)? {
                let entry = entry?;
                if entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                    std::fs::remove_file(entry.path())?;
                    cleaned += 1;
                } else {
                    remaining += 1;
                }
            }

            if remaining == 0 {
                std::fs::remove_dir(&batch_dir)?;
            }
        }

        if cleaned > 0 {
            internal!(
                level = INFO,
                "Cleaned up {cleaned} orphaned temporary files from content store"
            );
        }

        Ok(())
    }

    fn batch_dir(&self, batch_id: &BatchId) -> crate::Result<PathBuf> {
        if !batch_id.is_path_safe() {
            return Err(ValidationError::InvalidBatchId(batch_id.to_string()).into());
        }

        Ok(self.path.join(batch_id.as_str()))
    }

    fn message_path(&self, batch_id: &BatchId, message_id: &MessageId) -> crate::Result<PathBuf> {
        Ok(self.batch_dir(batch_id)?.join(message_id.filename()))
    }
}

fn not_found_or(batch_id: &BatchId, message_id: MessageId) -> impl FnOnce(std::io::Error) -> StoreError {
    move |err| {
        if err.kind() == ErrorKind::NotFound {
            StoreError::NotFound {
                batch_id: batch_id.clone(),
                message_id,
            }
        } else {
            StoreError::Io(err)
        }
    }
}

impl FileContentStore {
    /// Write a message under a key that must not be taken yet.
    ///
    /// The bytes go to a temporary file that is then hard-linked into place.
    /// Linking fails if the target exists, so two writers racing for the same
    /// key cannot overwrite each other.
    async fn write_new(
        &self,
        batch_id: &BatchId,
        message_id: MessageId,
        message: &MailMessage,
    ) -> crate::Result<PathBuf> {
        let batch_dir = self.batch_dir(batch_id)?;
        let path = batch_dir.join(message_id.filename());

        fs::create_dir_all(&batch_dir).await?;

        let bytes =
            bincode::serde::encode_to_vec((message_id, message), bincode::config::standard())
                .map_err(SerializationError::from)?;

        // Unique per writer, so concurrent writers never share a temporary file
        let temp_path = batch_dir.join(format!(
            "{}.{}{TEMP_SUFFIX}",
            message_id.filename(),
            MessageId::generate()
        ));
        fs::write(&temp_path, &bytes).await?;

        let linked = fs::hard_link(&temp_path, &path).await;
        fs::remove_file(&temp_path).await?;

        match linked {
            Ok(()) => Ok(path),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists {
                batch_id: batch_id.clone(),
                message_id,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn save(&self, batch_id: &BatchId, message: &MailMessage) -> crate::Result<MessageId> {
        let message_id = MessageId::generate();
        let path = self.write_new(batch_id, message_id, message).await?;

        internal!(
            level = DEBUG,
            "Stored message {message_id} of batch {batch_id} at {}",
            path.display()
        );

        Ok(message_id)
    }

    async fn load(
        &self,
        _session: &Session,
        batch_id: &BatchId,
        message_id: &MessageId,
    ) -> crate::Result<MailMessage> {
        let path = self.message_path(batch_id, message_id)?;
        let bytes = fs::read(&path)
            .await
            .map_err(not_found_or(batch_id, *message_id))?;

        let ((stored_id, message), _): ((MessageId, MailMessage), usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(SerializationError::from)?;

        if stored_id != *message_id {
            return Err(SerializationError::Corrupted(format!(
                "{} contains message {stored_id}",
                path.display()
            ))
            .into());
        }

        Ok(message)
    }

    async fn delete(&self, batch_id: &BatchId, message_id: &MessageId) -> crate::Result<()> {
        let path = self.message_path(batch_id, message_id)?;
        fs::remove_file(&path)
            .await
            .map_err(not_found_or(batch_id, *message_id))?;

        internal!(level = DEBUG, "Deleted message {message_id} of batch {batch_id}");

        Ok(())
    }

    async fn list(&self, batch_id: &BatchId) -> crate::Result<Vec<MessageId>> {
        let batch_dir = self.batch_dir(batch_id)?;

        let mut entries = match fs::read_dir(&batch_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut message_ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = MessageId::from_filename(&entry.file_name().to_string_lossy()) {
                message_ids.push(id);
            }
        }

        message_ids.sort();
        Ok(message_ids)
    }
}

/// Builder for [`FileContentStore`]
#[derive(Debug, Default)]
pub struct FileContentStoreBuilder {
    path: PathBuf,
}

impl FileContentStoreBuilder {
    /// Set the store root
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Build the final `FileContentStore`
    ///
    /// # Errors
    /// Returns an error if the path is invalid or potentially dangerous
    pub fn build(self) -> crate::Result<FileContentStore> {
        FileContentStore::validate_path(&self.path)?;
        Ok(FileContentStore { path: self.path })
    }
}
