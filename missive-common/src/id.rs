use std::{fmt, sync::Arc};

/// Identifier shared by every message submitted in one call.
///
/// Generated batch ids are ULIDs, so they are unique and sort by creation
/// time. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(Arc<str>);

impl BatchId {
    /// Generate a fresh batch id
    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(ulid::Ulid::new().to_string()))
    }

    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id is usable as a single path component
    #[must_use]
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && &*self.0 != "."
            && !self.0.contains("..")
            && !self.0.contains(['/', '\\'])
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BatchId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl serde::Serialize for BatchId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for BatchId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Identifier of a single message
///
/// A ULID. Every message gets one when it is built, and content stores
/// generate a fresh one as the key of each saved copy, which file stores also
/// use as the file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    id: ulid::Ulid,
}

impl MessageId {
    /// Parse a message ID from a filename like `01ARZ3NDEKTSV4RRFFQ69G5FAV.bin`
    ///
    /// Rejects path separators, traversal patterns, other extensions and
    /// anything that is not a ULID.
    pub fn from_filename(filename: &str) -> Option<Self> {
        if filename.contains('/') || filename.contains('\\') {
            return None;
        }

        if filename.contains("..") {
            return None;
        }

        let stem = filename.strip_suffix(".bin")?;
        Self::parse(stem)
    }

    /// Parse the textual form of an id
    pub fn parse(value: &str) -> Option<Self> {
        ulid::Ulid::from_string(value).ok().map(Self::new)
    }

    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique message ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Milliseconds since the Unix epoch at which this id was generated
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }

    /// The file name this message is stored under
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}.bin", self.id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl serde::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}
