//! Migration identity model.
//!
//! A [`Migration`] is one unit of schema change. Two kinds exist:
//!
//! - **numbered** migrations, ordered by an ascending integer and applied
//!   exactly once. Their fingerprint is a fixed sentinel, so editing an
//!   applied numbered script never makes it pending again.
//! - **object** migrations (procedures, functions, triggers), identified by
//!   an MD5 fingerprint of their content and re-applied whenever it changes.
//!
//! Equality (and hashing) covers the order key, the name and the fingerprint
//! only. That is the rule that decides "already applied".

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Order key stored in the applied-set table for object migrations.
pub const OBJECT_MIGRATION_NUM: u32 = 9999;

/// Fingerprint stored for numbered migrations.
pub const NUMBERED_FINGERPRINT: &str = "00000000000000000000000000000000";

/// Naming convention for numbered migration sources.
pub const NUMBERED_NAME_PATTERN: &str = "<digits>_<name>.sql";

/// Ordering token of a migration.
///
/// Numbered keys sort by value and every numbered key sorts before
/// [`OrderKey::Object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderKey {
    /// Position of a numbered migration.
    Numbered(u32),
    /// Constant "last" marker shared by all object migrations.
    Object,
}

impl OrderKey {
    /// Parse the value persisted in the applied-set table.
    pub fn from_stored(value: &str) -> MigrateResult<Self> {
        let num: u32 = value.trim().parse().map_err(|_| {
            MigrationError::database(format!("invalid stored migration number '{}'", value))
        })?;

        if num == OBJECT_MIGRATION_NUM {
            Ok(Self::Object)
        } else {
            Ok(Self::Numbered(num))
        }
    }

    /// Value persisted in the applied-set table.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Numbered(num) => num.to_string(),
            Self::Object => OBJECT_MIGRATION_NUM.to_string(),
        }
    }

    /// Check if this is the object marker.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered(num) => write!(f, "{}", num),
            Self::Object => f.write_str("object"),
        }
    }
}

/// The `(order key, name)` pair the applied-set table is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MigrationKey {
    /// Order key.
    pub order_key: OrderKey,
    /// Migration name.
    pub name: String,
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_key {
            OrderKey::Numbered(num) => write!(f, "#{} {}", num, self.name),
            OrderKey::Object => f.write_str(&self.name),
        }
    }
}

/// A declared or applied migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    order_key: OrderKey,
    name: String,
    content: Option<String>,
    fingerprint: String,
    applied_at: Option<DateTime<Utc>>,
}

impl Migration {
    /// Create a numbered migration.
    ///
    /// Fails with [`MigrationError::MalformedIdentity`] when the name is empty
    /// or the number collides with the reserved object marker.
    pub fn numbered(
        num: u32,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> MigrateResult<Self> {
        let name = name.into();

        if name.trim().is_empty() {
            return Err(MigrationError::malformed(
                format!("{}_", num),
                NUMBERED_NAME_PATTERN,
                "name is empty",
            ));
        }

        if num == OBJECT_MIGRATION_NUM {
            return Err(MigrationError::malformed(
                format!("{}_{}", num, name),
                NUMBERED_NAME_PATTERN,
                format!("{} is reserved for object migrations", OBJECT_MIGRATION_NUM),
            ));
        }

        Ok(Self {
            order_key: OrderKey::Numbered(num),
            name,
            content: Some(content.into()),
            fingerprint: NUMBERED_FINGERPRINT.to_string(),
            applied_at: None,
        })
    }

    /// Create a numbered migration from its source file name
    /// (`0042_add_orders.sql`).
    pub fn from_source_name(source_name: &str, content: impl Into<String>) -> MigrateResult<Self> {
        let (num, name) = parse_source_name(source_name)?;
        Self::numbered(num, name, content)
    }

    /// Create an object migration; its fingerprint is the MD5 of `content`.
    pub fn object(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let fingerprint = compute_fingerprint(&content);

        Self {
            order_key: OrderKey::Object,
            name: name.into(),
            content: Some(content),
            fingerprint,
            applied_at: None,
        }
    }

    /// Reconstruct a migration from the applied-set table. It has no content.
    pub fn applied_record(
        order_key: OrderKey,
        name: impl Into<String>,
        fingerprint: impl Into<String>,
        applied_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_key,
            name: name.into(),
            content: None,
            fingerprint: fingerprint.into(),
            applied_at: Some(applied_at),
        }
    }

    /// Copy of this migration stamped with an application time.
    pub fn mark_applied(&self, applied_at: DateTime<Utc>) -> Self {
        Self {
            applied_at: Some(applied_at),
            ..self.clone()
        }
    }

    /// Ordering key.
    pub fn order_key(&self) -> OrderKey {
        self.order_key
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Script text; `None` for records loaded from storage.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Content fingerprint (sentinel for numbered migrations).
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// When the migration was applied, if known.
    pub fn applied_at(&self) -> Option<DateTime<Utc>> {
        self.applied_at
    }

    /// Check if this is an object migration.
    pub fn is_object(&self) -> bool {
        self.order_key.is_object()
    }

    /// The `(order key, name)` storage key.
    pub fn key(&self) -> MigrationKey {
        MigrationKey {
            order_key: self.order_key,
            name: self.name.clone(),
        }
    }
}

impl PartialEq for Migration {
    fn eq(&self, other: &Self) -> bool {
        self.order_key == other.order_key
            && self.name == other.name
            && self.fingerprint == other.fingerprint
    }
}

impl Eq for Migration {}

impl Hash for Migration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.order_key.hash(state);
        self.name.hash(state);
        self.fingerprint.hash(state);
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_key {
            OrderKey::Numbered(num) => write!(f, "#{} {}", num, self.name),
            OrderKey::Object => write!(f, "{} ({})", self.name, self.fingerprint),
        }
    }
}

/// Fail with [`MigrationError::DuplicateIdentity`] when two declared
/// migrations share an `(order key, name)` key.
///
/// Each migration is paired with a description of where it was declared.
pub fn check_unique_identities<'a, I>(declared: I) -> MigrateResult<()>
where
    I: IntoIterator<Item = (String, &'a Migration)>,
{
    let mut seen: HashMap<MigrationKey, String> = HashMap::new();

    for (origin, migration) in declared {
        match seen.entry(migration.key()) {
            Entry::Occupied(first) => {
                return Err(MigrationError::DuplicateIdentity {
                    identity: first.key().to_string(),
                    first: first.get().clone(),
                    second: origin,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(origin);
            }
        }
    }

    Ok(())
}

/// MD5 of the content as 32 lowercase hex digits.
pub fn compute_fingerprint(content: &str) -> String {
    hex::encode(Md5::digest(content.as_bytes()))
}

/// Parse a numbered migration source name into `(number, name)`.
///
/// The extension is dropped; the leading digits form the number and must be
/// followed by `_` and a non-empty name.
pub fn parse_source_name(source_name: &str) -> MigrateResult<(u32, String)> {
    let stem = match source_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => source_name,
    };

    let digits_end = stem
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(stem.len());

    if digits_end == 0 {
        return Err(MigrationError::malformed(
            source_name,
            NUMBERED_NAME_PATTERN,
            "does not start with a number",
        ));
    }

    let (digits, rest) = stem.split_at(digits_end);

    let name = rest.strip_prefix('_').ok_or_else(|| {
        MigrationError::malformed(
            source_name,
            NUMBERED_NAME_PATTERN,
            "number must be followed by '_'",
        )
    })?;

    if name.is_empty() {
        return Err(MigrationError::malformed(
            source_name,
            NUMBERED_NAME_PATTERN,
            "name is empty",
        ));
    }

    let num = digits.parse::<u32>().map_err(|e| {
        MigrationError::malformed(source_name, NUMBERED_NAME_PATTERN, e.to_string())
    })?;

    Ok((num, name.to_string()))
}
