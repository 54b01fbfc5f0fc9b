//! Partition/sort keys for the single-table layout.
//!
//! The partition key is always the Team id, so one partition holds a Team
//! and its whole subtree. The sort key is `<TAG>#<id>` where TAG names the
//! entity kind; a kind-scoped scan is a prefix match on `<TAG>#`.
//!
//! # Binary Format
//!
//! Stores that keep keys as bytes use:
//! - partition key (UTF-8)
//! - separator (0xFF)
//! - sort key (UTF-8)
//!
//! 0xFF never occurs in UTF-8, so a partition prefix cannot match a
//! different Team whose id merely starts with the same text.

use harbor_core::{
    validate_id, EntityRef, EntityType, HarborResult, KEY_DELIMITER,
};

/// Separator byte between the partition key and the sort key.
pub const SEPARATOR: u8 = 0xFF;

/// Fully-qualified storage key of one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    partition_key: String,
    sort_key: String,
}

impl RecordKey {
    /// Raw constructor. Prefer [`RecordKey::for_entity`], which validates ids.
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.into(),
        }
    }

    /// Key for an entity of `entity_type` with the given identity.
    pub fn for_entity(
        entity_type: EntityType,
        team_id: &str,
        entity_id: &str,
    ) -> HarborResult<Self> {
        validate_id("teamId", team_id)?;
        validate_id(entity_type.id_field(), entity_id)?;
        Ok(Self::new(team_id, sort_key(entity_type, entity_id)))
    }

    pub fn for_ref(entity: &EntityRef) -> HarborResult<Self> {
        Self::for_entity(entity.entity_type, &entity.team_id, &entity.entity_id)
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn sort_key(&self) -> &str {
        &self.sort_key
    }

    /// Split the sort key into its kind and id.
    ///
    /// Returns `None` when the tag is unknown or the id is empty.
    pub fn parse_sort_key(&self) -> Option<(EntityType, &str)> {
        let (tag, id) = self.sort_key.split_once(KEY_DELIMITER)?;
        let entity_type = EntityType::from_sort_tag(tag)?;
        if id.is_empty() || id.contains(KEY_DELIMITER) {
            return None;
        }
        Some((entity_type, id))
    }

    /// Encode to bytes: `[partition][0xFF][sort]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.partition_key.len() + 1 + self.sort_key.len());
        bytes.extend_from_slice(self.partition_key.as_bytes());
        bytes.push(SEPARATOR);
        bytes.extend_from_slice(self.sort_key.as_bytes());
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the separator is missing or either half is not UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let split = bytes.iter().position(|b| *b == SEPARATOR)?;
        let partition_key = std::str::from_utf8(&bytes[..split]).ok()?;
        let sort_key = std::str::from_utf8(&bytes[split + 1..]).ok()?;
        Some(Self::new(partition_key, sort_key))
    }

    /// Byte prefix selecting every record in a partition whose sort key
    /// starts with `sort_prefix`.
    pub fn scan_prefix(partition_key: &str, sort_prefix: &str) -> Vec<u8> {
        Self::new(partition_key, sort_prefix).encode()
    }
}

/// Sort key for an entity: `<TAG>#<id>`.
pub fn sort_key(entity_type: EntityType, entity_id: &str) -> String {
    format!("{}{}", kind_prefix(entity_type), entity_id)
}

/// Sort-key prefix shared by every entity of `entity_type`.
pub fn kind_prefix(entity_type: EntityType) -> String {
    format!("{}{}", entity_type.sort_tag(), KEY_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbor_core::{HarborError, ValidationError};

    #[test]
    fn test_for_entity_layout() -> HarborResult<()> {
        let key = RecordKey::for_entity(EntityType::Codebase, "t1", "c1")?;
        assert_eq!(key.partition_key(), "t1");
        assert_eq!(key.sort_key(), "CODEBASE#c1");

        let team = RecordKey::for_ref(&EntityRef::team("t1"))?;
        assert_eq!(team.sort_key(), "TEAM#t1");
        Ok(())
    }

    #[test]
    fn test_for_entity_rejects_bad_ids() {
        let err = RecordKey::for_entity(EntityType::Project, "", "p1").unwrap_err();
        assert!(matches!(
            err,
            HarborError::Validation(ValidationError::RequiredFieldMissing { ref field }) if field == "teamId"
        ));

        let err = RecordKey::for_entity(EntityType::Project, "t1", "p#1").unwrap_err();
        assert!(matches!(
            err,
            HarborError::Validation(ValidationError::InvalidValue { ref field, .. }) if field == "projectId"
        ));
    }

    #[test]
    fn test_parse_sort_key() -> HarborResult<()> {
        let key = RecordKey::for_entity(EntityType::Member, "t1", "m1")?;
        assert_eq!(key.parse_sort_key(), Some((EntityType::Member, "m1")));

        assert_eq!(RecordKey::new("t1", "WIDGET#w1").parse_sort_key(), None);
        assert_eq!(RecordKey::new("t1", "PROJECT#").parse_sort_key(), None);
        assert_eq!(RecordKey::new("t1", "PROJECT").parse_sort_key(), None);
        assert_eq!(RecordKey::new("t1", "PROJECT#a#b").parse_sort_key(), None);
        Ok(())
    }

    #[test]
    fn test_encode_decode_roundtrip() -> HarborResult<()> {
        let key = RecordKey::for_entity(EntityType::Token, "team-α", "tok-1")?;
        let decoded = RecordKey::decode(&key.encode()).expect("decode should succeed");
        assert_eq!(key, decoded);
        Ok(())
    }

    #[test]
    fn test_decode_without_separator() {
        assert!(RecordKey::decode(b"t1TEAM#t1").is_none());
    }

    #[test]
    fn test_partition_prefix_does_not_bleed() -> HarborResult<()> {
        let prefix = RecordKey::scan_prefix("team", "");
        let other = RecordKey::for_entity(EntityType::Team, "team2", "team2")?.encode();
        let own = RecordKey::for_entity(EntityType::Team, "team", "team")?.encode();

        assert!(own.starts_with(&prefix));
        assert!(!other.starts_with(&prefix));
        Ok(())
    }

    #[test]
    fn test_kind_prefix_selects_kind() {
        let prefix = kind_prefix(EntityType::Codebase);
        assert!(sort_key(EntityType::Codebase, "c1").starts_with(&prefix));
        assert!(!sort_key(EntityType::Project, "c1").starts_with(&prefix));
    }
}
