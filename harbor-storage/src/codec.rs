//! Entity <-> stored record conversion.
//!
//! A record is a [`RecordKey`] plus an attribute object. The identity fields
//! (`teamId` and the entity's own id) live only in the key and are put back
//! on decode; child collections are never stored inline.

use harbor_core::{
    validate_id, Codebase, Entity, EntityType, HarborEntity, HarborError, HarborResult, Member,
    Project, StorageError, Team, Token, ValidationError,
};
use serde_json::{Map, Value};

use crate::key::RecordKey;

/// Attribute object of one record.
pub type Attributes = Map<String, Value>;

/// Nested collections that belong to child records, not to the parent's.
const CHILD_FIELDS: [&str; 4] = ["projects", "members", "tokens", "codebases"];

/// One row of the wide-column table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub key: RecordKey,
    pub attributes: Attributes,
}

impl StoredRecord {
    pub fn new(key: RecordKey, attributes: Attributes) -> Self {
        Self { key, attributes }
    }
}

/// Encode an entity as a single record. Children are dropped.
pub fn encode(entity: &Entity) -> HarborResult<StoredRecord> {
    let entity_type = entity.entity_type();
    let key = RecordKey::for_entity(entity_type, entity.team_id(), entity.entity_id())?;
    if let Entity::Codebase(codebase) = entity {
        validate_id("projectId", &codebase.project_id)?;
    }

    let value = match entity {
        Entity::Team(e) => serde_json::to_value(e),
        Entity::Project(e) => serde_json::to_value(e),
        Entity::Codebase(e) => serde_json::to_value(e),
        Entity::Member(e) => serde_json::to_value(e),
        Entity::Token(e) => serde_json::to_value(e),
    }
    .map_err(|e| ValidationError::InvalidValue {
        field: "attributes".to_string(),
        reason: e.to_string(),
    })?;

    let Value::Object(mut attributes) = value else {
        return Err(ValidationError::InvalidValue {
            field: "attributes".to_string(),
            reason: format!("{} did not serialize to an object", entity_type),
        }
        .into());
    };

    attributes.remove("teamId");
    attributes.remove(entity_type.id_field());
    for field in CHILD_FIELDS {
        attributes.remove(field);
    }

    Ok(StoredRecord::new(key, attributes))
}

/// Decode a record back into a childless entity.
pub fn decode(record: &StoredRecord) -> HarborResult<Entity> {
    let key = &record.key;
    let fail = |reason: String| -> HarborError {
        StorageError::Decode {
            partition_key: key.partition_key().to_string(),
            sort_key: key.sort_key().to_string(),
            reason,
        }
        .into()
    };

    let (entity_type, entity_id) = key
        .parse_sort_key()
        .ok_or_else(|| fail("unrecognized sort key".to_string()))?;
    if key.partition_key().is_empty() {
        return Err(fail("empty partition key".to_string()));
    }
    if entity_type == EntityType::Team && entity_id != key.partition_key() {
        return Err(fail("team id does not match its partition".to_string()));
    }
    if let Some(field) = CHILD_FIELDS
        .iter()
        .find(|field| record.attributes.contains_key(**field))
    {
        return Err(fail(format!("unexpected nested collection '{}'", field)));
    }

    let mut attributes = record.attributes.clone();
    attributes.insert(
        "teamId".to_string(),
        Value::String(key.partition_key().to_string()),
    );
    attributes.insert(
        entity_type.id_field().to_string(),
        Value::String(entity_id.to_string()),
    );
    let value = Value::Object(attributes);

    let entity = match entity_type {
        EntityType::Team => serde_json::from_value::<Team>(value).map(Entity::Team),
        EntityType::Project => serde_json::from_value::<Project>(value).map(Entity::Project),
        EntityType::Codebase => serde_json::from_value::<Codebase>(value).map(Entity::Codebase),
        EntityType::Member => serde_json::from_value::<Member>(value).map(Entity::Member),
        EntityType::Token => serde_json::from_value::<Token>(value).map(Entity::Token),
    };
    entity.map_err(|e| fail(e.to_string()))
}

/// Decode a record that must hold a `T`.
pub fn decode_as<T: HarborEntity>(record: &StoredRecord) -> HarborResult<T> {
    let entity = decode(record)?;
    let found = entity.entity_type();
    T::from_entity(entity).ok_or_else(|| {
        StorageError::Decode {
            partition_key: record.key.partition_key().to_string(),
            sort_key: record.key.sort_key().to_string(),
            reason: format!("expected {}, found {}", T::entity_type(), found),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use harbor_core::{BuildTool, Language};
    use serde_json::json;

    fn codebase() -> Codebase {
        Codebase::new("t1", "p1", "c1", "billing-service", Language::Java, BuildTool::Maven)
    }

    fn assert_decode_error(result: HarborResult<Entity>) {
        assert!(
            matches!(result, Err(HarborError::Storage(StorageError::Decode { .. }))),
            "expected decode error, got {:?}",
            result
        );
    }

    #[test]
    fn test_encode_strips_identity_fields() -> HarborResult<()> {
        let record = encode(&Entity::Codebase(codebase()))?;
        assert_eq!(record.key, RecordKey::new("t1", "CODEBASE#c1"));
        assert_eq!(
            Value::Object(record.attributes),
            json!({
                "projectId": "p1",
                "name": "billing-service",
                "language": "JAVA",
                "buildTool": "MAVEN"
            })
        );
        Ok(())
    }

    #[test]
    fn test_encode_drops_children() -> HarborResult<()> {
        let team = Team::new("t1", "Platform")
            .with_project(Project::new("t1", "p1", "Billing"))
            .with_member(Member::new("t1", "m1", "lead@example.com", true));
        let record = encode(&Entity::Team(team))?;
        assert_eq!(Value::Object(record.attributes), json!({ "name": "Platform" }));
        Ok(())
    }

    #[test]
    fn test_decode_restores_entity() -> HarborResult<()> {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let expires = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let token = Token::new("t1", "k1", "ci", "secret", created, expires);

        let decoded = decode(&encode(&Entity::Token(token.clone()))?)?;
        assert_eq!(decoded, Entity::Token(token));
        Ok(())
    }

    #[test]
    fn test_encode_rejects_invalid_ids() {
        let mut cb = codebase();
        cb.project_id = String::new();
        assert!(matches!(
            encode(&Entity::Codebase(cb)),
            Err(HarborError::Validation(ValidationError::RequiredFieldMissing { .. }))
        ));

        let project = Project::new("t1", "p#1", "Bad");
        assert!(matches!(
            encode(&Entity::Project(project)),
            Err(HarborError::Validation(ValidationError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let record = StoredRecord::new(RecordKey::new("t1", "WIDGET#w1"), Attributes::new());
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_rejects_missing_delimiter() {
        let record = StoredRecord::new(RecordKey::new("t1", "PROJECTp1"), Attributes::new());
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_rejects_empty_id() {
        let record = StoredRecord::new(RecordKey::new("t1", "PROJECT#"), Attributes::new());
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_rejects_team_outside_own_partition() {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!("Platform"));
        let record = StoredRecord::new(RecordKey::new("t1", "TEAM#t2"), attributes);
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_rejects_bad_attributes() {
        let mut attributes = Attributes::new();
        attributes.insert("projectId".to_string(), json!("p1"));
        attributes.insert("name".to_string(), json!("svc"));
        attributes.insert("language".to_string(), json!("COBOL"));
        attributes.insert("buildTool".to_string(), json!("MAVEN"));
        let record = StoredRecord::new(RecordKey::new("t1", "CODEBASE#c1"), attributes);
        assert_decode_error(decode(&record));

        let record = StoredRecord::new(RecordKey::new("t1", "PROJECT#p1"), Attributes::new());
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_rejects_inline_children() {
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), json!("Billing"));
        attributes.insert("codebases".to_string(), json!({}));
        let record = StoredRecord::new(RecordKey::new("t1", "PROJECT#p1"), attributes);
        assert_decode_error(decode(&record));
    }

    #[test]
    fn test_decode_as_checks_kind() -> HarborResult<()> {
        let record = encode(&Entity::Codebase(codebase()))?;
        assert_eq!(decode_as::<Codebase>(&record)?, codebase());
        assert!(matches!(
            decode_as::<Project>(&record),
            Err(HarborError::Storage(StorageError::Decode { .. }))
        ));
        Ok(())
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use harbor_test_utils::generators::arb_childless_entity;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Decoding an encoded childless entity yields the same entity.
        #[test]
        fn prop_decode_inverts_encode(entity in arb_childless_entity()) {
            let record = encode(&entity).expect("generated entities have valid ids");
            let decoded = decode(&record).expect("encoded record decodes");
            prop_assert_eq!(decoded, entity);
        }

        /// Stored attributes never repeat the identity held by the key.
        #[test]
        fn prop_identity_lives_only_in_key(entity in arb_childless_entity()) {
            let record = encode(&entity).expect("generated entities have valid ids");
            prop_assert!(!record.attributes.contains_key("teamId"));
            prop_assert!(!record.attributes.contains_key(entity.entity_type().id_field()));
            prop_assert_eq!(record.key.partition_key(), entity.team_id());
        }
    }
}
