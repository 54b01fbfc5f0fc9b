//! Harbor Test Utilities
//!
//! Centralized test infrastructure for the Harbor workspace:
//! - Proptest generators for all entity types
//! - A store that fails on demand
//! - Test fixtures for common scenarios
//! - Custom assertions for Harbor-specific errors

// Re-export stores from their source crate
pub use harbor_storage::{HarborDbClient, InMemoryStore, KeyValueStore, RecordKey, StoredRecord};

// Re-export core types for convenience
pub use harbor_core::{
    BuildTool, Codebase, Entity, EntityRef, EntityType, HarborEntity, HarborError, HarborResult,
    Language, Member, Project, StorageError, Team, Timestamp, Token, ValidationError, MAX_ID_LEN,
};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// FAILING STORE
// ============================================================================

/// In-memory store that can be told to become unavailable.
///
/// `fail_after_puts(n)` lets `n` more writes through and then fails every
/// later write; `set_unavailable(true)` fails every call.
#[derive(Debug)]
pub struct FailingStore {
    inner: InMemoryStore,
    remaining_puts: AtomicUsize,
    unavailable: AtomicBool,
}

impl Default for FailingStore {
    fn default() -> Self {
        Self {
            inner: InMemoryStore::new(),
            remaining_puts: AtomicUsize::new(usize::MAX),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_after_puts(&self, puts: usize) {
        self.remaining_puts.store(puts, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The wrapped store, for inspecting what was written.
    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }

    fn check(&self) -> HarborResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(HarborError::unavailable("store marked unavailable"));
        }
        Ok(())
    }
}

impl KeyValueStore for FailingStore {
    fn get(&self, key: &RecordKey) -> HarborResult<Option<StoredRecord>> {
        self.check()?;
        self.inner.get(key)
    }

    fn put(&self, record: &StoredRecord) -> HarborResult<()> {
        self.check()?;
        let allowed = self
            .remaining_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                usize::MAX => Some(usize::MAX),
                0 => None,
                n => Some(n - 1),
            })
            .is_ok();
        if !allowed {
            return Err(HarborError::unavailable("write budget exhausted"));
        }
        self.inner.put(record)
    }

    fn delete(&self, key: &RecordKey) -> HarborResult<bool> {
        self.check()?;
        self.inner.delete(key)
    }

    fn query(&self, partition_key: &str, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        self.check()?;
        self.inner.query(partition_key, sort_prefix)
    }

    fn batch_delete(&self, keys: &[RecordKey]) -> HarborResult<u64> {
        self.check()?;
        self.inner.batch_delete(keys)
    }

    fn scan(&self, sort_prefix: &str) -> HarborResult<Vec<StoredRecord>> {
        self.check()?;
        self.inner.scan(sort_prefix)
    }
}

/// Client over a fresh in-memory store.
pub fn memory_client() -> HarborDbClient<InMemoryStore> {
    HarborDbClient::new(Arc::new(InMemoryStore::new()))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Harbor entity types.

    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    // === Identity Generators ===

    /// Generate an id that is valid in a record key.
    pub fn arb_entity_id() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9][a-z0-9_-]{0,23}",
            any::<[u8; 16]>().prop_map(|bytes| Uuid::from_bytes(bytes).to_string()),
        ]
    }

    /// Generate a Timestamp within 2020-2030.
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    // === Enum Generators ===

    pub fn arb_entity_type() -> impl Strategy<Value = EntityType> {
        prop::sample::select(EntityType::ALL.to_vec())
    }

    pub fn arb_language() -> impl Strategy<Value = Language> {
        prop::sample::select(vec![
            Language::Java,
            Language::Kotlin,
            Language::Scala,
            Language::Python,
            Language::Javascript,
            Language::Typescript,
            Language::Go,
            Language::Rust,
            Language::Csharp,
            Language::Ruby,
        ])
    }

    pub fn arb_build_tool() -> impl Strategy<Value = BuildTool> {
        prop::sample::select(vec![
            BuildTool::Maven,
            BuildTool::Gradle,
            BuildTool::Sbt,
            BuildTool::Npm,
            BuildTool::Yarn,
            BuildTool::Pip,
            BuildTool::Poetry,
            BuildTool::Cargo,
            BuildTool::GoModules,
            BuildTool::Dotnet,
            BuildTool::Bundler,
        ])
    }

    // === Entity Generators ===

    fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 #/-]{0,31}"
    }

    /// Generate a childless Team.
    pub fn arb_team() -> impl Strategy<Value = Team> {
        (arb_entity_id(), arb_name()).prop_map(|(team_id, name)| Team::new(team_id, name))
    }

    pub fn arb_project(team_id: String) -> impl Strategy<Value = Project> {
        (arb_entity_id(), arb_name())
            .prop_map(move |(project_id, name)| Project::new(team_id.clone(), project_id, name))
    }

    pub fn arb_codebase(team_id: String, project_id: String) -> impl Strategy<Value = Codebase> {
        (arb_entity_id(), arb_name(), arb_language(), arb_build_tool()).prop_map(
            move |(codebase_id, name, language, build_tool)| {
                Codebase::new(
                    team_id.clone(),
                    project_id.clone(),
                    codebase_id,
                    name,
                    language,
                    build_tool,
                )
            },
        )
    }

    pub fn arb_member(team_id: String) -> impl Strategy<Value = Member> {
        (arb_entity_id(), "[a-z]{1,12}@[a-z]{1,12}\\.com", any::<bool>()).prop_map(
            move |(member_id, email, is_team_lead)| {
                Member::new(team_id.clone(), member_id, email, is_team_lead)
            },
        )
    }

    pub fn arb_token(team_id: String) -> impl Strategy<Value = Token> {
        (
            arb_entity_id(),
            arb_name(),
            "[A-Za-z0-9]{32}",
            any::<bool>(),
            arb_timestamp(),
            1i64..(3 * 365),
        )
            .prop_map(move |(token_id, name, secret, enabled, created, days)| {
                let mut token = Token::new(
                    team_id.clone(),
                    token_id,
                    name,
                    secret,
                    created,
                    created + chrono::Duration::days(days),
                );
                token.enabled = enabled;
                token
            })
    }

    /// Generate any childless entity.
    pub fn arb_childless_entity() -> impl Strategy<Value = Entity> {
        arb_entity_id().prop_flat_map(|team_id| {
            prop_oneof![
                arb_team().prop_map({
                    let team_id = team_id.clone();
                    move |mut team| {
                        team.team_id = team_id.clone();
                        Entity::Team(team)
                    }
                }),
                arb_project(team_id.clone()).prop_map(Entity::Project),
                (arb_entity_id())
                    .prop_flat_map({
                        let team_id = team_id.clone();
                        move |project_id| arb_codebase(team_id.clone(), project_id)
                    })
                    .prop_map(Entity::Codebase),
                arb_member(team_id.clone()).prop_map(Entity::Member),
                arb_token(team_id).prop_map(Entity::Token),
            ]
        })
    }

    /// Generate a Team carrying a consistent subtree.
    pub fn arb_team_tree() -> impl Strategy<Value = Team> {
        arb_team().prop_flat_map(|team| {
            let team_id = team.team_id.clone();
            let projects = prop::collection::vec(arb_project(team_id.clone()), 0..4);
            let members = prop::collection::vec(arb_member(team_id.clone()), 0..3);
            let tokens = prop::collection::vec(arb_token(team_id.clone()), 0..3);
            let codebase_ids = prop::collection::vec(arb_entity_id(), 0..6);
            let codebase_template =
                prop::collection::vec((arb_name(), arb_language(), arb_build_tool()), 6);

            (
                Just(team),
                projects,
                members,
                tokens,
                codebase_ids,
                codebase_template,
            )
                .prop_map(
                    |(mut team, projects, members, tokens, codebase_ids, template)| {
                        for project in projects {
                            team.projects.insert(project.project_id.clone(), project);
                        }
                        for member in members {
                            team.members.insert(member.member_id.clone(), member);
                        }
                        for token in tokens {
                            team.tokens.insert(token.token_id.clone(), token);
                        }

                        // Codebase ids are team-scoped, so spread unique ids across projects.
                        let project_ids: Vec<String> = team.projects.keys().cloned().collect();
                        if !project_ids.is_empty() {
                            let mut seen = std::collections::BTreeSet::new();
                            for (i, codebase_id) in codebase_ids.into_iter().enumerate() {
                                if !seen.insert(codebase_id.clone()) {
                                    continue;
                                }
                                let project_id = &project_ids[i % project_ids.len()];
                                let (name, language, build_tool) = template[i].clone();
                                let codebase = Codebase::new(
                                    team.team_id.clone(),
                                    project_id.clone(),
                                    codebase_id,
                                    name,
                                    language,
                                    build_tool,
                                );
                                if let Some(project) = team.projects.get_mut(project_id) {
                                    project
                                        .codebases
                                        .insert(codebase.codebase_id.clone(), codebase);
                                }
                            }
                        }
                        team
                    },
                )
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built entities for common scenarios.

    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    /// Team "t1" with project "p1" holding codebase "c1".
    pub fn platform_team() -> Team {
        Team::new("t1", "Platform").with_project(billing_project())
    }

    /// Project "p1" in team "t1" holding codebase "c1".
    pub fn billing_project() -> Project {
        Project::new("t1", "p1", "Billing").with_codebase(billing_service())
    }

    pub fn billing_service() -> Codebase {
        Codebase::new(
            "t1",
            "p1",
            "c1",
            "billing-service",
            Language::Java,
            BuildTool::Maven,
        )
    }

    pub fn team_lead() -> Member {
        Member::new("t1", "m1", "lead@example.com", true)
    }

    /// Enabled token valid for one year from 2024-01-01.
    pub fn ci_token() -> Token {
        let created = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Token::new("t1", "k1", "ci", "s3cr3t", created, created + Duration::days(365))
    }

    /// `platform_team` plus a member and a token.
    pub fn full_team() -> Team {
        platform_team().with_member(team_lead()).with_token(ci_token())
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Harbor-specific validation.

    use super::*;

    /// Assert that a HarborResult is a NotFound storage error for `entity_type`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &HarborResult<T>, entity_type: EntityType) {
        match result {
            Err(HarborError::Storage(StorageError::NotFound { entity })) => {
                assert_eq!(entity.entity_type, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    #[track_caller]
    pub fn assert_parent_not_found<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result {
            Err(HarborError::Storage(StorageError::ParentNotFound { .. })) => {}
            other => panic!("Expected ParentNotFound error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_already_exists<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result {
            Err(HarborError::Storage(StorageError::AlreadyExists { .. })) => {}
            other => panic!("Expected AlreadyExists error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result.as_ref().map_err(HarborError::root_cause) {
            Err(HarborError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable error, got: {:?}", other),
        }
    }

    /// Assert a cascade failure at `entity`.
    #[track_caller]
    pub fn assert_cascade_failed_at<T: std::fmt::Debug>(result: &HarborResult<T>, entity: &EntityRef) {
        match result {
            Err(HarborError::CascadeFailed { entity: failed, .. }) => {
                assert_eq!(failed, entity, "Cascade failed at a different entity");
            }
            other => panic!("Expected CascadeFailed at {}, got: {:?}", entity, other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &HarborResult<T>) {
        match result {
            Err(HarborError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertions::*;
    use proptest::prelude::*;

    #[test]
    fn test_failing_store_write_budget() {
        let store = FailingStore::new();
        store.fail_after_puts(1);
        let record = StoredRecord::new(RecordKey::new("t1", "TEAM#t1"), Default::default());

        assert!(store.put(&record).is_ok());
        assert_unavailable(&store.put(&record));
        assert!(store.get(&record.key).is_ok());
    }

    #[test]
    fn test_failing_store_unavailable_toggle() {
        let store = FailingStore::new();
        store.set_unavailable(true);
        assert_unavailable(&store.query("t1", ""));
        store.set_unavailable(false);
        assert!(store.query("t1", "").is_ok());
    }

    #[test]
    fn test_fixtures_are_consistent() {
        let team = fixtures::full_team();
        assert_eq!(team.projects["p1"].codebases["c1"], fixtures::billing_service());
        assert_eq!(team.members.len(), 1);
        assert!(!fixtures::ci_token().is_expired(fixtures::ci_token().created));
    }

    proptest! {
        #[test]
        fn prop_team_tree_children_belong_to_parent(team in generators::arb_team_tree()) {
            for project in team.projects.values() {
                prop_assert_eq!(&project.team_id, &team.team_id);
                for codebase in project.codebases.values() {
                    prop_assert_eq!(&codebase.project_id, &project.project_id);
                }
            }
        }
    }
}
