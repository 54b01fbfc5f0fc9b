//! Harbor DB client.
//!
//! Typed create/get/update/delete over a [`KeyValueStore`]. Cascading
//! creates walk the in-memory subtree breadth-first so every parent is
//! written before its children. Nested reads fetch a Team's whole partition
//! in one query and attach decoded records bottom-up.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use harbor_core::{
    validate_id, Codebase, Entity, EntityId, EntityRef, EntityType, HarborEntity, HarborError,
    HarborResult, StorageError, Team, ValidationError,
};
use tracing::{debug, instrument};

use crate::codec::{self, StoredRecord};
use crate::key::{kind_prefix, RecordKey};
use crate::KeyValueStore;

/// Client for the Team → Project → Codebase hierarchy.
///
/// Cloning is cheap; clones share the underlying store.
pub struct HarborDbClient<S: KeyValueStore + ?Sized = dyn KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> Clone for HarborDbClient<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore + ?Sized> std::fmt::Debug for HarborDbClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborDbClient").finish_non_exhaustive()
    }
}

fn not_found(entity: EntityRef) -> HarborError {
    StorageError::NotFound { entity }.into()
}

impl<S: KeyValueStore + ?Sized> HarborDbClient<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    /// Create `entity`, and with `recurse` every descendant it carries.
    ///
    /// The root fails with `AlreadyExists` if present and `ParentNotFound`
    /// if its parent is absent. A failing descendant is reported as
    /// `CascadeFailed` naming that descendant; records written before it
    /// stay in place.
    ///
    /// The existence check and the write are separate store calls, so two
    /// concurrent creates of the same id can both succeed and the later
    /// write wins.
    #[instrument(level = "debug", skip(self, entity), fields(entity = %entity.entity_ref()))]
    pub fn create<T: HarborEntity>(&self, entity: &T, recurse: bool) -> HarborResult<()> {
        let mut root = entity.clone().into_entity();
        let root_ref = root.entity_ref();
        let children = if recurse {
            root.take_children()
        } else {
            Vec::new()
        };

        self.create_record(&root)?;

        let mut queue: VecDeque<(EntityRef, Entity)> = children
            .into_iter()
            .map(|child| (root_ref.clone(), child))
            .collect();

        while let Some((parent_ref, mut node)) = queue.pop_front() {
            let node_ref = node.entity_ref();
            let grandchildren = node.take_children();

            self.create_descendant(&parent_ref, &node)
                .map_err(|source| HarborError::CascadeFailed {
                    entity: node_ref.clone(),
                    source: Box::new(source),
                })?;
            debug!(descendant = %node_ref, "created descendant");

            queue.extend(
                grandchildren
                    .into_iter()
                    .map(|child| (node_ref.clone(), child)),
            );
        }

        Ok(())
    }

    /// Write a root record after checking its parent and its own key.
    fn create_record(&self, entity: &Entity) -> HarborResult<()> {
        let record = codec::encode(entity)?;

        if let Some(parent) = entity.parent_ref() {
            if self.store.get(&RecordKey::for_ref(&parent)?)?.is_none() {
                return Err(StorageError::ParentNotFound {
                    entity: entity.entity_ref(),
                    parent,
                }
                .into());
            }
        }

        self.insert_new(entity, &record)
    }

    /// Write a descendant whose parent was written earlier in the cascade.
    fn create_descendant(&self, parent_ref: &EntityRef, entity: &Entity) -> HarborResult<()> {
        if entity.parent_ref().as_ref() != Some(parent_ref) {
            return Err(ValidationError::ConstraintViolation {
                constraint: "parent".to_string(),
                reason: format!("{} does not belong under {}", entity.entity_ref(), parent_ref),
            }
            .into());
        }
        let record = codec::encode(entity)?;
        self.insert_new(entity, &record)
    }

    fn insert_new(&self, entity: &Entity, record: &StoredRecord) -> HarborResult<()> {
        if self.store.get(&record.key)?.is_some() {
            return Err(StorageError::AlreadyExists {
                entity: entity.entity_ref(),
            }
            .into());
        }
        self.store.put(record)
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Fetch a single entity without children.
    #[instrument(level = "debug", skip(self))]
    pub fn get<T: HarborEntity>(&self, team_id: &str, entity_id: &str) -> HarborResult<T> {
        let key = RecordKey::for_entity(T::entity_type(), team_id, entity_id)?;
        let record = self
            .store
            .get(&key)?
            .ok_or_else(|| not_found(EntityRef::new(T::entity_type(), team_id, entity_id)))?;
        codec::decode_as(&record)
    }

    /// Fetch a single entity with its whole subtree attached.
    #[instrument(level = "debug", skip(self))]
    pub fn get_with_children<T: HarborEntity>(
        &self,
        team_id: &str,
        entity_id: &str,
    ) -> HarborResult<T> {
        if !has_descendants(T::entity_type()) {
            return self.get(team_id, entity_id);
        }
        validate_id("teamId", team_id)?;
        validate_id(T::entity_type().id_field(), entity_id)?;
        self.nested::<T>(team_id)?
            .remove(entity_id)
            .ok_or_else(|| not_found(EntityRef::new(T::entity_type(), team_id, entity_id)))
    }

    /// Every `T` in a Team's partition, keyed by id.
    ///
    /// A Team that does not exist yields an empty map.
    #[instrument(level = "debug", skip(self))]
    pub fn get_all<T: HarborEntity>(
        &self,
        team_id: &str,
        children: bool,
    ) -> HarborResult<BTreeMap<EntityId, T>> {
        validate_id("teamId", team_id)?;
        if children && has_descendants(T::entity_type()) {
            return self.nested(team_id);
        }
        self.store
            .query(team_id, &kind_prefix(T::entity_type()))?
            .iter()
            .map(|record| -> HarborResult<(EntityId, T)> {
                let entity: T = codec::decode_as(record)?;
                Ok((entity.entity_id().to_string(), entity))
            })
            .collect()
    }

    /// Every `T` whose parent is `parent`, keyed by id.
    #[instrument(level = "debug", skip(self, parent), fields(parent = %parent))]
    pub fn get_all_under<T: HarborEntity>(
        &self,
        parent: &EntityRef,
        children: bool,
    ) -> HarborResult<BTreeMap<EntityId, T>> {
        if T::entity_type().parent_type() != Some(parent.entity_type) {
            return Err(ValidationError::InvalidValue {
                field: "parent".to_string(),
                reason: format!("{} is not a parent of {}", parent.entity_type, T::entity_type()),
            }
            .into());
        }
        let mut all = self.get_all::<T>(&parent.team_id, children)?;
        all.retain(|_, entity| entity.parent_ref().as_ref() == Some(parent));
        Ok(all)
    }

    /// Every Team across all partitions, keyed by team id.
    #[instrument(level = "debug", skip(self))]
    pub fn list_teams(&self, children: bool) -> HarborResult<BTreeMap<EntityId, Team>> {
        let records = self.store.scan(&kind_prefix(EntityType::Team))?;
        let mut teams = BTreeMap::new();
        for record in &records {
            let team: Team = codec::decode_as(record)?;
            if children {
                let mut nested = self.nested::<Team>(&team.team_id)?;
                if let Some(full) = nested.remove(&team.team_id) {
                    teams.insert(full.team_id.clone(), full);
                    continue;
                }
            }
            teams.insert(team.team_id.clone(), team);
        }
        Ok(teams)
    }

    /// Decode a Team's whole partition and nest it, returning the `T`s.
    fn nested<T: HarborEntity>(&self, team_id: &str) -> HarborResult<BTreeMap<EntityId, T>> {
        let records = self.store.query(team_id, "")?;
        let mut entities = BTreeMap::new();
        for record in &records {
            let entity = codec::decode(record)?;
            entities.insert(entity.entity_ref(), entity);
        }
        debug!(team_id, records = records.len(), "loaded partition");
        Ok(assemble(entities))
    }

    // ========================================================================
    // UPDATE
    // ========================================================================

    /// Overwrite the stored attributes of an existing entity.
    ///
    /// Children carried by `entity` are ignored. Returns the stored view.
    #[instrument(level = "debug", skip(self, entity), fields(entity = %entity.entity_ref()))]
    pub fn update<T: HarborEntity>(&self, entity: &T) -> HarborResult<T> {
        let key = RecordKey::for_entity(T::entity_type(), entity.team_id(), entity.entity_id())?;
        let stored = self
            .store
            .get(&key)?
            .ok_or_else(|| not_found(entity.entity_ref()))?;
        let stored: T = codec::decode_as(&stored)?;

        if let Some(field) = entity.changed_identity_field(&stored) {
            return Err(ValidationError::ImmutableField {
                entity: entity.entity_ref(),
                field: field.to_string(),
            }
            .into());
        }

        let record = codec::encode(&entity.clone().into_entity())?;
        self.store.put(&record)?;
        codec::decode_as(&record)
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Delete an entity, and with `recurse` its descendants.
    ///
    /// Returns how many records were removed.
    #[instrument(level = "debug", skip(self))]
    pub fn delete<T: HarborEntity>(
        &self,
        team_id: &str,
        entity_id: &str,
        recurse: bool,
    ) -> HarborResult<u64> {
        let key = RecordKey::for_entity(T::entity_type(), team_id, entity_id)?;
        match T::entity_type() {
            EntityType::Team => self.delete_partition(&key, recurse),
            EntityType::Project if recurse => self.delete_project_tree(&key, team_id, entity_id),
            entity_type => {
                if !self.store.delete(&key)? {
                    return Err(not_found(EntityRef::new(entity_type, team_id, entity_id)));
                }
                Ok(1)
            }
        }
    }

    /// Delete a Team and everything in its partition.
    pub fn delete_team(&self, team_id: &str) -> HarborResult<u64> {
        self.delete::<Team>(team_id, team_id, true)
    }

    fn delete_partition(&self, team_key: &RecordKey, recurse: bool) -> HarborResult<u64> {
        let team_id = team_key.partition_key();
        let records = self.store.query(team_id, "")?;
        let team_present = records.iter().any(|record| &record.key == team_key);

        if records.is_empty() || (!recurse && !team_present) {
            return Err(not_found(EntityRef::team(team_id)));
        }
        if !recurse && records.len() > 1 {
            return Err(ValidationError::ConstraintViolation {
                constraint: "children".to_string(),
                reason: format!(
                    "Team {} still has {} descendant records",
                    team_id,
                    records.len() - 1
                ),
            }
            .into());
        }

        let keys: Vec<RecordKey> = records.into_iter().map(|record| record.key).collect();
        let deleted = self.store.batch_delete(&keys)?;
        debug!(team_id, deleted, "deleted partition");
        Ok(deleted)
    }

    fn delete_project_tree(
        &self,
        project_key: &RecordKey,
        team_id: &str,
        project_id: &str,
    ) -> HarborResult<u64> {
        if self.store.get(project_key)?.is_none() {
            return Err(not_found(EntityRef::new(
                EntityType::Project,
                team_id,
                project_id,
            )));
        }

        let mut keys = Vec::new();
        for record in self
            .store
            .query(team_id, &kind_prefix(EntityType::Codebase))?
        {
            let codebase: Codebase = codec::decode_as(&record)?;
            if codebase.project_id == project_id {
                keys.push(record.key);
            }
        }
        keys.push(project_key.clone());

        let deleted = self.store.batch_delete(&keys)?;
        debug!(team_id, project_id, deleted, "deleted project tree");
        Ok(deleted)
    }
}

fn has_descendants(entity_type: EntityType) -> bool {
    EntityType::ALL
        .iter()
        .any(|kind| kind.depth() > entity_type.depth())
}

/// Attach decoded entities to their parents, deepest kinds first, and keep
/// the `T`s. Entities whose parent is absent are dropped.
fn assemble<T: HarborEntity>(mut entities: BTreeMap<EntityRef, Entity>) -> BTreeMap<EntityId, T> {
    let target_depth = T::entity_type().depth();
    let mut kinds: Vec<EntityType> = EntityType::ALL
        .into_iter()
        .filter(|kind| kind.depth() > target_depth)
        .collect();
    kinds.sort_by_key(|kind| std::cmp::Reverse(kind.depth()));

    for kind in kinds {
        let refs: Vec<EntityRef> = entities
            .keys()
            .filter(|entity_ref| entity_ref.entity_type == kind)
            .cloned()
            .collect();
        for entity_ref in refs {
            let Some(child) = entities.remove(&entity_ref) else {
                continue;
            };
            let Some(parent_ref) = child.parent_ref() else {
                continue;
            };
            let Some(parent) = entities.get_mut(&parent_ref) else {
                continue;
            };
            if let Err(rejected) = parent.attach(child) {
                debug!(entity = %rejected.entity_ref(), "dropped record its parent rejected");
            }
        }
    }

    entities
        .into_values()
        .filter_map(T::from_entity)
        .map(|entity| (entity.entity_id().to_string(), entity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use harbor_core::{BuildTool, Language, Member, Project};

    fn client() -> HarborDbClient<InMemoryStore> {
        HarborDbClient::new(Arc::new(InMemoryStore::new()))
    }

    fn codebase(project: &str, id: &str) -> Codebase {
        Codebase::new("t1", project, id, id, Language::Rust, BuildTool::Cargo)
    }

    fn sample_team() -> Team {
        Team::new("t1", "Platform")
            .with_project(
                Project::new("t1", "p1", "Billing")
                    .with_codebase(codebase("p1", "c1"))
                    .with_codebase(codebase("p1", "c2")),
            )
            .with_project(Project::new("t1", "p2", "Search").with_codebase(codebase("p2", "c3")))
            .with_member(Member::new("t1", "m1", "lead@example.com", true))
    }

    #[test]
    fn test_create_without_recurse_writes_root_only() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), false)?;

        assert_eq!(client.store().len()?, 1);
        let team: Team = client.get("t1", "t1")?;
        assert!(team.projects.is_empty());
        Ok(())
    }

    #[test]
    fn test_create_recursive_writes_subtree() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        assert_eq!(client.store().len()?, 7);
        let nested: Team = client.get_with_children("t1", "t1")?;
        assert_eq!(nested, sample_team());
        Ok(())
    }

    #[test]
    fn test_create_existing_fails() -> HarborResult<()> {
        let client = client();
        client.create(&Team::new("t1", "Platform"), false)?;

        let err = client
            .create(&Team::new("t1", "Other"), false)
            .unwrap_err();
        assert!(matches!(
            err,
            HarborError::Storage(StorageError::AlreadyExists { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_create_without_parent_fails() {
        let client = client();
        let err = client
            .create(&codebase("p1", "c1"), false)
            .unwrap_err();
        match err {
            HarborError::Storage(StorageError::ParentNotFound { entity, parent }) => {
                assert_eq!(entity, EntityRef::new(EntityType::Codebase, "t1", "c1"));
                assert_eq!(parent, EntityRef::new(EntityType::Project, "t1", "p1"));
            }
            other => panic!("expected ParentNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_cascade_failure_names_descendant_and_keeps_ancestors() -> HarborResult<()> {
        let client = client();
        client.create(&Team::new("t1", "Platform"), false)?;
        client.create(&Project::new("t1", "p1", "Billing"), false)?;
        client.create(&codebase("p1", "c1"), false)?;

        let project = Project::new("t1", "p2", "Search").with_codebase(codebase("p2", "c1"));
        let err = client.create(&project, true).unwrap_err();
        match &err {
            HarborError::CascadeFailed { entity, source } => {
                assert_eq!(entity, &EntityRef::new(EntityType::Codebase, "t1", "c1"));
                assert!(matches!(
                    **source,
                    HarborError::Storage(StorageError::AlreadyExists { .. })
                ));
            }
            other => panic!("expected CascadeFailed, got {:?}", other),
        }

        // No rollback: the project itself was written.
        let stored: Project = client.get("t1", "p2")?;
        assert_eq!(stored.name, "Search");
        Ok(())
    }

    #[test]
    fn test_cascade_rejects_mismatched_child() -> HarborResult<()> {
        let client = client();
        client.create(&Team::new("t1", "Platform"), false)?;

        let mut project = Project::new("t1", "p1", "Billing");
        project
            .codebases
            .insert("c9".to_string(), codebase("p2", "c9"));
        let err = client.create(&project, true).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            HarborError::Validation(ValidationError::ConstraintViolation { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let client = client();
        let result = client.get::<Project>("t1", "nope");
        assert!(matches!(result, Err(ref e) if e.is_not_found()));

        let result = client.get_with_children::<Team>("t1", "t1");
        assert!(matches!(result, Err(ref e) if e.is_not_found()));
    }

    #[test]
    fn test_get_all_children_flag() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        let flat = client.get_all::<Project>("t1", false)?;
        assert_eq!(flat.keys().collect::<Vec<_>>(), vec!["p1", "p2"]);
        assert!(flat.values().all(|p| p.codebases.is_empty()));

        let nested = client.get_all::<Project>("t1", true)?;
        assert_eq!(nested["p1"].codebases.len(), 2);
        assert_eq!(nested["p2"].codebases.len(), 1);

        assert!(client.get_all::<Project>("missing", true)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_get_all_under_project_filters_codebases() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        let under_p1 = client.get_all_under::<Codebase>(
            &EntityRef::new(EntityType::Project, "t1", "p1"),
            false,
        )?;
        assert_eq!(under_p1.keys().collect::<Vec<_>>(), vec!["c1", "c2"]);

        let err = client
            .get_all_under::<Codebase>(&EntityRef::team("t1"), false)
            .unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
        Ok(())
    }

    #[test]
    fn test_list_teams() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;
        client.create(&Team::new("t2", "Data"), false)?;

        let flat = client.list_teams(false)?;
        assert_eq!(flat.len(), 2);
        assert!(flat["t1"].projects.is_empty());

        let nested = client.list_teams(true)?;
        assert_eq!(nested["t1"], sample_team());
        assert_eq!(nested["t2"], Team::new("t2", "Data"));
        Ok(())
    }

    #[test]
    fn test_nested_read_drops_orphans() -> HarborResult<()> {
        let client = client();
        client.create(&Team::new("t1", "Platform"), false)?;
        client.create(&Project::new("t1", "p1", "Billing"), false)?;
        client.create(&codebase("p1", "c1"), false)?;
        // Remove the project but leave its codebase behind.
        client.delete::<Project>("t1", "p1", false)?;

        let team: Team = client.get_with_children("t1", "t1")?;
        assert!(team.projects.is_empty());
        Ok(())
    }

    #[test]
    fn test_assemble_drops_children_the_parent_rejects() {
        let mut entities = BTreeMap::new();
        // Slot for p1 holds a different project, so c1 does not fit it.
        entities.insert(
            EntityRef::new(EntityType::Project, "t1", "p1"),
            Entity::Project(Project::new("t1", "p9", "Elsewhere")),
        );
        let child = Entity::Codebase(codebase("p1", "c1"));
        entities.insert(child.entity_ref(), child);

        let projects = assemble::<Project>(entities);
        assert_eq!(projects.len(), 1);
        assert!(projects["p9"].codebases.is_empty());
    }

    #[test]
    fn test_update_overwrites_and_returns_stored_view() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        let renamed = Team::new("t1", "Platform Engineering")
            .with_project(Project::new("t1", "p9", "ignored"));
        let updated = client.update(&renamed)?;
        assert_eq!(updated, Team::new("t1", "Platform Engineering"));

        // Children were not touched.
        assert!(client.get::<Project>("t1", "p9").is_err());
        assert_eq!(client.get_all::<Project>("t1", false)?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let client = client();
        let err = client
            .update(&Member::new("t1", "m1", "a@b.c", false))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_codebase_project_is_immutable() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        let mut moved: Codebase = client.get("t1", "c1")?;
        moved.project_id = "p2".to_string();
        let err = client.update(&moved).unwrap_err();
        assert!(matches!(
            err,
            HarborError::Validation(ValidationError::ImmutableField { ref field, .. }) if field == "projectId"
        ));

        let stored: Codebase = client.get("t1", "c1")?;
        assert_eq!(stored.project_id, "p1");
        Ok(())
    }

    #[test]
    fn test_delete_team_recursive() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;
        client.create(&Team::new("t2", "Data"), false)?;

        assert_eq!(client.delete_team("t1")?, 7);
        assert!(client.get_all::<Project>("t1", false)?.is_empty());
        assert!(client.get::<Team>("t1", "t1").is_err());
        assert_eq!(client.store().len()?, 1);
        Ok(())
    }

    #[test]
    fn test_delete_team_without_recurse_requires_empty_partition() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        let err = client.delete::<Team>("t1", "t1", false).unwrap_err();
        assert!(matches!(
            err,
            HarborError::Validation(ValidationError::ConstraintViolation { .. })
        ));

        client.create(&Team::new("t2", "Data"), false)?;
        assert_eq!(client.delete::<Team>("t2", "t2", false)?, 1);
        Ok(())
    }

    #[test]
    fn test_delete_project_recursive_keeps_siblings() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;

        assert_eq!(client.delete::<Project>("t1", "p1", true)?, 3);
        let codebases = client.get_all::<Codebase>("t1", false)?;
        assert_eq!(codebases.keys().collect::<Vec<_>>(), vec!["c3"]);
        assert!(client.get::<Project>("t1", "p2").is_ok());
        Ok(())
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let client = client();
        assert!(client.delete::<Team>("t1", "t1", true).unwrap_err().is_not_found());
        assert!(client.delete::<Project>("t1", "p1", true).unwrap_err().is_not_found());
        assert!(client.delete::<Codebase>("t1", "c1", false).unwrap_err().is_not_found());
    }

    #[test]
    fn test_bad_record_fails_whole_query() -> HarborResult<()> {
        let client = client();
        client.create(&sample_team(), true)?;
        client.store().put(&StoredRecord::new(
            RecordKey::new("t1", "PROJECT#broken"),
            crate::Attributes::new(),
        ))?;

        let err = client.get_all::<Project>("t1", false).unwrap_err();
        assert!(matches!(
            err,
            HarborError::Storage(StorageError::Decode { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_ids_rejected_before_store() {
        let client = client();
        let err = client.get::<Project>("t1", "a#b").unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
        let err = client.get_all::<Project>("", false).unwrap_err();
        assert!(matches!(err, HarborError::Validation(_)));
    }
}
