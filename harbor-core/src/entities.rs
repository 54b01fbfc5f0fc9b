//! Core entity structures
//!
//! Every entity lives under exactly one Team. Children are owned maps keyed
//! by the child's id, so an in-memory Team can carry its whole subtree into a
//! cascading create and come back out of a nested query the same way.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{BuildTool, EntityId, EntityType, Language, Timestamp};

/// Owned children keyed by child id.
pub type ChildMap<T> = BTreeMap<EntityId, T>;

/// Reference to an entity by kind and team-scoped identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub team_id: EntityId,
    pub entity_id: EntityId,
}

impl EntityRef {
    pub fn new(
        entity_type: EntityType,
        team_id: impl Into<EntityId>,
        entity_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            entity_type,
            team_id: team_id.into(),
            entity_id: entity_id.into(),
        }
    }

    /// Reference to a Team root; its entity id is the team id.
    pub fn team(team_id: impl Into<EntityId>) -> Self {
        let team_id = team_id.into();
        Self {
            entity_type: EntityType::Team,
            entity_id: team_id.clone(),
            team_id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.entity_type, self.team_id, self.entity_id)
    }
}

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// Team - root of the hierarchy and of its storage partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub team_id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub projects: ChildMap<Project>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub members: ChildMap<Member>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tokens: ChildMap<Token>,
}

impl Team {
    pub fn new(team_id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            name: name.into(),
            projects: ChildMap::new(),
            members: ChildMap::new(),
            tokens: ChildMap::new(),
        }
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.insert(project.project_id.clone(), project);
        self
    }

    pub fn with_member(mut self, member: Member) -> Self {
        self.members.insert(member.member_id.clone(), member);
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.tokens.insert(token.token_id.clone(), token);
        self
    }
}

/// Project - belongs to one Team, owns Codebases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub team_id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub codebases: ChildMap<Codebase>,
}

impl Project {
    pub fn new(
        team_id: impl Into<EntityId>,
        project_id: impl Into<EntityId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            project_id: project_id.into(),
            name: name.into(),
            codebases: ChildMap::new(),
        }
    }

    pub fn with_codebase(mut self, codebase: Codebase) -> Self {
        self.codebases.insert(codebase.codebase_id.clone(), codebase);
        self
    }
}

/// Codebase - identity is team-scoped; `project_id` is a back-reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Codebase {
    pub team_id: EntityId,
    pub codebase_id: EntityId,
    pub project_id: EntityId,
    pub name: String,
    pub language: Language,
    pub build_tool: BuildTool,
}

impl Codebase {
    pub fn new(
        team_id: impl Into<EntityId>,
        project_id: impl Into<EntityId>,
        codebase_id: impl Into<EntityId>,
        name: impl Into<String>,
        language: Language,
        build_tool: BuildTool,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            codebase_id: codebase_id.into(),
            project_id: project_id.into(),
            name: name.into(),
            language,
            build_tool,
        }
    }
}

/// Member - a person on a Team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub team_id: EntityId,
    pub member_id: EntityId,
    pub email: String,
    pub is_team_lead: bool,
}

impl Member {
    pub fn new(
        team_id: impl Into<EntityId>,
        member_id: impl Into<EntityId>,
        email: impl Into<String>,
        is_team_lead: bool,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            member_id: member_id.into(),
            email: email.into(),
            is_team_lead,
        }
    }
}

/// Token - an API credential issued to a Team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub team_id: EntityId,
    pub token_id: EntityId,
    pub name: String,
    pub token: String,
    pub enabled: bool,
    pub created: Timestamp,
    pub expires: Timestamp,
}

impl Token {
    /// New enabled token.
    pub fn new(
        team_id: impl Into<EntityId>,
        token_id: impl Into<EntityId>,
        name: impl Into<String>,
        token: impl Into<String>,
        created: Timestamp,
        expires: Timestamp,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            token_id: token_id.into(),
            name: name.into(),
            token: token.into(),
            enabled: true,
            created,
            expires,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires
    }
}

// ============================================================================
// POLYMORPHIC ENTITY
// ============================================================================

/// Any storable entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Team(Team),
    Project(Project),
    Codebase(Codebase),
    Member(Member),
    Token(Token),
}

impl Entity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Team(_) => EntityType::Team,
            Entity::Project(_) => EntityType::Project,
            Entity::Codebase(_) => EntityType::Codebase,
            Entity::Member(_) => EntityType::Member,
            Entity::Token(_) => EntityType::Token,
        }
    }

    pub fn team_id(&self) -> &str {
        match self {
            Entity::Team(e) => &e.team_id,
            Entity::Project(e) => &e.team_id,
            Entity::Codebase(e) => &e.team_id,
            Entity::Member(e) => &e.team_id,
            Entity::Token(e) => &e.team_id,
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Entity::Team(e) => &e.team_id,
            Entity::Project(e) => &e.project_id,
            Entity::Codebase(e) => &e.codebase_id,
            Entity::Member(e) => &e.member_id,
            Entity::Token(e) => &e.token_id,
        }
    }

    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type(), self.team_id(), self.entity_id())
    }

    /// The record that must exist before this one may be created.
    pub fn parent_ref(&self) -> Option<EntityRef> {
        match self {
            Entity::Team(_) => None,
            Entity::Project(_) | Entity::Member(_) | Entity::Token(_) => {
                Some(EntityRef::team(self.team_id()))
            }
            Entity::Codebase(c) => Some(EntityRef::new(
                EntityType::Project,
                c.team_id.clone(),
                c.project_id.clone(),
            )),
        }
    }

    /// Detach and return the owned children, leaving `self` childless.
    pub fn take_children(&mut self) -> Vec<Entity> {
        match self {
            Entity::Team(team) => {
                let mut children: Vec<Entity> = std::mem::take(&mut team.projects)
                    .into_values()
                    .map(Entity::Project)
                    .collect();
                children.extend(
                    std::mem::take(&mut team.members)
                        .into_values()
                        .map(Entity::Member),
                );
                children.extend(
                    std::mem::take(&mut team.tokens)
                        .into_values()
                        .map(Entity::Token),
                );
                children
            }
            Entity::Project(project) => std::mem::take(&mut project.codebases)
                .into_values()
                .map(Entity::Codebase)
                .collect(),
            Entity::Codebase(_) | Entity::Member(_) | Entity::Token(_) => Vec::new(),
        }
    }

    /// Attach `child` under `self`.
    ///
    /// Hands the child back when it does not belong here (wrong kind,
    /// different team, or a Codebase of another Project).
    pub fn attach(&mut self, child: Entity) -> Result<(), Entity> {
        if child.parent_ref().as_ref() != Some(&self.entity_ref()) {
            return Err(child);
        }
        match (self, child) {
            (Entity::Team(team), Entity::Project(p)) => {
                team.projects.insert(p.project_id.clone(), p);
            }
            (Entity::Team(team), Entity::Member(m)) => {
                team.members.insert(m.member_id.clone(), m);
            }
            (Entity::Team(team), Entity::Token(t)) => {
                team.tokens.insert(t.token_id.clone(), t);
            }
            (Entity::Project(project), Entity::Codebase(c)) => {
                project.codebases.insert(c.codebase_id.clone(), c);
            }
            (_, child) => return Err(child),
        }
        Ok(())
    }
}

// ============================================================================
// TYPED ACCESS
// ============================================================================

/// Implemented by every entity kind the Harbor DB client can store.
pub trait HarborEntity: Clone + Send + Sync + 'static {
    /// Kind discriminator for this type.
    fn entity_type() -> EntityType;

    fn team_id(&self) -> &str;

    fn entity_id(&self) -> &str;

    fn into_entity(self) -> Entity;

    /// Narrow a polymorphic entity back to this type.
    fn from_entity(entity: Entity) -> Option<Self>;

    /// Name of an identity field that differs between `self` and the
    /// stored version, if any. Only fields outside the key can differ.
    fn changed_identity_field(&self, _stored: &Self) -> Option<&'static str> {
        None
    }

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::entity_type(), self.team_id(), self.entity_id())
    }

    /// Depth-one kinds hang off their Team.
    fn parent_ref(&self) -> Option<EntityRef> {
        Self::entity_type()
            .parent_type()
            .map(|_| EntityRef::team(self.team_id()))
    }
}

macro_rules! impl_harbor_entity {
    ($type:ident, $id_field:ident) => {
        impl HarborEntity for $type {
            fn entity_type() -> EntityType {
                EntityType::$type
            }

            fn team_id(&self) -> &str {
                &self.team_id
            }

            fn entity_id(&self) -> &str {
                &self.$id_field
            }

            fn into_entity(self) -> Entity {
                Entity::$type(self)
            }

            fn from_entity(entity: Entity) -> Option<Self> {
                match entity {
                    Entity::$type(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$type> for Entity {
            fn from(value: $type) -> Self {
                Entity::$type(value)
            }
        }
    };
}

impl_harbor_entity!(Team, team_id);
impl_harbor_entity!(Project, project_id);
impl_harbor_entity!(Member, member_id);
impl_harbor_entity!(Token, token_id);

impl HarborEntity for Codebase {
    fn entity_type() -> EntityType {
        EntityType::Codebase
    }

    fn team_id(&self) -> &str {
        &self.team_id
    }

    fn entity_id(&self) -> &str {
        &self.codebase_id
    }

    fn into_entity(self) -> Entity {
        Entity::Codebase(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Codebase(inner) => Some(inner),
            _ => None,
        }
    }

    fn changed_identity_field(&self, stored: &Self) -> Option<&'static str> {
        (self.project_id != stored.project_id).then_some("projectId")
    }

    fn parent_ref(&self) -> Option<EntityRef> {
        Some(EntityRef::new(
            EntityType::Project,
            self.team_id.clone(),
            self.project_id.clone(),
        ))
    }
}

impl From<Codebase> for Entity {
    fn from(value: Codebase) -> Self {
        Entity::Codebase(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codebase(team: &str, project: &str, id: &str) -> Codebase {
        Codebase::new(team, project, id, "svc", Language::Java, BuildTool::Maven)
    }

    #[test]
    fn test_parent_refs() {
        let team = Entity::Team(Team::new("t1", "Team"));
        assert_eq!(team.parent_ref(), None);

        let project = Entity::Project(Project::new("t1", "p1", "Project"));
        assert_eq!(project.parent_ref(), Some(EntityRef::team("t1")));

        let cb = Entity::Codebase(codebase("t1", "p1", "c1"));
        assert_eq!(
            cb.parent_ref(),
            Some(EntityRef::new(EntityType::Project, "t1", "p1"))
        );
    }

    #[test]
    fn test_take_children_detaches_subtree() {
        let team = Team::new("t1", "Team")
            .with_project(Project::new("t1", "p1", "P").with_codebase(codebase("t1", "p1", "c1")))
            .with_member(Member::new("t1", "m1", "lead@example.com", true));
        let mut entity = Entity::Team(team);

        let children = entity.take_children();
        assert_eq!(children.len(), 2);
        match &entity {
            Entity::Team(t) => {
                assert!(t.projects.is_empty());
                assert!(t.members.is_empty());
            }
            other => panic!("unexpected entity {:?}", other),
        }

        // Grandchildren stay with their own parent
        let project = children
            .into_iter()
            .find_map(Project::from_entity)
            .expect("project child");
        assert_eq!(project.codebases.len(), 1);
    }

    #[test]
    fn test_attach_rejects_foreign_children() {
        let mut project = Entity::Project(Project::new("t1", "p1", "P"));

        assert!(project
            .attach(Entity::Codebase(codebase("t1", "p1", "c1")))
            .is_ok());
        assert!(project
            .attach(Entity::Codebase(codebase("t1", "p2", "c2")))
            .is_err());
        assert!(project
            .attach(Entity::Codebase(codebase("t2", "p1", "c3")))
            .is_err());
        assert!(project
            .attach(Entity::Member(Member::new("t1", "m1", "a@b.c", false)))
            .is_err());

        match project {
            Entity::Project(p) => assert_eq!(p.codebases.keys().collect::<Vec<_>>(), vec!["c1"]),
            other => panic!("unexpected entity {:?}", other),
        }
    }

    #[test]
    fn test_typed_parent_ref_matches_entity() {
        let cb = codebase("t1", "p1", "c1");
        assert_eq!(HarborEntity::parent_ref(&cb), cb.clone().into_entity().parent_ref());

        let member = Member::new("t1", "m1", "a@b.c", false);
        assert_eq!(HarborEntity::parent_ref(&member), Some(EntityRef::team("t1")));
        assert_eq!(HarborEntity::parent_ref(&Team::new("t1", "T")), None);
    }

    #[test]
    fn test_changed_identity_field() {
        let stored = codebase("t1", "p1", "c1");
        let mut moved = stored.clone();
        assert_eq!(moved.changed_identity_field(&stored), None);
        moved.project_id = "p2".to_string();
        assert_eq!(moved.changed_identity_field(&stored), Some("projectId"));
    }

    #[test]
    fn test_team_serialization_nests_children_by_id() -> Result<(), serde_json::Error> {
        let team = Team::new("t1", "Team")
            .with_project(Project::new("t1", "p1", "P").with_codebase(codebase("t1", "p1", "c1")));
        let json = serde_json::to_value(&team)?;
        assert_eq!(json["projects"]["p1"]["codebases"]["c1"]["language"], "JAVA");
        assert!(json.get("members").is_none());
        Ok(())
    }
}
