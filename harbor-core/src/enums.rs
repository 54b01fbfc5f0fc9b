//! Enum types for Harbor entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENTITY KIND
// ============================================================================

/// Entity kind discriminator. Drives the sort-key tag and the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Team,
    Project,
    Codebase,
    Member,
    Token,
}

impl EntityType {
    /// Every supported kind, root first.
    pub const ALL: [EntityType; 5] = [
        EntityType::Team,
        EntityType::Project,
        EntityType::Member,
        EntityType::Token,
        EntityType::Codebase,
    ];

    /// Tag written in front of the id in the sort key.
    pub fn sort_tag(&self) -> &'static str {
        match self {
            EntityType::Team => "TEAM",
            EntityType::Project => "PROJECT",
            EntityType::Codebase => "CODEBASE",
            EntityType::Member => "MEMBER",
            EntityType::Token => "TOKEN",
        }
    }

    /// Parse a sort-key tag back into a kind.
    pub fn from_sort_tag(tag: &str) -> Option<Self> {
        match tag {
            "TEAM" => Some(EntityType::Team),
            "PROJECT" => Some(EntityType::Project),
            "CODEBASE" => Some(EntityType::Codebase),
            "MEMBER" => Some(EntityType::Member),
            "TOKEN" => Some(EntityType::Token),
            _ => None,
        }
    }

    /// Name of the serialized field carrying this kind's own id.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityType::Team => "teamId",
            EntityType::Project => "projectId",
            EntityType::Codebase => "codebaseId",
            EntityType::Member => "memberId",
            EntityType::Token => "tokenId",
        }
    }

    /// Kind of the record that must exist before this one can be created.
    pub fn parent_type(&self) -> Option<EntityType> {
        match self {
            EntityType::Team => None,
            EntityType::Project | EntityType::Member | EntityType::Token => Some(EntityType::Team),
            EntityType::Codebase => Some(EntityType::Project),
        }
    }

    /// Distance from the Team root.
    pub fn depth(&self) -> usize {
        match self.parent_type() {
            None => 0,
            Some(parent) => parent.depth() + 1,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// CODEBASE ATTRIBUTES
// ============================================================================

/// Error when parsing an unknown enum value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Primary language of a codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    Java,
    Kotlin,
    Scala,
    Python,
    Javascript,
    Typescript,
    Go,
    Rust,
    Csharp,
    Ruby,
}

impl Language {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Language::Java => "JAVA",
            Language::Kotlin => "KOTLIN",
            Language::Scala => "SCALA",
            Language::Python => "PYTHON",
            Language::Javascript => "JAVASCRIPT",
            Language::Typescript => "TYPESCRIPT",
            Language::Go => "GO",
            Language::Rust => "RUST",
            Language::Csharp => "CSHARP",
            Language::Ruby => "RUBY",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Language {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "JAVA" => Ok(Language::Java),
            "KOTLIN" => Ok(Language::Kotlin),
            "SCALA" => Ok(Language::Scala),
            "PYTHON" => Ok(Language::Python),
            "JAVASCRIPT" => Ok(Language::Javascript),
            "TYPESCRIPT" => Ok(Language::Typescript),
            "GO" => Ok(Language::Go),
            "RUST" => Ok(Language::Rust),
            "CSHARP" => Ok(Language::Csharp),
            "RUBY" => Ok(Language::Ruby),
            _ => Err(EnumParseError {
                kind: "language",
                value: s.to_string(),
            }),
        }
    }
}

/// Build tool used by a codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildTool {
    Maven,
    Gradle,
    Sbt,
    Npm,
    Yarn,
    Pip,
    Poetry,
    Cargo,
    GoModules,
    Dotnet,
    Bundler,
}

impl BuildTool {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            BuildTool::Maven => "MAVEN",
            BuildTool::Gradle => "GRADLE",
            BuildTool::Sbt => "SBT",
            BuildTool::Npm => "NPM",
            BuildTool::Yarn => "YARN",
            BuildTool::Pip => "PIP",
            BuildTool::Poetry => "POETRY",
            BuildTool::Cargo => "CARGO",
            BuildTool::GoModules => "GO_MODULES",
            BuildTool::Dotnet => "DOTNET",
            BuildTool::Bundler => "BUNDLER",
        }
    }
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for BuildTool {
    type Err = EnumParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MAVEN" => Ok(BuildTool::Maven),
            "GRADLE" => Ok(BuildTool::Gradle),
            "SBT" => Ok(BuildTool::Sbt),
            "NPM" => Ok(BuildTool::Npm),
            "YARN" => Ok(BuildTool::Yarn),
            "PIP" => Ok(BuildTool::Pip),
            "POETRY" => Ok(BuildTool::Poetry),
            "CARGO" => Ok(BuildTool::Cargo),
            "GO_MODULES" => Ok(BuildTool::GoModules),
            "DOTNET" => Ok(BuildTool::Dotnet),
            "BUNDLER" => Ok(BuildTool::Bundler),
            _ => Err(EnumParseError {
                kind: "build tool",
                value: s.to_string(),
            }),
        }
    }
}
