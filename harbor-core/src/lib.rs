//! Harbor Core - Entity Types
//!
//! Pure data structures for the software-inventory hierarchy
//! (Team → Project → Codebase, plus Team Members and Tokens) and the
//! error taxonomy shared by every other crate. No I/O lives here.

mod config;
mod entities;
mod enums;
mod error;
mod identity;

pub use config::{StoreBackend, StoreConfig};
pub use entities::{
    ChildMap, Codebase, Entity, EntityRef, HarborEntity, Member, Project, Team, Token,
};
pub use enums::{BuildTool, EntityType, EnumParseError, Language};
pub use error::{ConfigError, HarborError, HarborResult, StorageError, ValidationError};
pub use identity::{new_entity_id, validate_id, EntityId, Timestamp, KEY_DELIMITER, MAX_ID_LEN};
