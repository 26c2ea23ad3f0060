//! 数据模型模块

pub mod actor;
pub mod audit;
pub mod entity;
pub mod lifecycle;
pub mod role;
pub mod user;

pub use actor::Actor;
pub use entity::{EntityKind, RecordListQuery};
pub use lifecycle::Lifecycle;
pub use role::{Role, RoleScope};
