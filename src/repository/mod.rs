//! Database repository layer

pub mod audit_repo;
pub mod columns;
pub mod entity_repo;
pub mod user_repo;

pub use audit_repo::AuditRepository;
pub use entity_repo::EntityRepository;
pub use user_repo::UserRepository;
