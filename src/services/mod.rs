//! Business logic services layer

pub mod audit_service;
pub mod permission_service;
pub mod record_service;
pub mod user_service;

pub use audit_service::{AuditAction, AuditRecordId, AuditService};
pub use permission_service::PermissionService;
pub use record_service::RecordService;
pub use user_service::UserService;
