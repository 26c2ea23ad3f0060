//! Write-path and authorization rule sets shared by every feature module

pub mod constraints;
pub mod delegation;
pub mod ownership;
pub mod roles;
pub mod soft_delete;

pub use constraints::{BootstrapReport, ConsistencyBootstrap};
pub use delegation::{plan_delegation, DelegationCheck};
pub use ownership::{check_ownership, is_owner, OwnedResource, OwnershipDenial, OwnershipSpec};
pub use roles::{PolicyError, RolePolicy, RoleRule};
pub use soft_delete::{SoftDeletePolicy, WriteContext, WriteKind};
