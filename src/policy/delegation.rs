//! Delegated user creation rules

use crate::{
    error::AppError,
    models::{Actor, Role, RoleScope},
    policy::RolePolicy,
};
use uuid::Uuid;

/// What the caller still has to prove after the role checks pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationCheck {
    /// GLOBAL creators need nothing further
    Unrestricted,
    /// The creator must own this vendor organization
    VendorOwnership(Uuid),
}

/// Decide whether `creator` may create an account with `target` role.
///
/// Pure: no storage access. The vendor ownership proof, when required, is left
/// to the caller through [`DelegationCheck::VendorOwnership`].
pub fn plan_delegation(
    policy: &RolePolicy,
    creator: &Actor,
    target: Role,
    vendor_id: Option<Uuid>,
) -> Result<DelegationCheck, AppError> {
    if policy.creatable_roles(&creator.role).is_empty() {
        return Err(AppError::Forbidden(format!("{} cannot create users", creator.role)));
    }

    if !policy.can_create(&creator.role, target.as_str()) {
        return Err(AppError::Forbidden(format!(
            "{} cannot create role {}",
            creator.role, target
        )));
    }

    if policy.scope(&creator.role) == Some(RoleScope::Global) {
        return Ok(DelegationCheck::Unrestricted);
    }

    if creator.role.eq_ignore_ascii_case(Role::Vendor.as_str()) {
        return match vendor_id {
            Some(id) => Ok(DelegationCheck::VendorOwnership(id)),
            None => Err(AppError::BadRequest(
                "vendorId is required when a vendor creates users".to_string(),
            )),
        };
    }

    // Manager-scoped creation has no business rule yet
    Err(AppError::Forbidden(format!(
        "{} scope assignment is not implemented",
        creator.role.to_ascii_lowercase()
    )))
}
