//! Resource ownership check

use crate::{
    error::AppError,
    models::{Actor, EntityKind},
    policy::RolePolicy,
};

/// Owner identity columns of a stored resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedResource {
    pub owner_id: Option<String>,
    /// `created_by_id` column, not the display attribution
    pub created_by_id: Option<String>,
}

/// How a failed ownership check is reported.
///
/// `NotFound` hides the resource's existence from callers who may not see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipDenial {
    NotFound,
    Forbidden,
}

/// Ownership annotation attached to a route
#[derive(Debug, Clone, Copy)]
pub struct OwnershipSpec {
    pub entity: EntityKind,
    /// Name of the path parameter carrying the resource id
    pub param: &'static str,
    pub denial: OwnershipDenial,
}

impl OwnershipSpec {
    pub const fn new(entity: EntityKind, param: &'static str, denial: OwnershipDenial) -> Self {
        Self {
            entity,
            param,
            denial,
        }
    }

    pub fn deny(&self) -> AppError {
        denial_error(self.denial, self.entity)
    }
}

fn denial_error(denial: OwnershipDenial, entity: EntityKind) -> AppError {
    match denial {
        OwnershipDenial::NotFound => AppError::not_found(entity.table()),
        OwnershipDenial::Forbidden => {
            AppError::Forbidden(format!("not the owner of this {}", entity.table()))
        }
    }
}

/// True when `actor` owns or created `resource`.
///
/// Only stable identities count: the actor id or its `"{role}:{id}"` form.
/// Display names are not unique and never grant ownership.
pub fn is_owner(actor: &Actor, resource: &OwnedResource) -> bool {
    let matches = |stored: Option<&str>| {
        stored.is_some_and(|value| value == actor.id || value == actor.composite_id())
    };
    matches(resource.owner_id.as_deref()) || matches(resource.created_by_id.as_deref())
}

/// GLOBAL-scope roles always pass; everyone else must own the resource
pub fn check_ownership(
    policy: &RolePolicy,
    actor: &Actor,
    entity: EntityKind,
    resource: &OwnedResource,
    denial: OwnershipDenial,
) -> Result<(), AppError> {
    if policy.is_global(&actor.role) || is_owner(actor, resource) {
        return Ok(());
    }

    tracing::warn!(
        actor_id = %actor.id,
        role = %actor.role,
        entity = %entity,
        "Ownership check failed"
    );
    Err(denial_error(denial, entity))
}
