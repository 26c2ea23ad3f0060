//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, JwtService};
pub use middleware::{
    extract_token, jwt_auth_middleware, ownership_guard, record_role_guard, require_roles,
    AuthContext, RoleGate,
};
pub use password::PasswordHasher;
