//! HTTP 处理器

pub mod audit;
pub mod health;
pub mod record;
pub mod user;
