//! 珠宝电商后端库
//! 软删除一致性与角色层级授权

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
