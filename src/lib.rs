//! 分层访问控制服务
//! 角色层级、地理范围与访问决策

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod startup;
pub mod telemetry;
