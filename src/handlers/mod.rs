//! HTTP 处理器模块

pub mod access;
pub mod geography;
pub mod health;
pub mod observation;
pub mod user;
