//! 数据模型模块
//! 角色、地理层级、访问决策与观察记录

pub mod access;
pub mod actor;
pub mod audit;
pub mod geography;
pub mod observation;
pub mod role;
