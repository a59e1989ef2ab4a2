//! # Clinic数据库模块
//!
//! 负责预约系统数据的存储和管理，提供PostgreSQL连接池、建表语句和
//! `SchedulingStore` 的数据库实现。防重复预约不变量由预约表上的部分
//! 唯一索引在存储层兜底。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::DatabasePool;
pub use models::*;
pub use queries::DatabaseQueries;
