//! 错误定义模块

use thiserror::Error;

/// 预约系统统一错误类型
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("没有权限操作该资源: {0}")]
    Forbidden(String),

    #[error("无效状态转换: 从 {from} 到 {to}")]
    InvalidTransition { from: String, to: String },

    #[error("时段已被预约: {0}")]
    SlotAlreadyBooked(String),

    #[error("时段已被占用，无法删除: {0}")]
    SlotConsumed(String),

    #[error("无效时间区间: 结束时间必须晚于开始时间")]
    InvalidRange,

    #[error("预约已取消: {0}")]
    AlreadyCancelled(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源冲突: {0}")]
    Conflict(String),

    #[error("未认证或凭证无效: {0}")]
    Unauthorized(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 预约系统统一结果类型
pub type Result<T> = std::result::Result<T, ClinicError>;
