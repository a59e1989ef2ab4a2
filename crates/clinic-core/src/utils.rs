//! 通用工具函数

use crate::error::{ClinicError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// 默认取消原因
pub const DEFAULT_CANCEL_REASON: &str = "No reason provided";

/// 校验时间区间：结束时间必须严格晚于开始时间
pub fn validate_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(ClinicError::InvalidRange);
    }
    Ok(())
}

/// 归一化取消原因，空白或缺省时填入默认文案
pub fn normalize_cancel_reason(reason: Option<&str>) -> String {
    match reason {
        Some(r) if !r.trim().is_empty() => r.trim().to_string(),
        _ => DEFAULT_CANCEL_REASON.to_string(),
    }
}

/// 生成随机盐值
pub fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// 计算加盐口令摘要，格式 `盐$十六进制摘要`
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{}${}", salt, hex::encode(hasher.finalize()))
}

/// 校验口令与存储摘要是否匹配
pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_time_range() {
        let start = Utc::now();
        assert!(validate_time_range(start, start + Duration::minutes(30)).is_ok());
        assert!(validate_time_range(start, start).is_err());
        assert!(validate_time_range(start, start - Duration::minutes(1)).is_err());
    }

    #[test]
    fn test_password_hashing() {
        let digest = hash_password("secret", &new_salt());
        assert!(verify_password("secret", &digest));
        assert!(!verify_password("wrong", &digest));
        assert!(!verify_password("secret", "malformed-digest"));
    }

    #[test]
    fn test_normalize_cancel_reason() {
        assert_eq!(normalize_cancel_reason(Some("Feeling better")), "Feeling better");
        assert_eq!(normalize_cancel_reason(Some("  ")), DEFAULT_CANCEL_REASON);
        assert_eq!(normalize_cancel_reason(None), DEFAULT_CANCEL_REASON);
    }
}
