//! 会话认证
//!
//! 提供不透明 Bearer 令牌的签发、校验与吊销。已验证的 `Actor` 由
//! 中间件注入请求扩展，核心逻辑只接收显式身份参数，绝不读取全局
//! 会话状态。

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use clinic_core::{Actor, ClinicError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::handlers::{ApiError, AppState};

/// 会话令牌表
///
/// 不透明令牌到已验证身份的映射。令牌在登录/注册时签发，
/// 登出时吊销。
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Actor>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 签发新令牌
    pub async fn issue(&self, actor: Actor) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(token.clone(), actor);
        tracing::info!("Issued session token for {:?} {}", actor.role, actor.id);
        token
    }

    /// 校验令牌，返回其绑定的身份
    pub async fn verify(&self, token: &str) -> Result<Actor> {
        self.sessions
            .read()
            .await
            .get(token)
            .copied()
            .ok_or_else(|| ClinicError::Unauthorized("invalid or expired token".to_string()))
    }

    /// 吊销令牌（重复吊销无副作用）
    pub async fn revoke(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

/// 从请求头提取 Bearer 令牌
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// 认证中间件
///
/// 校验令牌并把 `Actor` 写入请求扩展，供各处理器提取。
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let token = bearer_token(&request)
        .ok_or_else(|| ClinicError::Unauthorized("missing token".to_string()))?;

    let actor = state.sessions.verify(token).await?;
    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_verify_revoke() {
        let store = SessionStore::new();
        let actor = Actor::doctor(Uuid::new_v4());

        let token = store.issue(actor).await;
        assert_eq!(store.verify(&token).await.unwrap(), actor);

        store.revoke(&token).await;
        assert!(matches!(
            store.verify(&token).await,
            Err(ClinicError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_rejects_unknown_token() {
        let store = SessionStore::new();
        assert!(store.verify("no-such-token").await.is_err());
    }
}
