//! 登录与会话有效期：状态机（session）、身份校验边界（verifier）、授权链接（oauth）

pub mod oauth;
pub mod session;
pub mod verifier;

pub use oauth::authorization_url;
pub use session::{
    idle_timeout_from_minutes, AuthCheck, AuthSession, Identity, DEFAULT_IDLE_TIMEOUT_MINUTES,
};
pub use verifier::{
    verify_and_authorize, AuthError, DevIdentityVerifier, DomainPolicy, IdentityVerifier,
    TokenInfoVerifier,
};

use std::sync::Arc;

use crate::config::AuthSection;

/// 根据配置选择校验器：配置了 tokeninfo_url 与 client_id 用 HTTP 校验，否则用开发校验器
pub fn create_identity_verifier(cfg: &AuthSection) -> Arc<dyn IdentityVerifier> {
    match (cfg.tokeninfo_url.as_deref(), cfg.client_id.as_deref()) {
        (Some(url), Some(client_id)) if !url.is_empty() && !client_id.is_empty() => {
            tracing::info!("Using token-info identity verifier ({})", url);
            Arc::new(TokenInfoVerifier::new(url, client_id, cfg.verify_timeout_secs))
        }
        _ => {
            tracing::warn!("No token-info endpoint configured, tokens are trusted as e-mail addresses");
            Arc::new(DevIdentityVerifier)
        }
    }
}
