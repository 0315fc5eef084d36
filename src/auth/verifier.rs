//! 身份校验边界
//!
//! `IdentityVerifier` 把 OAuth 回调拿到的 ID Token 换成用户身份；域名白名单由 `DomainPolicy` 统一把关。
//! 实现：DevIdentityVerifier（本地开发，Token 即邮箱）与 TokenInfoVerifier（HTTP token-info 端点）。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use super::session::Identity;

/// 未提供姓名时的默认显示名
const DEFAULT_DISPLAY_NAME: &str = "User";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token verification failed: {0}")]
    VerificationFailed(String),

    #[error("Email domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("Malformed identity: {0}")]
    MalformedIdentity(String),
}

/// 身份校验：Token -> Identity
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// 允许登录的邮箱域名；为空表示不限制
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainPolicy {
    allowed: Vec<String>,
}

impl DomainPolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self { allowed }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn check(&self, identity: &Identity) -> Result<(), AuthError> {
        if self.is_unrestricted() {
            return Ok(());
        }
        let domain = identity
            .email
            .rsplit_once('@')
            .map(|(_, d)| d.to_lowercase())
            .ok_or_else(|| AuthError::MalformedIdentity(identity.email.clone()))?;
        if self.allowed.iter().any(|d| *d == domain) {
            Ok(())
        } else {
            Err(AuthError::DomainNotAllowed(domain))
        }
    }
}

/// 校验 Token 并执行域名策略
pub async fn verify_and_authorize(
    verifier: &dyn IdentityVerifier,
    policy: &DomainPolicy,
    token: &str,
) -> Result<Identity, AuthError> {
    let identity = verifier.verify(token).await?;
    policy.check(&identity)?;
    Ok(identity)
}

/// 开发用校验器：Token 形如 `email` 或 `email|显示名`，不做签名校验
#[derive(Debug, Default)]
pub struct DevIdentityVerifier;

#[async_trait]
impl IdentityVerifier for DevIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let token = token.trim();
        let (email, name) = match token.split_once('|') {
            Some((email, name)) => (email.trim(), name.trim()),
            None => (token, ""),
        };
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AuthError::MalformedIdentity(email.to_string())),
        }
        Ok(Identity {
            email: email.to_string(),
            name: if name.is_empty() {
                DEFAULT_DISPLAY_NAME.to_string()
            } else {
                name.to_string()
            },
            picture: None,
        })
    }
}

/// token-info 端点返回的声明
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// 调用 token-info 端点（如 https://oauth2.googleapis.com/tokeninfo）校验 ID Token，并核对 audience
pub struct TokenInfoVerifier {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl TokenInfoVerifier {
    pub fn new(endpoint: impl Into<String>, client_id: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for TokenInfoVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", token.trim())])
            .send()
            .await
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::VerificationFailed(format!(
                "token-info returned {}",
                resp.status()
            )));
        }
        let info: TokenInfo = resp
            .json()
            .await
            .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
        identity_from_token_info(info, &self.client_id)
    }
}

fn identity_from_token_info(info: TokenInfo, client_id: &str) -> Result<Identity, AuthError> {
    if info.aud.as_deref() != Some(client_id) {
        return Err(AuthError::VerificationFailed("audience mismatch".into()));
    }
    let email = info
        .email
        .filter(|e| e.contains('@'))
        .ok_or_else(|| AuthError::MalformedIdentity("missing email claim".into()))?;
    Ok(Identity {
        email,
        name: info
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
        picture: info.picture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: &str) -> Identity {
        Identity {
            email: email.into(),
            name: "U".into(),
            picture: None,
        }
    }

    #[test]
    fn test_empty_policy_allows_any_domain() {
        let policy = DomainPolicy::new(["", " "]);
        assert!(policy.is_unrestricted());
        assert!(policy.check(&identity("a@anything.io")).is_ok());
    }

    #[test]
    fn test_policy_rejects_other_domains() {
        let policy = DomainPolicy::new(["example.com", "Corp.Example"]);
        assert!(policy.check(&identity("a@example.com")).is_ok());
        assert!(policy.check(&identity("b@corp.example")).is_ok());
        assert!(matches!(
            policy.check(&identity("c@evil.com")),
            Err(AuthError::DomainNotAllowed(d)) if d == "evil.com"
        ));
        assert!(matches!(
            policy.check(&identity("no-at-sign")),
            Err(AuthError::MalformedIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_dev_verifier_parses_email_and_name() {
        let id = DevIdentityVerifier.verify("bob@example.com|Bob").await.unwrap();
        assert_eq!(id.email, "bob@example.com");
        assert_eq!(id.name, "Bob");

        let id = DevIdentityVerifier.verify(" carol@example.com ").await.unwrap();
        assert_eq!(id.name, "User");

        assert!(DevIdentityVerifier.verify("not-an-email").await.is_err());
    }

    #[tokio::test]
    async fn test_verify_and_authorize_applies_policy() {
        let policy = DomainPolicy::new(["example.com"]);
        let ok = verify_and_authorize(&DevIdentityVerifier, &policy, "a@example.com").await;
        assert!(ok.is_ok());
        let refused = verify_and_authorize(&DevIdentityVerifier, &policy, "a@other.com").await;
        assert!(matches!(refused, Err(AuthError::DomainNotAllowed(_))));
    }

    #[test]
    fn test_token_info_audience_must_match() {
        let info = TokenInfo {
            aud: Some("other-client".into()),
            email: Some("a@example.com".into()),
            name: None,
            picture: None,
        };
        assert!(identity_from_token_info(info, "my-client").is_err());

        let info = TokenInfo {
            aud: Some("my-client".into()),
            email: Some("a@example.com".into()),
            name: None,
            picture: Some("https://pic".into()),
        };
        let id = identity_from_token_info(info, "my-client").unwrap();
        assert_eq!(id.name, "User");
        assert_eq!(id.picture.as_deref(), Some("https://pic"));
    }
}
