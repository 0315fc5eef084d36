//! OAuth 授权链接（登录页展示，用户在浏览器中完成授权后把 ID Token 交回客户端）

use url::Url;

use crate::config::AuthSection;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const SCOPES: &str = "openid email profile";

/// 构造授权链接；缺少 client_id 时返回 None
pub fn authorization_url(auth: &AuthSection) -> Option<Url> {
    let client_id = auth.client_id.as_deref().filter(|c| !c.is_empty())?;
    let base = auth.auth_uri.as_deref().unwrap_or(DEFAULT_AUTH_URI);
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", client_id),
        ("scope", SCOPES),
        ("prompt", "select_account"),
        ("access_type", "online"),
    ];
    if let Some(redirect) = auth.redirect_uri.as_deref() {
        params.push(("redirect_uri", redirect));
    }
    match Url::parse_with_params(base, &params) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!("Invalid auth_uri {}: {}", base, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_contains_params() {
        let auth = AuthSection {
            client_id: Some("cid-123".into()),
            redirect_uri: Some("http://localhost:8501/auth_callback".into()),
            ..AuthSection::default()
        };
        let url = authorization_url(&auth).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(url.as_str().starts_with(DEFAULT_AUTH_URI));
        assert!(pairs.contains(&("client_id".into(), "cid-123".into())));
        assert!(pairs.contains(&("prompt".into(), "select_account".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8501/auth_callback".into()
        )));
    }

    #[test]
    fn test_no_client_id_no_url() {
        assert!(authorization_url(&AuthSection::default()).is_none());
    }
}
