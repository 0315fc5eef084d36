//! 登录状态机：未登录 / 已登录（身份 + 最后活跃时间），空闲超时自动登出
//!
//! 纯状态迁移，不做 I/O；当前时间由调用方传入。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 默认空闲超时（分钟）
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 60;

/// 已验证的用户身份
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AuthState {
    Anonymous,
    Authenticated {
        identity: Identity,
        last_activity: DateTime<Utc>,
    },
}

/// 一次鉴权检查的结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthCheck {
    Active,
    Anonymous,
    /// 本次检查发现超时，已强制登出
    Expired,
}

#[derive(Clone, Debug)]
pub struct AuthSession {
    state: AuthState,
    idle_timeout: Duration,
}

impl AuthSession {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: AuthState::Anonymous,
            idle_timeout,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated { .. })
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            AuthState::Authenticated { identity, .. } => Some(identity),
            AuthState::Anonymous => None,
        }
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            AuthState::Authenticated { last_activity, .. } => Some(*last_activity),
            AuthState::Anonymous => None,
        }
    }

    /// 检查登录是否有效：超时则登出；有效则刷新最后活跃时间
    pub fn check(&mut self, now: DateTime<Utc>) -> AuthCheck {
        let AuthState::Authenticated { last_activity, .. } = &mut self.state else {
            return AuthCheck::Anonymous;
        };
        if now - *last_activity > self.idle_timeout {
            tracing::info!(
                idle_minutes = (now - *last_activity).num_minutes(),
                "Session idle timeout, logging out"
            );
            self.logout();
            return AuthCheck::Expired;
        }
        *last_activity = now;
        AuthCheck::Active
    }

    pub fn check_auth(&mut self, now: DateTime<Utc>) -> bool {
        self.check(now) == AuthCheck::Active
    }

    /// 登录；重复调用只刷新身份与活跃时间
    pub fn login(&mut self, identity: Identity, now: DateTime<Utc>) {
        self.state = AuthState::Authenticated {
            identity,
            last_activity: now,
        };
    }

    pub fn logout(&mut self) {
        self.state = AuthState::Anonymous;
    }
}

/// 由配置的分钟数得到空闲超时；非正数或超出范围时退回默认值
pub fn idle_timeout_from_minutes(minutes: i64) -> Duration {
    match Duration::try_minutes(minutes) {
        Some(timeout) if minutes > 0 => timeout,
        _ => {
            tracing::warn!(
                minutes,
                "Invalid idle timeout, falling back to {} minutes",
                DEFAULT_IDLE_TIMEOUT_MINUTES
            );
            Duration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES)
        }
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn alice() -> Identity {
        Identity {
            email: "alice@example.com".into(),
            name: "Alice".into(),
            picture: None,
        }
    }

    #[test]
    fn test_initial_state_is_anonymous() {
        let mut auth = AuthSession::default();
        assert!(!auth.is_authenticated());
        assert!(auth.identity().is_none());
        assert!(auth.last_activity().is_none());
        assert!(!auth.check_auth(t0()));
    }

    #[test]
    fn test_check_after_61_minutes_logs_out() {
        let mut auth = AuthSession::default();
        auth.login(alice(), t0());
        assert_eq!(auth.check(t0() + Duration::minutes(61)), AuthCheck::Expired);
        assert!(!auth.is_authenticated());
        assert!(auth.identity().is_none());
        assert!(!auth.check_auth(t0() + Duration::minutes(62)));
    }

    #[test]
    fn test_check_within_timeout_refreshes_activity() {
        let mut auth = AuthSession::default();
        auth.login(alice(), t0());
        let first = t0() + Duration::minutes(30);
        assert!(auth.check_auth(first));
        let second = first + Duration::minutes(10);
        assert!(auth.check_auth(second));
        assert_eq!(auth.last_activity(), Some(second));
        // 从上次活跃算起 59 分钟，仍然有效
        assert!(auth.check_auth(second + Duration::minutes(59)));
    }

    #[test]
    fn test_exactly_sixty_minutes_is_still_active() {
        let mut auth = AuthSession::default();
        auth.login(alice(), t0());
        assert!(auth.check_auth(t0() + Duration::minutes(60)));
    }

    #[test]
    fn test_login_is_idempotent_and_refreshes() {
        let mut auth = AuthSession::default();
        auth.login(alice(), t0());
        let later = t0() + Duration::minutes(5);
        let renamed = Identity {
            name: "Alice B".into(),
            ..alice()
        };
        auth.login(renamed.clone(), later);
        assert_eq!(auth.identity(), Some(&renamed));
        assert_eq!(auth.last_activity(), Some(later));
    }

    #[test]
    fn test_logout_resets_unconditionally() {
        let mut auth = AuthSession::default();
        auth.logout();
        assert!(!auth.is_authenticated());
        auth.login(alice(), t0());
        auth.logout();
        assert!(!auth.is_authenticated());
        assert!(auth.last_activity().is_none());
    }

    #[test]
    fn test_idle_timeout_from_minutes_rejects_bad_values() {
        assert_eq!(idle_timeout_from_minutes(15), Duration::minutes(15));
        let fallback = Duration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES);
        assert_eq!(idle_timeout_from_minutes(0), fallback);
        assert_eq!(idle_timeout_from_minutes(-5), fallback);
        assert_eq!(idle_timeout_from_minutes(i64::MAX / 10), fallback);
    }

    #[test]
    fn test_custom_timeout() {
        let mut auth = AuthSession::new(Duration::minutes(5));
        auth.login(alice(), t0());
        assert!(!auth.check_auth(t0() + Duration::minutes(6)));
    }
}
