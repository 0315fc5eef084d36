//! 核心错误类型
//!
//! 每一轮的失败都转成 UiState.error_message 或 notice 展示给用户，不会让进程退出。

use thiserror::Error;

use crate::agent::AgentError;
use crate::auth::AuthError;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Login refused: {0}")]
    LoginRefused(#[from] AuthError),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Session expired, please log in again")]
    SessionExpired,
}

impl ChatError {
    /// 需要回到登录页的错误
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ChatError::NotAuthenticated | ChatError::SessionExpired | ChatError::LoginRefused(_)
        )
    }
}
