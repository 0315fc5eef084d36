//! 编排器：主控循环
//!
//! 负责：按配置创建 Agent 客户端与身份校验器、建立 cmd/state 两条通道，
//! 并在后台任务中逐条消费用户命令（Login/Logout/Submit/Reset/Quit）。
//! 会话与登录状态只由该任务持有，一轮处理完成前不会接受下一条命令。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};

use crate::agent::{create_agent_client, AgentClient, AgentRequest};
use crate::auth::{
    authorization_url, create_identity_verifier, idle_timeout_from_minutes, verify_and_authorize, AuthCheck, AuthSession,
    DomainPolicy, IdentityVerifier,
};
use crate::config::AppConfig;
use crate::core::pipeline::run_turn;
use crate::core::{ChatError, ChatPhase, UiState};
use crate::session::ChatSession;
use crate::trace::TraceAggregator;

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 提交 ID Token 登录
    Login(String),
    Logout,
    /// 提交用户输入，触发一轮对话
    Submit(String),
    /// 开始新对话（不影响登录状态）
    Reset,
    Quit,
}

/// 编排器持有的全部运行时状态
pub struct ChatRuntime {
    session: ChatSession,
    auth: AuthSession,
    agent: Arc<dyn AgentClient>,
    verifier: Arc<dyn IdentityVerifier>,
    policy: DomainPolicy,
    aggregator: TraceAggregator,
    agent_id: String,
    agent_alias_id: String,
    title: String,
    icon: Option<String>,
    login_url: Option<String>,
    phase: ChatPhase,
    error_message: Option<String>,
    notice: Option<String>,
}

impl ChatRuntime {
    pub fn new(
        cfg: &AppConfig,
        agent: Arc<dyn AgentClient>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            session: ChatSession::new(),
            auth: AuthSession::new(idle_timeout_from_minutes(cfg.auth.idle_timeout_minutes)),
            agent,
            verifier,
            policy: DomainPolicy::new(&cfg.auth.allowed_domains),
            aggregator: TraceAggregator::default(),
            agent_id: cfg.agent.agent_id.clone().unwrap_or_default(),
            agent_alias_id: cfg.agent.agent_alias_id.clone(),
            title: cfg.app.title.clone(),
            icon: cfg.app.icon.clone(),
            login_url: authorization_url(&cfg.auth).map(|u| u.to_string()),
            phase: ChatPhase::Idle,
            error_message: None,
            notice: None,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg,
            create_agent_client(&cfg.agent),
            create_identity_verifier(&cfg.auth),
        )
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn auth(&self) -> &AuthSession {
        &self.auth
    }

    /// 当前状态投影为 UiState
    pub fn snapshot(&self) -> UiState {
        let user = self.auth.identity().cloned();
        let (history, trace, citations) = if user.is_some() {
            (
                self.session.messages().to_vec(),
                self.session.last_trace().clone(),
                self.session.last_citations().to_vec(),
            )
        } else {
            Default::default()
        };
        UiState {
            phase: self.phase,
            user,
            history,
            input_locked: self.phase == ChatPhase::Waiting,
            error_message: self.error_message.clone(),
            notice: self.notice.clone(),
            trace,
            citations,
            login_url: self.login_url.clone(),
            title: self.title.clone(),
            icon: self.icon.clone(),
        }
    }

    /// 处理一条命令；失败已记录到投影状态中，返回值供调用方（或测试）查看
    pub async fn handle(&mut self, cmd: Command, now: DateTime<Utc>) -> Result<(), ChatError> {
        let result = match cmd {
            Command::Submit(prompt) => match self.accept_prompt(prompt, now) {
                Ok(request) => self.complete_turn(request).await,
                Err(e) => Err(e),
            },
            other => self.handle_immediate(other, now).await,
        };
        self.finish(result)
    }

    /// 除 Submit 外的命令
    async fn handle_immediate(&mut self, cmd: Command, now: DateTime<Utc>) -> Result<(), ChatError> {
        self.clear_messages();
        match cmd {
            Command::Login(token) => {
                match verify_and_authorize(self.verifier.as_ref(), &self.policy, &token).await {
                    Ok(identity) => {
                        tracing::info!(email = %identity.email, "User logged in");
                        self.auth.login(identity, now);
                        Ok(())
                    }
                    Err(e) => {
                        tracing::warn!("Login refused: {}", e);
                        Err(ChatError::LoginRefused(e))
                    }
                }
            }
            Command::Logout => {
                self.auth.logout();
                self.notice = Some("Logged out".to_string());
                Ok(())
            }
            Command::Reset => {
                self.ensure_authenticated(now)?;
                self.session.reset();
                Ok(())
            }
            Command::Submit(_) | Command::Quit => Ok(()),
        }
    }

    /// 校验登录并记录用户输入；返回本轮的 Agent 请求
    pub fn accept_prompt(&mut self, prompt: String, now: DateTime<Utc>) -> Result<AgentRequest, ChatError> {
        self.clear_messages();
        self.ensure_authenticated(now)?;
        let request = AgentRequest {
            agent_id: self.agent_id.clone(),
            agent_alias_id: self.agent_alias_id.clone(),
            session_id: self.session.id().to_string(),
            input_text: prompt.clone(),
        };
        self.session.push_user(prompt);
        self.phase = ChatPhase::Waiting;
        Ok(request)
    }

    /// 调用 Agent 并写入会话
    pub async fn complete_turn(&mut self, request: AgentRequest) -> Result<(), ChatError> {
        let outcome = run_turn(self.agent.as_ref(), &request, &self.aggregator).await?;
        self.session.record_turn(outcome);
        Ok(())
    }

    /// 把结果落到投影状态：需要重新登录的错误显示为提示，其余显示为错误
    pub fn finish(&mut self, result: Result<(), ChatError>) -> Result<(), ChatError> {
        match &result {
            Ok(()) => self.phase = ChatPhase::Idle,
            Err(e) if e.requires_login() => {
                self.phase = ChatPhase::Idle;
                self.notice = Some(e.to_string());
            }
            Err(e) => {
                tracing::warn!("Turn failed: {}", e);
                self.phase = ChatPhase::Error;
                self.error_message = Some(e.to_string());
            }
        }
        result
    }

    fn ensure_authenticated(&mut self, now: DateTime<Utc>) -> Result<(), ChatError> {
        match self.auth.check(now) {
            AuthCheck::Active => Ok(()),
            AuthCheck::Anonymous => Err(ChatError::NotAuthenticated),
            AuthCheck::Expired => Err(ChatError::SessionExpired),
        }
    }

    fn clear_messages(&mut self) {
        self.error_message = None;
        self.notice = None;
    }
}

/// 在后台任务中运行给定的 ChatRuntime
pub fn spawn_runtime(
    mut runtime: ChatRuntime,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    // 两通道：UI -> Core 命令；Core -> UI 状态快照
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (state_tx, state_rx) = watch::channel(runtime.snapshot());

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Quit => break,
                Command::Submit(prompt) => {
                    let result = match runtime.accept_prompt(prompt, Utc::now()) {
                        Ok(request) => {
                            // 先投影 Waiting（输入锁定），再等待 Agent
                            let _ = state_tx.send(runtime.snapshot());
                            runtime.complete_turn(request).await
                        }
                        Err(e) => Err(e),
                    };
                    let _ = runtime.finish(result);
                }
                other => {
                    let _ = runtime.handle(other, Utc::now()).await;
                }
            }
            let _ = state_tx.send(runtime.snapshot());
        }
        tracing::debug!("Command channel closed, runtime stopped");
    });

    (cmd_tx, state_rx)
}
