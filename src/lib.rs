//! KB Chat - 远端知识库 Agent 的终端客户端
//!
//! 模块划分：
//! - **agent**: 远端 Agent 调用抽象与实现（HTTP 转发 / Mock）
//! - **auth**: 登录状态机、身份校验、授权链接
//! - **citations**: 响应信封解析、引用重编号、来源定位
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、状态投影、单轮流水线、主控循环
//! - **observability**: tracing 日志初始化
//! - **session**: 对话会话与只追加的消息日志
//! - **trace**: trace 事件按步骤聚合
//! - **ui**: Ratatui TUI 界面

pub mod agent;
pub mod auth;
pub mod citations;
pub mod config;
pub mod core;
pub mod observability;
pub mod session;
pub mod trace;
pub mod ui;
