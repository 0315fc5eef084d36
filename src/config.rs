//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `KBCHAT__*` 覆盖（双下划线表示嵌套，如 `KBCHAT__AGENT__AGENT_ID=ABC`）。
//! 列表项 `auth.allowed_domains` 在环境变量中用逗号分隔。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub agent: AgentSection,
    pub auth: AuthSection,
    pub log: LogSection,
}

/// [app] 段：标题与图标
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub title: String,
    pub icon: Option<String>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            title: "Knowledge base".to_string(),
            icon: None,
        }
    }
}

/// [agent] 段：远端 Agent 标识与调用方式
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub agent_id: Option<String>,
    /// TSTALIASID 为测试别名
    pub agent_alias_id: String,
    /// HTTP 转发端点；未设置时使用 Mock 客户端
    pub endpoint: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            agent_id: None,
            agent_alias_id: "TSTALIASID".to_string(),
            endpoint: None,
            request_timeout_secs: 60,
        }
    }
}

/// [auth] 段：OAuth 客户端、域名白名单、空闲超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_uri: Option<String>,
    /// 为空表示不限制域名
    pub allowed_domains: Vec<String>,
    pub idle_timeout_minutes: i64,
    /// token-info 端点；未设置时使用开发校验器（Token 即邮箱）
    pub tokeninfo_url: Option<String>,
    pub verify_timeout_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            client_id: None,
            redirect_uri: None,
            auth_uri: None,
            allowed_domains: Vec::new(),
            idle_timeout_minutes: crate::auth::DEFAULT_IDLE_TIMEOUT_MINUTES,
            tokeninfo_url: None,
            verify_timeout_secs: 10,
        }
    }
}

/// [log] 段：日志级别与输出文件（TUI 占用终端时建议写文件）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 KBCHAT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 KBCHAT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("KBCHAT")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("auth.allowed_domains")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.agent_alias_id, "TSTALIASID");
        assert_eq!(cfg.auth.idle_timeout_minutes, 60);
        assert!(cfg.auth.allowed_domains.is_empty());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
title = "Support KB"

[agent]
agent_id = "AGENT123"

[auth]
allowed_domains = ["example.com"]
idle_timeout_minutes = 15
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.title, "Support KB");
        assert_eq!(cfg.agent.agent_id.as_deref(), Some("AGENT123"));
        assert_eq!(cfg.agent.agent_alias_id, "TSTALIASID");
        assert_eq!(cfg.auth.allowed_domains, vec!["example.com".to_string()]);
        assert_eq!(cfg.auth.idle_timeout_minutes, 15);
    }
}
