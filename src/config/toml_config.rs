use crate::domain::ports::ConfigProvider;
use crate::utils::error::{LeadCheckError, Result};
use crate::utils::validation::{self, Validate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 未指定設定檔時使用的預設設定（仍會做環境變數替換）
pub const DEFAULT_CONFIG: &str = r#"
[server]
port = 5008
upload_dir = "uploads"
max_upload_bytes = 10485760

[jornaya]
endpoint = "https://api.leadid.com/Authenticate"
lac = "${JORNAYA_LAC}"
timeout_seconds = 30

[trustedform]
endpoint = "https://cert.trustedform.com"
username = "${TRUSTEDFORM_USERNAME}"
password = "${TRUSTEDFORM_PASSWORD}"
timeout_seconds = 30

[pacing]
delay_ms = 100
"#;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("env placeholder pattern is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jornaya: JornayaConfig,
    #[serde(default)]
    pub trustedform: TrustedFormConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Built frontend served for every non-API path.
    pub static_dir: Option<String>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JornayaConfig {
    #[serde(default = "default_jornaya_endpoint")]
    pub endpoint: String,
    /// LeadID partner licence code
    pub lac: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustedFormConfig {
    #[serde(default = "default_trustedform_endpoint")]
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_port() -> u16 {
    5008
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_jornaya_endpoint() -> String {
    "https://api.leadid.com/Authenticate".to_string()
}

fn default_trustedform_endpoint() -> String {
    "https://cert.trustedform.com".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_delay_ms() -> u64 {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upload_dir: default_upload_dir(),
            static_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            json_logs: false,
        }
    }
}

impl Default for JornayaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_jornaya_endpoint(),
            lac: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for TrustedFormConfig {
    fn default() -> Self {
        Self {
            endpoint: default_trustedform_endpoint(),
            username: None,
            password: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
        }
    }
}

/// 秘密值：空字串或未解析的 `${VAR}` 視為未設定
fn configured_secret(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !ENV_PLACEHOLDER.is_match(v))
}

impl JornayaConfig {
    pub fn lac(&self) -> Result<&str> {
        configured_secret(&self.lac).ok_or_else(|| LeadCheckError::ConfigError {
            message: "Jornaya licence code (jornaya.lac / JORNAYA_LAC) is not configured"
                .to_string(),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl TrustedFormConfig {
    pub fn credentials(&self) -> Result<(&str, &str)> {
        match (
            configured_secret(&self.username),
            configured_secret(&self.password),
        ) {
            (Some(user), Some(pass)) => Ok((user, pass)),
            _ => Err(LeadCheckError::ConfigError {
                message: "TrustedForm credentials (TRUSTEDFORM_USERNAME / TRUSTEDFORM_PASSWORD) are not configured"
                    .to_string(),
            }),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(LeadCheckError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| LeadCheckError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 有指定檔案就讀檔，否則使用內建預設
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::from_toml_str(DEFAULT_CONFIG),
        }
    }

    /// 替換環境變數 (例如 ${TRUSTEDFORM_PASSWORD})，找不到的保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_PLACEHOLDER
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_endpoint("jornaya.endpoint", &self.jornaya.endpoint)?;
        validation::validate_endpoint("trustedform.endpoint", &self.trustedform.endpoint)?;
        validation::validate_dir_path("server.upload_dir", &self.server.upload_dir)?;
        if let Some(static_dir) = &self.server.static_dir {
            validation::validate_dir_path("server.static_dir", static_dir)?;
        }
        validation::validate_range("server.max_upload_bytes", self.server.max_upload_bytes, 1, usize::MAX)?;
        validation::validate_range("jornaya.timeout_seconds", self.jornaya.timeout_seconds, 1, 300)?;
        validation::validate_range(
            "trustedform.timeout_seconds",
            self.trustedform.timeout_seconds,
            1,
            300,
        )?;
        validation::validate_range("pacing.delay_ms", self.pacing.delay_ms, 0, 60_000)?;

        if configured_secret(&self.jornaya.lac).is_none() {
            tracing::warn!("⚠️ Jornaya licence code not configured; Jornaya runs will fail");
        }
        if self.trustedform.credentials().is_err() {
            tracing::warn!("⚠️ TrustedForm credentials not configured; TrustedForm runs will fail");
        }

        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn jornaya(&self) -> &JornayaConfig {
        &self.jornaya
    }

    fn trustedform(&self) -> &TrustedFormConfig {
        &self.trustedform
    }

    fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing.delay_ms)
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
