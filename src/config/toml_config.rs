use crate::utils::error::{LandlordError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_PORT: u16 = 8080;
pub const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6380";
pub const DEFAULT_STORE_PASSWORD: &str = "landlord";
pub const DEFAULT_TENANT_PORT_BASE: u16 = 6381;
pub const DEFAULT_MAX_TENANTS: u16 = 10;
pub const DEFAULT_LOG_FILE: &str = "srv.log";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub tool: ToolConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub path: String,
    pub use_sudo: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    pub tenant_port_base: Option<u32>,
    pub max_tenants: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_port: Option<u16>,
    pub log_path: Option<String>,
}

/// Fully resolved configuration, built once at startup and passed by
/// reference to the components that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub tool_path: PathBuf,
    pub use_sudo: bool,
    pub store_url: String,
    pub store_password: String,
    pub pool: PoolSettings,
    pub listen_port: u16,
    pub log_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub tenant_port_base: u16,
    pub max_tenants: u16,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| LandlordError::Config {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${STORE_PASSWORD})；未定義的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        use regex::Regex;
        use std::sync::OnceLock;

        static VAR: OnceLock<Regex> = OnceLock::new();
        let re = VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn store_url(&self) -> &str {
        self.store
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_STORE_URL)
    }

    pub fn store_password(&self) -> &str {
        self.store
            .password
            .as_deref()
            .unwrap_or(DEFAULT_STORE_PASSWORD)
    }

    // 0 或未設定時使用預設值

    pub fn tenant_port_base(&self) -> u32 {
        match self.pool.tenant_port_base {
            Some(base) if base > 0 => base,
            _ => DEFAULT_TENANT_PORT_BASE as u32,
        }
    }

    pub fn max_tenants(&self) -> u32 {
        match self.pool.max_tenants {
            Some(max) if max > 0 => max,
            _ => DEFAULT_MAX_TENANTS as u32,
        }
    }

    pub fn listen_port(&self) -> u16 {
        match self.server.listen_port {
            Some(port) if port > 0 => port,
            _ => DEFAULT_LISTEN_PORT,
        }
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        match self.server.log_path.as_deref() {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => {
                let exe = std::env::current_exe().map_err(|e| LandlordError::Config {
                    field: "server.log_path".to_string(),
                    message: format!(
                        "Unable to read executable path, set server.log_path explicitly: {}",
                        e
                    ),
                })?;
                let dir = exe.parent().unwrap_or_else(|| Path::new("."));
                Ok(dir.join(DEFAULT_LOG_FILE))
            }
        }
    }

    /// Validates and resolves every default.
    pub fn settings(&self) -> Result<Settings> {
        self.validate()?;

        // validate() has already bounded the pool to u16 ports
        let pool = PoolSettings {
            tenant_port_base: self.tenant_port_base() as u16,
            max_tenants: self.max_tenants() as u16,
        };

        Ok(Settings {
            tool_path: PathBuf::from(&self.tool.path),
            use_sudo: self.tool.use_sudo.unwrap_or(true),
            store_url: self.store_url().to_string(),
            store_password: self.store_password().to_string(),
            pool,
            listen_port: self.listen_port(),
            log_path: self.log_path()?,
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("tool.path", &self.tool.path)?;
        validation::validate_store_url("store.url", self.store_url())?;
        validation::validate_port_range(
            "pool.tenant_port_base",
            self.tenant_port_base(),
            self.max_tenants(),
        )?;
        if let Some(path) = self.server.log_path.as_deref().filter(|p| !p.is_empty()) {
            validation::validate_path("server.log_path", path)?;
        }
        Ok(())
    }
}
