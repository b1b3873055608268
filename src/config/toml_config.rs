use crate::domain::model::PlanAssumptions;
use crate::utils::error::{MetricsError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, validate_range, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const EXPORT_FORMATS: [&str; 4] = ["csv", "json", "markdown", "html"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub analyst: AnalystConfig,
    pub planning: PlanAssumptions,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub backup_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data/saas_metrics.db".to_string(),
            backup_dir: "./backups".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalystConfig {
    pub enabled: bool,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
    pub base_url: String,
    pub auth_url: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub language: String,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_id: None,
            client_secret: None,
            scope: "GIGACHAT_API_PERS".to_string(),
            base_url: "https://gigachat.devices.sberbank.ru/api/v1".to_string(),
            auth_url: "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string(),
            model: "GigaChat".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_seconds: 30,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_path: String,
    pub formats: Vec<String>,
    pub bundle: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: "./exports".to_string(),
            formats: vec!["csv".to_string(), "json".to_string(), "markdown".to_string()],
            bundle: false,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 有指定檔案就載入，否則使用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                tracing::debug!("📁 Loading configuration from {}", p.display());
                Self::from_file(p)
            }
            None => Ok(Self::default()),
        }
    }

    /// 替換環境變數 (例如 ${GIGACHAT_CLIENT_SECRET})，未設定的保留原字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MetricsError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_path("database.path", &self.database.path)?;
        validate_path("database.backup_dir", &self.database.backup_dir)?;
        validate_path("export.output_path", &self.export.output_path)?;

        validate_url("analyst.base_url", &self.analyst.base_url)?;
        validate_url("analyst.auth_url", &self.analyst.auth_url)?;
        validate_non_empty_string("analyst.model", &self.analyst.model)?;
        validate_non_empty_string("analyst.scope", &self.analyst.scope)?;
        validate_range("analyst.temperature", self.analyst.temperature, 0.0, 2.0)?;
        if self.analyst.timeout_seconds == 0 {
            return Err(MetricsError::InvalidConfigValueError {
                field: "analyst.timeout_seconds".to_string(),
                value: "0".to_string(),
                reason: "Timeout must be at least one second".to_string(),
            });
        }

        for format in &self.export.formats {
            if !EXPORT_FORMATS.contains(&format.as_str()) {
                return Err(MetricsError::InvalidConfigValueError {
                    field: "export.formats".to_string(),
                    value: format.clone(),
                    reason: format!("Unsupported format. Valid formats: {}", EXPORT_FORMATS.join(", ")),
                });
            }
        }

        let rates = [
            ("planning.mrr_growth_rate", self.planning.mrr_growth_rate),
            ("planning.churn_rate", self.planning.churn_rate),
        ];
        for (field, value) in rates {
            validate_range(field, value, 0.0, 1.0)?;
        }

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
