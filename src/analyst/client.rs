use crate::analyst::local::LocalAnalyst;
use crate::analyst::{build_prompt, extract_json};
use crate::config::toml_config::AnalystConfig;
use crate::domain::model::{AnalysisRequest, AnalysisResponse};
use crate::domain::ports::Analyst;
use crate::utils::error::{MetricsError, Result};
use crate::utils::validation::validate_required_field;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

const DEFAULT_TOKEN_TTL_SECS: u64 = 1800;
const TOKEN_REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub fallback_used: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: u64,
}

/// OAuth client-credentials 認證的 chat completion 分析者，失敗時改用本地分析
pub struct AnalystClient {
    config: AnalystConfig,
    http: Client,
    token: Mutex<Option<CachedToken>>,
    stats: Mutex<UsageStats>,
    fallback: LocalAnalyst,
}

impl AnalystClient {
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            token: Mutex::new(None),
            stats: Mutex::new(UsageStats::default()),
            fallback: LocalAnalyst::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.config.enabled && filled(&self.config.client_id) && filled(&self.config.client_secret)
    }

    pub async fn usage_stats(&self) -> UsageStats {
        *self.stats.lock().await
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let client_id = validate_required_field("analyst.client_id", &self.config.client_id)?;
        let client_secret = validate_required_field("analyst.client_secret", &self.config.client_secret)?;

        tracing::debug!("🔧 Requesting analyst access token");
        let response = self
            .http
            .post(&self.config.auth_url)
            .basic_auth(client_id, Some(client_secret))
            .header("RqUID", Uuid::new_v4().to_string())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("scope", self.config.scope.as_str())])
            .timeout(self.timeout())
            .send()
            .await?;

        tracing::debug!("📡 Token endpoint response status: {}", response.status());
        if !response.status().is_success() {
            return Err(MetricsError::AnalystError {
                message: format!("Token request failed with status: {}", response.status()),
            });
        }

        let body: TokenResponse = response.json().await?;
        let ttl = body
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });

        Ok(body.access_token)
    }

    /// 送出 prompt，回傳內容與 token 用量
    async fn complete(&self, prompt: &str) -> Result<(String, u64)> {
        let token = self.access_token().await?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .timeout(self.timeout())
            .send()
            .await?;

        tracing::debug!("📡 Chat completion response status: {}", response.status());
        if !response.status().is_success() {
            return Err(MetricsError::AnalystError {
                message: format!("API request failed with status: {}", response.status()),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| MetricsError::AnalystError {
                message: "Response contained no choices".to_string(),
            })?;

        Ok((content, tokens))
    }

    async fn fallback_response(
        &self,
        request: &AnalysisRequest,
        context: &Value,
        error: String,
        started: Instant,
    ) -> AnalysisResponse {
        self.stats.lock().await.fallback_used += 1;
        AnalysisResponse {
            success: true,
            analysis: self.fallback.local_analysis(request, context),
            error: Some(error),
            is_fallback: true,
            tokens_used: 0,
            processing_ms: started.elapsed().as_millis(),
        }
    }
}

#[async_trait]
impl Analyst for AnalystClient {
    async fn analyze(&self, request: &AnalysisRequest, context: &Value) -> AnalysisResponse {
        let started = Instant::now();
        self.stats.lock().await.total_requests += 1;

        if !self.is_configured() {
            tracing::info!("💡 Analyst credentials not configured, using local analysis");
            return self
                .fallback_response(request, context, "Analyst credentials not configured".to_string(), started)
                .await;
        }

        let prompt = build_prompt(request, context);
        match self.complete(&prompt).await {
            Ok((content, tokens)) => {
                {
                    let mut stats = self.stats.lock().await;
                    stats.successful_requests += 1;
                    stats.total_tokens += tokens;
                }

                let mut analysis = extract_json(&content);
                if let Value::Object(map) = &mut analysis {
                    map.insert("analysis_type".to_string(), request.analysis_type.as_str().into());
                    map.insert("generated_at".to_string(), Utc::now().to_rfc3339().into());
                    map.insert("ai_model".to_string(), self.config.model.clone().into());
                }
                tracing::info!("✅ Analysis completed ({} tokens)", tokens);

                AnalysisResponse {
                    success: true,
                    analysis,
                    error: None,
                    is_fallback: false,
                    tokens_used: tokens,
                    processing_ms: started.elapsed().as_millis(),
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ Analyst request failed, falling back to local analysis: {}", e);
                self.stats.lock().await.failed_requests += 1;
                self.fallback_response(request, context, e.to_string(), started).await
            }
        }
    }
}
