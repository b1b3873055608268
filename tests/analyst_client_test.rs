use anyhow::Result;
use httpmock::prelude::*;
use saas_metrics::config::AnalystConfig;
use saas_metrics::domain::model::{AnalysisRequest, AnalysisType};
use saas_metrics::domain::ports::Analyst;
use saas_metrics::AnalystClient;
use serde_json::json;

fn config_for(server: &MockServer) -> AnalystConfig {
    AnalystConfig {
        enabled: true,
        client_id: Some("id".to_string()),
        client_secret: Some("secret".to_string()),
        base_url: server.url("/api/v1"),
        auth_url: server.url("/oauth"),
        timeout_seconds: 5,
        ..AnalystConfig::default()
    }
}

fn request(analysis_type: AnalysisType, query: Option<&str>) -> AnalysisRequest {
    AnalysisRequest {
        company_id: 1,
        analysis_type,
        custom_query: query.map(str::to_string),
        language: "en".to_string(),
    }
}

fn context() -> serde_json::Value {
    json!({
        "company": {"name": "Acme", "stage": "seed"},
        "metrics": {
            "mrr": 50000.0,
            "monthly_growth_rate": 0.12,
            "monthly_churn_rate": 0.03,
            "ltv_cac_ratio": 3.5,
            "runway_months": 14.0,
            "burn_rate": 40000.0
        }
    })
}

#[tokio::test]
async fn test_remote_analysis_with_cached_token() -> Result<()> {
    let server = MockServer::start();

    let oauth_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/oauth")
            .body_contains("scope=GIGACHAT_API_PERS");
        then.status(200).json_body(json!({
            "access_token": "test-token",
            "expires_in": 1800
        }));
    });

    let chat_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat/completions")
            .body_contains("\"model\":\"GigaChat\"");
        then.status(200).json_body(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Here is the result:\n{\"executive_summary\": \"Healthy growth\", \"key_findings\": [\"Churn is low\"]}"
                }
            }],
            "usage": {"total_tokens": 321}
        }));
    });

    let client = AnalystClient::new(config_for(&server));
    assert!(client.is_configured());

    let first = client.analyze(&request(AnalysisType::GrowthRecommendations, None), &context()).await;
    let second = client
        .analyze(&request(AnalysisType::CustomQuery, Some("How do we grow faster?")), &context()).await;

    assert!(first.success);
    assert!(!first.is_fallback);
    assert_eq!(first.tokens_used, 321);
    assert_eq!(first.analysis["executive_summary"], "Healthy growth");
    assert_eq!(first.analysis["analysis_type"], "growth_recommendations");
    assert_eq!(first.analysis["ai_model"], "GigaChat");
    assert!(first.analysis["generated_at"].is_string());
    assert!(!second.is_fallback);

    // token 只取一次
    oauth_mock.assert_hits(1);
    chat_mock.assert_hits(2);

    let stats = client.usage_stats().await;
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.successful_requests, 2);
    assert_eq!(stats.total_tokens, 642);
    assert_eq!(stats.fallback_used, 0);
    Ok(())
}

#[tokio::test]
async fn test_server_error_falls_back_to_local_analysis() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/oauth");
        then.status(200).json_body(json!({"access_token": "test-token"}));
    });
    let chat_mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(500).body("internal error");
    });

    let client = AnalystClient::new(config_for(&server));
    let response = client
        .analyze(&request(AnalysisType::CustomQuery, Some("growth ideas")), &context()).await;

    chat_mock.assert();
    assert!(response.success);
    assert!(response.is_fallback);
    assert!(response
        .error
        .as_deref()
        .is_some_and(|e| e.contains("API request failed with status: 500")));
    assert!(response.analysis["executive_summary"].is_string());
    assert!(response.analysis["custom_query_response"].is_string());

    let stats = client.usage_stats().await;
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.fallback_used, 1);
    Ok(())
}

#[tokio::test]
async fn test_rejected_credentials_fall_back() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(POST).path("/oauth");
        then.status(401).json_body(json!({"message": "unauthorized"}));
    });
    let chat_mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(200);
    });

    let client = AnalystClient::new(config_for(&server));
    let response = client.analyze(&request(AnalysisType::GrowthRecommendations, None), &context()).await;

    assert!(response.is_fallback);
    assert!(response.error.as_deref().is_some_and(|e| e.contains("401")));
    chat_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_disabled_client_never_calls_server() -> Result<()> {
    let server = MockServer::start();
    let oauth_mock = server.mock(|when, then| {
        when.method(POST).path("/oauth");
        then.status(200).json_body(json!({"access_token": "test-token"}));
    });

    let mut config = config_for(&server);
    config.enabled = false;
    let client = AnalystClient::new(config);
    let response = client.analyze(&request(AnalysisType::GrowthRecommendations, None), &context()).await;

    assert!(response.is_fallback);
    assert_eq!(response.tokens_used, 0);
    oauth_mock.assert_hits(0);
    Ok(())
}
