// AI 分析：遠端 chat completion 客戶端與本地規則式備援

pub mod client;
pub mod local;

pub use client::{AnalystClient, UsageStats};
pub use local::LocalAnalyst;

use crate::core::benchmarks::BenchmarkComparison;
use crate::core::data_quality::ValidationReport;
use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::{ActualData, AnalysisRequest, AnalysisType, Company};
use crate::utils::math::mean;
use serde_json::{json, Value};

/// 組出送給分析者的 JSON 脈絡
pub fn build_context(
    company: &Company,
    snapshot: &MetricsSnapshot,
    comparison: &BenchmarkComparison,
    actuals: &[ActualData],
    quality: &ValidationReport,
) -> Value {
    let mrr: Vec<f64> = actuals.iter().map(|a| a.figures.mrr).collect();
    let burn: Vec<f64> = actuals.iter().map(|a| a.figures.burn_rate).collect();
    let period = |a: &ActualData| format!("{}-{:02}", a.year, a.month_number);

    json!({
        "company": {
            "name": company.name,
            "stage": company.stage.as_str(),
            "industry": company.industry,
            "currency": company.currency,
            "current_mrr": company.current_mrr,
            "customers": company.current_customers,
            "team_size": company.team_size,
            "cash_balance": company.cash_balance,
        },
        "metrics": snapshot,
        "benchmarks": {
            "overall_score": comparison.overall_score,
            "performance": comparison.performance,
            "rows": comparison.rows,
        },
        "actuals_summary": {
            "months": actuals.len(),
            "first_period": actuals.first().map(period),
            "last_period": actuals.last().map(period),
            "avg_mrr": mean(&mrr),
            "avg_burn": mean(&burn),
            "finalized": actuals.iter().filter(|a| a.is_finalized).count(),
        },
        "data_quality": {
            "score": quality.quality_score,
            "is_valid": quality.is_valid,
            "issues": quality.issues.len(),
        },
        "data_points": actuals.len(),
    })
}

fn instructions(analysis_type: AnalysisType) -> &'static str {
    match analysis_type {
        AnalysisType::FullBusinessAnalysis => {
            "Give a complete analysis of the business: executive summary, key findings, \
             financial insights, risk assessment and a prioritized action plan."
        }
        AnalysisType::FinancialHealth => {
            "Assess financial health: liquidity, burn efficiency, runway and unit economics. \
             Score the health from 0 to 100."
        }
        AnalysisType::GrowthRecommendations => {
            "Recommend concrete growth levers: acquisition channels, pricing, expansion revenue \
             and retention. Estimate the impact of each."
        }
        AnalysisType::RiskAnalysis => {
            "Identify the main business risks with probability, impact and mitigation for each."
        }
        AnalysisType::Forecast12m => {
            "Forecast MRR, customers, burn and cash for the next 12 months in optimistic, \
             base and pessimistic cases."
        }
        AnalysisType::CustomQuery => "Answer the question below using the company data.",
    }
}

pub fn build_prompt(request: &AnalysisRequest, context: &Value) -> String {
    let data = serde_json::to_string_pretty(context).unwrap_or_else(|_| context.to_string());
    let mut prompt = format!(
        "You are an experienced SaaS financial analyst.\n{}\n\nCompany data (JSON):\n{}\n",
        instructions(request.analysis_type),
        data
    );

    if let Some(query) = request.custom_query.as_deref().filter(|q| !q.trim().is_empty()) {
        prompt.push_str(&format!("\nQuestion: {}\n", query));
    }

    prompt.push_str(
        "\nReply with a single JSON object with the keys: executive_summary, key_findings, \
         financial_insights, risk_assessment, action_plan.",
    );
    if request.language == "ru" {
        prompt.push_str(" Write all text values in Russian.");
    }
    prompt
}

/// 從回覆中取出 JSON 物件；找不到時整段文字當作摘要
pub fn extract_json(text: &str) -> Value {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text.trim()) {
        return value;
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return value;
            }
        }
    }

    json!({
        "executive_summary": text.chars().take(500).collect::<String>(),
        "key_findings": [],
        "raw_response": text,
    })
}
