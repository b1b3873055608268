use crate::core::runway::INFINITE_RUNWAY;
use crate::domain::model::{AnalysisRequest, AnalysisResponse, AnalysisType};
use crate::domain::ports::Analyst;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;

/// 不連網的規則式分析，遠端服務失敗時使用
#[derive(Debug, Clone, Default)]
pub struct LocalAnalyst;

/// 分析用到的幾個數字，缺值時給保守預設
struct Signals {
    company: String,
    mrr: f64,
    burn_rate: f64,
    runway: f64,
    growth: f64,
    ltv_cac: f64,
    gross_margin: f64,
    data_points: u64,
}

impl Signals {
    fn from_context(context: &Value) -> Self {
        let metric = |key: &str| context["metrics"][key].as_f64();
        Self {
            company: context["company"]["name"]
                .as_str()
                .unwrap_or("The company")
                .to_string(),
            mrr: metric("mrr").unwrap_or(0.0),
            burn_rate: metric("burn_rate").unwrap_or(0.0),
            // null 代表現金流為正
            runway: metric("runway_months").unwrap_or(INFINITE_RUNWAY),
            growth: metric("monthly_growth_rate").unwrap_or(0.0),
            ltv_cac: metric("ltv_cac_ratio").unwrap_or(0.0),
            gross_margin: metric("gross_margin").unwrap_or(0.0),
            data_points: context["data_points"].as_u64().unwrap_or(0),
        }
    }

    fn runway_text(&self) -> String {
        if self.runway >= INFINITE_RUNWAY {
            "unlimited".to_string()
        } else {
            format!("{:.1} months", self.runway)
        }
    }
}

impl LocalAnalyst {
    pub fn new() -> Self {
        Self
    }

    pub fn local_analysis(&self, request: &AnalysisRequest, context: &Value) -> Value {
        let s = Signals::from_context(context);

        let mut analysis = json!({
            "executive_summary": executive_summary(&s),
            "key_findings": key_findings(&s),
            "financial_insights": financial_insights(&s),
            "risk_assessment": risk_assessment(&s),
            "action_plan": action_plan(&s),
            "analysis_type": request.analysis_type.as_str(),
            "generated_at": Utc::now().to_rfc3339(),
            "source": "local_rules",
        });

        if request.analysis_type == AnalysisType::CustomQuery {
            let query = request.custom_query.as_deref().unwrap_or_default();
            analysis["custom_query_response"] = json!(custom_query_response(query, &s));
        }
        analysis
    }
}

fn executive_summary(s: &Signals) -> String {
    let headline = if s.runway < 6.0 {
        "needs immediate attention: runway is short"
    } else if s.growth < 0.10 {
        "is stable, but growth is below the optimal range"
    } else {
        "is stable with healthy growth"
    };
    format!(
        "{} {}. MRR {:.0}, monthly growth {:.1}%, runway {}.",
        s.company,
        headline,
        s.mrr,
        s.growth * 100.0,
        s.runway_text()
    )
}

fn key_findings(s: &Signals) -> Vec<String> {
    let mut findings = Vec::new();

    if s.runway < 6.0 {
        findings.push(format!("Critical runway of {}", s.runway_text()));
    } else if s.runway < 12.0 {
        findings.push(format!("Runway of {} is under a year", s.runway_text()));
    }

    if s.growth < 0.05 {
        findings.push(format!("Slow monthly growth of {:.1}%", s.growth * 100.0));
    } else if s.growth > 0.20 {
        findings.push(format!("Strong monthly growth of {:.1}%", s.growth * 100.0));
    }

    if s.ltv_cac > 0.0 && s.ltv_cac < 3.0 {
        findings.push(format!("LTV/CAC of {:.1} is below the 3x target", s.ltv_cac));
    }

    if s.data_points < 3 {
        findings.push("Few months of actual data, conclusions are preliminary".to_string());
    }

    if findings.is_empty() {
        findings.push("Key metrics are within normal ranges".to_string());
    }
    findings
}

fn financial_insights(s: &Signals) -> Value {
    json!({
        "mrr": s.mrr,
        "burn_rate": s.burn_rate,
        "runway": s.runway_text(),
        "gross_margin_pct": s.gross_margin * 100.0,
        "ltv_cac_ratio": s.ltv_cac,
        "burn_multiple": if s.mrr > 0.0 { s.burn_rate / s.mrr } else { 0.0 },
    })
}

fn risk_assessment(s: &Signals) -> Vec<Value> {
    let mut risks = Vec::new();

    if s.runway < 3.0 {
        risks.push(json!({"risk": "Cash runs out within a quarter", "level": "critical"}));
    } else if s.runway < 6.0 {
        risks.push(json!({"risk": "Short runway", "level": "high"}));
    }
    if s.growth < 0.05 {
        risks.push(json!({"risk": "Stalling growth", "level": "medium"}));
    }

    risks.push(json!({"risk": "Market competition", "level": "medium"}));
    risks.push(json!({"risk": "Team scaling", "level": "low"}));
    risks
}

fn action_plan(s: &Signals) -> Vec<String> {
    let mut plan = vec![
        "Optimize customer acquisition channels".to_string(),
        "Reduce churn with onboarding and success programs".to_string(),
        "Review pricing and expansion revenue".to_string(),
    ];
    if s.runway < 6.0 {
        plan.insert(0, "Start fundraising or cut costs immediately".to_string());
    }
    plan
}

fn custom_query_response(query: &str, s: &Signals) -> String {
    let q = query.to_lowercase();
    if q.contains("growth") || q.contains("рост") {
        format!(
            "Current monthly growth is {:.1}%. Focus on the best converting channel and on expansion revenue.",
            s.growth * 100.0
        )
    } else if q.contains("cost") || q.contains("затрат") || q.contains("расход") {
        format!(
            "Monthly burn is {:.0}. Review the largest cost lines first, usually salaries and marketing.",
            s.burn_rate
        )
    } else if q.contains("fund") || q.contains("инвест") {
        format!(
            "With a runway of {}, start fundraising at least 6 months before cash runs out.",
            s.runway_text()
        )
    } else {
        "Detailed answers need the remote analyst; see the findings above for the local view.".to_string()
    }
}

#[async_trait]
impl Analyst for LocalAnalyst {
    async fn analyze(&self, request: &AnalysisRequest, context: &Value) -> AnalysisResponse {
        let started = Instant::now();
        let analysis = self.local_analysis(request, context);
        tracing::debug!("💡 Local analysis generated for company {}", request.company_id);

        AnalysisResponse {
            success: true,
            analysis,
            error: None,
            is_fallback: true,
            tokens_used: 0,
            processing_ms: started.elapsed().as_millis(),
        }
    }
}
