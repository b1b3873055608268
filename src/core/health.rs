use crate::domain::model::ActualData;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub score: f64,
    pub level: String,
    pub period: Option<(i32, u32)>,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
}

impl HealthScore {
    fn no_data() -> Self {
        Self {
            score: 0.0,
            level: "no_data".to_string(),
            period: None,
            issues: vec!["No finalized actuals recorded yet".to_string()],
            strengths: Vec::new(),
        }
    }
}

/// 以最近一筆已定稿的實際資料評分
pub fn financial_health_score(actuals: &[ActualData]) -> HealthScore {
    let Some(latest) = actuals
        .iter()
        .filter(|a| a.is_finalized)
        .max_by_key(|a| a.period())
    else {
        return HealthScore::no_data();
    };

    let mut score: f64 = 100.0;
    let mut issues = Vec::new();
    let mut strengths = Vec::new();

    let runway = latest.figures.runway_months;
    if runway < 3.0 {
        score -= 30.0;
        issues.push(format!("Critical runway: {:.1} months", runway));
    } else if runway < 6.0 {
        score -= 20.0;
        issues.push(format!("Short runway: {:.1} months", runway));
    } else if runway < 12.0 {
        score -= 10.0;
        issues.push(format!("Runway under a year: {:.1} months", runway));
    } else if runway >= 18.0 {
        score += 10.0;
        strengths.push("Comfortable runway".to_string());
    }

    let variance = latest.variance.unwrap_or_default();

    let mrr = variance.mrr;
    if mrr < -0.3 {
        score -= 25.0;
        issues.push(format!("MRR {:.0}% below plan", mrr * 100.0));
    } else if mrr < -0.2 {
        score -= 15.0;
        issues.push(format!("MRR {:.0}% below plan", mrr * 100.0));
    } else if mrr < -0.1 {
        score -= 5.0;
        issues.push(format!("MRR slightly below plan ({:.0}%)", mrr * 100.0));
    } else if mrr > 0.2 {
        score += 10.0;
        strengths.push(format!("MRR {:.0}% ahead of plan", mrr * 100.0));
    }

    let burn = variance.burn_rate;
    if burn > 0.3 {
        score -= 20.0;
        issues.push(format!("Burn {:.0}% over plan", burn * 100.0));
    } else if burn > 0.2 {
        score -= 10.0;
        issues.push(format!("Burn {:.0}% over plan", burn * 100.0));
    } else if burn < -0.2 {
        score += 5.0;
        strengths.push("Burn well under plan".to_string());
    }

    let cac = variance.cac;
    if cac > 0.4 {
        score -= 15.0;
        issues.push(format!("CAC {:.0}% over plan", cac * 100.0));
    } else if cac > 0.2 {
        score -= 8.0;
        issues.push(format!("CAC {:.0}% over plan", cac * 100.0));
    } else if cac < -0.2 {
        score += 5.0;
        strengths.push("Efficient customer acquisition".to_string());
    }

    let new_customers = variance.new_customers;
    if new_customers < -0.3 {
        score -= 10.0;
        issues.push("New customer acquisition far below plan".to_string());
    } else if new_customers < -0.1 {
        score -= 5.0;
        issues.push("New customer acquisition below plan".to_string());
    } else if new_customers > 0.2 {
        score += 5.0;
        strengths.push("Customer acquisition ahead of plan".to_string());
    }

    let score = score.clamp(0.0, 100.0);
    let level = if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else if score >= 40.0 {
        "fair"
    } else {
        "poor"
    };

    HealthScore {
        score,
        level: level.to_string(),
        period: Some(latest.period()),
        issues,
        strengths,
    }
}
