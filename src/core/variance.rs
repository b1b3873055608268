use crate::core::runway::INFINITE_RUNWAY;
use crate::domain::model::{ActualData, MonthlyFigures, MonthlyPlan, RecordedVariance, Stage};
use crate::utils::math::{linear_slope, mean, safe_divide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 各類指標可容忍的偏差比例 (未乘階段係數)
pub fn base_threshold(metric: &str) -> f64 {
    match metric {
        "total_revenue" | "mrr" => 0.10,
        "new_customers" => 0.15,
        "cac" | "cac_payback_months" => 0.25,
        "churn_rate" => 0.30,
        "burn_rate" => 0.20,
        "ltv_cac_ratio" => 0.35,
        "runway" => 0.25,
        _ => 0.20,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    Low,
    Medium,
    High,
    Critical,
}

impl Significance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Significance::Low => "low",
            Significance::Medium => "medium",
            Significance::High => "high",
            Significance::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceDirection {
    Favorable,
    Unfavorable,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceCategory {
    Revenue,
    Costs,
    Efficiency,
    Cash,
}

struct TrackedMetric {
    name: &'static str,
    category: VarianceCategory,
    higher_is_better: bool,
    value: fn(&MonthlyFigures) -> f64,
}

const TRACKED: [TrackedMetric; 9] = [
    TrackedMetric {
        name: "total_revenue",
        category: VarianceCategory::Revenue,
        higher_is_better: true,
        value: |f| f.total_revenue,
    },
    TrackedMetric {
        name: "mrr",
        category: VarianceCategory::Revenue,
        higher_is_better: true,
        value: |f| f.mrr,
    },
    TrackedMetric {
        name: "new_customers",
        category: VarianceCategory::Revenue,
        higher_is_better: true,
        value: |f| f.new_customers as f64,
    },
    TrackedMetric {
        name: "total_costs",
        category: VarianceCategory::Costs,
        higher_is_better: false,
        value: |f| f.total_costs,
    },
    TrackedMetric {
        name: "burn_rate",
        category: VarianceCategory::Costs,
        higher_is_better: false,
        value: |f| f.burn_rate,
    },
    TrackedMetric {
        name: "runway",
        category: VarianceCategory::Cash,
        higher_is_better: true,
        value: |f| f.runway_months,
    },
    TrackedMetric {
        name: "ltv_cac_ratio",
        category: VarianceCategory::Efficiency,
        higher_is_better: true,
        value: |f| f.ltv_cac_ratio,
    },
    TrackedMetric {
        name: "cac_payback_months",
        category: VarianceCategory::Efficiency,
        higher_is_better: false,
        value: |f| f.cac_payback_months,
    },
    TrackedMetric {
        name: "gross_margin",
        category: VarianceCategory::Efficiency,
        higher_is_better: true,
        value: |f| f.gross_margin,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricVariance {
    pub metric: String,
    pub category: VarianceCategory,
    pub plan: f64,
    pub actual: f64,
    pub abs_variance: f64,
    pub pct_variance: f64,
    pub threshold_pct: f64,
    pub direction: VarianceDirection,
    pub significance: Significance,
}

impl MetricVariance {
    /// 正值代表表現優於計畫
    pub fn performance_pct(&self) -> f64 {
        match self.direction {
            VarianceDirection::Unfavorable => -self.pct_variance.abs(),
            _ => self.pct_variance.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthVariance {
    pub year: i32,
    pub month_number: u32,
    pub month_name: String,
    pub variances: Vec<MetricVariance>,
}

impl MonthVariance {
    pub fn get(&self, metric: &str) -> Option<&MetricVariance> {
        self.variances.iter().find(|v| v.metric == metric)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceSummary {
    pub total_variances: usize,
    pub by_significance: BTreeMap<String, usize>,
    pub favorable: usize,
    pub unfavorable: usize,
    pub worst_metrics: Vec<(String, f64)>,
    pub best_metrics: Vec<(String, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceTrend {
    pub trend: String,
    pub slope: f64,
    pub recent_average: f64,
    pub months_analyzed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceAlert {
    pub severity: Significance,
    pub kind: String,
    pub message: String,
    pub period: Option<(i32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceReport {
    pub stage: Stage,
    pub months: Vec<MonthVariance>,
    pub summary: VarianceSummary,
    pub trend: Option<VarianceTrend>,
    pub alerts: Vec<VarianceAlert>,
}

pub fn compare_metric(
    name: &str,
    category: VarianceCategory,
    higher_is_better: bool,
    plan: f64,
    actual: f64,
    stage: Stage,
) -> MetricVariance {
    let abs_variance = actual - plan;
    let pct_variance = if plan == 0.0 {
        if actual > 0.0 { 100.0 } else { 0.0 }
    } else {
        abs_variance / plan.abs() * 100.0
    };

    let direction = if abs_variance == 0.0 {
        VarianceDirection::Neutral
    } else if (abs_variance > 0.0) == higher_is_better {
        VarianceDirection::Favorable
    } else {
        VarianceDirection::Unfavorable
    };

    let threshold_pct = base_threshold(name) * 100.0 * stage.variance_multiplier();
    let magnitude = pct_variance.abs();
    let mut significance = if magnitude > threshold_pct * 2.0 {
        Significance::Critical
    } else if magnitude > threshold_pct * 1.5 {
        Significance::High
    } else if magnitude > threshold_pct {
        Significance::Medium
    } else {
        Significance::Low
    };

    // 跑道少掉超過 3 個月一律視為嚴重
    if name == "runway" && abs_variance < -3.0 {
        significance = if magnitude > 30.0 {
            Significance::Critical
        } else {
            significance.max(Significance::High)
        };
    }
    if name == "burn_rate" && pct_variance > threshold_pct {
        significance = significance.max(Significance::Medium);
    }

    MetricVariance {
        metric: name.to_string(),
        category,
        plan,
        actual,
        abs_variance,
        pct_variance,
        threshold_pct,
        direction,
        significance,
    }
}

pub fn compare_month(plan: &MonthlyPlan, actual: &ActualData, stage: Stage) -> MonthVariance {
    let variances = TRACKED
        .iter()
        .filter_map(|m| {
            let p = (m.value)(&plan.figures);
            let a = (m.value)(&actual.figures);
            if p == 0.0 && a == 0.0 {
                return None;
            }
            if m.name == "runway" && !runway_comparable(p, a) {
                return None;
            }
            Some(compare_metric(m.name, m.category, m.higher_is_better, p, a, stage))
        })
        .collect();

    MonthVariance {
        year: plan.year,
        month_number: plan.month_number,
        month_name: plan.month_name.clone(),
        variances,
    }
}

/// 任一邊為無限跑道 (999) 時百分比沒有意義
fn runway_comparable(plan: f64, actual: f64) -> bool {
    plan < INFINITE_RUNWAY && actual < INFINITE_RUNWAY
}

/// 依 (年, 月) 對齊計畫與實際並計算偏差
pub fn analyze(plans: &[MonthlyPlan], actuals: &[ActualData], stage: Stage) -> VarianceReport {
    let mut months: Vec<MonthVariance> = plans
        .iter()
        .filter_map(|plan| {
            actuals
                .iter()
                .find(|a| a.period() == plan.period())
                .map(|actual| compare_month(plan, actual, stage))
        })
        .collect();
    months.sort_by_key(|m| (m.year, m.month_number));

    tracing::debug!("📊 Variance analysis matched {} months", months.len());

    let summary = summarize(&months);
    let trend = trend(&months);
    let alerts = alerts(&months);

    VarianceReport {
        stage,
        months,
        summary,
        trend,
        alerts,
    }
}

pub fn summarize(months: &[MonthVariance]) -> VarianceSummary {
    let all: Vec<&MetricVariance> = months.iter().flat_map(|m| m.variances.iter()).collect();

    let mut by_significance = BTreeMap::new();
    for v in &all {
        *by_significance.entry(v.significance.as_str().to_string()).or_insert(0) += 1;
    }

    let mut per_metric: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for v in &all {
        per_metric.entry(v.metric.as_str()).or_default().push(v.performance_pct());
    }
    let mut ranked: Vec<(String, f64)> = per_metric
        .into_iter()
        .map(|(name, values)| (name.to_string(), mean(&values)))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let worst_metrics: Vec<(String, f64)> = ranked.iter().take(3).cloned().collect();
    let best_metrics: Vec<(String, f64)> = ranked.iter().rev().take(3).cloned().collect();

    VarianceSummary {
        total_variances: all.len(),
        by_significance,
        favorable: all
            .iter()
            .filter(|v| v.direction == VarianceDirection::Favorable)
            .count(),
        unfavorable: all
            .iter()
            .filter(|v| v.direction == VarianceDirection::Unfavorable)
            .count(),
        worst_metrics,
        best_metrics,
    }
}

/// 至少三個月才判斷趨勢
pub fn trend(months: &[MonthVariance]) -> Option<VarianceTrend> {
    if months.len() < 3 {
        return None;
    }

    let series: Vec<f64> = months
        .iter()
        .map(|m| {
            let unfavorable: Vec<f64> = m
                .variances
                .iter()
                .filter(|v| v.direction == VarianceDirection::Unfavorable)
                .map(|v| v.pct_variance.abs())
                .collect();
            mean(&unfavorable)
        })
        .collect();

    let slope = linear_slope(&series);
    let label = if slope < -1.0 {
        "improving"
    } else if slope > 1.0 {
        "worsening"
    } else {
        "stable"
    };

    Some(VarianceTrend {
        trend: label.to_string(),
        slope,
        recent_average: mean(&series[series.len() - 3..]),
        months_analyzed: series.len(),
    })
}

fn is_miss(month: &MonthVariance, metrics: &[&str]) -> bool {
    metrics.iter().any(|name| {
        month.get(name).is_some_and(|v| {
            v.direction == VarianceDirection::Unfavorable && v.significance >= Significance::Medium
        })
    })
}

pub fn alerts(months: &[MonthVariance]) -> Vec<VarianceAlert> {
    let mut alerts: Vec<VarianceAlert> = months
        .iter()
        .flat_map(|m| {
            m.variances
                .iter()
                .filter(|v| v.significance == Significance::Critical)
                .map(move |v| VarianceAlert {
                    severity: Significance::Critical,
                    kind: "critical_variance".to_string(),
                    message: format!(
                        "{} {}: {} is {:+.1}% vs plan",
                        m.month_name, m.year, v.metric, v.pct_variance
                    ),
                    period: Some((m.year, m.month_number)),
                })
        })
        .collect();

    let recent = &months[months.len().saturating_sub(3)..];
    let revenue_misses = recent.iter().filter(|m| is_miss(m, &["mrr", "total_revenue"])).count();
    if revenue_misses >= 2 {
        alerts.push(VarianceAlert {
            severity: Significance::High,
            kind: "revenue_trend".to_string(),
            message: format!("Revenue missed plan in {} of the last {} months", revenue_misses, recent.len()),
            period: None,
        });
    }

    let cost_overruns = recent
        .iter()
        .filter(|m| is_miss(m, &["total_costs", "burn_rate"]))
        .count();
    if cost_overruns >= 2 {
        alerts.push(VarianceAlert {
            severity: Significance::High,
            kind: "cost_trend".to_string(),
            message: format!("Costs exceeded plan in {} of the last {} months", cost_overruns, recent.len()),
            period: None,
        });
    }

    alerts
}

impl RecordedVariance {
    /// 以比例記錄實際相對計畫的偏差，計畫為 0 或跑道無限時記為 0
    pub fn compute(plan: &MonthlyFigures, actual: &MonthlyFigures) -> Self {
        let ratio = |p: f64, a: f64| safe_divide(a - p, p, 0.0);
        Self {
            mrr: ratio(plan.mrr, actual.mrr),
            burn_rate: ratio(plan.burn_rate, actual.burn_rate),
            runway: if runway_comparable(plan.runway_months, actual.runway_months) {
                ratio(plan.runway_months, actual.runway_months)
            } else {
                0.0
            },
            cac: ratio(plan.cac, actual.cac),
            new_customers: ratio(plan.new_customers as f64, actual.new_customers as f64),
        }
    }
}
