use crate::domain::model::{Benchmark, Direction, MetricCategory, Stage};
use crate::utils::math::{mean, safe_divide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

type Thresholds = [f64; 5]; // poor, average, good, excellent, target

fn row(
    metric: &str,
    category: MetricCategory,
    stage: Stage,
    t: Thresholds,
    unit: &str,
    direction: Direction,
    description: &str,
) -> Benchmark {
    Benchmark {
        metric_name: metric.to_string(),
        category,
        stage,
        poor: t[0],
        average: t[1],
        good: t[2],
        excellent: t[3],
        target: t[4],
        unit: unit.to_string(),
        direction,
        description: description.to_string(),
    }
}

fn pre_seed_table(stage: Stage) -> Vec<Benchmark> {
    use Direction::*;
    use MetricCategory::*;

    vec![
        row("mrr_growth_monthly", Growth, stage, [0.05, 0.10, 0.20, 0.30, 0.20], "ratio", HigherIsBetter, "Month over month MRR growth"),
        row("cac_payback_months", Efficiency, stage, [24.0, 18.0, 12.0, 9.0, 12.0], "months", LowerIsBetter, "Months of gross profit to recover CAC"),
        row("ltv_cac_ratio", Efficiency, stage, [1.5, 2.5, 3.5, 5.0, 3.5], "ratio", HigherIsBetter, "Lifetime value over acquisition cost"),
        row("burn_to_mrr_ratio", Profitability, stage, [3.0, 2.0, 1.5, 1.0, 1.5], "ratio", LowerIsBetter, "Net burn per unit of MRR"),
        row("gross_margin", Profitability, stage, [0.6, 0.7, 0.8, 0.9, 0.8], "ratio", HigherIsBetter, "Revenue left after cost of service"),
        row("monthly_churn_rate", Retention, stage, [0.10, 0.07, 0.05, 0.03, 0.05], "ratio", LowerIsBetter, "Share of customers lost per month"),
        row("net_revenue_retention", Retention, stage, [0.9, 0.95, 1.05, 1.15, 1.05], "ratio", HigherIsBetter, "Revenue kept from existing customers including expansion"),
        row("cac", Acquisition, stage, [50_000.0, 30_000.0, 20_000.0, 10_000.0, 20_000.0], "currency", LowerIsBetter, "Cost to acquire one customer"),
        row("website_conversion_rate", Acquisition, stage, [0.01, 0.02, 0.03, 0.05, 0.03], "ratio", HigherIsBetter, "Visitors converting to sign-ups"),
        row("revenue_per_employee", Team, stage, [500_000.0, 1_000_000.0, 2_000_000.0, 3_000_000.0, 2_000_000.0], "currency", HigherIsBetter, "Annualized revenue per team member"),
        row("runway_months", Profitability, stage, [3.0, 6.0, 12.0, 18.0, 12.0], "months", HigherIsBetter, "Months of cash at current burn"),
        row("product_market_fit_score", Growth, stage, [20.0, 40.0, 60.0, 80.0, 60.0], "score", HigherIsBetter, "Share of users who would be very disappointed without the product"),
    ]
}

fn override_thresholds(table: &mut [Benchmark], metric: &str, t: Thresholds) {
    if let Some(b) = table.iter_mut().find(|b| b.metric_name == metric) {
        b.poor = t[0];
        b.average = t[1];
        b.good = t[2];
        b.excellent = t[3];
        b.target = t[4];
    }
}

/// 各階段的基準表，Series B 以後沿用 Series A
pub fn stage_benchmarks(stage: Stage) -> Vec<Benchmark> {
    let mut table = pre_seed_table(stage);
    if stage == Stage::PreSeed {
        return table;
    }

    override_thresholds(&mut table, "mrr_growth_monthly", [0.10, 0.15, 0.25, 0.40, 0.25]);
    override_thresholds(&mut table, "cac_payback_months", [18.0, 12.0, 9.0, 6.0, 9.0]);
    override_thresholds(&mut table, "runway_months", [6.0, 9.0, 12.0, 18.0, 12.0]);
    if stage == Stage::Seed {
        return table;
    }

    override_thresholds(&mut table, "mrr_growth_monthly", [0.08, 0.12, 0.18, 0.25, 0.18]);
    override_thresholds(&mut table, "ltv_cac_ratio", [2.0, 3.0, 4.0, 5.0, 4.0]);
    table
}

pub fn find_benchmark(stage: Stage, metric: &str) -> Option<Benchmark> {
    stage_benchmarks(stage).into_iter().find(|b| b.metric_name == metric)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentLevel {
    Critical = 1,
    Warning = 2,
    Good = 3,
    Excellent = 4,
    Outstanding = 5,
}

impl AssessmentLevel {
    pub fn score(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAssessment {
    pub metric_name: String,
    pub category: MetricCategory,
    pub value: f64,
    pub level: AssessmentLevel,
    pub target: f64,
    /// 相對目標的差距，正值代表優於目標
    pub gap_to_target: f64,
}

fn at_least(direction: Direction, value: f64, threshold: f64) -> bool {
    match direction {
        Direction::HigherIsBetter => value >= threshold,
        Direction::LowerIsBetter => value <= threshold,
    }
}

fn signed_gap(direction: Direction, value: f64, reference: f64) -> f64 {
    let raw = safe_divide(value - reference, reference.abs(), 0.0);
    match direction {
        Direction::HigherIsBetter => raw,
        Direction::LowerIsBetter => -raw,
    }
}

pub fn assess_metric(benchmark: &Benchmark, value: f64) -> MetricAssessment {
    let d = benchmark.direction;
    let level = if at_least(d, value, benchmark.excellent) {
        AssessmentLevel::Outstanding
    } else if at_least(d, value, benchmark.good) {
        AssessmentLevel::Excellent
    } else if at_least(d, value, benchmark.average) {
        AssessmentLevel::Good
    } else if at_least(d, value, benchmark.poor) {
        AssessmentLevel::Warning
    } else {
        AssessmentLevel::Critical
    };

    MetricAssessment {
        metric_name: benchmark.metric_name.clone(),
        category: benchmark.category,
        value,
        level,
        target: benchmark.target,
        gap_to_target: signed_gap(d, value, benchmark.target),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAssessment {
    pub stage: Stage,
    pub overall_score: f64,
    pub category_scores: BTreeMap<MetricCategory, f64>,
    pub assessments: Vec<MetricAssessment>,
    pub recommendations: Vec<String>,
}

fn category_advice(category: MetricCategory) -> &'static str {
    match category {
        MetricCategory::Growth => "Growth lags the stage target: revisit acquisition channels and activation",
        MetricCategory::Efficiency => "Unit economics are weak: lower CAC or raise ARPU before scaling spend",
        MetricCategory::Profitability => "Burn is high relative to revenue: extend runway by trimming opex",
        MetricCategory::Retention => "Retention is below target: invest in onboarding and customer success",
        MetricCategory::Acquisition => "Acquisition is expensive: test cheaper channels and improve conversion",
        MetricCategory::Team => "Revenue per employee is low: slow hiring until revenue catches up",
    }
}

pub fn assess_company(stage: Stage, values: &BTreeMap<String, f64>) -> StageAssessment {
    let assessments: Vec<MetricAssessment> = stage_benchmarks(stage)
        .iter()
        .filter_map(|b| values.get(&b.metric_name).map(|v| assess_metric(b, *v)))
        .collect();

    let to_pct = |scores: &[f64]| safe_divide(scores.iter().sum(), scores.len() as f64 * 5.0, 0.0) * 100.0;

    let all_scores: Vec<f64> = assessments.iter().map(|a| a.level.score() as f64).collect();

    let mut by_category: BTreeMap<MetricCategory, Vec<f64>> = BTreeMap::new();
    for a in &assessments {
        by_category.entry(a.category).or_default().push(a.level.score() as f64);
    }
    let category_scores: BTreeMap<MetricCategory, f64> =
        by_category.iter().map(|(c, s)| (*c, to_pct(s.as_slice()))).collect();

    let mut weak: Vec<(MetricCategory, f64)> = category_scores
        .iter()
        .filter(|(_, score)| **score < 60.0)
        .map(|(c, s)| (*c, *s))
        .collect();
    weak.sort_by(|a, b| a.1.total_cmp(&b.1));

    StageAssessment {
        stage,
        overall_score: to_pct(all_scores.as_slice()),
        category_scores,
        assessments,
        recommendations: weak
            .into_iter()
            .take(5)
            .map(|(c, _)| category_advice(c).to_string())
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub metric_name: String,
    pub value: f64,
    pub level: String,
    pub score: f64,
    pub gap_vs_good: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkComparison {
    pub stage: Stage,
    pub rows: Vec<ComparisonRow>,
    pub overall_score: f64,
    pub performance: String,
}

pub fn compare_with_benchmarks(values: &BTreeMap<String, f64>, stage: Stage) -> BenchmarkComparison {
    let rows: Vec<ComparisonRow> = stage_benchmarks(stage)
        .iter()
        .filter_map(|b| {
            let value = *values.get(&b.metric_name)?;
            let (level, score) = if at_least(b.direction, value, b.excellent) {
                ("excellent", 100.0)
            } else if at_least(b.direction, value, b.good) {
                ("great", 80.0)
            } else if at_least(b.direction, value, b.average) {
                ("good", 60.0)
            } else {
                ("below_good", 40.0)
            };
            Some(ComparisonRow {
                metric_name: b.metric_name.clone(),
                value,
                level: level.to_string(),
                score,
                gap_vs_good: signed_gap(b.direction, value, b.good),
            })
        })
        .collect();

    let scores: Vec<f64> = rows.iter().map(|r| r.score).collect();
    let overall = mean(&scores);
    let performance = if overall >= 90.0 {
        "excellent"
    } else if overall >= 75.0 {
        "great"
    } else if overall >= 60.0 {
        "good"
    } else if overall >= 50.0 {
        "fair"
    } else {
        "needs_improvement"
    };

    BenchmarkComparison {
        stage,
        rows,
        overall_score: overall,
        performance: performance.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundraisingBenchmark {
    pub stage: Stage,
    pub typical_round_size: f64,
    pub valuation_range: String,
    pub investor_types: Vec<String>,
    pub key_metrics: Vec<String>,
    pub expected_milestones: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn fundraising(
    stage: Stage,
    round: f64,
    valuation: &str,
    investors: &[&str],
    metrics: &[&str],
    milestones: &[&str],
) -> FundraisingBenchmark {
    FundraisingBenchmark {
        stage,
        typical_round_size: round,
        valuation_range: valuation.to_string(),
        investor_types: strings(investors),
        key_metrics: strings(metrics),
        expected_milestones: strings(milestones),
    }
}

pub fn fundraising_benchmark(stage: Stage) -> Option<FundraisingBenchmark> {
    let benchmark = match stage {
        Stage::PreSeed => fundraising(
            stage,
            500_000.0,
            "1-3M",
            &["Angels", "Pre-seed funds", "Accelerators"],
            &["Team", "Idea", "Market size"],
            &["Prototype", "Early traction", "Founder-market fit"],
        ),
        Stage::Seed => fundraising(
            stage,
            2_000_000.0,
            "5-10M",
            &["Seed funds", "Micro VCs", "Angel groups"],
            &["MRR", "Growth rate", "Unit economics"],
            &["Product-market fit", "Repeatable sales", "Early team"],
        ),
        Stage::SeriesA => fundraising(
            stage,
            8_000_000.0,
            "15-30M",
            &["VCs", "Growth funds"],
            &["ARR", "Net revenue retention", "CAC payback"],
            &["Scalable growth", "Strong team", "Clear path to Series B"],
        ),
        Stage::SeriesB => fundraising(
            stage,
            20_000_000.0,
            "50-100M",
            &["Growth VCs", "Private equity"],
            &["Rule of 40", "Magic number", "Market leadership"],
            &["Market leadership", "Operational excellence", "Path to profitability"],
        ),
        _ => return None,
    };
    Some(benchmark)
}
