// 投資人報告與董事會季報

use crate::core::advisor::{funding_readiness, FundingReadiness};
use crate::core::benchmarks::{fundraising_benchmark, FundraisingBenchmark};
use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::{quarter_of, ActualData, Company, MonthlyPlan, Stage};
use crate::utils::error::{MetricsError, Result};
use crate::utils::math::{round_to, safe_divide};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Investor report ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseOfFunds {
    pub category: String,
    pub share: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingAsk {
    pub amount: f64,
    pub use_of_funds: Vec<UseOfFunds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentMemo {
    pub ownership: f64,
    pub exit_value: f64,
    pub proceeds: f64,
    pub moic: f64,
    pub irr: f64,
    pub recommendation: String,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestorReport {
    pub company_name: String,
    pub currency: String,
    pub round: Stage,
    pub generated_on: NaiveDate,
    pub snapshot: MetricsSnapshot,
    pub valuation: Valuation,
    pub funding_ask: FundingAsk,
    pub benchmark: Option<FundraisingBenchmark>,
    pub readiness: FundingReadiness,
    pub recommendations: Vec<String>,
    pub memo: InvestmentMemo,
}

/// 以 ARR 倍數估值，成長率越高倍數越高；區間為中位數的 0.7 到 1.3 倍
pub fn estimate_valuation(snapshot: &MetricsSnapshot, round: Stage) -> Valuation {
    let arr = snapshot.arr;
    let growth_pct = snapshot.monthly_growth_rate * 100.0;

    let (mid, method) = match round {
        Stage::PreSeed => ((arr * 10.0).max(1_000_000.0), "10x ARR, 1M floor"),
        Stage::Seed if arr > 0.0 => (arr * (10.0 + growth_pct.min(50.0) / 10.0), "ARR multiple adjusted for growth"),
        Stage::Seed => (3_000_000.0, "Pre-revenue seed benchmark"),
        Stage::SeriesA if arr > 0.0 => {
            let growth_factor = (growth_pct / 20.0).min(2.5);
            (arr * 8.0 * growth_factor * 1.2 * 1.1, "8x ARR adjusted for growth, retention and margin")
        }
        Stage::SeriesA => (8_000_000.0, "Series A benchmark"),
        _ => (arr * 8.0, "8x ARR"),
    };

    Valuation {
        low: mid * 0.7,
        mid,
        high: mid * 1.3,
        method: method.to_string(),
    }
}

/// 一百萬以下取整到 5 萬，以上取整到 25 萬
fn round_ask(amount: f64) -> f64 {
    let step = if amount < 1_000_000.0 { 50_000.0 } else { 250_000.0 };
    (amount / step).round() * step
}

pub fn funding_ask(snapshot: &MetricsSnapshot, round: Stage) -> FundingAsk {
    let burn = snapshot.burn_rate;
    let cash = snapshot.cash_balance;
    let raw = match round {
        Stage::PreSeed => (burn * 18.0 - cash).max(500_000.0),
        Stage::Seed => (burn * 24.0 - cash).max(2_000_000.0),
        Stage::SeriesA => (burn * 30.0 - cash + snapshot.arr * 2.0).max(8_000_000.0),
        _ => (burn * 18.0 - cash).max(1_000_000.0),
    };
    let amount = round_ask(raw);

    let use_of_funds = [
        ("Product development", 0.40),
        ("Sales and marketing", 0.35),
        ("Team and operations", 0.15),
        ("Reserve", 0.10),
    ]
    .into_iter()
    .map(|(category, share)| UseOfFunds {
        category: category.to_string(),
        share,
        amount: amount * share,
    })
    .collect();

    FundingAsk { amount, use_of_funds }
}

pub fn pitch_recommendations(snapshot: &MetricsSnapshot, valuation: &Valuation) -> Vec<String> {
    let mut recs = Vec::new();
    if snapshot.cac > 0.0 && snapshot.ltv_cac_ratio < 3.0 {
        recs.push("Improve unit economics before pitching: LTV/CAC is below 3".to_string());
    }
    if snapshot.monthly_growth_rate < 0.1 {
        recs.push("Show faster growth: monthly growth is below 10%".to_string());
    }
    if snapshot.runway_months.is_some_and(|m| m < 6.0) {
        recs.push("Start fundraising now: runway is under 6 months".to_string());
    }
    if valuation.mid > 10_000_000.0 && snapshot.mrr < 50_000.0 {
        recs.push("Valuation is high for current revenue; be ready to justify it".to_string());
    }
    recs.extend(
        [
            "Lead with traction and growth",
            "Show a clear path to the next round",
            "Explain the use of funds by milestone",
            "Highlight the team's domain expertise",
            "Prepare a data room before the first meeting",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    recs
}

/// 五年後以 8 倍 ARR 退場，ARR 以目前月成長率複利
pub fn investment_memo(snapshot: &MetricsSnapshot, valuation: &Valuation, amount: f64) -> InvestmentMemo {
    let ownership = safe_divide(amount, valuation.mid, 0.0);
    let exit_value = snapshot.arr * (1.0 + snapshot.monthly_growth_rate).powi(60) * 8.0;
    let proceeds = exit_value * ownership;
    let moic = safe_divide(proceeds, amount, 0.0);
    let irr = if moic > 0.0 { moic.powf(1.0 / 5.0) - 1.0 } else { -1.0 };

    let recommendation = if moic >= 10.0 {
        "Strong Invest"
    } else if moic >= 5.0 {
        "Invest"
    } else if moic >= 3.0 {
        "Consider"
    } else {
        "Pass"
    };

    let mut risks = Vec::new();
    if snapshot.runway_months.is_some_and(|m| m < 6.0) {
        risks.push("Short runway before the round closes".to_string());
    }
    if snapshot.cac > 0.0 && snapshot.ltv_cac_ratio < 3.0 {
        risks.push("Unit economics do not yet support scaling".to_string());
    }

    InvestmentMemo {
        ownership,
        exit_value,
        proceeds,
        moic: round_to(moic, 2),
        irr: round_to(irr, 4),
        recommendation: recommendation.to_string(),
        risks,
    }
}

pub fn investor_report(company: &Company, snapshot: &MetricsSnapshot, round: Stage, today: NaiveDate) -> InvestorReport {
    let valuation = estimate_valuation(snapshot, round);
    let ask = funding_ask(snapshot, round);
    let memo = investment_memo(snapshot, &valuation, ask.amount);

    tracing::info!(
        "📈 {} {} round: ask {:.0}, valuation {:.0} ({})",
        company.name,
        round.display_name(),
        ask.amount,
        valuation.mid,
        memo.recommendation
    );

    InvestorReport {
        company_name: company.name.clone(),
        currency: company.currency.clone(),
        round,
        generated_on: today,
        snapshot: snapshot.clone(),
        recommendations: pitch_recommendations(snapshot, &valuation),
        benchmark: fundraising_benchmark(round),
        readiness: funding_readiness(snapshot, today),
        valuation,
        funding_ask: ask,
        memo,
    }
}

// ── Board report ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuarterActuals {
    pub months: usize,
    pub starting_mrr: f64,
    pub ending_mrr: f64,
    pub average_mrr: f64,
    pub quarterly_growth: f64,
    pub total_revenue: f64,
    pub new_customers: u32,
    pub churned_customers: u32,
    pub net_new_customers: i64,
    /// 流失客戶數相對新客戶數
    pub churn_to_new_ratio: f64,
    pub total_costs: f64,
    pub total_burn: f64,
    pub average_burn: f64,
    pub ending_cash: f64,
    pub cac: f64,
    /// 每單位行銷支出帶來的新增 MRR
    pub marketing_efficiency: f64,
}

impl QuarterActuals {
    pub fn from_months(months: &[&ActualData]) -> Self {
        let (Some(first), Some(last)) = (months.first(), months.last()) else {
            return Self::default();
        };
        let n = months.len() as f64;
        let sum = |f: fn(&ActualData) -> f64| months.iter().map(|a| f(a)).sum::<f64>();

        let new_customers: u32 = months.iter().map(|a| a.figures.new_customers).sum();
        let churned_customers: u32 = months.iter().map(|a| a.figures.churned_customers).sum();
        let marketing = sum(|a| a.figures.marketing_spend);
        let total_burn = sum(|a| a.figures.burn_rate);

        Self {
            months: months.len(),
            starting_mrr: first.figures.mrr,
            ending_mrr: last.figures.mrr,
            average_mrr: sum(|a| a.figures.mrr) / n,
            quarterly_growth: safe_divide(last.figures.mrr - first.figures.mrr, first.figures.mrr, 0.0),
            total_revenue: sum(|a| a.figures.total_revenue),
            new_customers,
            churned_customers,
            net_new_customers: new_customers as i64 - churned_customers as i64,
            churn_to_new_ratio: safe_divide(churned_customers as f64, new_customers as f64, 0.0),
            total_costs: sum(|a| a.figures.total_costs),
            total_burn,
            average_burn: total_burn / n,
            ending_cash: last.figures.cash_balance,
            cac: safe_divide(marketing, new_customers as f64, 0.0),
            marketing_efficiency: safe_divide(last.figures.mrr - first.figures.mrr, marketing, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceScore {
    pub score: u32,
    pub max_score: u32,
    pub rating: String,
}

pub fn performance_score(q: &QuarterActuals) -> PerformanceScore {
    let growth = if q.quarterly_growth >= 0.3 {
        3
    } else if q.quarterly_growth >= 0.15 {
        2
    } else if q.quarterly_growth >= 0.0 {
        1
    } else {
        0
    };
    let customers = if q.net_new_customers >= 100 {
        3
    } else if q.net_new_customers >= 50 {
        2
    } else if q.net_new_customers > 0 {
        1
    } else {
        0
    };
    let burn = if q.average_burn <= 50_000.0 {
        3
    } else if q.average_burn <= 100_000.0 {
        2
    } else if q.average_burn <= 200_000.0 {
        1
    } else {
        0
    };

    let score = growth + customers + burn;
    let rating = match score {
        8.. => "Excellent",
        6..=7 => "Good",
        4..=5 => "Satisfactory",
        _ => "Needs Improvement",
    };
    PerformanceScore {
        score,
        max_score: 9,
        rating: rating.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanComparison {
    pub months_compared: usize,
    pub planned_revenue: f64,
    pub actual_revenue: f64,
    pub revenue_variance: f64,
    pub planned_costs: f64,
    pub actual_costs: f64,
    pub cost_variance: f64,
    pub achievements: Vec<String>,
    pub improvement_areas: Vec<String>,
}

/// 只比較計畫與實際都有的月份，差距超過 10% 才列入
pub fn compare_with_plan(months: &[&ActualData], plans: &[MonthlyPlan]) -> Option<PlanComparison> {
    let matched: Vec<(&ActualData, &MonthlyPlan)> = months
        .iter()
        .filter_map(|a| plans.iter().find(|p| p.period() == a.period()).map(|p| (*a, p)))
        .collect();
    if matched.is_empty() {
        return None;
    }

    let planned_revenue: f64 = matched.iter().map(|(_, p)| p.figures.total_revenue).sum();
    let actual_revenue: f64 = matched.iter().map(|(a, _)| a.figures.total_revenue).sum();
    let planned_costs: f64 = matched.iter().map(|(_, p)| p.figures.total_costs).sum();
    let actual_costs: f64 = matched.iter().map(|(a, _)| a.figures.total_costs).sum();
    let revenue_variance = safe_divide(actual_revenue - planned_revenue, planned_revenue, 0.0);
    let cost_variance = safe_divide(actual_costs - planned_costs, planned_costs, 0.0);

    let mut achievements = Vec::new();
    let mut improvement_areas = Vec::new();
    if revenue_variance >= 0.1 {
        achievements.push(format!("Revenue {:.1}% above plan", revenue_variance * 100.0));
    } else if revenue_variance <= -0.1 {
        improvement_areas.push(format!("Revenue {:.1}% below plan", -revenue_variance * 100.0));
    }
    if cost_variance >= 0.1 {
        improvement_areas.push(format!("Costs {:.1}% above plan", cost_variance * 100.0));
    } else if cost_variance <= -0.1 {
        achievements.push(format!("Costs {:.1}% below plan", -cost_variance * 100.0));
    }

    Some(PlanComparison {
        months_compared: matched.len(),
        planned_revenue,
        actual_revenue,
        revenue_variance,
        planned_costs,
        actual_costs,
        cost_variance,
        achievements,
        improvement_areas,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterChange {
    pub mrr_change: f64,
    pub revenue_change: f64,
    pub net_customers_change: i64,
    pub burn_change: f64,
}

pub fn compare_with_previous(current: &QuarterActuals, previous: &QuarterActuals) -> QuarterChange {
    QuarterChange {
        mrr_change: safe_divide(current.ending_mrr - previous.ending_mrr, previous.ending_mrr, 0.0),
        revenue_change: safe_divide(current.total_revenue - previous.total_revenue, previous.total_revenue, 0.0),
        net_customers_change: current.net_new_customers - previous.net_new_customers,
        burn_change: safe_divide(current.average_burn - previous.average_burn, previous.average_burn, 0.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategicInsights {
    pub growth_trajectory: String,
    pub market_position: String,
    pub advantages: Vec<String>,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
}

pub fn strategic_insights(q: &QuarterActuals, churn_rate: f64, monthly_growth: f64) -> StrategicInsights {
    let growth_trajectory = if q.quarterly_growth >= 0.3 {
        "Hypergrowth"
    } else if q.quarterly_growth >= 0.15 {
        "Strong growth"
    } else if q.quarterly_growth >= 0.0 {
        "Moderate growth"
    } else {
        "Declining"
    };
    let market_position = if q.ending_mrr >= 100_000.0 {
        "Established player"
    } else if q.ending_mrr >= 50_000.0 {
        "Growing challenger"
    } else if q.ending_mrr >= 10_000.0 {
        "Emerging player"
    } else {
        "Early stage"
    };

    let mut advantages = Vec::new();
    if q.quarterly_growth >= 0.15 {
        advantages.push("Strong revenue momentum".to_string());
    }
    if q.net_new_customers > 0 && q.churn_to_new_ratio < 0.3 {
        advantages.push("Customer base growing with low churn".to_string());
    }

    let mut risks = Vec::new();
    if q.ending_cash < 100_000.0 {
        risks.push("Limited cash reserves".to_string());
    }
    if churn_rate > 0.1 {
        risks.push("High churn rate".to_string());
    }
    if monthly_growth < 0.1 {
        risks.push("Slowing growth".to_string());
    }

    let mut opportunities = vec!["Expand into adjacent customer segments".to_string()];
    if q.marketing_efficiency > 1.0 {
        opportunities.push("Scale marketing spend while efficiency holds".to_string());
    }
    opportunities.push("Upsell existing customers".to_string());

    StrategicInsights {
        growth_trajectory: growth_trajectory.to_string(),
        market_position: market_position.to_string(),
        advantages,
        risks,
        opportunities,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub title: String,
    pub owner: String,
    pub due: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardLook {
    pub next_quarter: String,
    pub revenue_target: f64,
    pub focus_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardReport {
    pub company_name: String,
    pub currency: String,
    pub year: i32,
    pub quarter: u32,
    pub actuals: QuarterActuals,
    pub performance: PerformanceScore,
    pub vs_plan: Option<PlanComparison>,
    pub vs_previous: Option<QuarterChange>,
    pub insights: StrategicInsights,
    pub action_items: Vec<BoardItem>,
    pub decisions: Vec<String>,
    pub forward_look: ForwardLook,
}

fn item(title: impl Into<String>, owner: &str, due: &str) -> BoardItem {
    BoardItem {
        title: title.into(),
        owner: owner.to_string(),
        due: due.to_string(),
    }
}

fn quarter_months(actuals: &[ActualData], year: i32, quarter: u32) -> Vec<&ActualData> {
    let mut months: Vec<&ActualData> = actuals
        .iter()
        .filter(|a| a.year == year && quarter_of(a.month_number) == quarter)
        .collect();
    months.sort_by_key(|a| a.period());
    months
}

fn previous_quarter(year: i32, quarter: u32) -> (i32, u32) {
    if quarter <= 1 {
        (year - 1, 4)
    } else {
        (year, quarter - 1)
    }
}

/// 季度必須至少有一個月的實際資料
pub fn board_report(
    company: &Company,
    actuals: &[ActualData],
    plans: &[MonthlyPlan],
    year: i32,
    quarter: u32,
) -> Result<BoardReport> {
    if !(1..=4).contains(&quarter) {
        return Err(MetricsError::invalid_input("quarter", quarter, "must be 1-4"));
    }
    let months = quarter_months(actuals, year, quarter);
    if months.is_empty() {
        return Err(MetricsError::ValidationError {
            message: format!("{} has no actuals for Q{} {}", company.name, quarter, year),
        });
    }

    let current = QuarterActuals::from_months(&months);
    let performance = performance_score(&current);
    let vs_plan = compare_with_plan(&months, plans);

    let (prev_year, prev_quarter) = previous_quarter(year, quarter);
    let previous_months = quarter_months(actuals, prev_year, prev_quarter);
    let vs_previous = (!previous_months.is_empty())
        .then(|| compare_with_previous(&current, &QuarterActuals::from_months(&previous_months)));

    let snapshot = MetricsSnapshot::from_actuals(company, &months.iter().map(|a| (*a).clone()).collect::<Vec<_>>());
    let insights = strategic_insights(&current, snapshot.monthly_churn_rate, snapshot.monthly_growth_rate);

    let mut action_items = Vec::new();
    if performance.rating == "Needs Improvement" {
        action_items.push(item("Run a strategic review of the business model", "CEO", "Within 30 days"));
    }
    if let Some(cmp) = &vs_plan {
        for area in &cmp.improvement_areas {
            action_items.push(item(format!("Address variance: {}", area), "CFO", "Next board meeting"));
        }
    }
    if snapshot.runway_months.is_some_and(|m| m < 12.0) {
        action_items.push(item("Extend runway through cost cuts or fundraising", "CEO", "Within 60 days"));
    }
    if snapshot.monthly_churn_rate > 0.05 {
        action_items.push(item("Launch a retention program", "Head of Customer Success", "Within 45 days"));
    }
    action_items.push(item("Update the 12-month financial plan", "CFO", "End of month"));
    action_items.push(item("Review key hires for next quarter", "CEO", "Next board meeting"));

    let mut decisions = Vec::new();
    if insights.growth_trajectory == "Declining" {
        decisions.push("Decide whether to pivot or refocus the product".to_string());
    }
    if insights.growth_trajectory == "Hypergrowth" {
        decisions.push("Approve additional growth investment".to_string());
    }
    if quarter == 4 {
        decisions.push("Approve next year's budget".to_string());
    }
    decisions.push("Confirm priorities for next quarter".to_string());

    let (next_year, next_quarter) = if quarter == 4 { (year + 1, 1) } else { (year, quarter + 1) };
    let forward_look = ForwardLook {
        next_quarter: format!("Q{} {}", next_quarter, next_year),
        revenue_target: current.ending_mrr * 1.3,
        focus_areas: vec![
            "Revenue growth".to_string(),
            "Customer retention".to_string(),
            "Operational efficiency".to_string(),
        ],
    };

    tracing::info!(
        "📊 Board report Q{} {} for {}: {} ({}/{})",
        quarter,
        year,
        company.name,
        performance.rating,
        performance.score,
        performance.max_score
    );

    Ok(BoardReport {
        company_name: company.name.clone(),
        currency: company.currency.clone(),
        year,
        quarter,
        actuals: current,
        performance,
        vs_plan,
        vs_previous,
        insights,
        action_items,
        decisions,
        forward_look,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MonthlyFigures;
    use approx::assert_relative_eq;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn snapshot(arr: f64, growth: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            mrr: arr / 12.0,
            arr,
            monthly_growth_rate: growth,
            burn_rate: 100_000.0,
            cash_balance: 500_000.0,
            runway_months: Some(5.0),
            cac: 1_000.0,
            ltv_cac_ratio: 2.0,
            gross_margin: 0.8,
            ..Default::default()
        }
    }

    fn actual(month: u32, mrr: f64, new: u32, churned: u32, burn: f64, cash: f64) -> ActualData {
        ActualData::new(
            1,
            2025,
            month,
            MonthlyFigures {
                mrr,
                total_revenue: mrr,
                new_customers: new,
                churned_customers: churned,
                total_customers: 50,
                marketing_spend: 10_000.0,
                total_costs: mrr + burn,
                burn_rate: burn,
                cash_balance: cash,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_valuation_by_round() {
        let pre = estimate_valuation(&snapshot(0.0, 0.0), Stage::PreSeed);
        assert_relative_eq!(pre.mid, 1_000_000.0);
        assert_relative_eq!(pre.low, 700_000.0);

        // 成長 20%，倍數 10 + 2
        let seed = estimate_valuation(&snapshot(600_000.0, 0.2), Stage::Seed);
        assert_relative_eq!(seed.mid, 7_200_000.0, max_relative = 1e-9);
        assert_relative_eq!(estimate_valuation(&snapshot(0.0, 0.0), Stage::Seed).mid, 3_000_000.0);

        // 成長 30%，倍數上限 2.5 之下為 1.5
        let a = estimate_valuation(&snapshot(1_000_000.0, 0.3), Stage::SeriesA);
        assert_relative_eq!(a.mid, 1_000_000.0 * 8.0 * 1.5 * 1.32, max_relative = 1e-9);

        assert_relative_eq!(estimate_valuation(&snapshot(1_000_000.0, 0.3), Stage::SeriesB).mid, 8_000_000.0);
    }

    #[test]
    fn test_funding_ask_rounding() {
        // 100k * 18 - 500k = 1.3M
        let ask = funding_ask(&snapshot(0.0, 0.0), Stage::PreSeed);
        assert_relative_eq!(ask.amount, 1_250_000.0);
        assert_eq!(ask.use_of_funds.len(), 4);
        let total: f64 = ask.use_of_funds.iter().map(|u| u.amount).sum();
        assert_relative_eq!(total, ask.amount, max_relative = 1e-9);

        let mut s = snapshot(0.0, 0.0);
        s.burn_rate = 30_000.0;
        s.cash_balance = 20_000.0;
        // 540k - 20k = 520k 取整到 50k
        assert_relative_eq!(funding_ask(&s, Stage::PreSeed).amount, 500_000.0);
        assert_relative_eq!(funding_ask(&s, Stage::Seed).amount, 2_000_000.0);
    }

    #[test]
    fn test_pitch_recommendations() {
        let s = snapshot(120_000.0, 0.05);
        let v = estimate_valuation(&s, Stage::Seed);
        let recs = pitch_recommendations(&s, &v);
        assert!(recs[0].contains("LTV/CAC"));
        assert!(recs[1].contains("growth"));
        assert!(recs[2].contains("runway"));
        assert_eq!(recs.len(), 8);
    }

    #[test]
    fn test_investment_memo() {
        let s = snapshot(0.0, 0.0);
        let v = Valuation {
            low: 0.0,
            mid: 4_000_000.0,
            high: 0.0,
            method: String::new(),
        };
        let memo = investment_memo(&s, &v, 1_000_000.0);
        assert_relative_eq!(memo.ownership, 0.25);
        assert_relative_eq!(memo.moic, 0.0);
        assert_eq!(memo.recommendation, "Pass");
        assert_eq!(memo.risks.len(), 2);

        // ARR 1.2M 零成長：退場 9.6M，持股 25% 得 2.4M
        let mut s = snapshot(1_200_000.0, 0.0);
        s.runway_months = None;
        s.ltv_cac_ratio = 4.0;
        let memo = investment_memo(&s, &v, 1_000_000.0);
        assert_relative_eq!(memo.exit_value, 9_600_000.0);
        assert_relative_eq!(memo.moic, 2.4);
        assert!(memo.risks.is_empty());
    }

    #[test]
    fn test_investor_report_assembles_sections() {
        let company = Company::new("Acme", Stage::Seed);
        let report = investor_report(&company, &snapshot(600_000.0, 0.2), Stage::Seed, day());
        assert_eq!(report.company_name, "Acme");
        assert!(report.benchmark.is_some());
        assert_relative_eq!(report.funding_ask.amount, 2_000_000.0);
        assert_eq!(report.generated_on, day());
    }

    #[test]
    fn test_quarter_actuals() {
        let a = [
            actual(4, 40_000.0, 10, 2, 60_000.0, 900_000.0),
            actual(5, 46_000.0, 12, 3, 55_000.0, 845_000.0),
            actual(6, 52_000.0, 14, 1, 50_000.0, 795_000.0),
        ];
        let refs: Vec<&ActualData> = a.iter().collect();
        let q = QuarterActuals::from_months(&refs);
        assert_relative_eq!(q.quarterly_growth, 0.3);
        assert_eq!(q.new_customers, 36);
        assert_eq!(q.net_new_customers, 30);
        assert_relative_eq!(q.average_burn, 55_000.0);
        assert_relative_eq!(q.ending_cash, 795_000.0);
        assert_relative_eq!(q.cac, 30_000.0 / 36.0);
        assert_relative_eq!(q.marketing_efficiency, 0.4);

        // 成長 3 分，淨增 1 分，燒錢 2 分
        let score = performance_score(&q);
        assert_eq!(score.score, 6);
        assert_eq!(score.rating, "Good");
    }

    #[test]
    fn test_plan_comparison_flags_large_gaps() {
        let a = [actual(4, 40_000.0, 10, 2, 60_000.0, 900_000.0)];
        let refs: Vec<&ActualData> = a.iter().collect();
        let mut plan = MonthlyPlan::new(Some(1), 2025, 4);
        plan.figures.total_revenue = 50_000.0;
        plan.figures.total_costs = 100_000.0;

        let cmp = compare_with_plan(&refs, &[plan]).unwrap();
        assert_eq!(cmp.months_compared, 1);
        assert_relative_eq!(cmp.revenue_variance, -0.2);
        assert_eq!(cmp.improvement_areas, vec!["Revenue 20.0% below plan"]);
        assert!(cmp.achievements.is_empty());

        assert!(compare_with_plan(&refs, &[MonthlyPlan::new(Some(1), 2025, 7)]).is_none());
    }

    #[test]
    fn test_board_report() {
        let company = Company::new("Acme", Stage::Seed);
        let actuals = vec![
            actual(1, 30_000.0, 5, 1, 70_000.0, 1_100_000.0),
            actual(3, 36_000.0, 5, 1, 70_000.0, 960_000.0),
            actual(4, 40_000.0, 10, 2, 60_000.0, 900_000.0),
            actual(5, 46_000.0, 12, 3, 55_000.0, 845_000.0),
            actual(6, 52_000.0, 14, 1, 50_000.0, 795_000.0),
        ];

        let report = board_report(&company, &actuals, &[], 2025, 2).unwrap();
        assert_eq!(report.actuals.months, 3);
        assert!(report.vs_plan.is_none());
        let prev = report.vs_previous.as_ref().unwrap();
        assert_relative_eq!(prev.mrr_change, 16_000.0 / 36_000.0, max_relative = 1e-9);
        assert_eq!(report.insights.growth_trajectory, "Hypergrowth");
        assert_eq!(report.insights.market_position, "Growing challenger");
        assert!(report.decisions.contains(&"Approve additional growth investment".to_string()));
        assert_eq!(report.decisions.last().unwrap(), "Confirm priorities for next quarter");
        assert_eq!(report.forward_look.next_quarter, "Q3 2025");
        assert_relative_eq!(report.forward_look.revenue_target, 52_000.0 * 1.3);

        assert!(board_report(&company, &actuals, &[], 2025, 3).is_err());
        assert!(board_report(&company, &actuals, &[], 2025, 5).is_err());
    }
}
