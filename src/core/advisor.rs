// 早期公司顧問：常見挑戰、常見錯誤、行動計畫、募資準備度與季度 OKR

use crate::core::runway::{runway_display, INFINITE_RUNWAY};
use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::Company;
use crate::utils::math::{round_to, safe_divide};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    Immediate,
    ShortTerm,
    MediumTerm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub name: String,
    pub category: String,
    pub severity: Priority,
    pub description: String,
    pub solutions: Vec<String>,
    pub success_metrics: Vec<String>,
    pub timeframe: Timeframe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mistake {
    pub mistake: String,
    pub description: String,
    pub impact: String,
    pub solution: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action: String,
    pub category: String,
    pub priority: Priority,
    pub timeframe: Timeframe,
    pub expected_outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub survival_risk: String,
    pub growth_risk: String,
    pub overall_risk: String,
    pub risk_factors: Vec<String>,
    pub mitigation_strategies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorReport {
    pub company_name: String,
    pub challenges: Vec<Challenge>,
    pub mistakes: Vec<Mistake>,
    pub action_plan: Vec<ActionItem>,
    pub risk: RiskProfile,
}

/// 公司的財務管理習慣，由資料庫內是否有計畫與實際資料得知
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanningPractice {
    pub has_financial_plan: bool,
    pub tracks_metrics: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct ChallengeTemplate {
    name: &'static str,
    category: &'static str,
    severity: Priority,
    description: &'static str,
    solutions: &'static [&'static str],
    success_metrics: &'static [&'static str],
    timeframe: Timeframe,
    applies: fn(&MetricsSnapshot) -> bool,
}

const CHALLENGES: [ChallengeTemplate; 4] = [
    ChallengeTemplate {
        name: "No product-market fit",
        category: "product",
        severity: Priority::Critical,
        description: "The product does not solve a real problem for enough customers",
        solutions: &[
            "Run 50+ interviews with potential customers",
            "Narrow the MVP to one key problem",
            "Use a jobs-to-be-done framing",
            "Test alternative value propositions",
        ],
        success_metrics: &["NPS > 30", "Monthly retention > 40%", "Word of mouth > 20% of new users"],
        timeframe: Timeframe::ShortTerm,
        applies: |s| s.monthly_growth_rate < 0.15 || s.monthly_churn_rate > 0.1 || s.net_revenue_retention < 1.0,
    },
    ChallengeTemplate {
        name: "Insufficient runway",
        category: "funding",
        severity: Priority::Critical,
        description: "Not enough cash to reach the next set of milestones",
        solutions: &[
            "Cut burn by 20-30%",
            "Focus only on revenue-generating work",
            "Approach angel investors",
            "Consider revenue-based financing",
        ],
        success_metrics: &["Runway > 12 months", "Burn < 1.5x MRR", "MRR growth > 20% monthly"],
        timeframe: Timeframe::Immediate,
        applies: |s| {
            s.runway_months.is_some_and(|m| m < 6.0) || s.cash_balance < s.burn_rate * 6.0
        },
    },
    ChallengeTemplate {
        name: "High CAC",
        category: "growth",
        severity: Priority::High,
        description: "Customer acquisition cost is too high for the business model",
        solutions: &[
            "Shift toward organic channels",
            "Launch a referral program",
            "Optimize the conversion funnel",
            "Improve onboarding",
        ],
        success_metrics: &["CAC payback < 9 months", "LTV/CAC > 3", "Organic traffic > 30%"],
        timeframe: Timeframe::MediumTerm,
        // CAC 為 0 表示尚無獲客資料
        applies: |s| s.cac > 0.0 && (s.cac_payback_months > 12.0 || s.ltv_cac_ratio < 3.0),
    },
    ChallengeTemplate {
        name: "Weak unit economics",
        category: "market",
        severity: Priority::High,
        description: "Margins are too thin for the model to scale",
        solutions: &[
            "Raise prices by 20-50%",
            "Reduce variable costs",
            "Improve retention",
            "Optimize infrastructure spend",
        ],
        success_metrics: &["Gross margin > 70%", "LTV > 3x CAC", "Net revenue retention > 100%"],
        timeframe: Timeframe::MediumTerm,
        applies: |s| s.gross_margin < 0.7,
    },
];

pub fn identify_challenges(snapshot: &MetricsSnapshot) -> Vec<Challenge> {
    let mut found: Vec<Challenge> = CHALLENGES
        .iter()
        .filter(|c| (c.applies)(snapshot))
        .map(|c| Challenge {
            name: c.name.to_string(),
            category: c.category.to_string(),
            severity: c.severity,
            description: c.description.to_string(),
            solutions: strings(c.solutions),
            success_metrics: strings(c.success_metrics),
            timeframe: c.timeframe,
        })
        .collect();
    found.sort_by_key(|c| c.severity);
    found
}

pub fn detect_mistakes(practice: PlanningPractice) -> Vec<Mistake> {
    let mut mistakes = Vec::new();
    if !practice.has_financial_plan || !practice.tracks_metrics {
        mistakes.push(Mistake {
            mistake: "No financial planning".to_string(),
            description: "Burn, runway and unit economics are not tracked against a plan".to_string(),
            impact: "Cash runs out unexpectedly and decisions are made in a hurry".to_string(),
            solution: "Keep a 12-month plan and record actuals every month".to_string(),
        });
    }
    mistakes
}

/// 最嚴重的兩個 critical 挑戰各取前兩個解法，再加上固定的例行工作
pub fn action_plan(challenges: &[Challenge]) -> Vec<ActionItem> {
    let mut plan: Vec<ActionItem> = challenges
        .iter()
        .filter(|c| c.severity == Priority::Critical)
        .take(2)
        .flat_map(|c| {
            c.solutions.iter().take(2).map(move |solution| ActionItem {
                action: solution.clone(),
                category: c.category.clone(),
                priority: Priority::Critical,
                timeframe: c.timeframe,
                expected_outcome: format!("Resolve: {}", c.name),
            })
        })
        .collect();

    plan.push(ActionItem {
        action: "Weekly metrics review".to_string(),
        category: "operations".to_string(),
        priority: Priority::High,
        timeframe: Timeframe::Immediate,
        expected_outcome: "Problems are caught within a week".to_string(),
    });
    plan.push(ActionItem {
        action: "Monthly 90-day planning".to_string(),
        category: "planning".to_string(),
        priority: Priority::Medium,
        timeframe: Timeframe::Immediate,
        expected_outcome: "Clear goals and priorities".to_string(),
    });
    plan
}

pub fn assess_risks(challenges: &[Challenge]) -> RiskProfile {
    let critical = challenges.iter().filter(|c| c.severity == Priority::Critical).count();
    let high = challenges.iter().filter(|c| c.severity == Priority::High).count();

    let mut risk = RiskProfile {
        survival_risk: "low".to_string(),
        growth_risk: "medium".to_string(),
        overall_risk: "medium".to_string(),
        risk_factors: Vec::new(),
        mitigation_strategies: Vec::new(),
    };

    if critical >= 2 {
        risk.survival_risk = "high".to_string();
        risk.overall_risk = "high".to_string();
        risk.risk_factors.push("Several critical challenges at once".to_string());
        risk.mitigation_strategies
            .push("Focus on the one or two most critical problems and cut costs".to_string());
    }
    if high >= 2 {
        risk.growth_risk = "high".to_string();
        risk.risk_factors.push("Several high-priority challenges".to_string());
        risk.mitigation_strategies
            .push("Prioritize fixes and sequence them in a phased roadmap".to_string());
    }

    risk.mitigation_strategies.extend(strings(&[
        "Prepare an emergency plan for cash flow problems",
        "Diversify acquisition channels",
        "Build an advisory board",
        "Test business assumptions regularly",
    ]));
    risk
}

pub fn analyze_company(company: &Company, snapshot: &MetricsSnapshot, practice: PlanningPractice) -> AdvisorReport {
    let challenges = identify_challenges(snapshot);
    let mistakes = detect_mistakes(practice);
    let action_plan = action_plan(&challenges);
    let risk = assess_risks(&challenges);

    tracing::debug!(
        "💡 Advisor found {} challenges and {} mistakes for {}",
        challenges.len(),
        mistakes.len(),
        company.name
    );

    AdvisorReport {
        company_name: company.name.clone(),
        challenges,
        mistakes,
        action_plan,
        risk,
    }
}

// ── Funding readiness ──────────────────────────────────────────

/// Seed 輪門檻與權重，權重合計為 1
const SEED_CRITERIA: [(&str, f64, f64); 5] = [
    ("mrr", 25_000.0, 0.30),
    ("growth_rate", 0.20, 0.25),
    ("gross_margin", 0.70, 0.15),
    ("ltv_cac", 3.0, 0.20),
    ("runway", 6.0, 0.10),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Ready,
    AlmostReady,
    NotReady,
}

impl ReadinessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessStatus::Ready => "ready",
            ReadinessStatus::AlmostReady => "almost_ready",
            ReadinessStatus::NotReady => "not_ready",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingTiming {
    pub timing: String,
    pub suggested_start: NaiveDate,
    pub suggested_close: NaiveDate,
    /// 保留 3 個月緩衝後募資時剩餘的跑道，None 為無限
    pub runway_at_funding: Option<f64>,
    pub milestones: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingReadiness {
    pub score: f64,
    pub status: ReadinessStatus,
    pub recommendation: String,
    pub gaps: Vec<String>,
    pub strengths: Vec<String>,
    pub next_steps: Vec<String>,
    pub timing: FundingTiming,
}

fn criterion_value(snapshot: &MetricsSnapshot, name: &str) -> f64 {
    match name {
        "mrr" => snapshot.mrr,
        "growth_rate" => snapshot.monthly_growth_rate,
        "gross_margin" => snapshot.gross_margin,
        "ltv_cac" => snapshot.ltv_cac_ratio,
        _ => snapshot.runway_or_sentinel(),
    }
}

fn format_criterion(name: &str, value: f64) -> String {
    match name {
        "growth_rate" | "gross_margin" => format!("{:.1}%", value * 100.0),
        "runway" => runway_display(value),
        "ltv_cac" => format!("{:.2}", value),
        _ => format!("{:.0}", value),
    }
}

/// 每項達標給滿分，未達標依缺口比例給部分分數
pub fn funding_readiness(snapshot: &MetricsSnapshot, today: NaiveDate) -> FundingReadiness {
    let mut score = 0.0;
    let mut gaps = Vec::new();
    let mut strengths = Vec::new();

    for (name, target, weight) in SEED_CRITERIA {
        let value = criterion_value(snapshot, name);
        if value >= target {
            score += weight * 100.0;
            strengths.push(format!(
                "{} at target: {} >= {}",
                name,
                format_criterion(name, value),
                format_criterion(name, target)
            ));
        } else {
            let gap_pct = safe_divide(target - value, target, 1.0) * 100.0;
            score += weight * (100.0 - gap_pct).max(0.0);
            gaps.push(format!(
                "{} below target: {} < {} (gap {:.1}%)",
                name,
                format_criterion(name, value),
                format_criterion(name, target),
                gap_pct
            ));
        }
    }

    let score = round_to(score, 1);
    let (status, recommendation) = if score >= 80.0 {
        (ReadinessStatus::Ready, "Start preparing the seed round")
    } else if score >= 60.0 {
        (ReadinessStatus::AlmostReady, "Improve one or two key metrics before fundraising")
    } else {
        (ReadinessStatus::NotReady, "Focus on key milestones before fundraising")
    };

    FundingReadiness {
        score,
        status,
        recommendation: recommendation.to_string(),
        gaps,
        strengths,
        next_steps: next_steps(status),
        timing: funding_timing(score, snapshot.runway_months, today),
    }
}

fn next_steps(status: ReadinessStatus) -> Vec<String> {
    match status {
        ReadinessStatus::Ready => strings(&[
            "Prepare the pitch deck",
            "Build a target investor list",
            "Prepare a 3-year financial model",
            "Collect customer references",
            "Book the first investor meetings",
        ]),
        ReadinessStatus::AlmostReady => strings(&[
            "Close the gaps listed above",
            "Sharpen the traction story",
            "Start building investor relationships",
            "Prepare due diligence materials",
        ]),
        ReadinessStatus::NotReady => strings(&[
            "Write a 90-day metrics improvement plan",
            "Focus on product and customer development",
            "Reduce burn to extend runway",
            "Look for angels, advisors or an accelerator",
        ]),
    }
}

pub fn funding_timing(score: f64, runway: Option<f64>, today: NaiveDate) -> FundingTiming {
    let months = runway.unwrap_or(INFINITE_RUNWAY);
    let (timing, start_days, close_days) = if score >= 70.0 && months < 9.0 {
        ("immediate", 0, 90)
    } else if score >= 60.0 {
        ("in_1_3_months", 30, 120)
    } else {
        ("in_3_6_months", 90, 180)
    };

    let milestones = if score < 60.0 {
        strings(&[
            "Reach 10k MRR",
            "Show 20%+ monthly growth",
            "Have 10+ referenceable customers",
            "Prove retention",
        ])
    } else if score < 70.0 {
        strings(&[
            "Reach 25k MRR",
            "Show 15%+ monthly growth three months in a row",
            "Build a repeatable sales process",
        ])
    } else {
        strings(&[
            "Prepare investor materials",
            "Line up the first investor meetings",
            "Define the use of funds",
        ])
    };

    FundingTiming {
        timing: timing.to_string(),
        suggested_start: today + Duration::days(start_days),
        suggested_close: today + Duration::days(close_days),
        runway_at_funding: runway.map(|m| (m - 3.0).max(0.0)),
        milestones,
    }
}

// ── Quarterly OKRs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    pub objective: String,
    pub metric: String,
    pub current: f64,
    pub target: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Initiative {
    pub id: String,
    pub name: String,
    pub objective: String,
    pub activities: Vec<String>,
    pub owner: String,
    pub timeline: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyOkrs {
    pub quarter: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub objectives: Vec<String>,
    pub key_results: Vec<KeyResult>,
    pub initiatives: Vec<Initiative>,
}

/// 日期所在季度的第一天與最後一天
pub fn quarter_bounds(date: NaiveDate) -> (u32, NaiveDate, NaiveDate) {
    let quarter = (date.month() - 1) / 3 + 1;
    let first_month = (quarter - 1) * 3 + 1;
    let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date);
    let end = if quarter == 4 {
        NaiveDate::from_ymd_opt(date.year(), 12, 31)
    } else {
        NaiveDate::from_ymd_opt(date.year(), first_month + 3, 1).and_then(|d| d.pred_opt())
    }
    .unwrap_or(date);
    (quarter, start, end)
}

/// 依目前 ARR 選擇本季目標
pub fn quarterly_okrs(snapshot: &MetricsSnapshot, today: NaiveDate) -> QuarterlyOkrs {
    let arr = snapshot.arr;
    let objectives: &[&str] = if arr < 10_000.0 {
        &["Win the first 10 paying customers", "Launch the MVP", "Define the ideal customer profile"]
    } else if arr < 25_000.0 {
        &["Reach 10k ARR", "Improve product-market fit", "Optimize onboarding"]
    } else if arr < 50_000.0 {
        &["Reach 25k ARR", "Find a repeatable sales motion", "Improve retention"]
    } else {
        &["Reach 50k ARR", "Prepare the seed round", "Build scalable processes"]
    };

    let customers = snapshot.customers as f64;
    let mut key_results = Vec::new();
    let mut initiatives = Vec::new();

    for objective in objectives {
        if objective.contains("customers") {
            key_results.push(KeyResult {
                objective: objective.to_string(),
                metric: "Paying customers".to_string(),
                current: customers,
                target: if customers > 0.0 { customers * 2.0 } else { 10.0 },
                unit: "customers".to_string(),
            });
            initiatives.push(Initiative {
                id: format!("I{}", initiatives.len() + 1),
                name: "Acquisition program".to_string(),
                objective: objective.to_string(),
                activities: strings(&[
                    "Cold outreach to 100 prospects",
                    "Attend 3 industry events",
                    "Launch a referral program",
                ]),
                owner: "Founder/CEO".to_string(),
                timeline: "6-8 weeks".to_string(),
            });
        } else if objective.contains("ARR") {
            key_results.push(KeyResult {
                objective: objective.to_string(),
                metric: "Annual recurring revenue".to_string(),
                current: arr,
                target: if arr > 0.0 { arr * 2.5 } else { 10_000.0 },
                unit: "currency".to_string(),
            });
        } else if objective.contains("product-market fit") {
            key_results.push(KeyResult {
                objective: objective.to_string(),
                metric: "Product-market fit score".to_string(),
                current: 0.0,
                target: 40.0,
                unit: "score (0-100)".to_string(),
            });
        } else if objective.contains("MVP") {
            initiatives.push(Initiative {
                id: format!("I{}", initiatives.len() + 1),
                name: "MVP development".to_string(),
                objective: objective.to_string(),
                activities: strings(&[
                    "User research with 20+ prospects",
                    "Prototype the key workflows",
                    "Beta test with 5 companies",
                ]),
                owner: "CTO".to_string(),
                timeline: "8-12 weeks".to_string(),
            });
        }
    }

    let (quarter, start, end) = quarter_bounds(today);
    QuarterlyOkrs {
        quarter: format!("Q{} {}", quarter, today.year()),
        start,
        end,
        objectives: strings(objectives),
        key_results,
        initiatives,
    }
}
