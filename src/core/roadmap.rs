// 第一年路線圖：里程碑、季度計畫、資源需求與風險

use crate::core::advisor::Priority;
use crate::core::unit_economics::MetricsSnapshot;
use crate::utils::math::safe_divide;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// 每位新進人員每月成本
pub const COST_PER_HIRE: f64 = 150_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    NotStarted,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: String,
    pub name: String,
    pub category: String,
    pub priority: Priority,
    pub target_date: NaiveDate,
    pub mrr_target: Option<f64>,
    pub dependencies: Vec<String>,
    pub success_criteria: Vec<String>,
    pub status: MilestoneStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Early,
    Mid,
    Late,
}

impl Readiness {
    /// 依目前 MRR 與客戶數判斷公司走到哪一段
    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        if snapshot.mrr >= 10_000.0 {
            Readiness::Late
        } else if snapshot.mrr >= 1_000.0 && snapshot.customers > 0 {
            Readiness::Mid
        } else {
            Readiness::Early
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterPlan {
    pub quarter: u32,
    pub theme: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub objectives: Vec<String>,
    pub key_results: Vec<String>,
    pub milestones: Vec<String>,
    pub budget: f64,
    pub team_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hire {
    pub quarter: u32,
    pub roles: Vec<String>,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub total_budget: f64,
    pub funding_needed: f64,
    /// 累計支出第一次超過現金的季度
    pub funding_quarter: Option<u32>,
    pub hiring_plan: Vec<Hire>,
    pub runway_months: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapRisk {
    pub milestone_id: Option<String>,
    pub risk: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub start: NaiveDate,
    pub readiness: Readiness,
    pub milestones: Vec<Milestone>,
    pub quarters: Vec<QuarterPlan>,
    pub resources: ResourcePlan,
    pub risks: Vec<RoadmapRisk>,
}

struct MilestoneTemplate {
    id: &'static str,
    name: &'static str,
    category: &'static str,
    priority: Priority,
    day: i64,
    mrr_target: Option<f64>,
    dependencies: &'static [&'static str],
    success_criteria: &'static [&'static str],
}

const MILESTONES: [MilestoneTemplate; 12] = [
    MilestoneTemplate {
        id: "M1",
        name: "MVP launch",
        category: "product",
        priority: Priority::Critical,
        day: 30,
        mrr_target: None,
        dependencies: &[],
        success_criteria: &["Core workflow works end to end", "First users onboarded"],
    },
    MilestoneTemplate {
        id: "M2",
        name: "10 beta users",
        category: "marketing",
        priority: Priority::Critical,
        day: 45,
        mrr_target: None,
        dependencies: &["M1"],
        success_criteria: &["10 active beta users", "Weekly feedback sessions"],
    },
    MilestoneTemplate {
        id: "M3",
        name: "Ideal customer profile defined",
        category: "sales",
        priority: Priority::High,
        day: 60,
        mrr_target: None,
        dependencies: &["M2"],
        success_criteria: &["Documented ICP", "Validated with 20 interviews"],
    },
    MilestoneTemplate {
        id: "M4",
        name: "First paying customers",
        category: "sales",
        priority: Priority::Critical,
        day: 90,
        mrr_target: Some(1_000.0),
        dependencies: &["M2", "M3"],
        success_criteria: &["3+ paying customers", "Signed contracts"],
    },
    MilestoneTemplate {
        id: "M5",
        name: "Product-market fit validation",
        category: "product",
        priority: Priority::Critical,
        day: 120,
        mrr_target: None,
        dependencies: &["M4"],
        success_criteria: &["40%+ would be very disappointed without the product", "Monthly retention > 80%"],
    },
    MilestoneTemplate {
        id: "M6",
        name: "Onboarding optimized",
        category: "product",
        priority: Priority::High,
        day: 135,
        mrr_target: None,
        dependencies: &["M5"],
        success_criteria: &["Time to value under one day", "Activation rate > 60%"],
    },
    MilestoneTemplate {
        id: "M7",
        name: "5k MRR",
        category: "sales",
        priority: Priority::Critical,
        day: 180,
        mrr_target: Some(5_000.0),
        dependencies: &["M4"],
        success_criteria: &["MRR >= 5k", "Churn < 5% monthly"],
    },
    MilestoneTemplate {
        id: "M8",
        name: "First sales hire",
        category: "team",
        priority: Priority::High,
        day: 210,
        mrr_target: None,
        dependencies: &["M7"],
        success_criteria: &["Sales hire onboarded", "Documented sales playbook"],
    },
    MilestoneTemplate {
        id: "M9",
        name: "Referral program",
        category: "marketing",
        priority: Priority::Medium,
        day: 225,
        mrr_target: None,
        dependencies: &["M5"],
        success_criteria: &["Referral program live", "10% of new customers referred"],
    },
    MilestoneTemplate {
        id: "M10",
        name: "10k MRR",
        category: "sales",
        priority: Priority::Critical,
        day: 270,
        mrr_target: Some(10_000.0),
        dependencies: &["M7", "M8"],
        success_criteria: &["MRR >= 10k", "Repeatable acquisition channel"],
    },
    MilestoneTemplate {
        id: "M11",
        name: "Seed round preparation",
        category: "funding",
        priority: Priority::High,
        day: 300,
        mrr_target: None,
        dependencies: &["M10"],
        success_criteria: &["Pitch deck ready", "Investor pipeline of 30+"],
    },
    MilestoneTemplate {
        id: "M12",
        name: "Annual review",
        category: "planning",
        priority: Priority::Medium,
        day: 330,
        mrr_target: None,
        dependencies: &[],
        success_criteria: &["Year-two plan approved", "Budget for next year"],
    },
];

struct QuarterTemplate {
    theme: &'static str,
    objectives: &'static [&'static str],
    key_results: &'static [&'static str],
    budget: f64,
    team_size: u32,
}

const QUARTERS: [QuarterTemplate; 4] = [
    QuarterTemplate {
        theme: "Foundation & Validation",
        objectives: &["Launch the MVP", "Validate the problem with real users"],
        key_results: &["MVP live", "10 beta users", "20 customer interviews"],
        budget: 500_000.0,
        team_size: 3,
    },
    QuarterTemplate {
        theme: "Product-Market Fit & Early Traction",
        objectives: &["Reach product-market fit", "Win the first paying customers"],
        key_results: &["PMF survey >= 40%", "5k MRR", "Monthly retention > 80%"],
        budget: 750_000.0,
        team_size: 4,
    },
    QuarterTemplate {
        theme: "Scaling & Process Building",
        objectives: &["Build a repeatable sales process", "Grow the team"],
        key_results: &["First sales hire", "Referral program live", "CAC payback < 12 months"],
        budget: 1_000_000.0,
        team_size: 6,
    },
    QuarterTemplate {
        theme: "Growth & Fundraising Preparation",
        objectives: &["Reach 10k MRR", "Prepare the seed round"],
        key_results: &["10k MRR", "Pitch deck ready", "Investor pipeline of 30+"],
        budget: 1_250_000.0,
        team_size: 8,
    },
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 依公司階段調整里程碑日期與狀態，跑道不足時把營收與募資里程碑升為 critical
pub fn milestones(snapshot: &MetricsSnapshot, start: NaiveDate) -> Vec<Milestone> {
    let readiness = Readiness::from_snapshot(snapshot);
    let shift = match readiness {
        Readiness::Early => 0,
        Readiness::Mid => 90,
        Readiness::Late => 180,
    };
    let limited_runway = snapshot.runway_months.is_some_and(|m| m < 6.0);

    MILESTONES
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let completed = readiness == Readiness::Late && i < 4;
            let urgent = limited_runway && (t.mrr_target.is_some() || t.category == "funding");
            Milestone {
                id: t.id.to_string(),
                name: t.name.to_string(),
                category: t.category.to_string(),
                priority: if urgent { Priority::Critical } else { t.priority },
                // 已走過的里程碑提前，不早於起始日
                target_date: start + Duration::days((t.day - shift).max(0)),
                mrr_target: t.mrr_target,
                dependencies: strings(t.dependencies),
                success_criteria: strings(t.success_criteria),
                status: if completed {
                    MilestoneStatus::Completed
                } else {
                    MilestoneStatus::NotStarted
                },
            }
        })
        .collect()
}

pub fn quarter_plans(milestones: &[Milestone], start: NaiveDate) -> Vec<QuarterPlan> {
    QUARTERS
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let q_start = start + Duration::days(i as i64 * 90);
            let q_end = q_start + Duration::days(89);
            QuarterPlan {
                quarter: i as u32 + 1,
                theme: t.theme.to_string(),
                start: q_start,
                end: q_end,
                objectives: strings(t.objectives),
                key_results: strings(t.key_results),
                milestones: milestones
                    .iter()
                    .filter(|m| m.target_date >= q_start && m.target_date <= q_end)
                    .map(|m| m.id.clone())
                    .collect(),
                budget: t.budget,
                team_size: t.team_size,
            }
        })
        .collect()
}

pub fn resource_plan(quarters: &[QuarterPlan], cash_balance: f64, team_size: u32) -> ResourcePlan {
    let total_budget: f64 = quarters.iter().map(|q| q.budget).sum();

    let mut cumulative = 0.0;
    let mut funding_quarter = None;
    for q in quarters {
        cumulative += q.budget;
        if cumulative > cash_balance {
            funding_quarter = Some(q.quarter);
            break;
        }
    }

    let mut hiring_plan = Vec::new();
    let mut current = team_size;
    for q in quarters {
        if q.team_size > current {
            let count = q.team_size - current;
            let roles = (0..count).map(|n| role_for(q.quarter, n)).collect();
            hiring_plan.push(Hire {
                quarter: q.quarter,
                roles,
                monthly_cost: count as f64 * COST_PER_HIRE,
            });
            current = q.team_size;
        }
    }

    ResourcePlan {
        total_budget,
        funding_needed: (total_budget - cash_balance).max(0.0),
        funding_quarter,
        hiring_plan,
        runway_months: safe_divide(cash_balance, total_budget / 12.0, 0.0),
    }
}

fn role_for(quarter: u32, index: u32) -> String {
    let roles: &[&str] = match quarter {
        1 => &["Full-stack engineer", "Product designer", "Engineer"],
        2 => &["Customer success", "Engineer"],
        3 => &["Sales representative", "Marketing lead", "Engineer"],
        _ => &["Account executive", "Engineer", "Operations"],
    };
    roles
        .get(index as usize)
        .or(roles.last())
        .map(|r| r.to_string())
        .unwrap_or_default()
}

pub fn roadmap_risks(milestones: &[Milestone], snapshot: &MetricsSnapshot, team_size: u32) -> Vec<RoadmapRisk> {
    let mut risks = Vec::new();
    for m in milestones.iter().filter(|m| m.status != MilestoneStatus::Completed) {
        if m.mrr_target.is_some_and(|target| target > snapshot.mrr * 3.0) {
            risks.push(RoadmapRisk {
                milestone_id: Some(m.id.clone()),
                risk: format!("{} is an ambitious target from the current MRR", m.name),
                mitigation: "Break the target into monthly goals and review weekly".to_string(),
            });
        }
        if m.category == "team" && team_size < 3 {
            risks.push(RoadmapRisk {
                milestone_id: Some(m.id.clone()),
                risk: "Hiring with a very small team slows everything else".to_string(),
                mitigation: "Start sourcing candidates a quarter ahead".to_string(),
            });
        }
    }

    for (risk, mitigation) in [
        ("Slower customer acquisition than planned", "Test several channels in parallel"),
        ("Key person dependency", "Document processes and share ownership"),
        ("Fundraising takes longer than expected", "Start investor conversations early"),
    ] {
        risks.push(RoadmapRisk {
            milestone_id: None,
            risk: risk.to_string(),
            mitigation: mitigation.to_string(),
        });
    }
    risks
}

pub fn year_one_roadmap(snapshot: &MetricsSnapshot, team_size: u32, start: NaiveDate) -> Roadmap {
    let milestones = milestones(snapshot, start);
    let quarters = quarter_plans(&milestones, start);
    let resources = resource_plan(&quarters, snapshot.cash_balance, team_size);
    let risks = roadmap_risks(&milestones, snapshot, team_size);

    if resources.funding_needed > 0.0 {
        tracing::warn!(
            "⚠️ Roadmap needs {:.0} more than current cash (from Q{})",
            resources.funding_needed,
            resources.funding_quarter.unwrap_or(1)
        );
    }

    Roadmap {
        start,
        readiness: Readiness::from_snapshot(snapshot),
        milestones,
        quarters,
        resources,
        risks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn snapshot(mrr: f64, customers: u32, cash: f64) -> MetricsSnapshot {
        MetricsSnapshot {
            mrr,
            customers,
            cash_balance: cash,
            ..Default::default()
        }
    }

    #[test]
    fn test_readiness_levels() {
        assert_eq!(Readiness::from_snapshot(&snapshot(0.0, 0, 0.0)), Readiness::Early);
        assert_eq!(Readiness::from_snapshot(&snapshot(2_000.0, 0, 0.0)), Readiness::Early);
        assert_eq!(Readiness::from_snapshot(&snapshot(2_000.0, 4, 0.0)), Readiness::Mid);
        assert_eq!(Readiness::from_snapshot(&snapshot(12_000.0, 20, 0.0)), Readiness::Late);
    }

    #[test]
    fn test_early_milestones_follow_template() {
        let list = milestones(&snapshot(0.0, 0, 1_000_000.0), start());
        assert_eq!(list.len(), 12);
        assert_eq!(list[0].target_date, start() + Duration::days(30));
        assert_eq!(list[11].target_date, start() + Duration::days(330));
        assert!(list.iter().all(|m| m.status == MilestoneStatus::NotStarted));
        assert_eq!(list[3].dependencies, vec!["M2", "M3"]);
    }

    #[test]
    fn test_late_stage_completes_first_milestones() {
        let list = milestones(&snapshot(15_000.0, 30, 1_000_000.0), start());
        assert!(list[..4].iter().all(|m| m.status == MilestoneStatus::Completed));
        assert_eq!(list[4].status, MilestoneStatus::NotStarted);
        // 120 - 180 不早於起始日
        assert_eq!(list[4].target_date, start());
        assert_eq!(list[9].target_date, start() + Duration::days(90));
    }

    #[test]
    fn test_short_runway_escalates_revenue_milestones() {
        let mut s = snapshot(0.0, 0, 100_000.0);
        s.runway_months = Some(4.0);
        let list = milestones(&s, start());
        let m11 = list.iter().find(|m| m.id == "M11").unwrap();
        assert_eq!(m11.priority, Priority::Critical);
        let m9 = list.iter().find(|m| m.id == "M9").unwrap();
        assert_eq!(m9.priority, Priority::Medium);
    }

    #[test]
    fn test_quarters_collect_milestones() {
        let list = milestones(&snapshot(0.0, 0, 0.0), start());
        let quarters = quarter_plans(&list, start());
        assert_eq!(quarters.len(), 4);
        assert_eq!(quarters[0].milestones, vec!["M1", "M2", "M3"]);
        assert_eq!(quarters[1].milestones, vec!["M4", "M5", "M6"]);
        assert_eq!(quarters[3].theme, "Growth & Fundraising Preparation");
    }

    #[test]
    fn test_resource_plan_funding_gap() {
        let list = milestones(&snapshot(0.0, 0, 0.0), start());
        let quarters = quarter_plans(&list, start());
        let plan = resource_plan(&quarters, 1_000_000.0, 2);

        assert_relative_eq!(plan.total_budget, 3_500_000.0);
        assert_relative_eq!(plan.funding_needed, 2_500_000.0);
        // 500k + 750k 超過 1M
        assert_eq!(plan.funding_quarter, Some(2));
        assert_eq!(plan.hiring_plan[0].quarter, 1);
        assert_eq!(plan.hiring_plan[0].roles.len(), 1);
        assert_relative_eq!(plan.hiring_plan[2].monthly_cost, 300_000.0);
        assert_relative_eq!(plan.runway_months, 1_000_000.0 / (3_500_000.0 / 12.0));
    }

    #[test]
    fn test_roadmap_risks() {
        let s = snapshot(1_000.0, 2, 500_000.0);
        let roadmap = year_one_roadmap(&s, 2, start());
        let ids: Vec<&str> = roadmap
            .risks
            .iter()
            .filter_map(|r| r.milestone_id.as_deref())
            .collect();
        // M4 的 1000 不超過 3 倍，M7 與 M10 超過
        assert_eq!(ids, vec!["M7", "M8", "M10"]);
        assert_eq!(roadmap.risks.len(), 6);
        assert_eq!(roadmap.readiness, Readiness::Mid);
    }
}
