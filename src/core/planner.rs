use crate::core::runway::INFINITE_RUNWAY;
use crate::domain::model::{
    ActualData, CapexCategory, Company, MonthlyPlan, OptimizationGoal, PlanAssumptions, RecordedVariance,
};
use crate::utils::error::Result;
use crate::utils::math::{mean, safe_divide};
use crate::utils::validation::{validate_non_negative, validate_positive, validate_range};
use serde::{Deserialize, Serialize};

const GROSS_MARGIN: f64 = 0.8;
const CAPEX_PER_HEAD: f64 = 50_000.0;

/// 直線推估用的簡化假設
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleAssumptions {
    pub monthly_growth_rate: f64,
    pub monthly_churn_rate: f64,
    pub starting_mrr: f64,
    pub starting_customers: u32,
    pub starting_cash: f64,
    pub salary_cost: f64,
    pub marketing_cost: f64,
    pub infrastructure_cost: f64,
    pub other_cost: f64,
    pub cac: f64,
}

fn runway_for(cash: f64, burn: f64) -> f64 {
    if burn > 0.0 {
        cash.max(0.0) / burn
    } else {
        INFINITE_RUNWAY
    }
}

pub fn generate_monthly_plans(plan_id: Option<i64>, year: i32, a: &SimpleAssumptions) -> Vec<MonthlyPlan> {
    let mut customers = a.starting_customers;
    let mut mrr = a.starting_mrr;
    let mut cash = a.starting_cash;
    let g = a.monthly_growth_rate;
    let churn = a.monthly_churn_rate;

    (1..=12)
        .map(|month| {
            let churned = (customers as f64 * churn).floor() as u32;
            let after_churn = customers.saturating_sub(churned);
            let target = (after_churn as f64 * (1.0 + g)).round().max(0.0) as u32;
            let new_customers = target.saturating_sub(after_churn);
            customers = after_churn + new_customers;

            let churned_mrr = mrr * churn;
            mrr = (mrr * (1.0 + g - churn)).max(0.0);

            let total_costs = a.salary_cost + a.marketing_cost + a.infrastructure_cost + a.other_cost;
            let burn = (total_costs - mrr).max(0.0);
            cash += mrr - total_costs;

            let arpu = safe_divide(mrr, customers as f64, 0.0);
            let ltv = safe_divide(arpu, churn, 0.0);

            let mut plan = MonthlyPlan::new(plan_id, year, month);
            let f = &mut plan.figures;
            f.mrr = mrr;
            f.new_customers = new_customers;
            f.churned_customers = churned;
            f.total_customers = customers;
            f.churn_rate = churn;
            f.churned_mrr = churned_mrr;
            // 行銷預算拆成 60/30/10
            f.marketing_spend = a.marketing_cost * 0.6;
            f.sales_spend = a.marketing_cost * 0.3;
            f.opex.marketing_ops = a.marketing_cost * 0.1;
            f.opex.salaries = a.salary_cost;
            f.opex.cloud_services = a.infrastructure_cost;
            f.opex.software_subscriptions = a.other_cost * 0.3;
            f.opex.legal_accounting = a.other_cost * 0.2;
            f.opex.other = a.other_cost * 0.5;
            f.cac = a.cac;
            f.total_revenue = mrr;
            f.total_costs = total_costs;
            f.burn_rate = burn;
            f.cash_balance = cash;
            f.runway_months = runway_for(cash, burn);
            f.gross_margin = if mrr > 0.0 { GROSS_MARGIN } else { 0.0 };
            f.ltv = ltv;
            f.ltv_cac_ratio = safe_divide(ltv, a.cac, 0.0);
            f.cac_payback_months = safe_divide(a.cac, arpu, 0.0);
            plan
        })
        .collect()
}

pub fn validate_planning_inputs(company: &Company, assumptions: &PlanAssumptions) -> Result<()> {
    validate_non_negative("current_mrr", company.current_mrr)?;
    validate_positive("monthly_price", company.monthly_price)?;
    validate_positive("team_size", company.team_size as f64)?;
    validate_non_negative("cash_balance", company.cash_balance)?;
    validate_range("mrr_growth_rate", assumptions.mrr_growth_rate, -1.0, 5.0)?;
    validate_range("customer_growth_rate", assumptions.customer_growth_rate, -1.0, 5.0)?;
    validate_range("churn_rate", assumptions.churn_rate, 0.0, 1.0)?;
    validate_range("expansion_rate", assumptions.expansion_rate, 0.0, 5.0)?;
    validate_non_negative("cac_target", assumptions.cac_target)?;
    validate_non_negative("capex_budget", assumptions.capex_budget)?;
    for item in &assumptions.capex_items {
        validate_range("capex_items.purchase_month", item.purchase_month, 1, 12)?;
        validate_non_negative("capex_items.amount", item.amount)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_revenue: f64,
    pub total_costs: f64,
    pub total_capex: f64,
    pub starting_mrr: f64,
    pub ending_mrr: f64,
    pub ending_customers: u32,
    pub ending_team: u32,
    pub mrr_cagr: f64,
    pub average_growth: f64,
    pub average_ltv_cac: f64,
    pub average_payback_months: f64,
    pub average_burn: f64,
    pub min_runway: f64,
    pub breakeven_month: Option<u32>,
    pub peak_cash_need: f64,
    pub suggested_raise: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityFinding {
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feasibility {
    pub score: f64,
    pub rating: String,
    pub issues: Vec<FeasibilityFinding>,
    pub warnings: Vec<FeasibilityFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanProjection {
    pub months: Vec<MonthlyPlan>,
    pub summary: PlanSummary,
    pub feasibility: Feasibility,
}

/// 依假設推估 12 個月的營運計畫
pub fn create_12month_plan(company: &Company, assumptions: &PlanAssumptions, year: i32) -> Result<PlanProjection> {
    validate_planning_inputs(company, assumptions)?;

    let mut months = base_plan(company, assumptions, year);
    optimize(&mut months, assumptions.optimize_for);
    recalculate(&mut months, company.cash_balance);

    let summary = summarize(&months);
    let feasibility = assess_feasibility(&summary);

    tracing::debug!(
        "📈 Plan projected: ending MRR {:.0}, min runway {:.1}, feasibility {:.0}",
        summary.ending_mrr,
        summary.min_runway,
        feasibility.score
    );

    Ok(PlanProjection {
        months,
        summary,
        feasibility,
    })
}

fn base_plan(company: &Company, a: &PlanAssumptions, year: i32) -> Vec<MonthlyPlan> {
    let mut customers = company.current_customers as f64;
    let mut mrr = company.current_mrr;
    let mut team = company.team_size;

    (1..=12u32)
        .map(|month| {
            let season = a.seasonality_for(month);
            let mut new_customers = 0.0;
            let mut churned_customers = 0.0;
            let mut expansion_mrr = 0.0;
            let mut churned_mrr = 0.0;

            // 第一個月沿用目前數字
            if month > 1 {
                new_customers = customers * a.customer_growth_rate * season;
                churned_customers = customers * a.churn_rate;
                customers = (customers + new_customers - churned_customers).max(0.0);

                expansion_mrr = mrr * a.expansion_rate;
                churned_mrr = mrr * a.churn_rate;
                mrr = (mrr * (1.0 + a.mrr_growth_rate * season) + expansion_mrr - churned_mrr).max(0.0);
            }

            let cac = (a.cac_target * 0.5).max(a.cac_target * (1.0 - 0.05 * (month - 1) as f64));

            if month >= 6 && month % 3 == 0 {
                team += 1;
            }

            let mut plan = MonthlyPlan::new(None, year, month);
            plan.team_size = team;
            plan.seasonality_factor = season;

            let f = &mut plan.figures;
            f.mrr = mrr;
            f.total_customers = customers.round() as u32;
            f.new_customers = new_customers.round() as u32;
            f.churned_customers = churned_customers.round() as u32;
            f.expansion_mrr = expansion_mrr;
            f.churned_mrr = churned_mrr;
            f.churn_rate = a.churn_rate;
            f.cac = cac;
            f.marketing_spend = new_customers * cac * 0.7;
            f.sales_spend = new_customers * cac * 0.3;

            let salaries = team as f64 * a.salary_per_employee * (1.0 + 0.02 * month as f64);
            f.opex.salaries = salaries;
            f.opex.office_rent = team as f64 * a.office_rent_per_person;
            f.opex.cloud_services = customers * a.cloud_cost_per_customer;
            f.opex.other = salaries * 0.15;
            f.opex.marketing_ops = mrr * 0.05;

            if a.capex_budget > 0.0 {
                f.capex.other = if month <= 6 {
                    a.capex_budget / 6.0
                } else {
                    a.capex_budget * 0.1 / 6.0
                };
            } else if month % 3 == 0 {
                f.capex.equipment = team as f64 * CAPEX_PER_HEAD;
            }
            for item in a.capex_items.iter().filter(|i| i.purchase_month == month) {
                match item.category {
                    CapexCategory::Equipment => f.capex.equipment += item.amount,
                    CapexCategory::Software => f.capex.software += item.amount,
                    CapexCategory::Furniture => f.capex.furniture += item.amount,
                    CapexCategory::Other => f.capex.other += item.amount,
                }
            }

            f.gross_margin = GROSS_MARGIN;
            plan
        })
        .collect()
}

fn optimize(months: &mut [MonthlyPlan], goal: OptimizationGoal) {
    for (i, plan) in months.iter_mut().enumerate() {
        let f = &mut plan.figures;
        match goal {
            OptimizationGoal::Runway => {
                f.opex.scale(0.85);
                f.marketing_spend *= 0.9;
                f.sales_spend *= 0.9;
                f.cac *= 0.9;
            }
            OptimizationGoal::Growth => {
                f.marketing_spend *= 1.3;
                f.sales_spend *= 1.3;
                f.new_customers = (f.new_customers as f64 * 1.15).round() as u32;
            }
            OptimizationGoal::Profitability => {
                f.gross_margin = (f.gross_margin * 1.1).min(0.9);
                // 第 4 個月起調漲 20% 價格
                if i >= 3 {
                    f.mrr *= 1.2;
                }
            }
            OptimizationGoal::Balanced => {}
        }
    }
}

/// 依月份重新累計成本、現金與效率指標
pub fn recalculate(months: &mut [MonthlyPlan], starting_cash: f64) {
    let mut cash = starting_cash;
    for plan in months.iter_mut() {
        let f = &mut plan.figures;
        f.total_revenue = f.mrr;
        f.total_costs = f.operating_costs() + f.capex.total();
        f.burn_rate = (f.total_costs - f.mrr).max(0.0);
        cash += f.mrr - f.total_costs;
        f.cash_balance = cash;
        f.runway_months = runway_for(cash, f.burn_rate);

        let arpu = f.arpu();
        let lifetime = if f.churn_rate > 0.0 { 1.0 / f.churn_rate } else { 12.0 };
        f.ltv = arpu * lifetime;
        f.ltv_cac_ratio = safe_divide(f.ltv, f.cac, 0.0);
        f.cac_payback_months = safe_divide(f.cac, arpu, 0.0);
    }
}

pub fn summarize(months: &[MonthlyPlan]) -> PlanSummary {
    let first = months.first().map(|m| &m.figures);
    let last = months.last().map(|m| &m.figures);
    let starting_mrr = first.map(|f| f.mrr).unwrap_or(0.0);
    let ending_mrr = last.map(|f| f.mrr).unwrap_or(0.0);

    let periods = months.len().saturating_sub(1).max(1) as f64;
    let mrr_cagr = if starting_mrr > 0.0 {
        (ending_mrr / starting_mrr).powf(1.0 / periods) - 1.0
    } else {
        0.0
    };

    let growth: Vec<f64> = months
        .windows(2)
        .map(|w| safe_divide(w[1].figures.mrr - w[0].figures.mrr, w[0].figures.mrr, 0.0))
        .collect();

    let mut cumulative = 0.0;
    let mut lowest = 0.0f64;
    let mut breakeven_month = None;
    for plan in months {
        cumulative += plan.figures.mrr - plan.figures.total_costs;
        lowest = lowest.min(cumulative);
        if breakeven_month.is_none() && cumulative >= 0.0 {
            breakeven_month = Some(plan.month_number);
        }
    }
    let peak_cash_need = lowest.abs();

    let ltv_cac: Vec<f64> = months.iter().map(|m| m.figures.ltv_cac_ratio).collect();
    let payback: Vec<f64> = months.iter().map(|m| m.figures.cac_payback_months).collect();
    let burn: Vec<f64> = months.iter().map(|m| m.figures.burn_rate).collect();

    PlanSummary {
        total_revenue: months.iter().map(|m| m.figures.total_revenue).sum(),
        total_costs: months.iter().map(|m| m.figures.total_costs).sum(),
        total_capex: months.iter().map(|m| m.figures.capex.total()).sum(),
        starting_mrr,
        ending_mrr,
        ending_customers: last.map(|f| f.total_customers).unwrap_or(0),
        ending_team: months.last().map(|m| m.team_size).unwrap_or(0),
        mrr_cagr,
        average_growth: mean(&growth),
        average_ltv_cac: mean(&ltv_cac),
        average_payback_months: mean(&payback),
        average_burn: mean(&burn),
        min_runway: months
            .iter()
            .map(|m| m.figures.runway_months)
            .fold(INFINITE_RUNWAY, f64::min),
        breakeven_month,
        peak_cash_need,
        suggested_raise: peak_cash_need * 3.0,
    }
}

pub fn assess_feasibility(summary: &PlanSummary) -> Feasibility {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    let finding = |severity, message: String| FeasibilityFinding { severity, message };

    if summary.average_growth > 0.5 {
        warnings.push(finding(
            IssueSeverity::Medium,
            format!("Average monthly growth of {:.0}% is aggressive", summary.average_growth * 100.0),
        ));
    }
    if summary.average_ltv_cac < 2.0 {
        issues.push(finding(
            IssueSeverity::High,
            format!("Average LTV/CAC of {:.1}x is below 2x", summary.average_ltv_cac),
        ));
    }
    if summary.min_runway < 6.0 {
        issues.push(finding(
            IssueSeverity::Critical,
            format!("Runway drops to {:.1} months during the plan", summary.min_runway),
        ));
    }
    if summary.average_payback_months > 18.0 {
        warnings.push(finding(
            IssueSeverity::Medium,
            format!("CAC payback of {:.0} months is slow", summary.average_payback_months),
        ));
    }
    warnings.extend(team_capacity_warning(summary));

    let penalty: f64 = issues
        .iter()
        .map(|i| match i.severity {
            IssueSeverity::Critical => 30.0,
            IssueSeverity::High => 20.0,
            _ => 10.0,
        })
        .chain(warnings.iter().map(|w| match w.severity {
            IssueSeverity::Medium | IssueSeverity::High | IssueSeverity::Critical => 5.0,
            IssueSeverity::Low => 2.0,
        }))
        .sum();

    let score = (100.0 - penalty).clamp(0.0, 100.0);
    let rating = if score >= 80.0 {
        "high"
    } else if score >= 60.0 {
        "medium"
    } else if score >= 40.0 {
        "low"
    } else {
        "very_low"
    };

    Feasibility {
        score,
        rating: rating.to_string(),
        issues,
        warnings,
    }
}

// 每 5 萬 MRR 大約需要一位成員支撐
fn team_capacity_warning(summary: &PlanSummary) -> Option<FeasibilityFinding> {
    let needed = summary.ending_mrr / 50_000.0;
    if needed > summary.ending_team as f64 {
        Some(FeasibilityFinding {
            severity: IssueSeverity::Low,
            message: format!("Ending MRR may need about {:.0} people to support", needed),
        })
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanActualRow {
    pub year: i32,
    pub month_number: u32,
    pub month_name: String,
    pub plan_mrr: f64,
    pub actual_mrr: Option<f64>,
    pub plan_burn_rate: f64,
    pub actual_burn_rate: Option<f64>,
    pub plan_runway: f64,
    pub actual_runway: Option<f64>,
    pub plan_cac: f64,
    pub actual_cac: Option<f64>,
    pub plan_new_customers: u32,
    pub actual_new_customers: Option<u32>,
    pub variance: Option<RecordedVariance>,
    pub status: String,
}

pub fn plan_vs_actual_summary(months: &[MonthlyPlan], actuals: &[ActualData]) -> Vec<PlanActualRow> {
    months
        .iter()
        .map(|plan| {
            let actual = actuals.iter().find(|a| {
                (plan.id.is_some() && a.monthly_plan_id == plan.id) || a.period() == plan.period()
            });

            let status = match actual {
                None => "planned",
                Some(a) if a.is_finalized => "finalized",
                Some(_) => "in_progress",
            };

            PlanActualRow {
                year: plan.year,
                month_number: plan.month_number,
                month_name: plan.month_name.clone(),
                plan_mrr: plan.figures.mrr,
                actual_mrr: actual.map(|a| a.figures.mrr),
                plan_burn_rate: plan.figures.burn_rate,
                actual_burn_rate: actual.map(|a| a.figures.burn_rate),
                plan_runway: plan.figures.runway_months,
                actual_runway: actual.map(|a| a.figures.runway_months),
                plan_cac: plan.figures.cac,
                actual_cac: actual.map(|a| a.figures.cac),
                plan_new_customers: plan.figures.new_customers,
                actual_new_customers: actual.map(|a| a.figures.new_customers),
                variance: actual.and_then(|a| a.variance),
                status: status.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CapexItem, MonthlyFigures, Stage};
    use approx::assert_relative_eq;

    fn simple() -> SimpleAssumptions {
        SimpleAssumptions {
            monthly_growth_rate: 0.1,
            monthly_churn_rate: 0.05,
            starting_mrr: 10_000.0,
            starting_customers: 100,
            starting_cash: 500_000.0,
            salary_cost: 30_000.0,
            marketing_cost: 10_000.0,
            infrastructure_cost: 2_000.0,
            other_cost: 3_000.0,
            cac: 500.0,
        }
    }

    fn company() -> Company {
        let mut c = Company::new("Demo", Stage::PreSeed);
        c.current_mrr = 25_000.0;
        c.current_customers = 5;
        c.monthly_price = 5_000.0;
        c.team_size = 3;
        c.cash_balance = 2_000_000.0;
        c
    }

    #[test]
    fn test_generate_monthly_plans_first_month() {
        let months = generate_monthly_plans(Some(7), 2025, &simple());
        assert_eq!(months.len(), 12);

        let first = &months[0];
        assert_eq!(first.plan_id, Some(7));
        assert_eq!(first.quarter, 1);
        assert_eq!(first.figures.churned_customers, 5);
        // 95 * 1.1 = 104.5 -> 105
        assert_eq!(first.figures.new_customers, 10);
        assert_eq!(first.figures.total_customers, 105);
        assert_relative_eq!(first.figures.mrr, 10_500.0);
        assert_relative_eq!(first.figures.churned_mrr, 500.0);
        assert_relative_eq!(first.figures.total_costs, 45_000.0);
        assert_relative_eq!(first.figures.burn_rate, 34_500.0);
        assert_relative_eq!(first.figures.cash_balance, 465_500.0);
        assert_relative_eq!(first.figures.runway_months, 465_500.0 / 34_500.0);
        assert_relative_eq!(first.figures.opex.total() + first.figures.acquisition_spend(), 45_000.0);
        assert_eq!(months[11].quarter, 4);
    }

    #[test]
    fn test_generate_monthly_plans_profitable_uses_sentinel() {
        let mut a = simple();
        a.starting_mrr = 100_000.0;
        let months = generate_monthly_plans(None, 2025, &a);
        assert_eq!(months[0].figures.burn_rate, 0.0);
        assert_eq!(months[0].figures.runway_months, INFINITE_RUNWAY);
    }

    #[test]
    fn test_create_plan_month_one_keeps_current_figures() {
        let mut a = PlanAssumptions::default();
        a.optimize_for = OptimizationGoal::Balanced;
        let projection = create_12month_plan(&company(), &a, 2025).unwrap();
        let first = &projection.months[0].figures;
        assert_relative_eq!(first.mrr, 25_000.0);
        assert_eq!(first.total_customers, 5);
        assert_eq!(first.new_customers, 0);
        assert_relative_eq!(first.cac, 20_000.0);

        let second = &projection.months[1];
        // 25000 * (1 + 0.2 * 0.95) + 2500 - 1250
        assert_relative_eq!(second.figures.mrr, 31_000.0);
        assert_relative_eq!(second.figures.cac, 19_000.0);
    }

    #[test]
    fn test_create_plan_team_growth_and_capex() {
        let mut a = PlanAssumptions::default();
        a.optimize_for = OptimizationGoal::Balanced;
        a.capex_items.push(CapexItem {
            name: "Laptops".to_string(),
            amount: 12_000.0,
            purchase_month: 2,
            category: CapexCategory::Equipment,
        });
        let projection = create_12month_plan(&company(), &a, 2025).unwrap();

        let team: Vec<u32> = projection.months.iter().map(|m| m.team_size).collect();
        assert_eq!(team, vec![3, 3, 3, 3, 3, 4, 4, 4, 5, 5, 5, 6]);

        assert_relative_eq!(projection.months[1].figures.capex.equipment, 12_000.0);
        assert_relative_eq!(projection.months[2].figures.capex.equipment, 150_000.0);
        assert_eq!(projection.months[3].figures.capex.total(), 0.0);
    }

    fn with_goal(goal: OptimizationGoal) -> PlanProjection {
        let mut c = company();
        c.current_customers = 200;
        let mut a = PlanAssumptions::default();
        a.optimize_for = goal;
        create_12month_plan(&c, &a, 2025).unwrap()
    }

    #[test]
    fn test_growth_optimization_boosts_acquisition() {
        let base = with_goal(OptimizationGoal::Balanced);
        let growth = with_goal(OptimizationGoal::Growth);

        for (b, g) in base.months.iter().zip(&growth.months) {
            assert_relative_eq!(g.figures.marketing_spend, b.figures.marketing_spend * 1.3);
            assert_relative_eq!(g.figures.sales_spend, b.figures.sales_spend * 1.3);
            assert_eq!(
                g.figures.new_customers,
                (b.figures.new_customers as f64 * 1.15).round() as u32
            );
            assert_eq!(g.figures.mrr, b.figures.mrr);
        }
        assert!(growth.months[11].figures.new_customers > base.months[11].figures.new_customers);
        assert!(growth.summary.total_costs > base.summary.total_costs);
    }

    #[test]
    fn test_profitability_optimization_raises_price_from_month_four() {
        let base = with_goal(OptimizationGoal::Balanced);
        let profit = with_goal(OptimizationGoal::Profitability);

        for (i, (b, p)) in base.months.iter().zip(&profit.months).enumerate() {
            assert_relative_eq!(p.figures.gross_margin, 0.88);
            if i < 3 {
                assert_relative_eq!(p.figures.mrr, b.figures.mrr);
            } else {
                assert_relative_eq!(p.figures.mrr, b.figures.mrr * 1.2);
            }
            assert_relative_eq!(p.figures.total_costs, b.figures.total_costs);
        }
        assert!(profit.months[11].figures.cash_balance > base.months[11].figures.cash_balance);
    }

    #[test]
    fn test_runway_optimization_lowers_costs() {
        let mut balanced = PlanAssumptions::default();
        balanced.optimize_for = OptimizationGoal::Balanced;
        let base = create_12month_plan(&company(), &balanced, 2025).unwrap();
        let lean = create_12month_plan(&company(), &PlanAssumptions::default(), 2025).unwrap();

        assert!(lean.summary.total_costs < base.summary.total_costs);
        assert!(lean.months[11].figures.cash_balance > base.months[11].figures.cash_balance);
    }

    #[test]
    fn test_create_plan_rejects_invalid_inputs() {
        let mut bad_company = company();
        bad_company.monthly_price = 0.0;
        assert!(create_12month_plan(&bad_company, &PlanAssumptions::default(), 2025).is_err());

        let mut a = PlanAssumptions::default();
        a.churn_rate = 1.5;
        assert!(create_12month_plan(&company(), &a, 2025).is_err());
    }

    #[test]
    fn test_summary_breakeven_and_peak_need() {
        let mut months: Vec<MonthlyPlan> = (1..=3).map(|m| MonthlyPlan::new(None, 2025, m)).collect();
        for (plan, (mrr, costs)) in months
            .iter_mut()
            .zip([(10.0, 30.0), (20.0, 25.0), (60.0, 20.0)])
        {
            plan.figures.mrr = mrr;
            plan.figures.total_costs = costs;
        }
        let summary = summarize(&months);
        assert_eq!(summary.breakeven_month, Some(3));
        assert_relative_eq!(summary.peak_cash_need, 25.0);
        assert_relative_eq!(summary.suggested_raise, 75.0);
        assert_relative_eq!(summary.mrr_cagr, 6f64.powf(0.5) - 1.0);
    }

    #[test]
    fn test_feasibility_penalties() {
        let summary = PlanSummary {
            total_revenue: 0.0,
            total_costs: 0.0,
            total_capex: 0.0,
            starting_mrr: 10_000.0,
            ending_mrr: 20_000.0,
            ending_customers: 50,
            ending_team: 4,
            mrr_cagr: 0.06,
            average_growth: 0.06,
            average_ltv_cac: 1.5,
            average_payback_months: 20.0,
            average_burn: 10_000.0,
            min_runway: 4.0,
            breakeven_month: None,
            peak_cash_need: 0.0,
            suggested_raise: 0.0,
        };
        let result = assess_feasibility(&summary);
        // high -20, critical -30, medium warning -5
        assert_eq!(result.score, 45.0);
        assert_eq!(result.rating, "low");
        assert_eq!(result.issues.len(), 2);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_plan_vs_actual_status() {
        let mut months: Vec<MonthlyPlan> = (1..=3).map(|m| MonthlyPlan::new(Some(1), 2025, m)).collect();
        months[0].figures.mrr = 1_000.0;

        let mut january = ActualData::new(
            1,
            2025,
            1,
            MonthlyFigures {
                mrr: 900.0,
                ..Default::default()
            },
        );
        january.is_finalized = true;
        let february = ActualData::new(1, 2025, 2, MonthlyFigures::default());

        let rows = plan_vs_actual_summary(&months, &[january, february]);
        assert_eq!(rows[0].status, "finalized");
        assert_eq!(rows[0].actual_mrr, Some(900.0));
        assert_eq!(rows[1].status, "in_progress");
        assert_eq!(rows[2].status, "planned");
        assert_eq!(rows[2].actual_mrr, None);
    }
}
