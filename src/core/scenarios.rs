use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::{Scenario, ScenarioType};
use crate::utils::math::safe_divide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SIMULATION_MONTHS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTemplate {
    pub key: String,
    pub name: String,
    pub description: String,
    pub scenario_type: ScenarioType,
    pub changes: BTreeMap<String, f64>,
    pub duration_months: u32,
    pub probability: f64,
}

fn template(
    key: &str,
    name: &str,
    description: &str,
    scenario_type: ScenarioType,
    changes: &[(&str, f64)],
    duration_months: u32,
    probability: f64,
) -> ScenarioTemplate {
    ScenarioTemplate {
        key: key.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        scenario_type,
        changes: changes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        duration_months,
        probability,
    }
}

pub fn templates() -> Vec<ScenarioTemplate> {
    vec![
        template(
            "growth_acceleration",
            "Growth Acceleration",
            "Faster revenue growth funded by more marketing and hiring",
            ScenarioType::Optimistic,
            &[
                ("mrr_growth_rate", 0.30),
                ("customer_growth", 0.25),
                ("marketing", 0.20),
                ("salaries", 0.15),
            ],
            12,
            0.4,
        ),
        template(
            "cost_reduction",
            "Cost Reduction",
            "Trim payroll, marketing and infrastructure spend",
            ScenarioType::Custom,
            &[
                ("salaries", -0.15),
                ("marketing", -0.10),
                ("cloud", -0.20),
                ("other_opex", -0.25),
            ],
            6,
            0.6,
        ),
        template(
            "fundraising",
            "Fundraising Round",
            "Close a round and reinvest in growth",
            ScenarioType::Optimistic,
            &[("cash", 2.0), ("marketing", 0.40), ("salaries", 0.30)],
            18,
            0.3,
        ),
        template(
            "market_downturn",
            "Market Downturn",
            "Slower growth, higher churn and pricier acquisition",
            ScenarioType::Pessimistic,
            &[
                ("mrr_growth_rate", -0.40),
                ("customer_growth", -0.35),
                ("churn_rate", 0.20),
                ("cac", 0.15),
            ],
            12,
            0.25,
        ),
        template(
            "pricing_increase",
            "Pricing Increase",
            "Raise prices at the cost of some churn and slower acquisition",
            ScenarioType::Custom,
            &[
                ("average_price", 0.20),
                ("churn_rate", 0.05),
                ("customer_growth", -0.10),
            ],
            12,
            0.5,
        ),
    ]
}

pub fn find_template(key: &str) -> Option<ScenarioTemplate> {
    templates().into_iter().find(|t| t.key == key)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostComponents {
    pub salaries: f64,
    pub marketing: f64,
    pub cloud: f64,
    pub other: f64,
}

impl CostComponents {
    /// 沒有成本明細時依 60/20/10/10 拆分燒錢率
    pub fn split_burn(burn_rate: f64) -> Self {
        Self {
            salaries: burn_rate * 0.6,
            marketing: burn_rate * 0.2,
            cloud: burn_rate * 0.1,
            other: burn_rate * 0.1,
        }
    }

    pub fn total(&self) -> f64 {
        self.salaries + self.marketing + self.cloud + self.other
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMetrics {
    pub mrr: f64,
    pub customers: u32,
    pub burn_rate: f64,
    pub cash: f64,
    pub monthly_growth_rate: f64,
    pub churn_rate: f64,
    pub cac: f64,
    pub average_price: f64,
    pub acquisition_multiplier: f64,
    pub costs: CostComponents,
}

impl BaseMetrics {
    pub fn new(mrr: f64, customers: u32, burn_rate: f64, cash: f64) -> Self {
        Self {
            mrr,
            customers,
            burn_rate,
            cash,
            monthly_growth_rate: 0.1,
            churn_rate: 0.05,
            cac: 1000.0,
            average_price: safe_divide(mrr, customers as f64, 0.0),
            acquisition_multiplier: 1.0,
            costs: CostComponents::split_burn(burn_rate),
        }
    }

    pub fn from_snapshot(snapshot: &MetricsSnapshot) -> Self {
        let mut base = Self::new(
            snapshot.mrr,
            snapshot.customers,
            snapshot.burn_rate,
            snapshot.cash_balance,
        );
        if snapshot.monthly_growth_rate != 0.0 {
            base.monthly_growth_rate = snapshot.monthly_growth_rate;
        }
        if snapshot.monthly_churn_rate > 0.0 {
            base.churn_rate = snapshot.monthly_churn_rate;
        }
        if snapshot.cac > 0.0 {
            base.cac = snapshot.cac;
        }
        if snapshot.arpu > 0.0 {
            base.average_price = snapshot.arpu;
        }
        base
    }

    /// 以 (1 + delta) 相乘套用變動，未知的鍵略過
    pub fn with_changes(&self, changes: &BTreeMap<String, f64>) -> Self {
        let mut next = self.clone();
        for (key, delta) in changes {
            let factor = 1.0 + delta;
            match key.as_str() {
                "mrr_growth_rate" => next.monthly_growth_rate *= factor,
                "customer_growth" => next.acquisition_multiplier *= factor,
                "churn_rate" => next.churn_rate *= factor,
                "cac" => next.cac *= factor,
                "average_price" => next.average_price *= factor,
                "cash" => next.cash *= factor,
                "mrr" => next.mrr *= factor,
                "salaries" => next.costs.salaries *= factor,
                "marketing" => next.costs.marketing *= factor,
                "cloud" => next.costs.cloud *= factor,
                "other_opex" => next.costs.other *= factor,
                other => tracing::warn!("⚠️ Unknown scenario change '{}' ignored", other),
            }
        }
        next.burn_rate = (next.costs.total() - next.mrr).max(0.0);
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMonth {
    pub month: u32,
    pub customers: u32,
    pub new_customers: u32,
    pub churned_customers: u32,
    pub mrr: f64,
    pub costs: f64,
    pub cash_flow: f64,
    pub cash: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub changes: BTreeMap<String, f64>,
    pub probability: Option<f64>,
    pub months: Vec<ScenarioMonth>,
    pub final_mrr: f64,
    pub final_customers: u32,
    pub final_cash: f64,
    pub breakeven_month: Option<u32>,
    pub peak_cash_requirement: f64,
}

pub fn simulate(name: &str, base: &BaseMetrics, changes: &BTreeMap<String, f64>, months: u32) -> ScenarioResult {
    let params = base.with_changes(changes);
    let costs = params.costs.total();

    let mut customers = params.customers;
    let mut mrr = params.mrr;
    let mut cash = params.cash;
    let mut trajectory = Vec::with_capacity(months as usize);

    for month in 1..=months {
        let new_customers = if params.cac > 0.0 {
            (params.costs.marketing / params.cac * params.acquisition_multiplier)
                .floor()
                .max(0.0) as u32
        } else {
            0
        };
        let churned_customers = (customers as f64 * params.churn_rate).floor() as u32;
        customers = (customers + new_customers).saturating_sub(churned_customers);

        if month > 1 {
            mrr += mrr * params.monthly_growth_rate * 0.3 + new_customers as f64 * params.average_price
                - churned_customers as f64 * params.average_price;
            mrr = mrr.max(0.0);
        }

        let cash_flow = mrr - costs;
        cash += cash_flow;

        trajectory.push(ScenarioMonth {
            month,
            customers,
            new_customers,
            churned_customers,
            mrr,
            costs,
            cash_flow,
            cash,
        });
    }

    // 連續三個月現金流為正才算損益兩平
    let breakeven_month = trajectory
        .windows(3)
        .find(|w| w.iter().all(|m| m.cash_flow >= 0.0))
        .map(|w| w[0].month);

    let lowest_cash = trajectory.iter().map(|m| m.cash).fold(0.0f64, f64::min);

    ScenarioResult {
        name: name.to_string(),
        changes: changes.clone(),
        probability: None,
        final_mrr: mrr,
        final_customers: customers,
        final_cash: cash,
        breakeven_month,
        peak_cash_requirement: lowest_cash.abs(),
        months: trajectory,
    }
}

pub fn run_template(base: &BaseMetrics, template: &ScenarioTemplate, months: u32) -> ScenarioResult {
    let mut result = simulate(&template.key, base, &template.changes, months);
    result.probability = Some(template.probability);
    result
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub base: ScenarioResult,
    /// 依期末現金由高到低排列
    pub ranked: Vec<ScenarioResult>,
}

impl ScenarioComparison {
    pub fn best(&self) -> Option<&ScenarioResult> {
        self.ranked.first()
    }

    pub fn worst(&self) -> Option<&ScenarioResult> {
        self.ranked.last()
    }
}

pub fn compare_scenarios(base: &BaseMetrics, months: u32) -> ScenarioComparison {
    let base_result = simulate("base", base, &BTreeMap::new(), months);
    let mut ranked: Vec<ScenarioResult> = templates()
        .iter()
        .map(|t| run_template(base, t, months))
        .collect();
    ranked.sort_by(|a, b| b.final_cash.total_cmp(&a.final_cash));

    ScenarioComparison {
        base: base_result,
        ranked,
    }
}

/// 將模擬結果轉為可儲存的情境
pub fn to_scenario(
    company_id: i64,
    plan_id: Option<i64>,
    template: Option<&ScenarioTemplate>,
    result: &ScenarioResult,
) -> crate::utils::error::Result<Scenario> {
    Ok(Scenario {
        id: None,
        company_id,
        plan_id,
        name: template.map(|t| t.name.clone()).unwrap_or_else(|| result.name.clone()),
        description: template.map(|t| t.description.clone()),
        scenario_type: template.map(|t| t.scenario_type).unwrap_or(ScenarioType::Custom),
        changes: result.changes.clone(),
        results: Some(serde_json::to_value(result)?),
        created_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn base() -> BaseMetrics {
        let mut b = BaseMetrics::new(10_000.0, 100, 20_000.0, 100_000.0);
        b.cac = 1_000.0;
        b
    }

    #[test]
    fn test_burn_split_when_no_components() {
        let b = base();
        assert_relative_eq!(b.costs.salaries, 12_000.0);
        assert_relative_eq!(b.costs.marketing, 4_000.0);
        assert_relative_eq!(b.costs.total(), 20_000.0);
        assert_relative_eq!(b.average_price, 100.0);
    }

    #[test]
    fn test_changes_are_multiplicative() {
        let changes: BTreeMap<String, f64> = [("salaries".to_string(), -0.5), ("bogus".to_string(), 1.0)]
            .into_iter()
            .collect();
        let next = base().with_changes(&changes);
        assert_relative_eq!(next.costs.salaries, 6_000.0);
        assert_relative_eq!(next.costs.marketing, 4_000.0);
    }

    #[test]
    fn test_simulate_base_month_by_month() {
        let result = simulate("base", &base(), &BTreeMap::new(), 3);
        let first = &result.months[0];
        assert_eq!(first.new_customers, 4);
        assert_eq!(first.churned_customers, 5);
        assert_eq!(first.customers, 99);
        assert_relative_eq!(first.mrr, 10_000.0);
        assert_relative_eq!(first.cash, 90_000.0);

        let second = &result.months[1];
        // 10000 + 10000*0.1*0.3 + 4*100 - 4*100
        assert_relative_eq!(second.mrr, 10_300.0);
        assert_eq!(result.breakeven_month, None);
        assert_eq!(result.peak_cash_requirement, 0.0);
    }

    #[test]
    fn test_breakeven_needs_three_positive_months() {
        let mut b = base();
        b.mrr = 25_000.0;
        let result = simulate("rich", &b, &BTreeMap::new(), 6);
        assert_eq!(result.breakeven_month, Some(1));
    }

    #[test]
    fn test_compare_scenarios_ranks_by_cash() {
        let comparison = compare_scenarios(&base(), DEFAULT_SIMULATION_MONTHS);
        assert_eq!(comparison.ranked.len(), 5);
        assert_eq!(comparison.best().unwrap().name, "fundraising");
        let cash: Vec<f64> = comparison.ranked.iter().map(|r| r.final_cash).collect();
        assert!(cash.windows(2).all(|w| w[0] >= w[1]));
        assert!(comparison.ranked.iter().all(|r| r.probability.is_some()));
    }

    #[test]
    fn test_to_scenario_keeps_results() {
        let t = find_template("market_downturn").unwrap();
        let result = run_template(&base(), &t, 6);
        let scenario = to_scenario(1, None, Some(&t), &result).unwrap();
        assert_eq!(scenario.scenario_type, ScenarioType::Pessimistic);
        assert_eq!(scenario.changes.get("churn_rate"), Some(&0.20));
        assert!(scenario.results.unwrap().get("final_cash").is_some());
    }
}
