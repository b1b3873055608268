use crate::core::runway::INFINITE_RUNWAY;
use crate::core::unit_economics::{cac, cac_payback_months, customer_churn_rate, ltv_cac_ratio, simple_ltv};
use crate::domain::model::{ActualData, MonthlyFigures, MonthlyPlan};
use crate::utils::error::Result;
use crate::utils::math::{mean, safe_divide};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ActualValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

pub fn validate_actual(actual: &ActualData) -> ActualValidation {
    let mut result = ActualValidation::default();

    if !(2020..=2030).contains(&actual.year) {
        result.errors.push(format!("Year {} is outside 2020-2030", actual.year));
    }
    if !(1..=12).contains(&actual.month_number) {
        result
            .errors
            .push(format!("Month {} is outside 1-12", actual.month_number));
    }

    let f = &actual.figures;
    let monetary = [
        ("mrr", f.mrr),
        ("expansion_mrr", f.expansion_mrr),
        ("marketing_spend", f.marketing_spend),
        ("sales_spend", f.sales_spend),
        ("salaries", f.opex.salaries),
        ("cash_balance", f.cash_balance),
    ];
    for (name, value) in monetary {
        if value < 0.0 {
            result.warnings.push(format!("{} has a negative value ({:.2})", name, value));
        }
    }

    result
}

/// 補齊未填的衍生欄位；previous 為本月之前的實際資料 (依期間排序)
pub fn derive_fields(figures: &mut MonthlyFigures, previous: &[ActualData]) {
    if figures.total_revenue == 0.0 {
        figures.total_revenue = figures.mrr + figures.expansion_mrr + figures.reactivated_mrr;
    }
    if figures.total_costs == 0.0 {
        figures.total_costs = figures.operating_costs() + figures.capex.total();
    }
    figures.burn_rate = (figures.total_costs - figures.total_revenue).max(0.0);

    if figures.churn_rate == 0.0 && figures.churned_customers > 0 {
        let starting = (figures.total_customers + figures.churned_customers).saturating_sub(figures.new_customers);
        figures.churn_rate = customer_churn_rate(figures.churned_customers, starting);
    }
    if figures.cac == 0.0 {
        figures.cac = cac(figures.acquisition_spend(), figures.new_customers);
    }

    let arpu = figures.arpu();
    if figures.ltv == 0.0 && arpu > 0.0 {
        figures.ltv = simple_ltv(arpu, figures.churn_rate);
    }
    if figures.ltv_cac_ratio == 0.0 {
        figures.ltv_cac_ratio = ltv_cac_ratio(figures.ltv, figures.cac);
    }
    if figures.cac_payback_months == 0.0 {
        figures.cac_payback_months = cac_payback_months(figures.cac, arpu);
    }

    // 近三個月 (含本月) 的平均燒錢率
    let mut burns: Vec<f64> = previous
        .iter()
        .rev()
        .take(2)
        .map(|a| a.figures.burn_rate)
        .collect();
    burns.push(figures.burn_rate);
    let avg_burn = mean(&burns);
    figures.runway_months = if avg_burn > 0.0 {
        figures.cash_balance.max(0.0) / avg_burn
    } else {
        INFINITE_RUNWAY
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionStatus {
    pub percent: f64,
    pub status: String,
    pub completed_fields: usize,
    pub total_fields: usize,
}

pub fn completion_status(figures: &MonthlyFigures) -> CompletionStatus {
    let required = [
        figures.mrr,
        figures.new_customers as f64,
        figures.total_revenue,
        figures.total_costs,
    ];
    let completed = required.iter().filter(|v| **v != 0.0).count();
    let percent = completed as f64 / required.len() as f64 * 100.0;
    let status = if percent >= 90.0 {
        "complete"
    } else if percent >= 70.0 {
        "mostly_complete"
    } else if percent >= 50.0 {
        "partial"
    } else {
        "incomplete"
    };

    CompletionStatus {
        percent,
        status: status.to_string(),
        completed_fields: completed,
        total_fields: required.len(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecommendations {
    pub immediate: Vec<String>,
    pub short_term: Vec<String>,
    pub long_term: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub year: i32,
    pub month_number: u32,
    pub mrr: f64,
    pub net_new_customers: i64,
    pub total_revenue: f64,
    pub total_costs: f64,
    pub cost_shares: BTreeMap<String, f64>,
    pub gross_margin: f64,
    pub profit_margin: f64,
    pub burn_rate: f64,
    pub runway_months: f64,
    pub net_cash_flow: f64,
    pub vs_plan_pct: Option<BTreeMap<String, f64>>,
    pub completion: CompletionStatus,
    pub recommendations: MonthlyRecommendations,
}

impl MonthlyReport {
    pub fn build(actual: &ActualData, plan: Option<&MonthlyPlan>) -> Self {
        let f = &actual.figures;
        let revenue = f.total_revenue;
        let costs = f.total_costs;

        let share = |value: f64| safe_divide(value, costs, 0.0) * 100.0;
        let cost_shares: BTreeMap<String, f64> = [
            ("salaries", share(f.opex.salaries)),
            ("marketing", share(f.marketing_spend)),
            ("sales", share(f.sales_spend)),
            ("cloud_services", share(f.opex.cloud_services)),
            ("office_rent", share(f.opex.office_rent)),
            ("capex", share(f.capex.total())),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let vs_plan_pct = plan.map(|p| {
            let pct = |plan: f64, actual: f64| safe_divide(actual - plan, plan, 0.0) * 100.0;
            let pf = &p.figures;
            [
                ("mrr", pct(pf.mrr, f.mrr)),
                ("total_revenue", pct(pf.total_revenue, revenue)),
                ("total_costs", pct(pf.total_costs, costs)),
                ("burn_rate", pct(pf.burn_rate, f.burn_rate)),
                ("new_customers", pct(pf.new_customers as f64, f.new_customers as f64)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
        });

        MonthlyReport {
            year: actual.year,
            month_number: actual.month_number,
            mrr: f.mrr,
            net_new_customers: f.new_customers as i64 - f.churned_customers as i64,
            total_revenue: revenue,
            total_costs: costs,
            cost_shares,
            gross_margin: safe_divide(revenue - f.opex.cloud_services * 0.2, revenue, 0.0),
            profit_margin: safe_divide(revenue - costs, revenue, 0.0),
            burn_rate: f.burn_rate,
            runway_months: f.runway_months,
            net_cash_flow: revenue - costs,
            vs_plan_pct,
            completion: completion_status(f),
            recommendations: recommendations(f, plan),
        }
    }
}

fn recommendations(f: &MonthlyFigures, plan: Option<&MonthlyPlan>) -> MonthlyRecommendations {
    let mut recs = MonthlyRecommendations::default();

    if f.burn_rate > 0.0 {
        if f.runway_months < 6.0 {
            recs.immediate.push(format!(
                "Runway is only {:.1} months: cut burn or start fundraising now",
                f.runway_months
            ));
        } else if f.runway_months < 12.0 {
            recs.short_term.push("Start preparing the next funding round".to_string());
        }
    }

    if let Some(p) = plan {
        if f.total_revenue < p.figures.total_revenue * 0.8 {
            recs.immediate
                .push("Revenue is well below plan: revisit sales and marketing strategy".to_string());
        }
        if (f.new_customers as f64) < p.figures.new_customers as f64 * 0.7 {
            recs.short_term
                .push("New customers are below plan: optimize acquisition channels".to_string());
        }
    }

    recs.long_term.push("Review and update the financial plan regularly".to_string());
    recs.long_term
        .push("Set up alerts for critical plan deviations".to_string());
    recs
}

/// 匯入用的 CSV 列，只有 year 與 month 必填
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActualCsvRow {
    pub year: i32,
    pub month: u32,
    pub mrr: f64,
    pub new_customers: u32,
    pub total_customers: u32,
    pub churned_customers: u32,
    pub expansion_mrr: f64,
    pub churned_mrr: f64,
    pub marketing_spend: f64,
    pub sales_spend: f64,
    pub salaries: f64,
    pub office_rent: f64,
    pub cloud_services: f64,
    pub software_subscriptions: f64,
    pub other_opex: f64,
    pub total_revenue: f64,
    pub total_costs: f64,
    pub cash_balance: f64,
    pub notes: Option<String>,
}

impl ActualCsvRow {
    pub fn into_actual(self, company_id: i64) -> ActualData {
        let mut figures = MonthlyFigures {
            mrr: self.mrr,
            new_customers: self.new_customers,
            total_customers: self.total_customers,
            churned_customers: self.churned_customers,
            expansion_mrr: self.expansion_mrr,
            churned_mrr: self.churned_mrr,
            marketing_spend: self.marketing_spend,
            sales_spend: self.sales_spend,
            total_revenue: self.total_revenue,
            total_costs: self.total_costs,
            cash_balance: self.cash_balance,
            ..Default::default()
        };
        figures.opex.salaries = self.salaries;
        figures.opex.office_rent = self.office_rent;
        figures.opex.cloud_services = self.cloud_services;
        figures.opex.software_subscriptions = self.software_subscriptions;
        figures.opex.other = self.other_opex;

        let mut actual = ActualData::new(company_id, self.year, self.month, figures);
        actual.notes = self.notes.filter(|n| !n.trim().is_empty());
        actual
    }
}

pub fn read_actuals_csv<R: std::io::Read>(reader: R, company_id: i64) -> Result<Vec<ActualData>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut actuals = Vec::new();
    for row in rdr.deserialize() {
        let row: ActualCsvRow = row?;
        actuals.push(row.into_actual(company_id));
    }
    Ok(actuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn figures() -> MonthlyFigures {
        let mut f = MonthlyFigures {
            mrr: 10_000.0,
            new_customers: 5,
            total_customers: 50,
            churned_customers: 5,
            marketing_spend: 3_000.0,
            sales_spend: 2_000.0,
            cash_balance: 120_000.0,
            ..Default::default()
        };
        f.opex.salaries = 20_000.0;
        f.opex.cloud_services = 1_000.0;
        f
    }

    #[test]
    fn test_validate_actual() {
        let ok = ActualData::new(1, 2025, 3, figures());
        assert!(validate_actual(&ok).is_valid());

        let mut bad = ActualData::new(1, 2019, 13, figures());
        bad.figures.mrr = -5.0;
        let result = validate_actual(&bad);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_derive_fields_fills_blanks() {
        let mut f = figures();
        derive_fields(&mut f, &[]);
        assert_relative_eq!(f.total_revenue, 10_000.0);
        assert_relative_eq!(f.total_costs, 26_000.0);
        assert_relative_eq!(f.burn_rate, 16_000.0);
        assert_relative_eq!(f.churn_rate, 0.1);
        assert_relative_eq!(f.cac, 1_000.0);
        // arpu 200 / churn 0.1
        assert_relative_eq!(f.ltv, 2_000.0);
        assert_relative_eq!(f.ltv_cac_ratio, 2.0);
        assert_relative_eq!(f.cac_payback_months, 5.0);
        assert_relative_eq!(f.runway_months, 7.5);
    }

    #[test]
    fn test_derive_fields_averages_recent_burn() {
        let mut older = ActualData::new(1, 2025, 1, MonthlyFigures::default());
        older.figures.burn_rate = 100_000.0;
        let mut prev1 = ActualData::new(1, 2025, 2, MonthlyFigures::default());
        prev1.figures.burn_rate = 8_000.0;
        let mut prev2 = ActualData::new(1, 2025, 3, MonthlyFigures::default());
        prev2.figures.burn_rate = 12_000.0;

        let mut f = figures();
        derive_fields(&mut f, &[older, prev1, prev2]);
        // (8000 + 12000 + 16000) / 3
        assert_relative_eq!(f.runway_months, 10.0);
    }

    #[test]
    fn test_derive_fields_profitable_runway() {
        let mut f = figures();
        f.mrr = 50_000.0;
        derive_fields(&mut f, &[]);
        assert_eq!(f.burn_rate, 0.0);
        assert_eq!(f.runway_months, INFINITE_RUNWAY);
    }

    #[test]
    fn test_monthly_report_against_plan() {
        let mut actual = ActualData::new(1, 2025, 4, figures());
        derive_fields(&mut actual.figures, &[]);

        let mut plan = MonthlyPlan::new(Some(1), 2025, 4);
        plan.figures.total_revenue = 20_000.0;
        plan.figures.mrr = 20_000.0;
        plan.figures.new_customers = 10;

        let report = MonthlyReport::build(&actual, Some(&plan));
        assert_relative_eq!(report.gross_margin, 0.98);
        assert_relative_eq!(report.profit_margin, -1.6);
        assert_eq!(report.net_new_customers, 0);
        let vs = report.vs_plan_pct.unwrap();
        assert_relative_eq!(vs["mrr"], -50.0);
        assert_eq!(vs["total_costs"], 0.0);
        assert_eq!(report.completion.status, "complete");
        assert_eq!(report.recommendations.immediate.len(), 1);
        assert_eq!(report.recommendations.short_term.len(), 2);

        let salaries = report.cost_shares["salaries"];
        assert_relative_eq!(salaries, 20_000.0 / 26_000.0 * 100.0);
    }

    #[test]
    fn test_read_actuals_csv() {
        let data = "year,month,mrr,new_customers,total_customers,salaries,cash_balance,notes\n\
                    2025, 1, 12000, 4, 40, 30000, 200000,\n\
                    2025, 2, 13500, 5, 44, 30000, 185000,good month\n";
        let actuals = read_actuals_csv(data.as_bytes(), 3).unwrap();
        assert_eq!(actuals.len(), 2);
        assert_eq!(actuals[0].company_id, 3);
        assert_eq!(actuals[0].notes, None);
        assert_eq!(actuals[1].period(), (2025, 2));
        assert_eq!(actuals[1].figures.opex.salaries, 30_000.0);
        assert_eq!(actuals[1].notes.as_deref(), Some("good month"));
    }

    #[test]
    fn test_read_actuals_csv_rejects_bad_numbers() {
        let data = "year,month,mrr\n2025,1,lots\n";
        assert!(read_actuals_csv(data.as_bytes(), 1).is_err());
    }
}
