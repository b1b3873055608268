use crate::domain::model::{ActualData, Company};
use crate::utils::math::safe_divide;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 流失率為 0 時 LTV 以此月數封頂
pub const LTV_HORIZON_MONTHS: u32 = 60;
pub const DEFAULT_GROSS_MARGIN: f64 = 0.8;

pub fn customer_churn_rate(churned: u32, starting_customers: u32) -> f64 {
    safe_divide(churned as f64, starting_customers as f64, 0.0)
}

pub fn revenue_churn_rate(churned_mrr: f64, starting_mrr: f64) -> f64 {
    safe_divide(churned_mrr, starting_mrr, 0.0)
}

pub fn net_revenue_retention(starting_mrr: f64, expansion: f64, churned: f64, contraction: f64) -> f64 {
    safe_divide(starting_mrr + expansion - churned - contraction, starting_mrr, 0.0)
}

pub fn cac(acquisition_spend: f64, new_customers: u32) -> f64 {
    safe_divide(acquisition_spend, new_customers as f64, 0.0)
}

pub fn arpu(mrr: f64, customers: u32) -> f64 {
    safe_divide(mrr, customers as f64, 0.0)
}

pub fn simple_ltv(arpu: f64, monthly_churn: f64) -> f64 {
    if monthly_churn <= 0.0 {
        return arpu * LTV_HORIZON_MONTHS as f64;
    }
    arpu / monthly_churn
}

/// 以月折現的 LTV，annual_discount_rate 例如 0.1
pub fn discounted_ltv(monthly_revenue: f64, monthly_churn: f64, annual_discount_rate: f64, periods: u32) -> f64 {
    let survival = (1.0 - monthly_churn).clamp(0.0, 1.0);
    let monthly_discount = 1.0 + annual_discount_rate / 12.0;

    (0..periods)
        .map(|t| monthly_revenue * survival.powi(t as i32) / monthly_discount.powi(t as i32))
        .sum()
}

pub fn ltv_cac_ratio(ltv: f64, cac: f64) -> f64 {
    safe_divide(ltv, cac, 0.0)
}

pub fn cac_payback_months(cac: f64, arpu: f64) -> f64 {
    safe_divide(cac, arpu, 0.0)
}

pub fn gross_margin(revenue: f64, cost_of_revenue: f64) -> f64 {
    safe_divide(revenue - cost_of_revenue, revenue, 0.0)
}

pub fn burn_rate(costs: f64, revenue: f64) -> f64 {
    (costs - revenue).max(0.0)
}

pub fn mrr_growth_rate(previous_mrr: f64, current_mrr: f64) -> f64 {
    safe_divide(current_mrr - previous_mrr, previous_mrr, 0.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOf40 {
    pub score: f64,
    pub rating: String,
    pub passes: bool,
}

/// 成長率與利潤率皆以百分比傳入
pub fn rule_of_40(growth_pct: f64, profit_margin_pct: f64) -> RuleOf40 {
    let score = growth_pct + profit_margin_pct;
    let rating = if score >= 50.0 {
        "excellent"
    } else if score >= 40.0 {
        "great"
    } else if score >= 30.0 {
        "good"
    } else if score >= 20.0 {
        "fair"
    } else {
        "poor"
    };

    RuleOf40 {
        score,
        rating: rating.to_string(),
        passes: score >= 40.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEconomicsAssessment {
    pub ltv: f64,
    pub cac: f64,
    pub ratio: f64,
    pub rating: String,
    pub payback_months: f64,
    pub scalability_score: f64,
    pub recommendation: String,
}

pub fn assess_ltv_cac(ltv: f64, cac: f64) -> UnitEconomicsAssessment {
    let ratio = ltv_cac_ratio(ltv, cac);
    let (rating, recommendation) = if ratio >= 3.0 {
        ("Excellent", "Unit economics support scaling acquisition spend")
    } else if ratio >= 2.0 {
        ("Good", "Healthy, look for retention gains before scaling further")
    } else if ratio >= 1.5 {
        ("Fair", "Improve pricing or lower CAC before increasing spend")
    } else if ratio >= 1.0 {
        ("Concerning", "Acquisition barely pays back; review channels and churn")
    } else {
        ("Critical", "Each new customer loses money; stop scaling paid acquisition")
    };

    UnitEconomicsAssessment {
        ltv,
        cac,
        ratio,
        rating: rating.to_string(),
        payback_months: safe_divide(cac, ltv / 12.0, 0.0),
        scalability_score: (ratio * 20.0).min(100.0),
        recommendation: recommendation.to_string(),
    }
}

/// 公司在某一時點的關鍵指標
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub period: Option<(i32, u32)>,
    pub mrr: f64,
    pub arr: f64,
    pub customers: u32,
    pub arpu: f64,
    pub burn_rate: f64,
    pub cash_balance: f64,
    /// None 表示現金流為正，跑道無限
    pub runway_months: Option<f64>,
    pub monthly_growth_rate: f64,
    pub monthly_churn_rate: f64,
    pub cac: f64,
    pub ltv: f64,
    pub ltv_cac_ratio: f64,
    pub cac_payback_months: f64,
    pub gross_margin: f64,
    pub net_revenue_retention: f64,
    pub burn_to_mrr_ratio: f64,
    pub revenue_per_employee: f64,
}

impl MetricsSnapshot {
    pub fn from_company(company: &Company) -> Self {
        let mrr = company.current_mrr;
        let arpu = if company.current_customers > 0 {
            arpu(mrr, company.current_customers)
        } else {
            company.monthly_price
        };

        Self {
            period: None,
            mrr,
            arr: mrr * 12.0,
            customers: company.current_customers,
            arpu,
            cash_balance: company.cash_balance,
            gross_margin: DEFAULT_GROSS_MARGIN,
            net_revenue_retention: 1.0,
            revenue_per_employee: safe_divide(mrr * 12.0, company.team_size as f64, 0.0),
            ..Default::default()
        }
    }

    pub fn from_actuals(company: &Company, actuals: &[ActualData]) -> Self {
        let mut ordered: Vec<&ActualData> = actuals.iter().collect();
        ordered.sort_by_key(|a| a.period());

        let Some(latest) = ordered.last() else {
            return Self::from_company(company);
        };
        let previous = ordered.len().checked_sub(2).and_then(|i| ordered.get(i));
        let f = &latest.figures;

        let mrr = f.mrr;
        let customers = f.total_customers;
        let arpu = arpu(mrr, customers);

        let starting_customers = (customers + f.churned_customers).saturating_sub(f.new_customers);
        let churn = if f.churn_rate > 0.0 {
            f.churn_rate
        } else {
            customer_churn_rate(f.churned_customers, starting_customers)
        };

        let cac = if f.cac > 0.0 {
            f.cac
        } else {
            cac(f.acquisition_spend(), f.new_customers)
        };

        let gross_margin = if f.gross_margin > 0.0 {
            f.gross_margin
        } else {
            DEFAULT_GROSS_MARGIN
        };
        let ltv = simple_ltv(arpu * gross_margin, churn);

        let growth = previous
            .map(|p| mrr_growth_rate(p.figures.mrr, mrr))
            .unwrap_or(0.0);

        let starting_mrr = previous
            .map(|p| p.figures.mrr)
            .unwrap_or(mrr - f.expansion_mrr + f.churned_mrr);

        let runway = if f.burn_rate > 0.0 {
            Some(f.cash_balance.max(0.0) / f.burn_rate)
        } else {
            None
        };

        Self {
            period: Some(latest.period()),
            mrr,
            arr: mrr * 12.0,
            customers,
            arpu,
            burn_rate: f.burn_rate,
            cash_balance: f.cash_balance,
            runway_months: runway,
            monthly_growth_rate: growth,
            monthly_churn_rate: churn,
            cac,
            ltv,
            ltv_cac_ratio: ltv_cac_ratio(ltv, cac),
            cac_payback_months: cac_payback_months(cac, arpu),
            gross_margin,
            net_revenue_retention: net_revenue_retention(starting_mrr, f.expansion_mrr, f.churned_mrr, 0.0),
            burn_to_mrr_ratio: safe_divide(f.burn_rate, mrr, 0.0),
            revenue_per_employee: safe_divide(mrr * 12.0, company.team_size as f64, 0.0),
        }
    }

    /// 跑道無限時以 999 表示，方便與基準比較
    pub fn runway_or_sentinel(&self) -> f64 {
        self.runway_months.unwrap_or(crate::core::runway::INFINITE_RUNWAY)
    }

    /// 以基準表中的指標名稱輸出
    pub fn benchmark_values(&self) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        values.insert("mrr_growth_monthly".to_string(), self.monthly_growth_rate);
        values.insert("gross_margin".to_string(), self.gross_margin);
        values.insert("net_revenue_retention".to_string(), self.net_revenue_retention);
        values.insert("runway_months".to_string(), self.runway_or_sentinel());
        values.insert("revenue_per_employee".to_string(), self.revenue_per_employee);
        values.insert("monthly_churn_rate".to_string(), self.monthly_churn_rate);

        // 沒有取得成本資料時不參與評分
        if self.cac > 0.0 {
            values.insert("cac".to_string(), self.cac);
            values.insert("ltv_cac_ratio".to_string(), self.ltv_cac_ratio);
            values.insert("cac_payback_months".to_string(), self.cac_payback_months);
        }
        if self.mrr > 0.0 {
            values.insert("burn_to_mrr_ratio".to_string(), self.burn_to_mrr_ratio);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{MonthlyFigures, Stage};
    use approx::assert_relative_eq;

    #[test]
    fn test_churn_rate() {
        assert_relative_eq!(customer_churn_rate(5, 100), 0.05);
        assert_eq!(customer_churn_rate(5, 0), 0.0);
        assert_relative_eq!(revenue_churn_rate(2_000.0, 40_000.0), 0.05);
    }

    #[test]
    fn test_cac_and_ltv_ratio() {
        let cac = cac(30_000.0, 10);
        assert_relative_eq!(cac, 3_000.0);

        let ltv = simple_ltv(500.0, 0.05);
        assert_relative_eq!(ltv, 10_000.0);
        assert_relative_eq!(ltv_cac_ratio(ltv, cac), 10_000.0 / 3_000.0);
        assert_eq!(ltv_cac_ratio(ltv, 0.0), 0.0);
        assert_relative_eq!(cac_payback_months(cac, 500.0), 6.0);
    }

    #[test]
    fn test_ltv_without_churn_uses_horizon() {
        assert_relative_eq!(simple_ltv(100.0, 0.0), 6_000.0);
    }

    #[test]
    fn test_discounted_ltv_is_below_simple() {
        let discounted = discounted_ltv(100.0, 0.05, 0.1, 60);
        assert!(discounted > 0.0);
        assert!(discounted < simple_ltv(100.0, 0.05));
        // 無流失無折現時等於期數 * 月營收
        assert_relative_eq!(discounted_ltv(100.0, 0.0, 0.0, 12), 1_200.0);
    }

    #[test]
    fn test_gross_margin_and_burn() {
        assert_relative_eq!(gross_margin(100_000.0, 20_000.0), 0.8);
        assert_eq!(gross_margin(0.0, 10.0), 0.0);
        assert_eq!(burn_rate(50_000.0, 80_000.0), 0.0);
        assert_relative_eq!(burn_rate(120_000.0, 80_000.0), 40_000.0);
    }

    #[test]
    fn test_rule_of_40() {
        let r = rule_of_40(30.0, 15.0);
        assert_eq!(r.rating, "great");
        assert!(r.passes);
        assert_eq!(rule_of_40(10.0, -5.0).rating, "poor");
    }

    #[test]
    fn test_assess_ltv_cac_ratings() {
        assert_eq!(assess_ltv_cac(9_000.0, 3_000.0).rating, "Excellent");
        assert_eq!(assess_ltv_cac(4_500.0, 3_000.0).rating, "Fair");
        assert_eq!(assess_ltv_cac(2_000.0, 3_000.0).rating, "Critical");

        let assessment = assess_ltv_cac(12_000.0, 2_000.0);
        assert_relative_eq!(assessment.payback_months, 2.0);
        assert_eq!(assessment.scalability_score, 100.0);
    }

    #[test]
    fn test_snapshot_from_actuals_uses_latest_month() {
        let mut company = Company::new("Acme", Stage::Seed);
        company.team_size = 4;

        let march = ActualData::new(
            1,
            2025,
            3,
            MonthlyFigures {
                mrr: 11_000.0,
                total_customers: 110,
                new_customers: 15,
                churned_customers: 5,
                marketing_spend: 12_000.0,
                sales_spend: 3_000.0,
                burn_rate: 20_000.0,
                cash_balance: 300_000.0,
                ..Default::default()
            },
        );
        let february = ActualData::new(
            1,
            2025,
            2,
            MonthlyFigures {
                mrr: 10_000.0,
                total_customers: 100,
                ..Default::default()
            },
        );

        let snapshot = MetricsSnapshot::from_actuals(&company, &[march, february]);
        assert_eq!(snapshot.period, Some((2025, 3)));
        assert_relative_eq!(snapshot.monthly_growth_rate, 0.1);
        assert_relative_eq!(snapshot.monthly_churn_rate, 0.05);
        assert_relative_eq!(snapshot.cac, 1_000.0);
        assert_relative_eq!(snapshot.runway_months.unwrap(), 15.0);
        assert_relative_eq!(snapshot.arpu, 100.0);
        assert_relative_eq!(snapshot.ltv, 100.0 * 0.8 / 0.05);
        assert_relative_eq!(snapshot.revenue_per_employee, 33_000.0);
    }

    #[test]
    fn test_snapshot_without_actuals_falls_back_to_company() {
        let mut company = Company::new("Acme", Stage::PreSeed);
        company.current_mrr = 25_000.0;
        company.current_customers = 5;
        company.cash_balance = 2_000_000.0;

        let snapshot = MetricsSnapshot::from_actuals(&company, &[]);
        assert_eq!(snapshot.period, None);
        assert_relative_eq!(snapshot.arpu, 5_000.0);
        assert!(snapshot.runway_months.is_none());
        assert!(!snapshot.benchmark_values().contains_key("cac"));
    }
}
