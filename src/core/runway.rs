use crate::utils::math::safe_divide;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// 現金流為正時寫入資料庫的跑道值
pub const INFINITE_RUNWAY: f64 = 999.0;
pub const AVG_DAYS_PER_MONTH: f64 = 30.44;
const MAX_SIMULATION_MONTHS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "months", rename_all = "snake_case")]
pub enum Runway {
    Infinite,
    Months(f64),
}

impl Runway {
    pub fn from_cash(cash: f64, net_burn: f64) -> Runway {
        if net_burn <= 0.0 {
            Runway::Infinite
        } else {
            Runway::Months(cash.max(0.0) / net_burn)
        }
    }

    /// 資料庫的 999 哨兵值還原
    pub fn from_stored(months: f64) -> Runway {
        if months >= INFINITE_RUNWAY {
            Runway::Infinite
        } else {
            Runway::Months(months.max(0.0))
        }
    }

    pub fn months(&self) -> Option<f64> {
        match self {
            Runway::Infinite => None,
            Runway::Months(m) => Some(*m),
        }
    }

    pub fn as_stored(&self) -> f64 {
        self.months().unwrap_or(INFINITE_RUNWAY)
    }

    pub fn category(&self) -> RunwayCategory {
        RunwayCategory::classify(*self)
    }

    pub fn display(&self) -> String {
        match self {
            Runway::Infinite => "∞".to_string(),
            Runway::Months(m) => format!("{:.1} months", m),
        }
    }
}

/// 顯示已存的跑道月數，999 以上顯示 ∞
pub fn runway_display(months: f64) -> String {
    Runway::from_stored(months).display()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayCategory {
    Infinite,
    Excellent,
    VeryGood,
    Good,
    Warning,
    Concerning,
    Critical,
    Emergency,
}

impl RunwayCategory {
    pub fn classify(runway: Runway) -> RunwayCategory {
        let months = match runway {
            Runway::Infinite => return RunwayCategory::Infinite,
            Runway::Months(m) => m,
        };

        if months >= 24.0 {
            RunwayCategory::Excellent
        } else if months >= 18.0 {
            RunwayCategory::VeryGood
        } else if months >= 12.0 {
            RunwayCategory::Good
        } else if months >= 9.0 {
            RunwayCategory::Warning
        } else if months >= 6.0 {
            RunwayCategory::Concerning
        } else if months >= 3.0 {
            RunwayCategory::Critical
        } else {
            RunwayCategory::Emergency
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunwayCategory::Infinite => "infinite",
            RunwayCategory::Excellent => "excellent",
            RunwayCategory::VeryGood => "very_good",
            RunwayCategory::Good => "good",
            RunwayCategory::Warning => "warning",
            RunwayCategory::Concerning => "concerning",
            RunwayCategory::Critical => "critical",
            RunwayCategory::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunwayInputs {
    pub cash_balance: f64,
    /// 每月總支出 (gross burn)
    pub monthly_expenses: f64,
    pub monthly_revenue: f64,
    pub revenue_growth_rate: f64,
}

impl RunwayInputs {
    pub fn net_burn(&self) -> f64 {
        self.monthly_expenses - self.monthly_revenue
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayResult {
    pub runway: Runway,
    pub net_burn: f64,
    pub cash_out_date: Option<NaiveDate>,
    pub category: RunwayCategory,
    pub status: String,
}

pub fn basic_runway(inputs: &RunwayInputs, today: NaiveDate) -> RunwayResult {
    let net_burn = inputs.net_burn();
    let runway = Runway::from_cash(inputs.cash_balance, net_burn);

    // 燒錢極少時日期可能超出 chrono 範圍，此時不給日期
    let cash_out_date = runway.months().and_then(|m| {
        Duration::try_days((m * AVG_DAYS_PER_MONTH).round() as i64).and_then(|d| today.checked_add_signed(d))
    });

    RunwayResult {
        runway,
        net_burn: net_burn.max(0.0),
        cash_out_date,
        category: runway.category(),
        status: match runway {
            Runway::Infinite => "positive_cash_flow".to_string(),
            Runway::Months(_) => "burning".to_string(),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayMonth {
    pub month: u32,
    pub revenue: f64,
    pub expenses: f64,
    pub net_cash_flow: f64,
    pub cash_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAdjustedRunway {
    pub runway: Runway,
    pub trajectory: Vec<RunwayMonth>,
}

/// 一次性注資 (金額, 入帳月份)
type Injection = Option<(f64, u32)>;

fn simulate(inputs: &RunwayInputs, injection: Injection) -> GrowthAdjustedRunway {
    let mut cash = inputs.cash_balance;
    let mut revenue = inputs.monthly_revenue;
    let mut trajectory = Vec::new();

    for month in 1..=MAX_SIMULATION_MONTHS {
        if let Some((amount, at)) = injection {
            if at == month {
                cash += amount;
            }
        }

        let net = revenue - inputs.monthly_expenses;
        let next_cash = cash + net;

        if next_cash < 0.0 {
            // 當月內用完，以比例插值
            let fraction = safe_divide(cash.max(0.0), -net, 0.0);
            trajectory.push(RunwayMonth {
                month,
                revenue,
                expenses: inputs.monthly_expenses,
                net_cash_flow: net,
                cash_balance: next_cash,
            });
            return GrowthAdjustedRunway {
                runway: Runway::Months((month - 1) as f64 + fraction),
                trajectory,
            };
        }

        cash = next_cash;
        trajectory.push(RunwayMonth {
            month,
            revenue,
            expenses: inputs.monthly_expenses,
            net_cash_flow: net,
            cash_balance: cash,
        });
        revenue *= 1.0 + inputs.revenue_growth_rate;
    }

    GrowthAdjustedRunway {
        runway: Runway::Infinite,
        trajectory,
    }
}

pub fn growth_adjusted_runway(inputs: &RunwayInputs) -> GrowthAdjustedRunway {
    simulate(inputs, None)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayScenario {
    pub name: String,
    pub description: String,
    pub inputs: RunwayInputs,
    pub runway: Runway,
    pub category: RunwayCategory,
    pub funding_amount: Option<f64>,
}

fn scenario(name: &str, description: &str, inputs: RunwayInputs, injection: Injection) -> RunwayScenario {
    let result = simulate(&inputs, injection);
    RunwayScenario {
        name: name.to_string(),
        description: description.to_string(),
        inputs,
        runway: result.runway,
        category: result.runway.category(),
        funding_amount: injection.map(|(amount, _)| amount),
    }
}

pub fn runway_scenarios(base: &RunwayInputs) -> Vec<RunwayScenario> {
    let mut scenarios = vec![scenario("base", "Current trajectory", *base, None)];

    scenarios.push(scenario(
        "optimistic",
        "Faster growth with slightly leaner costs",
        RunwayInputs {
            revenue_growth_rate: base.revenue_growth_rate * 1.2,
            monthly_expenses: base.monthly_expenses * 0.95,
            monthly_revenue: base.monthly_revenue * 1.2,
            ..*base
        },
        None,
    ));

    scenarios.push(scenario(
        "pessimistic",
        "Costs overrun while growth halves",
        RunwayInputs {
            monthly_expenses: base.monthly_expenses * 1.1,
            revenue_growth_rate: base.revenue_growth_rate * 0.5,
            ..*base
        },
        None,
    ));

    scenarios.push(scenario(
        "cost_reduction",
        "15% reduction of monthly expenses",
        RunwayInputs {
            monthly_expenses: base.monthly_expenses * 0.85,
            ..*base
        },
        None,
    ));

    let base_months = scenarios[0].runway.as_stored();
    if base_months < 12.0 {
        let amount = (base.monthly_expenses * 18.0).max(base.cash_balance * 2.0);
        scenarios.push(scenario(
            "fundraising",
            "New round closing in month 6",
            *base,
            Some((amount, 6)),
        ));
    }

    scenarios
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    pub variable: String,
    pub change_pct: f64,
    pub runway: Runway,
    pub delta_months: f64,
}

/// 支出、營收、成長率各自變動時的跑道變化
pub fn sensitivity(base: &RunwayInputs) -> Vec<SensitivityPoint> {
    let base_months = growth_adjusted_runway(base).runway.as_stored();

    let variations: [(&str, [f64; 4]); 3] = [
        ("monthly_expenses", [-20.0, -10.0, 10.0, 20.0]),
        ("monthly_revenue", [-20.0, -10.0, 10.0, 20.0]),
        ("revenue_growth_rate", [-50.0, -25.0, 25.0, 50.0]),
    ];

    let mut points = Vec::new();
    for (variable, changes) in variations {
        for change in changes {
            let factor = 1.0 + change / 100.0;
            let mut inputs = *base;
            match variable {
                "monthly_expenses" => inputs.monthly_expenses *= factor,
                "monthly_revenue" => inputs.monthly_revenue *= factor,
                _ => inputs.revenue_growth_rate *= factor,
            }

            let runway = growth_adjusted_runway(&inputs).runway;
            points.push(SensitivityPoint {
                variable: variable.to_string(),
                change_pct: change,
                runway,
                delta_months: runway.as_stored() - base_months,
            });
        }
    }
    points
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundraisingTiming {
    pub runway: Runway,
    /// 距離最晚應啟動募資的月數，負數代表已經落後
    pub start_in_months: Option<f64>,
    pub urgency: String,
    pub recommendation: String,
}

pub const FUNDRAISING_PROCESS_MONTHS: f64 = 6.0;
pub const FUNDRAISING_BUFFER_MONTHS: f64 = 3.0;

pub fn fundraising_timing(runway: Runway, process_months: f64, buffer_months: f64) -> FundraisingTiming {
    let Some(months) = runway.months() else {
        return FundraisingTiming {
            runway,
            start_in_months: None,
            urgency: "optional".to_string(),
            recommendation: "Cash flow positive; raise only to accelerate growth".to_string(),
        };
    };

    let start_in = months - process_months - buffer_months;
    let (urgency, recommendation) = if start_in <= 0.0 {
        ("late", "Start fundraising immediately and cut discretionary spend")
    } else if start_in <= 3.0 {
        ("urgent", "Prepare the data room and investor list now")
    } else if start_in <= 6.0 {
        ("soon", "Begin investor conversations within the quarter")
    } else {
        ("planned", "Focus on growth milestones before the next round")
    };

    FundraisingTiming {
        runway,
        start_in_months: Some(start_in),
        urgency: urgency.to_string(),
        recommendation: recommendation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn inputs(cash: f64, expenses: f64, revenue: f64, growth: f64) -> RunwayInputs {
        RunwayInputs {
            cash_balance: cash,
            monthly_expenses: expenses,
            monthly_revenue: revenue,
            revenue_growth_rate: growth,
        }
    }

    #[test]
    fn test_runway_from_cash_and_burn() {
        assert_eq!(Runway::from_cash(120_000.0, 10_000.0), Runway::Months(12.0));
        assert_eq!(Runway::from_cash(120_000.0, 0.0), Runway::Infinite);
        assert_eq!(Runway::from_stored(999.0), Runway::Infinite);
        assert_eq!(Runway::Infinite.as_stored(), INFINITE_RUNWAY);
    }

    #[test]
    fn test_stored_sentinel_displays_as_infinite() {
        assert_eq!(runway_display(INFINITE_RUNWAY), "∞");
        assert_eq!(runway_display(1_500.0), "∞");
        assert_eq!(runway_display(12.0), "12.0 months");
        assert_eq!(runway_display(-3.0), "0.0 months");
    }

    #[test]
    fn test_basic_runway() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let result = basic_runway(&inputs(300_000.0, 70_000.0, 20_000.0, 0.0), today);
        assert_eq!(result.runway, Runway::Months(6.0));
        assert_eq!(result.category, RunwayCategory::Concerning);
        assert_eq!(result.status, "burning");
        assert_eq!(result.cash_out_date, Some(today + Duration::days(183)));

        let profitable = basic_runway(&inputs(10_000.0, 5_000.0, 8_000.0, 0.0), today);
        assert_eq!(profitable.runway, Runway::Infinite);
        assert_eq!(profitable.status, "positive_cash_flow");
        assert!(profitable.cash_out_date.is_none());
    }

    #[test]
    fn test_tiny_burn_has_no_cash_out_date() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        // 每月淨燒 0.01，月數遠超過可表示的日期
        let result = basic_runway(&inputs(1_000_000_000.0, 100.01, 100.0, 0.0), today);
        assert!(matches!(result.runway, Runway::Months(m) if m > 1e10));
        assert_eq!(result.category, RunwayCategory::Excellent);
        assert!(result.cash_out_date.is_none());
    }

    #[test]
    fn test_categories() {
        assert_eq!(RunwayCategory::classify(Runway::Months(30.0)), RunwayCategory::Excellent);
        assert_eq!(RunwayCategory::classify(Runway::Months(18.0)), RunwayCategory::VeryGood);
        assert_eq!(RunwayCategory::classify(Runway::Months(9.5)), RunwayCategory::Warning);
        assert_eq!(RunwayCategory::classify(Runway::Months(1.0)), RunwayCategory::Emergency);
    }

    #[test]
    fn test_growth_adjusted_interpolates_last_month() {
        // 無成長時應與基本公式相同
        let flat = growth_adjusted_runway(&inputs(25_000.0, 10_000.0, 0.0, 0.0));
        assert_relative_eq!(flat.runway.months().unwrap(), 2.5);
        assert_eq!(flat.trajectory.len(), 3);

        let growing = growth_adjusted_runway(&inputs(25_000.0, 20_000.0, 10_000.0, 0.1));
        assert!(growing.runway.months().unwrap() > 2.5);
    }

    #[test]
    fn test_growth_can_reach_profitability() {
        let result = growth_adjusted_runway(&inputs(500_000.0, 50_000.0, 30_000.0, 0.1));
        assert_eq!(result.runway, Runway::Infinite);
        assert_eq!(result.trajectory.len(), MAX_SIMULATION_MONTHS as usize);
    }

    #[test]
    fn test_scenarios_include_fundraising_when_short() {
        let short = runway_scenarios(&inputs(100_000.0, 30_000.0, 10_000.0, 0.0));
        let names: Vec<&str> = short.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["base", "optimistic", "pessimistic", "cost_reduction", "fundraising"]);

        let funded = short.last().unwrap();
        assert_eq!(funded.funding_amount, Some(540_000.0));
        assert!(funded.runway.as_stored() > short[0].runway.as_stored());

        let long = runway_scenarios(&inputs(1_000_000.0, 30_000.0, 10_000.0, 0.0));
        assert_eq!(long.len(), 4);
    }

    #[test]
    fn test_sensitivity_directions() {
        let points = sensitivity(&inputs(240_000.0, 30_000.0, 10_000.0, 0.0));
        assert_eq!(points.len(), 12);

        let higher_costs = points
            .iter()
            .find(|p| p.variable == "monthly_expenses" && p.change_pct == 20.0)
            .unwrap();
        assert!(higher_costs.delta_months < 0.0);

        let more_revenue = points
            .iter()
            .find(|p| p.variable == "monthly_revenue" && p.change_pct == 10.0)
            .unwrap();
        assert!(more_revenue.delta_months > 0.0);
    }

    #[test]
    fn test_fundraising_timing() {
        let late = fundraising_timing(Runway::Months(8.0), FUNDRAISING_PROCESS_MONTHS, FUNDRAISING_BUFFER_MONTHS);
        assert_eq!(late.urgency, "late");
        assert_relative_eq!(late.start_in_months.unwrap(), -1.0);

        assert_eq!(fundraising_timing(Runway::Months(11.0), 6.0, 3.0).urgency, "urgent");
        assert_eq!(fundraising_timing(Runway::Months(14.0), 6.0, 3.0).urgency, "soon");
        assert_eq!(fundraising_timing(Runway::Months(24.0), 6.0, 3.0).urgency, "planned");
        assert_eq!(fundraising_timing(Runway::Infinite, 6.0, 3.0).urgency, "optional");
    }
}
