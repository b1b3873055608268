use crate::utils::error::MetricsError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 為只存成字串的列舉產生 as_str / FromStr / Display
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = MetricsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(MetricsError::invalid_input(
                        stringify!($name),
                        other,
                        concat!("expected one of: ", $($text, " "),+),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    #[serde(rename = "series_c_plus", alias = "series_c")]
    SeriesC,
    Growth,
    #[serde(alias = "public")]
    Mature,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::PreSeed,
        Stage::Seed,
        Stage::SeriesA,
        Stage::SeriesB,
        Stage::SeriesC,
        Stage::Growth,
        Stage::Mature,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::PreSeed => "pre_seed",
            Stage::Seed => "seed",
            Stage::SeriesA => "series_a",
            Stage::SeriesB => "series_b",
            Stage::SeriesC => "series_c_plus",
            Stage::Growth => "growth",
            Stage::Mature => "mature",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::PreSeed => "Pre-Seed",
            Stage::Seed => "Seed",
            Stage::SeriesA => "Series A",
            Stage::SeriesB => "Series B",
            Stage::SeriesC => "Series C+",
            Stage::Growth => "Growth",
            Stage::Mature => "Mature",
        }
    }

    pub fn from_annual_revenue(arr: f64) -> Stage {
        if arr < 5_000_000.0 {
            Stage::PreSeed
        } else if arr < 25_000_000.0 {
            Stage::Seed
        } else if arr < 100_000_000.0 {
            Stage::SeriesA
        } else if arr < 500_000_000.0 {
            Stage::SeriesB
        } else {
            Stage::SeriesC
        }
    }

    /// 早期公司的計畫本來就不準，偏差門檻放寬
    pub fn variance_multiplier(&self) -> f64 {
        match self {
            Stage::PreSeed => 1.5,
            Stage::Seed => 1.3,
            Stage::SeriesA => 1.1,
            Stage::SeriesB | Stage::SeriesC => 1.0,
            Stage::Growth => 0.9,
            Stage::Mature => 0.8,
        }
    }
}

impl FromStr for Stage {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "pre_seed" | "preseed" => Ok(Stage::PreSeed),
            "seed" => Ok(Stage::Seed),
            "series_a" => Ok(Stage::SeriesA),
            "series_b" => Ok(Stage::SeriesB),
            "series_c" | "series_c_plus" | "series_c+" => Ok(Stage::SeriesC),
            "growth" => Ok(Stage::Growth),
            "mature" | "public" => Ok(Stage::Mature),
            other => Err(MetricsError::invalid_input(
                "stage",
                other,
                "expected pre_seed, seed, series_a, series_b, series_c, growth or mature",
            )),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub stage: Stage,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub current_mrr: f64,
    pub current_customers: u32,
    pub monthly_price: f64,
    pub team_size: u32,
    pub cash_balance: f64,
    pub fiscal_year_start: u32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn new(name: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            stage,
            industry: None,
            country: None,
            currency: "RUB".to_string(),
            current_mrr: 0.0,
            current_customers: 0,
            monthly_price: 0.0,
            team_size: 1,
            cash_balance: 0.0,
            fiscal_year_start: 1,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn arr(&self) -> f64 {
        self.current_mrr * 12.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opex {
    pub salaries: f64,
    pub office_rent: f64,
    pub cloud_services: f64,
    pub software_subscriptions: f64,
    pub legal_accounting: f64,
    pub marketing_ops: f64,
    pub other: f64,
}

impl Opex {
    pub fn total(&self) -> f64 {
        self.salaries
            + self.office_rent
            + self.cloud_services
            + self.software_subscriptions
            + self.legal_accounting
            + self.marketing_ops
            + self.other
    }

    pub fn scale(&mut self, factor: f64) {
        self.salaries *= factor;
        self.office_rent *= factor;
        self.cloud_services *= factor;
        self.software_subscriptions *= factor;
        self.legal_accounting *= factor;
        self.marketing_ops *= factor;
        self.other *= factor;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capex {
    pub equipment: f64,
    pub software: f64,
    pub furniture: f64,
    pub other: f64,
}

impl Capex {
    pub fn total(&self) -> f64 {
        self.equipment + self.software + self.furniture + self.other
    }
}

/// 單月的營收、成本與單位經濟數字，計畫與實際共用同一組欄位
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonthlyFigures {
    pub mrr: f64,
    pub new_customers: u32,
    pub total_customers: u32,
    pub churned_customers: u32,
    pub expansion_mrr: f64,
    pub churn_rate: f64,
    pub churned_mrr: f64,
    pub reactivated_mrr: f64,
    pub marketing_spend: f64,
    pub sales_spend: f64,
    pub cac: f64,
    pub opex: Opex,
    pub capex: Capex,
    pub total_revenue: f64,
    pub total_costs: f64,
    pub burn_rate: f64,
    pub gross_margin: f64,
    pub runway_months: f64,
    pub ltv: f64,
    pub ltv_cac_ratio: f64,
    pub cac_payback_months: f64,
    pub cash_balance: f64,
}

impl MonthlyFigures {
    pub fn acquisition_spend(&self) -> f64 {
        self.marketing_spend + self.sales_spend
    }

    pub fn operating_costs(&self) -> f64 {
        self.opex.total() + self.acquisition_spend()
    }

    pub fn arpu(&self) -> f64 {
        crate::utils::math::safe_divide(self.mrr, self.total_customers as f64, 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Active,
    Archived,
    Completed,
}

text_enum!(PlanStatus {
    Draft => "draft",
    Active => "active",
    Archived => "archived",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    Runway,
    Growth,
    Profitability,
    Balanced,
}

text_enum!(OptimizationGoal {
    Runway => "runway",
    Growth => "growth",
    Profitability => "profitability",
    Balanced => "balanced",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexCategory {
    Equipment,
    Software,
    Furniture,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapexItem {
    pub name: String,
    pub amount: f64,
    pub purchase_month: u32,
    pub category: CapexCategory,
}

pub const DEFAULT_SEASONALITY: [f64; 12] = [0.9, 0.95, 1.1, 1.0, 0.95, 0.9, 0.85, 0.9, 1.2, 1.1, 1.0, 1.3];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanAssumptions {
    pub mrr_growth_rate: f64,
    pub customer_growth_rate: f64,
    pub churn_rate: f64,
    pub expansion_rate: f64,
    pub cac_target: f64,
    pub salary_per_employee: f64,
    pub office_rent_per_person: f64,
    pub cloud_cost_per_customer: f64,
    pub capex_budget: f64,
    pub capex_items: Vec<CapexItem>,
    pub seasonality: Vec<f64>,
    pub optimize_for: OptimizationGoal,
}

impl Default for PlanAssumptions {
    fn default() -> Self {
        Self {
            mrr_growth_rate: 0.20,
            customer_growth_rate: 0.15,
            churn_rate: 0.05,
            expansion_rate: 0.10,
            cac_target: 20_000.0,
            salary_per_employee: 150_000.0,
            office_rent_per_person: 10_000.0,
            cloud_cost_per_customer: 50.0,
            capex_budget: 0.0,
            capex_items: Vec::new(),
            seasonality: DEFAULT_SEASONALITY.to_vec(),
            optimize_for: OptimizationGoal::Runway,
        }
    }
}

impl PlanAssumptions {
    /// 季節性係數，缺漏的月份視為 1.0
    pub fn seasonality_for(&self, month: u32) -> f64 {
        month
            .checked_sub(1)
            .and_then(|i| self.seasonality.get(i as usize))
            .copied()
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPlan {
    pub id: Option<i64>,
    pub company_id: i64,
    pub plan_name: String,
    pub plan_year: i32,
    pub version: u32,
    pub description: Option<String>,
    pub status: PlanStatus,
    pub is_active: bool,
    pub assumptions: PlanAssumptions,
    pub created_at: Option<DateTime<Utc>>,
}

impl FinancialPlan {
    pub fn draft(company_id: i64, plan_name: impl Into<String>, plan_year: i32, assumptions: PlanAssumptions) -> Self {
        Self {
            id: None,
            company_id,
            plan_name: plan_name.into(),
            plan_year,
            version: 1,
            description: None,
            status: PlanStatus::Draft,
            is_active: false,
            assumptions,
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPlan {
    pub id: Option<i64>,
    pub plan_id: Option<i64>,
    pub year: i32,
    pub month_number: u32,
    pub month_name: String,
    pub quarter: u32,
    pub team_size: u32,
    pub seasonality_factor: f64,
    pub is_locked: bool,
    pub figures: MonthlyFigures,
}

impl MonthlyPlan {
    pub fn new(plan_id: Option<i64>, year: i32, month_number: u32) -> Self {
        Self {
            id: None,
            plan_id,
            year,
            month_number,
            month_name: month_name(month_number).to_string(),
            quarter: quarter_of(month_number),
            team_size: 0,
            seasonality_factor: 1.0,
            is_locked: false,
            figures: MonthlyFigures::default(),
        }
    }

    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Manual,
    Stripe,
    Chargebee,
    Quickbooks,
    Xero,
    GoogleAnalytics,
    Metabase,
    CustomApi,
}

text_enum!(DataSource {
    Manual => "manual",
    Stripe => "stripe",
    Chargebee => "chargebee",
    Quickbooks => "quickbooks",
    Xero => "xero",
    GoogleAnalytics => "google_analytics",
    Metabase => "metabase",
    CustomApi => "custom_api",
});

/// 以比例記錄 (0.1 = 高於計畫 10%)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordedVariance {
    pub mrr: f64,
    pub burn_rate: f64,
    pub runway: f64,
    pub cac: f64,
    pub new_customers: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualData {
    pub id: Option<i64>,
    pub company_id: i64,
    pub monthly_plan_id: Option<i64>,
    pub year: i32,
    pub month_number: u32,
    pub figures: MonthlyFigures,
    pub variance: Option<RecordedVariance>,
    pub data_source: DataSource,
    pub notes: Option<String>,
    pub is_finalized: bool,
    pub is_verified: bool,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ActualData {
    pub fn new(company_id: i64, year: i32, month_number: u32, figures: MonthlyFigures) -> Self {
        Self {
            id: None,
            company_id,
            monthly_plan_id: None,
            year,
            month_number,
            figures,
            variance: None,
            data_source: DataSource::Manual,
            notes: None,
            is_finalized: false,
            is_verified: false,
            recorded_at: None,
        }
    }

    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Optimistic,
    Pessimistic,
    Base,
    Custom,
}

text_enum!(ScenarioType {
    Optimistic => "optimistic",
    Pessimistic => "pessimistic",
    Base => "base",
    Custom => "custom",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Option<i64>,
    pub company_id: i64,
    pub plan_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub scenario_type: ScenarioType,
    pub changes: BTreeMap<String, f64>,
    pub results: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

text_enum!(Direction {
    HigherIsBetter => "higher_is_better",
    LowerIsBetter => "lower_is_better",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Growth,
    Efficiency,
    Profitability,
    Retention,
    Acquisition,
    Team,
}

text_enum!(MetricCategory {
    Growth => "growth",
    Efficiency => "efficiency",
    Profitability => "profitability",
    Retention => "retention",
    Acquisition => "acquisition",
    Team => "team",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub metric_name: String,
    pub category: MetricCategory,
    pub stage: Stage,
    pub poor: f64,
    pub average: f64,
    pub good: f64,
    pub excellent: f64,
    pub target: f64,
    pub unit: String,
    pub direction: Direction,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerTransaction {
    pub customer_id: String,
    pub date: NaiveDate,
    pub mrr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    FullBusinessAnalysis,
    FinancialHealth,
    GrowthRecommendations,
    RiskAnalysis,
    Forecast12m,
    CustomQuery,
}

text_enum!(AnalysisType {
    FullBusinessAnalysis => "full_business_analysis",
    FinancialHealth => "financial_health",
    GrowthRecommendations => "growth_recommendations",
    RiskAnalysis => "risk_analysis",
    Forecast12m => "forecast_12m",
    CustomQuery => "custom_query",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub company_id: i64,
    pub analysis_type: AnalysisType,
    pub custom_query: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: serde_json::Value,
    pub error: Option<String>,
    pub is_fallback: bool,
    pub tokens_used: u64,
    pub processing_ms: u128,
}

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_NAMES.get(i as usize))
        .copied()
        .unwrap_or("Unknown")
}

pub fn quarter_of(month: u32) -> u32 {
    (month.saturating_sub(1)) / 3 + 1
}
