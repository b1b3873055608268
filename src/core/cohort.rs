use crate::domain::model::{month_name, CustomerTransaction};
use crate::utils::error::Result;
use crate::utils::math::{mean, safe_divide};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const DEFAULT_RETENTION: f64 = 0.5;
const DEFAULT_CHURN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    /// YYYY-MM
    pub label: String,
    pub size: usize,
    pub active_by_period: Vec<usize>,
    pub revenue_by_period: Vec<f64>,
}

impl Cohort {
    pub fn retention(&self) -> Vec<f64> {
        self.active_by_period
            .iter()
            .map(|active| safe_divide(*active as f64, self.size as f64, 0.0))
            .collect()
    }

    pub fn retention_at(&self, period: usize) -> Option<f64> {
        self.retention().get(period).copied()
    }

    pub fn ltv(&self) -> f64 {
        safe_divide(self.revenue_by_period.iter().sum(), self.size as f64, 0.0)
    }
}

fn month_key(date: chrono::NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

fn months_between(from: (i32, u32), to: (i32, u32)) -> usize {
    let diff = (to.0 - from.0) * 12 + to.1 as i32 - from.1 as i32;
    diff.max(0) as usize
}

/// 依每位客戶首次付款月份分群
pub fn build_cohorts(transactions: &[CustomerTransaction]) -> Vec<Cohort> {
    let mut first_month: HashMap<&str, (i32, u32)> = HashMap::new();
    for tx in transactions {
        let key = month_key(tx.date);
        first_month
            .entry(tx.customer_id.as_str())
            .and_modify(|current| {
                if key < *current {
                    *current = key;
                }
            })
            .or_insert(key);
    }

    // 每個 cohort 都觀察到資料集的最後一個月，流失完的期間補 0
    let last_month = transactions.iter().map(|tx| month_key(tx.date)).max();

    // cohort -> period -> (活躍客戶, 營收)
    let mut grid: BTreeMap<(i32, u32), BTreeMap<usize, (BTreeSet<&str>, f64)>> = BTreeMap::new();
    let mut members: BTreeMap<(i32, u32), BTreeSet<&str>> = BTreeMap::new();

    for tx in transactions {
        let Some(start) = first_month.get(tx.customer_id.as_str()) else {
            continue;
        };
        let period = months_between(*start, month_key(tx.date));
        let cell = grid.entry(*start).or_default().entry(period).or_default();
        cell.0.insert(tx.customer_id.as_str());
        cell.1 += tx.mrr;
        members.entry(*start).or_default().insert(tx.customer_id.as_str());
    }

    grid.into_iter()
        .map(|(start, periods)| {
            let observed = last_month.map(|last| months_between(start, last)).unwrap_or(0);
            let max_period = periods.keys().next_back().copied().unwrap_or(0).max(observed);
            let mut active_by_period = vec![0; max_period + 1];
            let mut revenue_by_period = vec![0.0; max_period + 1];
            for (period, (customers, revenue)) in periods {
                active_by_period[period] = customers.len();
                revenue_by_period[period] = revenue;
            }

            Cohort {
                label: format!("{:04}-{:02}", start.0, start.1),
                size: members.get(&start).map(|m| m.len()).unwrap_or(0),
                active_by_period,
                revenue_by_period,
            }
        })
        .collect()
}

/// CSV 欄位：customer_id,date,mrr
pub fn load_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<CustomerTransaction>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut transactions = Vec::new();
    for row in reader.deserialize() {
        let tx: CustomerTransaction = row?;
        transactions.push(tx);
    }
    Ok(transactions)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionRow {
    pub cohort: String,
    pub size: usize,
    pub retention: Vec<f64>,
}

pub fn retention_matrix(cohorts: &[Cohort]) -> Vec<RetentionRow> {
    cohorts
        .iter()
        .map(|c| RetentionRow {
            cohort: c.label.clone(),
            size: c.size,
            retention: c.retention(),
        })
        .collect()
}

/// 各期平均留存，只計入資料期間涵蓋該期的 cohort
pub fn average_retention_curve(cohorts: &[Cohort]) -> Vec<f64> {
    let max_len = cohorts.iter().map(|c| c.active_by_period.len()).max().unwrap_or(0);
    (0..max_len)
        .map(|period| {
            let values: Vec<f64> = cohorts.iter().filter_map(|c| c.retention_at(period)).collect();
            mean(&values)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionForecast {
    pub fitted: bool,
    pub initial: f64,
    pub decay: f64,
    pub monthly_churn: f64,
    pub forecast: Vec<f64>,
}

/// r(t) = a * e^(-b t)，以對數線性迴歸擬合
pub fn forecast_retention(curve: &[f64], months: usize) -> RetentionForecast {
    let points: Vec<(f64, f64)> = curve
        .iter()
        .enumerate()
        .filter(|(_, r)| **r > 0.0)
        .map(|(t, r)| (t as f64, r.ln()))
        .collect();

    if points.len() < 3 {
        return RetentionForecast {
            fitted: false,
            initial: DEFAULT_RETENTION,
            decay: DEFAULT_CHURN,
            monthly_churn: DEFAULT_CHURN,
            forecast: vec![DEFAULT_RETENTION; months],
        };
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|p| p.0).sum::<f64>() / n;
    let y_mean = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        (num + (x - x_mean) * (y - y_mean), den + (x - x_mean).powi(2))
    });
    let slope = safe_divide(num, den, 0.0);
    let intercept = y_mean - slope * x_mean;

    let a = intercept.exp();
    let b = -slope;
    let start = curve.len();
    let forecast = (start..start + months)
        .map(|t| (a * (-b * t as f64).exp()).clamp(0.0, 1.0))
        .collect();

    RetentionForecast {
        fitted: true,
        initial: a,
        decay: b,
        monthly_churn: b.max(0.0),
        forecast,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub cohort_count: usize,
    pub total_customers: usize,
    pub month_1_retention: Option<f64>,
    pub month_3_retention: Option<f64>,
    pub month_6_retention: Option<f64>,
    pub month_12_retention: Option<f64>,
    pub implied_monthly_churn: Option<f64>,
    pub average_ltv: f64,
    pub best_cohort: Option<String>,
    pub worst_cohort: Option<String>,
}

pub fn summarize(cohorts: &[Cohort]) -> CohortSummary {
    let average_at = |period: usize| -> Option<f64> {
        let values: Vec<f64> = cohorts.iter().filter_map(|c| c.retention_at(period)).collect();
        if values.is_empty() {
            None
        } else {
            Some(mean(&values))
        }
    };

    let month_3 = average_at(3);

    let mut ranked: Vec<(&str, f64)> = cohorts
        .iter()
        .filter_map(|c| c.retention_at(3).map(|r| (c.label.as_str(), r)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let ltvs: Vec<f64> = cohorts.iter().map(Cohort::ltv).collect();

    CohortSummary {
        cohort_count: cohorts.len(),
        total_customers: cohorts.iter().map(|c| c.size).sum(),
        month_1_retention: average_at(1),
        month_3_retention: month_3,
        month_6_retention: average_at(6),
        month_12_retention: average_at(12),
        implied_monthly_churn: month_3.map(|r| 1.0 - r.max(0.0).powf(1.0 / 3.0)),
        average_ltv: mean(&ltvs),
        best_cohort: ranked.first().map(|(label, _)| label.to_string()),
        worst_cohort: ranked.last().map(|(label, _)| label.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortProjection {
    pub month: u32,
    pub customers: f64,
    pub revenue: f64,
    pub cumulative_revenue: f64,
}

pub fn simulate_cohort(
    initial_customers: f64,
    mrr_per_customer: f64,
    monthly_churn: f64,
    monthly_price_growth: f64,
    months: u32,
) -> Vec<CohortProjection> {
    let mut customers = initial_customers;
    let mut cumulative = 0.0;

    (0..months)
        .map(|month| {
            let revenue = customers * mrr_per_customer * (1.0 + monthly_price_growth).powi(month as i32);
            cumulative += revenue;
            let row = CohortProjection {
                month: month + 1,
                customers,
                revenue,
                cumulative_revenue: cumulative,
            };
            customers *= 1.0 - monthly_churn;
            row
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionMonth {
    pub month: u32,
    pub month_name: String,
    pub new_customers: usize,
    pub new_mrr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionMonth {
    pub month: u32,
    pub month_name: String,
    pub cohorts: usize,
    /// 第 1 到 12 期的平均留存，尚無觀察期間時為 None
    pub average_retention: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityReport {
    pub acquisition: Vec<AcquisitionMonth>,
    pub retention: Vec<RetentionMonth>,
    pub insights: Vec<String>,
}

/// 依 cohort 起始的月份 (1-12) 彙整獲客量與後續留存
pub fn analyze_seasonality(transactions: &[CustomerTransaction]) -> SeasonalityReport {
    let cohorts = build_cohorts(transactions);

    // 月份 -> (新客戶, 新 MRR, 各 cohort 的平均留存)
    let mut by_month: BTreeMap<u32, (usize, f64, Vec<f64>, usize)> = BTreeMap::new();
    for cohort in &cohorts {
        let Some(month) = cohort.label.get(5..7).and_then(|m| m.parse::<u32>().ok()) else {
            continue;
        };
        let entry = by_month.entry(month).or_default();
        entry.0 += cohort.size;
        entry.1 += cohort.revenue_by_period.first().copied().unwrap_or(0.0);
        entry.3 += 1;

        let observed: Vec<f64> = (1..=12).filter_map(|p| cohort.retention_at(p)).collect();
        if !observed.is_empty() {
            entry.2.push(mean(&observed));
        }
    }

    let acquisition: Vec<AcquisitionMonth> = by_month
        .iter()
        .map(|(month, (customers, mrr, _, _))| AcquisitionMonth {
            month: *month,
            month_name: month_name(*month).to_string(),
            new_customers: *customers,
            new_mrr: *mrr,
        })
        .collect();
    let retention: Vec<RetentionMonth> = by_month
        .iter()
        .map(|(month, (_, _, averages, count))| RetentionMonth {
            month: *month,
            month_name: month_name(*month).to_string(),
            cohorts: *count,
            average_retention: (!averages.is_empty()).then(|| mean(averages)),
        })
        .collect();

    let mut insights = Vec::new();
    let best = acquisition.iter().max_by_key(|a| a.new_customers);
    let worst = acquisition.iter().min_by_key(|a| a.new_customers);
    if let (Some(best), Some(worst)) = (best, worst) {
        if acquisition.len() > 1 && best.new_customers as f64 > worst.new_customers as f64 * 1.5 {
            insights.push(format!(
                "Strong acquisition seasonality: {} brings the most new customers, {} the fewest",
                best.month_name, worst.month_name
            ));
        }
    }

    let averages: Vec<f64> = retention.iter().filter_map(|r| r.average_retention).collect();
    if averages.len() > 1 {
        let avg = mean(&averages);
        let std_dev = (averages.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / averages.len() as f64).sqrt();
        if std_dev > 0.1 {
            insights.push(format!(
                "Retention depends on acquisition month (std dev {:.1} pp)",
                std_dev * 100.0
            ));
        }
    }

    SeasonalityReport {
        acquisition,
        retention,
        insights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn tx(customer: &str, y: i32, m: u32, mrr: f64) -> CustomerTransaction {
        CustomerTransaction {
            customer_id: customer.to_string(),
            date: NaiveDate::from_ymd_opt(y, m, 15).unwrap(),
            mrr,
        }
    }

    fn sample() -> Vec<CustomerTransaction> {
        vec![
            tx("a", 2025, 1, 100.0),
            tx("b", 2025, 1, 100.0),
            tx("c", 2025, 1, 100.0),
            tx("d", 2025, 1, 100.0),
            tx("a", 2025, 2, 100.0),
            tx("b", 2025, 2, 100.0),
            tx("c", 2025, 2, 100.0),
            tx("a", 2025, 3, 100.0),
            tx("b", 2025, 3, 100.0),
            tx("a", 2025, 4, 120.0),
            tx("e", 2025, 2, 50.0),
            tx("e", 2025, 3, 50.0),
        ]
    }

    #[test]
    fn test_build_cohorts_groups_by_first_month() {
        let cohorts = build_cohorts(&sample());
        assert_eq!(cohorts.len(), 2);

        let january = &cohorts[0];
        assert_eq!(january.label, "2025-01");
        assert_eq!(january.size, 4);
        assert_eq!(january.active_by_period, vec![4, 3, 2, 1]);
        assert_eq!(january.retention(), vec![1.0, 0.75, 0.5, 0.25]);
        assert_relative_eq!(january.ltv(), 1_020.0 / 4.0);

        let february = &cohorts[1];
        assert_eq!(february.label, "2025-02");
        // 四月已無付款，補 0
        assert_eq!(february.active_by_period, vec![1, 1, 0]);
    }

    #[test]
    fn test_fully_churned_cohort_counts_as_zero() {
        let transactions = vec![
            tx("a", 2025, 1, 100.0),
            tx("b", 2025, 1, 100.0),
            tx("c", 2025, 2, 100.0),
            tx("c", 2025, 3, 100.0),
            tx("c", 2025, 4, 100.0),
            tx("c", 2025, 5, 100.0),
            tx("c", 2025, 6, 100.0),
        ];
        let cohorts = build_cohorts(&transactions);

        let rows = retention_matrix(&cohorts);
        assert_eq!(rows[0].retention, vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(rows[1].retention, vec![1.0; 5]);

        let summary = summarize(&cohorts);
        assert_eq!(summary.month_1_retention, Some(0.5));
        assert_eq!(summary.month_3_retention, Some(0.5));
        assert_eq!(summary.best_cohort.as_deref(), Some("2025-02"));
        assert_eq!(summary.worst_cohort.as_deref(), Some("2025-01"));

        let curve = average_retention_curve(&cohorts);
        assert_eq!(curve[5], 0.0);
    }

    #[test]
    fn test_seasonality_by_acquisition_month() {
        let txs = vec![
            tx("a", 2025, 1, 100.0),
            tx("b", 2025, 1, 100.0),
            tx("c", 2025, 1, 100.0),
            tx("d", 2025, 1, 100.0),
            tx("a", 2025, 2, 100.0),
            tx("b", 2025, 2, 100.0),
            tx("e", 2025, 2, 50.0),
            tx("a", 2025, 3, 100.0),
            tx("e", 2025, 3, 50.0),
        ];
        let report = analyze_seasonality(&txs);

        assert_eq!(report.acquisition.len(), 2);
        assert_eq!(report.acquisition[0].month_name, "January");
        assert_eq!(report.acquisition[0].new_customers, 4);
        assert_relative_eq!(report.acquisition[0].new_mrr, 400.0);
        assert_relative_eq!(report.acquisition[1].new_mrr, 50.0);

        // 一月 cohort 第 1、2 期為 0.5 與 0.25
        assert_relative_eq!(report.retention[0].average_retention.unwrap(), 0.375);
        assert_relative_eq!(report.retention[1].average_retention.unwrap(), 1.0);
        assert_eq!(report.insights.len(), 2);
        assert!(report.insights[0].starts_with("Strong acquisition seasonality"));
    }

    #[test]
    fn test_seasonality_single_month_has_no_insights() {
        let txs = vec![tx("a", 2025, 5, 100.0), tx("b", 2025, 5, 100.0)];
        let report = analyze_seasonality(&txs);
        assert_eq!(report.retention[0].average_retention, None);
        assert!(report.insights.is_empty());
    }

    #[test]
    fn test_summary_month_three() {
        let cohorts = build_cohorts(&sample());
        let summary = summarize(&cohorts);
        assert_eq!(summary.cohort_count, 2);
        assert_eq!(summary.total_customers, 5);
        assert_eq!(summary.month_3_retention, Some(0.25));
        assert_eq!(summary.month_6_retention, None);
        assert_relative_eq!(summary.implied_monthly_churn.unwrap(), 1.0 - 0.25f64.powf(1.0 / 3.0));
        assert_eq!(summary.best_cohort.as_deref(), Some("2025-01"));
    }

    #[test]
    fn test_forecast_fits_exponential_decay() {
        let curve: Vec<f64> = (0..6).map(|t| (-0.2 * t as f64).exp()).collect();
        let forecast = forecast_retention(&curve, 12);
        assert!(forecast.fitted);
        assert_relative_eq!(forecast.decay, 0.2, epsilon = 1e-9);
        assert_relative_eq!(forecast.initial, 1.0, epsilon = 1e-9);
        assert_eq!(forecast.forecast.len(), 12);
        assert!(forecast.forecast.iter().all(|r| (0.0..=1.0).contains(r)));
    }

    #[test]
    fn test_forecast_defaults_with_sparse_data() {
        let forecast = forecast_retention(&[1.0, 0.0], 3);
        assert!(!forecast.fitted);
        assert_eq!(forecast.forecast, vec![0.5, 0.5, 0.5]);
        assert_eq!(forecast.monthly_churn, 0.1);
    }

    #[test]
    fn test_simulate_cohort() {
        let rows = simulate_cohort(100.0, 10.0, 0.1, 0.0, 3);
        assert_relative_eq!(rows[0].revenue, 1_000.0);
        assert_relative_eq!(rows[1].customers, 90.0);
        assert_relative_eq!(rows[2].cumulative_revenue, 1_000.0 + 900.0 + 810.0);
    }
}
