use crate::analyst::build_context;
use crate::core::advisor::{
    analyze_company, funding_readiness, quarterly_okrs, AdvisorReport, FundingReadiness, PlanningPractice, QuarterlyOkrs,
};
use crate::core::benchmarks::{assess_company, compare_with_benchmarks, BenchmarkComparison, StageAssessment};
use crate::core::data_quality::{validate_all, validate_company, IssueLevel, ValidationReport};
use crate::core::health::{financial_health_score, HealthScore};
use crate::core::planner::{self, PlanActualRow, PlanProjection};
use crate::core::reports::{board_report, investor_report, BoardReport, InvestorReport};
use crate::core::roadmap::{year_one_roadmap, Roadmap};
use crate::core::runway::RunwayInputs;
use crate::core::scenarios::{compare_scenarios, find_template, to_scenario, BaseMetrics, ScenarioComparison};
use crate::core::tracker::{derive_fields, read_actuals_csv, validate_actual, ActualValidation};
use crate::core::unit_economics::MetricsSnapshot;
use crate::core::variance::{self, VarianceReport};
use crate::domain::model::{
    ActualData, AnalysisRequest, AnalysisResponse, Company, FinancialPlan, MonthlyPlan, PlanAssumptions,
    RecordedVariance, Stage,
};
use crate::domain::ports::{Analyst, Storage};
use crate::export::{CompanyReport, ExportFormat, Exporter};
use crate::storage::SqliteStore;
use crate::utils::error::{MetricsError, Result};
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// 串接資料庫、計算、匯出與分析的協調層
pub struct Dashboard<S: Storage, A: Analyst> {
    store: SqliteStore,
    exporter: Exporter<S>,
    analyst: A,
}

impl<S: Storage, A: Analyst> Dashboard<S, A> {
    pub fn new(store: SqliteStore, storage: S, analyst: A) -> Self {
        Self {
            store,
            exporter: Exporter::new(storage),
            analyst,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// 建表並寫入預設設定與基準資料，可重複執行
    pub fn init(&self) -> Result<()> {
        self.store.migrate()?;
        self.store.seed_defaults()?;
        tracing::info!("✅ Database ready");
        Ok(())
    }

    pub fn load_demo(&self) -> Result<Option<i64>> {
        self.init()?;
        self.store.seed_demo_company()
    }

    // ── Companies ──────────────────────────────────────────────

    pub fn add_company(&self, company: &Company) -> Result<i64> {
        let blocking: Vec<String> = validate_company(company)
            .into_iter()
            .filter(|i| i.level >= IssueLevel::Error)
            .map(|i| i.message)
            .collect();
        if !blocking.is_empty() {
            return Err(MetricsError::ValidationError {
                message: blocking.join("; "),
            });
        }
        self.store.create_company(company)
    }

    pub fn company(&self, company_id: i64) -> Result<Company> {
        self.store.get_company(company_id)
    }

    /// 有實際資料時以最新月份計算，否則使用公司基本資料
    pub fn snapshot(&self, company_id: i64) -> Result<(Company, MetricsSnapshot)> {
        let company = self.store.get_company(company_id)?;
        let actuals = self.store.actuals_for_company(company_id)?;
        let snapshot = MetricsSnapshot::from_actuals(&company, &actuals);
        Ok((company, snapshot))
    }

    // ── Plans ──────────────────────────────────────────────────

    pub fn create_plan(
        &self,
        company_id: i64,
        plan_name: &str,
        year: i32,
        assumptions: PlanAssumptions,
    ) -> Result<(i64, PlanProjection)> {
        let company = self.store.get_company(company_id)?;
        let projection = planner::create_12month_plan(&company, &assumptions, year)?;

        let plan = FinancialPlan::draft(company_id, plan_name, year, assumptions);
        let plan_id = self.store.create_plan_with_months(&plan, &projection.months)?;

        if projection.feasibility.score < 50.0 {
            tracing::warn!(
                "⚠️ Plan '{}' looks hard to reach (feasibility {:.0}/100)",
                plan_name,
                projection.feasibility.score
            );
        }
        Ok((plan_id, projection))
    }

    pub fn plan_with_months(&self, plan_id: i64) -> Result<(FinancialPlan, Vec<MonthlyPlan>)> {
        let plan = self.store.get_plan(plan_id)?;
        let months = self.store.monthly_plans(plan_id)?;
        Ok((plan, months))
    }

    pub fn activate_plan(&self, plan_id: i64) -> Result<()> {
        self.store.activate_plan(plan_id)
    }

    fn active_months(&self, company_id: i64) -> Result<Vec<MonthlyPlan>> {
        match self.store.active_plan(company_id)? {
            Some(plan) => match plan.id {
                Some(id) => self.store.monthly_plans(id),
                None => Ok(Vec::new()),
            },
            None => Ok(Vec::new()),
        }
    }

    // ── Actuals ────────────────────────────────────────────────

    /// 驗證、補齊衍生欄位、對應啟用中的計畫月份後寫入
    pub fn record_actual(&self, mut actual: ActualData) -> Result<(i64, ActualValidation)> {
        let validation = validate_actual(&actual);
        if !validation.is_valid() {
            return Err(MetricsError::ValidationError {
                message: validation.errors.join("; "),
            });
        }
        for warning in &validation.warnings {
            tracing::warn!("⚠️ {}", warning);
        }

        // 確認公司存在
        self.store.get_company(actual.company_id)?;

        let previous: Vec<ActualData> = self
            .store
            .actuals_for_company(actual.company_id)?
            .into_iter()
            .filter(|a| a.period() < actual.period())
            .collect();
        derive_fields(&mut actual.figures, &previous);

        let plan_month = self
            .active_months(actual.company_id)?
            .into_iter()
            .find(|m| m.period() == actual.period());
        if let Some(month) = plan_month {
            actual.monthly_plan_id = month.id;
            actual.variance = Some(RecordedVariance::compute(&month.figures, &actual.figures));
        }

        actual.recorded_at = Some(Utc::now());
        let id = self.store.save_actual(&actual)?;
        tracing::info!(
            "✅ Recorded actuals for {}-{:02} (id {})",
            actual.year,
            actual.month_number,
            id
        );
        Ok((id, validation))
    }

    /// 匯入 CSV，依期間排序逐月寫入，回傳筆數
    pub fn import_actuals<P: AsRef<Path>>(&self, company_id: i64, path: P) -> Result<usize> {
        let file = std::fs::File::open(path.as_ref())?;
        let mut actuals = read_actuals_csv(file, company_id)?;
        actuals.sort_by_key(|a| a.period());

        let count = actuals.len();
        for actual in actuals {
            self.record_actual(actual)?;
        }
        tracing::info!("📁 Imported {} months from {}", count, path.as_ref().display());
        Ok(count)
    }

    pub fn finalize_actual(&self, actual_id: i64) -> Result<()> {
        self.store.finalize_actual(actual_id)
    }

    // ── Analysis ───────────────────────────────────────────────

    pub fn variance_report(&self, company_id: i64) -> Result<VarianceReport> {
        let company = self.store.get_company(company_id)?;
        let plans = self.active_months(company_id)?;
        if plans.is_empty() {
            return Err(MetricsError::ValidationError {
                message: format!("{} has no active plan to compare against", company.name),
            });
        }
        let actuals = self.store.actuals_for_company(company_id)?;
        Ok(variance::analyze(&plans, &actuals, company.stage))
    }

    pub fn plan_vs_actual(&self, company_id: i64) -> Result<Vec<PlanActualRow>> {
        let plans = self.active_months(company_id)?;
        let actuals = self.store.actuals_for_company(company_id)?;
        Ok(planner::plan_vs_actual_summary(&plans, &actuals))
    }

    pub fn benchmark(&self, company_id: i64) -> Result<(StageAssessment, BenchmarkComparison)> {
        let (company, snapshot) = self.snapshot(company_id)?;
        let values = snapshot.benchmark_values();
        Ok((
            assess_company(company.stage, &values),
            compare_with_benchmarks(&values, company.stage),
        ))
    }

    pub fn runway_inputs(&self, company_id: i64) -> Result<RunwayInputs> {
        let company = self.store.get_company(company_id)?;
        let actuals = self.store.actuals_for_company(company_id)?;
        let snapshot = MetricsSnapshot::from_actuals(&company, &actuals);

        let inputs = match actuals.last() {
            Some(latest) => RunwayInputs {
                cash_balance: latest.figures.cash_balance,
                monthly_expenses: latest.figures.total_costs,
                monthly_revenue: latest.figures.total_revenue,
                revenue_growth_rate: snapshot.monthly_growth_rate,
            },
            // 沒有實際資料時改用啟用中計畫的第一個月
            None => {
                let first = self.active_months(company_id)?.into_iter().min_by_key(|m| m.period());
                let Some(month) = first else {
                    return Err(MetricsError::ValidationError {
                        message: format!(
                            "{} has no actuals or active plan; record actuals or activate a plan first",
                            company.name
                        ),
                    });
                };
                RunwayInputs {
                    cash_balance: company.cash_balance,
                    monthly_expenses: month.figures.total_costs,
                    monthly_revenue: month.figures.total_revenue,
                    revenue_growth_rate: 0.0,
                }
            }
        };
        Ok(inputs)
    }

    /// 以目前指標跑所有範本情境，save 為真時寫回資料庫
    pub fn scenarios(&self, company_id: i64, months: u32, save: bool) -> Result<ScenarioComparison> {
        let (_, snapshot) = self.snapshot(company_id)?;
        let base = BaseMetrics::from_snapshot(&snapshot);
        let comparison = compare_scenarios(&base, months);

        if save {
            let plan_id = self.store.active_plan(company_id)?.and_then(|p| p.id);
            for result in &comparison.ranked {
                let template = find_template(&result.name);
                let scenario = to_scenario(company_id, plan_id, template.as_ref(), result)?;
                self.store.save_scenario(&scenario)?;
            }
            tracing::info!("💾 Saved {} scenarios", comparison.ranked.len());
        }
        Ok(comparison)
    }

    pub fn health(&self, company_id: i64) -> Result<HealthScore> {
        let actuals = self.store.actuals_for_company(company_id)?;
        Ok(financial_health_score(&actuals))
    }

    pub fn data_quality(&self, company_id: i64) -> Result<ValidationReport> {
        let (company, snapshot) = self.snapshot(company_id)?;
        Ok(validate_all(&company, &snapshot))
    }

    pub fn advisor(&self, company_id: i64) -> Result<AdvisorReport> {
        let (company, snapshot) = self.snapshot(company_id)?;
        let practice = PlanningPractice {
            has_financial_plan: self.store.active_plan(company_id)?.is_some(),
            tracks_metrics: snapshot.period.is_some(),
        };
        Ok(analyze_company(&company, &snapshot, practice))
    }

    pub fn funding_readiness(&self, company_id: i64, today: NaiveDate) -> Result<FundingReadiness> {
        let (_, snapshot) = self.snapshot(company_id)?;
        Ok(funding_readiness(&snapshot, today))
    }

    pub fn quarterly_okrs(&self, company_id: i64, today: NaiveDate) -> Result<QuarterlyOkrs> {
        let (_, snapshot) = self.snapshot(company_id)?;
        Ok(quarterly_okrs(&snapshot, today))
    }

    pub fn roadmap(&self, company_id: i64, start: NaiveDate) -> Result<Roadmap> {
        let (company, snapshot) = self.snapshot(company_id)?;
        Ok(year_one_roadmap(&snapshot, company.team_size, start))
    }

    /// 未指定輪次時以公司目前階段為準
    pub fn investor_report(&self, company_id: i64, round: Option<Stage>, today: NaiveDate) -> Result<InvestorReport> {
        let (company, snapshot) = self.snapshot(company_id)?;
        let round = round.unwrap_or(company.stage);
        Ok(investor_report(&company, &snapshot, round, today))
    }

    pub fn board_report(&self, company_id: i64, year: i32, quarter: u32) -> Result<BoardReport> {
        let company = self.store.get_company(company_id)?;
        let actuals = self.store.actuals_for_company(company_id)?;
        let plans = self.active_months(company_id)?;
        board_report(&company, &actuals, &plans, year, quarter)
    }

    pub fn report(&self, company_id: i64) -> Result<CompanyReport> {
        let (company, snapshot) = self.snapshot(company_id)?;
        let comparison = compare_with_benchmarks(&snapshot.benchmark_values(), company.stage);
        let actuals = self.store.actuals_for_company(company_id)?;
        Ok(CompanyReport {
            company,
            snapshot,
            comparison,
            actuals,
            generated_at: Utc::now(),
        })
    }

    // ── Output ─────────────────────────────────────────────────

    pub async fn export(&self, company_id: i64, formats: &[ExportFormat], bundle: bool) -> Result<Vec<String>> {
        let report = self.report(company_id)?;
        self.exporter.export_report(&report, formats, bundle).await
    }

    pub async fn export_plan(&self, plan_id: i64) -> Result<String> {
        let (plan, months) = self.plan_with_months(plan_id)?;
        let company = self.store.get_company(plan.company_id)?;
        self.exporter.export_plan(&company, &plan, &months).await
    }

    pub async fn export_investor_report(
        &self,
        company_id: i64,
        round: Option<Stage>,
        format: ExportFormat,
    ) -> Result<String> {
        let report = self.investor_report(company_id, round, Utc::now().date_naive())?;
        self.exporter.export_investor_report(&report, format).await
    }

    pub async fn export_board_report(
        &self,
        company_id: i64,
        year: i32,
        quarter: u32,
        format: ExportFormat,
    ) -> Result<String> {
        let report = self.board_report(company_id, year, quarter)?;
        self.exporter.export_board_report(&report, format).await
    }

    /// 分析者本身不會失敗；只有讀取公司資料失敗時才回傳錯誤
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let report = self.report(request.company_id)?;
        let quality = validate_all(&report.company, &report.snapshot);
        let context = build_context(
            &report.company,
            &report.snapshot,
            &report.comparison,
            &report.actuals,
            &quality,
        );
        Ok(self.analyst.analyze(request, &context).await)
    }

    pub fn backup<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        self.store.backup(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyst::LocalAnalyst;
    use crate::domain::model::{AnalysisType, MonthlyFigures, Stage};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn dashboard(dir: &TempDir) -> Dashboard<LocalStorage, LocalAnalyst> {
        let dashboard = Dashboard::new(
            SqliteStore::in_memory().unwrap(),
            LocalStorage::new(dir.path()),
            LocalAnalyst::new(),
        );
        dashboard.init().unwrap();
        dashboard
    }

    fn company() -> Company {
        let mut c = Company::new("Acme", Stage::Seed);
        c.current_mrr = 50_000.0;
        c.current_customers = 100;
        c.monthly_price = 500.0;
        c.team_size = 5;
        c.cash_balance = 1_000_000.0;
        c
    }

    fn figures(mrr: f64, customers: u32, cash: f64) -> MonthlyFigures {
        let mut f = MonthlyFigures {
            mrr,
            new_customers: 10,
            total_customers: customers,
            churned_customers: 2,
            marketing_spend: 10_000.0,
            cash_balance: cash,
            ..Default::default()
        };
        f.opex.salaries = 60_000.0;
        f
    }

    #[test]
    fn test_add_company_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);

        let mut bad = company();
        bad.monthly_price = 0.0;
        let err = dashboard.add_company(&bad).unwrap_err();
        assert!(matches!(err, MetricsError::ValidationError { .. }));
        assert!(dashboard.store().list_companies().unwrap().is_empty());
    }

    #[test]
    fn test_record_actual_links_active_plan() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        let (plan_id, projection) = dashboard
            .create_plan(id, "Base", 2025, PlanAssumptions::default())
            .unwrap();
        assert_eq!(projection.months.len(), 12);
        dashboard.activate_plan(plan_id).unwrap();

        let (actual_id, validation) = dashboard
            .record_actual(ActualData::new(id, 2025, 1, figures(48_000.0, 105, 950_000.0)))
            .unwrap();
        assert!(validation.is_valid());

        let stored = dashboard.store().get_actual(id, 2025, 1).unwrap().unwrap();
        assert_eq!(stored.id, Some(actual_id));
        assert!(stored.monthly_plan_id.is_some());
        assert!(stored.variance.is_some());
        // 70000 costs - 48000 revenue
        assert_eq!(stored.figures.burn_rate, 22_000.0);

        let rows = dashboard.plan_vs_actual(id).unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].status, "in_progress");

        let report = dashboard.variance_report(id).unwrap();
        assert_eq!(report.months.len(), 1);
    }

    #[test]
    fn test_record_actual_rejects_bad_period() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        let result = dashboard.record_actual(ActualData::new(id, 2019, 5, figures(1.0, 1, 1.0)));
        assert!(matches!(result, Err(MetricsError::ValidationError { .. })));
    }

    #[test]
    fn test_variance_requires_active_plan() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();
        assert!(dashboard.variance_report(id).is_err());
    }

    #[test]
    fn test_runway_inputs_from_latest_actual() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        dashboard
            .record_actual(ActualData::new(id, 2025, 1, figures(40_000.0, 100, 900_000.0)))
            .unwrap();
        dashboard
            .record_actual(ActualData::new(id, 2025, 2, figures(44_000.0, 108, 870_000.0)))
            .unwrap();

        let inputs = dashboard.runway_inputs(id).unwrap();
        assert_eq!(inputs.cash_balance, 870_000.0);
        assert_eq!(inputs.monthly_expenses, 70_000.0);
        assert_eq!(inputs.monthly_revenue, 44_000.0);
        assert!((inputs.revenue_growth_rate - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_runway_inputs_without_actuals_use_active_plan() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        // 沒有實際資料也沒有計畫
        assert!(matches!(
            dashboard.runway_inputs(id),
            Err(MetricsError::ValidationError { .. })
        ));

        let (plan_id, projection) = dashboard
            .create_plan(id, "Base", 2025, PlanAssumptions::default())
            .unwrap();
        dashboard.activate_plan(plan_id).unwrap();

        let first = &projection.months[0].figures;
        let inputs = dashboard.runway_inputs(id).unwrap();
        assert_eq!(inputs.cash_balance, 1_000_000.0);
        assert_eq!(inputs.monthly_expenses, first.total_costs);
        assert_eq!(inputs.monthly_revenue, first.total_revenue);
        assert!(inputs.monthly_expenses > 0.0);
    }

    #[test]
    fn test_advisor_and_reports() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();

        let advice = dashboard.advisor(id).unwrap();
        // 沒有計畫也沒有實際資料
        assert_eq!(advice.mistakes.len(), 1);

        let readiness = dashboard.funding_readiness(id, today).unwrap();
        assert!((0.0..=100.0).contains(&readiness.score));

        let okrs = dashboard.quarterly_okrs(id, today).unwrap();
        assert_eq!(okrs.quarter, "Q3 2025");

        let roadmap = dashboard.roadmap(id, today).unwrap();
        assert_eq!(roadmap.milestones.len(), 12);

        let investor = dashboard.investor_report(id, None, today).unwrap();
        assert_eq!(investor.round, Stage::Seed);

        assert!(dashboard.board_report(id, 2025, 1).is_err());
        dashboard
            .record_actual(ActualData::new(id, 2025, 1, figures(40_000.0, 100, 900_000.0)))
            .unwrap();
        let board = dashboard.board_report(id, 2025, 1).unwrap();
        assert_eq!(board.actuals.months, 1);
    }

    #[test]
    fn test_scenarios_saved() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        let comparison = dashboard.scenarios(id, 12, true).unwrap();
        assert_eq!(comparison.ranked.len(), 5);
        assert_eq!(dashboard.store().list_scenarios(id).unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_export_and_analyze() {
        let dir = TempDir::new().unwrap();
        let dashboard = dashboard(&dir);
        let id = dashboard.add_company(&company()).unwrap();

        let paths = dashboard.export(id, &[ExportFormat::Json], false).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert!(Path::new(&paths[0]).exists());

        let response = dashboard
            .analyze(&AnalysisRequest {
                company_id: id,
                analysis_type: AnalysisType::FullBusinessAnalysis,
                custom_query: None,
                language: "en".to_string(),
            })
            .await
            .unwrap();
        assert!(response.is_fallback);
        assert!(response.analysis["executive_summary"].is_string());
    }
}
