use anyhow::Result;
use saas_metrics::core::Dashboard;
use saas_metrics::domain::model::{
    ActualData, AnalysisRequest, AnalysisType, Company, MonthlyFigures, PlanAssumptions, PlanStatus, Stage,
};
use saas_metrics::export::ExportFormat;
use saas_metrics::{LocalAnalyst, LocalStorage, SqliteStore};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

type TestDashboard = Dashboard<LocalStorage, LocalAnalyst>;

fn open(dir: &TempDir) -> Result<TestDashboard> {
    let store = SqliteStore::open(db_path(dir))?;
    let dashboard = Dashboard::new(store, LocalStorage::new(dir.path().join("exports")), LocalAnalyst::new());
    dashboard.init()?;
    Ok(dashboard)
}

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join("metrics.db")
}

fn month(mrr: f64, new_customers: u32, total_customers: u32, cash: f64) -> MonthlyFigures {
    let mut figures = MonthlyFigures {
        mrr,
        new_customers,
        total_customers,
        churned_customers: 1,
        marketing_spend: 20_000.0,
        sales_spend: 5_000.0,
        cash_balance: cash,
        ..Default::default()
    };
    figures.opex.salaries = 150_000.0;
    figures.opex.office_rent = 15_000.0;
    figures
}

#[tokio::test]
async fn test_demo_plan_actuals_and_reports() -> Result<()> {
    let dir = TempDir::new()?;
    let dashboard = open(&dir)?;

    let company_id = dashboard.load_demo()?.expect("demo company created");
    // 已有公司時不重複建立
    assert_eq!(dashboard.load_demo()?, None);

    let (plan_id, projection) = dashboard.create_plan(company_id, "Base plan", 2025, PlanAssumptions::default())?;
    assert_eq!(projection.months.len(), 12);
    dashboard.activate_plan(plan_id)?;

    let (plan, months) = dashboard.plan_with_months(plan_id)?;
    assert!(plan.is_active);
    assert_eq!(plan.status, PlanStatus::Active);
    assert_eq!(months.len(), 12);

    dashboard.record_actual(ActualData::new(company_id, 2025, 1, month(27_000.0, 2, 6, 1_830_000.0)))?;
    let (feb_id, _) =
        dashboard.record_actual(ActualData::new(company_id, 2025, 2, month(30_000.0, 2, 7, 1_670_000.0)))?;
    dashboard.finalize_actual(feb_id)?;

    let report = dashboard.variance_report(company_id)?;
    assert_eq!(report.months.len(), 2);
    assert!(!report.months[0].variances.is_empty());

    let rows = dashboard.plan_vs_actual(company_id)?;
    assert_eq!(rows.len(), 12);

    let health = dashboard.health(company_id)?;
    assert_eq!(health.period, Some((2025, 2)));
    assert!((0.0..=100.0).contains(&health.score));

    let (_, snapshot) = dashboard.snapshot(company_id)?;
    assert_eq!(snapshot.period, Some((2025, 2)));
    assert_eq!(snapshot.mrr, 30_000.0);

    let paths = dashboard.export(company_id, &ExportFormat::ALL, false).await?;
    assert_eq!(paths.len(), 4);
    for path in &paths {
        assert!(Path::new(path).exists(), "missing export {}", path);
    }
    assert!(paths.iter().any(|p| p.ends_with(".md")));

    let plan_path = dashboard.export_plan(plan_id).await?;
    assert!(plan_path.ends_with("demo_saas_startup_plan_2025_v1.csv"));
    let plan_csv = std::fs::read_to_string(&plan_path)?;
    // 表頭加 12 個月
    assert_eq!(plan_csv.lines().count(), 13);

    let response = dashboard
        .analyze(&AnalysisRequest {
            company_id,
            analysis_type: AnalysisType::RiskAnalysis,
            custom_query: None,
            language: "en".to_string(),
        })
        .await?;
    assert!(response.success);
    assert!(response.is_fallback);
    assert!(response.analysis["risk_assessment"].is_array());
    Ok(())
}

#[tokio::test]
async fn test_bundle_contains_every_format() -> Result<()> {
    let dir = TempDir::new()?;
    let dashboard = open(&dir)?;
    let company_id = dashboard.load_demo()?.expect("demo company created");

    let formats = [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Html];
    let paths = dashboard.export(company_id, &formats, true).await?;
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with(".zip"));

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&paths[0])?)?;
    assert_eq!(archive.len(), 3);

    let json_name = archive
        .file_names()
        .find(|n| n.ends_with(".json"))
        .map(str::to_string)
        .expect("json entry");
    let mut content = String::new();
    archive.by_name(&json_name)?.read_to_string(&mut content)?;
    let document: serde_json::Value = serde_json::from_str(&content)?;
    assert_eq!(document["company"]["name"], "Demo SaaS Startup");
    assert_eq!(document["metadata"]["generator"], "saas-metrics");
    Ok(())
}

#[tokio::test]
async fn test_data_survives_reopen_and_reinit() -> Result<()> {
    let dir = TempDir::new()?;
    let company_id = {
        let dashboard = open(&dir)?;
        let mut company = Company::new("Persisted", Stage::Seed);
        company.current_mrr = 80_000.0;
        company.current_customers = 40;
        company.monthly_price = 2_000.0;
        company.team_size = 6;
        company.cash_balance = 3_000_000.0;
        let id = dashboard.add_company(&company)?;
        dashboard.record_actual(ActualData::new(id, 2025, 3, month(82_000.0, 3, 41, 2_900_000.0)))?;
        id
    };

    let dashboard = open(&dir)?;
    dashboard.init()?;

    let companies = dashboard.store().list_companies()?;
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].name, "Persisted");
    assert_eq!(companies[0].stage, Stage::Seed);

    let actual = dashboard
        .store()
        .get_actual(company_id, 2025, 3)?
        .expect("actual persisted");
    assert_eq!(actual.figures.mrr, 82_000.0);
    // 成本 190000 減營收 82000
    assert_eq!(actual.figures.burn_rate, 108_000.0);

    let backup = dashboard.backup(dir.path().join("backups"))?;
    assert!(backup.exists());
    Ok(())
}

#[tokio::test]
async fn test_import_actuals_from_csv() -> Result<()> {
    let dir = TempDir::new()?;
    let dashboard = open(&dir)?;
    let company_id = dashboard.load_demo()?.expect("demo company created");

    let csv_path = dir.path().join("actuals.csv");
    std::fs::write(
        &csv_path,
        "year,month,mrr,new_customers,total_customers,churned_customers,marketing_spend,salaries,cash_balance\n\
         2025,3,31000,2,8,1,15000,150000,1500000\n\
         2025,1,25000,1,6,0,10000,150000,1800000\n\
         2025,2,28000,2,7,1,12000,150000,1650000\n",
    )?;

    assert_eq!(dashboard.import_actuals(company_id, &csv_path)?, 3);

    let actuals = dashboard.store().actuals_for_company(company_id)?;
    assert_eq!(actuals.len(), 3);

    let (_, snapshot) = dashboard.snapshot(company_id)?;
    assert_eq!(snapshot.period, Some((2025, 3)));
    assert_eq!(snapshot.mrr, 31_000.0);
    assert_eq!(snapshot.customers, 8);

    let inputs = dashboard.runway_inputs(company_id)?;
    assert_eq!(inputs.cash_balance, 1_500_000.0);
    Ok(())
}
