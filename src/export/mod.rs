// 報表匯出：CSV / JSON / Markdown / HTML 與 zip 打包，經由 Storage 寫出

pub mod render;

use crate::core::benchmarks::{find_benchmark, BenchmarkComparison};
use crate::core::reports::{BoardReport, InvestorReport};
use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::{ActualData, Company, Direction, FinancialPlan, MonthlyPlan, Stage};
use crate::domain::ports::Storage;
use crate::utils::error::{MetricsError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
    Html,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Json,
        ExportFormat::Markdown,
        ExportFormat::Html,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "markdown",
            ExportFormat::Html => "html",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            other => other.as_str(),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "html" => Ok(ExportFormat::Html),
            other => Err(MetricsError::invalid_input(
                "format",
                other,
                "expected one of: csv json markdown html",
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 匯出所需的所有資料
#[derive(Debug, Clone)]
pub struct CompanyReport {
    pub company: Company,
    pub snapshot: MetricsSnapshot,
    pub comparison: BenchmarkComparison,
    pub actuals: Vec<ActualData>,
    pub generated_at: DateTime<Utc>,
}

/// 依基準目標值給狀態標籤，越低越好的指標反向比較
pub fn status_against(value: f64, target: f64, direction: Direction) -> &'static str {
    let (ratio_ok, ratio_fair, ratio_best) = match direction {
        Direction::HigherIsBetter => (value >= target, value >= target * 0.7, value >= target * 1.3),
        Direction::LowerIsBetter => (value <= target, value <= target * 1.3, value <= target * 0.7),
    };
    if ratio_best {
        "Excellent"
    } else if ratio_ok {
        "Good"
    } else if ratio_fair {
        "Fair"
    } else {
        "Needs Improvement"
    }
}

/// 以階段基準表的 target 判斷，沒有對應基準時回傳 "-"
pub fn metric_status(stage: Stage, metric: &str, value: f64) -> &'static str {
    match find_benchmark(stage, metric) {
        Some(b) => status_against(value, b.target, b.direction),
        None => "-",
    }
}

pub fn runway_status(runway: Option<f64>) -> &'static str {
    let Some(months) = runway else {
        return "Excellent";
    };
    if months >= 18.0 {
        "Excellent"
    } else if months >= 12.0 {
        "Good"
    } else if months >= 9.0 {
        "Fair"
    } else if months >= 6.0 {
        "Concerning"
    } else if months >= 3.0 {
        "Critical"
    } else {
        "Emergency"
    }
}

fn slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "company".to_string()
    } else {
        slug
    }
}

pub fn render_format(report: &CompanyReport, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => render::to_csv(report),
        ExportFormat::Json => render::to_json(report),
        ExportFormat::Markdown => Ok(render::to_markdown(report).into_bytes()),
        ExportFormat::Html => Ok(render::to_html(report).into_bytes()),
    }
}

/// 將多個檔案打包成單一 zip
pub fn bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    tracing::debug!("Creating ZIP file with {} files", files.len());

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }

    // 完成並取回底層 Vec<u8>
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn unsupported_document_format(format: ExportFormat) -> MetricsError {
    MetricsError::invalid_input("format", format, "investor and board reports support json or markdown")
}

pub struct Exporter<S: Storage> {
    storage: S,
}

impl<S: Storage> Exporter<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn file_name(report: &CompanyReport, suffix: &str, extension: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            slug(&report.company.name),
            suffix,
            report.generated_at.format("%Y%m%d"),
            extension
        )
    }

    /// 寫出公司報表，回傳寫出的檔案路徑
    pub async fn export_report(
        &self,
        report: &CompanyReport,
        formats: &[ExportFormat],
        as_bundle: bool,
    ) -> Result<Vec<String>> {
        if formats.is_empty() {
            return Err(MetricsError::ValidationError {
                message: "At least one export format is required".to_string(),
            });
        }

        let mut files = Vec::with_capacity(formats.len());
        for format in formats {
            let name = Self::file_name(report, "report", format.extension());
            files.push((name, render_format(report, *format)?));
        }

        if as_bundle {
            let zip_data = bundle(&files)?;
            let name = Self::file_name(report, "report", "zip");
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            let path = self.storage.write_file(&name, &zip_data).await?;
            self.verify_bundle(&name, files.len()).await?;
            tracing::info!("📁 Report bundle saved to {}", path);
            return Ok(vec![path]);
        }

        let mut written = Vec::with_capacity(files.len());
        for (name, data) in &files {
            let path = self.storage.write_file(name, data).await?;
            tracing::info!("📁 Report saved to {}", path);
            written.push(path);
        }
        Ok(written)
    }

    /// 讀回剛寫出的 zip，確認檔案數量一致
    pub async fn verify_bundle(&self, name: &str, expected_entries: usize) -> Result<()> {
        let data = self.storage.read_file(name).await?;
        let archive = zip::ZipArchive::new(std::io::Cursor::new(data))?;
        if archive.len() != expected_entries {
            return Err(MetricsError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("bundle {} has {} entries, expected {}", name, archive.len(), expected_entries),
            )));
        }
        tracing::debug!("✅ Verified bundle {} ({} entries)", name, expected_entries);
        Ok(())
    }

    pub async fn export_investor_report(&self, report: &InvestorReport, format: ExportFormat) -> Result<String> {
        let data = match format {
            ExportFormat::Json => serde_json::to_vec_pretty(report)?,
            ExportFormat::Markdown => render::investor_to_markdown(report).into_bytes(),
            other => return Err(unsupported_document_format(other)),
        };
        let name = format!(
            "{}_investor_{}_{}.{}",
            slug(&report.company_name),
            report.round.as_str(),
            report.generated_on.format("%Y%m%d"),
            format.extension()
        );
        let path = self.storage.write_file(&name, &data).await?;
        tracing::info!("📁 Investor report saved to {}", path);
        Ok(path)
    }

    pub async fn export_board_report(&self, report: &BoardReport, format: ExportFormat) -> Result<String> {
        let data = match format {
            ExportFormat::Json => serde_json::to_vec_pretty(report)?,
            ExportFormat::Markdown => render::board_to_markdown(report).into_bytes(),
            other => return Err(unsupported_document_format(other)),
        };
        let name = format!(
            "{}_board_{}_q{}.{}",
            slug(&report.company_name),
            report.year,
            report.quarter,
            format.extension()
        );
        let path = self.storage.write_file(&name, &data).await?;
        tracing::info!("📁 Board report saved to {}", path);
        Ok(path)
    }

    pub async fn export_plan(
        &self,
        company: &Company,
        plan: &FinancialPlan,
        months: &[MonthlyPlan],
    ) -> Result<String> {
        let data = render::plan_to_csv(plan, months)?;
        let name = format!("{}_plan_{}_v{}.csv", slug(&company.name), plan.plan_year, plan.version);
        let path = self.storage.write_file(&name, &data).await?;
        tracing::info!("📁 Plan saved to {}", path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::benchmarks::compare_with_benchmarks;
    use crate::domain::model::MonthlyFigures;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                MetricsError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<String> {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
            Ok(path.to_string())
        }
    }

    fn report() -> CompanyReport {
        let mut company = Company::new("Acme Cloud", Stage::Seed);
        company.current_mrr = 100_000.0;
        company.current_customers = 200;
        company.monthly_price = 500.0;
        company.team_size = 10;
        company.cash_balance = 1_500_000.0;

        let actuals = vec![ActualData::new(
            1,
            2025,
            3,
            MonthlyFigures {
                mrr: 100_000.0,
                new_customers: 12,
                total_customers: 200,
                total_revenue: 100_000.0,
                total_costs: 180_000.0,
                burn_rate: 80_000.0,
                cash_balance: 1_520_000.0,
                runway_months: 19.0,
                ..Default::default()
            },
        )];
        let snapshot = MetricsSnapshot::from_actuals(&company, &actuals);
        let comparison = compare_with_benchmarks(&snapshot.benchmark_values(), company.stage);

        CompanyReport {
            company,
            snapshot,
            comparison,
            actuals,
            generated_at: DateTime::parse_from_rfc3339("2025-04-02T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_status_direction() {
        assert_eq!(status_against(4.0, 3.0, Direction::HigherIsBetter), "Excellent");
        assert_eq!(status_against(3.0, 3.0, Direction::HigherIsBetter), "Good");
        assert_eq!(status_against(2.2, 3.0, Direction::HigherIsBetter), "Fair");
        assert_eq!(status_against(1.0, 3.0, Direction::HigherIsBetter), "Needs Improvement");

        assert_eq!(status_against(0.03, 0.05, Direction::LowerIsBetter), "Excellent");
        assert_eq!(status_against(0.05, 0.05, Direction::LowerIsBetter), "Good");
        assert_eq!(status_against(0.06, 0.05, Direction::LowerIsBetter), "Fair");
        assert_eq!(status_against(0.10, 0.05, Direction::LowerIsBetter), "Needs Improvement");
    }

    #[test]
    fn test_runway_status() {
        assert_eq!(runway_status(None), "Excellent");
        assert_eq!(runway_status(Some(18.0)), "Excellent");
        assert_eq!(runway_status(Some(12.0)), "Good");
        assert_eq!(runway_status(Some(9.5)), "Fair");
        assert_eq!(runway_status(Some(6.0)), "Concerning");
        assert_eq!(runway_status(Some(3.0)), "Critical");
        assert_eq!(runway_status(Some(1.0)), "Emergency");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("MD".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(ExportFormat::Markdown.extension(), "md");
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Acme Cloud"), "acme_cloud");
        assert_eq!(slug("  !!  "), "company");
    }

    #[test]
    fn test_csv_sections() {
        let text = String::from_utf8(render::to_csv(&report()).unwrap()).unwrap();
        assert!(text.starts_with("COMPANY SUMMARY\n"));
        assert!(text.contains("FINANCIAL METRICS"));
        assert!(text.contains("MONTHLY DATA"));
        assert!(text.contains("2025-03,100000.00,12,200"));
    }

    #[test]
    fn test_json_document() {
        let value: serde_json::Value = serde_json::from_slice(&render::to_json(&report()).unwrap()).unwrap();
        assert_eq!(value["company"]["name"], "Acme Cloud");
        assert_eq!(value["export_date"], "2025-04-02T10:00:00+00:00");
        assert_eq!(value["metadata"]["months"], 1);
        assert_eq!(value["report"]["metrics"]["mrr"], 100_000.0);
    }

    #[test]
    fn test_markdown_and_html_share_content() {
        let report = report();
        let md = render::to_markdown(&report);
        let html = render::to_html(&report);

        assert!(md.starts_with("# Acme Cloud Financial Report"));
        assert!(md.contains("| Runway | 19.0 months | Excellent |"));
        assert!(html.contains("<td>Runway</td><td>19.0 months</td><td>Excellent</td>"));
        assert!(html.contains("Overall score"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_export_separate_files() {
        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone());

        let paths = exporter
            .export_report(&report(), &[ExportFormat::Csv, ExportFormat::Markdown], false)
            .await
            .unwrap();

        assert_eq!(
            paths,
            vec![
                "acme_cloud_report_20250402.csv".to_string(),
                "acme_cloud_report_20250402.md".to_string()
            ]
        );
        assert!(storage.get_file("acme_cloud_report_20250402.md").await.is_some());
    }

    #[tokio::test]
    async fn test_export_bundle() {
        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone());

        let paths = exporter
            .export_report(&report(), &ExportFormat::ALL, true)
            .await
            .unwrap();
        assert_eq!(paths, vec!["acme_cloud_report_20250402.zip".to_string()]);

        let zip_bytes = storage.get_file(&paths[0]).await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        assert_eq!(archive.len(), 4);
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort();
        assert_eq!(names[0], "acme_cloud_report_20250402.csv");
    }

    #[tokio::test]
    async fn test_verify_bundle_detects_wrong_entry_count() {
        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone());
        let data = bundle(&[("a.csv".to_string(), b"x".to_vec())]).unwrap();
        storage.write_file("a.zip", &data).await.unwrap();

        assert!(exporter.verify_bundle("a.zip", 1).await.is_ok());
        assert!(exporter.verify_bundle("a.zip", 2).await.is_err());
        assert!(exporter.verify_bundle("missing.zip", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_export_investor_and_board_reports() {
        use crate::core::reports::{board_report, investor_report};
        use chrono::NaiveDate;

        let storage = MockStorage::new();
        let exporter = Exporter::new(storage.clone());
        let report = report();
        let today = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();

        let investor = investor_report(&report.company, &report.snapshot, Stage::Seed, today);
        let path = exporter
            .export_investor_report(&investor, ExportFormat::Markdown)
            .await
            .unwrap();
        assert_eq!(path, "acme_cloud_investor_seed_20250402.md");
        let md = String::from_utf8(storage.get_file(&path).await.unwrap()).unwrap();
        assert!(md.starts_with("# Acme Cloud Investor Report: Seed Round"));
        assert!(md.contains("## Funding Ask"));
        assert!(md.contains("## Investment Memo"));

        let board = board_report(&report.company, &report.actuals, &[], 2025, 1).unwrap();
        let path = exporter.export_board_report(&board, ExportFormat::Json).await.unwrap();
        assert_eq!(path, "acme_cloud_board_2025_q1.json");
        let value: serde_json::Value = serde_json::from_slice(&storage.get_file(&path).await.unwrap()).unwrap();
        assert_eq!(value["quarter"], 1);
        assert_eq!(value["actuals"]["ending_mrr"], 100_000.0);

        assert!(exporter.export_board_report(&board, ExportFormat::Csv).await.is_err());
    }

    #[tokio::test]
    async fn test_export_requires_format() {
        let exporter = Exporter::new(MockStorage::new());
        assert!(exporter.export_report(&report(), &[], false).await.is_err());
    }
}
