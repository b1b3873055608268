use crate::core::unit_economics::MetricsSnapshot;
use crate::domain::model::Company;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityIssue {
    pub level: IssueLevel,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl QualityIssue {
    fn new(level: IssueLevel, field: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            field: field.to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: &str) -> Self {
        self.suggestion = Some(suggestion.to_string());
        self
    }
}

pub fn validate_company(company: &Company) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    if company.name.trim().is_empty() {
        issues.push(QualityIssue::new(IssueLevel::Error, "name", "Company name is required"));
    }

    let positive = [
        ("current_mrr", company.current_mrr),
        ("current_customers", company.current_customers as f64),
        ("monthly_price", company.monthly_price),
        ("team_size", company.team_size as f64),
    ];
    for (field, value) in positive {
        if value <= 0.0 {
            issues.push(QualityIssue::new(
                IssueLevel::Error,
                field,
                format!("{} must be positive (got {})", field, value),
            ));
        }
    }

    if company.team_size > 1000 {
        issues.push(
            QualityIssue::new(
                IssueLevel::Warning,
                "team_size",
                format!("Team size {} is unusually large", company.team_size),
            )
            .suggest("Check that team size counts people, not salary"),
        );
    }
    if company.monthly_price > 0.0 && !(1.0..=100_000.0).contains(&company.monthly_price) {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "monthly_price",
            format!("Monthly price {:.2} is outside the usual 1-100000 range", company.monthly_price),
        ));
    }

    issues
}

pub fn check_business_rules(snapshot: &MetricsSnapshot, company: &Company) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    if snapshot.cac > 0.0 && snapshot.ltv_cac_ratio < 1.0 {
        issues.push(
            QualityIssue::new(
                IssueLevel::Error,
                "ltv_cac_ratio",
                format!("LTV/CAC of {:.2} means every customer loses money", snapshot.ltv_cac_ratio),
            )
            .suggest("Lower acquisition cost or raise prices"),
        );
    }

    if snapshot.burn_rate > company.cash_balance * 12.0 {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "burn_rate",
            "Monthly burn is larger than a year of cash",
        ));
    }

    let growth_limit = if snapshot.mrr < 10_000.0 { 1.0 } else { 0.5 };
    if snapshot.monthly_growth_rate > growth_limit {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "monthly_growth_rate",
            format!(
                "Monthly growth of {:.0}% looks unrealistic",
                snapshot.monthly_growth_rate * 100.0
            ),
        ));
    }

    if snapshot.customers > 0 && snapshot.arpu < 10.0 {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "arpu",
            format!("ARPU of {:.2} is very low", snapshot.arpu),
        ));
    }

    if let Some(runway) = snapshot.runway_months {
        if runway < 6.0 {
            issues.push(
                QualityIssue::new(
                    IssueLevel::Critical,
                    "runway_months",
                    format!("Runway is only {:.1} months", runway),
                )
                .suggest("Start fundraising or cut costs immediately"),
            );
        }
    }

    issues
}

pub fn check_metric_consistency(snapshot: &MetricsSnapshot) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    let expected_arr = snapshot.mrr * 12.0;
    if expected_arr > 0.0 && (snapshot.arr - expected_arr).abs() / expected_arr > 0.1 {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "arr",
            format!("ARR {:.0} does not match MRR x 12 ({:.0})", snapshot.arr, expected_arr),
        ));
    }

    if snapshot.cac > 0.0 {
        if snapshot.ltv_cac_ratio < 1.0 {
            issues.push(QualityIssue::new(
                IssueLevel::Critical,
                "ltv_cac_ratio",
                "LTV is below CAC",
            ));
        } else if snapshot.ltv_cac_ratio < 3.0 {
            issues.push(QualityIssue::new(
                IssueLevel::Warning,
                "ltv_cac_ratio",
                format!("LTV/CAC of {:.2} is below the 3x target", snapshot.ltv_cac_ratio),
            ));
        }
    }

    if snapshot.monthly_churn_rate > 0.05 && snapshot.monthly_churn_rate > snapshot.monthly_growth_rate {
        issues.push(QualityIssue::new(
            IssueLevel::Warning,
            "monthly_churn_rate",
            "Churn is outpacing growth",
        ));
    }

    issues
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub quality_score: f64,
    pub issues: Vec<QualityIssue>,
}

impl ValidationReport {
    pub fn from_issues(issues: Vec<QualityIssue>) -> Self {
        let count = |level: IssueLevel| issues.iter().filter(|i| i.level == level).count() as f64;
        let critical = count(IssueLevel::Critical);
        let errors = count(IssueLevel::Error);
        let warnings = count(IssueLevel::Warning);

        let quality_score = (100.0 - 25.0 * critical - 15.0 * errors - 5.0 * warnings).clamp(0.0, 100.0);

        Self {
            is_valid: critical == 0.0 && errors == 0.0,
            quality_score,
            issues,
        }
    }

    pub fn count(&self, level: IssueLevel) -> usize {
        self.issues.iter().filter(|i| i.level == level).count()
    }
}

/// 公司資料、商業規則與指標一致性的完整檢查
pub fn validate_all(company: &Company, snapshot: &MetricsSnapshot) -> ValidationReport {
    let mut issues = validate_company(company);
    issues.extend(check_business_rules(snapshot, company));
    issues.extend(check_metric_consistency(snapshot));
    ValidationReport::from_issues(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Stage;

    fn company() -> Company {
        let mut c = Company::new("Acme", Stage::Seed);
        c.current_mrr = 50_000.0;
        c.current_customers = 100;
        c.monthly_price = 500.0;
        c.team_size = 8;
        c.cash_balance = 1_000_000.0;
        c
    }

    #[test]
    fn test_validate_company() {
        assert!(validate_company(&company()).is_empty());

        let mut bad = company();
        bad.name = "  ".to_string();
        bad.monthly_price = 0.0;
        bad.team_size = 2000;
        let issues = validate_company(&bad);
        assert_eq!(issues.iter().filter(|i| i.level == IssueLevel::Error).count(), 2);
        assert_eq!(issues.iter().filter(|i| i.level == IssueLevel::Warning).count(), 1);
    }

    #[test]
    fn test_business_rules() {
        let snapshot = MetricsSnapshot {
            mrr: 50_000.0,
            arr: 600_000.0,
            customers: 100,
            arpu: 5.0,
            cac: 1_000.0,
            ltv_cac_ratio: 0.5,
            runway_months: Some(4.0),
            monthly_growth_rate: 0.6,
            ..Default::default()
        };
        let issues = check_business_rules(&snapshot, &company());
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["ltv_cac_ratio", "monthly_growth_rate", "arpu", "runway_months"]
        );
        assert_eq!(issues[3].level, IssueLevel::Critical);
    }

    #[test]
    fn test_metric_consistency() {
        let snapshot = MetricsSnapshot {
            mrr: 10_000.0,
            arr: 100_000.0,
            cac: 1_000.0,
            ltv_cac_ratio: 2.0,
            monthly_churn_rate: 0.08,
            monthly_growth_rate: 0.02,
            ..Default::default()
        };
        let issues = check_metric_consistency(&snapshot);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.level == IssueLevel::Warning));
    }

    #[test]
    fn test_quality_score() {
        let issues = vec![
            QualityIssue::new(IssueLevel::Critical, "a", "x"),
            QualityIssue::new(IssueLevel::Error, "b", "x"),
            QualityIssue::new(IssueLevel::Warning, "c", "x"),
            QualityIssue::new(IssueLevel::Info, "d", "x"),
        ];
        let report = ValidationReport::from_issues(issues);
        assert!(!report.is_valid);
        assert_eq!(report.quality_score, 55.0);

        let clean = ValidationReport::from_issues(Vec::new());
        assert!(clean.is_valid);
        assert_eq!(clean.quality_score, 100.0);
    }
}
