use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_range, Validate};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "saas-metrics")]
#[command(about = "SaaS financial metrics: plans, actuals, benchmarks and reports")]
pub struct CliConfig {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Database file (overrides the configuration)")]
    pub database: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the database and seed settings and benchmarks
    Init,
    /// Initialize and load the demo company
    Demo,
    #[command(subcommand)]
    Company(CompanyCommand),
    #[command(subcommand)]
    Plan(PlanCommand),
    #[command(subcommand)]
    Actual(ActualCommand),
    /// Current unit economics
    Metrics { company_id: i64 },
    /// Plan vs actual variance analysis for the active plan
    Variance { company_id: i64 },
    /// Compare the company with its stage benchmarks
    Benchmark { company_id: i64 },
    /// Runway, scenarios and fundraising timing
    Runway { company_id: i64 },
    /// Simulate the what-if scenario templates
    Scenarios {
        company_id: i64,
        #[arg(long, default_value_t = 12)]
        months: u32,
        #[arg(long, help = "Store the results")]
        save: bool,
    },
    /// Cohort retention from a transactions CSV (customer_id,date,mrr)
    Cohort {
        csv: PathBuf,
        #[arg(long, default_value_t = 12)]
        forecast_months: usize,
        #[arg(long, help = "Also show acquisition and retention by calendar month")]
        seasonality: bool,
    },
    /// Early-stage advice: challenges, action plan, funding readiness and OKRs
    Advise { company_id: i64 },
    /// First-year roadmap with milestones, quarters and resources
    Roadmap {
        company_id: i64,
        #[arg(long, help = "Start date (YYYY-MM-DD), today by default")]
        start: Option<NaiveDate>,
    },
    /// Investor report with valuation, funding ask and memo
    Investor {
        company_id: i64,
        #[arg(long, help = "Round stage, the company's stage by default")]
        round: Option<String>,
        #[arg(long, default_value = "markdown", help = "markdown or json")]
        format: String,
    },
    /// Quarterly board report
    Board {
        company_id: i64,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        quarter: u32,
        #[arg(long, default_value = "markdown", help = "markdown or json")]
        format: String,
    },
    /// Financial health score from finalized actuals
    Health { company_id: i64 },
    /// Export the company report, or one plan with --plan
    Export(ExportArgs),
    /// Narrative analysis (remote analyst with local fallback)
    Analyze(AnalyzeArgs),
    /// Copy the database to the backup directory
    Backup {
        #[arg(long)]
        dir: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum CompanyCommand {
    Add(CompanyArgs),
    List,
    Show { company_id: i64 },
}

#[derive(Debug, Clone, Args)]
pub struct CompanyArgs {
    pub name: String,
    #[arg(long, default_value = "pre_seed")]
    pub stage: String,
    #[arg(long)]
    pub industry: Option<String>,
    #[arg(long, default_value = "RUB")]
    pub currency: String,
    #[arg(long, default_value_t = 0.0)]
    pub mrr: f64,
    #[arg(long, default_value_t = 0)]
    pub customers: u32,
    #[arg(long, default_value_t = 0.0)]
    pub price: f64,
    #[arg(long, default_value_t = 1)]
    pub team: u32,
    #[arg(long, default_value_t = 0.0)]
    pub cash: f64,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PlanCommand {
    Create(PlanArgs),
    Show { plan_id: i64 },
    Activate { plan_id: i64 },
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    pub company_id: i64,
    #[arg(long, default_value = "Base plan")]
    pub name: String,
    #[arg(long)]
    pub year: i32,
    #[arg(long, help = "Monthly MRR growth, e.g. 0.15")]
    pub growth: Option<f64>,
    #[arg(long, help = "Monthly churn, e.g. 0.05")]
    pub churn: Option<f64>,
    #[arg(long, help = "runway | growth | profitability | balanced")]
    pub optimize: Option<String>,
    #[arg(long)]
    pub activate: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ActualCommand {
    Record(ActualArgs),
    /// Import months from CSV (year,month,mrr,new_customers,...)
    Import { company_id: i64, csv: PathBuf },
}

#[derive(Debug, Clone, Args)]
pub struct ActualArgs {
    pub company_id: i64,
    #[arg(long)]
    pub year: i32,
    #[arg(long)]
    pub month: u32,
    #[arg(long)]
    pub mrr: f64,
    #[arg(long, default_value_t = 0)]
    pub new_customers: u32,
    #[arg(long, default_value_t = 0)]
    pub total_customers: u32,
    #[arg(long, default_value_t = 0)]
    pub churned_customers: u32,
    #[arg(long, default_value_t = 0.0)]
    pub marketing: f64,
    #[arg(long, default_value_t = 0.0)]
    pub sales: f64,
    #[arg(long, default_value_t = 0.0)]
    pub salaries: f64,
    #[arg(long, default_value_t = 0.0)]
    pub other_costs: f64,
    #[arg(long, default_value_t = 0.0)]
    pub cash: f64,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub finalize: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    pub company_id: i64,
    #[arg(long, value_delimiter = ',', help = "csv,json,markdown,html (default from config)")]
    pub formats: Vec<String>,
    #[arg(long)]
    pub bundle: bool,
    #[arg(long)]
    pub output: Option<String>,
    #[arg(long, help = "Export this plan as CSV instead of the report")]
    pub plan: Option<i64>,
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    pub company_id: i64,
    #[arg(long = "type", default_value = "full_business_analysis")]
    pub analysis_type: String,
    #[arg(long)]
    pub query: Option<String>,
    #[arg(long)]
    pub language: Option<String>,
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(db) = &self.database {
            validate_path("database", db)?;
        }

        match &self.command {
            Command::Actual(ActualCommand::Record(args)) => {
                validate_range("month", args.month, 1, 12)?;
            }
            Command::Plan(PlanCommand::Create(args)) => {
                if let Some(churn) = args.churn {
                    validate_range("churn", churn, 0.0, 1.0)?;
                }
            }
            Command::Export(args) => {
                if let Some(output) = &args.output {
                    validate_path("output", output)?;
                }
            }
            Command::Board { quarter, .. } => {
                validate_range("quarter", *quarter, 1, 4)?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = CliConfig::try_parse_from(["saas-metrics", "metrics", "3", "--database", "x.db", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(!cli.log_json);
        assert_eq!(cli.database.as_deref(), Some("x.db"));
        assert!(matches!(cli.command, Command::Metrics { company_id: 3 }));
    }

    #[test]
    fn test_parse_company_add() {
        let cli = CliConfig::try_parse_from([
            "saas-metrics", "company", "add", "Acme", "--stage", "seed", "--mrr", "25000", "--team", "4",
        ])
        .unwrap();
        match cli.command {
            Command::Company(CompanyCommand::Add(args)) => {
                assert_eq!(args.name, "Acme");
                assert_eq!(args.stage, "seed");
                assert_eq!(args.mrr, 25_000.0);
                assert_eq!(args.team, 4);
                assert_eq!(args.currency, "RUB");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_board_and_roadmap() {
        let cli = CliConfig::try_parse_from([
            "saas-metrics", "board", "2", "--year", "2025", "--quarter", "5",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Board { company_id: 2, quarter: 5, .. }));
        assert!(cli.validate().is_err());

        let cli = CliConfig::try_parse_from(["saas-metrics", "roadmap", "1", "--start", "2025-03-01"]).unwrap();
        match cli.command {
            Command::Roadmap { start, .. } => assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 1)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_export_formats_are_comma_separated() {
        let cli = CliConfig::try_parse_from(["saas-metrics", "export", "1", "--formats", "csv,html", "--bundle"]).unwrap();
        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.formats, vec!["csv", "html"]);
                assert!(args.bundle);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_validate_month_range() {
        let cli = CliConfig::try_parse_from([
            "saas-metrics", "actual", "record", "1", "--year", "2025", "--month", "13", "--mrr", "100",
        ])
        .unwrap();
        assert!(cli.validate().is_err());
    }
}
