use chrono::Utc;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use saas_metrics::config::cli::{ActualCommand, Command, CompanyCommand, PlanCommand};
use saas_metrics::core::benchmarks::fundraising_benchmark;
use saas_metrics::core::runway::{
    basic_runway, fundraising_timing, growth_adjusted_runway, runway_display, runway_scenarios,
    FUNDRAISING_BUFFER_MONTHS, FUNDRAISING_PROCESS_MONTHS,
};
use saas_metrics::core::{cohort, MetricsSnapshot};
use saas_metrics::domain::model::{
    ActualData, AnalysisRequest, AnalysisType, Company, MonthlyFigures, OptimizationGoal, Stage,
};
use saas_metrics::export::ExportFormat;
use saas_metrics::utils::error::ErrorSeverity;
use saas_metrics::utils::{logger, validation::Validate};
use saas_metrics::{AnalystClient, AppConfig, CliConfig, Dashboard, LocalStorage, Result, SqliteStore};
use std::path::Path;

type App = Dashboard<LocalStorage, AnalystClient>;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.log_json {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證參數
    if let Err(e) = cli.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: CliConfig) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.database {
        config.database.path = db.clone();
    }
    config.validate()?;

    // 不需要資料庫的指令
    if let Command::Cohort {
        csv,
        forecast_months,
        seasonality,
    } = &cli.command
    {
        return cohort_report(csv, *forecast_months, *seasonality);
    }

    let output_path = match &cli.command {
        Command::Export(args) => args.output.clone(),
        _ => None,
    }
    .unwrap_or_else(|| config.export.output_path.clone());

    let store = SqliteStore::open(&config.database.path)?;
    let app: App = Dashboard::new(
        store,
        LocalStorage::new(output_path),
        AnalystClient::new(config.analyst.clone()),
    );

    match cli.command {
        Command::Init => {
            app.init()?;
            println!("✅ Database initialized at {}", config.database.path);
        }
        Command::Demo => match app.load_demo()? {
            Some(id) => println!("✅ Demo company created (id {})", id),
            None => println!("💡 Companies already exist, demo data not loaded"),
        },
        Command::Company(cmd) => company_command(&app, cmd)?,
        Command::Plan(cmd) => plan_command(&app, &config, cmd)?,
        Command::Actual(cmd) => actual_command(&app, cmd)?,
        Command::Metrics { company_id } => metrics(&app, company_id)?,
        Command::Variance { company_id } => variance(&app, company_id)?,
        Command::Benchmark { company_id } => benchmark(&app, company_id)?,
        Command::Runway { company_id } => runway(&app, company_id)?,
        Command::Scenarios {
            company_id,
            months,
            save,
        } => scenarios(&app, company_id, months, save)?,
        Command::Health { company_id } => health(&app, company_id)?,
        Command::Advise { company_id } => advise(&app, company_id)?,
        Command::Roadmap { company_id, start } => {
            roadmap(&app, company_id, start.unwrap_or_else(|| Utc::now().date_naive()))?
        }
        Command::Investor {
            company_id,
            round,
            format,
        } => {
            let round = round.map(|r| r.parse::<Stage>()).transpose()?;
            let path = app
                .export_investor_report(company_id, round, format.parse::<ExportFormat>()?)
                .await?;
            println!("📁 Investor report exported to {}", path);
        }
        Command::Board {
            company_id,
            year,
            quarter,
            format,
        } => {
            let report = app.board_report(company_id, year, quarter)?;
            println!(
                "📊 Q{} {}: {} ({}/{})",
                quarter, year, report.performance.rating, report.performance.score, report.performance.max_score
            );
            let path = app
                .export_board_report(company_id, year, quarter, format.parse::<ExportFormat>()?)
                .await?;
            println!("📁 Board report exported to {}", path);
        }
        Command::Export(args) => {
            if let Some(plan_id) = args.plan {
                let path = app.export_plan(plan_id).await?;
                println!("📁 Plan exported to {}", path);
            } else {
                let names = if args.formats.is_empty() {
                    config.export.formats.clone()
                } else {
                    args.formats.clone()
                };
                let formats = names
                    .iter()
                    .map(|f| f.parse::<ExportFormat>())
                    .collect::<Result<Vec<_>>>()?;
                let paths = app
                    .export(args.company_id, &formats, args.bundle || config.export.bundle)
                    .await?;
                for path in paths {
                    println!("📁 {}", path);
                }
            }
        }
        Command::Analyze(args) => {
            let request = AnalysisRequest {
                company_id: args.company_id,
                analysis_type: args.analysis_type.parse::<AnalysisType>()?,
                custom_query: args.query,
                language: args.language.unwrap_or_else(|| config.analyst.language.clone()),
            };
            let response = app.analyze(&request).await?;
            if response.is_fallback {
                println!("💡 Local analysis (remote analyst unavailable)");
                if let Some(error) = &response.error {
                    tracing::info!("Analyst fallback reason: {}", error);
                }
            }
            println!("{}", serde_json::to_string_pretty(&response.analysis)?);
        }
        Command::Backup { dir } => {
            let dir = dir.unwrap_or_else(|| config.database.backup_dir.clone());
            let path = app.backup(&dir)?;
            println!("✅ Backup written to {}", path.display());
        }
        Command::Cohort { .. } => {}
    }

    Ok(())
}

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.to_vec());
    table
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn company_command(app: &App, cmd: CompanyCommand) -> Result<()> {
    match cmd {
        CompanyCommand::Add(args) => {
            let mut company = Company::new(args.name, args.stage.parse::<Stage>()?);
            company.industry = args.industry;
            company.currency = args.currency;
            company.current_mrr = args.mrr;
            company.current_customers = args.customers;
            company.monthly_price = args.price;
            company.team_size = args.team;
            company.cash_balance = args.cash;
            let id = app.add_company(&company)?;
            println!("✅ Company '{}' created (id {})", company.name, id);
        }
        CompanyCommand::List => {
            let mut t = table(&["ID", "Name", "Stage", "MRR", "Customers", "Team", "Cash"]);
            for c in app.store().list_companies()? {
                t.add_row(vec![
                    c.id.map(|id| id.to_string()).unwrap_or_default(),
                    c.name,
                    c.stage.display_name().to_string(),
                    format!("{:.0}", c.current_mrr),
                    c.current_customers.to_string(),
                    c.team_size.to_string(),
                    format!("{:.0}", c.cash_balance),
                ]);
            }
            println!("{t}");
        }
        CompanyCommand::Show { company_id } => {
            let (company, snapshot) = app.snapshot(company_id)?;
            println!("{} ({}, {})", company.name, company.stage.display_name(), company.currency);
            print_snapshot(&snapshot);
        }
    }
    Ok(())
}

fn plan_command(app: &App, config: &AppConfig, cmd: PlanCommand) -> Result<()> {
    match cmd {
        PlanCommand::Create(args) => {
            let mut assumptions = config.planning.clone();
            if let Some(growth) = args.growth {
                assumptions.mrr_growth_rate = growth;
            }
            if let Some(churn) = args.churn {
                assumptions.churn_rate = churn;
            }
            if let Some(goal) = &args.optimize {
                assumptions.optimize_for = goal.parse::<OptimizationGoal>()?;
            }

            let (plan_id, projection) = app.create_plan(args.company_id, &args.name, args.year, assumptions)?;
            if args.activate {
                app.activate_plan(plan_id)?;
            }
            print_months(&projection.months);

            let s = &projection.summary;
            println!(
                "✅ Plan {} saved: ending MRR {:.0}, total revenue {:.0}, min runway {}",
                plan_id,
                s.ending_mrr,
                s.total_revenue,
                runway_display(s.min_runway)
            );
            println!(
                "Feasibility: {:.0}/100 ({})",
                projection.feasibility.score, projection.feasibility.rating
            );
            for issue in projection
                .feasibility
                .issues
                .iter()
                .chain(&projection.feasibility.warnings)
            {
                println!("⚠️ [{:?}] {}", issue.severity, issue.message);
            }
        }
        PlanCommand::Show { plan_id } => {
            let (plan, months) = app.plan_with_months(plan_id)?;
            println!(
                "{} {} v{} ({}{})",
                plan.plan_name,
                plan.plan_year,
                plan.version,
                plan.status,
                if plan.is_active { ", active" } else { "" }
            );
            print_months(&months);
        }
        PlanCommand::Activate { plan_id } => {
            app.activate_plan(plan_id)?;
            println!("✅ Plan {} is now active", plan_id);
        }
    }
    Ok(())
}

fn print_months(months: &[saas_metrics::domain::model::MonthlyPlan]) {
    let mut t = table(&["Month", "MRR", "Customers", "Costs", "Burn", "Cash", "Runway"]);
    for m in months {
        let f = &m.figures;
        t.add_row(vec![
            format!("{} {}", m.month_name, m.year),
            format!("{:.0}", f.mrr),
            f.total_customers.to_string(),
            format!("{:.0}", f.total_costs),
            format!("{:.0}", f.burn_rate),
            format!("{:.0}", f.cash_balance),
            runway_display(f.runway_months),
        ]);
    }
    println!("{t}");
}

fn actual_command(app: &App, cmd: ActualCommand) -> Result<()> {
    match cmd {
        ActualCommand::Record(args) => {
            let mut figures = MonthlyFigures {
                mrr: args.mrr,
                new_customers: args.new_customers,
                total_customers: args.total_customers,
                churned_customers: args.churned_customers,
                marketing_spend: args.marketing,
                sales_spend: args.sales,
                cash_balance: args.cash,
                ..Default::default()
            };
            figures.opex.salaries = args.salaries;
            figures.opex.other = args.other_costs;

            let mut actual = ActualData::new(args.company_id, args.year, args.month, figures);
            actual.notes = args.notes;

            let (id, validation) = app.record_actual(actual)?;
            if args.finalize {
                app.finalize_actual(id)?;
            }
            for warning in &validation.warnings {
                println!("⚠️ {}", warning);
            }
            println!("✅ Actuals for {}-{:02} saved (id {})", args.year, args.month, id);
        }
        ActualCommand::Import { company_id, csv } => {
            let count = app.import_actuals(company_id, &csv)?;
            println!("✅ Imported {} months", count);
        }
    }
    Ok(())
}

fn print_snapshot(s: &MetricsSnapshot) {
    let mut t = table(&["Metric", "Value"]);
    let runway = s
        .runway_months
        .map(|m| format!("{:.1} months", m))
        .unwrap_or_else(|| "Unlimited".to_string());
    let rows = vec![
        ("MRR", format!("{:.0}", s.mrr)),
        ("ARR", format!("{:.0}", s.arr)),
        ("Customers", s.customers.to_string()),
        ("ARPU", format!("{:.2}", s.arpu)),
        ("Monthly growth", pct(s.monthly_growth_rate)),
        ("Monthly churn", pct(s.monthly_churn_rate)),
        ("CAC", format!("{:.0}", s.cac)),
        ("LTV", format!("{:.0}", s.ltv)),
        ("LTV/CAC", format!("{:.2}", s.ltv_cac_ratio)),
        ("CAC payback", format!("{:.1} months", s.cac_payback_months)),
        ("Gross margin", pct(s.gross_margin)),
        ("NRR", pct(s.net_revenue_retention)),
        ("Burn rate", format!("{:.0}", s.burn_rate)),
        ("Runway", runway),
    ];
    for (name, value) in rows {
        t.add_row(vec![name.to_string(), value]);
    }
    println!("{t}");
}

fn metrics(app: &App, company_id: i64) -> Result<()> {
    let (company, snapshot) = app.snapshot(company_id)?;
    println!("{} ({})", company.name, company.stage.display_name());
    print_snapshot(&snapshot);

    let quality = app.data_quality(company_id)?;
    println!("Data quality: {:.0}/100", quality.quality_score);
    for issue in &quality.issues {
        println!("⚠️ [{:?}] {}: {}", issue.level, issue.field, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("   💡 {}", suggestion);
        }
    }
    Ok(())
}

fn variance(app: &App, company_id: i64) -> Result<()> {
    let report = app.variance_report(company_id)?;
    let mut t = table(&["Month", "Metric", "Plan", "Actual", "Variance", "Direction", "Significance"]);
    for month in &report.months {
        for v in &month.variances {
            t.add_row(vec![
                format!("{} {}", month.month_name, month.year),
                v.metric.clone(),
                format!("{:.1}", v.plan),
                format!("{:.1}", v.actual),
                format!("{:+.1}%", v.pct_variance),
                format!("{:?}", v.direction),
                v.significance.as_str().to_string(),
            ]);
        }
    }
    println!("{t}");
    println!(
        "Favorable: {}  Unfavorable: {}",
        report.summary.favorable, report.summary.unfavorable
    );
    if let Some(trend) = &report.trend {
        println!("Trend: {}", trend.trend);
    }
    for alert in &report.alerts {
        println!("⚠️ [{}] {}", alert.severity.as_str(), alert.message);
    }
    Ok(())
}

fn benchmark(app: &App, company_id: i64) -> Result<()> {
    let company = app.company(company_id)?;
    let (assessment, comparison) = app.benchmark(company_id)?;

    let mut t = table(&["Metric", "Value", "Target", "Level", "Gap"]);
    for a in &assessment.assessments {
        t.add_row(vec![
            a.metric_name.clone(),
            format!("{:.2}", a.value),
            format!("{:.2}", a.target),
            format!("{:?}", a.level),
            format!("{:+.2}", a.gap_to_target),
        ]);
    }
    println!("{t}");
    println!(
        "Overall: {:.0}/100 (benchmark score {:.0}, {})",
        assessment.overall_score, comparison.overall_score, comparison.performance
    );
    for rec in &assessment.recommendations {
        println!("💡 {}", rec);
    }

    if let Some(f) = fundraising_benchmark(company.stage) {
        println!(
            "Typical {} round: {:.0} at {} valuation",
            company.stage.display_name(),
            f.typical_round_size,
            f.valuation_range
        );
    }
    Ok(())
}

fn runway(app: &App, company_id: i64) -> Result<()> {
    let inputs = app.runway_inputs(company_id)?;
    let today = Utc::now().date_naive();

    let basic = basic_runway(&inputs, today);
    println!(
        "Runway: {} ({}), net burn {:.0}",
        basic.runway.display(),
        basic.category.as_str(),
        basic.net_burn
    );
    if let Some(date) = basic.cash_out_date {
        println!("Cash runs out around {}", date);
    }
    let adjusted = growth_adjusted_runway(&inputs);
    println!("Growth adjusted: {}", adjusted.runway.display());

    let mut t = table(&["Scenario", "Description", "Runway", "Category"]);
    for s in runway_scenarios(&inputs) {
        t.add_row(vec![
            s.name,
            s.description,
            s.runway.display(),
            s.category.as_str().to_string(),
        ]);
    }
    println!("{t}");

    let timing = fundraising_timing(basic.runway, FUNDRAISING_PROCESS_MONTHS, FUNDRAISING_BUFFER_MONTHS);
    println!("Fundraising ({}): {}", timing.urgency, timing.recommendation);
    Ok(())
}

fn scenarios(app: &App, company_id: i64, months: u32, save: bool) -> Result<()> {
    let comparison = app.scenarios(company_id, months, save)?;
    let mut t = table(&["Scenario", "Final MRR", "Customers", "Final cash", "Breakeven", "Probability"]);
    for r in std::iter::once(&comparison.base).chain(&comparison.ranked) {
        t.add_row(vec![
            r.name.clone(),
            format!("{:.0}", r.final_mrr),
            r.final_customers.to_string(),
            format!("{:.0}", r.final_cash),
            r.breakeven_month
                .map(|m| format!("month {}", m))
                .unwrap_or_else(|| "-".to_string()),
            r.probability.map(pct).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{t}");

    if let (Some(best), Some(worst)) = (comparison.best(), comparison.worst()) {
        println!("Best case: {} (cash {:.0})", best.name, best.final_cash);
        println!("Worst case: {} (cash {:.0})", worst.name, worst.final_cash);
    }
    Ok(())
}

fn cohort_report(csv: &Path, forecast_months: usize, seasonality: bool) -> Result<()> {
    let transactions = cohort::load_transactions(csv)?;
    let cohorts = cohort::build_cohorts(&transactions);

    let mut t = table(&["Cohort", "Size", "M1", "M3", "M6", "M12"]);
    for row in cohort::retention_matrix(&cohorts) {
        let at = |i: usize| row.retention.get(i).map(|r| pct(*r)).unwrap_or_else(|| "-".to_string());
        t.add_row(vec![
            row.cohort.clone(),
            row.size.to_string(),
            at(1),
            at(3),
            at(6),
            at(12),
        ]);
    }
    println!("{t}");

    let summary = cohort::summarize(&cohorts);
    println!(
        "{} cohorts, {} customers, average LTV {:.0}",
        summary.cohort_count, summary.total_customers, summary.average_ltv
    );
    if let Some(churn) = summary.implied_monthly_churn {
        println!("Implied monthly churn: {}", pct(churn));
    }

    let forecast = cohort::forecast_retention(&cohort::average_retention_curve(&cohorts), forecast_months);
    if let Some(last) = forecast.forecast.last() {
        println!("Forecast retention after {} months: {}", forecast_months, pct(*last));
    }

    if seasonality {
        let report = cohort::analyze_seasonality(&transactions);
        let mut t = table(&["Month", "New customers", "New MRR", "Avg retention"]);
        for (a, r) in report.acquisition.iter().zip(&report.retention) {
            t.add_row(vec![
                a.month_name.clone(),
                a.new_customers.to_string(),
                format!("{:.0}", a.new_mrr),
                r.average_retention.map(pct).unwrap_or_else(|| "-".to_string()),
            ]);
        }
        println!("{t}");
        for insight in &report.insights {
            println!("💡 {}", insight);
        }
    }
    Ok(())
}

fn advise(app: &App, company_id: i64) -> Result<()> {
    let today = Utc::now().date_naive();
    let report = app.advisor(company_id)?;

    let mut t = table(&["Challenge", "Category", "Severity", "First step"]);
    for c in &report.challenges {
        t.add_row(vec![
            c.name.clone(),
            c.category.clone(),
            c.severity.as_str().to_string(),
            c.solutions.first().cloned().unwrap_or_default(),
        ]);
    }
    println!("{t}");
    for m in &report.mistakes {
        println!("⚠️ {}: {}", m.mistake, m.solution);
    }
    println!(
        "Risk: survival {}, growth {}, overall {}",
        report.risk.survival_risk, report.risk.growth_risk, report.risk.overall_risk
    );
    for item in &report.action_plan {
        println!("🔧 [{}] {}", item.priority.as_str(), item.action);
    }

    let readiness = app.funding_readiness(company_id, today)?;
    println!(
        "Funding readiness: {:.1}/100 ({}), {}",
        readiness.score,
        readiness.status.as_str(),
        readiness.recommendation
    );
    for gap in &readiness.gaps {
        println!("  - {}", gap);
    }
    println!(
        "Suggested window: {} to {}",
        readiness.timing.suggested_start, readiness.timing.suggested_close
    );

    let okrs = app.quarterly_okrs(company_id, today)?;
    println!("OKRs for {} ({} to {}):", okrs.quarter, okrs.start, okrs.end);
    for kr in &okrs.key_results {
        println!("  {}: {:.0} → {:.0} {}", kr.metric, kr.current, kr.target, kr.unit);
    }
    Ok(())
}

fn roadmap(app: &App, company_id: i64, start: chrono::NaiveDate) -> Result<()> {
    let roadmap = app.roadmap(company_id, start)?;

    let mut t = table(&["Id", "Milestone", "Category", "Priority", "Target date", "Status"]);
    for m in &roadmap.milestones {
        t.add_row(vec![
            m.id.clone(),
            m.name.clone(),
            m.category.clone(),
            m.priority.as_str().to_string(),
            m.target_date.to_string(),
            format!("{:?}", m.status),
        ]);
    }
    println!("{t}");

    for q in &roadmap.quarters {
        println!(
            "Q{} {}: budget {:.0}, team {}, milestones {}",
            q.quarter,
            q.theme,
            q.budget,
            q.team_size,
            q.milestones.join(", ")
        );
    }
    let r = &roadmap.resources;
    println!(
        "Total budget {:.0}, funding needed {:.0}, runway {:.1} months",
        r.total_budget, r.funding_needed, r.runway_months
    );
    for risk in &roadmap.risks {
        println!("⚠️ {} ({})", risk.risk, risk.mitigation);
    }
    Ok(())
}

fn health(app: &App, company_id: i64) -> Result<()> {
    let score = app.health(company_id)?;
    println!("Health: {:.0}/100 ({})", score.score, score.level);
    for strength in &score.strengths {
        println!("✅ {}", strength);
    }
    for issue in &score.issues {
        println!("⚠️ {}", issue);
    }
    Ok(())
}
