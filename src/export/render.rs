use crate::core::reports::{BoardReport, InvestorReport};
use crate::export::{metric_status, runway_status, CompanyReport};
use crate::domain::model::{FinancialPlan, MonthlyPlan};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::json;
use std::fmt::Write as _;

/// 報表中的一列關鍵指標：名稱、格式化後的值、狀態
pub(crate) struct MetricLine {
    pub name: &'static str,
    pub value: String,
    pub status: &'static str,
}

fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

fn money(value: f64, currency: &str) -> String {
    format!("{:.0} {}", value, currency)
}

fn runway_text(runway: Option<f64>) -> String {
    match runway {
        Some(months) => format!("{:.1} months", months),
        None => "Unlimited".to_string(),
    }
}

pub(crate) fn company_lines(report: &CompanyReport) -> Vec<(&'static str, String)> {
    let c = &report.company;
    vec![
        ("Company", c.name.clone()),
        ("Stage", c.stage.display_name().to_string()),
        ("Industry", c.industry.clone().unwrap_or_else(|| "-".to_string())),
        ("Currency", c.currency.clone()),
        ("Team size", c.team_size.to_string()),
        ("Customers", c.current_customers.to_string()),
        ("Cash balance", money(c.cash_balance, &c.currency)),
    ]
}

pub(crate) fn metric_lines(report: &CompanyReport) -> Vec<MetricLine> {
    let s = &report.snapshot;
    let stage = report.company.stage;
    let currency = report.company.currency.as_str();

    vec![
        MetricLine {
            name: "MRR",
            value: money(s.mrr, currency),
            status: "-",
        },
        MetricLine {
            name: "ARR",
            value: money(s.arr, currency),
            status: "-",
        },
        MetricLine {
            name: "Monthly growth",
            value: pct(s.monthly_growth_rate),
            status: metric_status(stage, "mrr_growth_monthly", s.monthly_growth_rate),
        },
        MetricLine {
            name: "Monthly churn",
            value: pct(s.monthly_churn_rate),
            status: metric_status(stage, "monthly_churn_rate", s.monthly_churn_rate),
        },
        MetricLine {
            name: "CAC",
            value: money(s.cac, currency),
            status: metric_status(stage, "cac", s.cac),
        },
        MetricLine {
            name: "LTV",
            value: money(s.ltv, currency),
            status: "-",
        },
        MetricLine {
            name: "LTV/CAC",
            value: format!("{:.2}", s.ltv_cac_ratio),
            status: metric_status(stage, "ltv_cac_ratio", s.ltv_cac_ratio),
        },
        MetricLine {
            name: "Gross margin",
            value: pct(s.gross_margin),
            status: metric_status(stage, "gross_margin", s.gross_margin),
        },
        MetricLine {
            name: "Burn rate",
            value: money(s.burn_rate, currency),
            status: "-",
        },
        MetricLine {
            name: "Runway",
            value: runway_text(s.runway_months),
            status: runway_status(s.runway_months),
        },
    ]
}

pub fn to_csv(report: &CompanyReport) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    wtr.write_record(["COMPANY SUMMARY"])?;
    for (label, value) in company_lines(report) {
        wtr.write_record([label, value.as_str()])?;
    }
    wtr.write_record([""])?;

    wtr.write_record(["FINANCIAL METRICS"])?;
    wtr.write_record(["Metric", "Value", "Status"])?;
    for line in metric_lines(report) {
        wtr.write_record([line.name, line.value.as_str(), line.status])?;
    }
    wtr.write_record([""])?;

    wtr.write_record(["MONTHLY DATA"])?;
    wtr.write_record([
        "Period",
        "MRR",
        "New customers",
        "Total customers",
        "Revenue",
        "Costs",
        "Burn rate",
        "Cash balance",
        "Runway months",
    ])?;
    for actual in &report.actuals {
        let f = &actual.figures;
        wtr.write_record([
            format!("{}-{:02}", actual.year, actual.month_number),
            format!("{:.2}", f.mrr),
            f.new_customers.to_string(),
            f.total_customers.to_string(),
            format!("{:.2}", f.total_revenue),
            format!("{:.2}", f.total_costs),
            format!("{:.2}", f.burn_rate),
            format!("{:.2}", f.cash_balance),
            format!("{:.1}", f.runway_months),
        ])?;
    }

    wtr.flush()?;
    wtr.into_inner().map_err(|e| e.into_error().into())
}

pub fn to_json(report: &CompanyReport) -> Result<Vec<u8>> {
    let document = json!({
        "export_date": report.generated_at.to_rfc3339(),
        "company": report.company,
        "report": {
            "metrics": report.snapshot,
            "benchmarks": report.comparison,
            "monthly_data": report.actuals,
        },
        "metadata": {
            "generator": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "months": report.actuals.len(),
            "currency": report.company.currency,
        },
    });
    Ok(serde_json::to_vec_pretty(&document)?)
}

pub fn to_markdown(report: &CompanyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} Financial Report\n", report.company.name);
    let _ = writeln!(out, "Generated: {}\n", report.generated_at.format("%Y-%m-%d %H:%M UTC"));

    out.push_str("## Company\n\n| Field | Value |\n|---|---|\n");
    for (label, value) in company_lines(report) {
        let _ = writeln!(out, "| {} | {} |", label, value);
    }

    out.push_str("\n## Key Metrics\n\n| Metric | Value | Status |\n|---|---|---|\n");
    for line in metric_lines(report) {
        let _ = writeln!(out, "| {} | {} | {} |", line.name, line.value, line.status);
    }

    let _ = writeln!(
        out,
        "\n## Benchmarks\n\nOverall score: {:.0}/100 ({})\n",
        report.comparison.overall_score, report.comparison.performance
    );
    if !report.comparison.rows.is_empty() {
        out.push_str("| Metric | Value | Level |\n|---|---|---|\n");
        for row in &report.comparison.rows {
            let _ = writeln!(out, "| {} | {:.2} | {} |", row.metric_name, row.value, row.level);
        }
    }

    let _ = writeln!(
        out,
        "\n---\n*Generated by {} v{}*",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    out
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_table(out: &mut String, headers: &[&str], rows: Vec<Vec<String>>) {
    out.push_str("<table>\n<tr>");
    for h in headers {
        let _ = write!(out, "<th>{}</th>", escape_html(h));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", escape_html(&cell));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}

pub fn to_html(report: &CompanyReport) -> String {
    let title = format!("{} Financial Report", report.company.name);
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>body{{font-family:sans-serif;margin:2em}}table{{border-collapse:collapse;margin-bottom:1.5em}}\
         td,th{{border:1px solid #ccc;padding:4px 10px;text-align:left}}</style>\n</head>\n<body>\n<h1>{}</h1>\n",
        escape_html(&title),
        escape_html(&title)
    );
    let _ = writeln!(
        out,
        "<p>Generated: {}</p>",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    out.push_str("<h2>Company</h2>\n");
    html_table(
        &mut out,
        &["Field", "Value"],
        company_lines(report)
            .into_iter()
            .map(|(label, value)| vec![label.to_string(), value])
            .collect(),
    );

    out.push_str("<h2>Key Metrics</h2>\n");
    html_table(
        &mut out,
        &["Metric", "Value", "Status"],
        metric_lines(report)
            .into_iter()
            .map(|l| vec![l.name.to_string(), l.value, l.status.to_string()])
            .collect(),
    );

    let _ = writeln!(
        out,
        "<h2>Benchmarks</h2>\n<p>Overall score: {:.0}/100 ({})</p>",
        report.comparison.overall_score,
        escape_html(&report.comparison.performance)
    );
    html_table(
        &mut out,
        &["Metric", "Value", "Level"],
        report
            .comparison
            .rows
            .iter()
            .map(|r| vec![r.metric_name.clone(), format!("{:.2}", r.value), r.level.clone()])
            .collect(),
    );

    let _ = write!(
        out,
        "<footer><em>Generated by {} v{}</em></footer>\n</body>\n</html>\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    out
}

#[derive(Serialize)]
struct PlanCsvRow<'a> {
    plan: &'a str,
    year: i32,
    month: u32,
    month_name: &'a str,
    quarter: u32,
    team_size: u32,
    mrr: f64,
    new_customers: u32,
    total_customers: u32,
    churned_customers: u32,
    marketing_spend: f64,
    sales_spend: f64,
    salaries: f64,
    total_revenue: f64,
    total_costs: f64,
    burn_rate: f64,
    cash_balance: f64,
    runway_months: f64,
    ltv_cac_ratio: f64,
}

/// 計畫每月一列
pub fn plan_to_csv(plan: &FinancialPlan, months: &[MonthlyPlan]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for m in months {
        let f = &m.figures;
        wtr.serialize(PlanCsvRow {
            plan: &plan.plan_name,
            year: m.year,
            month: m.month_number,
            month_name: &m.month_name,
            quarter: m.quarter,
            team_size: m.team_size,
            mrr: f.mrr,
            new_customers: f.new_customers,
            total_customers: f.total_customers,
            churned_customers: f.churned_customers,
            marketing_spend: f.marketing_spend,
            sales_spend: f.sales_spend,
            salaries: f.opex.salaries,
            total_revenue: f.total_revenue,
            total_costs: f.total_costs,
            burn_rate: f.burn_rate,
            cash_balance: f.cash_balance,
            runway_months: f.runway_months,
            ltv_cac_ratio: f.ltv_cac_ratio,
        })?;
    }
    wtr.flush()?;
    wtr.into_inner().map_err(|e| e.into_error().into())
}

pub fn investor_to_markdown(report: &InvestorReport) -> String {
    let cur = &report.currency;
    let s = &report.snapshot;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# {} Investor Report: {} Round\n",
        report.company_name,
        report.round.display_name()
    );
    let _ = writeln!(out, "Generated: {}\n", report.generated_on);

    out.push_str("## Traction\n\n| Metric | Value |\n|---|---|\n");
    for (label, value) in [
        ("MRR", money(s.mrr, cur)),
        ("ARR", money(s.arr, cur)),
        ("Monthly growth", pct(s.monthly_growth_rate)),
        ("Monthly churn", pct(s.monthly_churn_rate)),
        ("LTV/CAC", format!("{:.2}", s.ltv_cac_ratio)),
        ("Gross margin", pct(s.gross_margin)),
        ("Runway", runway_text(s.runway_months)),
    ] {
        let _ = writeln!(out, "| {} | {} |", label, value);
    }

    let v = &report.valuation;
    let _ = writeln!(
        out,
        "\n## Valuation\n\n{} (range {} to {})\n\nMethod: {}",
        money(v.mid, cur),
        money(v.low, cur),
        money(v.high, cur),
        v.method
    );

    let _ = writeln!(out, "\n## Funding Ask\n\n{}\n", money(report.funding_ask.amount, cur));
    out.push_str("| Use of funds | Share | Amount |\n|---|---|---|\n");
    for u in &report.funding_ask.use_of_funds {
        let _ = writeln!(out, "| {} | {} | {} |", u.category, pct(u.share), money(u.amount, cur));
    }

    let r = &report.readiness;
    let _ = writeln!(
        out,
        "\n## Readiness\n\nScore: {:.1}/100 ({})\n\n{}",
        r.score,
        r.status.as_str(),
        r.recommendation
    );
    for gap in &r.gaps {
        let _ = writeln!(out, "- {}", gap);
    }

    if let Some(b) = &report.benchmark {
        let _ = writeln!(
            out,
            "\n## Market Benchmark\n\nTypical round: {}. Valuation range: {}. Investors: {}.",
            money(b.typical_round_size, cur),
            b.valuation_range,
            b.investor_types.join(", ")
        );
    }

    out.push_str("\n## Recommendations\n\n");
    for rec in &report.recommendations {
        let _ = writeln!(out, "- {}", rec);
    }

    let m = &report.memo;
    let _ = writeln!(
        out,
        "\n## Investment Memo\n\n| Item | Value |\n|---|---|\n| Ownership | {} |\n| Exit value | {} |\n| MOIC | {:.2}x |\n| IRR | {} |\n| Recommendation | {} |",
        pct(m.ownership),
        money(m.exit_value, cur),
        m.moic,
        pct(m.irr),
        m.recommendation
    );
    for risk in &m.risks {
        let _ = writeln!(out, "- Risk: {}", risk);
    }
    out
}

pub fn board_to_markdown(report: &BoardReport) -> String {
    let cur = &report.currency;
    let q = &report.actuals;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "# {} Board Report: Q{} {}\n",
        report.company_name, report.quarter, report.year
    );
    let _ = writeln!(
        out,
        "Performance: {} ({}/{})\n",
        report.performance.rating, report.performance.score, report.performance.max_score
    );

    out.push_str("## Quarter Results\n\n| Metric | Value |\n|---|---|\n");
    for (label, value) in [
        ("Starting MRR", money(q.starting_mrr, cur)),
        ("Ending MRR", money(q.ending_mrr, cur)),
        ("Quarterly growth", pct(q.quarterly_growth)),
        ("Total revenue", money(q.total_revenue, cur)),
        ("New customers", q.new_customers.to_string()),
        ("Churned customers", q.churned_customers.to_string()),
        ("Net new customers", q.net_new_customers.to_string()),
        ("Average burn", money(q.average_burn, cur)),
        ("Ending cash", money(q.ending_cash, cur)),
        ("CAC", money(q.cac, cur)),
    ] {
        let _ = writeln!(out, "| {} | {} |", label, value);
    }

    if let Some(plan) = &report.vs_plan {
        let _ = writeln!(
            out,
            "\n## Versus Plan\n\nRevenue {} vs plan {} ({}). Costs {} vs plan {} ({}).",
            money(plan.actual_revenue, cur),
            money(plan.planned_revenue, cur),
            pct(plan.revenue_variance),
            money(plan.actual_costs, cur),
            money(plan.planned_costs, cur),
            pct(plan.cost_variance)
        );
        for a in &plan.achievements {
            let _ = writeln!(out, "- ✅ {}", a);
        }
        for a in &plan.improvement_areas {
            let _ = writeln!(out, "- ⚠️ {}", a);
        }
    }

    if let Some(prev) = &report.vs_previous {
        let _ = writeln!(
            out,
            "\n## Versus Previous Quarter\n\nMRR {}, revenue {}, net customers {:+}, burn {}",
            pct(prev.mrr_change),
            pct(prev.revenue_change),
            prev.net_customers_change,
            pct(prev.burn_change)
        );
    }

    let i = &report.insights;
    let _ = writeln!(
        out,
        "\n## Strategic Insights\n\nTrajectory: {}. Position: {}.",
        i.growth_trajectory, i.market_position
    );
    for (title, items) in [("Advantages", &i.advantages), ("Risks", &i.risks), ("Opportunities", &i.opportunities)] {
        if !items.is_empty() {
            let _ = writeln!(out, "\n**{}**\n", title);
            for item in items {
                let _ = writeln!(out, "- {}", item);
            }
        }
    }

    out.push_str("\n## Action Items\n\n| Action | Owner | Due |\n|---|---|---|\n");
    for a in &report.action_items {
        let _ = writeln!(out, "| {} | {} | {} |", a.title, a.owner, a.due);
    }

    out.push_str("\n## Decisions Required\n\n");
    for d in &report.decisions {
        let _ = writeln!(out, "- {}", d);
    }

    let f = &report.forward_look;
    let _ = writeln!(
        out,
        "\n## Next Quarter\n\n{}: MRR target {}",
        f.next_quarter,
        money(f.revenue_target, cur)
    );
    out
}
