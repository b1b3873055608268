use crate::core::benchmarks::stage_benchmarks;
use crate::domain::model::{
    ActualData, Benchmark, Capex, Company, FinancialPlan, MonthlyFigures, MonthlyPlan, Opex, PlanStatus, Scenario,
    Stage,
};
use crate::utils::error::{MetricsError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FIGURE_COLUMNS: [&str; 31] = [
    "mrr",
    "new_customers",
    "total_customers",
    "churned_customers",
    "expansion_mrr",
    "churn_rate",
    "churned_mrr",
    "reactivated_mrr",
    "marketing_spend",
    "sales_spend",
    "cac",
    "salaries",
    "office_rent",
    "cloud_services",
    "software_subscriptions",
    "legal_accounting",
    "marketing_ops",
    "other_opex",
    "capex_equipment",
    "capex_software",
    "capex_furniture",
    "capex_other",
    "total_revenue",
    "total_costs",
    "burn_rate",
    "gross_margin",
    "runway_months",
    "ltv",
    "ltv_cac_ratio",
    "cac_payback_months",
    "cash_balance",
];

const COMPANY_COLUMNS: &str = "id, name, description, stage, industry, country, currency, current_mrr, \
     current_customers, monthly_price, team_size, cash_balance, fiscal_year_start, is_active, created_at, updated_at";

const PLAN_COLUMNS: &str =
    "id, company_id, plan_name, plan_year, version, description, status, is_active, assumptions, created_at";

const SCENARIO_COLUMNS: &str =
    "id, company_id, plan_id, name, description, scenario_type, changes, results, created_at";

const MONTHLY_PLAN_KEYS: [&str; 8] = [
    "plan_id",
    "year",
    "month_number",
    "month_name",
    "quarter",
    "team_size",
    "seasonality_factor",
    "is_locked",
];

const ACTUAL_KEYS: [&str; 10] = [
    "company_id",
    "monthly_plan_id",
    "year",
    "month_number",
    "variance",
    "data_source",
    "notes",
    "is_finalized",
    "is_verified",
    "recorded_at",
];

const DEFAULT_SETTINGS: [(&str, &str); 4] = [
    ("default_currency", "RUB"),
    ("default_growth_rate", "0.2"),
    ("default_cac_target", "15000"),
    ("default_runway_target", "18"),
];

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn conversion_error(row: &Row, column: &str, err: MetricsError) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or_default();
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_text<T: FromStr<Err = MetricsError>>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e| conversion_error(row, column, e))
}

fn parse_json<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(row, column, e.into()))
}

fn parse_optional_json<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| conversion_error(row, column, e.into())))
        .transpose()
}

fn figure_values(f: &MonthlyFigures) -> Vec<Value> {
    vec![
        f.mrr.into(),
        f.new_customers.into(),
        f.total_customers.into(),
        f.churned_customers.into(),
        f.expansion_mrr.into(),
        f.churn_rate.into(),
        f.churned_mrr.into(),
        f.reactivated_mrr.into(),
        f.marketing_spend.into(),
        f.sales_spend.into(),
        f.cac.into(),
        f.opex.salaries.into(),
        f.opex.office_rent.into(),
        f.opex.cloud_services.into(),
        f.opex.software_subscriptions.into(),
        f.opex.legal_accounting.into(),
        f.opex.marketing_ops.into(),
        f.opex.other.into(),
        f.capex.equipment.into(),
        f.capex.software.into(),
        f.capex.furniture.into(),
        f.capex.other.into(),
        f.total_revenue.into(),
        f.total_costs.into(),
        f.burn_rate.into(),
        f.gross_margin.into(),
        f.runway_months.into(),
        f.ltv.into(),
        f.ltv_cac_ratio.into(),
        f.cac_payback_months.into(),
        f.cash_balance.into(),
    ]
}

fn read_figures(row: &Row) -> rusqlite::Result<MonthlyFigures> {
    Ok(MonthlyFigures {
        mrr: row.get("mrr")?,
        new_customers: row.get("new_customers")?,
        total_customers: row.get("total_customers")?,
        churned_customers: row.get("churned_customers")?,
        expansion_mrr: row.get("expansion_mrr")?,
        churn_rate: row.get("churn_rate")?,
        churned_mrr: row.get("churned_mrr")?,
        reactivated_mrr: row.get("reactivated_mrr")?,
        marketing_spend: row.get("marketing_spend")?,
        sales_spend: row.get("sales_spend")?,
        cac: row.get("cac")?,
        opex: Opex {
            salaries: row.get("salaries")?,
            office_rent: row.get("office_rent")?,
            cloud_services: row.get("cloud_services")?,
            software_subscriptions: row.get("software_subscriptions")?,
            legal_accounting: row.get("legal_accounting")?,
            marketing_ops: row.get("marketing_ops")?,
            other: row.get("other_opex")?,
        },
        capex: Capex {
            equipment: row.get("capex_equipment")?,
            software: row.get("capex_software")?,
            furniture: row.get("capex_furniture")?,
            other: row.get("capex_other")?,
        },
        total_revenue: row.get("total_revenue")?,
        total_costs: row.get("total_costs")?,
        burn_rate: row.get("burn_rate")?,
        gross_margin: row.get("gross_margin")?,
        runway_months: row.get("runway_months")?,
        ltv: row.get("ltv")?,
        ltv_cac_ratio: row.get("ltv_cac_ratio")?,
        cac_payback_months: row.get("cac_payback_months")?,
        cash_balance: row.get("cash_balance")?,
    })
}

fn insert_sql(table: &str, keys: &[&str]) -> String {
    let columns: Vec<&str> = keys.iter().copied().chain(FIGURE_COLUMNS).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn company_from_row(row: &Row) -> rusqlite::Result<Company> {
    Ok(Company {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        stage: parse_text(row, "stage")?,
        industry: row.get("industry")?,
        country: row.get("country")?,
        currency: row.get("currency")?,
        current_mrr: row.get("current_mrr")?,
        current_customers: row.get("current_customers")?,
        monthly_price: row.get("monthly_price")?,
        team_size: row.get("team_size")?,
        cash_balance: row.get("cash_balance")?,
        fiscal_year_start: row.get("fiscal_year_start")?,
        is_active: row.get("is_active")?,
        created_at: parse_timestamp(row.get("created_at")?),
        updated_at: parse_timestamp(row.get("updated_at")?),
    })
}

fn plan_from_row(row: &Row) -> rusqlite::Result<FinancialPlan> {
    Ok(FinancialPlan {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        plan_name: row.get("plan_name")?,
        plan_year: row.get("plan_year")?,
        version: row.get("version")?,
        description: row.get("description")?,
        status: parse_text(row, "status")?,
        is_active: row.get("is_active")?,
        assumptions: parse_json(row, "assumptions")?,
        created_at: parse_timestamp(row.get("created_at")?),
    })
}

fn monthly_plan_from_row(row: &Row) -> rusqlite::Result<MonthlyPlan> {
    Ok(MonthlyPlan {
        id: row.get("id")?,
        plan_id: row.get("plan_id")?,
        year: row.get("year")?,
        month_number: row.get("month_number")?,
        month_name: row.get("month_name")?,
        quarter: row.get("quarter")?,
        team_size: row.get("team_size")?,
        seasonality_factor: row.get("seasonality_factor")?,
        is_locked: row.get("is_locked")?,
        figures: read_figures(row)?,
    })
}

fn actual_from_row(row: &Row) -> rusqlite::Result<ActualData> {
    Ok(ActualData {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        monthly_plan_id: row.get("monthly_plan_id")?,
        year: row.get("year")?,
        month_number: row.get("month_number")?,
        figures: read_figures(row)?,
        variance: parse_optional_json(row, "variance")?,
        data_source: parse_text(row, "data_source")?,
        notes: row.get("notes")?,
        is_finalized: row.get("is_finalized")?,
        is_verified: row.get("is_verified")?,
        recorded_at: parse_timestamp(row.get("recorded_at")?),
    })
}

fn scenario_from_row(row: &Row) -> rusqlite::Result<Scenario> {
    Ok(Scenario {
        id: row.get("id")?,
        company_id: row.get("company_id")?,
        plan_id: row.get("plan_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        scenario_type: parse_text(row, "scenario_type")?,
        changes: parse_json(row, "changes")?,
        results: parse_optional_json(row, "results")?,
        created_at: parse_timestamp(row.get("created_at")?),
    })
}

fn benchmark_from_row(row: &Row) -> rusqlite::Result<Benchmark> {
    Ok(Benchmark {
        metric_name: row.get("metric_name")?,
        category: parse_text(row, "category")?,
        stage: parse_text(row, "stage")?,
        poor: row.get("poor")?,
        average: row.get("average")?,
        good: row.get("good")?,
        excellent: row.get("excellent")?,
        target: row.get("target")?,
        unit: row.get("unit")?,
        direction: parse_text(row, "direction")?,
        description: row.get("description")?,
    })
}

/// 單一 SQLite 連線的儲存層，所有 SQL 都集中在這裡
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// 開啟 (或建立) 資料庫檔案並套用 schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.migrate()?;
        tracing::debug!("📁 Opened database at {}", path.display());
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let store = Self { conn, path: None };
        store.migrate()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let stamp = now();
        for (key, value) in DEFAULT_SETTINGS {
            tx.execute(
                "INSERT OR IGNORE INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, stamp],
            )?;
        }

        let mut inserted = 0;
        for stage in Stage::ALL {
            for b in stage_benchmarks(stage) {
                inserted += tx.execute(
                    "INSERT OR IGNORE INTO benchmark_metrics
                     (metric_name, category, stage, poor, average, good, excellent, target, unit, direction, description)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        b.metric_name,
                        b.category.as_str(),
                        b.stage.as_str(),
                        b.poor,
                        b.average,
                        b.good,
                        b.excellent,
                        b.target,
                        b.unit,
                        b.direction.as_str(),
                        b.description,
                    ],
                )?;
            }
        }
        tx.commit()?;

        tracing::debug!("🔧 Seeded defaults ({} new benchmark rows)", inserted);
        Ok(())
    }

    /// 資料庫沒有任何公司時建立示範公司
    pub fn seed_demo_company(&self) -> Result<Option<i64>> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM companies", [], |r| r.get(0))?;
        if count > 0 {
            return Ok(None);
        }

        let mut demo = Company::new("Demo SaaS Startup", Stage::PreSeed);
        demo.description = Some("Demo company for exploring the dashboard".to_string());
        demo.industry = Some("B2B SaaS".to_string());
        demo.country = Some("Russia".to_string());
        demo.current_mrr = 25_000.0;
        demo.current_customers = 5;
        demo.monthly_price = 5_000.0;
        demo.team_size = 3;
        demo.cash_balance = 2_000_000.0;

        self.create_company(&demo).map(Some)
    }

    // ── Companies ──────────────────────────────────────────────

    pub fn create_company(&self, company: &Company) -> Result<i64> {
        let stamp = now();
        self.conn.execute(
            "INSERT INTO companies (name, description, stage, industry, country, currency, current_mrr,
             current_customers, monthly_price, team_size, cash_balance, fiscal_year_start, is_active,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            params![
                company.name,
                company.description,
                company.stage.as_str(),
                company.industry,
                company.country,
                company.currency,
                company.current_mrr,
                company.current_customers,
                company.monthly_price,
                company.team_size,
                company.cash_balance,
                company.fiscal_year_start,
                company.is_active,
                stamp,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_company(&self, id: i64) -> Result<Option<Company>> {
        let sql = format!("SELECT {} FROM companies WHERE id = ?1", COMPANY_COLUMNS);
        Ok(self.conn.query_row(&sql, params![id], company_from_row).optional()?)
    }

    pub fn get_company(&self, id: i64) -> Result<Company> {
        self.find_company(id)?
            .ok_or_else(|| MetricsError::not_found("Company", id))
    }

    pub fn list_companies(&self) -> Result<Vec<Company>> {
        let sql = format!("SELECT {} FROM companies ORDER BY id", COMPANY_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], company_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn update_company(&self, company: &Company) -> Result<()> {
        let id = company
            .id
            .ok_or_else(|| MetricsError::invalid_input("company.id", "none", "Company has not been saved yet"))?;
        let changed = self.conn.execute(
            "UPDATE companies SET name = ?2, description = ?3, stage = ?4, industry = ?5, country = ?6,
             currency = ?7, current_mrr = ?8, current_customers = ?9, monthly_price = ?10, team_size = ?11,
             cash_balance = ?12, fiscal_year_start = ?13, is_active = ?14, updated_at = ?15
             WHERE id = ?1",
            params![
                id,
                company.name,
                company.description,
                company.stage.as_str(),
                company.industry,
                company.country,
                company.currency,
                company.current_mrr,
                company.current_customers,
                company.monthly_price,
                company.team_size,
                company.cash_balance,
                company.fiscal_year_start,
                company.is_active,
                now(),
            ],
        )?;
        if changed == 0 {
            return Err(MetricsError::not_found("Company", id));
        }
        Ok(())
    }

    pub fn delete_company(&self, id: i64) -> Result<()> {
        let changed = self.conn.execute("DELETE FROM companies WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(MetricsError::not_found("Company", id));
        }
        tracing::info!("🗑️ Deleted company #{} and its plans, actuals and scenarios", id);
        Ok(())
    }

    // ── Plans ──────────────────────────────────────────────────

    /// 在同一個交易內寫入計畫與各月資料，版本號自動遞增
    pub fn create_plan_with_months(&self, plan: &FinancialPlan, months: &[MonthlyPlan]) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let version: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM financial_plans WHERE company_id = ?1 AND plan_year = ?2",
            params![plan.company_id, plan.plan_year],
            |r| r.get(0),
        )?;
        let assumptions = serde_json::to_string(&plan.assumptions)?;

        tx.execute(
            "INSERT INTO financial_plans
             (company_id, plan_name, plan_year, version, description, status, is_active, assumptions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                plan.company_id,
                plan.plan_name,
                plan.plan_year,
                version,
                plan.description,
                plan.status.as_str(),
                plan.is_active,
                assumptions,
                now(),
            ],
        )?;
        let plan_id = tx.last_insert_rowid();

        let sql = insert_sql("monthly_plans", &MONTHLY_PLAN_KEYS);
        for month in months {
            let mut values: Vec<Value> = vec![
                plan_id.into(),
                month.year.into(),
                month.month_number.into(),
                month.month_name.clone().into(),
                month.quarter.into(),
                month.team_size.into(),
                month.seasonality_factor.into(),
                month.is_locked.into(),
            ];
            values.extend(figure_values(&month.figures));
            tx.execute(&sql, params_from_iter(values))?;
        }
        tx.commit()?;

        tracing::info!(
            "✅ Saved plan '{}' v{} with {} months (id {})",
            plan.plan_name,
            version,
            months.len(),
            plan_id
        );
        Ok(plan_id)
    }

    pub fn get_plan(&self, id: i64) -> Result<FinancialPlan> {
        let sql = format!("SELECT {} FROM financial_plans WHERE id = ?1", PLAN_COLUMNS);
        self.conn
            .query_row(&sql, params![id], plan_from_row)
            .optional()?
            .ok_or_else(|| MetricsError::not_found("Plan", id))
    }

    pub fn list_plans(&self, company_id: i64) -> Result<Vec<FinancialPlan>> {
        let sql = format!(
            "SELECT {} FROM financial_plans WHERE company_id = ?1 ORDER BY plan_year DESC, version DESC",
            PLAN_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![company_id], plan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn active_plan(&self, company_id: i64) -> Result<Option<FinancialPlan>> {
        let sql = format!(
            "SELECT {} FROM financial_plans WHERE company_id = ?1 AND is_active = 1 LIMIT 1",
            PLAN_COLUMNS
        );
        Ok(self.conn.query_row(&sql, params![company_id], plan_from_row).optional()?)
    }

    /// 啟用計畫並停用同公司的其他計畫
    pub fn activate_plan(&self, plan_id: i64) -> Result<()> {
        let plan = self.get_plan(plan_id)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE financial_plans SET is_active = 0,
             status = CASE WHEN status = ?2 THEN ?3 ELSE status END
             WHERE company_id = ?1",
            params![plan.company_id, PlanStatus::Active.as_str(), PlanStatus::Archived.as_str()],
        )?;
        tx.execute(
            "UPDATE financial_plans SET is_active = 1, status = ?2 WHERE id = ?1",
            params![plan_id, PlanStatus::Active.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_plan(&self, plan_id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM financial_plans WHERE id = ?1", params![plan_id])?;
        if changed == 0 {
            return Err(MetricsError::not_found("Plan", plan_id));
        }
        Ok(())
    }

    pub fn monthly_plans(&self, plan_id: i64) -> Result<Vec<MonthlyPlan>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM monthly_plans WHERE plan_id = ?1 ORDER BY year, month_number")?;
        let rows = stmt
            .query_map(params![plan_id], monthly_plan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn lock_monthly_plan(&self, monthly_plan_id: i64, locked: bool) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE monthly_plans SET is_locked = ?2 WHERE id = ?1",
            params![monthly_plan_id, locked],
        )?;
        if changed == 0 {
            return Err(MetricsError::not_found("Monthly plan", monthly_plan_id));
        }
        Ok(())
    }

    // ── Actuals ────────────────────────────────────────────────

    /// 依 (公司, 年, 月) upsert，回傳資料列 id
    pub fn save_actual(&self, actual: &ActualData) -> Result<i64> {
        let variance = actual.variance.as_ref().map(serde_json::to_string).transpose()?;
        let recorded_at = actual
            .recorded_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(now);

        let mut values: Vec<Value> = vec![
            actual.company_id.into(),
            actual.monthly_plan_id.into(),
            actual.year.into(),
            actual.month_number.into(),
            variance.into(),
            actual.data_source.as_str().to_string().into(),
            actual.notes.clone().into(),
            actual.is_finalized.into(),
            actual.is_verified.into(),
            recorded_at.into(),
        ];
        values.extend(figure_values(&actual.figures));

        let updates: Vec<String> = ACTUAL_KEYS
            .iter()
            .copied()
            .chain(FIGURE_COLUMNS)
            .filter(|c| !matches!(*c, "company_id" | "year" | "month_number"))
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let sql = format!(
            "{} ON CONFLICT (company_id, year, month_number) DO UPDATE SET {} RETURNING id",
            insert_sql("actual_data", &ACTUAL_KEYS),
            updates.join(", ")
        );

        let id = self
            .conn
            .query_row(&sql, params_from_iter(values), |r| r.get(0))?;
        tracing::debug!(
            "💾 Saved actuals for company #{} {}-{:02}",
            actual.company_id,
            actual.year,
            actual.month_number
        );
        Ok(id)
    }

    pub fn actuals_for_company(&self, company_id: i64) -> Result<Vec<ActualData>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM actual_data WHERE company_id = ?1 ORDER BY year, month_number")?;
        let rows = stmt
            .query_map(params![company_id], actual_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_actual(&self, company_id: i64, year: i32, month_number: u32) -> Result<Option<ActualData>> {
        Ok(self
            .conn
            .query_row(
                "SELECT * FROM actual_data WHERE company_id = ?1 AND year = ?2 AND month_number = ?3",
                params![company_id, year, month_number],
                actual_from_row,
            )
            .optional()?)
    }

    pub fn finalize_actual(&self, actual_id: i64) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE actual_data SET is_finalized = 1 WHERE id = ?1",
            params![actual_id],
        )?;
        if changed == 0 {
            return Err(MetricsError::not_found("Actual data", actual_id));
        }
        Ok(())
    }

    // ── Scenarios ──────────────────────────────────────────────

    pub fn save_scenario(&self, scenario: &Scenario) -> Result<i64> {
        let changes = serde_json::to_string(&scenario.changes)?;
        let results = scenario.results.as_ref().map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT INTO scenarios (company_id, plan_id, name, description, scenario_type, changes, results, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                scenario.company_id,
                scenario.plan_id,
                scenario.name,
                scenario.description,
                scenario.scenario_type.as_str(),
                changes,
                results,
                now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_scenarios(&self, company_id: i64) -> Result<Vec<Scenario>> {
        let sql = format!(
            "SELECT {} FROM scenarios WHERE company_id = ?1 ORDER BY id",
            SCENARIO_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![company_id], scenario_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Benchmarks & settings ──────────────────────────────────

    pub fn benchmarks_for_stage(&self, stage: Stage) -> Result<Vec<Benchmark>> {
        let mut stmt = self.conn.prepare(
            "SELECT metric_name, category, stage, poor, average, good, excellent, target, unit, direction, description
             FROM benchmark_metrics WHERE stage = ?1 ORDER BY category, metric_name",
        )?;
        let rows = stmt
            .query_map(params![stage.as_str()], benchmark_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM app_settings WHERE key = ?1",
                params![key],
                |r| r.get(0),
            )
            .optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO app_settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now()],
        )?;
        Ok(())
    }

    /// 以 VACUUM INTO 複製一份一致的快照
    pub fn backup<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let target = dir.join(format!(
            "saas_metrics_backup_{}.db",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        if target.exists() {
            return Err(MetricsError::ValidationError {
                message: format!("Backup {} already exists", target.display()),
            });
        }

        self.conn
            .execute("VACUUM INTO ?1", params![target.to_string_lossy().to_string()])?;
        tracing::info!("✅ Database backed up to {}", target.display());
        Ok(target)
    }
}
