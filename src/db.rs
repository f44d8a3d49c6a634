use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn init_db(database_url: &str) -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .expect("Failed to connect to database");

    apply_schema(&pool).await.expect("Failed to apply schema");
    pool
}

/// Schema statements, applied one by one at startup. SQLite prepares a
/// single statement per query, so these cannot be one blob.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS companies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        province TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pay_groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        province TEXT NOT NULL,
        pay_frequency TEXT NOT NULL,
        employment_type TEXT NOT NULL DEFAULT 'full_time',
        next_period_end TEXT NOT NULL,
        overtime_multiplier TEXT NOT NULL DEFAULT '1.5',
        cpp_exempt INTEGER NOT NULL DEFAULT 0,
        ei_exempt INTEGER NOT NULL DEFAULT 0,
        cpp2_exempt INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL,
        pay_group_id INTEGER,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        province TEXT NOT NULL,
        annual_salary TEXT,
        hourly_rate TEXT,
        federal_claim_amount TEXT NOT NULL DEFAULT '15705',
        provincial_claim_amount TEXT NOT NULL DEFAULT '18491',
        status TEXT NOT NULL DEFAULT 'active'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS holidays (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        name TEXT NOT NULL,
        province TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payroll_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL,
        period_start TEXT NOT NULL,
        period_end TEXT NOT NULL,
        pay_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft',
        total_gross TEXT NOT NULL DEFAULT '0',
        total_cpp_employee TEXT NOT NULL DEFAULT '0',
        total_cpp_employer TEXT NOT NULL DEFAULT '0',
        total_ei_employee TEXT NOT NULL DEFAULT '0',
        total_ei_employer TEXT NOT NULL DEFAULT '0',
        total_federal_tax TEXT NOT NULL DEFAULT '0',
        total_provincial_tax TEXT NOT NULL DEFAULT '0',
        total_net_pay TEXT NOT NULL DEFAULT '0',
        total_employer_cost TEXT NOT NULL DEFAULT '0',
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // At most one non-cancelled run per (company, period end). Concurrent
    // materializations race on this index; the loser re-fetches.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_payroll_runs_active_period
        ON payroll_runs (company_id, period_end)
        WHERE status != 'cancelled'
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payroll_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        payroll_run_id INTEGER NOT NULL,
        employee_id INTEGER NOT NULL,
        company_id INTEGER NOT NULL,
        employee_name_snapshot TEXT NOT NULL,
        province_snapshot TEXT NOT NULL,
        annual_salary_snapshot TEXT,
        hourly_rate_snapshot TEXT,
        pay_group_id_snapshot INTEGER NOT NULL,
        pay_group_name_snapshot TEXT NOT NULL,
        pay_group_province_snapshot TEXT NOT NULL,
        pay_frequency_snapshot TEXT NOT NULL,
        federal_claim_snapshot TEXT NOT NULL,
        provincial_claim_snapshot TEXT NOT NULL,
        cpp_exempt_snapshot INTEGER NOT NULL DEFAULT 0,
        ei_exempt_snapshot INTEGER NOT NULL DEFAULT 0,
        cpp2_exempt_snapshot INTEGER NOT NULL DEFAULT 0,
        overtime_multiplier_snapshot TEXT NOT NULL DEFAULT '1.5',
        input_data TEXT NOT NULL DEFAULT '{}',
        is_modified INTEGER NOT NULL DEFAULT 0,
        gross_regular TEXT NOT NULL DEFAULT '0',
        gross_overtime TEXT NOT NULL DEFAULT '0',
        gross_holiday TEXT NOT NULL DEFAULT '0',
        cpp_base TEXT NOT NULL DEFAULT '0',
        cpp_additional TEXT NOT NULL DEFAULT '0',
        ei_employee TEXT NOT NULL DEFAULT '0',
        federal_tax TEXT NOT NULL DEFAULT '0',
        provincial_tax TEXT NOT NULL DEFAULT '0',
        cpp_employer TEXT NOT NULL DEFAULT '0',
        ei_employer TEXT NOT NULL DEFAULT '0',
        net_pay TEXT NOT NULL DEFAULT '0',
        employer_cost TEXT NOT NULL DEFAULT '0',
        new_ytd_gross TEXT NOT NULL DEFAULT '0',
        new_ytd_cpp_base TEXT NOT NULL DEFAULT '0',
        new_ytd_cpp_additional TEXT NOT NULL DEFAULT '0',
        new_ytd_ei TEXT NOT NULL DEFAULT '0',
        UNIQUE (payroll_run_id, employee_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS paystub_documents (
        id TEXT PRIMARY KEY,
        payroll_run_id INTEGER NOT NULL,
        payroll_record_id INTEGER NOT NULL,
        employee_name TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// In-memory pool for tests. A single connection, or each checkout would
/// see its own empty database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    apply_schema(&pool).await.expect("schema");
    pool
}
