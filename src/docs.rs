use crate::api::records;
use crate::api::runs::{
    CreateRun, CreateRunResponse, RunFilter, RunListResponse, SyncResponse, TransitionResponse,
};
use crate::model::money::Money;
use crate::model::record::{
    Adjustment, HolidayWorkEntry, LeaveEntry, RecordInput, RecordInputPatch,
};
use crate::model::run::{PayrollRun, RunStatus};
use crate::payroll::materializer::EmployeeHoursInput;
use crate::payroll::paystub::PaystubError;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payrun API",
        version = "1.0.0",
        description = r#"
## Payroll Run Lifecycle Engine

This API orchestrates the full lifecycle of small-business payroll runs.

### 🔹 Key Features
- **Run Materialization**
  - Resolve the pay period, snapshot employee data, calculate withholdings through the tax engine, and persist the run atomically
- **Draft Editing**
  - Patch per-employee hours, leave, holiday work and adjustments, with deferred recalculation
- **Lifecycle Management**
  - Submit, approve, cancel and revert runs through a guarded state machine
- **Aggregation**
  - Per-pay-group and run-level totals, remittance and total payroll cost

### 🔐 Tenancy
Every request is scoped to a company via the **X-Company-Id** header.

### 📦 Response Format
- JSON-based RESTful responses
- All monetary amounts are decimal strings, never floats
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::runs::create_run,
        crate::api::runs::list_runs,
        crate::api::runs::get_run,
        crate::api::runs::delete_run,
        crate::api::runs::recalculate_run,
        crate::api::runs::sync_membership,
        crate::api::runs::submit_run,
        crate::api::runs::approve_run,
        crate::api::runs::cancel_run,
        crate::api::runs::revert_run,

        records::patch_record
    ),
    components(
        schemas(
            CreateRun,
            CreateRunResponse,
            RunFilter,
            RunListResponse,
            TransitionResponse,
            SyncResponse,
            EmployeeHoursInput,
            PayrollRun,
            RunStatus,
            RecordInput,
            RecordInputPatch,
            LeaveEntry,
            HolidayWorkEntry,
            Adjustment,
            PaystubError,
            Money
        )
    ),
    tags(
        (name = "Payroll Runs", description = "Run lifecycle and aggregation APIs"),
        (name = "Payroll Records", description = "Per-employee record editing APIs"),
    )
)]
pub struct ApiDoc;
