use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::PayrollError;
use crate::model::employee::Province;
use crate::model::money::Money;
use crate::model::pay_group::PayFrequency;

/// Per-employee request line for the batch calculation endpoint. All
/// monetary fields travel as decimal strings.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeCalcRequest {
    pub employee_id: i64,
    pub province: Province,
    pub pay_frequency: PayFrequency,
    pub gross_regular: Money,
    pub gross_overtime: Money,
    pub gross_holiday: Money,
    pub federal_claim_amount: Money,
    pub provincial_claim_amount: Money,
    pub ytd_gross: Money,
    pub ytd_cpp_base: Money,
    pub ytd_cpp_additional: Money,
    pub ytd_ei: Money,
    pub is_cpp_exempt: bool,
    pub is_ei_exempt: bool,
    pub cpp2_exempt: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchCalcRequest {
    pub employees: Vec<EmployeeCalcRequest>,
    pub include_details: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeCalcResult {
    pub employee_id: i64,
    pub gross_regular: Money,
    pub gross_overtime: Money,
    pub cpp_base: Money,
    pub cpp_additional: Money,
    pub ei_employee: Money,
    pub federal_tax: Money,
    pub provincial_tax: Money,
    pub cpp_employer: Money,
    pub ei_employer: Money,
    pub net_pay: Money,
    pub new_ytd_gross: Money,
    pub new_ytd_cpp_base: Money,
    pub new_ytd_cpp_additional: Money,
    pub new_ytd_ei: Money,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    pub total_gross: Money,
    pub total_cpp_employee: Money,
    pub total_cpp_employer: Money,
    pub total_ei_employee: Money,
    pub total_ei_employer: Money,
    pub total_federal_tax: Money,
    pub total_provincial_tax: Money,
    pub total_net_pay: Money,
    pub total_employer_costs: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchCalcResponse {
    pub results: Vec<EmployeeCalcResult>,
    pub summary: BatchSummary,
}

/// External tax-calculation collaborator. One batch call is an atomic
/// unit: any failure means nothing from the batch is usable.
#[async_trait]
pub trait TaxEngine: Send + Sync {
    async fn calculate_batch(
        &self,
        request: &BatchCalcRequest,
    ) -> Result<BatchCalcResponse, PayrollError>;
}

const BATCH_PATH: &str = "/payroll/calculate/batch";

/// HTTP client for the CRA tax-calculation service.
pub struct HttpTaxEngineClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTaxEngineClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, PayrollError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                PayrollError::CalculationFailed(format!("failed to build HTTP client: {e}"))
            })?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl TaxEngine for HttpTaxEngineClient {
    async fn calculate_batch(
        &self,
        request: &BatchCalcRequest,
    ) -> Result<BatchCalcResponse, PayrollError> {
        let url = format!("{}{}", self.base_url, BATCH_PATH);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PayrollError::CalculationFailed("tax engine timed out".to_string())
                } else {
                    PayrollError::CalculationFailed(format!("tax engine unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PayrollError::CalculationFailed(format!(
                "tax engine returned {status}: {body}"
            )));
        }

        response.json::<BatchCalcResponse>().await.map_err(|e| {
            PayrollError::CalculationFailed(format!("malformed tax engine response: {e}"))
        })
    }
}
