use chrono::{NaiveDate, Utc};
use reqwest::Client;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;

use crate::models::{
    EligibilityRequest, EligibilityResponse, EligibilitySummary, InsuranceError, PverifyToken,
    RequestingProvider, Subscriber,
};

const PAYER_CODE: &str = "00001";
const PRACTICE_TYPE_CODE: &str = "23";
const LOCATION: &str = "Georgia";
const REQUESTING_PROVIDER_LAST_NAME: &str = "RAPPE";
const REQUESTING_PROVIDER_NPI: &str = "1922249267";

fn us_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Who is asking, and about which member.
pub struct EligibilityQuery<'a> {
    pub payer_name: &'a str,
    pub member_id: &'a str,
    pub date_of_birth: NaiveDate,
    pub subscriber_is_patient: bool,
}

impl EligibilityQuery<'_> {
    pub fn to_request(&self, date_of_service: NaiveDate) -> EligibilityRequest {
        let dos = us_date(date_of_service);
        EligibilityRequest {
            payer_code: PAYER_CODE.to_string(),
            payer_name: self.payer_name.to_string(),
            provider: RequestingProvider {
                first_name: String::new(),
                middle_name: String::new(),
                last_name: REQUESTING_PROVIDER_LAST_NAME.to_string(),
                npi: REQUESTING_PROVIDER_NPI.to_string(),
                pin: String::new(),
            },
            subscriber: Subscriber {
                first_name: String::new(),
                dob: us_date(self.date_of_birth),
                last_name: String::new(),
                member_id: self.member_id.to_string(),
            },
            dependent: None,
            is_subscriber_patient: if self.subscriber_is_patient { "True" } else { "False" }.to_string(),
            dos_start_date: dos.clone(),
            dos_end_date: dos,
            practice_type_code: PRACTICE_TYPE_CODE.to_string(),
            reference_id: String::new(),
            location: LOCATION.to_string(),
            include_text_response: "false".to_string(),
            internal_id: String::new(),
            customer_id: String::new(),
        }
    }
}

/// pVerify eligibility API.
pub struct PverifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    base_url: String,
}

impl PverifyClient {
    pub fn new(config: &AppConfig) -> Result<Self, InsuranceError> {
        if !config.is_insurance_configured() {
            return Err(InsuranceError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            client_id: config.pverify_client_id.clone(),
            client_secret: config.pverify_client_secret.clone(),
            base_url: config.pverify_base_url.clone(),
        })
    }

    /// POST {base}Token
    pub async fn generate_token(&self) -> Result<String, InsuranceError> {
        let url = format!("{}Token", self.base_url);

        let response = self
            .client
            .post(&url)
            .form(&[
                ("Client_Id", self.client_id.as_str()),
                ("Client_Secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("pVerify token request failed: {} - {}", status, response_text);
            return Err(InsuranceError::Provider(format!("HTTP {}: {}", status, response_text)));
        }

        let token: PverifyToken = serde_json::from_str(&response_text)
            .map_err(|e| InsuranceError::Provider(format!("Failed to parse token response: {}", e)))?;
        debug!("Obtained pVerify access token");
        Ok(token.access_token)
    }

    /// POST {base}api/EligibilitySummary
    pub async fn eligibility_summary(&self, query: &EligibilityQuery<'_>) -> Result<EligibilitySummary, InsuranceError> {
        let token = self.generate_token().await?;
        let url = format!("{}api/EligibilitySummary", self.base_url);
        let body = query.to_request(Utc::now().date_naive());

        info!("Verifying eligibility with {}", query.payer_name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("Client-API-Id", &self.client_id)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("pVerify eligibility failed: {} - {}", status, response_text);
            return Err(InsuranceError::Provider(format!("HTTP {}: {}", status, response_text)));
        }

        let eligibility: EligibilityResponse = serde_json::from_str(&response_text)
            .map_err(|e| InsuranceError::Provider(format!("Failed to parse eligibility response: {}", e)))?;

        if eligibility.api_response_code.as_deref() != Some("0") {
            let reason = eligibility
                .error_description
                .unwrap_or_else(|| "Eligibility could not be confirmed".to_string());
            warn!("Eligibility rejected by payer: {}", reason);
            return Err(InsuranceError::Ineligible(reason));
        }

        Ok(eligibility
            .deductible_oop_summary
            .as_ref()
            .map(EligibilitySummary::from)
            .unwrap_or_default())
    }
}
