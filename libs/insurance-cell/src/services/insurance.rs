use chrono::Utc;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use serde_json::json;
use tracing::{info, instrument};

use auth_cell::services::UserDirectory;
use booking_cell::services::PricingService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{InsuranceDetails, InsuranceDetailsRequest, InsuranceError};
use crate::services::coverage::CostSplit;
use crate::services::pverify::{EligibilityQuery, PverifyClient};

const INSURANCE_DETAILS: &str = "/rest/v1/insurance_details";

fn validate(request: &InsuranceDetailsRequest) -> Result<(), InsuranceError> {
    let required = [
        ("insurance_company_name", &request.insurance_company_name),
        ("insurance_phone_number", &request.insurance_phone_number),
        ("insurance_policy_number", &request.insurance_policy_number),
        ("insurance_group_number", &request.insurance_group_number),
        ("patient_relationship", &request.patient_relationship),
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(InsuranceError::Validation(format!("{} required", missing.join(", "))));
    }
    if request.insured_date_of_birth > Utc::now().date_naive() {
        return Err(InsuranceError::Validation(
            "insured_date_of_birth cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

pub struct InsuranceService {
    supabase: SupabaseClient,
    pverify: PverifyClient,
    pricing: PricingService,
    directory: UserDirectory,
}

impl InsuranceService {
    pub fn new(config: &AppConfig) -> Result<Self, InsuranceError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            pverify: PverifyClient::new(config)?,
            pricing: PricingService::new(config),
            directory: UserDirectory::new(config)?,
        })
    }

    /// Verifies the policy, prices the consultation and stores one row per user.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn save_insurance_details(
        &self,
        user: &User,
        request: InsuranceDetailsRequest,
    ) -> Result<InsuranceDetails, InsuranceError> {
        validate(&request)?;

        let query = EligibilityQuery {
            payer_name: request.insurance_company_name.trim(),
            member_id: request.insurance_policy_number.trim(),
            date_of_birth: request.insured_date_of_birth,
            subscriber_is_patient: request.is_subscriber_patient(),
        };
        let summary = self.pverify.eligibility_summary(&query).await?;
        let price = self.pricing.price_per_consultation().await?;
        let split = CostSplit::compute(price, &summary);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let path = format!("{}?on_conflict=user_id", INSURANCE_DETAILS);
        let mut rows: Vec<InsuranceDetails> = self
            .supabase
            .request_with_headers(
                Method::POST,
                &path,
                Some(json!({
                    "user_id": user.id,
                    "insurance_company_name": request.insurance_company_name.trim(),
                    "insurance_phone_number": request.insurance_phone_number.trim(),
                    "insurance_policy_number": request.insurance_policy_number.trim(),
                    "insurance_group_number": request.insurance_group_number.trim(),
                    "insured_date_of_birth": request.insured_date_of_birth,
                    "patient_relationship": request.patient_relationship.trim().to_lowercase(),
                    "self_pay": split.self_pay,
                    "insurance_coverage": split.insurance_coverage,
                    "updated_at": Utc::now(),
                })),
                Some(headers),
            )
            .await?;
        let details = rows
            .pop()
            .ok_or_else(|| InsuranceError::Database("Upsert returned no insurance details".to_string()))?;

        self.directory.mark_qualified(&user.id).await?;

        info!(
            "Saved insurance details: self pay {:.2}, coverage {:.2}",
            split.self_pay, split.insurance_coverage
        );
        Ok(details)
    }

    pub async fn get_insurance_details(&self, user: &User) -> Result<InsuranceDetails, InsuranceError> {
        let path = format!(
            "{}?user_id=eq.{}&limit=1",
            INSURANCE_DETAILS,
            urlencoding::encode(&user.id)
        );
        let mut rows: Vec<InsuranceDetails> = self.supabase.request(Method::GET, &path, None).await?;
        rows.pop().ok_or(InsuranceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request() -> InsuranceDetailsRequest {
        InsuranceDetailsRequest {
            insurance_company_name: "Aetna".to_string(),
            insurance_phone_number: "+18005551234".to_string(),
            insurance_policy_number: "W123456789".to_string(),
            insurance_group_number: "G-100".to_string(),
            insured_date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            patient_relationship: "self".to_string(),
        }
    }

    #[test]
    fn lists_every_missing_field() {
        let mut incomplete = request();
        incomplete.insurance_group_number = " ".to_string();
        incomplete.patient_relationship = String::new();

        let err = validate(&incomplete).unwrap_err();
        assert_eq!(err.to_string(), "insurance_group_number, patient_relationship required");
    }

    #[test]
    fn rejects_future_birth_date() {
        let mut future = request();
        future.insured_date_of_birth = Utc::now().date_naive() + chrono::Duration::days(2);

        assert!(matches!(validate(&future), Err(InsuranceError::Validation(_))));
    }
}
