use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use auth_cell::models::UserType;
use shared_config::AppConfig;

use crate::models::{PracticeCriteria, ProviderError, ProviderSummary};
use crate::services::availability::AvailabilityService;
use crate::services::provider::ProviderService;
use crate::services::proximity::ZipCodeClient;

/// Keeps criteria serving `age` that list at least one of `nearby` zip codes.
pub fn filter_candidates(criteria: Vec<PracticeCriteria>, age: i32, nearby: &[String]) -> Vec<PracticeCriteria> {
    criteria
        .into_iter()
        .filter(|c| c.serves_age(age) && c.serves_any_zip(nearby))
        .collect()
}

pub struct ProviderMatchingService {
    providers: ProviderService,
    availability: AvailabilityService,
    zip_codes: ZipCodeClient,
}

impl ProviderMatchingService {
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            providers: ProviderService::new(config)?,
            availability: AvailabilityService::new(config),
            zip_codes: ZipCodeClient::new(config)?,
        })
    }

    /// Providers that serve the patient's age near `zipcode` and hold at least
    /// one open slot on `date`. No match yields an empty list.
    #[instrument(skip(self))]
    pub async fn recommend_providers(
        &self,
        age: i32,
        zipcode: &str,
        date: NaiveDate,
    ) -> Result<Vec<ProviderSummary>, ProviderError> {
        let (nearby, criteria) = futures::try_join!(
            self.zip_codes.get_close_zip_codes(zipcode),
            self.providers.criteria_serving_age(age)
        )?;

        let candidates = filter_candidates(criteria, age, &nearby);
        debug!("{} providers serve age {} near {}", candidates.len(), age, zipcode);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let candidate_ids: Vec<String> = candidates.iter().map(|c| c.user_id.clone()).collect();
        let open = self.availability.providers_open_on(&candidate_ids, date).await?;
        let open_ids: Vec<String> = candidate_ids.into_iter().filter(|id| open.contains(id)).collect();
        if open_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = self.providers.directory().find_many(&open_ids).await?;
        records.retain(|r| r.user_type == UserType::HealthProvider);
        records.sort_by_key(|r| open_ids.iter().position(|id| *id == r.id));

        let summaries = self.providers.summaries_for(&records).await?;
        info!("Recommended {} providers for {}", summaries.len(), date);
        Ok(summaries)
    }
}
