use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use auth_cell::models::{UserRecord, UserType};
use auth_cell::services::{AccountService, UserDirectory};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::pagination::{paginate, Page, PageQuery};

use crate::models::{
    AccountDetails, AccountDetailsResponse, AgeRange, EditProviderRequest, OnboardProviderRequest,
    PracticeCriteria, ProviderDetails, ProviderError, ProviderQualification, ProviderSummary,
    SaveAccountDetailsRequest,
};
use crate::services::availability::{expand_entries, AvailabilityService};

const QUALIFICATIONS: &str = "/rest/v1/provider_qualifications";
const CRITERIA: &str = "/rest/v1/practice_criteria";
const REFERRALS: &str = "/rest/v1/referrals";
const ACCOUNT_DETAILS: &str = "/rest/v1/account_details";

const PHOTO_BUCKET: &str = "profile-photos";
const REFERRAL_TYPE: &str = "health_provider_onboarding";

/// A decoded `data:<mime>;base64,<payload>` image.
#[derive(Debug, PartialEq)]
pub struct PhotoUpload {
    pub content_type: String,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub fn decode_photo(data_url: &str) -> Result<PhotoUpload, ProviderError> {
    let invalid = |msg: &str| ProviderError::InvalidPhoto(msg.to_string());

    let (header, payload) = data_url
        .trim()
        .split_once(',')
        .ok_or_else(|| invalid("expected a base64 data URL"))?;

    let content_type = header
        .strip_prefix("data:")
        .and_then(|rest| rest.strip_suffix(";base64"))
        .ok_or_else(|| invalid("expected a base64 data URL"))?
        .to_lowercase();

    let extension = match content_type.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => return Err(invalid("unsupported image type")),
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid("payload is not valid base64"))?;
    if bytes.is_empty() {
        return Err(invalid("image is empty"));
    }

    Ok(PhotoUpload {
        content_type,
        extension,
        bytes,
    })
}

fn required(value: &str, field: &str) -> Result<String, ProviderError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ProviderError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn digits_only(value: &str, field: &str) -> Result<String, ProviderError> {
    let value = required(value, field)?;
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProviderError::Validation(format!("{} must contain only digits", field)));
    }
    Ok(value)
}

fn last_four(value: &str) -> String {
    let start = value.len().saturating_sub(4);
    value[start..].to_string()
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn id_list(ids: &[String]) -> String {
    ids.iter().map(|id| encode(id)).collect::<Vec<_>>().join(",")
}

pub struct ProviderService {
    accounts: AccountService,
    supabase: SupabaseClient,
    availability: AvailabilityService,
    slot_minutes: i64,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            accounts: AccountService::new(config)?,
            supabase: SupabaseClient::new(config),
            availability: AvailabilityService::new(config),
            slot_minutes: config.slot_minutes,
        })
    }

    pub fn directory(&self) -> &UserDirectory {
        self.accounts.directory()
    }

    // ==========================================================================
    // CRITERIA AND QUALIFICATION ROWS
    // ==========================================================================

    pub async fn criteria_for(&self, user_id: &str) -> Result<Option<PracticeCriteria>, ProviderError> {
        let path = format!("{}?user_id=eq.{}&limit=1", CRITERIA, encode(user_id));
        let mut rows: Vec<PracticeCriteria> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.pop())
    }

    pub async fn require_criteria(&self, user_id: &str) -> Result<PracticeCriteria, ProviderError> {
        self.criteria_for(user_id)
            .await?
            .ok_or(ProviderError::MissingProfile("Practice criteria"))
    }

    pub async fn qualification_for(&self, user_id: &str) -> Result<Option<ProviderQualification>, ProviderError> {
        let path = format!("{}?user_id=eq.{}&limit=1", QUALIFICATIONS, encode(user_id));
        let mut rows: Vec<ProviderQualification> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.pop())
    }

    /// Criteria whose age bounds include `age`.
    pub async fn criteria_serving_age(&self, age: i32) -> Result<Vec<PracticeCriteria>, ProviderError> {
        let path = format!("{}?minimum_age=lte.{}&maximum_age=gte.{}", CRITERIA, age, age);
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    async fn criteria_by_user(&self, user_ids: &[String]) -> Result<HashMap<String, PracticeCriteria>, ProviderError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let path = format!("{}?user_id=in.({})", CRITERIA, id_list(user_ids));
        let rows: Vec<PracticeCriteria> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|row| (row.user_id.clone(), row)).collect())
    }

    async fn qualifications_by_user(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, ProviderQualification>, ProviderError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let path = format!("{}?user_id=in.({})", QUALIFICATIONS, id_list(user_ids));
        let rows: Vec<ProviderQualification> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|row| (row.user_id.clone(), row)).collect())
    }

    async fn insert_row<T>(&self, table: &str, row: Value) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut rows: Vec<T> = self.supabase.write_returning(Method::POST, table, row).await?;
        rows.pop()
            .ok_or_else(|| ProviderError::Database(format!("Insert into {} returned no row", table)))
    }

    async fn patch_row<T>(&self, table: &str, id: &str, changes: Map<String, Value>) -> Result<T, ProviderError>
    where
        T: serde::de::DeserializeOwned,
    {
        let path = format!("{}?id=eq.{}", table, encode(id));
        let mut rows: Vec<T> = self
            .supabase
            .write_returning(Method::PATCH, &path, Value::Object(changes))
            .await?;
        rows.pop().ok_or(ProviderError::NotFound)
    }

    // ==========================================================================
    // VIEWS
    // ==========================================================================

    pub fn summarize(
        &self,
        record: &UserRecord,
        criteria: Option<&PracticeCriteria>,
        qualification: Option<&ProviderQualification>,
    ) -> Result<ProviderSummary, ProviderError> {
        let cipher = self.directory().cipher();

        Ok(ProviderSummary {
            id: record.id.clone(),
            email: record.email.clone(),
            username: record.username.clone(),
            first_name: cipher.decrypt_opt(record.first_name.as_deref())?,
            last_name: cipher.decrypt_opt(record.last_name.as_deref())?,
            photo_url: record.photo_url.clone(),
            languages_spoken: record.languages_spoken.clone(),
            practitioner_type: qualification.map(|q| q.practitioner_type.clone()),
            credential_title: qualification.map(|q| q.credential_title.clone()),
            licensed_states: qualification.map(|q| q.licensed_states.clone()).unwrap_or_default(),
            practice_name: criteria.and_then(|c| c.practice_name.clone()),
            age_range: criteria.map(|c| c.age_range),
        })
    }

    fn details(
        &self,
        record: &UserRecord,
        criteria: Option<PracticeCriteria>,
        qualification: Option<ProviderQualification>,
    ) -> Result<ProviderDetails, ProviderError> {
        Ok(ProviderDetails {
            summary: self.summarize(record, criteria.as_ref(), qualification.as_ref())?,
            phone_number: record.phone_number.clone(),
            state: record.state.clone(),
            criteria,
            qualification,
        })
    }

    async fn load_details(&self, record: &UserRecord) -> Result<ProviderDetails, ProviderError> {
        let (criteria, qualification) = futures::try_join!(
            self.criteria_for(&record.id),
            self.qualification_for(&record.id)
        )?;
        self.details(record, criteria, qualification)
    }

    /// Summaries for the given provider accounts, in the given order.
    pub async fn summaries_for(&self, records: &[UserRecord]) -> Result<Vec<ProviderSummary>, ProviderError> {
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let (criteria, qualifications) = futures::try_join!(
            self.criteria_by_user(&ids),
            self.qualifications_by_user(&ids)
        )?;

        records
            .iter()
            .map(|record| self.summarize(record, criteria.get(&record.id), qualifications.get(&record.id)))
            .collect()
    }

    // ==========================================================================
    // OPERATIONS
    // ==========================================================================

    #[instrument(skip(self, request))]
    pub async fn onboard(&self, request: OnboardProviderRequest) -> Result<ProviderDetails, ProviderError> {
        let age_range = AgeRange::parse(&request.age_range)?;
        let (minimum_age, maximum_age) = age_range.bounds();

        let practitioner_type = required(&request.practitioner_type, "practitioner_type")?;
        let credential_title = required(&request.credential_title, "credential_title")?;
        let npi = required(&request.npi, "npi")?;

        let referrer = match request.referral_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => Some(
                self.directory()
                    .find_by_username(code)
                    .await?
                    .ok_or(ProviderError::InvalidReferralCode)?,
            ),
            None => None,
        };

        let slots = expand_entries(&request.available_days, self.slot_minutes)?;
        let photo = request.photo.as_deref().filter(|p| !p.trim().is_empty()).map(decode_photo).transpose()?;

        let cipher = self.directory().cipher();
        let mut extra = Map::new();
        extra.insert(
            "social_security_number".into(),
            json!(cipher.encrypt_opt(request.social_security_number.as_deref().map(str::trim))?),
        );

        let mut record = self
            .accounts
            .create_account(&request.account, UserType::HealthProvider, extra)
            .await?;
        info!("Created health provider account {}", record.id);

        let qualification: ProviderQualification = self
            .insert_row(
                QUALIFICATIONS,
                json!({
                    "user_id": record.id,
                    "practitioner_type": practitioner_type,
                    "credential_title": credential_title,
                    "npi": npi,
                    "caqh": request.caqh,
                    "licensed_states": request.licensed_states,
                    "is_verified": false,
                }),
            )
            .await?;

        let criteria: PracticeCriteria = self
            .insert_row(
                CRITERIA,
                json!({
                    "user_id": record.id,
                    "practice_name": request.practice_name,
                    "max_distance": request.max_distance,
                    "preferred_zip_codes": request.preferred_zip_codes,
                    "available_days": request.available_days,
                    "age_range": age_range,
                    "minimum_age": minimum_age,
                    "maximum_age": maximum_age,
                    "price_per_consultation": request.price_per_consultation,
                }),
            )
            .await?;

        self.availability.add_slots(&record.id, &criteria.id, &slots).await?;

        if let Some(referrer) = referrer {
            self.supabase
                .execute(
                    Method::POST,
                    REFERRALS,
                    Some(json!({
                        "from_user_id": referrer.id,
                        "to_user_id": record.id,
                        "type": REFERRAL_TYPE,
                        "reference_code": referrer.username,
                    })),
                )
                .await?;
            debug!("Recorded referral from {} to {}", referrer.id, record.id);
        }

        if let Some(photo) = photo {
            let object_path = format!("providers/{}.{}", record.id, photo.extension);
            let url = self
                .supabase
                .upload_object(PHOTO_BUCKET, &object_path, photo.bytes, &photo.content_type)
                .await?;

            let mut changes = Map::new();
            changes.insert("photo_url".into(), json!(url));
            record = self.directory().update(&record.id, changes).await?;
        }

        self.details(&record, Some(criteria), Some(qualification))
    }

    pub async fn list_providers(&self, query: &PageQuery) -> Result<Page<ProviderSummary>, ProviderError> {
        let records = self.directory().list_by_type(UserType::HealthProvider).await?;
        let page = paginate(records, query);
        let result = self.summaries_for(&page.result).await?;

        Ok(Page {
            count: page.count,
            pages: page.pages,
            page: page.page,
            result,
        })
    }

    pub async fn get_details(&self, email: &str) -> Result<ProviderDetails, ProviderError> {
        let record = self
            .directory()
            .find_by_email(email.trim())
            .await?
            .filter(|r| r.user_type == UserType::HealthProvider)
            .ok_or(ProviderError::NotFound)?;

        self.load_details(&record).await
    }

    /// Provider account with criteria, or the matching error.
    pub async fn require_provider(&self, user_id: &str) -> Result<(UserRecord, PracticeCriteria), ProviderError> {
        let record = self
            .directory()
            .find_by_id(user_id)
            .await?
            .filter(|r| r.user_type == UserType::HealthProvider)
            .ok_or(ProviderError::NotFound)?;
        let criteria = self.require_criteria(&record.id).await?;
        Ok((record, criteria))
    }

    #[instrument(skip(self, request))]
    pub async fn update_provider(&self, user_id: &str, request: EditProviderRequest) -> Result<ProviderDetails, ProviderError> {
        let (criteria, qualification) = futures::try_join!(
            self.criteria_for(user_id),
            self.qualification_for(user_id)
        )?;
        let criteria = criteria.ok_or(ProviderError::MissingProfile("Practice criteria"))?;
        let qualification = qualification.ok_or(ProviderError::MissingProfile("Qualification"))?;

        let user_changes = self.accounts.profile_changes(&request.profile)?;

        let mut criteria_changes = Map::new();
        if let Some(name) = request.practice_name.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            criteria_changes.insert("practice_name".into(), json!(name));
        }
        if let Some(distance) = request.max_distance {
            criteria_changes.insert("max_distance".into(), json!(distance));
        }
        if let Some(zips) = request.preferred_zip_codes.as_ref().filter(|z| !z.is_empty()) {
            criteria_changes.insert("preferred_zip_codes".into(), json!(zips));
        }
        if let Some(raw) = request.age_range.as_deref().filter(|v| !v.trim().is_empty()) {
            let age_range = AgeRange::parse(raw)?;
            let (minimum_age, maximum_age) = age_range.bounds();
            criteria_changes.insert("age_range".into(), json!(age_range));
            criteria_changes.insert("minimum_age".into(), json!(minimum_age));
            criteria_changes.insert("maximum_age".into(), json!(maximum_age));
        }
        if let Some(price) = request.price_per_consultation {
            criteria_changes.insert("price_per_consultation".into(), json!(price));
        }

        let mut qualification_changes = Map::new();
        for (key, value) in [
            ("practitioner_type", &request.practitioner_type),
            ("credential_title", &request.credential_title),
            ("npi", &request.npi),
            ("caqh", &request.caqh),
        ] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                qualification_changes.insert(key.into(), json!(v));
            }
        }
        if let Some(states) = request.licensed_states.as_ref().filter(|s| !s.is_empty()) {
            qualification_changes.insert("licensed_states".into(), json!(states));
        }

        let record = if user_changes.is_empty() {
            self.directory().get(user_id).await?
        } else {
            self.directory().update(user_id, user_changes).await?
        };

        let criteria = if criteria_changes.is_empty() {
            criteria
        } else {
            self.patch_row(CRITERIA, &criteria.id, criteria_changes).await?
        };

        let qualification = if qualification_changes.is_empty() {
            qualification
        } else {
            self.patch_row(QUALIFICATIONS, &qualification.id, qualification_changes).await?
        };

        info!("Updated health provider {}", user_id);
        self.details(&record, Some(criteria), Some(qualification))
    }

    /// Replaces the provider's schedule. Returns the slots now open.
    #[instrument(skip(self, entries))]
    pub async fn set_availability(&self, user_id: &str, entries: Vec<String>) -> Result<Vec<DateTime<Utc>>, ProviderError> {
        let criteria = self.require_criteria(user_id).await?;
        let slots = expand_entries(&entries, self.slot_minutes)?;

        let mut changes = Map::new();
        changes.insert("available_days".into(), json!(entries));
        let _: PracticeCriteria = self.patch_row(CRITERIA, &criteria.id, changes).await?;

        self.availability.replace_slots(user_id, &criteria.id, &slots).await
    }

    pub async fn get_available_days(&self, user_id: &str) -> Result<Vec<String>, ProviderError> {
        Ok(self.require_criteria(user_id).await?.available_days)
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn save_account_details(
        &self,
        user: &User,
        request: SaveAccountDetailsRequest,
    ) -> Result<AccountDetailsResponse, ProviderError> {
        if !user.is_health_provider() {
            warn!("Non-provider attempted to save payout account details");
            return Err(ProviderError::NotAProvider);
        }

        let bank_name = required(&request.bank_name, "bank_name")?;
        let account_number = digits_only(&request.account_number, "account_number")?;
        let routing_number = digits_only(&request.routing_number, "routing_number")?;

        let path = format!("{}?select=id&user_id=eq.{}", ACCOUNT_DETAILS, encode(&user.id));
        let existing: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        if !existing.is_empty() {
            return Err(ProviderError::AccountDetailsExist);
        }

        let cipher = self.directory().cipher();
        let saved: AccountDetails = self
            .insert_row(
                ACCOUNT_DETAILS,
                json!({
                    "user_id": user.id,
                    "bank_name": bank_name,
                    "account_number": cipher.encrypt(&account_number)?,
                    "routing_number": routing_number,
                }),
            )
            .await?;

        info!("Saved payout account for provider {}", user.id);
        Ok(AccountDetailsResponse {
            id: saved.id,
            bank_name: saved.bank_name,
            account_number: last_four(&account_number),
            routing_number: saved.routing_number,
        })
    }
}
