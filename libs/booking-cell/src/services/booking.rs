use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use auth_cell::models::{UserRecord, UserType};
use auth_cell::services::UserDirectory;
use notification_cell::Notifier;
use provider_cell::models::ProviderSummary;
use provider_cell::services::{AvailabilityService, ProviderMatchingService, ProviderService};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;
use shared_models::pagination::{paginate, Page, PageQuery};
use shared_utils::jwt::{issue_action_token, validate_action_token};

use crate::models::{
    Booking, BookingError, BookingListQuery, BookingRequest, BookingStatus, BookingTimeframe, BookingView,
    CancelBookingRequest, FinalizeBookingRequest, Participant, RescheduleAvailability, RescheduleBookingRequest,
    RescheduleTimesRequest,
};
use crate::services::emails::{self, ActionLinks, ACCEPT_ACTION, REJECT_ACTION};
use crate::services::lifecycle::BookingLifecycle;

const BOOKINGS: &str = "/rest/v1/bookings";
const TIMEFRAMES: &str = "/rest/v1/booking_timeframes";

const REJECTION_REASON: &str = "Provider Unavailable";

/// Outcome of a booking request: the stored booking id (absent when no
/// provider matched) and the page of recommended providers.
#[derive(Debug)]
pub struct BookingRequestOutcome {
    pub booking_id: Option<String>,
    pub providers: Page<ProviderSummary>,
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn stamp(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn require_patient(user: &User) -> Result<(), BookingError> {
    if user.is_health_provider() {
        return Err(BookingError::ProviderCannotBook);
    }
    if !user.is_patient() {
        return Err(BookingError::NotAPatient);
    }
    Ok(())
}

fn require_provider(user: &User) -> Result<(), BookingError> {
    if !user.is_health_provider() {
        return Err(BookingError::NotAProvider);
    }
    Ok(())
}

pub struct BookingService {
    config: AppConfig,
    supabase: SupabaseClient,
    providers: ProviderService,
    availability: AvailabilityService,
    notifier: Notifier,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Result<Self, BookingError> {
        Ok(Self {
            config: config.clone(),
            supabase: SupabaseClient::new(config),
            providers: ProviderService::new(config)?,
            availability: AvailabilityService::new(config),
            notifier: Notifier::new(config),
        })
    }

    fn directory(&self) -> &UserDirectory {
        self.providers.directory()
    }

    // ==========================================================================
    // ROWS
    // ==========================================================================

    pub async fn get(&self, booking_id: &str) -> Result<Booking, BookingError> {
        let path = format!("{}?id=eq.{}&limit=1", BOOKINGS, encode(booking_id));
        let mut rows: Vec<Booking> = self.supabase.request(Method::GET, &path, None).await?;
        rows.pop().ok_or_else(|| BookingError::NotFound(booking_id.to_string()))
    }

    async fn owned_by_patient(&self, user: &User, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.get(booking_id).await?;
        if booking.patient_id != user.id {
            warn!("User {} tried to act on booking {} of another patient", user.id, booking_id);
            return Err(BookingError::NotYours(booking_id.to_string()));
        }
        Ok(booking)
    }

    async fn owned_by_provider(&self, provider_id: &str, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.get(booking_id).await?;
        if booking.practitioner_id.as_deref() != Some(provider_id) {
            warn!("Provider {} tried to act on booking {} assigned elsewhere", provider_id, booking_id);
            return Err(BookingError::NotYours(booking_id.to_string()));
        }
        Ok(booking)
    }

    async fn update(&self, booking_id: &str, mut changes: Map<String, Value>) -> Result<Booking, BookingError> {
        changes.insert("updated_at".into(), json!(Utc::now()));

        let path = format!("{}?id=eq.{}", BOOKINGS, encode(booking_id));
        let mut rows: Vec<Booking> = self
            .supabase
            .write_returning(Method::PATCH, &path, Value::Object(changes))
            .await?;
        rows.pop().ok_or_else(|| BookingError::NotFound(booking_id.to_string()))
    }

    async fn set_status(&self, booking: &Booking, next: BookingStatus, reason: Option<&str>) -> Result<Booking, BookingError> {
        BookingLifecycle::validate_transition(booking.status, next)?;

        let mut changes = Map::new();
        changes.insert("status".into(), json!(next));
        if let Some(reason) = reason {
            changes.insert("reason".into(), json!(reason));
        }

        let updated = self.update(&booking.id, changes).await?;
        info!("Booking {} moved {} -> {}", booking.id, booking.status, next);
        Ok(updated)
    }

    // ==========================================================================
    // SLOT HOLDS
    // ==========================================================================

    /// Removes the provider's slots in the hour of care and records them against the booking.
    async fn hold_timeframe(&self, booking: &Booking, provider_id: &str) -> Result<(), BookingError> {
        let Some(time_of_care) = booking.date_time_of_care else {
            return Err(BookingError::Validation(format!("Booking {} has no time of care", booking.id)));
        };

        let criteria = self.providers.require_criteria(provider_id).await?;
        let taken = self.availability.take_slots_in_hour(provider_id, &time_of_care).await?;
        let instants: Vec<String> = taken.iter().map(|slot| stamp(&slot.available_date_time)).collect();

        self.supabase
            .execute(
                Method::POST,
                TIMEFRAMES,
                Some(json!({
                    "booking_id": booking.id,
                    "criteria_id": criteria.id,
                    "booking_timeframe": instants,
                })),
            )
            .await?;

        debug!("Held {} slots for booking {}", instants.len(), booking.id);
        Ok(())
    }

    async fn holds(&self, booking_id: &str) -> Result<Vec<BookingTimeframe>, BookingError> {
        let path = format!("{}?booking_id=eq.{}", TIMEFRAMES, encode(booking_id));
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    /// Returns held slots to the provider's pool. Safe to call when nothing is held.
    async fn release_timeframe(&self, booking: &Booking) -> Result<(), BookingError> {
        let holds = self.holds(&booking.id).await?;
        if holds.is_empty() {
            return Ok(());
        }

        if let Some(provider_id) = booking.practitioner_id.as_deref() {
            match self.providers.criteria_for(provider_id).await? {
                Some(criteria) => {
                    for hold in &holds {
                        self.availability
                            .restore_slots(
                                provider_id,
                                &hold.criteria_id,
                                &hold.booking_timeframe,
                                &criteria.available_days,
                            )
                            .await?;
                    }
                }
                None => warn!("Provider {} has no schedule, held slots are dropped", provider_id),
            }
        }

        let path = format!("{}?booking_id=eq.{}", TIMEFRAMES, encode(&booking.id));
        self.supabase.execute(Method::DELETE, &path, None).await?;
        info!("Released held slots for booking {}", booking.id);
        Ok(())
    }

    // ==========================================================================
    // VIEWS AND NOTIFICATIONS
    // ==========================================================================

    fn participant(&self, record: &UserRecord) -> Result<Participant, BookingError> {
        let cipher = self.directory().cipher();
        Ok(Participant {
            id: record.id.clone(),
            email: record.email.clone(),
            first_name: cipher.decrypt_opt(record.first_name.as_deref())?,
            last_name: cipher.decrypt_opt(record.last_name.as_deref())?,
            phone_number: record.phone_number.clone(),
            photo_url: record.photo_url.clone(),
        })
    }

    async fn views(&self, bookings: Vec<Booking>) -> Result<Vec<BookingView>, BookingError> {
        let mut ids: Vec<String> = bookings
            .iter()
            .flat_map(|b| std::iter::once(b.patient_id.clone()).chain(b.practitioner_id.clone()))
            .collect();
        ids.sort();
        ids.dedup();

        let people: HashMap<String, Participant> = self
            .directory()
            .find_many(&ids)
            .await?
            .iter()
            .map(|record| Ok((record.id.clone(), self.participant(record)?)))
            .collect::<Result<_, BookingError>>()?;

        Ok(bookings
            .into_iter()
            .map(|booking| BookingView {
                patient: people.get(&booking.patient_id).cloned(),
                practitioner: booking.practitioner_id.as_ref().and_then(|id| people.get(id)).cloned(),
                booking,
            })
            .collect())
    }

    async fn view(&self, booking: Booking) -> Result<BookingView, BookingError> {
        let mut views = self.views(vec![booking]).await?;
        views
            .pop()
            .ok_or_else(|| BookingError::Database("Booking view could not be built".to_string()))
    }

    fn action_links(&self, provider_id: &str, booking_id: &str) -> Result<ActionLinks, BookingError> {
        let secret = &self.config.jwt_secret;
        let hours = self.config.access_token_lifetime_hours;

        let accept = issue_action_token(provider_id, ACCEPT_ACTION, booking_id, secret, hours)
            .map_err(BookingError::InvalidActionToken)?;
        let reject = issue_action_token(provider_id, REJECT_ACTION, booking_id, secret, hours)
            .map_err(BookingError::InvalidActionToken)?;

        Ok(ActionLinks::new(&self.config.public_base_url, &accept, &reject))
    }

    async fn notify_provider_of_request(
        &self,
        subject: &str,
        booking: &Booking,
        provider: &UserRecord,
        patient: &UserRecord,
        copy_patient: bool,
    ) -> Result<(), BookingError> {
        let links = self.action_links(&provider.id, &booking.id)?;
        let address = self.directory().cipher().decrypt_opt(patient.address.as_deref())?;
        let patient_card = self.participant(patient)?;

        let mut message = emails::care_request(
            subject,
            booking,
            &self.participant(provider)?,
            &patient_card,
            address.as_deref(),
            &links,
        );
        if copy_patient {
            message = message.with_bcc(&patient_card.email);
        }

        self.notifier.email(message).await;
        Ok(())
    }

    async fn participants_of(&self, booking: &Booking) -> Result<(Participant, Participant), BookingError> {
        let provider_id = booking
            .practitioner_id
            .clone()
            .ok_or_else(|| BookingError::NoPractitioner(booking.id.clone()))?;

        let (patient, provider) = futures::try_join!(
            self.directory().get(&booking.patient_id),
            self.directory().get(&provider_id)
        )?;
        Ok((self.participant(&patient)?, self.participant(&provider)?))
    }

    // ==========================================================================
    // OPERATIONS
    // ==========================================================================

    /// Matches providers for the request. A booking is only stored when at least one provider matched.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn booking_request(
        &self,
        user: &User,
        request: BookingRequest,
        query: &PageQuery,
    ) -> Result<BookingRequestOutcome, BookingError> {
        require_patient(user)?;

        if request.date_care_is_needed < Utc::now().date_naive() {
            return Err(BookingError::DateInPast);
        }
        if request.symptom.trim().is_empty() || request.zipcode.trim().is_empty() {
            return Err(BookingError::Validation("symptom and zipcode are required".to_string()));
        }
        if request.age_of_patient < 0 {
            return Err(BookingError::Validation("age_of_patient must not be negative".to_string()));
        }

        let matching = ProviderMatchingService::new(&self.config)?;
        let providers = matching
            .recommend_providers(request.age_of_patient, request.zipcode.trim(), request.date_care_is_needed)
            .await?;

        if providers.is_empty() {
            info!("No providers matched the booking request");
            return Ok(BookingRequestOutcome {
                booking_id: None,
                providers: Page::empty(query),
            });
        }

        let mut rows: Vec<Booking> = self
            .supabase
            .write_returning(
                Method::POST,
                BOOKINGS,
                json!({
                    "patient_id": user.id,
                    "symptom": request.symptom.trim(),
                    "date_care_is_needed": request.date_care_is_needed,
                    "age_of_patient": request.age_of_patient,
                    "zipcode": request.zipcode.trim(),
                    "status": BookingStatus::Requested,
                }),
            )
            .await?;
        let booking = rows
            .pop()
            .ok_or_else(|| BookingError::Database("Insert returned no booking".to_string()))?;

        info!("Stored booking request {} with {} candidate providers", booking.id, providers.len());
        Ok(BookingRequestOutcome {
            booking_id: Some(booking.id),
            providers: paginate(providers, query),
        })
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, booking_id = %request.booking_id))]
    pub async fn finalize_booking(&self, user: &User, request: FinalizeBookingRequest) -> Result<BookingView, BookingError> {
        require_patient(user)?;

        if request.date_time_of_care < Utc::now() {
            return Err(BookingError::DateInPast);
        }

        let email = request.practitioner_email.trim().to_lowercase();
        let provider = self
            .directory()
            .find_by_email(&email)
            .await?
            .filter(|record| record.user_type == UserType::HealthProvider)
            .ok_or_else(|| BookingError::ProviderNotFound(email.clone()))?;
        self.providers.require_criteria(&provider.id).await?;

        if !self.availability.has_slot_at(&provider.id, &request.date_time_of_care).await? {
            return Err(BookingError::SlotUnavailable(stamp(&request.date_time_of_care)));
        }

        let booking = self.owned_by_patient(user, &request.booking_id).await?;
        if booking.status != BookingStatus::Requested {
            return Err(BookingError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Pending,
            });
        }

        let mut changes = Map::new();
        changes.insert("practitioner_id".into(), json!(provider.id));
        changes.insert("date_time_of_care".into(), json!(request.date_time_of_care));
        changes.insert("status".into(), json!(BookingStatus::Pending));
        let booking = self.update(&booking.id, changes).await?;
        info!("Booking {} sent to provider {}", booking.id, provider.id);

        let patient = self.directory().get(&user.id).await?;
        self.notify_provider_of_request("Inhouse Visit Booking Request", &booking, &provider, &patient, false)
            .await?;

        self.view(booking).await
    }

    #[instrument(skip(self))]
    pub async fn accept_booking(&self, provider_id: &str, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.owned_by_provider(provider_id, booking_id).await?;
        BookingLifecycle::validate_transition(booking.status, BookingStatus::Accepted)?;

        self.hold_timeframe(&booking, provider_id).await?;
        let booking = match self.set_status(&booking, BookingStatus::Accepted, None).await {
            Ok(accepted) => accepted,
            Err(e) => {
                if let Err(release_error) = self.release_timeframe(&booking).await {
                    error!("Could not release slots of booking {}: {}", booking.id, release_error);
                }
                return Err(e);
            }
        };

        let (patient, provider) = self.participants_of(&booking).await?;
        self.notifier
            .email(emails::booking_confirmed(&booking, &provider, &patient))
            .await;

        Ok(booking)
    }

    #[instrument(skip(self))]
    pub async fn reject_booking(&self, provider_id: &str, booking_id: &str) -> Result<Booking, BookingError> {
        let booking = self.owned_by_provider(provider_id, booking_id).await?;
        BookingLifecycle::validate_transition(booking.status, BookingStatus::Rejected)?;

        self.release_timeframe(&booking).await?;
        let booking = self
            .set_status(&booking, BookingStatus::Rejected, Some(REJECTION_REASON))
            .await?;

        let (patient, provider) = self.participants_of(&booking).await?;
        self.notifier
            .email(emails::booking_rejected(&booking, &provider, &patient))
            .await;

        Ok(booking)
    }

    /// Accepts or rejects through a signed email link.
    pub async fn respond_with_token(&self, token: &str, accept: bool) -> Result<Booking, BookingError> {
        let action = if accept { ACCEPT_ACTION } else { REJECT_ACTION };
        let claims = validate_action_token(token, action, &self.config.jwt_secret)
            .map_err(BookingError::InvalidActionToken)?;

        if accept {
            self.accept_booking(&claims.sub, &claims.booking_id).await
        } else {
            self.reject_booking(&claims.sub, &claims.booking_id).await
        }
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, booking_id = %request.booking_id))]
    pub async fn cancel_booking(&self, user: &User, request: CancelBookingRequest) -> Result<Booking, BookingError> {
        require_patient(user)?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(BookingError::Validation("reason is required".to_string()));
        }

        let booking = self.owned_by_patient(user, &request.booking_id).await?;
        BookingLifecycle::validate_transition(booking.status, BookingStatus::Failed)?;

        self.release_timeframe(&booking).await?;
        self.set_status(&booking, BookingStatus::Failed, Some(reason)).await
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn complete_booking(&self, user: &User, booking_id: &str) -> Result<Booking, BookingError> {
        require_provider(user)?;

        let booking = self.owned_by_provider(&user.id, booking_id).await?;
        self.set_status(&booking, BookingStatus::Succeeded, None).await
    }

    pub async fn reschedule_available_times(
        &self,
        user: &User,
        request: RescheduleTimesRequest,
    ) -> Result<RescheduleAvailability, BookingError> {
        require_patient(user)?;

        let booking = self.owned_by_patient(user, &request.booking_id).await?;
        let provider_id = booking
            .practitioner_id
            .ok_or_else(|| BookingError::NoPractitioner(booking.id.clone()))?;

        let provider = self.directory().get(&provider_id).await?;
        let slots = self
            .availability
            .slots_on_day(&provider_id, request.day_care_is_needed)
            .await?;

        if slots.is_empty() {
            return Err(BookingError::NoAvailableTimes);
        }

        Ok(RescheduleAvailability {
            provider_email: provider.email,
            available_date_time: slots.into_iter().map(|slot| slot.available_date_time).collect(),
        })
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id, booking_id = %request.booking_id))]
    pub async fn reschedule_booking(&self, user: &User, request: RescheduleBookingRequest) -> Result<BookingView, BookingError> {
        require_patient(user)?;

        let booking = self.owned_by_patient(user, &request.booking_id).await?;
        let provider_id = booking
            .practitioner_id
            .clone()
            .ok_or_else(|| BookingError::NoPractitioner(booking.id.clone()))?;
        BookingLifecycle::validate_transition(booking.status, BookingStatus::Pending)?;

        let new_time = request.date_time_care_is_needed;
        if new_time < Utc::now() {
            return Err(BookingError::DateInPast);
        }

        let held_by_booking = self
            .holds(&booking.id)
            .await?
            .iter()
            .any(|hold| hold.booking_timeframe.contains(&new_time));
        if !held_by_booking && !self.availability.has_slot_at(&provider_id, &new_time).await? {
            return Err(BookingError::SlotUnavailable(stamp(&new_time)));
        }

        self.release_timeframe(&booking).await?;

        let mut changes = Map::new();
        changes.insert("date_time_of_care".into(), json!(new_time));
        changes.insert("date_care_is_needed".into(), json!(new_time.date_naive()));
        changes.insert("status".into(), json!(BookingStatus::Pending));
        changes.insert("reason".into(), Value::Null);
        let booking = self.update(&booking.id, changes).await?;
        info!("Booking {} rescheduled", booking.id);

        let (patient, provider) = futures::try_join!(
            self.directory().get(&user.id),
            self.directory().get(&provider_id)
        )?;
        self.notify_provider_of_request("Reschedule booking request", &booking, &provider, &patient, true)
            .await?;

        self.view(booking).await
    }

    /// Patients see the bookings they made, providers the ones assigned to them.
    pub async fn list_bookings(&self, user: &User, query: &BookingListQuery) -> Result<Page<BookingView>, BookingError> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<BookingStatus>)
            .transpose()?;

        let owner_column = if user.is_health_provider() { "practitioner_id" } else { "patient_id" };
        let mut path = format!("{}?{}=eq.{}&order=created_at.desc", BOOKINGS, owner_column, encode(&user.id));
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let bookings: Vec<Booking> = self.supabase.request(Method::GET, &path, None).await?;
        let page_query = PageQuery {
            page: query.page,
            limit: query.limit,
        };
        let page = paginate(bookings, &page_query);
        let result = self.views(page.result).await?;

        Ok(Page {
            count: page.count,
            pages: page.pages,
            page: page.page,
            result,
        })
    }
}
