use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AvailableSlot, ProviderError};

const SLOTS: &str = "/rest/v1/available_slots";
const TIMEFRAMES: &str = "/rest/v1/booking_timeframes";

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Parses an RFC 3339 instant, or a zone-less date-time taken as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Expands availability entries into distinct, ordered slot start times.
///
/// An entry is either one instant or a `start/end` window that yields a slot
/// every `slot_minutes` in `[start, end)`.
pub fn expand_entries(entries: &[String], slot_minutes: i64) -> Result<Vec<DateTime<Utc>>, ProviderError> {
    let step = Duration::minutes(slot_minutes.max(1));
    let mut slots = BTreeSet::new();

    for entry in entries {
        let invalid = || ProviderError::InvalidAvailability(entry.clone());

        match entry.split_once('/') {
            Some((start, end)) => {
                let start = parse_instant(start).ok_or_else(invalid)?;
                let end = parse_instant(end).ok_or_else(invalid)?;
                if end <= start {
                    return Err(invalid());
                }

                let mut cursor = start;
                while cursor < end {
                    slots.insert(cursor);
                    cursor += step;
                }
            }
            None => {
                slots.insert(parse_instant(entry).ok_or_else(invalid)?);
            }
        }
    }

    Ok(slots.into_iter().collect())
}

pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn day_bounds(day: NaiveDate) -> (String, String) {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    (format_instant(&start), format_instant(&(start + Duration::days(1))))
}

fn hour_bounds(instant: &DateTime<Utc>) -> (String, String) {
    let start = instant
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(*instant);
    (format_instant(&start), format_instant(&(start + Duration::hours(1))))
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[derive(Debug, Deserialize)]
struct HeldTimeframe {
    #[serde(default)]
    booking_timeframe: Vec<DateTime<Utc>>,
}

/// The pool of bookable slots in `available_slots`.
pub struct AvailabilityService {
    supabase: SupabaseClient,
    slot_minutes: i64,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            slot_minutes: config.slot_minutes,
        }
    }

    /// Schedules slots for a provider that has none yet.
    pub async fn add_slots(
        &self,
        provider_id: &str,
        criteria_id: &str,
        instants: &[DateTime<Utc>],
    ) -> Result<(), ProviderError> {
        if instants.is_empty() {
            return Ok(());
        }

        let rows: Vec<Value> = instants
            .iter()
            .map(|instant| {
                json!({
                    "provider_id": provider_id,
                    "criteria_id": criteria_id,
                    "available_date_time": format_instant(instant),
                })
            })
            .collect();

        self.supabase.execute(Method::POST, SLOTS, Some(Value::Array(rows))).await?;
        Ok(())
    }

    /// Instants taken out of the pool by bookings that still hold them.
    pub async fn held_instants(&self, criteria_id: &str) -> Result<HashSet<DateTime<Utc>>, ProviderError> {
        let path = format!(
            "{}?select=booking_timeframe&criteria_id=eq.{}",
            TIMEFRAMES,
            encode(criteria_id)
        );
        let holds: Vec<HeldTimeframe> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(holds.into_iter().flat_map(|hold| hold.booking_timeframe).collect())
    }

    /// Drops every open slot of the provider and schedules `instants` instead.
    /// Instants held by a booking stay out of the pool. Returns what was opened.
    pub async fn replace_slots(
        &self,
        provider_id: &str,
        criteria_id: &str,
        instants: &[DateTime<Utc>],
    ) -> Result<Vec<DateTime<Utc>>, ProviderError> {
        let held = self.held_instants(criteria_id).await?;
        let open: Vec<DateTime<Utc>> = instants
            .iter()
            .filter(|instant| !held.contains(instant))
            .copied()
            .collect();

        let path = format!("{}?provider_id=eq.{}", SLOTS, encode(provider_id));
        self.supabase.execute(Method::DELETE, &path, None).await?;
        self.add_slots(provider_id, criteria_id, &open).await?;

        info!(
            "Scheduled {} slots for provider {} ({} held by bookings)",
            open.len(),
            provider_id,
            instants.len() - open.len()
        );
        Ok(open)
    }

    pub async fn open_slots(&self, provider_id: &str) -> Result<Vec<AvailableSlot>, ProviderError> {
        let path = format!(
            "{}?provider_id=eq.{}&order=available_date_time.asc",
            SLOTS,
            encode(provider_id)
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    pub async fn slots_on_day(&self, provider_id: &str, day: NaiveDate) -> Result<Vec<AvailableSlot>, ProviderError> {
        let (start, end) = day_bounds(day);
        let path = format!(
            "{}?provider_id=eq.{}&available_date_time=gte.{}&available_date_time=lt.{}&order=available_date_time.asc",
            SLOTS,
            encode(provider_id),
            start,
            end
        );
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    /// Which of `provider_ids` hold at least one open slot on `day`.
    pub async fn providers_open_on(&self, provider_ids: &[String], day: NaiveDate) -> Result<HashSet<String>, ProviderError> {
        if provider_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let (start, end) = day_bounds(day);
        let ids = provider_ids.iter().map(|id| encode(id)).collect::<Vec<_>>().join(",");
        let path = format!(
            "{}?select=provider_id&provider_id=in.({})&available_date_time=gte.{}&available_date_time=lt.{}",
            SLOTS, ids, start, end
        );

        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row["provider_id"].as_str().map(str::to_string))
            .collect())
    }

    pub async fn has_slot_at(&self, provider_id: &str, instant: &DateTime<Utc>) -> Result<bool, ProviderError> {
        let path = format!(
            "{}?select=id&provider_id=eq.{}&available_date_time=eq.{}",
            SLOTS,
            encode(provider_id),
            format_instant(instant)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    /// Removes the provider's open slots in the same clock hour as `instant`
    /// and returns what was removed.
    pub async fn take_slots_in_hour(&self, provider_id: &str, instant: &DateTime<Utc>) -> Result<Vec<AvailableSlot>, ProviderError> {
        let (start, end) = hour_bounds(instant);
        let path = format!(
            "{}?provider_id=eq.{}&available_date_time=gte.{}&available_date_time=lt.{}",
            SLOTS,
            encode(provider_id),
            start,
            end
        );
        let taken: Vec<AvailableSlot> = self.supabase.request(Method::GET, &path, None).await?;

        if !taken.is_empty() {
            let ids = taken.iter().map(|slot| encode(&slot.id)).collect::<Vec<_>>().join(",");
            let delete_path = format!("{}?id=in.({})", SLOTS, ids);
            self.supabase.execute(Method::DELETE, &delete_path, None).await?;
        }

        debug!("Held {} slots for provider {}", taken.len(), provider_id);
        Ok(taken)
    }

    /// Puts held instants back into the pool. Instants already open, or no
    /// longer covered by `available_days`, are skipped.
    pub async fn restore_slots(
        &self,
        provider_id: &str,
        criteria_id: &str,
        instants: &[DateTime<Utc>],
        available_days: &[String],
    ) -> Result<usize, ProviderError> {
        if instants.is_empty() {
            return Ok(0);
        }

        let scheduled: HashSet<DateTime<Utc>> = expand_entries(available_days, self.slot_minutes)?
            .into_iter()
            .collect();
        let existing: HashSet<DateTime<Utc>> = self
            .open_slots(provider_id)
            .await?
            .into_iter()
            .map(|slot| slot.available_date_time)
            .collect();

        let missing = restorable(instants, &scheduled, &existing);
        if missing.len() < instants.len() {
            debug!(
                "Skipped {} held slots of provider {} that are open or unscheduled",
                instants.len() - missing.len(),
                provider_id
            );
        }

        self.add_slots(provider_id, criteria_id, &missing).await?;
        info!("Released {} slots back to provider {}", missing.len(), provider_id);
        Ok(missing.len())
    }
}

fn restorable(
    instants: &[DateTime<Utc>],
    scheduled: &HashSet<DateTime<Utc>>,
    existing: &HashSet<DateTime<Utc>>,
) -> Vec<DateTime<Utc>> {
    instants
        .iter()
        .filter(|instant| scheduled.contains(instant) && !existing.contains(instant))
        .copied()
        .collect()
}
