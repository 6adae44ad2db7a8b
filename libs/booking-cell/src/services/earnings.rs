use chrono::{DateTime, Datelike, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::info;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{BookingError, BookingStatus, Earnings, MonthlyEarnings};
use crate::services::pricing::PricingService;

const BOOKINGS: &str = "/rest/v1/bookings";

#[derive(Debug, Deserialize)]
struct SucceededBooking {
    created_at: DateTime<Utc>,
}

/// Twelve buckets (January first) of `price` per booking created in `year`.
pub fn monthly_buckets(created: &[DateTime<Utc>], year: i32, price: f64) -> Vec<f64> {
    let mut counts = [0u32; 12];
    for instant in created.iter().filter(|c| c.year() == year) {
        counts[instant.month0() as usize] += 1;
    }
    counts.iter().map(|count| f64::from(*count) * price).collect()
}

pub struct EarningsService {
    supabase: SupabaseClient,
    pricing: PricingService,
}

impl EarningsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            pricing: PricingService::new(config),
        }
    }

    async fn succeeded_bookings(&self, provider_id: &str) -> Result<Vec<DateTime<Utc>>, BookingError> {
        let path = format!(
            "{}?select=created_at&practitioner_id=eq.{}&status=eq.{}",
            BOOKINGS,
            urlencoding::encode(provider_id),
            BookingStatus::Succeeded
        );
        let rows: Vec<SucceededBooking> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(|row| row.created_at).collect())
    }

    pub async fn total(&self, user: &User) -> Result<Earnings, BookingError> {
        if !user.is_health_provider() {
            return Err(BookingError::NotAProvider);
        }

        let (succeeded, price) = futures::try_join!(
            self.succeeded_bookings(&user.id),
            self.pricing.price_per_consultation()
        )?;

        let earnings = Earnings {
            total_booking_count: succeeded.len(),
            total_earnings: succeeded.len() as f64 * price,
        };
        info!("Provider {} has {} succeeded bookings", user.id, earnings.total_booking_count);
        Ok(earnings)
    }

    pub async fn monthly(&self, user: &User, year: i32) -> Result<MonthlyEarnings, BookingError> {
        if !user.is_health_provider() {
            return Err(BookingError::NotAProvider);
        }

        let (succeeded, price) = futures::try_join!(
            self.succeeded_bookings(&user.id),
            self.pricing.price_per_consultation()
        )?;

        Ok(MonthlyEarnings {
            year,
            monthly_earnings: monthly_buckets(&succeeded, year, price),
        })
    }
}
