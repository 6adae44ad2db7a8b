use reqwest::Method;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{BookingError, GeneralBookingDetails};

const GENERAL_DETAILS: &str = "/rest/v1/general_booking_details";

/// Platform-wide consultation price.
pub struct PricingService {
    supabase: SupabaseClient,
}

impl PricingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn general_booking_details(&self) -> Result<GeneralBookingDetails, BookingError> {
        let path = format!("{}?select=price_per_consultation&limit=1", GENERAL_DETAILS);
        let mut rows: Vec<GeneralBookingDetails> = self.supabase.request(Method::GET, &path, None).await?;
        let details = rows.pop().ok_or(BookingError::PricingUnavailable)?;

        debug!("General consultation price is {:.2}", details.price_per_consultation);
        Ok(details)
    }

    pub async fn price_per_consultation(&self) -> Result<f64, BookingError> {
        Ok(self.general_booking_details().await?.price_per_consultation)
    }
}
