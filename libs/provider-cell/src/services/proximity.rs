use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::ProviderError;

#[derive(Debug, Deserialize)]
struct RadiusResponse {
    #[serde(default)]
    zip_codes: Vec<RadiusZipCode>,
}

#[derive(Debug, Deserialize)]
struct RadiusZipCode {
    zip_code: String,
}

#[derive(Debug, Deserialize)]
struct RadiusError {
    error_msg: Option<String>,
}

/// ZipCodeAPI radius lookup.
pub struct ZipCodeClient {
    client: Client,
    api_key: String,
    base_url: String,
    radius_miles: u32,
}

impl ZipCodeClient {
    pub fn new(config: &AppConfig) -> Result<Self, ProviderError> {
        if !config.is_proximity_configured() {
            return Err(ProviderError::Proximity("zip code lookup is not configured".to_string()));
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.zip_code_api_key.clone(),
            base_url: config.zip_code_api_base_url.clone(),
            radius_miles: config.zip_code_radius_miles,
        })
    }

    /// GET {base}rest/{key}/radius.json/{zip}/{radius}/mile
    pub async fn get_close_zip_codes(&self, zipcode: &str) -> Result<Vec<String>, ProviderError> {
        let url = format!(
            "{}rest/{}/radius.json/{}/{}/mile",
            self.base_url,
            self.api_key,
            urlencoding::encode(zipcode.trim()),
            self.radius_miles
        );

        debug!("Looking up zip codes within {} miles of {}", self.radius_miles, zipcode);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Proximity(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::Proximity(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<RadiusError>(&response_text)
                .ok()
                .and_then(|body| body.error_msg)
                .unwrap_or_else(|| format!("HTTP {}", status));
            error!("Zip code radius lookup failed: {} - {}", status, message);
            return Err(ProviderError::Proximity(message));
        }

        let radius: RadiusResponse = serde_json::from_str(&response_text)
            .map_err(|e| ProviderError::Proximity(format!("Failed to parse radius response: {}", e)))?;

        let zip_codes: Vec<String> = radius.zip_codes.into_iter().map(|z| z.zip_code).collect();
        info!("Found {} zip codes near {}", zip_codes.len(), zipcode);
        Ok(zip_codes)
    }
}
