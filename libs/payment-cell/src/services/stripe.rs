use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{
    PaymentError, StripeCustomer, StripeList, StripePaymentMethod, StripeSetupIntent,
};
use crate::services::card::CardDetails;

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Stripe REST client. Requests are form-encoded and authenticated with the secret key.
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        if !config.is_payments_configured() {
            return Err(PaymentError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            secret_key: config.stripe_secret_key.clone(),
            base_url: config.stripe_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<T>(&self, method: Method, path: &str, form: Option<&[(&str, String)]>) -> Result<T, PaymentError>
    where
        T: DeserializeOwned,
    {
        let (status, text) = self.send_raw(method, path, form).await?;
        if !status.is_success() {
            return Err(PaymentError::from_stripe(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| PaymentError::Api(format!("Failed to parse Stripe response: {}", e)))
    }

    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(&str, String)]>,
    ) -> Result<(StatusCode, String), PaymentError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to Stripe {}", method, path);

        let mut req = self.client.request(method, &url).bearer_auth(&self.secret_key);
        if let Some(form) = form {
            req = req.form(form);
        }

        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("Stripe request to {} failed: {} - {}", path, status, text);
        }
        Ok((status, text))
    }

    /// GET /v1/customers/{id}. A missing or deleted customer is `None`.
    pub async fn retrieve_customer(&self, customer_id: &str) -> Result<Option<StripeCustomer>, PaymentError> {
        let path = format!("/v1/customers/{}", encode(customer_id));
        let (status, text) = self.send_raw(Method::GET, &path, None).await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PaymentError::from_stripe(status, &text));
        }

        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| PaymentError::Api(format!("Failed to parse Stripe response: {}", e)))?;
        if value["deleted"].as_bool() == Some(true) {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| PaymentError::Api(format!("Failed to parse Stripe customer: {}", e)))
    }

    /// POST /v1/customers with a caller-chosen id.
    pub async fn create_customer(&self, customer_id: &str, email: &str, name: &str) -> Result<StripeCustomer, PaymentError> {
        let form = [
            ("id", customer_id.to_string()),
            ("email", email.to_string()),
            ("name", name.to_string()),
        ];
        let customer: StripeCustomer = self.send(Method::POST, "/v1/customers", Some(&form)).await?;
        info!("Created Stripe customer {}", customer.id);
        Ok(customer)
    }

    /// POST /v1/payment_methods
    pub async fn create_payment_method(&self, card: &CardDetails) -> Result<StripePaymentMethod, PaymentError> {
        let form = [
            ("type", "card".to_string()),
            ("card[number]", card.number.clone()),
            ("card[exp_month]", card.exp_month.to_string()),
            ("card[exp_year]", card.exp_year.to_string()),
            ("card[cvc]", card.cvc.clone()),
        ];
        self.send(Method::POST, "/v1/payment_methods", Some(&form)).await
    }

    /// POST /v1/setup_intents
    pub async fn create_setup_intent(&self, customer_id: &str, payment_method_id: &str) -> Result<StripeSetupIntent, PaymentError> {
        let form = [
            ("customer", customer_id.to_string()),
            ("payment_method", payment_method_id.to_string()),
        ];
        self.send(Method::POST, "/v1/setup_intents", Some(&form)).await
    }

    pub async fn retrieve_setup_intent(&self, setup_intent_id: &str) -> Result<StripeSetupIntent, PaymentError> {
        let path = format!("/v1/setup_intents/{}", encode(setup_intent_id));
        self.send(Method::GET, &path, None).await
    }

    pub async fn list_payment_methods(&self, customer_id: &str) -> Result<Vec<StripePaymentMethod>, PaymentError> {
        let path = format!("/v1/customers/{}/payment_methods?type=card", encode(customer_id));
        let list: StripeList<StripePaymentMethod> = self.send(Method::GET, &path, None).await?;
        Ok(list.data)
    }

    /// POST /v1/payment_methods/{id}/detach
    pub async fn detach_payment_method(&self, payment_method_id: &str) -> Result<StripePaymentMethod, PaymentError> {
        let path = format!("/v1/payment_methods/{}/detach", encode(payment_method_id));
        self.send(Method::POST, &path, None).await
    }
}
