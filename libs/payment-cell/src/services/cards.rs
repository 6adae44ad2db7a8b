use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{info, instrument, warn};

use auth_cell::services::UserDirectory;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{PaymentError, SaveCardRequest, StripeCustomer, UserCard};
use crate::services::card::CardDetails;
use crate::services::stripe::StripeClient;

const USER_CARDS: &str = "/rest/v1/user_cards";

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn required_text(request: &SaveCardRequest) -> Result<(), PaymentError> {
    let fields = [
        ("cardholder_name", &request.cardholder_name),
        ("card_type", &request.card_type),
        ("city", &request.city),
        ("state", &request.state),
        ("zip_code", &request.zip_code),
        ("billing_address", &request.billing_address),
    ];
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(PaymentError::InvalidCard(format!("{} is required", name))),
        None => Ok(()),
    }
}

pub struct CardService {
    supabase: SupabaseClient,
    stripe: StripeClient,
    directory: UserDirectory,
}

impl CardService {
    pub fn new(config: &AppConfig) -> Result<Self, PaymentError> {
        Ok(Self {
            supabase: SupabaseClient::new(config),
            stripe: StripeClient::new(config)?,
            directory: UserDirectory::new(config)?,
        })
    }

    /// The Stripe customer shares the user's id.
    async fn ensure_customer(&self, user: &User) -> Result<StripeCustomer, PaymentError> {
        if let Some(customer) = self.stripe.retrieve_customer(&user.id).await? {
            return Ok(customer);
        }

        let record = self.directory.get(&user.id).await?;
        let cipher = self.directory.cipher();
        let name = [
            cipher.decrypt_opt(record.first_name.as_deref()).ok().flatten(),
            cipher.decrypt_opt(record.last_name.as_deref()).ok().flatten(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

        self.stripe.create_customer(&user.id, &record.email, &name).await
    }

    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn save_card(&self, user: &User, request: SaveCardRequest) -> Result<UserCard, PaymentError> {
        required_text(&request)?;
        let card = CardDetails::from_request(&request, Utc::now().date_naive())?;

        let customer = self.ensure_customer(user).await?;
        let payment_method = self.stripe.create_payment_method(&card).await?;
        let setup_intent = self
            .stripe
            .create_setup_intent(&customer.id, &payment_method.id)
            .await?;

        let mut rows: Vec<UserCard> = self
            .supabase
            .write_returning(
                Method::POST,
                USER_CARDS,
                json!({
                    "user_id": user.id,
                    "cardholder_name": request.cardholder_name.trim(),
                    "last4_digit": card.last4(),
                    "exp_month": card.exp_month,
                    "exp_year": card.exp_year,
                    "card_type": request.card_type.trim(),
                    "city": request.city.trim(),
                    "state": request.state.trim(),
                    "zip_code": request.zip_code.trim(),
                    "billing_address": request.billing_address.trim(),
                    "setup_id": setup_intent.id,
                    "payment_method_id": payment_method.id,
                }),
            )
            .await?;
        let saved = rows
            .pop()
            .ok_or_else(|| PaymentError::Database("Insert returned no card".to_string()))?;

        self.directory.mark_qualified(&user.id).await?;

        info!("Saved card ending {} (setup intent {})", saved.last4_digit, setup_intent.status);
        Ok(saved)
    }

    pub async fn list_cards(&self, user: &User) -> Result<Vec<UserCard>, PaymentError> {
        let path = format!("{}?user_id=eq.{}&order=created_at.desc", USER_CARDS, encode(&user.id));
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    /// Detaches the payment method from the customer, then drops the row.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn delete_card(&self, user: &User, card_id: &str) -> Result<(), PaymentError> {
        let path = format!(
            "{}?id=eq.{}&user_id=eq.{}&limit=1",
            USER_CARDS,
            encode(card_id),
            encode(&user.id)
        );
        let mut rows: Vec<UserCard> = self.supabase.request(Method::GET, &path, None).await?;
        let card = rows.pop().ok_or(PaymentError::CardNotFound)?;

        let attached = self.stripe.list_payment_methods(&user.id).await?;
        if attached.iter().any(|pm| pm.id == card.payment_method_id) {
            self.stripe.detach_payment_method(&card.payment_method_id).await?;
        } else {
            warn!("Payment method of card {} was already detached", card.id);
        }

        let delete_path = format!("{}?id=eq.{}", USER_CARDS, encode(&card.id));
        self.supabase.execute(Method::DELETE, &delete_path, None).await?;
        info!("Deleted card {}", card.id);
        Ok(())
    }
}
