//! Plain-text booking notifications.

use chrono::{DateTime, Utc};

use notification_cell::EmailMessage;

use crate::models::{Booking, Participant};

pub const ACCEPT_ACTION: &str = "accept_booking";
pub const REJECT_ACTION: &str = "reject_booking";

/// Links embedded in the provider's request email.
pub struct ActionLinks {
    pub accept: String,
    pub reject: String,
}

impl ActionLinks {
    pub fn new(public_base_url: &str, accept_token: &str, reject_token: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            accept: format!("{}/api/v1/bookings/accept?token={}", base, urlencoding::encode(accept_token)),
            reject: format!("{}/api/v1/bookings/reject?token={}", base, urlencoding::encode(reject_token)),
        }
    }
}

fn when(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| t.format("%A, %B %-d %Y at %H:%M UTC").to_string())
        .unwrap_or_else(|| "a time to be confirmed".to_string())
}

fn or_blank(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

pub fn care_request(
    subject: &str,
    booking: &Booking,
    provider: &Participant,
    patient: &Participant,
    patient_address: Option<&str>,
    links: &ActionLinks,
) -> EmailMessage {
    let body = format!(
        "Hello {provider},\n\n\
         {patient} has requested a visit on {when}.\n\n\
         Age of patient: {age}\n\
         Zip code: {zip}\n\
         Address: {address}\n\
         Symptoms: {symptom}\n\n\
         Accept this request: {accept}\n\
         Reject this request: {reject}\n",
        provider = provider.full_name(),
        patient = patient.full_name(),
        when = when(booking.date_time_of_care),
        age = booking.age_of_patient.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
        zip = or_blank(&booking.zipcode),
        address = patient_address.unwrap_or("-"),
        symptom = or_blank(&booking.symptom),
        accept = links.accept,
        reject = links.reject,
    );

    EmailMessage::new(&provider.email, subject, body)
}

pub fn booking_confirmed(booking: &Booking, provider: &Participant, patient: &Participant) -> EmailMessage {
    let body = format!(
        "Hello {patient},\n\n\
         {provider} has confirmed your visit on {when}.\n",
        patient = patient.full_name(),
        provider = provider.full_name(),
        when = when(booking.date_time_of_care),
    );

    EmailMessage::new(&patient.email, "Booking Request Confirmed", body).with_bcc(&provider.email)
}

pub fn booking_rejected(booking: &Booking, provider: &Participant, patient: &Participant) -> EmailMessage {
    let body = format!(
        "Hello {patient},\n\n\
         Your visit request for {when} could not be accepted.\n\
         Reason: {reason}\n\n\
         You can reschedule the booking from your dashboard.\n",
        patient = patient.full_name(),
        when = when(booking.date_time_of_care),
        reason = or_blank(&booking.reason),
    );

    EmailMessage::new(&patient.email, "Booking Request Rejected", body).with_bcc(&provider.email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingStatus;
    use chrono::TimeZone;

    fn participant(email: &str, first: &str) -> Participant {
        Participant {
            id: format!("id-{}", first),
            email: email.to_string(),
            first_name: Some(first.to_string()),
            last_name: Some("Doe".to_string()),
            phone_number: None,
            photo_url: None,
        }
    }

    fn booking() -> Booking {
        Booking {
            id: "booking-1".to_string(),
            patient_id: "id-Jane".to_string(),
            practitioner_id: Some("id-Greg".to_string()),
            symptom: Some("Cough".to_string()),
            date_care_is_needed: None,
            age_of_patient: Some(34),
            zipcode: Some("30301".to_string()),
            status: BookingStatus::Pending,
            date_time_of_care: Some(Utc.with_ymd_and_hms(2030, 3, 4, 9, 0, 0).unwrap()),
            reason: None,
            eta: None,
            created_at: Utc.with_ymd_and_hms(2030, 3, 1, 9, 0, 0).unwrap(),
            updated_at: None,
        }
    }

    #[test]
    fn links_carry_encoded_tokens() {
        let links = ActionLinks::new("https://api.example.com/", "a.b+c", "x.y");
        assert_eq!(links.accept, "https://api.example.com/api/v1/bookings/accept?token=a.b%2Bc");
        assert_eq!(links.reject, "https://api.example.com/api/v1/bookings/reject?token=x.y");
    }

    #[test]
    fn request_email_goes_to_provider_with_links() {
        let links = ActionLinks::new("https://api.example.com", "yes", "no");
        let message = care_request(
            "Inhouse Visit Booking Request",
            &booking(),
            &participant("greg@example.com", "Greg"),
            &participant("jane@example.com", "Jane"),
            Some("12 main street"),
            &links,
        );

        assert_eq!(message.to, vec!["greg@example.com"]);
        assert!(message.body.contains("Jane Doe has requested a visit on Monday, March 4 2030 at 09:00 UTC"));
        assert!(message.body.contains("accept?token=yes"));
    }

    #[test]
    fn confirmation_copies_provider() {
        let message = booking_confirmed(
            &booking(),
            &participant("greg@example.com", "Greg"),
            &participant("jane@example.com", "Jane"),
        );

        assert_eq!(message.to, vec!["jane@example.com"]);
        assert_eq!(message.bcc, vec!["greg@example.com"]);
    }
}
