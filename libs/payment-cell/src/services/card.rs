use chrono::{Datelike, NaiveDate};

use crate::models::{PaymentError, SaveCardRequest};

pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (position, c) in digits.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

/// `MM/YYYY`, valid through the end of that month.
pub fn parse_expiry(raw: &str, today: NaiveDate) -> Result<(u32, i32), PaymentError> {
    let invalid = || PaymentError::InvalidCard("card_expiry_date must be in MM/YYYY format".to_string());

    let (month, year) = raw.trim().split_once('/').ok_or_else(invalid)?;
    if month.len() != 2 || year.len() != 4 {
        return Err(invalid());
    }
    let month: u32 = month.parse().map_err(|_| invalid())?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    if (year, month) < (today.year(), today.month()) {
        return Err(PaymentError::InvalidCard("card has expired".to_string()));
    }
    Ok((month, year))
}

/// Card fields that leave this process only towards Stripe.
pub struct CardDetails {
    pub number: String,
    pub exp_month: u32,
    pub exp_year: i32,
    pub cvc: String,
}

impl CardDetails {
    pub fn from_request(request: &SaveCardRequest, today: NaiveDate) -> Result<Self, PaymentError> {
        let number: String = request
            .card_number
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if !(13..=19).contains(&number.len()) || !number.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCard("card_number must be 13 to 19 digits".to_string()));
        }
        if !luhn_valid(&number) {
            return Err(PaymentError::InvalidCard("card_number is not valid".to_string()));
        }

        let (exp_month, exp_year) = parse_expiry(&request.card_expiry_date, today)?;

        let cvc = request.cvc.trim().to_string();
        if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCard("cvc must be 3 or 4 digits".to_string()));
        }

        Ok(Self {
            number,
            exp_month,
            exp_year,
            cvc,
        })
    }

    pub fn last4(&self) -> &str {
        &self.number[self.number.len() - 4..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn request(number: &str, expiry: &str, cvc: &str) -> SaveCardRequest {
        SaveCardRequest {
            cardholder_name: "Jane Doe".to_string(),
            card_number: number.to_string(),
            card_type: "visa".to_string(),
            city: "Atlanta".to_string(),
            state: "GA".to_string(),
            zip_code: "30301".to_string(),
            card_expiry_date: expiry.to_string(),
            cvc: cvc.to_string(),
            billing_address: "12 Main Street".to_string(),
        }
    }

    #[test]
    fn luhn_accepts_test_numbers() {
        assert!(luhn_valid("4242424242424242"));
        assert!(luhn_valid("5555555555554444"));
        assert!(!luhn_valid("4242424242424241"));
    }

    #[test]
    fn expiry_month_is_inclusive() {
        assert_eq!(parse_expiry("10/2026", today()).unwrap(), (10, 2026));
        assert!(matches!(parse_expiry("09/2026", today()), Err(PaymentError::InvalidCard(m)) if m == "card has expired"));
        assert!(parse_expiry("13/2027", today()).is_err());
        assert!(parse_expiry("1/27", today()).is_err());
    }

    #[test]
    fn normalizes_spaced_number() {
        let card = CardDetails::from_request(&request("4242 4242 4242 4242", "12/2030", "123"), today()).unwrap();
        assert_eq!(card.number, "4242424242424242");
        assert_eq!(card.last4(), "4242");
    }

    #[test]
    fn rejects_bad_cvc() {
        let result = CardDetails::from_request(&request("4242424242424242", "12/2030", "12a"), today());
        assert!(matches!(result, Err(PaymentError::InvalidCard(_))));
    }
}
