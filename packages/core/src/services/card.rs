//! Basic card detail checks run before card details are handed to the
//! payment processor. Formatting for display is left to the caller.

use chrono::{Datelike, NaiveDate, Utc};
use thiserror::Error;

pub const CARD_NUMBER_LENGTH: (usize, usize) = (13, 19);
pub const CVV_LENGTH: (usize, usize) = (3, 4);

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    #[error("Invalid card number length")]
    NumberLength,

    #[error("Invalid expiry format")]
    ExpiryFormat,

    #[error("Invalid expiry month")]
    ExpiryMonth,

    #[error("Card has expired")]
    Expired,

    #[error("Invalid CVV")]
    Cvv,
}

/// Check card details against today's date. Every problem found is
/// reported, not only the first.
pub fn validate_card_details(number: &str, expiry: &str, cvv: &str) -> Result<(), Vec<CardError>> {
    validate_card_details_on(number, expiry, cvv, Utc::now().date_naive())
}

/// Same as [`validate_card_details`] with an explicit `today`.
///
/// `expiry` is `MM/YY`; a card is valid through the end of its expiry month.
pub fn validate_card_details_on(
    number: &str,
    expiry: &str,
    cvv: &str,
    today: NaiveDate,
) -> Result<(), Vec<CardError>> {
    let mut errors = Vec::new();

    let digits = number.chars().filter(|c| !c.is_whitespace()).count();
    if !(CARD_NUMBER_LENGTH.0..=CARD_NUMBER_LENGTH.1).contains(&digits) {
        errors.push(CardError::NumberLength);
    }

    match parse_expiry(expiry) {
        None => errors.push(CardError::ExpiryFormat),
        Some((month, year)) => {
            if !(1..=12).contains(&month) {
                errors.push(CardError::ExpiryMonth);
            }
            let current_year = (today.year() % 100) as u32;
            if year < current_year || (year == current_year && month < today.month()) {
                errors.push(CardError::Expired);
            }
        }
    }

    let cvv_len = cvv.chars().count();
    if !(CVV_LENGTH.0..=CVV_LENGTH.1).contains(&cvv_len) {
        errors.push(CardError::Cvv);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_expiry(expiry: &str) -> Option<(u32, u32)> {
    let (month, year) = expiry.trim().split_once('/')?;
    let month = month.trim().parse().ok()?;
    let year = year.trim().parse().ok()?;
    Some((month, year))
}
