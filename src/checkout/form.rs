//! Checkout form validation.

use crate::backend::Payer;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid CPF")]
    InvalidCpf,
}

/// Raw form input as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cpf: String,
}

impl CheckoutForm {
    /// Trim and validate into a [`Payer`].
    ///
    /// # Errors
    ///
    /// Returns the first failing field.
    pub fn validate(&self) -> Result<Payer, FormError> {
        let first_name = required(&self.first_name, "first name")?;
        let last_name = required(&self.last_name, "last name")?;
        let email = required(&self.email, "email")?;
        if !is_plausible_email(&email) {
            return Err(FormError::InvalidEmail);
        }
        let cpf = required(&self.cpf, "CPF")?;
        let cpf = normalize_cpf(&cpf).ok_or(FormError::InvalidCpf)?;
        Ok(Payer { first_name, last_name, email: email.to_ascii_lowercase(), cpf })
    }
}

fn required(value: &str, field: &'static str) -> Result<String, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() { Err(FormError::Required(field)) } else { Ok(trimmed.to_string()) }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Strip `.`/`-` punctuation and verify both CPF check digits.
/// Returns the 11 digits on success.
#[must_use]
pub fn normalize_cpf(raw: &str) -> Option<String> {
    let mut digits = Vec::with_capacity(11);
    for c in raw.chars() {
        match c {
            '0'..='9' => digits.push(c as u32 - '0' as u32),
            '.' | '-' | ' ' => {}
            _ => return None,
        }
    }
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return None;
    }
    if check_digit(&digits[..9]) != digits[9] || check_digit(&digits[..10]) != digits[10] {
        return None;
    }
    Some(digits.iter().map(|d| char::from_digit(*d, 10).unwrap_or('0')).collect())
}

fn check_digit(digits: &[u32]) -> u32 {
    let weight_start = u32::try_from(digits.len()).unwrap_or(0) + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=weight_start).rev())
        .map(|(d, w)| d * w)
        .sum();
    let rest = (sum * 10) % 11;
    if rest == 10 { 0 } else { rest }
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
