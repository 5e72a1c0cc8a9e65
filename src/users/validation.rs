use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date, OffsetDateTime};

use crate::users::errors::{FieldError, FieldErrors};
use crate::users::repo_types::NewUser;

pub const MIN_NAME_LEN: usize = 2;
pub const MIN_AGE_YEARS: i32 = 16;

/// Unvalidated user fields as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"
        )
        .unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_birth_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Whole years elapsed between `birth` and `today`.
pub fn age_on(birth: Date, today: Date) -> i32 {
    let mut age = today.year() - birth.year();
    if (u8::from(today.month()), today.day()) < (u8::from(birth.month()), birth.day()) {
        age -= 1;
    }
    age
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks a record against the current UTC date.
pub fn validate(record: &UserRecord) -> Vec<FieldError> {
    validate_at(record, OffsetDateTime::now_utc().date())
}

pub fn validate_at(record: &UserRecord, today: Date) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match present(&record.name) {
        None => errors.push(FieldError::new("name", "name is required")),
        Some(name) if name.chars().count() < MIN_NAME_LEN => {
            errors.push(FieldError::new("name", "name must be at least 2 characters"))
        }
        Some(_) => {}
    }

    match present(&record.email) {
        None => errors.push(FieldError::new("email", "email is required")),
        Some(email) if !is_valid_email(email) => {
            errors.push(FieldError::new("email", "invalid email"))
        }
        Some(_) => {}
    }

    if let Some(phone) = present(&record.phone) {
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if !(10..=11).contains(&digits) {
            errors.push(FieldError::new(
                "phone",
                "invalid phone, use the format (DD) 9XXXX-XXXX",
            ));
        }
    }

    if let Some(raw) = present(&record.birth_date) {
        match parse_birth_date(raw) {
            None => errors.push(FieldError::new("birthDate", "invalid birth date")),
            Some(birth) if birth > today => errors.push(FieldError::new(
                "birthDate",
                "birth date cannot be in the future",
            )),
            Some(birth) if age_on(birth, today) < MIN_AGE_YEARS => {
                errors.push(FieldError::new("birthDate", "minimum age is 16"))
            }
            Some(_) => {}
        }
    }

    errors
}

/// Validates `record` and builds the normalized write payload from it.
pub fn validated(record: &UserRecord) -> Result<NewUser, FieldErrors> {
    let errors = FieldErrors::from(validate(record));
    if !errors.is_empty() {
        return Err(errors);
    }
    match (present(&record.name), present(&record.email)) {
        (Some(name), Some(email)) => Ok(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            phone: present(&record.phone).map(str::to_string),
            birth_date: present(&record.birth_date).and_then(parse_birth_date),
        }),
        _ => Err(FieldErrors::single("name", "name is required")),
    }
}
