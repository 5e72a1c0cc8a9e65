use serde::Serialize;
use sqlx::FromRow;
use time::{macros::format_description, Date, OffsetDateTime};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// User record in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(with = "iso_date::option")]
    pub birth_date: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Birth date as `dd/mm/yyyy`, or `N/A` when none is stored.
    pub fn birth_date_formatted(&self) -> String {
        let fmt = format_description!("[day]/[month]/[year]");
        self.birth_date
            .and_then(|d| d.format(fmt).ok())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Validated field set written by insert and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub birth_date: Option<Date>,
}
