//! Student identity and profile.

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Maximum length for first and last names.
pub const NAME_MAX: usize = 100;
/// Maximum length for an email address.
pub const EMAIL_MAX: usize = 254;

/// Validation errors raised while building student values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StudentValidationError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email must be a valid address")]
    InvalidEmail,
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    NameTooLong { field: &'static str, max: usize },
    #[error("phone must contain 7 to 20 digits, spaces, dashes or a leading plus")]
    InvalidPhone,
    #[error("preferences must be a JSON object")]
    InvalidPreferences,
}

/// Stable student identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(Uuid);

impl StudentId {
    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static PHONE_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

fn phone_regex() -> &'static Regex {
    PHONE_RE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$")
            .unwrap_or_else(|error| panic!("phone regex failed to compile: {error}"))
    })
}

/// Lower-cased email address used as the student's natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalise an email address.
    ///
    /// # Examples
    /// ```
    /// use learning_platform::domain::EmailAddress;
    ///
    /// let email = EmailAddress::new(" Ada@Example.COM ").expect("valid email");
    /// assert_eq!(email.as_ref(), "ada@example.com");
    /// ```
    pub fn new(raw: impl AsRef<str>) -> Result<Self, StudentValidationError> {
        let normalised = raw.as_ref().trim().to_lowercase();
        if normalised.is_empty() {
            return Err(StudentValidationError::EmptyEmail);
        }
        if normalised.len() > EMAIL_MAX || !email_regex().is_match(&normalised) {
            return Err(StudentValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = StudentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

fn validate_name(value: String, field: &'static str) -> Result<String, StudentValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StudentValidationError::EmptyName { field });
    }
    if trimmed.chars().count() > NAME_MAX {
        return Err(StudentValidationError::NameTooLong {
            field,
            max: NAME_MAX,
        });
    }
    Ok(trimmed.to_owned())
}

/// Unvalidated student input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub preferences: Option<Value>,
}

/// Registered student.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    id: StudentId,
    email: EmailAddress,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    preferences: Value,
    created_at: DateTime<Utc>,
}

impl Student {
    /// Validate a draft into a new student with a fresh identifier.
    pub fn register(draft: StudentDraft, now: DateTime<Utc>) -> Result<Self, StudentValidationError> {
        Self::restore(StudentId::random(), draft, now)
    }

    /// Rebuild a student from persisted fields.
    pub fn restore(
        id: StudentId,
        draft: StudentDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudentValidationError> {
        let StudentDraft {
            email,
            first_name,
            last_name,
            phone,
            preferences,
        } = draft;

        let phone = match phone.map(|p| p.trim().to_owned()) {
            Some(p) if p.is_empty() => None,
            Some(p) if !phone_regex().is_match(&p) => {
                return Err(StudentValidationError::InvalidPhone);
            }
            other => other,
        };
        let preferences = match preferences {
            None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
            Some(value @ Value::Object(_)) => value,
            Some(_) => return Err(StudentValidationError::InvalidPreferences),
        };

        Ok(Self {
            id,
            email: EmailAddress::new(email)?,
            first_name: validate_name(first_name, "first_name")?,
            last_name: validate_name(last_name, "last_name")?,
            phone,
            preferences,
            created_at,
        })
    }

    pub fn id(&self) -> StudentId {
        self.id
    }

    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// First and last name joined by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn preferences(&self) -> &Value {
        &self.preferences
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
