use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A phone number valid in the Russian numbering plan, kept in E.164 form
/// (`+7` followed by ten national digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number contains invalid characters")]
    InvalidCharacters,
    #[error("phone number must have 10 national digits after +7 or 8")]
    InvalidLength,
    #[error("phone number is not in a recognised area range")]
    UnknownRange,
}

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, PhoneError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(raw.len());
        for (i, ch) in raw.char_indices() {
            match ch {
                '0'..='9' => digits.push(ch),
                '+' if i == 0 => {}
                ' ' | '-' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        let national = match (raw.starts_with('+'), digits.len()) {
            (true, 11) if digits.starts_with('7') => &digits[1..],
            (false, 11) if digits.starts_with('7') || digits.starts_with('8') => &digits[1..],
            _ => return Err(PhoneError::InvalidLength),
        };

        // 3xx/4xx geographic, 8xx non-geographic, 9xx mobile.
        match national.as_bytes()[0] {
            b'3' | b'4' | b'8' | b'9' => Ok(Self(format!("+7{national}"))),
            _ => Err(PhoneError::UnknownRange),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
