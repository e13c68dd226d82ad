//! Database models
//!
//! Enumerated columns are stored as their short TEXT codes (`"Stu"`,
//! `"Active"`, ...) and travel through the JSON API unchanged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Weekday letters accepted in a course schedule, Monday first
pub const COURSE_DAY_LETTERS: &str = "MTWRFSU";

macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            /// Code stored in the database
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($code => Ok($name::$variant),)+
                    other => Err(Error::InvalidInput(format!(
                        concat!("Unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Academy discipline
    AcademyType {
        Mma => "MMA",
        General => "General",
    }
);

text_enum!(
    /// Member role within an academy
    MemberType {
        Student => "Stu",
        Instructor => "Inst",
        Other => "Other",
    }
);

text_enum!(
    /// Membership status
    MemberStatus {
        Active => "Active",
        Inactive => "Inactive",
        Hold => "Hold",
    }
);

text_enum!(
    Gender {
        Male => "M",
        Female => "F",
    }
);

impl Default for AcademyType {
    fn default() -> Self {
        AcademyType::General
    }
}

impl Default for MemberType {
    fn default() -> Self {
        MemberType::Student
    }
}

impl Default for MemberStatus {
    fn default() -> Self {
        MemberStatus::Active
    }
}

/// Normalize a course schedule such as `"mwf"` to `"MWF"`
///
/// Letters must come from [`COURSE_DAY_LETTERS`], may not repeat, and at least
/// one day is required. Output is in Monday-first order.
pub fn normalize_course_days(days: &str) -> Result<String> {
    let upper: Vec<char> = days
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if upper.is_empty() {
        return Err(Error::InvalidInput("Course needs at least one day".to_string()));
    }

    for (i, c) in upper.iter().enumerate() {
        if !COURSE_DAY_LETTERS.contains(*c) {
            return Err(Error::InvalidInput(format!(
                "Invalid course day '{}', use letters from {}",
                c, COURSE_DAY_LETTERS
            )));
        }
        if upper[..i].contains(c) {
            return Err(Error::InvalidInput(format!("Course day '{}' repeated", c)));
        }
    }

    Ok(COURSE_DAY_LETTERS
        .chars()
        .filter(|c| upper.contains(c))
        .collect())
}

/// Postal address of an academy or member
///
/// Only `city` and `state` are required. `state` is a two-letter postal code
/// and `zip` a five-digit ZIP code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(default)]
    pub zip: Option<String>,
}

impl Address {
    /// Trimmed and checked copy, with `state` upper-cased
    pub fn validated(&self) -> Result<Self> {
        let street = self
            .street
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if street.as_ref().is_some_and(|s| s.chars().count() > 50) {
            return Err(Error::InvalidInput(
                "Street must be at most 50 characters".to_string(),
            ));
        }

        let city = self.city.trim();
        if city.is_empty() || city.chars().count() > 20 {
            return Err(Error::InvalidInput(
                "City is required and must be at most 20 characters".to_string(),
            ));
        }

        let state = self.state.trim().to_ascii_uppercase();
        if state.len() != 2 || !state.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(Error::InvalidInput(format!(
                "State must be a two-letter code: '{}'",
                self.state
            )));
        }

        let zip = self
            .zip
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .map(str::to_string);
        if let Some(zip) = &zip {
            if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::InvalidInput(format!("Invalid ZIP code: '{}'", zip)));
            }
        }

        Ok(Address {
            street,
            city: city.to_string(),
            state,
            zip,
        })
    }
}
