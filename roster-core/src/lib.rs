//! Roster Core - Person Entity and Wire Codec
//!
//! Pure data types shared by every roster crate: the `Person` entity, its
//! JSON wire form, field validation and the error taxonomy.

mod error;

pub use error::*;

use serde::{Deserialize, Serialize};

// ============================================================================
// LIMITS
// ============================================================================

/// Maximum length of a login (primary key column width).
pub const MAX_LOGIN_LEN: usize = 50;

/// Maximum length of a first or last name.
pub const MAX_NAME_LEN: usize = 256;

// ============================================================================
// PERSON
// ============================================================================

/// The single entity kept consistent across store, cache and change stream.
///
/// The serialized field names are a fixed wire contract shared with other
/// consumers of the cache and the change stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier; cache key and lookup key.
    pub login: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
}

impl Person {
    pub fn new(
        login: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: i32,
    ) -> Self {
        Self {
            login: login.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
        }
    }

    /// Check the entity against the store column constraints.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.login.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "login".to_string(),
            });
        }
        check_len("login", &self.login, MAX_LOGIN_LEN)?;
        check_len("first_name", &self.first_name, MAX_NAME_LEN)?;
        check_len("last_name", &self.last_name, MAX_NAME_LEN)?;
        Ok(())
    }

    /// Encode as the JSON wire form.
    pub fn to_json(&self) -> RosterResult<String> {
        serde_json::to_string(self).map_err(|e| {
            SerializationError::Encode {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Encode as JSON bytes, the payload format of the change stream.
    pub fn to_json_bytes(&self) -> RosterResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            SerializationError::Encode {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Decode from the JSON wire form.
    ///
    /// Missing fields or mistyped values fail; unknown fields are ignored.
    pub fn from_json(raw: &str) -> RosterResult<Self> {
        serde_json::from_str(raw).map_err(|e| {
            SerializationError::Decode {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Decode from JSON bytes.
    pub fn from_json_bytes(raw: &[u8]) -> RosterResult<Self> {
        serde_json::from_slice(raw).map_err(|e| {
            SerializationError::Decode {
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
            len,
        });
    }
    Ok(())
}

// ============================================================================
// SEARCH FILTER
// ============================================================================

/// Name filter for pattern searches against the store of record.
///
/// Each pattern is a substring match; an absent or empty pattern matches
/// every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NameFilter {
    pub fn new(first_name: Option<&str>, last_name: Option<&str>) -> Self {
        Self {
            first_name: first_name.map(str::to_string),
            last_name: last_name.map(str::to_string),
        }
    }

    /// Filter that matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// LIKE pattern for the first name column.
    pub fn first_name_pattern(&self) -> String {
        like_pattern(self.first_name.as_deref())
    }

    /// LIKE pattern for the last name column.
    pub fn last_name_pattern(&self) -> String {
        like_pattern(self.last_name.as_deref())
    }

    /// Evaluate the filter in memory with the same semantics the SQL store
    /// applies (case-insensitive LIKE).
    pub fn matches(&self, person: &Person) -> bool {
        like_matches(&self.first_name_pattern(), &person.first_name)
            && like_matches(&self.last_name_pattern(), &person.last_name)
    }
}

fn like_pattern(fragment: Option<&str>) -> String {
    format!("%{}%", fragment.unwrap_or(""))
}

/// Case-insensitive SQL `LIKE` matching: `%` matches any run of characters,
/// `_` matches exactly one.
pub fn like_matches(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '%')
}
