//! Identifiers for persisted entities.
//!
//! Numeric database keys use the `define_id!` macro so IDs from different
//! tables cannot be mixed up. Loan applications use [`ApplicationId`], a
//! short human-readable number derived from a random UUID.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper around `i32`.
///
/// The generated type is `Copy`, serialises transparently, and (with the
/// `postgres` feature) binds directly as an `INT4` column.
///
/// ```rust
/// # use bluelender_core::define_id;
/// define_id!(WidgetId);
///
/// let id = WidgetId::new(7);
/// assert_eq!(id.as_i32(), 7);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <i32 as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <i32 as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <i32 as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(AdminUserId);
define_id!(RecipientId);
define_id!(FailedEmailId);

/// Lowest application number.
const APPLICATION_ID_MIN: u32 = 100_000;
/// Size of the application number space (`100000..=999999`).
const APPLICATION_ID_SPAN: u32 = 900_000;

/// Error returned when a string is not a valid application ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("application id must be a 6-digit number between 100000 and 999999, got {0:?}")]
pub struct InvalidApplicationId(pub String);

/// Human-readable loan application number.
///
/// Always six decimal digits in `100000..=999999`. Generated values are
/// uniformly spread over 900 000 numbers and are *not* guaranteed unique;
/// the persistence layer tolerates collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationId(String);

impl ApplicationId {
    /// Draw a new application ID.
    ///
    /// Takes the first six hex digits of a random v4 UUID (its first three
    /// bytes) and maps them into range with `100000 + (value mod 900000)`.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_uuid(Uuid::new_v4())
    }

    /// Derive the application ID for a given UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        let [a, b, c, ..] = *uuid.as_bytes();
        let prefix = u32::from_be_bytes([0, a, b, c]);
        let value = APPLICATION_ID_MIN + prefix % APPLICATION_ID_SPAN;
        Self(value.to_string())
    }

    /// Parse an existing application ID.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidApplicationId`] unless the input is exactly six ASCII
    /// digits without a leading zero.
    pub fn parse(s: &str) -> Result<Self, InvalidApplicationId> {
        let trimmed = s.trim();
        let valid = trimmed.len() == 6
            && trimmed.bytes().all(|b| b.is_ascii_digit())
            && !trimmed.starts_with('0');
        if valid {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(InvalidApplicationId(s.to_owned()))
        }
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ApplicationId {
    type Err = InvalidApplicationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ApplicationId {
    type Error = InvalidApplicationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ApplicationId> for String {
    fn from(id: ApplicationId) -> Self {
        id.0
    }
}
