//! Macro for implementing Display and FromStr for keyword enums
//!
//! Listener kinds, signal names and similar small enums are spelled the same
//! way in configuration, logs and error messages. This macro keeps the
//! mapping in one place.
//!
//! # Example
//!
//! ```rust
//! use tokenkeeper_domain::impl_keyword_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Output {
//!     Socket,
//!     File,
//! }
//!
//! impl_keyword_conversions!(Output {
//!     Socket => "socket",
//!     File => "file",
//! });
//! ```

/// Implements Display and FromStr traits for keyword enums
///
/// - Display writes the keyword
/// - FromStr parses the keyword case-insensitively
#[macro_export]
macro_rules! impl_keyword_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
