//! Macro for implementing Display and FromStr for label enums
//!
//! Configuration values such as service presets and error kinds are read
//! from environment variables and written to logs as short lowercase labels.
//! This macro keeps both directions in one table.
//!
//! # Example
//!
//! ```rust
//! use zsdk_domain::impl_label_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Flavor {
//!     Primary,
//!     Beta,
//! }
//!
//! impl_label_conversions!(Flavor {
//!     Primary => "primary",
//!     Beta => "beta",
//! });
//! ```

/// Implements Display and FromStr traits for label enums
///
/// - Display writes the mapped label
/// - FromStr parses case-insensitively and names the enum in its error
#[macro_export]
macro_rules! impl_label_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
