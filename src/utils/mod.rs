//! Utility helpers exposed alongside the store
//!
//! - [`jwt`] - token payload decoding and expiry checks
//! - [`strings`] - case conversion, path trimming and map merging
//! - [`logging`] - shared log lines

pub mod jwt;
pub mod logging;
pub mod strings;

pub use jwt::{decode_token_payload, token_exp, token_is_expired};
pub use strings::{camel_case_to_snake_case, first_letter_uppercase, object_assign};
