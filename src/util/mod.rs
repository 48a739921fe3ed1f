//! Utility functions shared by the fetch, extract and dedup stages.
//!
//! - **URL helpers**: SSRF validation for new feed sources, scheme-insensitive
//!   link keys for deduplication, and protocol-only redirect detection
//! - **Text processing**: markup stripping for synopses and blank checks
//!
//! # Examples
//!
//! ```
//! use feedcrawl::util::{is_protocol_change, link_key, same_location, strip_markup};
//!
//! assert_eq!(link_key("https://example.com/a"), link_key("http://example.com/a"));
//! assert!(is_protocol_change("http://example.com/feed", "https://example.com/feed"));
//! assert!(same_location("https://example.com", "https://example.com/"));
//! assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
//! ```

mod text;
mod links;

pub use text::{collapse_whitespace, non_blank, strip_markup};
pub use links::{
    is_protocol_change, link_key, same_location, scheme_variants, validate_url, UrlValidationError,
};
