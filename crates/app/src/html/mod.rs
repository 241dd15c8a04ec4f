//! Embedded static HTML assets served by the dashboard server.
//!
//! The page is kept as a `&'static str` so it is bundled directly inside the
//! binary without filesystem lookups.

pub mod dashboard;
