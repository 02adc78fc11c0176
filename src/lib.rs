//! Stayharvest, an adaptive hotel-listing harvester.
//!
//! Drives a headless Chromium session through a paginated listing site,
//! intercepts the underlying JSON data responses over CDP, extracts
//! validated records, and appends them to a CSV file until pagination is
//! confirmed exhausted.
//!
//! This library crate exposes the core modules for integration testing.

pub mod browser;
pub mod config;
pub mod events;
pub mod extract;
pub mod harvest;
pub mod sink;
