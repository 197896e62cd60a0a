//! `scrib-store` — per-guild SQLite storage.
//!
//! # Overview
//!
//! Every guild gets its own database file under a configured root directory,
//! created lazily on first access and schema-initialised before any read or
//! write touches it. All access goes through [`manager::StoreManager`], which
//! opens a short-lived connection per call and releases it on every exit
//! path, including unwinds.
//!
//! # Tables
//!
//! | Table                     | Contents                                    |
//! |---------------------------|---------------------------------------------|
//! | `options`                 | per-guild feature configuration (name/value)|
//! | `quotes`                  | recorded member quotes                      |
//! | `jobs`                    | persisted recurring job definitions         |
//! | `progress_report_windows` | submission windows (start + duration)       |
//! | `progress_reports`        | per-user submissions within a window        |
//! | `ranks`                   | word-count thresholds mapped to roles       |
//! | `wt_subscribers`          | word-tracker goals and daily progress       |
//! | `currencies` & friends    | guild currencies, balances, redemptions     |

pub mod currency;
pub mod error;
pub mod jobs;
pub mod manager;
pub mod options;
pub mod quotes;
pub mod ranks;
pub mod reports;
mod row;
pub mod schema;
pub mod tracker;
pub mod windows;

pub use error::{Result, StoreError};
pub use manager::StoreManager;
