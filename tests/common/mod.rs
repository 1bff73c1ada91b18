//! Shared helpers for the integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use taskdatalib::{Configuration, Env, Filter, Session};

/// A fixed "now": Monday 2024-01-22, 08:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 22, 8, 0, 0).unwrap()
}

/// A loaded session over `dir` with the clock pinned to `now`.
pub fn session_at(dir: &TempDir, now: DateTime<Utc>) -> Session {
    let mut config = Configuration::default();
    config.data_dir = dir.path().to_path_buf();
    let mut session = Session::new(Env::at(config, now));
    session.load().expect("load");
    session
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn filter(list: &[&str]) -> Filter {
    Filter::parse(&args(list)).expect("filter")
}
