//! Shared test harness modules for the osc-trim CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;
use crate::trim::{
    Endpoint, PostgresTarget, RegionSource, StoreSource, TrimConfig, config_from_layers_for_test,
    execute_trim, resolve_region, resolve_trim_config,
};

mod helpers;
