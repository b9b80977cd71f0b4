//! Unit tests for the `pricebox` CLI configuration and offline commands.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;
