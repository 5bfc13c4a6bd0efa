//! Shared test harness modules for the geosync CLI.

use super::*;

mod helpers;
