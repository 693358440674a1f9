// KLVE - JavaScript Execution Tracer
// Copyright (C) 2025 The KLVE authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Logging configuration for KLVE components.
//!
//! Host processes embedding the tracer call [`init_logging`] once at
//! startup; tests call [`ensure_test_logging`] at their top, which is
//! idempotent across the whole test binary.

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize console logging with `RUST_LOG` support, falling back to
/// the given default level. Safe to call more than once; only the first
/// call installs a subscriber.
pub fn init_logging(default_level: Level) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
        let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    });
}

/// Initialize logging for tests. Output is captured per test, and the
/// subscriber is installed at most once per binary.
pub fn ensure_test_logging(level: Option<Level>) {
    INIT.call_once(|| {
        let level = level.unwrap_or(Level::DEBUG);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
