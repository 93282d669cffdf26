//! Code motion for rcm IR.
//!
//! Moves instructions between blocks to remove duplicated work and
//! redundant reference-count traffic:
//!
//! - **Sinking** ([`sink`]): identical instructions at the end of every
//!   predecessor, block arguments computed the same way in every
//!   predecessor, and literal arguments are moved into the merge block.
//!
//! - **Retain/release motion** ([`rc_motion`]): retains are sunk toward
//!   their uses and across branches, narrowed to the payload across a
//!   `switch_enum`; releases are hoisted into predecessors that hold a
//!   matching retain.
//!
//! - **Enum-tag dataflow** ([`enum_dataflow`]): tracks the known case of
//!   enum values and narrows `retain_value`/`release_value` of them to the
//!   payload, including across the exit of a switch region.
//!
//! [`run_code_motion`] drives all of them over one function.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=rcm_opt=debug`: One event per rewrite and a summary per
//!   function.
//! - `RUST_LOG=rcm_opt=trace`: Also the reasons rewrites were skipped.
//! - `RCM_RR_CODE_MOTION=1`: Enable local retain/release motion when the
//!   configuration is built with [`CodeMotionConfig::from_env`].

pub mod analysis;
pub mod canonicalize;
mod config;
mod context;
mod driver;
pub mod enum_dataflow;
pub mod matcher;
pub mod rc_motion;
pub mod root;
pub mod sink;
mod stats;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use config::{CodeMotionConfig, ConfigError, Variant};
pub use context::PassContext;
pub use driver::{run_code_motion, run_code_motion_with};
pub use stats::{CodeMotionOutcome, CodeMotionStats, Invalidation};

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Nothing is installed when `RUST_LOG` is unset or unparsable, or when the
/// host already installed a subscriber. Output goes through the test writer
/// so `cargo test` captures it per test. Later calls do nothing.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let Ok(filter) = EnvFilter::try_from_default_env() else {
            return;
        };
        let layer = fmt::layer().with_test_writer().with_target(true);
        if tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("subscriber already installed, keeping it");
        }
    });
}
