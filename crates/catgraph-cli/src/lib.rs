//! # catgraph-cli: the `catgraph` Binary
//!
//! ## Subcommands
//!
//! - `catgraph serve`: run the gateway. Configuration comes from the
//!   environment (see `catgraph_api::config::GatewayConfig`); flags override.
//! - `catgraph policy check [PATH]`: load a policy document and report
//!   coverage against the gateway's fields.
//! - `catgraph policy show [PATH]`: print each guarded field and its rule.
//!
//! ## Exit Codes
//!
//! | Code | Meaning                                   |
//! |------|-------------------------------------------|
//! | 0    | Success                                   |
//! | 1    | Operational failure, or `--strict` issues |
//! | 2    | Policy configuration error                |

pub mod logging;
pub mod policy;
pub mod serve;

/// Exit code for an unusable policy document.
pub const EXIT_CONFIGURATION: u8 = 2;
