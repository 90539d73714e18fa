//! Tower middleware for the gateway.
//!
//! Execution order, outermost first:
//!
//! ```text
//! Cors → TraceLayer → MetricsMiddleware → IdentityMiddleware → Handler
//! ```
//!
//! Health probes bypass everything except CORS.

pub mod metrics;
pub mod tracing_layer;
