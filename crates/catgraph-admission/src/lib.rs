//! # catgraph-admission: Field Admission Control
//!
//! Every field resolution in the catgraph query graph passes through this
//! crate before its real resolver runs. Admission answers three questions,
//! in the order the field's rule tree asks them:
//!
//! 1. **Who is calling?** [`identity`] turns a bearer token into an
//!    immutable [`IdentityContext`] once per request.
//! 2. **Are they over budget?** [`limiter`] keeps a fixed-window counter
//!    per `(identity, field path)` pair.
//! 3. **Are they allowed?** [`engine`] walks the field's [`RuleNode`] tree,
//!    combining limiter decisions with role and ownership predicates.
//!
//! [`gate`] ties these together: it wraps a resolver future and only polls
//! it when the verdict is `Allow`. Policies are loaded once at startup by
//! [`policy`] and are read-only afterwards.
//!
//! ## Crate Policy
//!
//! - No I/O beyond the single identity lookup in [`identity`].
//! - The identity context is passed explicitly; nothing here stores
//!   per-request state in shared memory.
//! - The limiter table is the only shared mutable state. Its read-modify-write
//!   runs under a per-key entry guard and never spans an `.await`.

pub mod engine;
pub mod error;
pub mod gate;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod policy;
pub mod rule;

pub use engine::RuleEngine;
pub use error::{ConfigurationError, Denial, DenialKind, IdentityLookupError};
pub use gate::{GateError, ResolverGate};
pub use identity::{IdentityContext, IdentityProvider, IdentityResolver, UpstreamIdentity};
pub use limiter::{LimitDecision, LimitKey, LimiterConfig, WindowLimiter};
pub use metrics::{AdmissionMetrics, AdmissionSnapshot};
pub use policy::{FieldPath, FieldPolicy, PolicySet};
pub use rule::{DenyReason, RuleNode, Verdict};
