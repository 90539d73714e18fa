//! # Field-Resolution Graph
//!
//! The gateway's query surface. Clients post a [`QueryDocument`] naming the
//! root fields they want (`Query.*` or `Mutation.*`) plus optional child
//! selections on returned cats. Each field resolution is admitted by the
//! [`catgraph_admission::ResolverGate`] before its resolver runs.

pub mod executor;
pub mod registry;
pub mod request;
pub mod response;

pub use executor::{execute, plan};
pub use registry::{FieldDef, FieldRegistry, OperationKind, ResolveCtx, ReturnShape};
pub use request::{QueryDocument, Selection};
pub use response::{FieldError, GraphResponse, PathSegment};
