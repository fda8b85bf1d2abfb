#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Trellis read path: answer graph queries from a normalized cache and say
//! exactly what is missing.
//!
//! Given a stored graph of entity data and a query, a read assembles the
//! requested subset, reports whether it is complete, and, when it is not,
//! produces a reduced query covering only the absent fields.
//!
//! Pipeline per read: compile → fetch → overlay → completeness check →
//! partition. Compilation happens once per [`read::OperationInstance`];
//! everything downstream is memoized per snapshot version inside the
//! [`snapshot::GraphSnapshot`] itself.

pub mod compile;
pub mod complete;
pub mod context;
pub mod dump;
pub mod error;
pub mod overlay;
pub mod partition;
pub mod read;
pub mod snapshot;
pub mod walk;

#[cfg(test)]
mod test_util;

pub use compile::{CompiledFieldNode, CompiledOperation, FieldId, Variables, compile};
pub use complete::{Completeness, check};
pub use context::{CacheContext, IdFieldContext, TYPENAME_KEY};
pub use dump::dump_operation;
pub use error::{Error, Result};
pub use overlay::overlay;
pub use partition::partition;
pub use read::{InstanceId, OperationInstance, QueryResult, read};
pub use snapshot::{GraphSnapshot, NodeSnapshot};
pub use walk::{TreeVisitor, walk};
