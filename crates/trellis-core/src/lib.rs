#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core data structures for Trellis.
//!
//! Three layers:
//! - **Values** (`value`): the JSON-like tagged union stored in the graph
//!   and assembled into results.
//! - **Documents** (`document`): the parsed query AST the cache consumes.
//! - **Identities** (`id`): entity ids and the deterministic derivation of
//!   synthetic parameterized-field ids.

pub mod document;
pub mod id;
pub mod value;

pub use document::{
    ArgValue, Directive, Document, Field, FragmentDefinition, FragmentSpread, InlineFragment,
    Operation, Selection, SelectionSet, VariableDefinition,
};
pub use id::{NodeId, PathSegment, dynamic_node_id};
pub use value::Value;
