//! # Dawdle - Abstract Syntax Tree
//!
//! This module defines the two tree shapes the dawdle pipeline moves
//! through on its way from source text to a compiled relation.
//!
//! ## Architecture Overview
//!
//! - **[raw]** - the grammar-shaped parse tree emitted by the parser,
//!   one node per grammar rule, including rules that exist purely for
//!   readability of the grammar
//! - **[node]** - the canonical tagged tree the compiler walks: one
//!   variant per construct, pass-through rules collapsed away
//!
//! ## Core Concepts
//!
//! ### Sections
//!
//! Every compilable unit is a *section*: leading `let`/`def`
//! declarations followed by body items. The first body item seeds the
//! accumulator (a relation literal or a single reference), and each
//! following operator line threads it forward:
//!
//! ```text
//! let rank_cutoff
//!     [5]
//! orders:
//! > gte :qty 10
//! J customers:
//! v :customer :qty
//! ```
//!
//! ### Operator lines
//!
//! A line is an operator token followed by argument values. The eight
//! built-ins are spelled as symbols (`>` filter, `v` select, `^` extend,
//! `X` cross, `U` union, `-` difference, `J` join, `G` group); any other
//! leading identifier invokes a user-defined composite operator.
//!
//! ### Values
//!
//! Literals (`1`, `2.5`, `"s"`, `true`, `null`, `$9.99`, `~2020-11-27`,
//! `` `template` ``), references (`name:` relation, `:name` header,
//! `name:*` all headers, bare variables), `name=value` pairs, and
//! bracketed sets `[:a :b]`.
pub mod node;
pub mod raw;

pub use node::{Node, Section};
pub use raw::{Raw, Rule};
