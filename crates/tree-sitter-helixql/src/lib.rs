//! HelixQL support for tree-sitter style tooling.
//!
//! The crate exposes the HelixQL grammar as a compiled [`Language`]: a
//! descriptor listing every symbol and field the grammar produces. Hosts get
//! the single shared descriptor from [`language()`], and [`parse()`] turns
//! HelixQL source into a [`Tree`] whose nodes use those symbols.
//!
//! ```
//! let tree = tree_sitter_helixql::parse("N::User { name: String }").unwrap();
//! assert_eq!(
//!     tree.to_sexp(),
//!     "(source (node_def name: (identifier_upper) body: (node_body (field_defs \
//!      (field_def name: (identifier) type: (param_type (named_type)))))))"
//! );
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Grammar definitions.
///
/// A grammar is the declarative shape of a language, in the same form as
/// tree-sitter's `grammar.json`. It can be read from JSON or built in Rust
/// with the [`dsl`](grammar::dsl) helpers.
pub mod grammar;

/// Grammar checks.
///
/// Validation runs before compilation so that malformed grammars are
/// reported by name instead of surfacing as parse failures.
pub mod validate;

/// Compiled language descriptors: symbol and field tables plus productions.
pub mod language;

/// The parsing engine.
pub mod parser;

/// Syntax trees and nodes.
pub mod tree;

/// The HelixQL grammar.
pub mod helixql;

pub use grammar::{parse_grammar, Grammar, GrammarError, Rule};
pub use helixql::{grammar as helixql_grammar, language, parse, GRAMMAR_NAME};
pub use language::{
    FieldId, Language, LanguageError, Symbol, SymbolKind, SymbolMetadata, END_SYMBOL,
    ERROR_SYMBOL, LANGUAGE_VERSION,
};
pub use parser::{ParseError, Parser, ParserConfig};
pub use tree::{Node, Point, Tree};
pub use validate::{validate, ValidationError};
