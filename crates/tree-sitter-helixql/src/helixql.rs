//! The HelixQL grammar and its process-wide [`Language`].
//!
//! HelixQL describes a graph database: node (`N::`), edge (`E::`) and vector
//! (`V::`) schemas, plus `QUERY` definitions built from traversals such as
//! `N<User>::Out<Follows>::WHERE(_::{age}::GT(18))`.

use std::sync::OnceLock;

use crate::grammar::dsl::{
    choice, field, optional, pattern, prec_left, repeat, repeat1, seq, string, sym, token,
};
use crate::grammar::{Grammar, Rule};
use crate::language::Language;
use crate::parser::{ParseError, Parser};
use crate::tree::Tree;

/// Name of the grammar, as used in `tree_sitter_<name>`.
pub const GRAMMAR_NAME: &str = "helixql";

/// Returns the process-wide HelixQL [`Language`].
///
/// The first call compiles the grammar; every call, from any thread, returns
/// the same fully built descriptor, which lives until the process exits.
///
/// # Panics
///
/// Never in practice: the grammar is static data and compiling it is covered
/// by this crate's tests.
#[must_use]
pub fn language() -> &'static Language {
    static LANGUAGE: OnceLock<Language> = OnceLock::new();
    LANGUAGE.get_or_init(|| {
        Language::from_grammar(&grammar()).expect("the built-in HelixQL grammar compiles")
    })
}

/// Parses HelixQL `source` with the default parser configuration.
///
/// # Errors
///
/// See [`Parser::parse`].
pub fn parse(source: &str) -> Result<Tree<'static>, ParseError> {
    Parser::new(language()).parse(source)
}

/// `first` followed by any number of `, item`.
fn comma_list(first: Rule, item: Rule) -> Rule {
    seq([first, repeat(seq([string(","), item]))])
}

/// `'<' type_args '>'`, optional.
fn optional_type_args() -> Rule {
    optional(seq([string("<"), sym("type_args"), string(">")]))
}

fn bool_operand() -> Rule {
    choice([sym("evaluates_to_bool"), sym("anonymous_traversal")])
}

fn comparison(keyword: &str, operand: &str) -> Rule {
    seq([
        string(keyword),
        string("("),
        choice([sym(operand), sym("anonymous_traversal")]),
        string(")"),
    ])
}

fn start_step(keyword: &str) -> Rule {
    seq([
        string(keyword),
        optional_type_args(),
        optional(seq([
            string("("),
            choice([sym("id_args"), sym("by_index")]),
            string(")"),
        ])),
    ])
}

fn schema_def(keyword: &str, body: Rule) -> Rule {
    seq([
        string(keyword),
        field("name", sym("identifier_upper")),
        body,
    ])
}

/// Builds the HelixQL grammar.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn grammar() -> Grammar {
    let rules = [
        // Main rules
        (
            "source",
            repeat(choice([
                sym("node_def"),
                sym("edge_def"),
                sym("vector_def"),
                sym("query_def"),
            ])),
        ),
        // Schema definitions
        (
            "vector_def",
            schema_def("V::", optional(field("body", sym("node_body")))),
        ),
        (
            "node_def",
            schema_def("N::", optional(field("body", sym("node_body")))),
        ),
        ("edge_def", schema_def("E::", field("body", sym("edge_body")))),
        (
            "node_body",
            seq([string("{"), optional(sym("field_defs")), string("}")]),
        ),
        (
            "edge_body",
            seq([
                string("{"),
                string("From:"),
                field("from", sym("identifier_upper")),
                string(","),
                string("To:"),
                field("to", sym("identifier_upper")),
                optional(string(",")),
                optional(sym("properties")),
                string("}"),
            ]),
        ),
        (
            "field_defs",
            seq([
                comma_list(sym("field_def"), sym("field_def")),
                optional(string(",")),
            ]),
        ),
        (
            "field_def",
            seq([
                optional(sym("index")),
                field("name", sym("identifier")),
                string(":"),
                field("type", sym("param_type")),
                optional(sym("default")),
            ]),
        ),
        ("index", string("INDEX")),
        (
            "default",
            seq([
                string("DEFAULT"),
                choice([
                    sym("now"),
                    sym("float"),
                    sym("integer"),
                    sym("boolean"),
                    sym("string_literal"),
                    sym("none"),
                ]),
            ]),
        ),
        (
            "properties",
            seq([
                string("Properties"),
                string(":"),
                string("{"),
                optional(sym("field_defs")),
                string("}"),
            ]),
        ),
        // Query definitions
        (
            "query_def",
            seq([
                string("QUERY"),
                field("name", sym("identifier")),
                field("params", sym("query_params")),
                string("=>"),
                field("body", optional(sym("query_body"))),
                field("return", sym("return_stmt")),
            ]),
        ),
        (
            "query_params",
            seq([
                string("("),
                optional(comma_list(sym("param_def"), sym("param_def"))),
                string(")"),
            ]),
        ),
        (
            "param_def",
            seq([
                field("name", sym("identifier")),
                string(":"),
                field("type", sym("param_type")),
            ]),
        ),
        (
            "_query_statement",
            choice([
                sym("get_stmt"),
                sym("AddN"),
                sym("AddV"),
                sym("BatchAddV"),
                sym("AddE"),
                sym("drop"),
                sym("for_loop"),
            ]),
        ),
        ("query_body", repeat1(sym("_query_statement"))),
        // Assignments and traversals
        (
            "get_stmt",
            seq([
                field("variable", sym("identifier")),
                string("<-"),
                field("value", sym("evaluates_to_anything")),
            ]),
        ),
        (
            "traversal",
            seq([
                choice([sym("start_node"), sym("start_edge"), sym("start_vector")]),
                repeat(sym("step")),
                optional(sym("last_step")),
            ]),
        ),
        (
            "id_traversal",
            seq([
                sym("identifier"),
                choice([
                    seq([repeat1(sym("step")), optional(sym("last_step"))]),
                    sym("last_step"),
                ]),
            ]),
        ),
        (
            "anonymous_traversal",
            seq([
                string("_"),
                optional(choice([
                    seq([
                        sym("property_access"),
                        optional(seq([repeat(sym("step")), optional(sym("last_step"))])),
                    ]),
                    seq([repeat1(sym("step")), optional(sym("last_step"))]),
                    sym("last_step"),
                ])),
            ]),
        ),
        (
            "property_access",
            seq([string("."), field("property", sym("identifier"))]),
        ),
        (
            "step",
            seq([
                string("::"),
                choice([
                    sym("graph_step"),
                    sym("where_step"),
                    sym("closure_step"),
                    sym("object_step"),
                    sym("exclude_field"),
                    sym("count"),
                    sym("ID"),
                    sym("range_step"),
                    sym("AddE"),
                    sym("identifier"),
                ]),
            ]),
        ),
        (
            "last_step",
            seq([
                string("::"),
                choice([sym("bool_operations"), sym("update")]),
            ]),
        ),
        (
            "for_loop",
            seq([
                string("FOR"),
                field("argument", sym("for_argument")),
                string("IN"),
                field("iterable", sym("identifier")),
                string("{"),
                field("body", optional(sym("query_body"))),
                string("}"),
            ]),
        ),
        (
            "for_argument",
            choice([
                sym("object_access"),
                sym("object_destructuring"),
                sym("identifier"),
            ]),
        ),
        (
            "object_access",
            seq([
                field("object", sym("identifier")),
                string("."),
                field("field", sym("identifier")),
            ]),
        ),
        (
            "object_destructuring",
            seq([
                string("{"),
                comma_list(sym("identifier"), sym("identifier")),
                string("}"),
            ]),
        ),
        // Evaluation rules
        (
            "evaluates_to_anything",
            choice([
                sym("AddN"),
                sym("AddV"),
                sym("BatchAddV"),
                sym("search_vector"),
                sym("AddE"),
                sym("exists"),
                sym("none"),
                sym("traversal"),
                sym("id_traversal"),
                sym("object_step"),
                sym("string_literal"),
                sym("float"),
                sym("integer"),
                sym("boolean"),
                sym("and"),
                sym("or"),
                sym("identifier"),
            ]),
        ),
        (
            "evaluates_to_bool",
            choice([
                sym("exists"),
                sym("boolean"),
                sym("and"),
                sym("or"),
                sym("traversal"),
                sym("id_traversal"),
                sym("identifier"),
            ]),
        ),
        (
            "evaluates_to_number",
            choice([
                sym("float"),
                sym("integer"),
                sym("traversal"),
                sym("id_traversal"),
                sym("identifier"),
            ]),
        ),
        // Return statement
        (
            "return_stmt",
            seq([
                string("RETURN"),
                comma_list(sym("evaluates_to_anything"), sym("evaluates_to_anything")),
            ]),
        ),
        // Creation steps
        (
            "create_field",
            seq([
                string("{"),
                comma_list(sym("new_field"), sym("new_field")),
                string("}"),
            ]),
        ),
        (
            "new_field",
            seq([
                field("key", sym("identifier")),
                string(":"),
                field(
                    "value",
                    choice([
                        sym("anonymous_traversal"),
                        sym("evaluates_to_anything"),
                        sym("create_field"),
                    ]),
                ),
            ]),
        ),
        (
            "to_from",
            prec_left(
                0,
                choice([
                    seq([sym("to"), optional(sym("from"))]),
                    seq([sym("from"), optional(sym("to"))]),
                ]),
            ),
        ),
        (
            "to",
            seq([
                string("::"),
                string("To"),
                string("("),
                sym("id_arg"),
                string(")"),
            ]),
        ),
        (
            "from",
            seq([
                string("::"),
                string("From"),
                string("("),
                sym("id_arg"),
                string(")"),
            ]),
        ),
        (
            "vec_literal",
            seq([
                string("["),
                comma_list(sym("float"), sym("float")),
                string("]"),
            ]),
        ),
        ("vector_data", choice([sym("identifier"), sym("vec_literal")])),
        (
            "AddN",
            seq([
                string("AddN"),
                seq([string("<"), sym("identifier_upper"), string(">")]),
                optional(seq([
                    string("("),
                    optional(sym("create_field")),
                    string(")"),
                ])),
            ]),
        ),
        (
            "AddE",
            seq([
                string("AddE"),
                seq([string("<"), sym("identifier_upper"), string(">")]),
                optional(seq([
                    string("("),
                    optional(sym("create_field")),
                    string(")"),
                ])),
                sym("to_from"),
            ]),
        ),
        (
            "AddV",
            seq([
                string("AddV"),
                seq([string("<"), sym("identifier_upper"), string(">")]),
                seq([
                    string("("),
                    sym("vector_data"),
                    repeat(seq([string(","), sym("create_field")])),
                    string(")"),
                ]),
            ]),
        ),
        // Source steps
        ("start_node", start_step("N")),
        ("start_edge", start_step("E")),
        ("start_vector", start_step("V")),
        (
            "by_index",
            seq([
                string("{"),
                sym("id_arg"),
                string(":"),
                sym("evaluates_to_anything"),
                string("}"),
            ]),
        ),
        // Traversal steps
        (
            "graph_step",
            choice([
                sym("out_e"),
                sym("in_e"),
                sym("from_n"),
                sym("to_n"),
                sym("out"),
                sym("in_nodes"),
                sym("shortest_path"),
            ]),
        ),
        ("out_e", seq([string("OutE"), optional_type_args()])),
        ("in_e", seq([string("InE"), optional_type_args()])),
        ("from_n", string("FromN")),
        ("to_n", string("ToN")),
        ("out", seq([string("Out"), optional_type_args()])),
        ("in_nodes", seq([string("In"), optional_type_args()])),
        (
            "shortest_path",
            seq([
                string("ShortestPath"),
                optional_type_args(),
                sym("to_from"),
            ]),
        ),
        // Util steps
        (
            "where_step",
            seq([
                string("WHERE"),
                string("("),
                bool_operand(),
                string(")"),
            ]),
        ),
        (
            "exists",
            seq([
                string("EXISTS"),
                string("("),
                choice([
                    sym("traversal"),
                    sym("id_traversal"),
                    sym("anonymous_traversal"),
                ]),
                string(")"),
            ]),
        ),
        (
            "range_step",
            seq([
                string("RANGE"),
                string("("),
                sym("evaluates_to_number"),
                string(","),
                sym("evaluates_to_number"),
                string(")"),
            ]),
        ),
        ("count", string("COUNT")),
        ("none", string("NONE")),
        ("ID", string("ID")),
        (
            "update_field",
            seq([
                field("key", sym("identifier")),
                string(":"),
                field(
                    "value",
                    choice([sym("evaluates_to_anything"), sym("anonymous_traversal")]),
                ),
            ]),
        ),
        (
            "update",
            seq([
                string("UPDATE"),
                string("("),
                string("{"),
                comma_list(sym("update_field"), sym("update_field")),
                string("}"),
                string(")"),
            ]),
        ),
        (
            "drop",
            prec_left(
                0,
                seq([
                    string("DROP"),
                    optional(choice([
                        sym("traversal"),
                        sym("id_traversal"),
                        sym("identifier"),
                    ])),
                ]),
            ),
        ),
        // Vector steps
        (
            "search_vector",
            seq([
                string("SearchV"),
                string("<"),
                sym("identifier_upper"),
                string(">"),
                string("("),
                sym("vector_data"),
                string(","),
                choice([sym("integer"), sym("identifier")]),
                string(")"),
            ]),
        ),
        (
            "pre_filter",
            seq([
                string("PREFILTER"),
                string("("),
                bool_operand(),
                string(")"),
            ]),
        ),
        (
            "BatchAddV",
            seq([
                string("BatchAddV"),
                string("<"),
                sym("identifier_upper"),
                string(">"),
                string("("),
                sym("identifier"),
                string(")"),
            ]),
        ),
        // Boolean operations
        (
            "and",
            seq([
                string("AND"),
                string("("),
                comma_list(bool_operand(), bool_operand()),
                string(")"),
            ]),
        ),
        (
            "or",
            seq([
                string("OR"),
                string("("),
                comma_list(bool_operand(), bool_operand()),
                string(")"),
            ]),
        ),
        (
            "bool_operations",
            choice([
                sym("GT"),
                sym("GTE"),
                sym("LT"),
                sym("LTE"),
                sym("EQ"),
                sym("NEQ"),
            ]),
        ),
        ("GT", comparison("GT", "evaluates_to_number")),
        ("GTE", comparison("GTE", "evaluates_to_number")),
        ("LT", comparison("LT", "evaluates_to_number")),
        ("LTE", comparison("LTE", "evaluates_to_number")),
        ("EQ", comparison("EQ", "evaluates_to_anything")),
        ("NEQ", comparison("NEQ", "evaluates_to_anything")),
        // Object access and remapping steps
        (
            "object_step",
            prec_left(
                0,
                seq([
                    string("{"),
                    optional(seq([
                        comma_list(sym("mapping_field"), sym("mapping_field")),
                        optional(string(",")),
                    ])),
                    optional(sym("spread_object")),
                    string("}"),
                ]),
            ),
        ),
        (
            "exclude_field",
            seq([
                string("!"),
                string("{"),
                comma_list(sym("identifier"), sym("identifier")),
                optional(seq([string(","), sym("spread_object")])),
                string("}"),
            ]),
        ),
        (
            "closure_step",
            seq([
                string("|"),
                sym("identifier"),
                string("|"),
                sym("object_step"),
            ]),
        ),
        (
            "spread_object",
            seq([string(".."), optional(string(","))]),
        ),
        (
            "mapping_field",
            choice([
                seq([
                    sym("identifier"),
                    optional(seq([
                        string(":"),
                        choice([
                            sym("anonymous_traversal"),
                            sym("evaluates_to_anything"),
                            sym("object_step"),
                        ]),
                    ])),
                ]),
                sym("identifier"),
            ]),
        ),
        // Types
        (
            "type_args",
            comma_list(sym("identifier_upper"), sym("identifier_upper")),
        ),
        (
            "id_arg",
            choice([
                sym("id_traversal"),
                sym("identifier"),
                sym("string_literal"),
            ]),
        ),
        ("id_args", comma_list(sym("id_arg"), sym("id_arg"))),
        (
            "array",
            seq([string("["), sym("param_type"), string("]")]),
        ),
        (
            "object",
            seq([string("{"), optional(sym("field_defs")), string("}")]),
        ),
        (
            "named_type",
            choice(
                [
                    "String", "Boolean", "F32", "F64", "I8", "I16", "I32", "I64", "U8", "U16",
                    "U32", "U64", "U128",
                ]
                .map(string),
            ),
        ),
        ("ID_TYPE", string("ID")),
        ("date_type", string("Date")),
        (
            "param_type",
            choice([
                sym("named_type"),
                sym("date_type"),
                sym("ID_TYPE"),
                sym("array"),
                sym("object"),
                sym("identifier"),
            ]),
        ),
        // Literals
        (
            "string_literal",
            token(seq([
                string("\""),
                repeat(choice([
                    pattern(r#"[^"\\]"#),
                    seq([string("\\"), pattern(".")]),
                ])),
                string("\""),
            ])),
        ),
        ("boolean", choice([string("true"), string("false")])),
        (
            "identifier",
            token(seq([pattern("[a-zA-Z]"), repeat(pattern("[a-zA-Z0-9_]"))])),
        ),
        (
            "identifier_upper",
            token(seq([pattern("[A-Z]"), repeat(pattern("[a-zA-Z0-9_]"))])),
        ),
        ("integer", token(pattern(r"\d+"))),
        (
            "float",
            token(seq([pattern(r"\d+"), string("."), pattern(r"\d+")])),
        ),
        ("now", string("NOW")),
        // Whitespace and comments
        ("comment", token(seq([string("//"), pattern(".*")]))),
    ];

    let mut grammar = Grammar::new(GRAMMAR_NAME, rules);
    grammar.extras = Some(vec![pattern(r"\s"), sym("comment")]);
    grammar.conflicts = Some(vec![
        vec!["mapping_field".to_owned(), "evaluates_to_anything".to_owned()],
        vec!["new_field".to_owned(), "mapping_field".to_owned()],
    ]);
    grammar
}
