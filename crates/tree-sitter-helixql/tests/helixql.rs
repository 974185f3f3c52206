//! Integration tests for the HelixQL grammar, parser, and language descriptor.

use tree_sitter_helixql::{
    helixql_grammar, language, parse, parse_grammar, validate, Language, ParseError, Parser,
    ParserConfig, Point, SymbolKind, END_SYMBOL, LANGUAGE_VERSION,
};

const SCHEMA: &str = r#"
// Users follow each other.
N::User {
    INDEX name: String,
    age: U32 DEFAULT 0,
    joined: Date DEFAULT NOW,
}

E::Follows {
    From: User,
    To: User,
    Properties: {
        since: Date
    }
}

V::Embedding
"#;

const QUERIES: &str = r#"
QUERY addUser(name: String, age: U32) =>
    user <- AddN<User>({name: name, age: age})
    RETURN user

QUERY follow(from_id: ID, to_id: ID) =>
    AddE<Follows>::From(from_id)::To(to_id)
    RETURN NONE

QUERY adults(min: I32) =>
    users <- N<User>::WHERE(_::{age}::GT(min))
    total <- users::COUNT
    RETURN users::{name, age}, total

QUERY rename(id: ID, name: String) =>
    updated <- N<User>(id)::UPDATE({name: name})
    FOR friend IN updated {
        DROP friend::OutE<Follows>
    }
    RETURN updated
"#;

fn strict() -> Parser<'static> {
    Parser::new(language()).with_config(ParserConfig {
        recover: false,
        ..ParserConfig::default()
    })
}

#[test]
fn accessor_returns_one_descriptor() {
    let first = language();
    let second = language();
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.name(), "helixql");
    assert_eq!(first.version(), LANGUAGE_VERSION);
}

#[test]
fn concurrent_first_calls_agree() {
    let addresses: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| std::ptr::from_ref(language()) as usize))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(addresses.windows(2).all(|pair| pair[0] == pair[1]));
    assert!(language().symbol_count() > 100);
}

#[test]
fn symbol_table_is_consistent() {
    let language = language();
    assert_eq!(language.symbol_name(END_SYMBOL), Some("end"));
    assert_eq!(language.metadata(END_SYMBOL).unwrap().kind(), SymbolKind::Builtin);
    assert_eq!(language.symbol_name(language.start_symbol()), Some("source"));

    for id in 0..language.symbol_count() {
        let id = u16::try_from(id).unwrap();
        let name = language.symbol_name(id).unwrap();
        let named = language.symbol_is_named(id);
        assert_eq!(language.symbol_for_name(name, named), Some(id), "{name}");
    }

    let hidden = language.symbol_for_name("_query_statement", true).unwrap();
    assert!(!language.symbol_is_visible(hidden));
    assert!(language.symbol_for_name("::", false).is_some());
    assert!(language.symbol_for_name("missing_rule", true).is_none());
}

#[test]
fn field_table_is_sorted_and_one_based() {
    let language = language();
    assert_eq!(language.field_count(), 15);
    assert_eq!(language.field_name(0), None);
    assert_eq!(language.field_name(1), Some("argument"));
    assert_eq!(language.field_name(15), Some("variable"));
    for id in 1..=15u16 {
        let name = language.field_name(id).unwrap();
        assert_eq!(language.field_id_for_name(name), Some(id));
    }
}

#[test]
fn parses_schema_definitions() {
    let tree = strict().parse(SCHEMA).unwrap();
    let root = tree.root_node();
    assert!(!tree.has_error());

    let kinds: Vec<&str> = root.named_children().map(|n| n.kind()).collect();
    assert_eq!(kinds, ["comment", "node_def", "edge_def", "vector_def"]);

    let user = root.named_child(1).unwrap();
    assert_eq!(user.child_by_field_name("name").unwrap().text(), "User");
    let fields: Vec<&str> = user
        .descendants()
        .filter(|n| n.kind() == "field_def")
        .map(|n| n.child_by_field_name("name").unwrap().text())
        .collect();
    assert_eq!(fields, ["name", "age", "joined"]);

    let follows = root.named_child(2).unwrap();
    let body = follows.child_by_field_name("body").unwrap();
    assert_eq!(body.child_by_field_name("from").unwrap().text(), "User");
    assert_eq!(body.child_by_field_name("to").unwrap().text(), "User");
    assert!(body.named_children().any(|n| n.kind() == "properties"));

    let embedding = root.named_child(3).unwrap();
    assert!(embedding.child_by_field_name("body").is_none());
}

#[test]
fn parses_queries() {
    let tree = strict().parse(QUERIES).unwrap();
    let root = tree.root_node();
    assert!(!root.has_error());

    let names: Vec<&str> = root
        .named_children()
        .map(|q| q.child_by_field_name("name").unwrap().text())
        .collect();
    assert_eq!(names, ["addUser", "follow", "adults", "rename"]);

    let kinds: Vec<&str> = root.descendants().map(|n| n.kind()).collect();
    for kind in [
        "AddN",
        "create_field",
        "AddE",
        "to_from",
        "where_step",
        "anonymous_traversal",
        "GT",
        "count",
        "object_step",
        "update",
        "for_loop",
        "drop",
        "out_e",
    ] {
        assert!(kinds.contains(&kind), "no {kind} node");
    }

    let adults = root.named_child(2).unwrap();
    let returned = adults.child_by_field_name("return").unwrap();
    assert_eq!(returned.text(), "RETURN users::{name, age}, total");
    assert_eq!(returned.named_child_count(), 2);
}

#[test]
fn identifier_traversals_as_operands() {
    for (query, operands) in [
        (
            "QUERY q(x: ID) =>\n    a <- N<User>::WHERE(x::GT(1))\n    RETURN a",
            &["x::GT(1)"][..],
        ),
        (
            "QUERY q(x: ID) =>\n    a <- N<User>::RANGE(x::COUNT, 10)\n    RETURN a",
            &["x::COUNT"][..],
        ),
        (
            "QUERY q(x: ID, y: ID) =>\n    a <- N<User>::WHERE(AND(x::EQ(1), y))\n    RETURN a",
            &["x::EQ(1)"][..],
        ),
    ] {
        let tree = strict()
            .parse(query)
            .unwrap_or_else(|e| panic!("{query:?}: {e}"));
        let traversals: Vec<&str> = tree
            .root_node()
            .descendants()
            .filter(|n| n.kind() == "id_traversal")
            .map(|n| n.text())
            .collect();
        assert_eq!(traversals, operands);
    }
}

#[test]
fn bare_identifier_operands_stay_identifiers() {
    let tree = strict()
        .parse("QUERY q(x: ID, y: ID) =>\n    a <- N<User>::WHERE(AND(x::EQ(1), y))\n    RETURN a")
        .unwrap();
    let and = tree
        .root_node()
        .descendants()
        .find(|n| n.kind() == "and")
        .unwrap();
    let operands: Vec<String> = and.named_children().map(|n| n.to_sexp()).collect();
    assert_eq!(
        operands,
        [
            "(evaluates_to_bool (id_traversal (identifier) (last_step (bool_operations \
             (EQ (evaluates_to_anything (integer)))))))",
            "(evaluates_to_bool (identifier))",
        ]
    );
}

#[test]
fn nested_creation_values_are_object_steps() {
    let tree = strict()
        .parse("QUERY add(c: String) =>\n    user <- AddN<User>({address: {city: c}})\n    RETURN user")
        .unwrap();
    let texts = |kind: &str| {
        tree.root_node()
            .descendants()
            .filter(|n| n.kind() == kind)
            .map(|n| n.text().to_owned())
            .collect::<Vec<_>>()
    };
    assert_eq!(texts("create_field"), ["{address: {city: c}}"]);
    assert_eq!(texts("object_step"), ["{city: c}"]);
}

#[test]
fn grammar_json_reads_back() {
    let grammar = helixql_grammar();
    let reread = parse_grammar(&grammar.to_json()).unwrap();
    assert_eq!(reread.name, "helixql");
    assert_eq!(reread.rules.len(), grammar.rules.len());
    assert_eq!(reread.start_rule().unwrap(), "source");
    validate(&reread).unwrap();

    let compiled = Language::from_grammar(&reread).unwrap();
    assert_eq!(compiled.symbol_count(), language().symbol_count());
    assert_eq!(compiled.field_count(), language().field_count());
    let tree = Parser::new(&compiled).parse(QUERIES).unwrap();
    assert_eq!(tree.to_sexp(), parse(QUERIES).unwrap().to_sexp());
}

#[test]
fn query_tree_shape() {
    let tree = parse("QUERY getUser(id: ID) =>\n    user <- N<User>(id)\n    RETURN user").unwrap();
    let expected = concat!(
        "(source (query_def",
        " name: (identifier)",
        " params: (query_params (param_def name: (identifier) type: (param_type (ID_TYPE))))",
        " body: (query_body (get_stmt variable: (identifier) value: (evaluates_to_anything",
        " (traversal (start_node (type_args (identifier_upper)) (id_args (id_arg (identifier))))))))",
        " return: (return_stmt (evaluates_to_anything (identifier)))))",
    );
    assert_eq!(tree.to_sexp(), expected);
}

#[test]
fn node_positions_and_navigation() {
    let tree = parse("N::User {\n    name: String\n}\n").unwrap();
    let node_def = tree.root_node().child(0).unwrap();
    assert_eq!(node_def.kind(), "node_def");
    assert_eq!(node_def.start_position(), Point { row: 0, column: 0 });
    assert_eq!(node_def.end_position(), Point { row: 2, column: 1 });

    let keyword = node_def.child(0).unwrap();
    assert_eq!(keyword.kind(), "N::");
    assert!(!keyword.is_named());
    let name = keyword.next_sibling().unwrap();
    assert_eq!(name.field_name(), Some("name"));
    assert_eq!(name.prev_sibling(), Some(keyword));
    assert_eq!(name.parent(), Some(node_def));

    let field_name = node_def
        .descendants()
        .find(|n| n.kind() == "identifier")
        .unwrap();
    assert_eq!(field_name.text(), "name");
    assert_eq!(field_name.start_position(), Point { row: 1, column: 4 });
}

#[test]
fn keywords_are_not_identifiers() {
    assert!(strict().parse("QUERY q() =>\n    RETURN RETURN").is_err());
    assert!(strict().parse("QUERY q() =>\n    RETURN RETURNED").is_ok());
}

#[test]
fn syntax_errors_are_positioned() {
    let err = strict().parse("N::User {\n  name String\n}").unwrap_err();
    assert_eq!(
        err,
        ParseError::Syntax {
            position: Point { row: 1, column: 7 },
            offset: 17,
            found: "'String'".to_owned(),
            expected: vec!["':'".to_owned()],
        }
    );
    assert_eq!(
        err.to_string(),
        "syntax error at 2:8: unexpected 'String', expected one of: ':'"
    );
}

#[test]
fn invalid_input_becomes_error_nodes() {
    let tree = parse("N::User {}\n%%% garbage\nV::Embedding").unwrap();
    assert!(tree.has_error());
    let root = tree.root_node();
    let kinds: Vec<&str> = root.children().map(|n| n.kind()).collect();
    assert_eq!(kinds, ["node_def", "ERROR", "vector_def"]);
    let error = root.child(1).unwrap();
    assert!(error.is_error());
    assert_eq!(error.text(), "%%% garbage");
}

#[test]
fn empty_source_is_valid() {
    let tree = parse("").unwrap();
    assert_eq!(tree.to_sexp(), "(source)");
    let tree = parse("// nothing but a comment\n").unwrap();
    assert_eq!(tree.to_sexp(), "(source (comment))");
}
