//! Integration tests for the `helixql` command-line binary.

#![cfg(feature = "cli")]

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn helixql() -> Command {
    Command::cargo_bin("helixql").unwrap()
}

fn file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn parse_prints_the_tree() {
    let file = file_with("N::User { name: String }\n");
    helixql()
        .arg("parse")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("(source (node_def name: (identifier_upper)"));
}

#[test]
fn parse_reads_stdin() {
    helixql()
        .args(["parse", "-"])
        .write_stdin("V::Embedding")
        .assert()
        .success()
        .stdout("(source (vector_def name: (identifier_upper)))\n");
}

#[test]
fn parse_fails_on_unparsed_input() {
    let file = file_with("N::User {}\n%%%\n");
    helixql()
        .arg("parse")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("(ERROR)"))
        .stderr(predicate::str::contains("2:1: cannot parse \"%%%\""));
}

#[test]
fn parse_needs_a_file() {
    helixql()
        .arg("parse")
        .assert()
        .failure()
        .stderr(predicate::str::contains("'parse' needs a file argument"));
}

#[test]
fn parse_reports_missing_files() {
    helixql()
        .args(["parse", "/nonexistent/query.hx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read /nonexistent/query.hx"));
}

#[test]
fn grammar_prints_json() {
    helixql()
        .arg("grammar")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"helixql\""))
        .stdout(predicate::str::contains("\"query_def\""));
}

#[test]
fn symbols_lists_both_tables() {
    helixql()
        .arg("symbols")
        .assert()
        .success()
        .stdout(predicate::str::contains("builtin    end"))
        .stdout(predicate::str::contains("named      source"))
        .stdout(predicate::str::contains("hidden     _query_statement"))
        .stdout(predicate::str::contains("fields:"))
        .stdout(predicate::str::contains("    1  argument"));
}

#[test]
fn validate_accepts_a_grammar_file() {
    let file = file_with(
        r#"{
            "name": "pairs",
            "rules": {
                "document": {
                    "type": "REPEAT",
                    "content": {"type": "SYMBOL", "name": "pair"}
                },
                "pair": {
                    "type": "SEQ",
                    "members": [
                        {"type": "FIELD", "name": "key", "content": {"type": "SYMBOL", "name": "word"}},
                        {"type": "STRING", "value": "="},
                        {"type": "FIELD", "name": "value", "content": {"type": "SYMBOL", "name": "word"}}
                    ]
                },
                "word": {"type": "PATTERN", "value": "[a-z]+"}
            }
        }"#,
    );
    helixql()
        .arg("validate")
        .arg(file.path())
        .assert()
        .success()
        .stdout("pairs: 5 symbols, 2 fields\n");
}

#[test]
fn validate_rejects_undefined_symbols() {
    let file = file_with(
        r#"{"name": "broken", "rules": {"start": {"type": "SYMBOL", "name": "nowhere"}}}"#,
    );
    helixql()
        .arg("validate")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined symbol 'nowhere'"));
}

#[test]
fn unknown_commands_fail() {
    helixql()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command 'frobnicate'"));
}
