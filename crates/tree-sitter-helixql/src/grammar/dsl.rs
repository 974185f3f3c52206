//! Rule constructors mirroring the functions of tree-sitter's `grammar.js` DSL.
//!
//! Grammars written with these helpers produce exactly the [`Rule`] trees that
//! `tree-sitter generate` writes to `grammar.json`, so a grammar can be
//! defined in Rust and still exported in the standard format.

use super::rules::{Rule, RuleType, RuleValue};

/// The empty production.
#[must_use]
pub fn blank() -> Rule {
    Rule::new(RuleType::Blank)
}

/// A literal string token.
#[must_use]
pub fn string(value: &str) -> Rule {
    let mut rule = Rule::new(RuleType::String);
    rule.value = Some(RuleValue::String(value.to_owned()));
    rule
}

/// A regular-expression token, written in tree-sitter's (JavaScript) regex syntax.
#[must_use]
pub fn pattern(source: &str) -> Rule {
    let mut rule = Rule::new(RuleType::Pattern);
    rule.value = Some(RuleValue::String(source.to_owned()));
    rule
}

/// A reference to the rule called `name` (`$.name` in `grammar.js`).
#[must_use]
pub fn sym(name: &str) -> Rule {
    let mut rule = Rule::new(RuleType::Symbol);
    rule.name = Some(name.to_owned());
    rule
}

/// Members matched one after another.
#[must_use]
pub fn seq<I: IntoIterator<Item = Rule>>(members: I) -> Rule {
    let mut rule = Rule::new(RuleType::Seq);
    rule.members = members.into_iter().collect();
    rule
}

/// Exactly one of the members.
#[must_use]
pub fn choice<I: IntoIterator<Item = Rule>>(members: I) -> Rule {
    let mut rule = Rule::new(RuleType::Choice);
    rule.members = members.into_iter().collect();
    rule
}

/// `content` or nothing; encoded as `CHOICE(content, BLANK)` like tree-sitter does.
#[must_use]
pub fn optional(content: Rule) -> Rule {
    choice([content, blank()])
}

/// Zero or more repetitions.
#[must_use]
pub fn repeat(content: Rule) -> Rule {
    wrap(RuleType::Repeat, content)
}

/// One or more repetitions.
#[must_use]
pub fn repeat1(content: Rule) -> Rule {
    wrap(RuleType::Repeat1, content)
}

/// Labels the nodes produced by `content` with the field `name`.
#[must_use]
pub fn field(name: &str, content: Rule) -> Rule {
    let mut rule = wrap(RuleType::Field, content);
    rule.name = Some(name.to_owned());
    rule
}

/// Collapses `content` into a single lexical token.
#[must_use]
pub fn token(content: Rule) -> Rule {
    wrap(RuleType::Token, content)
}

/// Precedence wrapper.
#[must_use]
pub fn prec(level: i32, content: Rule) -> Rule {
    prec_of(RuleType::Prec, level, content)
}

/// Left-associative precedence wrapper.
#[must_use]
pub fn prec_left(level: i32, content: Rule) -> Rule {
    prec_of(RuleType::PrecLeft, level, content)
}

/// Right-associative precedence wrapper.
#[must_use]
pub fn prec_right(level: i32, content: Rule) -> Rule {
    prec_of(RuleType::PrecRight, level, content)
}

fn prec_of(rule_type: RuleType, level: i32, content: Rule) -> Rule {
    let mut rule = wrap(rule_type, content);
    rule.value = Some(RuleValue::Integer(level));
    rule
}

fn wrap(rule_type: RuleType, content: Rule) -> Rule {
    let mut rule = Rule::new(rule_type);
    rule.content = Some(Box::new(content));
    rule
}
