//! Grammars in tree-sitter's `grammar.json` shape.
//!
//! A [`Grammar`] reads from and writes to that JSON through [`facet_json`].
//! Grammars can also be built in code with the [`dsl`] helpers, the way
//! `grammar.js` files are written.

use facet::Facet;
use std::collections::{HashMap, HashSet};

use crate::validate::ValidationError;

pub mod dsl;
mod rules;

pub use rules::{Rule, RuleType, RuleValue};

/// A whole grammar: named rules plus the lists that qualify them.
///
/// Field names follow
/// <https://tree-sitter.github.io/tree-sitter/assets/schemas/grammar.schema.json>.
#[derive(Debug, Clone, Facet)]
pub struct Grammar {
    /// The `$schema` URL, when present.
    #[facet(rename = "$schema", default)]
    pub schema: Option<String>,

    /// The short name of the grammar (e.g. `"helixql"`).
    pub name: String,

    /// Grammar this one extends.
    #[facet(default)]
    pub inherits: Option<String>,

    /// Rule definitions keyed by name.
    pub rules: HashMap<String, Rule>,

    /// Tokens allowed anywhere between others, e.g. whitespace and comments.
    #[facet(default)]
    pub extras: Option<Vec<Rule>>,

    /// Tokens produced by an external scanner.
    #[facet(default)]
    pub externals: Option<Vec<Rule>>,

    /// Rules spliced into their callers.
    #[facet(default)]
    pub inline: Option<Vec<String>>,

    /// Named precedence orderings.
    #[facet(default)]
    pub precedences: Option<Vec<Vec<Precedence>>>,

    /// Rule sets declared as intentionally ambiguous.
    #[facet(default)]
    pub conflicts: Option<Vec<Vec<String>>>,

    /// Reserved word sets by context name.
    #[facet(default)]
    pub reserved: Option<HashMap<String, Vec<Rule>>>,

    /// The identifier-like token keywords are carved out of.
    #[facet(default)]
    pub word: Option<String>,

    /// Hidden rules that act as abstract node kinds.
    #[facet(default)]
    pub supertypes: Option<Vec<String>>,
}

/// One entry of a precedence ordering.
#[derive(Debug, Clone, Facet)]
#[repr(u8)]
pub enum Precedence {
    /// A named level.
    String(String),

    /// A rule, ranked by its name.
    Symbol {
        /// The rule.
        name: String,
    },
}

/// Failure to load a grammar.
#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    /// The text is not JSON, or not a grammar.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The grammar loaded but is not usable.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Reads a `grammar.json` document.
///
/// # Errors
///
/// [`GrammarError::JsonParse`] when `json` does not deserialize into a [`Grammar`].
pub fn parse_grammar(json: &str) -> Result<Grammar, GrammarError> {
    facet_json::from_str(json).map_err(|e| GrammarError::JsonParse(e.to_string()))
}

impl Grammar {
    /// Creates a grammar called `name` from rules given in definition order.
    #[must_use]
    pub fn new<I>(name: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Rule)>,
    {
        Self {
            schema: None,
            name: name.to_owned(),
            inherits: None,
            rules: rules
                .into_iter()
                .map(|(name, rule)| (name.to_owned(), rule))
                .collect(),
            extras: None,
            externals: None,
            inline: None,
            precedences: None,
            conflicts: None,
            reserved: None,
            word: None,
            supertypes: None,
        }
    }

    /// Serializes the grammar to tree-sitter's `grammar.json` format.
    #[must_use]
    pub fn to_json(&self) -> String {
        facet_json::to_string(self)
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// The extras, or an empty slice when none are declared.
    #[must_use]
    pub fn extras(&self) -> &[Rule] {
        self.extras.as_deref().unwrap_or_default()
    }

    /// Returns `true` if `name` is a hidden rule (leading underscore), which never
    /// produces a node of its own.
    #[must_use]
    pub fn is_hidden(name: &str) -> bool {
        name.starts_with('_')
    }

    /// Every rule name referenced by another rule or by the extras.
    ///
    /// A rule naming itself does not count.
    #[must_use]
    pub fn referenced_symbols(&self) -> HashSet<&str> {
        let mut referenced = HashSet::new();
        for (name, rule) in &self.rules {
            let mut symbols = Vec::new();
            rule.collect_symbols(&mut symbols);
            referenced.extend(symbols.into_iter().filter(|&symbol| symbol != name.as_str()));
        }
        let mut extras = Vec::new();
        for extra in self.extras() {
            extra.collect_symbols(&mut extras);
        }
        referenced.extend(extras);
        referenced
    }

    /// Every rule reachable from `start`, including `start` itself.
    #[must_use]
    pub fn reachable_from<'g>(&'g self, start: &'g str) -> HashSet<&'g str> {
        let mut reachable = HashSet::new();
        let mut to_visit = vec![start];
        while let Some(name) = to_visit.pop() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(rule) = self.rules.get(name) {
                rule.collect_symbols(&mut to_visit);
            }
        }
        reachable
    }

    /// Determines the entry rule of the grammar.
    ///
    /// `grammar.json` keeps rules in definition order, but a [`HashMap`] does
    /// not. The entry point is the rule nobody else refers to; when several
    /// exist, the one that reaches the most rules wins, and the others are
    /// left unreachable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::NoRules`] for an empty grammar and
    /// [`ValidationError::AmbiguousStart`] when there is no candidate root or
    /// several reach equally many rules.
    pub fn start_rule(&self) -> Result<&str, ValidationError> {
        if self.rules.is_empty() {
            return Err(ValidationError::NoRules);
        }
        let referenced = self.referenced_symbols();
        let mut roots: Vec<&str> = self
            .rules
            .keys()
            .map(String::as_str)
            .filter(|name| !referenced.contains(name))
            .collect();
        roots.sort_unstable();
        if let [root] = roots.as_slice() {
            return Ok(root);
        }

        let reach: Vec<usize> = roots
            .iter()
            .map(|root| self.reachable_from(root).len())
            .collect();
        let best = reach.iter().copied().max().unwrap_or_default();
        let mut winners = roots.iter().zip(&reach).filter(|&(_, &n)| n == best);
        match (winners.next(), winners.next()) {
            (Some((root, _)), None) => {
                log::debug!("start rule '{root}' chosen from roots {roots:?}");
                Ok(*root)
            }
            _ => Err(ValidationError::AmbiguousStart(
                roots.iter().map(|root| (*root).to_owned()).collect(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::{choice, optional, pattern, seq, string, sym};
    use super::*;

    #[test]
    fn test_parse_simple_grammar() {
        let json = r#"{
            "name": "test",
            "rules": {
                "source_file": {
                    "type": "SYMBOL",
                    "name": "expression"
                },
                "expression": {
                    "type": "CHOICE",
                    "members": [
                        {
                            "type": "STRING",
                            "value": "hello"
                        },
                        {
                            "type": "PATTERN",
                            "value": "[0-9]+"
                        }
                    ]
                }
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        assert_eq!(grammar.name, "test");
        assert_eq!(grammar.rules.len(), 2);
        assert_eq!(grammar.start_rule().unwrap(), "source_file");
    }

    #[test]
    fn test_parse_precedence() {
        let json = r#"{
            "name": "test",
            "rules": {
                "expr": {
                    "type": "PREC_LEFT",
                    "value": 1,
                    "content": {
                        "type": "SEQ",
                        "members": [
                            {"type": "SYMBOL", "name": "expr"},
                            {"type": "STRING", "value": "+"},
                            {"type": "SYMBOL", "name": "expr"}
                        ]
                    }
                }
            }
        }"#;

        let grammar = parse_grammar(json).unwrap();
        let expr_rule = grammar.rules.get("expr").unwrap();
        assert_eq!(expr_rule.precedence(), Some(1));
        assert!(matches!(expr_rule.rule_type, RuleType::PrecLeft));
    }

    #[test]
    fn invalid_json_is_reported() {
        let err = parse_grammar("{ not json").unwrap_err();
        assert!(matches!(err, GrammarError::JsonParse(_)));
        assert!(err.to_string().starts_with("JSON parse error"));
    }

    #[test]
    fn start_rule_ignores_extras_targets() {
        let mut grammar = Grammar::new(
            "test",
            [
                ("program", choice([sym("word"), string("!")])),
                ("word", pattern("[a-z]+")),
                ("comment", pattern("#.*")),
            ],
        );
        grammar.extras = Some(vec![pattern(r"\s"), sym("comment")]);
        assert_eq!(grammar.start_rule().unwrap(), "program");
    }

    #[test]
    fn widest_root_is_the_start_rule() {
        let grammar = Grammar::new(
            "test",
            [
                ("program", seq([sym("word"), sym("number")])),
                ("stray", sym("word")),
                ("word", pattern("[a-z]+")),
                ("number", pattern("[0-9]+")),
            ],
        );
        assert_eq!(grammar.start_rule().unwrap(), "program");
        assert_eq!(
            grammar.reachable_from("stray"),
            HashSet::from(["stray", "word"])
        );
    }

    #[test]
    fn recursive_root_is_the_start_rule() {
        let grammar = Grammar::new(
            "test",
            [
                ("list", seq([sym("item"), optional(sym("list"))])),
                ("item", choice([string("a"), sym("item_group")])),
                ("item_group", seq([string("("), sym("item"), string(")")])),
            ],
        );
        assert_eq!(grammar.start_rule().unwrap(), "list");
        assert!(grammar.referenced_symbols().contains("item"));
        assert!(!grammar.referenced_symbols().contains("list"));
    }

    #[test]
    fn several_roots_are_ambiguous() {
        let grammar = Grammar::new("test", [("a", string("a")), ("b", string("b"))]);
        match grammar.start_rule() {
            Err(ValidationError::AmbiguousStart(roots)) => assert_eq!(roots, ["a", "b"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
