//! Checks a [`Grammar`] must pass before it becomes a
//! [`Language`](crate::language::Language).
//!
//! Hard failures are returned as [`ValidationError`]. Unreachable rules and
//! mixed precedence levels are only logged.

use crate::grammar::{Grammar, Rule, RuleType};
use std::collections::{HashMap, HashSet};

/// Why a grammar was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The grammar defines no rules at all.
    #[error("grammar has no rules")]
    NoRules,

    /// A rule (or grammar-level list) refers to a rule that is not defined.
    #[error("undefined symbol '{symbol}' referenced in {context}")]
    UndefinedSymbol {
        /// The missing rule name.
        symbol: String,
        /// Where the reference was found.
        context: String,
    },

    /// No single unreferenced rule stands out as the entry point.
    #[error("cannot determine the start rule; unreferenced rules: {0:?}")]
    AmbiguousStart(Vec<String>),

    /// A rule can reach itself without consuming input.
    #[error("rule '{rule}' is left-recursive (via {path})")]
    LeftRecursion {
        /// The recursive rule.
        rule: String,
        /// The chain of leftmost references, e.g. `a -> b -> a`.
        path: String,
    },
}

/// Validates `grammar`.
///
/// Every referenced name must be defined, one start rule must stand out, and
/// no rule may reach itself through leftmost references. Rules unreachable
/// from the start rule or the extras are logged as warnings.
///
/// # Errors
///
/// The first [`ValidationError`] found.
pub fn validate(grammar: &Grammar) -> Result<(), ValidationError> {
    check_undefined_symbols(grammar)?;

    let start = grammar.start_rule()?;
    check_unreachable_rules(grammar, start);

    check_left_recursion(grammar)?;

    check_precedence(grammar);

    Ok(())
}

fn check_undefined_symbols(grammar: &Grammar) -> Result<(), ValidationError> {
    let defined: HashSet<&str> = grammar.rules.keys().map(String::as_str).collect();
    let require = |symbol: &str, context: &dyn Fn() -> String| {
        if defined.contains(symbol) {
            Ok(())
        } else {
            Err(ValidationError::UndefinedSymbol {
                symbol: symbol.to_owned(),
                context: context(),
            })
        }
    };

    for (rule_name, rule) in &grammar.rules {
        let mut symbols = Vec::new();
        rule.collect_symbols(&mut symbols);
        for symbol in symbols {
            require(symbol, &|| format!("rule '{rule_name}'"))?;
        }
    }

    let mut extras = Vec::new();
    for extra in grammar.extras() {
        extra.collect_symbols(&mut extras);
    }
    for symbol in extras {
        require(symbol, &|| "extras".to_owned())?;
    }

    let lists = [
        ("conflicts", grammar.conflicts.iter().flatten().flatten().collect::<Vec<_>>()),
        ("supertypes", grammar.supertypes.iter().flatten().collect()),
        ("inline", grammar.inline.iter().flatten().collect()),
        ("word", grammar.word.iter().collect()),
    ];
    for (context, names) in lists {
        for name in names {
            require(name.as_str(), &|| context.to_owned())?;
        }
    }

    Ok(())
}

fn check_unreachable_rules(grammar: &Grammar, start: &str) {
    let mut reachable = grammar.reachable_from(start);
    let mut extras = Vec::new();
    for extra in grammar.extras() {
        extra.collect_symbols(&mut extras);
    }
    for extra in extras {
        reachable.extend(grammar.reachable_from(extra));
    }

    for rule_name in grammar.rules.keys() {
        let inline_contains = grammar
            .inline
            .as_ref()
            .is_some_and(|v| v.contains(rule_name));

        if !reachable.contains(rule_name.as_str()) && !inline_contains {
            log::warn!("unreachable rule '{rule_name}'");
        }
    }
}

fn check_left_recursion(grammar: &Grammar) -> Result<(), ValidationError> {
    let mut names: Vec<&str> = grammar.rules.keys().map(String::as_str).collect();
    names.sort_unstable();

    let leftmost: HashMap<&str, Vec<&str>> = names
        .iter()
        .map(|&name| {
            let mut firsts = Vec::new();
            if let Some(rule) = grammar.rules.get(name) {
                collect_leftmost_symbols(rule, &mut firsts);
            }
            (name, firsts)
        })
        .collect();

    let mut cleared = HashSet::new();
    for name in names {
        let mut path = vec![name];
        if let Some(cycle) = find_cycle(name, &leftmost, &mut path, &mut cleared) {
            return Err(ValidationError::LeftRecursion {
                rule: name.to_owned(),
                path: cycle.join(" -> "),
            });
        }
    }
    Ok(())
}

/// Depth-first search along leftmost references, returning the path once it
/// arrives back at its first element.
fn find_cycle<'g>(
    target: &'g str,
    leftmost: &HashMap<&'g str, Vec<&'g str>>,
    path: &mut Vec<&'g str>,
    cleared: &mut HashSet<&'g str>,
) -> Option<Vec<&'g str>> {
    let current = *path.last()?;
    for &next in leftmost.get(current).into_iter().flatten() {
        if next == target {
            let mut cycle = path.clone();
            cycle.push(next);
            return Some(cycle);
        }
        if cleared.contains(next) || path.contains(&next) {
            continue;
        }
        path.push(next);
        let found = find_cycle(target, leftmost, path, cleared);
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    if current == target {
        cleared.insert(target);
    }
    None
}

/// Collects the symbols that can begin a match of `rule`.
fn collect_leftmost_symbols<'r>(rule: &'r Rule, symbols: &mut Vec<&'r str>) {
    match rule.rule_type {
        RuleType::Symbol => {
            if let Some(name) = &rule.name {
                symbols.push(name);
            }
        }

        RuleType::Seq => {
            for member in &rule.members {
                collect_leftmost_symbols(member, symbols);
                if !member.is_blank_matching() {
                    break;
                }
            }
        }

        RuleType::Choice => {
            for member in &rule.members {
                collect_leftmost_symbols(member, symbols);
            }
        }

        RuleType::Repeat
        | RuleType::Repeat1
        | RuleType::Prec
        | RuleType::PrecLeft
        | RuleType::PrecRight
        | RuleType::PrecDynamic
        | RuleType::Field
        | RuleType::Alias => {
            if let Some(content) = &rule.content {
                collect_leftmost_symbols(content, symbols);
            }
        }

        RuleType::Blank
        | RuleType::String
        | RuleType::Pattern
        | RuleType::Token
        | RuleType::ImmediateToken
        | RuleType::Reserved => {}
    }
}

fn check_precedence(grammar: &Grammar) {
    let mut prec_levels: HashMap<&str, Vec<i32>> = HashMap::new();

    for (rule_name, rule) in &grammar.rules {
        collect_precedence_levels(rule, &mut prec_levels, rule_name);
    }

    // Ordered choice decides what precedence would; record it for grammar authors.
    for (rule, levels) in &prec_levels {
        if levels.len() > 1 {
            log::debug!("rule '{rule}' has multiple precedence levels: {levels:?}");
        }
    }
}

fn collect_precedence_levels<'g>(
    rule: &Rule,
    levels: &mut HashMap<&'g str, Vec<i32>>,
    context: &'g str,
) {
    if let Some(p) = rule.precedence() {
        levels.entry(context).or_default().push(p);
    }
    for sub in rule.subrules() {
        collect_precedence_levels(sub, levels, context);
    }
}
