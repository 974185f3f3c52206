//! The compiled, immutable description of a grammar.
//!
//! A [`Language`] is what a parser is driven by: the symbol table (every node
//! kind with its named / visible flags), the field table, and one compiled
//! production per symbol. It is built once from a validated [`Grammar`] and
//! never mutated afterwards, so it can be shared freely between threads.

use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::grammar::{Grammar, Rule, RuleType};
use crate::validate::{validate, ValidationError};

/// Numeric identifier of a node kind.
pub type Symbol = u16;

/// Numeric identifier of a field name. `0` means "no field".
pub type FieldId = u16;

/// Version tag of the descriptor layout produced by [`Language::from_grammar`].
pub const LANGUAGE_VERSION: u32 = 1;

/// The builtin symbol marking the end of input.
pub const END_SYMBOL: Symbol = 0;

/// The symbol given to nodes covering input that could not be parsed.
pub const ERROR_SYMBOL: Symbol = Symbol::MAX;

const END_NAME: &str = "end";
const ERROR_NAME: &str = "ERROR";

/// Errors raised while compiling a [`Grammar`] into a [`Language`].
#[derive(Debug, thiserror::Error)]
pub enum LanguageError {
    /// The grammar failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A token pattern could not be compiled.
    #[error("invalid pattern in rule '{rule}': {source}")]
    InvalidPattern {
        /// The rule containing the pattern.
        rule: String,
        /// The regex compiler's complaint.
        #[source]
        source: regex::Error,
    },

    /// The grammar uses a construct this engine does not drive.
    #[error("unsupported construct in {context}: {construct}")]
    Unsupported {
        /// Where the construct was found.
        context: String,
        /// What the construct is.
        construct: String,
    },

    /// More symbols or fields than fit in their 16-bit identifiers.
    #[error("grammar has too many {0}")]
    TooMany(&'static str),
}

/// Metadata describing one entry of the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMetadata {
    name: String,
    named: bool,
    visible: bool,
    kind: SymbolKind,
}

/// How a symbol is recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Reserved by the engine (`end`).
    Builtin,
    /// Recognised by the lexer as a single token.
    Terminal,
    /// Built from other symbols.
    NonTerminal,
}

impl SymbolMetadata {
    /// The node kind, e.g. `"query_def"` or `"::"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` for grammar rules, `false` for anonymous literal tokens.
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.named
    }

    /// `false` for hidden rules and builtins, which never appear in a tree.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// How the symbol is recognised.
    #[must_use]
    pub fn kind(&self) -> SymbolKind {
        self.kind
    }
}

/// A lexical matcher for a terminal symbol.
#[derive(Debug)]
pub(crate) enum Lexeme {
    /// Exact text. `bounded` literals end in a word character and refuse to
    /// match when another word character follows.
    Literal { text: String, bounded: bool },
    /// Start-anchored regular expression.
    Pattern(Regex),
}

/// A compiled rule body.
#[derive(Debug)]
pub(crate) enum Expr {
    Blank,
    Terminal(Symbol),
    /// An anonymous pattern inside a rule: consumed, but produces no node.
    Hidden(Regex),
    NonTerminal(Symbol),
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    Repeat(Box<Expr>),
    Repeat1(Box<Expr>),
    Field(FieldId, Box<Expr>),
}

#[derive(Debug)]
pub(crate) enum Production {
    Builtin,
    Lexical(Lexeme),
    Syntactic(Expr),
}

/// Something allowed between any two tokens.
#[derive(Debug)]
pub(crate) enum Extra {
    /// Skipped without leaving a trace (whitespace).
    Skip(Regex),
    /// Kept in the tree as an extra node (comments).
    Token(Symbol),
}

/// The immutable, compiled description of a grammar.
#[derive(Debug)]
pub struct Language {
    name: String,
    version: u32,
    symbols: Vec<SymbolMetadata>,
    symbol_index: HashMap<(String, bool), Symbol>,
    fields: Vec<String>,
    field_index: HashMap<String, FieldId>,
    start: Symbol,
    keywords: HashSet<String>,
    conflicts: Vec<Vec<Symbol>>,
    pub(crate) productions: Vec<Production>,
    pub(crate) extras: Vec<Extra>,
}

impl Language {
    /// Validates `grammar` and compiles it into a [`Language`].
    ///
    /// # Errors
    ///
    /// Returns [`LanguageError::Validation`] if the grammar is malformed,
    /// [`LanguageError::InvalidPattern`] if a token pattern does not compile,
    /// and [`LanguageError::Unsupported`] for external scanners, aliases,
    /// reserved words and non-terminal extras.
    pub fn from_grammar(grammar: &Grammar) -> Result<Self, LanguageError> {
        validate(grammar)?;
        if grammar.externals.as_ref().is_some_and(|e| !e.is_empty()) {
            return Err(unsupported("grammar", "external scanner"));
        }

        let start = grammar.start_rule()?;
        let table = SymbolTable::build(grammar, start)?;
        let fields = collect_fields(grammar);
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, name)| Ok((name.clone(), to_id(i + 1, "fields")?)))
            .collect::<Result<HashMap<_, _>, LanguageError>>()?;

        let compiler = Compiler {
            grammar,
            table: &table,
            fields: &field_index,
        };
        let productions = table
            .entries
            .iter()
            .map(|entry| compiler.production(entry))
            .collect::<Result<Vec<_>, _>>()?;
        let extras = grammar
            .extras()
            .iter()
            .map(|extra| compiler.extra(extra))
            .collect::<Result<Vec<_>, _>>()?;

        let keywords = productions
            .iter()
            .filter_map(|production| match production {
                Production::Lexical(Lexeme::Literal { text, .. }) if is_word(text) => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect();

        let conflicts = grammar
            .conflicts
            .iter()
            .flatten()
            .map(|group| {
                group
                    .iter()
                    .filter_map(|name| table.index.get(&(name.clone(), true)).copied())
                    .collect()
            })
            .collect();

        let symbols: Vec<SymbolMetadata> = table.entries.into_iter().map(|e| e.metadata).collect();
        log::debug!(
            "compiled grammar '{}': {} symbols, {} fields, start '{}'",
            grammar.name,
            symbols.len(),
            fields.len(),
            start
        );

        Ok(Self {
            name: grammar.name.clone(),
            version: LANGUAGE_VERSION,
            start: table.index[&(start.to_owned(), true)],
            symbol_index: table.index,
            symbols,
            fields,
            field_index,
            keywords,
            conflicts,
            productions,
            extras,
        })
    }

    /// The grammar's name, e.g. `"helixql"`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The descriptor layout version; see [`LANGUAGE_VERSION`].
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of entries in the symbol table (the `ERROR` symbol is not counted).
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of distinct field names.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// The symbol of the entry rule.
    #[must_use]
    pub fn start_symbol(&self) -> Symbol {
        self.start
    }

    /// Metadata of every symbol, indexed by [`Symbol`].
    #[must_use]
    pub fn symbols(&self) -> &[SymbolMetadata] {
        &self.symbols
    }

    /// The node kind of `symbol`, or `None` if it is out of range.
    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> Option<&str> {
        if symbol == ERROR_SYMBOL {
            return Some(ERROR_NAME);
        }
        self.symbols.get(usize::from(symbol)).map(SymbolMetadata::name)
    }

    /// Looks a node kind up by name; `named` distinguishes `identifier` the rule
    /// from a literal `"identifier"` token.
    #[must_use]
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<Symbol> {
        if named && name == ERROR_NAME {
            return Some(ERROR_SYMBOL);
        }
        self.symbol_index.get(&(name.to_owned(), named)).copied()
    }

    /// Whether `symbol` is a named node kind.
    #[must_use]
    pub fn symbol_is_named(&self, symbol: Symbol) -> bool {
        symbol == ERROR_SYMBOL || self.metadata(symbol).is_some_and(SymbolMetadata::is_named)
    }

    /// Whether nodes of kind `symbol` appear in trees.
    #[must_use]
    pub fn symbol_is_visible(&self, symbol: Symbol) -> bool {
        symbol == ERROR_SYMBOL || self.metadata(symbol).is_some_and(SymbolMetadata::is_visible)
    }

    /// Metadata of `symbol`, if it is in the table.
    #[must_use]
    pub fn metadata(&self, symbol: Symbol) -> Option<&SymbolMetadata> {
        self.symbols.get(usize::from(symbol))
    }

    /// The name of field `id`; ids start at 1.
    #[must_use]
    pub fn field_name(&self, id: FieldId) -> Option<&str> {
        let index = usize::from(id).checked_sub(1)?;
        self.fields.get(index).map(String::as_str)
    }

    /// The id of the field called `name`.
    #[must_use]
    pub fn field_id_for_name(&self, name: &str) -> Option<FieldId> {
        self.field_index.get(name).copied()
    }

    /// Conflict groups declared by the grammar, as symbols.
    #[must_use]
    pub fn conflicts(&self) -> &[Vec<Symbol>] {
        &self.conflicts
    }

    /// Whether `text` is a keyword: a word-like literal token of the grammar.
    #[must_use]
    pub fn is_keyword(&self, text: &str) -> bool {
        self.keywords.contains(text)
    }

    pub(crate) fn production(&self, symbol: Symbol) -> &Production {
        &self.productions[usize::from(symbol)]
    }
}

fn unsupported(context: &str, construct: &str) -> LanguageError {
    LanguageError::Unsupported {
        context: context.to_owned(),
        construct: construct.to_owned(),
    }
}

fn to_id(index: usize, what: &'static str) -> Result<u16, LanguageError> {
    u16::try_from(index)
        .ok()
        .filter(|&id| id != ERROR_SYMBOL)
        .ok_or(LanguageError::TooMany(what))
}

pub(crate) fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_word(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_word_char)
}

/// A rule whose body (under precedence wrappers) is lexical becomes a terminal symbol.
fn is_lexical(rule: &Rule) -> bool {
    matches!(
        rule.without_precedence().rule_type,
        RuleType::Token | RuleType::ImmediateToken | RuleType::String | RuleType::Pattern
    )
}

/// The literal text of `token("x")` or `"x"`, if the rule is that simple.
fn literal_text(rule: &Rule) -> Option<&str> {
    let rule = rule.without_precedence();
    match rule.rule_type {
        RuleType::String => rule.string_value(),
        RuleType::Token | RuleType::ImmediateToken => {
            rule.content.as_deref().and_then(literal_text)
        }
        _ => None,
    }
}

struct Entry<'g> {
    metadata: SymbolMetadata,
    rule: Option<&'g Rule>,
    rule_name: &'g str,
}

/// Symbols numbered in a deterministic walk from the start rule.
struct SymbolTable<'g> {
    entries: Vec<Entry<'g>>,
    index: HashMap<(String, bool), Symbol>,
}

impl<'g> SymbolTable<'g> {
    fn build(grammar: &'g Grammar, start: &'g str) -> Result<Self, LanguageError> {
        let mut table = Self {
            entries: Vec::new(),
            index: HashMap::new(),
        };
        table.push(END_NAME, false, false, SymbolKind::Builtin, None, "")?;

        let mut queue = VecDeque::new();
        table.rule(grammar, start, &mut queue)?;
        let mut extra_symbols = Vec::new();
        for extra in grammar.extras() {
            extra.collect_symbols(&mut extra_symbols);
        }
        for name in extra_symbols {
            table.rule(grammar, name, &mut queue)?;
        }
        table.drain(grammar, &mut queue)?;

        let mut rest: Vec<&'g str> = grammar
            .rules
            .keys()
            .map(String::as_str)
            .filter(|name| !table.index.contains_key(&((*name).to_owned(), true)))
            .collect();
        rest.sort_unstable();
        for name in rest {
            table.rule(grammar, name, &mut queue)?;
            table.drain(grammar, &mut queue)?;
        }
        Ok(table)
    }

    fn drain(
        &mut self,
        grammar: &'g Grammar,
        queue: &mut VecDeque<&'g Rule>,
    ) -> Result<(), LanguageError> {
        while let Some(rule) = queue.pop_front() {
            self.walk(grammar, rule, queue)?;
        }
        Ok(())
    }

    /// Numbers the rule `name` (if new) and queues its body for walking.
    fn rule(
        &mut self,
        grammar: &'g Grammar,
        name: &'g str,
        queue: &mut VecDeque<&'g Rule>,
    ) -> Result<(), LanguageError> {
        if self.index.contains_key(&(name.to_owned(), true)) {
            return Ok(());
        }
        let Some((rule_name, rule)) = grammar.rules.get_key_value(name) else {
            return Ok(());
        };
        let kind = if is_lexical(rule) {
            SymbolKind::Terminal
        } else {
            queue.push_back(rule);
            SymbolKind::NonTerminal
        };
        let visible = !Grammar::is_hidden(name);
        self.push(name, true, visible, kind, Some(rule), rule_name)
    }

    fn walk(
        &mut self,
        grammar: &'g Grammar,
        rule: &'g Rule,
        queue: &mut VecDeque<&'g Rule>,
    ) -> Result<(), LanguageError> {
        match rule.rule_type {
            RuleType::String => {
                if let Some(text) = rule.string_value() {
                    self.literal(text)?;
                }
            }
            RuleType::Token | RuleType::ImmediateToken => {
                if let Some(text) = literal_text(rule) {
                    self.literal(text)?;
                }
            }
            RuleType::Symbol => {
                if let Some(name) = rule.symbol_name() {
                    self.rule(grammar, name, queue)?;
                }
            }
            _ => {
                for sub in rule.subrules() {
                    self.walk(grammar, sub, queue)?;
                }
            }
        }
        Ok(())
    }

    fn literal(&mut self, text: &str) -> Result<(), LanguageError> {
        if self.index.contains_key(&(text.to_owned(), false)) {
            return Ok(());
        }
        self.push(text, false, true, SymbolKind::Terminal, None, "")
    }

    fn push(
        &mut self,
        name: &str,
        named: bool,
        visible: bool,
        kind: SymbolKind,
        rule: Option<&'g Rule>,
        rule_name: &'g str,
    ) -> Result<(), LanguageError> {
        let id = to_id(self.entries.len(), "symbols")?;
        self.entries.push(Entry {
            metadata: SymbolMetadata {
                name: name.to_owned(),
                named,
                visible,
                kind,
            },
            rule,
            rule_name,
        });
        self.index.insert((name.to_owned(), named), id);
        Ok(())
    }

    fn literal_symbol(&self, text: &str) -> Option<Symbol> {
        self.index.get(&(text.to_owned(), false)).copied()
    }

    fn rule_symbol(&self, name: &str) -> Option<Symbol> {
        self.index.get(&(name.to_owned(), true)).copied()
    }
}

/// Field names, sorted, as tree-sitter numbers them.
fn collect_fields(grammar: &Grammar) -> Vec<String> {
    fn walk(rule: &Rule, names: &mut Vec<String>) {
        if rule.rule_type == RuleType::Field {
            if let Some(name) = &rule.name {
                names.push(name.clone());
            }
        }
        for sub in rule.subrules() {
            walk(sub, names);
        }
    }

    let mut names = Vec::new();
    for rule in grammar.rules.values() {
        walk(rule, &mut names);
    }
    names.sort_unstable();
    names.dedup();
    names
}

struct Compiler<'a, 'g> {
    grammar: &'g Grammar,
    table: &'a SymbolTable<'g>,
    fields: &'a HashMap<String, FieldId>,
}

impl Compiler<'_, '_> {
    fn production(&self, entry: &Entry<'_>) -> Result<Production, LanguageError> {
        let metadata = &entry.metadata;
        match (metadata.kind, entry.rule) {
            (SymbolKind::Builtin, _) => Ok(Production::Builtin),
            (SymbolKind::Terminal, None) => Ok(Production::Lexical(Lexeme::Literal {
                text: metadata.name.clone(),
                bounded: metadata.name.ends_with(is_word_char),
            })),
            (SymbolKind::Terminal, Some(rule)) => {
                self.lexeme(entry.rule_name, rule).map(Production::Lexical)
            }
            (SymbolKind::NonTerminal, Some(rule)) => {
                self.expr(entry.rule_name, rule).map(Production::Syntactic)
            }
            (SymbolKind::NonTerminal, None) => Err(unsupported(&metadata.name, "missing rule body")),
        }
    }

    fn lexeme(&self, rule_name: &str, rule: &Rule) -> Result<Lexeme, LanguageError> {
        if let Some(text) = literal_text(rule) {
            return Ok(Lexeme::Literal {
                text: text.to_owned(),
                bounded: text.ends_with(is_word_char),
            });
        }
        self.regex(rule_name, rule).map(Lexeme::Pattern)
    }

    fn regex(&self, rule_name: &str, rule: &Rule) -> Result<Regex, LanguageError> {
        let body = self.regex_source(rule_name, rule)?;
        Regex::new(&format!("^(?:{body})")).map_err(|source| LanguageError::InvalidPattern {
            rule: rule_name.to_owned(),
            source,
        })
    }

    /// Translates a token's rule tree into one regular expression.
    fn regex_source(&self, rule_name: &str, rule: &Rule) -> Result<String, LanguageError> {
        let inner = |rule: &Rule| self.regex_source(rule_name, rule);
        let content = || {
            rule.content
                .as_deref()
                .ok_or_else(|| unsupported(rule_name, &format!("{} without content", rule.type_name())))
        };
        Ok(match rule.rule_type {
            RuleType::Blank => String::new(),
            RuleType::String => regex::escape(rule.string_value().unwrap_or_default()),
            RuleType::Pattern => {
                let source = rule.pattern_value().unwrap_or_default();
                match rule.flags.as_deref() {
                    Some(flags) if !flags.is_empty() => format!("(?{flags}:{source})"),
                    _ => format!("(?:{source})"),
                }
            }
            RuleType::Seq => rule
                .members
                .iter()
                .map(inner)
                .collect::<Result<Vec<_>, _>>()?
                .concat(),
            RuleType::Choice => format!(
                "(?:{})",
                rule.members
                    .iter()
                    .map(inner)
                    .collect::<Result<Vec<_>, _>>()?
                    .join("|")
            ),
            RuleType::Repeat => format!("(?:{})*", inner(content()?)?),
            RuleType::Repeat1 => format!("(?:{})+", inner(content()?)?),
            RuleType::Prec
            | RuleType::PrecLeft
            | RuleType::PrecRight
            | RuleType::PrecDynamic
            | RuleType::Token
            | RuleType::ImmediateToken => inner(content()?)?,
            RuleType::Symbol | RuleType::Field | RuleType::Alias | RuleType::Reserved => {
                return Err(unsupported(
                    rule_name,
                    &format!("{} inside a token", rule.type_name()),
                ))
            }
        })
    }

    fn expr(&self, rule_name: &str, rule: &Rule) -> Result<Expr, LanguageError> {
        let content = || {
            rule.content
                .as_deref()
                .ok_or_else(|| unsupported(rule_name, &format!("{} without content", rule.type_name())))
        };
        let members = || {
            rule.members
                .iter()
                .map(|member| self.expr(rule_name, member))
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(match rule.rule_type {
            RuleType::Blank => Expr::Blank,
            RuleType::String | RuleType::Token | RuleType::ImmediateToken => {
                match literal_text(rule).and_then(|text| self.table.literal_symbol(text)) {
                    Some(symbol) => Expr::Terminal(symbol),
                    None => Expr::Hidden(self.regex(rule_name, rule)?),
                }
            }
            RuleType::Pattern => Expr::Hidden(self.regex(rule_name, rule)?),
            RuleType::Symbol => {
                let name = rule.symbol_name().unwrap_or_default();
                let symbol = self
                    .table
                    .rule_symbol(name)
                    .ok_or_else(|| unsupported(rule_name, &format!("reference to '{name}'")))?;
                match self.grammar.rule(name) {
                    Some(target) if is_lexical(target) => Expr::Terminal(symbol),
                    _ => Expr::NonTerminal(symbol),
                }
            }
            RuleType::Seq => Expr::Seq(members()?),
            RuleType::Choice => Expr::Choice(members()?),
            RuleType::Repeat => Expr::Repeat(Box::new(self.expr(rule_name, content()?)?)),
            RuleType::Repeat1 => Expr::Repeat1(Box::new(self.expr(rule_name, content()?)?)),
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight | RuleType::PrecDynamic => {
                self.expr(rule_name, content()?)?
            }
            RuleType::Field => {
                let name = rule.name.as_deref().unwrap_or_default();
                let id = self
                    .fields
                    .get(name)
                    .copied()
                    .ok_or_else(|| unsupported(rule_name, &format!("field '{name}'")))?;
                Expr::Field(id, Box::new(self.expr(rule_name, content()?)?))
            }
            RuleType::Alias | RuleType::Reserved => {
                return Err(unsupported(rule_name, rule.type_name()));
            }
        })
    }

    fn extra(&self, rule: &Rule) -> Result<Extra, LanguageError> {
        if let Some(name) = rule.symbol_name() {
            let symbol = self
                .table
                .rule_symbol(name)
                .ok_or_else(|| unsupported("extras", &format!("reference to '{name}'")))?;
            return match self.grammar.rule(name) {
                Some(target) if is_lexical(target) => Ok(Extra::Token(symbol)),
                _ => Err(unsupported("extras", &format!("non-terminal extra '{name}'"))),
            };
        }
        self.regex("extras", rule).map(Extra::Skip)
    }
}
