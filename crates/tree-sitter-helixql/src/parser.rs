//! Turns source text into a [`Tree`] by interpreting a [`Language`]'s productions.
//!
//! The engine is a memoising top-down interpreter: choices are ordered, every
//! `(symbol, offset)` pair is parsed at most once, and extras are skipped in
//! front of each token. Its lexical decisions follow tree-sitter's lexer:
//! a keyword never matches the prefix of a longer word, and a pattern token
//! never matches text that is exactly a keyword.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use regex::Regex;

use crate::language::{
    is_word_char, Expr, Extra, FieldId, Language, Lexeme, Production, Symbol, ERROR_SYMBOL,
};
use crate::tree::{Point, RawChild, RawNode, Tree};

/// Tunables for a [`Parser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Wrap unparseable input in `ERROR` nodes instead of failing.
    ///
    /// Recovery needs a start rule that is a repetition; other grammars
    /// report a [`ParseError::Syntax`] either way.
    pub recover: bool,

    /// Maximum nesting of rules before giving up with [`ParseError::TooDeep`].
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            recover: true,
            max_depth: 512,
        }
    }
}

/// Why a parse produced no tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The input does not match the grammar.
    #[error("syntax error at {position}: unexpected {found}, expected one of: {}", .expected.join(", "))]
    Syntax {
        /// Where the furthest attempt failed.
        position: Point,
        /// Byte offset of `position`.
        offset: usize,
        /// The text found there, or `end of input`.
        found: String,
        /// Descriptions of the tokens that would have been accepted.
        expected: Vec<String>,
    },

    /// Rules nested deeper than [`ParserConfig::max_depth`].
    #[error("input nests deeper than {limit} rules at {position}")]
    TooDeep {
        /// Where the limit was hit.
        position: Point,
        /// The configured limit.
        limit: usize,
    },
}

/// Parses source text for one [`Language`].
///
/// A `Parser` holds no per-parse state, so it can be reused and shared.
#[derive(Debug, Clone, Copy)]
pub struct Parser<'l> {
    language: &'l Language,
    config: ParserConfig,
}

impl<'l> Parser<'l> {
    /// Creates a parser for `language` with the default [`ParserConfig`].
    #[must_use]
    pub fn new(language: &'l Language) -> Self {
        Self {
            language,
            config: ParserConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// The language this parser drives.
    #[must_use]
    pub fn language(&self) -> &'l Language {
        self.language
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> ParserConfig {
        self.config
    }

    /// Parses `source` into a syntax tree.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Syntax`] when the input does not match and cannot
    /// be recovered, and [`ParseError::TooDeep`] when nesting exceeds the limit.
    pub fn parse(&self, source: &str) -> Result<Tree<'l>, ParseError> {
        let mut run = Run::new(self.language, source, self.config);
        let outcome = run.root();
        if let Some(offset) = run.too_deep {
            return Err(ParseError::TooDeep {
                position: Point::locate(source, offset),
                limit: self.config.max_depth,
            });
        }
        let children = outcome.ok_or_else(|| run.syntax_error())?;
        log::debug!(
            "parsed {} bytes with {} memo entries",
            source.len(),
            run.memo.len()
        );

        let root = RawNode {
            symbol: self.language.start_symbol(),
            start: 0,
            end: source.len(),
            extra: false,
            children,
        };
        Ok(Tree::build(self.language, source, &root))
    }
}

type Memo = Option<(Rc<[RawChild]>, usize)>;

/// The state of one call to [`Parser::parse`].
struct Run<'p> {
    language: &'p Language,
    source: &'p str,
    config: ParserConfig,
    memo: HashMap<(Symbol, usize), Memo>,
    depth: usize,
    too_deep: Option<usize>,
    furthest: usize,
    expected: BTreeSet<String>,
}

impl<'p> Run<'p> {
    fn new(language: &'p Language, source: &'p str, config: ParserConfig) -> Self {
        Self {
            language,
            source,
            config,
            memo: HashMap::new(),
            depth: 0,
            too_deep: None,
            furthest: 0,
            expected: BTreeSet::new(),
        }
    }

    /// Parses the start rule over the whole input, returning the root's children.
    fn root(&mut self) -> Option<Vec<RawChild>> {
        let language = self.language;
        let Production::Syntactic(expr) = language.production(language.start_symbol()) else {
            // A lexical start rule: the whole input is one token.
            let mut out = Vec::new();
            let end = self.terminal(language.start_symbol(), 0, &mut out)?;
            let end = self.skip_extras(end, &mut out);
            return (end == self.source.len()).then_some(out);
        };

        match expr {
            Expr::Repeat(item) | Expr::Repeat1(item) if self.config.recover => {
                self.recovering_repeat(item, matches!(expr, Expr::Repeat1(_)))
            }
            _ => {
                let mut out = Vec::new();
                let end = self.expr(expr, 0, &mut out)?;
                let end = self.skip_extras(end, &mut out);
                (end == self.source.len()).then_some(out)
            }
        }
    }

    /// Matches `item` repeatedly up to the end of input, wrapping every stretch
    /// in which no item can start in an `ERROR` node.
    fn recovering_repeat(&mut self, item: &'p Expr, at_least_one: bool) -> Option<Vec<RawChild>> {
        let mut out = Vec::new();
        let mut pos = 0;
        let mut matched_any = false;
        loop {
            pos = self.repeat(item, pos, &mut out, &mut matched_any);
            pos = self.skip_extras(pos, &mut out);
            if pos >= self.source.len() || self.too_deep.is_some() {
                break;
            }

            let error_start = pos;
            log::debug!("{}", self.syntax_error());
            let (error_end, resume) = self.resynchronise(item, pos);
            log::trace!("skipping bytes {error_start}..{error_end}");
            out.push(RawChild {
                field: 0,
                node: Rc::new(RawNode {
                    symbol: ERROR_SYMBOL,
                    start: error_start,
                    end: error_end,
                    extra: false,
                    children: Vec::new(),
                }),
            });
            pos = resume;
        }

        if at_least_one && !matched_any && out.is_empty() {
            return None;
        }
        Some(out)
    }

    /// Steps over one lexeme at a time from `pos` until `item` or an extra
    /// token can start. Returns the end of the skipped text and the offset to
    /// resume at.
    fn resynchronise(&mut self, item: &'p Expr, pos: usize) -> (usize, usize) {
        let mut end = pos;
        let mut scan = pos;
        while scan < self.source.len() {
            end = next_lexeme_end(self.source, scan);
            scan = end + leading_whitespace(&self.source[end..]);
            if scan >= self.source.len() {
                break;
            }
            let mut extras = Vec::new();
            self.skip_extras(scan, &mut extras);
            if !extras.is_empty() {
                break;
            }
            let mut probe = Vec::new();
            if self.expr(item, scan, &mut probe).is_some() {
                break;
            }
        }
        (end, scan)
    }

    fn syntax_error(&self) -> ParseError {
        let offset = self.furthest;
        let rest = &self.source[offset..];
        let found = if rest.is_empty() {
            "end of input".to_owned()
        } else {
            format!("'{}'", &rest[..next_lexeme_end(rest, 0)])
        };
        ParseError::Syntax {
            position: Point::locate(self.source, offset),
            offset,
            found,
            expected: self.expected.iter().cloned().collect(),
        }
    }

    fn expect(&mut self, pos: usize, what: impl FnOnce() -> String) {
        if pos > self.furthest {
            self.furthest = pos;
            self.expected.clear();
        }
        if pos == self.furthest {
            self.expected.insert(what());
        }
    }

    fn expr(&mut self, expr: &'p Expr, pos: usize, out: &mut Vec<RawChild>) -> Option<usize> {
        if self.too_deep.is_some() {
            return None;
        }
        match expr {
            Expr::Blank => Some(pos),
            Expr::Terminal(symbol) => self.terminal(*symbol, pos, out),
            Expr::Hidden(regex) => self.hidden(regex, pos, out),
            Expr::NonTerminal(symbol) => self.nonterminal(*symbol, pos, out),
            Expr::Seq(members) => {
                let mark = out.len();
                let mut pos = pos;
                for member in members {
                    match self.expr(member, pos, out) {
                        Some(next) => pos = next,
                        None => {
                            out.truncate(mark);
                            return None;
                        }
                    }
                }
                Some(pos)
            }
            Expr::Choice(alternatives) => {
                let mark = out.len();
                for alternative in alternatives {
                    if let Some(next) = self.expr(alternative, pos, out) {
                        return Some(next);
                    }
                    out.truncate(mark);
                }
                None
            }
            Expr::Repeat(item) => Some(self.repeat(item, pos, out, &mut false)),
            Expr::Repeat1(item) => {
                let mut matched = false;
                let end = self.repeat(item, pos, out, &mut matched);
                matched.then_some(end)
            }
            Expr::Field(field, content) => {
                let mark = out.len();
                let end = self.expr(content, pos, out)?;
                label(&mut out[mark..], *field);
                Some(end)
            }
        }
    }

    /// Matches `item` as often as possible; a match that consumes nothing ends the loop.
    fn repeat(
        &mut self,
        item: &'p Expr,
        mut pos: usize,
        out: &mut Vec<RawChild>,
        matched: &mut bool,
    ) -> usize {
        loop {
            let mark = out.len();
            match self.expr(item, pos, out) {
                Some(next) if next > pos => {
                    pos = next;
                    *matched = true;
                }
                _ => {
                    out.truncate(mark);
                    return pos;
                }
            }
        }
    }

    fn nonterminal(&mut self, symbol: Symbol, pos: usize, out: &mut Vec<RawChild>) -> Option<usize> {
        let key = (symbol, pos);
        let memo = match self.memo.get(&key) {
            Some(memo) => memo.clone(),
            None => {
                let memo = self.parse_production(symbol, pos);
                self.memo.insert(key, memo.clone());
                memo
            }
        };
        let (children, end) = memo?;
        self.emit(symbol, pos, &children, out);
        Some(end)
    }

    fn parse_production(&mut self, symbol: Symbol, pos: usize) -> Memo {
        let language = self.language;
        let Production::Syntactic(expr) = language.production(symbol) else {
            return None;
        };
        if self.depth >= self.config.max_depth {
            self.too_deep.get_or_insert(pos);
            return None;
        }

        // Fails any re-entry at the same offset, which only left recursion could cause.
        self.memo.insert((symbol, pos), None);
        self.depth += 1;
        let mut children = Vec::new();
        let end = self.expr(expr, pos, &mut children);
        self.depth -= 1;
        end.map(|end| (Rc::from(children), end))
    }

    /// Adds the result of a non-terminal to `out`: hidden rules are spliced in,
    /// visible ones become a node. Leading extras are hoisted in front of the node.
    fn emit(&self, symbol: Symbol, pos: usize, children: &[RawChild], out: &mut Vec<RawChild>) {
        if !self.language.symbol_is_visible(symbol) {
            out.extend_from_slice(children);
            return;
        }
        let leading = children.iter().take_while(|c| c.node.extra).count();
        out.extend_from_slice(&children[..leading]);
        let children = children[leading..].to_vec();
        let (start, end) = match (children.first(), children.last()) {
            (Some(first), Some(last)) => (first.node.start, last.node.end),
            _ => (pos, pos),
        };
        out.push(RawChild {
            field: 0,
            node: Rc::new(RawNode {
                symbol,
                start,
                end,
                extra: false,
                children,
            }),
        });
    }

    fn terminal(&mut self, symbol: Symbol, pos: usize, out: &mut Vec<RawChild>) -> Option<usize> {
        let mark = out.len();
        let start = self.skip_extras(pos, out);
        let Some(len) = self.lex(symbol, start) else {
            let language = self.language;
            self.expect(start, || describe(language, symbol));
            out.truncate(mark);
            return None;
        };
        out.push(RawChild {
            field: 0,
            node: Rc::new(RawNode {
                symbol,
                start,
                end: start + len,
                extra: false,
                children: Vec::new(),
            }),
        });
        Some(start + len)
    }

    fn hidden(&mut self, regex: &Regex, pos: usize, out: &mut Vec<RawChild>) -> Option<usize> {
        let mark = out.len();
        let start = self.skip_extras(pos, out);
        match regex.find(&self.source[start..]) {
            Some(m) if m.end() > 0 => Some(start + m.end()),
            _ => {
                self.expect(start, || format!("/{}/", regex.as_str()));
                out.truncate(mark);
                None
            }
        }
    }

    /// Length of the token `symbol` at `pos`, if it matches there.
    fn lex(&self, symbol: Symbol, pos: usize) -> Option<usize> {
        let rest = &self.source[pos..];
        match self.language.production(symbol) {
            Production::Lexical(Lexeme::Literal { text, bounded }) => {
                let after = rest.strip_prefix(text.as_str())?;
                let runs_on = *bounded && after.starts_with(is_word_char);
                (!runs_on).then_some(text.len())
            }
            Production::Lexical(Lexeme::Pattern(regex)) => {
                let m = regex.find(rest)?;
                (m.end() > 0 && !self.language.is_keyword(m.as_str())).then_some(m.end())
            }
            Production::Builtin | Production::Syntactic(_) => None,
        }
    }

    /// Consumes extras from `pos`, keeping extra tokens (comments) as nodes.
    fn skip_extras(&self, mut pos: usize, out: &mut Vec<RawChild>) -> usize {
        loop {
            let before = pos;
            for extra in &self.language.extras {
                match extra {
                    Extra::Skip(regex) => {
                        if let Some(m) = regex.find(&self.source[pos..]) {
                            pos += m.end();
                        }
                    }
                    Extra::Token(symbol) => {
                        if let Some(len) = self.lex(*symbol, pos).filter(|&len| len > 0) {
                            out.push(RawChild {
                                field: 0,
                                node: Rc::new(RawNode {
                                    symbol: *symbol,
                                    start: pos,
                                    end: pos + len,
                                    extra: true,
                                    children: Vec::new(),
                                }),
                            });
                            pos += len;
                        }
                    }
                }
            }
            if pos == before {
                return pos;
            }
        }
    }
}

/// Gives `field` to every node in `children` that is not an extra and has no field yet.
fn label(children: &mut [RawChild], field: FieldId) {
    for child in children {
        if child.field == 0 && !child.node.extra {
            child.field = field;
        }
    }
}

fn describe(language: &Language, symbol: Symbol) -> String {
    let name = language.symbol_name(symbol).unwrap_or("?");
    if language.symbol_is_named(symbol) {
        name.to_owned()
    } else {
        format!("'{name}'")
    }
}

fn leading_whitespace(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

/// End of the lexeme starting at `pos`: a run of word characters, or one other character.
fn next_lexeme_end(text: &str, pos: usize) -> usize {
    let rest = &text[pos..];
    let mut chars = rest.char_indices();
    match chars.next() {
        None => pos,
        Some((_, ch)) if is_word_char(ch) => {
            pos + rest
                .find(|c: char| !is_word_char(c))
                .unwrap_or(rest.len())
        }
        Some((_, ch)) => pos + ch.len_utf8(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::{choice, field, optional, pattern, repeat, seq, string, sym, token};
    use crate::grammar::Grammar;

    fn tiny() -> Language {
        let mut grammar = Grammar::new(
            "tiny",
            [
                ("program", repeat(sym("statement"))),
                (
                    "statement",
                    seq([
                        string("let"),
                        field("name", sym("identifier")),
                        string("="),
                        field("value", sym("_value")),
                        optional(string(";")),
                    ]),
                ),
                ("_value", choice([sym("number"), sym("identifier")])),
                ("number", token(pattern(r"\d+"))),
                ("identifier", pattern("[a-z]+")),
                ("comment", token(seq([string("#"), pattern(".*")]))),
            ],
        );
        grammar.extras = Some(vec![pattern(r"\s"), sym("comment")]);
        Language::from_grammar(&grammar).unwrap()
    }

    #[test]
    fn parses_fields_and_splices_hidden_rules() {
        let language = tiny();
        let tree = Parser::new(&language).parse("let x = 1;\nlet y = x").unwrap();
        assert_eq!(
            tree.to_sexp(),
            "(program (statement name: (identifier) value: (number)) \
             (statement name: (identifier) value: (identifier)))"
        );
        assert!(!tree.has_error());
    }

    #[test]
    fn keywords_do_not_match_word_prefixes() {
        let language = tiny();
        let err = Parser::new(&language)
            .with_config(ParserConfig {
                recover: false,
                ..ParserConfig::default()
            })
            .parse("letx = 1")
            .unwrap_err();
        assert!(matches!(err, ParseError::Syntax { offset: 0, .. }));
    }

    #[test]
    fn identifiers_cannot_be_keywords() {
        let language = tiny();
        let parser = Parser::new(&language).with_config(ParserConfig {
            recover: false,
            ..ParserConfig::default()
        });
        assert!(parser.parse("let let = 1").is_err());
        assert!(parser.parse("let lets = 1").is_ok());
    }

    #[test]
    fn comments_become_extra_nodes() {
        let language = tiny();
        let tree = Parser::new(&language)
            .parse("# leading\nlet x = # inside\n 2")
            .unwrap();
        let root = tree.root_node();
        let kinds: Vec<&str> = root.children().map(|n| n.kind()).collect();
        assert_eq!(kinds, ["comment", "statement"]);
        assert!(root.child(0).unwrap().is_extra());

        let statement = root.child(1).unwrap();
        let value = statement.child_by_field_name("value").unwrap();
        assert_eq!(value.text(), "2");
        assert!(statement.children().any(|n| n.is_extra() && n.text() == "# inside"));
    }

    #[test]
    fn reports_furthest_failure() {
        let language = tiny();
        let parser = Parser::new(&language).with_config(ParserConfig {
            recover: false,
            ..ParserConfig::default()
        });
        let err = parser.parse("let x = 1\nlet = 2").unwrap_err();
        match err {
            ParseError::Syntax {
                position,
                found,
                expected,
                ..
            } => {
                assert_eq!(position, Point { row: 1, column: 4 });
                assert_eq!(found, "'='");
                assert_eq!(expected, ["identifier"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn recovers_with_error_nodes() {
        let language = tiny();
        let tree = Parser::new(&language)
            .parse("let x = 1 ??? nonsense let y = 2")
            .unwrap();
        assert!(tree.has_error());
        let root = tree.root_node();
        let kinds: Vec<&str> = root.children().map(|n| n.kind()).collect();
        assert_eq!(kinds, ["statement", "ERROR", "statement"]);
        assert_eq!(root.child(1).unwrap().text(), "??? nonsense");
    }

    #[test]
    fn trailing_garbage_is_an_error_node() {
        let language = tiny();
        let tree = Parser::new(&language).parse("let x = 1 !!").unwrap();
        let last = tree.root_node().child(1).unwrap();
        assert!(last.is_error());
        assert_eq!(last.text(), "!!");
    }

    #[test]
    fn comments_split_error_nodes() {
        let language = tiny();
        let tree = Parser::new(&language)
            .parse("let x = 1 ??? # note\nnonsense let y = 2 !! # trailing")
            .unwrap();
        let root = tree.root_node();
        let kinds: Vec<&str> = root.children().map(|n| n.kind()).collect();
        assert_eq!(
            kinds,
            ["statement", "ERROR", "comment", "ERROR", "statement", "ERROR", "comment"]
        );
        assert_eq!(root.child(1).unwrap().text(), "???");
        assert!(root.child(2).unwrap().is_extra());
        assert_eq!(root.child(3).unwrap().text(), "nonsense");
        assert_eq!(root.child(5).unwrap().text(), "!!");
        assert_eq!(root.child(6).unwrap().text(), "# trailing");
    }

    #[test]
    fn sequence_start_rule_does_not_recover() {
        let mut grammar = Grammar::new(
            "assignment",
            [
                (
                    "assignment",
                    seq([sym("identifier"), string("="), sym("number")]),
                ),
                ("identifier", pattern("[a-z]+")),
                ("number", token(pattern(r"\d+"))),
            ],
        );
        grammar.extras = Some(vec![pattern(r"\s")]);
        let language = Language::from_grammar(&grammar).unwrap();
        let parser = Parser::new(&language);
        assert!(ParserConfig::default().recover);

        assert!(parser.parse("x = 1").is_ok());
        match parser.parse("x = ?") {
            Err(ParseError::Syntax { offset, found, .. }) => {
                assert_eq!(offset, 4);
                assert_eq!(found, "'?'");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_an_empty_program() {
        let language = tiny();
        let tree = Parser::new(&language).parse("  \n").unwrap();
        assert_eq!(tree.to_sexp(), "(program)");
        assert_eq!(tree.root_node().child_count(), 0);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let grammar = Grammar::new(
            "nested",
            [
                ("program", repeat(sym("group"))),
                ("group", seq([string("("), repeat(sym("group")), string(")")])),
            ],
        );
        let language = Language::from_grammar(&grammar).unwrap();
        let source = format!("{}{}", "(".repeat(40), ")".repeat(40));
        let parser = Parser::new(&language).with_config(ParserConfig {
            recover: false,
            max_depth: 16,
        });
        assert!(matches!(
            parser.parse(&source),
            Err(ParseError::TooDeep { limit: 16, .. })
        ));
        assert!(Parser::new(&language).parse(&source).is_ok());
    }
}
