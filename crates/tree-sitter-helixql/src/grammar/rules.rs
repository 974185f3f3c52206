//! The rule tree of a grammar, one node per `{"type": ...}` object in
//! `grammar.json`.

use facet::Facet;

/// One node of a grammar's rule tree.
///
/// Which fields are set depends on [`Rule::rule_type`]: `SEQ` and `CHOICE`
/// carry `members`, wrappers such as `REPEAT`, `FIELD` or `PREC` carry
/// `content`, and leaves keep their text in `value`.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Rule {
    /// The JSON `type` tag.
    #[facet(rename = "type")]
    pub rule_type: RuleType,

    /// Literal text, pattern source, or precedence level.
    #[facet(default)]
    pub value: Option<RuleValue>,

    /// Target of a `SYMBOL`, or the label of a `FIELD` / `ALIAS`.
    #[facet(default)]
    pub name: Option<String>,

    /// The wrapped rule.
    #[facet(default)]
    pub content: Option<Box<Rule>>,

    /// Operands of `SEQ` and `CHOICE`.
    #[facet(default)]
    pub members: Vec<Rule>,

    /// For `ALIAS`: whether the alias is a named node.
    #[facet(default)]
    pub named: Option<bool>,

    /// Regex flags of a `PATTERN`, e.g. `i`.
    #[facet(default)]
    pub flags: Option<String>,

    /// For `RESERVED`: the reserved word set in force.
    #[facet(default)]
    pub context_name: Option<String>,
}

/// The scalar held in [`Rule::value`].
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum RuleValue {
    /// Text of a `STRING` or source of a `PATTERN`.
    String(String),

    /// Level of a `PREC*` wrapper.
    Integer(i32),
}

/// The `type` tags of `grammar.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum RuleType {
    /// Matches nothing.
    #[facet(rename = "BLANK")]
    Blank,
    /// Exact text.
    #[facet(rename = "STRING")]
    String,
    /// A regular expression.
    #[facet(rename = "PATTERN")]
    Pattern,
    /// Another rule, by name.
    #[facet(rename = "SYMBOL")]
    Symbol,
    /// The first of `members` that matches.
    #[facet(rename = "CHOICE")]
    Choice,
    /// All of `members`, in order.
    #[facet(rename = "SEQ")]
    Seq,
    /// `content`, zero or more times.
    #[facet(rename = "REPEAT")]
    Repeat,
    /// `content`, at least once.
    #[facet(rename = "REPEAT1")]
    Repeat1,
    /// `content` at a precedence level.
    #[facet(rename = "PREC")]
    Prec,
    /// `content`, left associative.
    #[facet(rename = "PREC_LEFT")]
    PrecLeft,
    /// `content`, right associative.
    #[facet(rename = "PREC_RIGHT")]
    PrecRight,
    /// `content` with a dynamic precedence.
    #[facet(rename = "PREC_DYNAMIC")]
    PrecDynamic,
    /// `content`, labelled with field `name`.
    #[facet(rename = "FIELD")]
    Field,
    /// `content`, renamed in the tree.
    #[facet(rename = "ALIAS")]
    Alias,
    /// `content` lexed as a single token.
    #[facet(rename = "TOKEN")]
    Token,
    /// A token that may not follow extras.
    #[facet(rename = "IMMEDIATE_TOKEN")]
    ImmediateToken,
    /// `content` under a reserved word set.
    #[facet(rename = "RESERVED")]
    Reserved,
}

impl Rule {
    /// Creates a bare rule of the given type with every optional part empty.
    #[must_use]
    pub fn new(rule_type: RuleType) -> Self {
        Self {
            rule_type,
            value: None,
            name: None,
            content: None,
            members: Vec::new(),
            named: None,
            flags: None,
            context_name: None,
        }
    }

    /// The JSON `type` tag, e.g. `"PREC_LEFT"`.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.rule_type {
            RuleType::Blank => "BLANK",
            RuleType::String => "STRING",
            RuleType::Pattern => "PATTERN",
            RuleType::Symbol => "SYMBOL",
            RuleType::Choice => "CHOICE",
            RuleType::Seq => "SEQ",
            RuleType::Repeat => "REPEAT",
            RuleType::Repeat1 => "REPEAT1",
            RuleType::Prec => "PREC",
            RuleType::PrecLeft => "PREC_LEFT",
            RuleType::PrecRight => "PREC_RIGHT",
            RuleType::PrecDynamic => "PREC_DYNAMIC",
            RuleType::Field => "FIELD",
            RuleType::Alias => "ALIAS",
            RuleType::Token => "TOKEN",
            RuleType::ImmediateToken => "IMMEDIATE_TOKEN",
            RuleType::Reserved => "RESERVED",
        }
    }

    /// Whether this is a `STRING` or `PATTERN` leaf.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.rule_type == RuleType::String || self.rule_type == RuleType::Pattern
    }

    /// Whether this is a `SYMBOL`.
    #[must_use]
    pub fn is_symbol(&self) -> bool {
        self.rule_type == RuleType::Symbol
    }

    /// Whether this is one of the `PREC*` wrappers.
    #[must_use]
    pub fn is_precedence(&self) -> bool {
        matches!(
            self.rule_type,
            RuleType::Prec | RuleType::PrecLeft | RuleType::PrecRight | RuleType::PrecDynamic
        )
    }

    /// The rule a `SYMBOL` points at.
    #[must_use]
    pub fn symbol_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|_| self.is_symbol())
    }

    /// The level of a `PREC*` wrapper.
    #[must_use]
    pub fn precedence(&self) -> Option<i32> {
        match self.value {
            Some(RuleValue::Integer(level)) if self.is_precedence() => Some(level),
            _ => None,
        }
    }

    /// The text of a `STRING`.
    #[must_use]
    pub fn string_value(&self) -> Option<&str> {
        self.text_value().filter(|_| self.rule_type == RuleType::String)
    }

    /// The source of a `PATTERN`.
    #[must_use]
    pub fn pattern_value(&self) -> Option<&str> {
        self.text_value().filter(|_| self.rule_type == RuleType::Pattern)
    }

    fn text_value(&self) -> Option<&str> {
        match &self.value {
            Some(RuleValue::String(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Returns the rule beneath any precedence wrappers.
    #[must_use]
    pub fn without_precedence(&self) -> &Rule {
        let mut rule = self;
        while rule.is_precedence() {
            match &rule.content {
                Some(content) => rule = content,
                None => break,
            }
        }
        rule
    }

    /// Iterates over the direct sub-rules (`content` first, then `members`).
    pub fn subrules(&self) -> impl Iterator<Item = &Rule> {
        self.content
            .as_deref()
            .into_iter()
            .chain(self.members.iter())
    }

    /// Pushes the name of every symbol referenced anywhere beneath this rule.
    pub fn collect_symbols<'r>(&'r self, symbols: &mut Vec<&'r str>) {
        if let Some(name) = self.symbol_name() {
            symbols.push(name);
        }
        for sub in self.subrules() {
            sub.collect_symbols(symbols);
        }
    }

    /// Returns `true` if this rule can match the empty string without consuming input.
    ///
    /// Symbol references are treated as non-empty; this is a structural check only.
    #[must_use]
    pub fn is_blank_matching(&self) -> bool {
        match self.rule_type {
            RuleType::Blank | RuleType::Repeat => true,
            RuleType::Choice => self.members.iter().any(Rule::is_blank_matching),
            RuleType::Seq => self.members.iter().all(Rule::is_blank_matching),
            RuleType::Repeat1
            | RuleType::Prec
            | RuleType::PrecLeft
            | RuleType::PrecRight
            | RuleType::PrecDynamic
            | RuleType::Field
            | RuleType::Alias => self.content.as_deref().is_some_and(Rule::is_blank_matching),
            _ => false,
        }
    }
}
