//! `helixql`: inspect the HelixQL grammar and parse HelixQL files.
//!
//! ```text
//! helixql parse <file>            print the syntax tree as an S-expression
//! helixql grammar                 print the grammar as grammar.json
//! helixql symbols                 print the symbol and field tables
//! helixql validate <grammar.json> validate and compile a grammar
//! ```
//!
//! `-` reads the file from standard input. `--verbose` logs at debug level;
//! otherwise `RUST_LOG` applies.

use std::io;
use std::process::ExitCode;

use facet::Facet;
use tree_sitter_helixql::{
    helixql_grammar, language, parse, parse_grammar, GrammarError, Language, LanguageError,
    ParseError, SymbolKind,
};

#[derive(Debug, Facet)]
struct Args {
    /// One of `parse`, `grammar`, `symbols` or `validate`.
    #[facet(positional)]
    command: String,

    /// Input for `parse` and `validate`.
    #[facet(positional, default)]
    path: String,

    /// Log at debug level.
    #[facet(named, short = 'v', default)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Args(String),

    #[error("unknown command '{0}', expected parse, grammar, symbols or validate")]
    UnknownCommand(String),

    #[error("'{0}' needs a file argument")]
    MissingPath(&'static str),

    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0} region(s) failed to parse")]
    Unparsed(usize),
}

fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
    let args: Args = match facet_args::from_slice(&argv) {
        Ok(args) => args,
        Err(e) => return report(&CliError::Args(e.to_string())),
    };

    let mut logger = pretty_env_logger::formatted_builder();
    logger.filter_level(log::LevelFilter::Warn).parse_default_env();
    if args.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(error: &CliError) -> ExitCode {
    eprintln!("error: {error}");
    ExitCode::FAILURE
}

fn run(args: &Args) -> Result<(), CliError> {
    log::debug!("running '{}'", args.command);
    match args.command.as_str() {
        "parse" => parse_file(&read_input("parse", &args.path)?),
        "grammar" => {
            println!("{}", helixql_grammar().to_json());
            Ok(())
        }
        "symbols" => {
            print_symbols(language());
            Ok(())
        }
        "validate" => validate_grammar(&read_input("validate", &args.path)?),
        other => Err(CliError::UnknownCommand(other.to_owned())),
    }
}

fn read_input(command: &'static str, path: &str) -> Result<String, CliError> {
    let read = match path {
        "" => return Err(CliError::MissingPath(command)),
        "-" => io::read_to_string(io::stdin()),
        path => std::fs::read_to_string(path),
    };
    read.map_err(|source| CliError::Read {
        path: path.to_owned(),
        source,
    })
}

fn parse_file(source: &str) -> Result<(), CliError> {
    let tree = parse(source)?;
    println!("{}", tree.to_sexp());

    let errors: Vec<_> = tree
        .root_node()
        .descendants()
        .filter(|node| node.is_error())
        .collect();
    for node in &errors {
        eprintln!(
            "{}: cannot parse {:?}",
            node.start_position(),
            node.text()
        );
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::Unparsed(errors.len()))
    }
}

fn print_symbols(language: &Language) {
    println!("symbols:");
    for (id, symbol) in language.symbols().iter().enumerate() {
        let kind = match symbol.kind() {
            SymbolKind::Builtin => "builtin",
            _ if !symbol.is_visible() => "hidden",
            _ if symbol.is_named() => "named",
            _ => "anonymous",
        };
        println!("{id:>5}  {kind:<9}  {}", symbol.name());
    }
    println!("fields:");
    for id in 1..=language.field_count() {
        let name = u16::try_from(id)
            .ok()
            .and_then(|id| language.field_name(id))
            .unwrap_or_default();
        println!("{id:>5}  {name}");
    }
}

fn validate_grammar(json: &str) -> Result<(), CliError> {
    let grammar = parse_grammar(json)?;
    let language = Language::from_grammar(&grammar)?;
    println!(
        "{}: {} symbols, {} fields",
        language.name(),
        language.symbol_count(),
        language.field_count()
    );
    Ok(())
}
