//! C ABI for the HelixQL language descriptor.
//!
//! [`tree_sitter_helixql`] is the entry point C and C++ hosts link against; it
//! hands out the process-wide [`Language`] as an opaque [`TSLanguage`] pointer.
//! The `helixql_language_*` functions read the descriptor's tables through that
//! pointer. Declarations live in `include/tree-sitter-helixql.h`.

use std::ffi::{c_char, CString};
use std::ptr;
use std::sync::OnceLock;

use tree_sitter_helixql::{language, FieldId, Language, Symbol, ERROR_SYMBOL};

/// The language as C sees it: an incomplete type only ever used by pointer.
#[repr(C)]
pub struct TSLanguage {
    _private: [u8; 0],
}

/// NUL-terminated copies of the symbol and field names.
struct Names {
    symbols: Vec<CString>,
    fields: Vec<CString>,
}

fn c_name(name: &str) -> CString {
    CString::new(name).unwrap_or_else(|_| {
        log::warn!("name {name:?} contains a NUL byte");
        CString::default()
    })
}

fn names() -> &'static Names {
    static NAMES: OnceLock<Names> = OnceLock::new();
    NAMES.get_or_init(|| {
        let language = language();
        let names = Names {
            symbols: language
                .symbols()
                .iter()
                .map(|symbol| c_name(symbol.name()))
                .collect(),
            fields: (1..=language.field_count())
                .map(|id| {
                    let name = FieldId::try_from(id)
                        .ok()
                        .and_then(|id| language.field_name(id));
                    c_name(name.unwrap_or_default())
                })
                .collect(),
        };
        log::debug!(
            "exported {} symbol names and {} field names",
            names.symbols.len(),
            names.fields.len()
        );
        names
    })
}

/// The descriptor behind `handle`, if `handle` is the one we handed out.
fn resolve(handle: *const TSLanguage) -> Option<&'static Language> {
    let language = language();
    ptr::eq(handle.cast::<Language>(), language).then_some(language)
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Returns the HelixQL language.
///
/// The pointer is never null, is the same on every call and stays valid for
/// the life of the process. Callers must not free it.
#[no_mangle]
pub extern "C" fn tree_sitter_helixql() -> *const TSLanguage {
    ptr::from_ref(language()).cast()
}

/// The descriptor layout version, or 0 for an unknown handle.
#[no_mangle]
pub extern "C" fn helixql_language_version(handle: *const TSLanguage) -> u32 {
    resolve(handle).map_or(0, Language::version)
}

/// Number of symbols, or 0 for an unknown handle.
#[no_mangle]
pub extern "C" fn helixql_language_symbol_count(handle: *const TSLanguage) -> u32 {
    resolve(handle).map_or(0, |language| count(language.symbol_count()))
}

/// Name of `symbol`, or null for an unknown handle or symbol.
#[no_mangle]
pub extern "C" fn helixql_language_symbol_name(
    handle: *const TSLanguage,
    symbol: Symbol,
) -> *const c_char {
    if resolve(handle).is_none() {
        return ptr::null();
    }
    if symbol == ERROR_SYMBOL {
        return c"ERROR".as_ptr();
    }
    names()
        .symbols
        .get(usize::from(symbol))
        .map_or(ptr::null(), |name| name.as_ptr())
}

/// Number of fields, or 0 for an unknown handle.
#[no_mangle]
pub extern "C" fn helixql_language_field_count(handle: *const TSLanguage) -> u32 {
    resolve(handle).map_or(0, |language| count(language.field_count()))
}

/// Name of field `field` (ids start at 1), or null for an unknown handle or field.
#[no_mangle]
pub extern "C" fn helixql_language_field_name(
    handle: *const TSLanguage,
    field: FieldId,
) -> *const c_char {
    if resolve(handle).is_none() {
        return ptr::null();
    }
    usize::from(field)
        .checked_sub(1)
        .and_then(|index| names().fields.get(index))
        .map_or(ptr::null(), |name| name.as_ptr())
}
