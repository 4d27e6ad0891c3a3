//! Symbol names shared by the managed and native outputs.
//!
//! Both sides refer to the same extern symbols, so every name that crosses
//! the boundary is built here and nowhere else.

use std::path::{Component, Path};

use crossbind_types::case::{cap, pascal};

/// The host function registered with the managed runtime.
pub fn js_function(namespace: &str, function: &str) -> String {
    format!("bindgen_{namespace}_js{}", cap(function))
}

/// The native entry point of variant `number` (1-based).
pub fn dispatch_variant(namespace: &str, function: &str, number: usize) -> String {
    format!("bindgen_{namespace}_dispatch{}{number}", cap(function))
}

/// The managed-side wrapper that calls one variant of an overloaded function.
pub fn internal_dispatch_variant(namespace: &str, function: &str, number: usize) -> String {
    format!("bindgen_{namespace}_internal{}{number}", cap(function))
}

/// Exported wrapper around a custom validator function.
pub fn custom_validator(function: &str) -> String {
    let sanitized: String = function
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("bindgen_validate_{sanitized}")
}

pub fn header_name(namespace: &str) -> String {
    format!("Generated{}.h", pascal(namespace))
}

/// Name of the communication struct of variant `index` out of `count`.
pub fn communication_struct(namespace: &str, function: &str, index: usize, count: usize) -> String {
    let number = if count > 1 {
        (index + 1).to_string()
    } else {
        String::new()
    };
    format!("{}{}Arguments{number}", pascal(namespace), pascal(function))
}

/// Name of the managed-side converter for a dictionary.
pub fn dictionary_converter(namespace: &str, name: &str) -> String {
    format!("convert{}{}", pascal(namespace), name)
}

/// A double-quoted literal valid in both C++ and Zig.
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

const ZIG_RESERVED: &[&str] = &[
    "addrspace", "align", "allowzero", "and", "anyframe", "anytype", "asm", "async", "await",
    "break", "callconv", "catch", "comptime", "const", "continue", "defer", "else", "enum",
    "errdefer", "error", "export", "extern", "fn", "for", "if", "inline", "linksection",
    "noalias", "noinline", "nosuspend", "opaque", "or", "orelse", "packed", "pub", "resume",
    "return", "struct", "suspend", "switch", "test", "threadlocal", "try", "union",
    "unreachable", "usingnamespace", "var", "volatile", "while", "anyerror", "anyopaque",
    "bool", "f16", "f32", "f64", "f80", "f128", "isize", "noreturn", "type", "usize", "void",
    "true", "false", "null", "undefined",
];

fn is_zig_primitive_int(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('i' | 'u'))
        && name.len() > 1
        && chars.all(|c| c.is_ascii_digit())
}

/// Quotes a Zig identifier when it is reserved or not a plain identifier.
pub fn zid(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain && !ZIG_RESERVED.contains(&name) && !is_zig_primitive_int(name) {
        name.to_string()
    } else {
        format!("@{}", string_literal(name))
    }
}

/// `to` relative to the directory `from`, with `/` separators.
///
/// Both paths are relative to the same root.
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<_> = to.components().filter(|c| *c != Component::CurDir).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    if parts.first().map_or(true, |p| p != "..") {
        parts.insert(0, ".".to_string());
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extern_names() {
        assert_eq!(js_function("node_os", "cpus"), "bindgen_node_os_jsCpus");
        assert_eq!(dispatch_variant("fs", "readFile", 2), "bindgen_fs_dispatchReadFile2");
        assert_eq!(
            internal_dispatch_variant("fs", "readFile", 1),
            "bindgen_fs_internalReadFile1"
        );
        assert_eq!(custom_validator("Blob.isValid"), "bindgen_validate_Blob_isValid");
        assert_eq!(header_name("node_os"), "GeneratedNodeOs.h");
        assert_eq!(dictionary_converter("node_fs", "OpenOptions"), "convertNodeFsOpenOptions");
    }

    #[test]
    fn communication_struct_numbering() {
        assert_eq!(communication_struct("fs", "open", 0, 1), "FsOpenArguments");
        assert_eq!(communication_struct("fs", "open", 1, 3), "FsOpenArguments2");
    }

    #[test]
    fn literals_escape_quotes_and_control_characters() {
        assert_eq!(string_literal(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(string_literal("a\\b\n"), r#""a\\b\n""#);
        assert_eq!(string_literal("\u{1}"), r#""\x01""#);
    }

    #[test]
    fn zig_identifiers() {
        assert_eq!(zid("jsRead"), "jsRead");
        assert_eq!(zid("error"), "@\"error\"");
        assert_eq!(zid("u8"), "@\"u8\"");
        assert_eq!(zid("utf8"), "utf8");
        assert_eq!(zid("utf-8"), "@\"utf-8\"");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(
            relative_path(Path::new("bun.js/bindings"), Path::new("bun.js/node/node_os.zig")),
            "../node/node_os.zig"
        );
        assert_eq!(
            relative_path(Path::new("bun.js/bindings"), Path::new("bun.js/bindings/x.zig")),
            "./x.zig"
        );
        assert_eq!(relative_path(Path::new(""), Path::new("a/b.zig")), "./a/b.zig");
    }
}
