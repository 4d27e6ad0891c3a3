//! Serde model of a `*.bind.toml` definition file.

use std::ops::Range;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use toml::Spanned;

/// Top-level tables are not `Spanned`: a table created implicitly by
/// `[[functions.f.variants]]` has no span of its own. Use [`key_span`].
#[derive(Debug, Default, Deserialize)]
pub struct DefinitionDoc {
    #[serde(default)]
    pub types: IndexMap<String, TypeSpec>,
    #[serde(default)]
    pub functions: IndexMap<String, FunctionSpec>,
}

/// Byte range of `name` where `source` declares it inside `section`.
///
/// Finds table headers (`[section.name]`, `[[section.name.variants]]`) first,
/// then keys under a `[section]` header.
pub fn key_span(source: &str, section: &str, name: &str) -> Option<Range<usize>> {
    let section = regex::escape(section);
    let key = format!(r#"(?P<key>"{0}"|{0})"#, regex::escape(name));

    let header = Regex::new(&format!(
        r"(?m)^[ \t]*\[\[?[ \t]*{section}[ \t]*\.[ \t]*{key}[ \t]*[\].]"
    ))
    .ok()?;
    if let Some(found) = header.captures(source).and_then(|c| c.name("key")) {
        return Some(found.range());
    }

    let table = Regex::new(&format!(r"(?m)^[ \t]*\[[ \t]*{section}[ \t]*\]")).ok()?;
    let start = table.find(source)?.end();
    let entry = Regex::new(&format!(r"(?m)^[ \t]*{key}[ \t]*=")).ok()?;
    let found = entry.captures(&source[start..])?.name("key")?;
    Some(start + found.start()..start + found.end())
}

/// A type reference: a name, or an inline table describing the type.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    Name(String),
    Spec(Box<TypeSpec>),
}

impl Default for TypeExpr {
    fn default() -> Self {
        TypeExpr::Name("undefined".to_string())
    }
}

/// Flags that may be attached wherever a type is used.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Modifiers {
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub non_null: bool,
    #[serde(default)]
    pub default: Option<toml::Value>,
    #[serde(default)]
    pub range: Option<RangeSpec>,
    #[serde(default)]
    pub finite: bool,
    #[serde(default)]
    pub validator: Option<String>,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        *self == Modifiers::default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RangeSpec {
    pub mode: String,
    #[serde(default)]
    pub min: BoundSpec,
    #[serde(default)]
    pub max: BoundSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoundSpec {
    Value(i64),
    Keyword(String),
}

impl Default for BoundSpec {
    fn default() -> Self {
        BoundSpec::Keyword("abi".to_string())
    }
}

/// Argument of a custom conversion hook: a keyword or literal text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HookArg {
    Keyword(String),
    Text { text: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TypeSpec {
    pub kind: Option<String>,
    /// Refers to an existing type instead of describing a new one.
    #[serde(rename = "type")]
    pub base: Option<String>,
    #[serde(flatten)]
    pub modifiers: Modifiers,

    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub values: Vec<String>,

    pub file: Option<String>,
    pub name: Option<String>,

    pub native_type: Option<String>,
    pub managed_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<String>,
    pub from_js: Option<String>,
    #[serde(default)]
    pub from_js_args: Vec<HookArg>,
    pub from_js_return: Option<String>,
    pub validate: Option<String>,
    pub validate_error: Option<String>,
    pub deinit: Option<String>,
    #[serde(default)]
    pub deinit_args: Vec<HookArg>,
    pub abi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(flatten)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FunctionSpec {
    #[serde(default)]
    pub variants: Vec<Spanned<VariantSpec>>,
    /// Single-variant shorthand.
    #[serde(default)]
    pub args: Vec<Spanned<ArgSpec>>,
    #[serde(default)]
    pub returns: Option<TypeExpr>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub class_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VariantSpec {
    #[serde(default)]
    pub args: Vec<Spanned<ArgSpec>>,
    #[serde(default)]
    pub returns: Option<TypeExpr>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_types_and_both_function_forms() {
        let doc: DefinitionDoc = toml::from_str(
            r#"
[types.Mode]
kind = "string-enum"
values = ["read", "write"]

[types.Options]
kind = "dictionary"
fields = [
  { key = "mode", type = { type = "Mode", default = "read" } },
  { key = "recursive", type = "boolean", required = true },
]

[functions.open]
args = [
  { name = "path", type = "BunString" },
  { name = "flags", type = "i32", optional = true, range = { mode = "enforce", min = 0 } },
]
returns = "any"

[functions.write]
prefix = "Bindings."
[[functions.write.variants]]
args = [{ name = "data", type = "DOMString" }]
[[functions.write.variants]]
args = [{ name = "fd", type = "i32" }]
returns = "u32"
"#,
        )
        .unwrap();

        let names: Vec<_> = doc.types.keys().cloned().collect();
        assert_eq!(names, ["Mode", "Options"]);
        let options = &doc.types["Options"];
        assert_eq!(options.fields.len(), 2);
        assert!(options.fields[1].required);
        match &options.fields[0].ty {
            TypeExpr::Spec(spec) => {
                assert_eq!(spec.base.as_deref(), Some("Mode"));
                assert_eq!(spec.modifiers.default, Some(toml::Value::String("read".into())));
            }
            other => panic!("expected inline type, got {other:?}"),
        }

        let open = &doc.functions["open"];
        assert!(open.variants.is_empty());
        let flags = open.args[1].get_ref();
        assert!(flags.modifiers.optional);
        let range = flags.modifiers.range.as_ref().unwrap();
        assert_eq!(range.min, BoundSpec::Value(0));
        assert_eq!(range.max, BoundSpec::Keyword("abi".into()));

        let write = &doc.functions["write"];
        assert_eq!(write.prefix.as_deref(), Some("Bindings."));
        assert_eq!(write.variants.len(), 2);
        assert!(matches!(
            write.variants[1].get_ref().returns,
            Some(TypeExpr::Name(ref n)) if n == "u32"
        ));
    }

    #[test]
    fn implicit_parent_tables_parse() {
        let doc: DefinitionDoc = toml::from_str(
            r#"
[[functions.g.variants]]
args = [{ name = "text", type = "DOMString" }]
[[functions.g.variants]]
args = [{ name = "count", type = "f64" }]

[[types.Options.fields]]
key = "mode"
type = "u32"
required = true
"#,
        )
        .unwrap();
        assert_eq!(doc.functions["g"].variants.len(), 2);
        assert_eq!(doc.types["Options"].fields[0].key, "mode");
    }

    #[test]
    fn key_spans_point_at_the_declared_name() {
        let source = "[types]\nMode = { kind = \"string-enum\", values = [\"a\"] }\n\n[[functions.g.variants]]\nargs = []\n[functions.\"\"]\n";
        let span = key_span(source, "functions", "g").unwrap();
        assert_eq!(&source[span], "g");
        let span = key_span(source, "types", "Mode").unwrap();
        assert_eq!(&source[span], "Mode");
        let span = key_span(source, "functions", "").unwrap();
        assert_eq!(&source[span], "\"\"");
        assert_eq!(key_span(source, "functions", "missing"), None);
    }
}
