use std::fs;
use std::path::{Path, PathBuf};

use crossbind_codegen::enums::EnumValue;
use crossbind_codegen::{
    CodegenError, EnumMetadata, Generator, GeneratorOptions, LogReporter, StaticEnumResolver,
    StatusReporter, MANAGED_OUTPUT_NAME,
};
use crossbind_source::ProjectConfig;
use expect_test::expect;

fn write(root: &Path, path: &str, contents: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, contents).unwrap();
}

fn generator(root: &Path) -> Generator {
    let options =
        GeneratorOptions::from_config(root, root.join("codegen"), &ProjectConfig::default())
            .unwrap();
    Generator::new(options).with_enum_resolver(StaticEnumResolver::default())
}

fn managed_output(root: &Path) -> PathBuf {
    root.join("codegen").join(MANAGED_OUTPUT_NAME)
}

fn native_output(root: &Path) -> PathBuf {
    root.join("bun.js/bindings/GeneratedBindings.zig")
}

#[derive(Default)]
struct Recorder(Vec<String>);

impl StatusReporter for Recorder {
    fn status(&mut self, message: &str) {
        self.0.push(message.to_string());
    }
}

const OS_BINDINGS: &str = r#"
[functions.setPriority]
args = [
  { name = "pid", type = "i32" },
  { name = "limit", type = { type = "u32", optional = true } },
]
returns = "undefined"
"#;

const OS_NATIVE: &str = "pub fn setPriority(pid: i32, limit: ?u32) !void {}\n";

#[test]
fn second_run_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "node/node_os.bind.toml", OS_BINDINGS);
    write(root, "node/node_os.zig", OS_NATIVE);

    let mut recorder = Recorder::default();
    let first = generator(root).run(&mut recorder).unwrap();
    assert_eq!(first.files, 1);
    assert_eq!(first.written, 3);
    assert!(recorder.0.contains(&"Loading node/node_os.bind.toml".to_string()));
    assert!(recorder.0.contains(&"Writing GeneratedBindings.cpp".to_string()));
    assert!(recorder.0.last().unwrap().starts_with("processed 1 files, "));

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    let before = fs::metadata(managed_output(root)).unwrap().modified().unwrap();

    let second = generator(root).run(&mut LogReporter).unwrap();
    assert_eq!(second.written, 0);
    assert_eq!(second.unchanged, 3);
    assert_eq!(fs::read_to_string(managed_output(root)).unwrap(), managed);
    assert_eq!(
        fs::metadata(managed_output(root)).unwrap().modified().unwrap(),
        before
    );
}

/// `(name, value)` of every assertion starting with `marker`.
fn asserted_sizes(text: &str, marker: &str, separator: &str) -> Vec<(String, usize)> {
    text.lines()
        .filter_map(|line| {
            let rest = &line[line.find(marker)? + marker.len()..];
            let (name, rest) = rest.split_once(')')?;
            let rest = rest.trim_start().strip_prefix(separator)?.trim_start();
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            Some((name.to_string(), digits.parse().ok()?))
        })
        .collect()
}

/// `(field, offset)` of every offset assertion, in emission order.
fn asserted_offsets(text: &str, marker: &str, separator: &str) -> Vec<(String, usize)> {
    asserted_sizes(text, marker, separator)
        .into_iter()
        .filter_map(|(args, offset)| {
            let (_, field) = args.split_once(", ")?;
            Some((field.trim_matches('"').to_string(), offset))
        })
        .collect()
}

#[test]
fn both_sides_agree_on_struct_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "node/node_os.bind.toml", OS_BINDINGS);
    write(root, "node/node_os.zig", OS_NATIVE);
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    let native = fs::read_to_string(native_output(root)).unwrap();

    let cpp = asserted_sizes(&managed, "static_assert(sizeof(", "==");
    let zig = asserted_sizes(&native, "@sizeOf(", "!=");
    assert_eq!(cpp, vec![("NodeOsSetPriorityArguments".to_string(), 8)]);
    assert_eq!(cpp, zig);

    let cpp = asserted_sizes(&managed, "static_assert(alignof(", "==");
    let zig = asserted_sizes(&native, "@alignOf(", "!=");
    assert_eq!(cpp, vec![("NodeOsSetPriorityArguments".to_string(), 4)]);
    assert_eq!(cpp, zig);

    let cpp = asserted_offsets(&managed, "static_assert(offsetof(", "==");
    let zig = asserted_offsets(&native, "@offsetOf(", "!=");
    assert_eq!(
        cpp,
        vec![("limitValue".to_string(), 0), ("limitSet".to_string(), 4)]
    );
    assert_eq!(
        zig,
        vec![("limit_value".to_string(), 0), ("limit_set".to_string(), 4)]
    );

    assert!(managed.contains(
        "struct NodeOsSetPriorityArguments {\n    uint32_t limitValue;\n    bool limitSet;\n};\n"
    ));
    assert!(native.contains(
        "const NodeOsSetPriorityArguments = extern struct {\n        limit_value: u32,\n        limit_set: bool,\n    };\n"
    ));
}

#[test]
fn nullable_arguments_carry_a_presence_flag() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "node/node_os.bind.toml", OS_BINDINGS);
    write(root, "node/node_os.zig", OS_NATIVE);
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert!(managed.contains(concat!(
        "    JSC::EnsureStillAliveScope arg1 = callFrame->argument(1);\n",
        "    if ((buf.limitSet = !arg1.value().isUndefinedOrNull())) {\n",
        "        buf.limitValue = WebCore::convert<WebCore::IDLUnsignedLong>(*global, arg1.value());\n",
        "        RETURN_IF_EXCEPTION(throwScope, {});\n",
        "    }\n",
    )));

    let native = fs::read_to_string(native_output(root)).unwrap();
    assert!(native.contains("if (buf.limit_set) buf.limit_value else null,"));
    assert!(native.contains("arg_pid: *const i32"));
}

#[test]
fn defaults_fill_omitted_arguments_without_a_flag() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "fs.bind.toml",
        r#"
[functions.chmod]
args = [{ name = "mode", type = "u32", default = 438 }]
"#,
    );
    write(root, "fs.zig", "pub fn chmod(mode: u32) !void {}\n");
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert!(managed.contains(concat!(
        "    uint32_t argMode;\n",
        "    if (!arg0.value().isUndefinedOrNull()) {\n",
        "        argMode = WebCore::convert<WebCore::IDLUnsignedLong>(*global, arg0.value());\n",
        "        RETURN_IF_EXCEPTION(throwScope, {});\n",
        "    } else {\n",
        "        argMode = 438;\n",
        "    }\n",
    )));
    assert!(!managed.contains("modeSet"));
    assert!(!managed.contains("static_assert(sizeof("));

    let native = fs::read_to_string(native_output(root)).unwrap();
    assert!(native.contains("arg_mode: *const u32"));
    assert!(native.contains("arg_mode.*,"));
}

#[test]
fn custom_values_are_released_on_later_failures() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "blobs.bind.toml",
        r#"
[types.Blob]
kind = "custom-native"
native-type = "*Blob"
from-js = "Blob.fromJS"
from-js-args = ["global", "value"]
from-js-return = "error"
deinit = "deref"

[functions.concat]
args = [
  { name = "first", type = "Blob" },
  { name = "second", type = "Blob" },
]
"#,
    );
    write(root, "blobs.zig", "pub fn concat(first: *Blob, second: *Blob) !void {}\n");
    generator(root).run(&mut LogReporter).unwrap();

    let native = fs::read_to_string(native_output(root)).unwrap();
    let first = native
        .find("const arg_first = import_blobs.Blob.fromJS(global, buf.first) catch |err| switch (err) {")
        .unwrap();
    let first_defer = native.find("defer arg_first.deref();").unwrap();
    let second = native
        .find("const arg_second = import_blobs.Blob.fromJS(global, buf.second) catch |err| switch (err) {")
        .unwrap();
    let second_defer = native.find("defer arg_second.deref();").unwrap();
    assert!(first < first_defer && first_defer < second && second < second_defer);
    assert!(native[second..second_defer].contains("error.JSError => return false,"));

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert!(managed.contains("buf.first = JSC::JSValue::encode(arg0.value());"));
    assert!(managed.contains("buf.second = JSC::JSValue::encode(arg1.value());"));
}

#[test]
fn dictionaries_check_required_fields_and_fill_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "fs.bind.toml",
        r#"
[types.OpenOptions]
kind = "dictionary"
fields = [
  { key = "mode", type = { type = "u32", default = 438 } },
  { key = "recursive", type = "boolean", required = true },
]

[functions.open]
args = [{ name = "options", type = "OpenOptions" }]
"#,
    );
    write(root, "fs.zig", "pub fn open(options: *const anyopaque) !void {}\n");
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert!(managed.contains(
        "bool convertFsOpenOptions(Generated::fs::OpenOptions* result, JSC::JSGlobalObject* global, JSC::JSValue value)"
    ));
    assert!(managed.contains(concat!(
        "        result->mode = WebCore::convert<WebCore::IDLUnsignedLong>(*global, propValue);\n",
        "        RETURN_IF_EXCEPTION(throwScope, {});\n",
        "    } else {\n",
        "        result->mode = 438;\n",
        "    }\n",
    )));
    assert!(managed.contains(concat!(
        "        result->recursive = WebCore::convert<WebCore::IDLBoolean>(*global, propValue);\n",
        "        RETURN_IF_EXCEPTION(throwScope, {});\n",
        "    } else {\n",
        "        throwTypeError(global, throwScope);\n",
        "        return false;\n",
        "    }\n",
    )));
    assert!(managed.contains("if (!convertFsOpenOptions(&argOptions, global, arg0.value()))"));
}

#[test]
fn overloads_split_by_category_test_once() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "fmt.bind.toml",
        r#"
[[functions.g.variants]]
args = [{ name = "text", type = "DOMString" }]
[[functions.g.variants]]
args = [{ name = "count", type = "f64" }]
"#,
    );
    write(root, "fmt.zig", "pub fn g1(text: bun.String) !void {}\npub fn g2(count: f64) !void {}\n");
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert_eq!(managed.matches("JSC::JSValue distinguishingValue").count(), 1);
    assert_eq!(managed.matches("if (distinguishingValue.").count(), 1);
    assert!(managed.contains(concat!(
        "    JSC::JSValue distinguishingValue = callFrame->uncheckedArgument(0);\n",
        "    if (distinguishingValue.isString()) {\n",
        "        return bindgen_fmt_internalG1(global, callFrame);\n",
        "    }\n",
        "    return bindgen_fmt_internalG2(global, callFrame);\n",
    )));

    let text_variant = managed
        .find("EncodedJSValue bindgen_fmt_internalG1(JSC::JSGlobalObject* global")
        .unwrap();
    let count_variant = managed
        .find("EncodedJSValue bindgen_fmt_internalG2(JSC::JSGlobalObject* global")
        .unwrap();
    let text_body = &managed[text_variant..count_variant];
    assert!(text_body.contains("WebCore::IDLDOMString"));
    assert!(text_body.contains("if (!bindgen_fmt_dispatchG1("));
    assert!(!text_body.contains("if (!bindgen_fmt_dispatchG2("));
    assert!(managed[count_variant..].contains("if (!bindgen_fmt_dispatchG2("));
}

#[test]
fn overloads_split_by_count_need_no_type_test() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "fmt.bind.toml",
        r#"
[functions.f]
variants = [
  { args = [{ name = "text", type = "DOMString" }], returns = "undefined" },
  { args = [{ name = "a", type = "f64" }, { name = "b", type = "f64" }], returns = "undefined" },
]
"#,
    );
    write(root, "fmt.zig", "pub fn f1(text: bun.String) !void {}\npub fn f2(a: f64, b: f64) !void {}\n");
    generator(root).run(&mut LogReporter).unwrap();

    let managed = fs::read_to_string(managed_output(root)).unwrap();
    assert!(!managed.contains("distinguishingValue"));
    assert!(managed.contains("if (argumentCount >= 2) {"));
}

#[test]
fn ambiguous_overloads_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "math.bind.toml",
        r#"
[functions.h]
variants = [
  { args = [{ name = "a", type = "i32" }], returns = "undefined" },
  { args = [{ name = "b", type = "f64" }], returns = "undefined" },
]
"#,
    );
    write(root, "math.zig", "pub fn h1(a: i32) !void {}\npub fn h2(b: f64) !void {}\n");

    let err = generator(root).run(&mut LogReporter).unwrap_err();
    assert!(matches!(err, CodegenError::AmbiguousOverload { ref function, arg_count: 1, .. } if function == "h"));
    assert!(!root.join("codegen").exists());
    assert!(!native_output(root).exists());
}

#[test]
fn missing_implementation_names_the_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "node/node_os.bind.toml", OS_BINDINGS);
    write(root, "node/node_os.zig", "pub fn somethingElse() void {}\n");

    let err = generator(root).run(&mut LogReporter).unwrap_err();
    assert!(matches!(
        err,
        CodegenError::MissingImplementation { ref symbol, ref file, .. }
            if symbol == "setPriority" && file == Path::new("node/node_os.zig")
    ));
    assert!(!managed_output(root).exists());
}

#[test]
fn native_enums_come_from_the_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "fs.bind.toml",
        r#"
[types.Encoding]
kind = "native-enum"
file = "node/types.zig"
name = "Encoding"
"#,
    );
    write(root, "node/types.zig", "pub const Encoding = enum(u8) { utf8, hex };\n");

    let metadata = EnumMetadata {
        file: Some(PathBuf::from("node/types.zig")),
        name: Some("Encoding".to_string()),
        tag: "u8".to_string(),
        values: vec![
            EnumValue {
                name: "utf8".to_string(),
                value: 0,
            },
            EnumValue {
                name: "hex".to_string(),
                value: 3,
            },
        ],
    };
    let options =
        GeneratorOptions::from_config(root, root.join("codegen"), &ProjectConfig::default())
            .unwrap();
    let mut recorder = Recorder::default();
    let rendered = Generator::new(options)
        .with_enum_resolver(StaticEnumResolver::new(vec![metadata]))
        .render(&mut recorder)
        .unwrap();
    assert!(recorder.0.contains(&"Extracting 1 enum definitions".to_string()));

    let header = rendered
        .outputs
        .get(&root.join("codegen/GeneratedFs.h"))
        .unwrap();
    let start = header.find("enum class").unwrap();
    let end = header.find("} // namespace fs").unwrap();
    expect![[r#"
        enum class Encoding : uint8_t {
            Utf8 = 0,
            Hex = 3,
        };

    "#]]
    .assert_eq(&header[start..end]);
}

#[test]
fn string_enum_header() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "shared.bind.toml",
        "[types.Mode]\nkind = \"string-enum\"\nvalues = [\"read\", \"write-only\"]\n",
    );
    let rendered = generator(root).render(&mut LogReporter).unwrap();
    let header = rendered
        .outputs
        .get(&root.join("codegen/GeneratedShared.h"))
        .unwrap();
    assert!(header.starts_with("#pragma once\n#include \"root.h\"\n"));
    assert!(header.contains("#include \"JSDOMConvertEnumeration.h\"\n"));
    let start = header.find("enum class").unwrap();
    let end = header.find("} // namespace shared").unwrap();
    expect![[r#"
        enum class Mode : uint8_t {
            Read,
            WriteOnly,
        };

    "#]]
    .assert_eq(&header[start..end]);
}
