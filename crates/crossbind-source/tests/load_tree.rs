use std::fs;
use std::path::{Path, PathBuf};

use crossbind_source::{load_definitions, GeneratorConfig, SourceError};

fn write(root: &Path, path: &str, contents: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, contents).unwrap();
}

#[test]
fn loads_a_source_tree() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "bun.js/node/node_os.bind.toml",
        r#"
[functions.cpus]
args = [{ name = "global", type = "global-object" }]
returns = "any"

[functions.setPriority]
variants = [
  { args = [{ name = "pid", type = "i32" }, { name = "priority", type = "i32" }] },
  { args = [{ name = "priority", type = "i32" }] },
]
"#,
    );
    write(
        root,
        "bun.js/node/node_os.zig",
        "pub fn cpus(global: *JSC.JSGlobalObject) bun.JSError!JSValue {}\n\
         pub fn setPriority1(pid: i32, priority: i32) !void {}\n\
         pub fn setPriority2(priority: i32) !void {}\n",
    );
    write(root, "bun.js/bindings/other.zig", "");
    write(root, "node_modules/dep/skip.bind.toml", "not toml at all [");

    let set = load_definitions(root, &GeneratorConfig::default()).unwrap();
    assert_eq!(set.files.len(), 1);
    assert_eq!(set.function_count(), 2);
    assert_eq!(set.native_sources.len(), 2);

    let file = &set.files[0];
    assert_eq!(file.namespace, "node_os");
    let native = file.native.as_ref().unwrap();
    assert_eq!(native.path(), PathBuf::from("bun.js/node/node_os.zig"));
    assert!(native.declares_function("setPriority2"));

    let set_priority = &file.functions[1];
    let suffixes: Vec<_> = set_priority.variants.iter().map(|v| v.suffix.clone()).collect();
    assert_eq!(suffixes, ["1", "2"]);
    assert_eq!(set_priority.implementation_name(0), "setPriority1");
}

#[test]
fn functions_need_a_native_source() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "crypto.bind.toml",
        "[functions.hash]\nargs = [{ name = \"data\", type = \"BunString\" }]\n",
    );
    let err = load_definitions(dir.path(), &GeneratorConfig::default()).unwrap_err();
    assert!(
        matches!(err, SourceError::MissingNativeSource { ref path, .. } if path == Path::new("crypto.zig"))
    );
}

#[test]
fn type_only_files_do_not_need_a_native_source() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "shared.bind.toml",
        "[types.Mode]\nkind = \"string-enum\"\nvalues = [\"a\", \"b\"]\n",
    );
    let set = load_definitions(dir.path(), &GeneratorConfig::default()).unwrap();
    assert!(set.files[0].native.is_none());
    assert_eq!(set.files[0].typedefs.len(), 1);
}
