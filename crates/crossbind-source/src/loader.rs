//! Turns parsed definition documents into the type graph and function list.
//!
//! Declared types are resolved lazily, the first time something refers to
//! them, so declaration order inside and across files does not matter. A
//! type that is still being resolved when it is reached again is recursive.

use std::ops::Range;
use std::path::{Path, PathBuf};

use crossbind_layout::AbiPrimitive;
use crossbind_types::case::pascal;
use crossbind_types::{
    Argument, CustomManaged, CustomNative, DefaultValue, DictionaryField, FileId, FromJsReturn,
    Function, ManagedArg, NativeArg, NativeEnumRef, NodeValidator, Origin, RangeBound,
    RangeConstraint, RangeMode, TypeFlags, TypeId, TypeKind, TypeRegistry, Variant,
};
use fxhash::{FxHashMap, FxHashSet};
use miette::SourceSpan;

use crate::config::GeneratorConfig;
use crate::discover::{discover, namespace_for, native_source_for};
use crate::error::{SourceError, SourceResult};
use crate::native_index::NativeSource;
use crate::schema::{
    key_span, ArgSpec, BoundSpec, DefinitionDoc, FunctionSpec, HookArg, Modifiers, TypeExpr,
    TypeSpec,
};
use crate::source_map::SourceMap;

const COMPOUND_KINDS: [&str; 5] = [
    "dictionary",
    "string-enum",
    "native-enum",
    "custom-native",
    "custom-managed",
];

/// Everything one definition file contributes.
#[derive(Debug)]
pub struct DefinitionFile {
    pub id: FileId,
    /// Relative to the source root.
    pub path: PathBuf,
    pub native_path: PathBuf,
    pub namespace: String,
    /// Exported type names, in declaration order.
    pub typedefs: Vec<(String, TypeId)>,
    pub functions: Vec<Function>,
    /// Index of the paired native source, when it exists.
    pub native: Option<NativeSource>,
}

/// The loaded input of one generation run.
#[derive(Debug)]
pub struct DefinitionSet {
    pub sources: SourceMap,
    pub registry: TypeRegistry,
    pub files: Vec<DefinitionFile>,
    /// Every native source under the root, relative to it.
    pub native_sources: Vec<PathBuf>,
}

impl DefinitionSet {
    pub fn function_count(&self) -> usize {
        self.files.iter().map(|f| f.functions.len()).sum()
    }
}

/// Discovers, reads and resolves every definition file under `root`.
pub fn load_definitions(root: &Path, config: &GeneratorConfig) -> SourceResult<DefinitionSet> {
    load_definitions_with(root, config, |_| {})
}

/// Like [`load_definitions`], calling `on_file` before each file is read.
pub fn load_definitions_with(
    root: &Path,
    config: &GeneratorConfig,
    mut on_file: impl FnMut(&Path),
) -> SourceResult<DefinitionSet> {
    let found = discover(root, &config.exclude)?;
    let mut loader = Loader::new();
    for relative in &found.definitions {
        on_file(relative);
        let full = root.join(relative);
        let contents = std::fs::read_to_string(&full).map_err(|source| SourceError::Io {
            path: full.clone(),
            source,
        })?;
        loader.add_file(relative, contents)?;
    }
    let mut set = loader.finish()?;

    for file in &mut set.files {
        if found.native_sources.contains(&file.native_path) {
            file.native = Some(NativeSource::scan(root, &file.native_path)?);
        } else if let Some(first) = file.functions.first() {
            return Err(SourceError::MissingNativeSource {
                path: file.native_path.clone(),
                src: set.sources.named_source(file.id),
                span: first.origin.span,
            });
        }
    }
    set.native_sources = found.native_sources;
    Ok(set)
}

struct ParsedFile {
    id: FileId,
    path: PathBuf,
    namespace: String,
    doc: DefinitionDoc,
}

/// Accumulates definition files, then resolves them all at once.
#[derive(Default)]
pub struct Loader {
    sources: SourceMap,
    files: Vec<ParsedFile>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one definition file. `path` is relative to the source root.
    pub fn add_file(
        &mut self,
        path: impl AsRef<Path>,
        contents: impl Into<String>,
    ) -> SourceResult<FileId> {
        let path = path.as_ref().to_path_buf();
        log::debug!("parsing {}", path.display());
        let id = self.sources.add(path.clone(), contents);
        let doc: DefinitionDoc =
            toml::from_str(&self.sources.get(id).contents).map_err(|e| SourceError::Parse {
                message: e.message().to_string(),
                src: self.sources.named_source(id),
                span: e.span().map(SourceSpan::from),
            })?;
        self.files.push(ParsedFile {
            id,
            namespace: namespace_for(&path),
            path,
            doc,
        });
        Ok(id)
    }

    pub fn finish(self) -> SourceResult<DefinitionSet> {
        let mut namespaces = FxHashMap::default();
        for (index, file) in self.files.iter().enumerate() {
            namespaces.entry(file.namespace.clone()).or_insert(index);
        }

        let mut resolver = Resolver {
            sources: &self.sources,
            files: &self.files,
            namespaces,
            registry: TypeRegistry::new(),
            memo: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        };

        let mut files = Vec::with_capacity(self.files.len());
        for (index, file) in self.files.iter().enumerate() {
            let mut typedefs = Vec::with_capacity(file.doc.types.len());
            for name in file.doc.types.keys() {
                let origin = resolver.declaration_origin(index, "types", name);
                let id = resolver.resolve_declared(index, name, origin)?;
                resolver.registry.mark_reachable(id);
                typedefs.push((name.clone(), id));
            }

            let mut functions = Vec::with_capacity(file.doc.functions.len());
            for (name, spec) in &file.doc.functions {
                let origin = resolver.declaration_origin(index, "functions", name);
                functions.push(resolver.function(index, name, spec, origin)?);
            }

            log::debug!(
                "{}: {} types, {} functions",
                file.path.display(),
                typedefs.len(),
                functions.len()
            );
            files.push(DefinitionFile {
                id: file.id,
                native_path: native_source_for(&file.path),
                path: file.path.clone(),
                namespace: file.namespace.clone(),
                typedefs,
                functions,
                native: None,
            });
        }

        let Resolver { registry, .. } = resolver;
        Ok(DefinitionSet {
            sources: self.sources,
            registry,
            files,
            native_sources: Vec::new(),
        })
    }
}

struct Resolver<'a> {
    sources: &'a SourceMap,
    files: &'a [ParsedFile],
    namespaces: FxHashMap<String, usize>,
    registry: TypeRegistry,
    memo: FxHashMap<(usize, String), TypeId>,
    in_progress: FxHashSet<(usize, String)>,
}

impl<'a> Resolver<'a> {
    fn origin(&self, file: usize, span: Range<usize>) -> Origin {
        Origin::new(self.files[file].id, span)
    }

    /// Where `[section]` of `file` declares `name`; the file start when it cannot be found.
    fn declaration_origin(&self, file: usize, section: &str, name: &str) -> Origin {
        let id = self.files[file].id;
        let span = key_span(&self.sources.get(id).contents, section, name).unwrap_or(0..0);
        Origin::new(id, span)
    }

    fn namespace(&self, file: usize) -> &'a str {
        &self.files[file].namespace
    }

    fn invalid(&self, origin: Origin, message: impl Into<String>) -> SourceError {
        SourceError::InvalidDefinition {
            message: message.into(),
            src: self.sources.named_source(origin.file),
            span: origin.span,
        }
    }

    fn unknown(&self, origin: Origin, name: &str) -> SourceError {
        SourceError::UnknownType {
            name: name.to_string(),
            src: self.sources.named_source(origin.file),
            span: origin.span,
        }
    }

    /// Resolves a type reference written as a plain string.
    fn resolve_named(&mut self, file: usize, name: &str, origin: Origin) -> SourceResult<TypeId> {
        if let Some(kind) = TypeKind::builtin(name) {
            let namespace = self.namespace(file);
            return Ok(self
                .registry
                .intern(kind, TypeFlags::default(), namespace, origin));
        }
        if let Some((namespace, local)) = name.split_once("::") {
            let target = *self
                .namespaces
                .get(namespace)
                .ok_or_else(|| self.unknown(origin, name))?;
            if !self.files[target].doc.types.contains_key(local) {
                return Err(self.unknown(origin, name));
            }
            return self.resolve_declared(target, local, origin);
        }
        if !self.files[file].doc.types.contains_key(name) {
            return Err(self.unknown(origin, name));
        }
        self.resolve_declared(file, name, origin)
    }

    fn resolve_declared(
        &mut self,
        file: usize,
        name: &str,
        use_site: Origin,
    ) -> SourceResult<TypeId> {
        let key = (file, name.to_string());
        if let Some(&id) = self.memo.get(&key) {
            return Ok(id);
        }
        if self.in_progress.contains(&key) {
            return Err(SourceError::RecursiveType {
                name: name.to_string(),
                src: self.sources.named_source(use_site.file),
                span: use_site.span,
            });
        }
        let Some(spec) = self.files[file].doc.types.get(name) else {
            return Err(self.unknown(use_site, name));
        };
        let origin = self.declaration_origin(file, "types", name);

        self.in_progress.insert(key.clone());
        let id = if is_compound(spec) {
            let kind = self.build_kind(file, name, spec, origin)?;
            let flags = self.flags_for(&kind, TypeFlags::default(), &spec.modifiers, origin)?;
            let namespace = self.namespace(file);
            self.registry
                .declare(name, kind, flags, namespace, origin)
                .ok_or_else(|| SourceError::DuplicateType {
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                    src: self.sources.named_source(origin.file),
                    span: origin.span,
                })?
        } else {
            self.resolve_alias(file, spec, origin)?
        };
        self.in_progress.remove(&key);
        self.memo.insert(key, id);
        Ok(id)
    }

    /// A type entry that names an existing type and adds modifiers to it.
    fn resolve_alias(&mut self, file: usize, spec: &TypeSpec, origin: Origin) -> SourceResult<TypeId> {
        let target = spec
            .base
            .as_deref()
            .or(spec.kind.as_deref())
            .ok_or_else(|| self.invalid(origin, "a type needs either `kind` or `type`"))?;
        let base = self.resolve_named(file, target, origin)?;
        self.apply_modifiers(base, &spec.modifiers, origin)
    }

    fn resolve_expr(
        &mut self,
        file: usize,
        expr: &TypeExpr,
        origin: Origin,
        name_hint: &str,
    ) -> SourceResult<TypeId> {
        match expr {
            TypeExpr::Name(name) => self.resolve_named(file, name, origin),
            TypeExpr::Spec(spec) if is_compound(spec) => {
                let kind = self.build_kind(file, name_hint, spec, origin)?;
                let flags = self.flags_for(&kind, TypeFlags::default(), &spec.modifiers, origin)?;
                let namespace = self.namespace(file);
                let id = self.registry.intern(kind, flags, namespace, origin);
                self.registry.suggest_name(id, name_hint);
                Ok(id)
            }
            TypeExpr::Spec(spec) => self.resolve_alias(file, spec, origin),
        }
    }

    fn apply_modifiers(
        &mut self,
        base: TypeId,
        modifiers: &Modifiers,
        origin: Origin,
    ) -> SourceResult<TypeId> {
        if modifiers.is_empty() {
            return Ok(base);
        }
        let ty = self.registry.get(base);
        let kind = ty.kind().clone();
        let flags = self.flags_for(&kind, ty.flags().clone(), modifiers, origin)?;
        if ty.is_exported() || kind.lowers_to_named_type() {
            Ok(self.registry.derive(base, flags, origin))
        } else {
            let namespace = ty.namespace().to_string();
            Ok(self.registry.intern(kind, flags, &namespace, origin))
        }
    }

    /// Overlays `modifiers` on `flags`, checking each against the kind it applies to.
    fn flags_for(
        &self,
        kind: &TypeKind,
        mut flags: TypeFlags,
        modifiers: &Modifiers,
        origin: Origin,
    ) -> SourceResult<TypeFlags> {
        flags.optional |= modifiers.optional;
        flags.non_null |= modifiers.non_null;
        if let Some(value) = &modifiers.default {
            flags.default = Some(self.default_value(kind, value, origin)?);
        }
        if let Some(range) = &modifiers.range {
            let TypeKind::Integer(int) = kind else {
                return Err(self.invalid(
                    origin,
                    format!("`range` applies to integers, not to {}", kind.describe()),
                ));
            };
            let mode = match range.mode.as_str() {
                "clamp" => RangeMode::Clamp,
                "enforce" => RangeMode::Enforce,
                other => {
                    return Err(self.invalid(
                        origin,
                        format!("range mode must be `clamp` or `enforce`, found `{other}`"),
                    ))
                }
            };
            let constraint = RangeConstraint {
                mode,
                min: self.bound(&range.min, origin)?,
                max: self.bound(&range.max, origin)?,
            };
            let (abi_min, abi_max) = int.abi().integer_limits().unwrap_or((0, 0));
            if let Some((min, max)) = constraint.bounds(int.abi()) {
                if min > max || min < abi_min || max > abi_max {
                    return Err(self.invalid(
                        origin,
                        format!("range {min}..={max} does not fit in {}", int.key()),
                    ));
                }
            }
            flags.range = Some(constraint);
        }
        if modifiers.finite {
            if *kind != TypeKind::F64 {
                return Err(self.invalid(origin, "`finite` applies to f64 only"));
            }
            flags.finite = true;
        }
        if let Some(key) = &modifiers.validator {
            let validator = NodeValidator::from_key(key)
                .ok_or_else(|| self.invalid(origin, format!("unknown validator `{key}`")))?;
            if !matches!(kind, TypeKind::Integer(_)) {
                return Err(self.invalid(origin, "validators apply to integers only"));
            }
            flags.node_validator = Some(validator);
        }
        Ok(flags)
    }

    fn bound(&self, spec: &BoundSpec, origin: Origin) -> SourceResult<RangeBound> {
        match spec {
            BoundSpec::Value(v) => Ok(RangeBound::Value(*v as i128)),
            BoundSpec::Keyword(k) if k == "abi" => Ok(RangeBound::Abi),
            BoundSpec::Keyword(k) => Err(self.invalid(
                origin,
                format!("range bounds are integers or `abi`, found `{k}`"),
            )),
        }
    }

    fn default_value(
        &self,
        kind: &TypeKind,
        value: &toml::Value,
        origin: Origin,
    ) -> SourceResult<DefaultValue> {
        let mismatch = || {
            self.invalid(
                origin,
                format!("`{value}` is not a valid default for {}", kind.describe()),
            )
        };
        match (kind, value) {
            (TypeKind::Boolean, toml::Value::Boolean(b)) => Ok(DefaultValue::Boolean(*b)),
            (TypeKind::Integer(int), toml::Value::Integer(i)) => {
                let (min, max) = int.abi().integer_limits().ok_or_else(mismatch)?;
                if (*i as i128) < min || (*i as i128) > max {
                    return Err(mismatch());
                }
                Ok(DefaultValue::Integer(*i))
            }
            (TypeKind::F64, toml::Value::Float(f)) => Ok(DefaultValue::Number(*f)),
            (TypeKind::F64, toml::Value::Integer(i)) => Ok(DefaultValue::Number(*i as f64)),
            (TypeKind::String(_), toml::Value::String(s)) => Ok(DefaultValue::String(s.clone())),
            (TypeKind::StringEnum(values), toml::Value::String(s)) => {
                if values.contains(s) {
                    Ok(DefaultValue::Enum(s.clone()))
                } else {
                    Err(mismatch())
                }
            }
            (TypeKind::NativeEnum(_), toml::Value::String(s)) => Ok(DefaultValue::Enum(s.clone())),
            _ => Err(mismatch()),
        }
    }

    fn build_kind(
        &mut self,
        file: usize,
        name: &str,
        spec: &TypeSpec,
        origin: Origin,
    ) -> SourceResult<TypeKind> {
        let kind = spec.kind.as_deref().unwrap_or_default();
        match kind {
            "dictionary" => {
                if spec.fields.is_empty() {
                    return Err(self.invalid(origin, format!("dictionary `{name}` has no fields")));
                }
                let mut fields = Vec::with_capacity(spec.fields.len());
                let mut seen = FxHashSet::default();
                for field in &spec.fields {
                    if !seen.insert(field.key.as_str()) {
                        return Err(self.invalid(
                            origin,
                            format!("field `{}` appears twice in `{name}`", field.key),
                        ));
                    }
                    let hint = format!("{}{}", pascal(name), pascal(&field.key));
                    let ty = self.resolve_expr(file, &field.ty, origin, &hint)?;
                    let flags = self.registry.get(ty).flags();
                    if !field.required && flags.default.is_none() {
                        return Err(self.invalid(
                            origin,
                            format!(
                                "field `{}` of `{name}` must be required or have a default; \
                                 optional dictionary fields without a default are unsupported",
                                field.key
                            ),
                        ));
                    }
                    fields.push(DictionaryField {
                        key: field.key.clone(),
                        ty,
                        required: field.required,
                    });
                }
                Ok(TypeKind::Dictionary(fields))
            }
            "string-enum" => {
                if spec.values.is_empty() {
                    return Err(self.invalid(origin, format!("enum `{name}` has no values")));
                }
                let mut seen = FxHashSet::default();
                if let Some(dup) = spec.values.iter().find(|v| !seen.insert(v.as_str())) {
                    return Err(self.invalid(origin, format!("`{dup}` appears twice in `{name}`")));
                }
                Ok(TypeKind::StringEnum(spec.values.clone()))
            }
            "native-enum" => Ok(TypeKind::NativeEnum(NativeEnumRef {
                file: self.required(&spec.file, "file", origin)?,
                name: spec.name.clone().unwrap_or_else(|| name.to_string()),
            })),
            "custom-native" => {
                let from_js_return = match spec.from_js_return.as_deref() {
                    None | Some("value") => FromJsReturn::Value,
                    Some("error") => FromJsReturn::Error,
                    Some("optional") => FromJsReturn::Optional,
                    Some(other) => {
                        return Err(self.invalid(
                            origin,
                            format!("`from-js-return` must be value, error or optional, found `{other}`"),
                        ))
                    }
                };
                Ok(TypeKind::CustomNative(CustomNative {
                    native_type: self.required(&spec.native_type, "native-type", origin)?,
                    from_js: self.required(&spec.from_js, "from-js", origin)?,
                    from_js_args: self.native_args(&spec.from_js_args, origin)?,
                    from_js_return,
                    validate: spec.validate.clone(),
                    validate_error: spec.validate_error.clone(),
                    deinit: spec.deinit.clone(),
                    deinit_args: self.native_args(&spec.deinit_args, origin)?,
                }))
            }
            "custom-managed" => {
                let abi_key = self.required(&spec.abi, "abi", origin)?;
                let abi = AbiPrimitive::from_key(&abi_key).ok_or_else(|| {
                    self.invalid(origin, format!("`{abi_key}` is not an ABI type"))
                })?;
                let from_js_args = spec
                    .from_js_args
                    .iter()
                    .map(|arg| match arg {
                        HookArg::Keyword(k) if k == "global" => Ok(ManagedArg::Global),
                        HookArg::Keyword(k) if k == "value" => Ok(ManagedArg::Value),
                        HookArg::Keyword(k) if k == "encoded-value" => Ok(ManagedArg::EncodedValue),
                        HookArg::Keyword(k) if k == "out" => Ok(ManagedArg::Out),
                        HookArg::Keyword(k) => {
                            Err(self.invalid(origin, format!("unknown hook argument `{k}`")))
                        }
                        HookArg::Text { text } => Ok(ManagedArg::Text(text.clone())),
                    })
                    .collect::<SourceResult<Vec<_>>>()?;
                Ok(TypeKind::CustomManaged(CustomManaged {
                    managed_type: self.required(&spec.managed_type, "managed-type", origin)?,
                    native_type: self.required(&spec.native_type, "native-type", origin)?,
                    headers: spec.headers.clone(),
                    from_js: self.required(&spec.from_js, "from-js", origin)?,
                    from_js_args,
                    validate_error: self.required(&spec.validate_error, "validate-error", origin)?,
                    abi,
                }))
            }
            other => Err(self.invalid(origin, format!("unknown type kind `{other}`"))),
        }
    }

    fn required(&self, value: &Option<String>, key: &str, origin: Origin) -> SourceResult<String> {
        value
            .clone()
            .ok_or_else(|| self.invalid(origin, format!("missing `{key}`")))
    }

    fn native_args(&self, args: &[HookArg], origin: Origin) -> SourceResult<Vec<NativeArg>> {
        args.iter()
            .map(|arg| match arg {
                HookArg::Keyword(k) if k == "global" => Ok(NativeArg::Global),
                HookArg::Keyword(k) if k == "value" => Ok(NativeArg::Value),
                HookArg::Keyword(k) if k == "allocator" => Ok(NativeArg::Allocator),
                HookArg::Keyword(k) => {
                    Err(self.invalid(origin, format!("unknown hook argument `{k}`")))
                }
                HookArg::Text { text } => Ok(NativeArg::Text(text.clone())),
            })
            .collect()
    }

    fn function(
        &mut self,
        file: usize,
        name: &str,
        spec: &FunctionSpec,
        origin: Origin,
    ) -> SourceResult<Function> {
        if name.trim().is_empty() {
            return Err(SourceError::UnnamedFunction {
                src: self.sources.named_source(origin.file),
                span: origin.span,
            });
        }
        if !spec.variants.is_empty() && (!spec.args.is_empty() || spec.returns.is_some()) {
            return Err(self.invalid(
                origin,
                format!("`{name}` mixes `variants` with a top-level `args`/`returns`"),
            ));
        }

        let mut variants = Vec::new();
        if spec.variants.is_empty() {
            let variant = self.variant(file, name, &spec.args, spec.returns.as_ref(), origin)?;
            variants.push(variant);
        } else {
            let count = spec.variants.len();
            for (i, declared) in spec.variants.iter().enumerate() {
                let variant_origin = self.origin(file, declared.span());
                let declared = declared.get_ref();
                let mut variant = self.variant(
                    file,
                    name,
                    &declared.args,
                    declared.returns.as_ref(),
                    variant_origin,
                )?;
                variant.suffix = match &declared.suffix {
                    Some(suffix) => suffix.clone(),
                    None if count == 1 => String::new(),
                    None => (i + 1).to_string(),
                };
                variants.push(variant);
            }
        }

        let namespace = self.namespace(file).to_string();
        let prefix = match spec.prefix.as_deref() {
            None | Some("") => String::new(),
            Some(p) if p.ends_with('.') => p.to_string(),
            Some(p) => format!("{p}."),
        };
        Ok(Function {
            name: name.to_string(),
            class_name: spec.class_name.clone().unwrap_or_else(|| namespace.clone()),
            namespace,
            file: self.files[file].id,
            prefix,
            variants,
            origin,
        })
    }

    fn variant(
        &mut self,
        file: usize,
        function: &str,
        args: &[toml::Spanned<ArgSpec>],
        returns: Option<&TypeExpr>,
        origin: Origin,
    ) -> SourceResult<Variant> {
        let mut arguments = Vec::with_capacity(args.len());
        let mut seen = FxHashSet::default();
        for arg in args {
            let arg_origin = self.origin(file, arg.span());
            let arg = arg.get_ref();
            if !seen.insert(arg.name.as_str()) {
                return Err(self.invalid(
                    arg_origin,
                    format!("argument `{}` appears twice in `{function}`", arg.name),
                ));
            }
            let hint = format!("{}{}", pascal(function), pascal(&arg.name));
            let ty = self.resolve_expr(file, &arg.ty, arg_origin, &hint)?;
            let ty = self.apply_modifiers(ty, &arg.modifiers, arg_origin)?;
            self.registry.mark_reachable(ty);
            arguments.push(Argument::new(arg.name.clone(), ty, arg_origin));
        }

        let ret = match returns {
            Some(expr) => {
                let hint = format!("{}Result", pascal(function));
                self.resolve_expr(file, expr, origin, &hint)?
            }
            None => self.resolve_named(file, "undefined", origin)?,
        };
        self.registry.mark_reachable(ret);
        Ok(Variant::new(arguments, ret, origin, &self.registry))
    }
}

fn is_compound(spec: &TypeSpec) -> bool {
    spec.kind
        .as_deref()
        .is_some_and(|kind| COMPOUND_KINDS.contains(&kind) || TypeKind::builtin(kind).is_none())
}
