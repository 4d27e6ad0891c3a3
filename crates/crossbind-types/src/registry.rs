use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use crossbind_layout::{AbiPrimitive, AbiType, ExternField, NamedShape};
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};

use crate::flags::TypeFlags;
use crate::kind::{EnumVariant, ResolvedEnum, TypeKind, ValueCategory};
use crate::origin::Origin;

/// Interned identity of a [`Type`] within one [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Type {
    kind: TypeKind,
    flags: TypeFlags,
    origin: Origin,
    /// Namespace of the definition file that introduced the type.
    namespace: String,
    name: Option<String>,
    /// The named type this one adds flags to.
    base: Option<TypeId>,
    exported: bool,
    hash: u64,
}

/// The parts of a type that decide whether two declarations are the same type.
#[derive(Hash, PartialEq, Eq)]
struct Identity<'a> {
    kind: &'a TypeKind,
    flags: &'a TypeFlags,
    base: Option<TypeId>,
    declared: Option<(&'a str, &'a str)>,
}

impl Type {
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn flags(&self) -> &TypeFlags {
        &self.flags
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    pub fn is_exported(&self) -> bool {
        self.exported
    }

    /// Content hash used for interning.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn is_nullable(&self) -> bool {
        self.flags.is_nullable()
    }

    /// Execution-context values never appear at the call site.
    pub fn is_context_argument(&self) -> bool {
        matches!(self.kind, TypeKind::GlobalObject | TypeKind::VirtualMachine)
    }

    /// Placeholder arguments that occupy a position but are never read.
    pub fn is_ignorable(&self) -> bool {
        self.kind == TypeKind::Undefined
    }

    fn identity(&self) -> Identity<'_> {
        let declared = if self.exported {
            self.name
                .as_deref()
                .map(|name| (self.namespace.as_str(), name))
        } else {
            None
        };
        Identity {
            kind: &self.kind,
            flags: &self.flags,
            base: self.base,
            declared,
        }
    }
}

/// Owner of every type of one generation run.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<Type>,
    interned: FxHashMap<u64, Vec<TypeId>>,
    names: FxHashSet<(String, String)>,
    reachable: Vec<TypeId>,
    reachable_set: FxHashSet<TypeId>,
    enums: FxHashMap<TypeId, ResolvedEnum>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, ty)| (TypeId(i as u32), ty))
    }

    fn insert(&mut self, mut ty: Type) -> TypeId {
        let mut hasher = FxHasher::default();
        ty.identity().hash(&mut hasher);
        let hash = hasher.finish();

        if let Some(candidates) = self.interned.get(&hash) {
            for &id in candidates {
                if self.types[id.index()].identity() == ty.identity() {
                    return id;
                }
            }
        }

        let id = TypeId(self.types.len() as u32);
        ty.hash = hash;
        self.types.push(ty);
        self.interned.entry(hash).or_default().push(id);
        id
    }

    /// Interns an anonymous type. Structurally equal types share one id.
    pub fn intern(
        &mut self,
        kind: TypeKind,
        flags: TypeFlags,
        namespace: &str,
        origin: Origin,
    ) -> TypeId {
        self.insert(Type {
            kind,
            flags,
            origin,
            namespace: namespace.to_string(),
            name: None,
            base: None,
            exported: false,
            hash: 0,
        })
    }

    /// Registers an exported type under `name` in `namespace`.
    ///
    /// Returns `None` when the namespace already has a type of that name.
    pub fn declare(
        &mut self,
        name: &str,
        kind: TypeKind,
        flags: TypeFlags,
        namespace: &str,
        origin: Origin,
    ) -> Option<TypeId> {
        if !self.names.insert((namespace.to_string(), name.to_string())) {
            return None;
        }
        Some(self.insert(Type {
            kind,
            flags,
            origin,
            namespace: namespace.to_string(),
            name: Some(name.to_string()),
            base: None,
            exported: true,
            hash: 0,
        }))
    }

    /// The same type as `base` with `flags` in place of its own.
    pub fn derive(&mut self, base: TypeId, flags: TypeFlags, origin: Origin) -> TypeId {
        let root = self.definition(base);
        let def = self.get(root);
        if def.flags == flags {
            return root;
        }
        let derived = Type {
            kind: def.kind.clone(),
            flags,
            origin,
            namespace: def.namespace.clone(),
            name: None,
            base: Some(root),
            exported: false,
            hash: 0,
        };
        self.insert(derived)
    }

    /// Names an anonymous type that needs a declaration of its own.
    ///
    /// The first suggestion wins; clashes within a namespace get a numeric suffix.
    pub fn suggest_name(&mut self, id: TypeId, name: &str) {
        let root = self.definition(id);
        let ty = &self.types[root.index()];
        if ty.name.is_some() || !ty.kind.lowers_to_named_type() {
            return;
        }
        let namespace = ty.namespace.clone();
        let mut candidate = name.to_string();
        let mut n = 2;
        while self.names.contains(&(namespace.clone(), candidate.clone())) {
            candidate = format!("{name}{n}");
            n += 1;
        }
        self.names.insert((namespace, candidate.clone()));
        log::debug!("naming anonymous {} `{}`", ty.kind.describe(), candidate);
        self.types[root.index()].name = Some(candidate);
    }

    /// Follows flag-only derivations back to the declaring type.
    pub fn definition(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let Some(base) = self.get(current).base {
            current = base;
        }
        current
    }

    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.get(self.definition(id)).name.as_deref()
    }

    /// Fully qualified managed and native names of a named type.
    pub fn qualified_names(&self, id: TypeId) -> Option<(String, String)> {
        let def = self.get(self.definition(id));
        let name = def.name.as_deref()?;
        Some((
            format!("Generated::{}::{}", def.namespace, name),
            format!("{}.{}", def.namespace, name),
        ))
    }

    /// Marks `id` and everything it refers to as needed by the output.
    pub fn mark_reachable(&mut self, id: TypeId) {
        let mut worklist = VecDeque::new();
        if self.reachable_set.insert(id) {
            self.reachable.push(id);
            worklist.push_back(id);
        }
        while let Some(current) = worklist.pop_front() {
            for child in self.children(current) {
                if self.reachable_set.insert(child) {
                    self.reachable.push(child);
                    worklist.push_back(child);
                }
            }
        }
    }

    fn children(&self, id: TypeId) -> Vec<TypeId> {
        let ty = self.get(id);
        let mut children: Vec<TypeId> = ty.base.into_iter().collect();
        if let TypeKind::Dictionary(fields) = &ty.kind {
            children.extend(fields.iter().map(|f| f.ty));
        }
        children
    }

    pub fn is_reachable(&self, id: TypeId) -> bool {
        self.reachable_set.contains(&id)
    }

    /// Reachable types in discovery order.
    pub fn reachable(&self) -> &[TypeId] {
        &self.reachable
    }

    /// Reachable types that need a declaration, dependencies first.
    pub fn reachable_definitions(&self) -> Vec<TypeId> {
        let mut ordered = Vec::new();
        let mut visited = FxHashSet::default();
        for &id in &self.reachable {
            self.visit_definition(self.definition(id), &mut visited, &mut ordered);
        }
        ordered
    }

    fn visit_definition(
        &self,
        id: TypeId,
        visited: &mut FxHashSet<TypeId>,
        ordered: &mut Vec<TypeId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if let TypeKind::Dictionary(fields) = &self.get(id).kind {
            for field in fields {
                self.visit_definition(self.definition(field.ty), visited, ordered);
            }
        }
        let ty = self.get(id);
        if ty.exported || ty.kind.lowers_to_named_type() {
            ordered.push(id);
        }
    }

    pub fn set_resolved_enum(&mut self, id: TypeId, resolved: ResolvedEnum) {
        let root = self.definition(id);
        self.enums.insert(root, resolved);
    }

    pub fn resolved_enum(&self, id: TypeId) -> Option<&ResolvedEnum> {
        self.enums.get(&self.definition(id))
    }

    pub fn enum_tag(&self, id: TypeId) -> Option<AbiPrimitive> {
        match self.get(id).kind() {
            TypeKind::StringEnum(values) => Some(AbiPrimitive::tag_for_count(values.len())),
            TypeKind::NativeEnum(_) => self.resolved_enum(id).map(|e| e.tag),
            _ => None,
        }
    }

    /// Variants of an enum type with their integer values.
    pub fn enum_variants(&self, id: TypeId) -> Option<Vec<EnumVariant>> {
        match self.get(id).kind() {
            TypeKind::StringEnum(values) => Some(
                values
                    .iter()
                    .enumerate()
                    .map(|(i, name)| EnumVariant {
                        name: name.clone(),
                        value: i as i64,
                    })
                    .collect(),
            ),
            TypeKind::NativeEnum(_) => self.resolved_enum(id).map(|e| e.variants.clone()),
            _ => None,
        }
    }

    /// Flat representation of the type's values, ignoring optionality.
    pub fn value_layout(&self, id: TypeId) -> Option<AbiType> {
        let ty = self.get(id);
        let layout = match ty.kind() {
            TypeKind::Boolean => AbiPrimitive::Bool.into(),
            TypeKind::Integer(int) => int.abi().into(),
            TypeKind::F64 => AbiPrimitive::F64.into(),
            TypeKind::String(kind) => kind.abi().into(),
            TypeKind::Any => AbiPrimitive::JsValue.into(),
            TypeKind::GlobalObject | TypeKind::VirtualMachine => {
                AbiPrimitive::GlobalObjectPointer.into()
            }
            TypeKind::Undefined | TypeKind::CustomNative(_) => return None,
            TypeKind::CustomManaged(custom) => AbiType::named(
                custom.managed_type.clone(),
                custom.native_type.clone(),
                NamedShape::Scalar(custom.abi),
            ),
            TypeKind::StringEnum(_) | TypeKind::NativeEnum(_) => {
                let tag = self.enum_tag(id)?;
                let (cpp, zig) = self.qualified_names(id)?;
                AbiType::named(cpp, zig, NamedShape::Scalar(tag))
            }
            TypeKind::Dictionary(fields) => {
                let mut record = Vec::with_capacity(fields.len());
                for field in fields {
                    record.push(ExternField::new(field.key.clone(), self.flat_layout(field.ty)?));
                }
                let (cpp, zig) = self.qualified_names(id)?;
                AbiType::named(cpp, zig, NamedShape::Record(record))
            }
        };
        Some(layout)
    }

    /// Layout of a value that can cross the boundary without boxing or a presence flag.
    pub fn flat_layout(&self, id: TypeId) -> Option<AbiType> {
        if self.get(id).is_nullable() {
            return None;
        }
        self.value_layout(id)
    }

    pub fn category(&self, id: TypeId) -> Option<ValueCategory> {
        self.get(id).kind().category()
    }
}
