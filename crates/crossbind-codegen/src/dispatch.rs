//! Overload selection for functions with several variants.
//!
//! Variants are grouped by how many real arguments they accept. Groups are
//! tried from the largest count down; inside a group the variants must be
//! told apart by the runtime category of one argument, otherwise generation
//! fails before anything is emitted.

use std::collections::BTreeMap;

use crossbind_source::SourceMap;
use crossbind_types::{Function, TypeRegistry, ValueCategory};

use crate::error::{CodegenError, CodegenResult};
use crate::resolve::describe_type;

/// How the host function picks a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    /// Minimum over all variants.
    pub min_required_args: usize,
    /// Maximum real argument count over all variants.
    pub max_args: usize,
    /// Largest count first.
    pub groups: Vec<ArgCountGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgCountGroup {
    pub arg_count: usize,
    /// Whether the group is guarded by `argumentCount >= arg_count`.
    pub check_count: bool,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Index into the function's variants.
    Single(usize),
    ByCategory {
        arg_index: usize,
        /// Tested in order.
        tests: Vec<(ValueCategory, usize)>,
        /// Taken when no test matched.
        fallback: usize,
    },
}

impl DispatchPlan {
    /// Whether the selector needs the clamped argument count at all.
    pub fn needs_argument_count(&self) -> bool {
        self.min_required_args > 0 || self.groups.iter().any(|g| g.check_count)
    }
}

pub fn plan_dispatch(
    function: &Function,
    registry: &TypeRegistry,
    sources: &SourceMap,
) -> CodegenResult<DispatchPlan> {
    let mut min_required_args = usize::MAX;
    let mut max_args = 0;
    let mut by_count: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (index, variant) in function.variants.iter().enumerate() {
        let min = variant.min_required_args;
        let all = variant.real_arg_count(registry);
        min_required_args = min_required_args.min(min);
        max_args = max_args.max(all);
        by_count.entry(min).or_default().push(index);
        if all != min {
            by_count.entry(all).or_default().push(index);
        }
    }
    if function.variants.is_empty() {
        min_required_args = 0;
    }

    let group_count = by_count.len();
    let mut groups = Vec::with_capacity(group_count);
    for (position, (&arg_count, candidates)) in by_count.iter().rev().enumerate() {
        let is_last = position + 1 == group_count;
        let selection = if let [only] = candidates.as_slice() {
            Selection::Single(*only)
        } else {
            select_by_category(function, arg_count, candidates, registry, sources)?
        };
        groups.push(ArgCountGroup {
            arg_count,
            check_count: !is_last && arg_count != min_required_args,
            selection,
        });
    }

    log::debug!(
        "{}::{}: {} variants, {} argument-count groups",
        function.namespace,
        function.name,
        function.variants.len(),
        groups.len()
    );
    Ok(DispatchPlan {
        min_required_args,
        max_args,
        groups,
    })
}

fn select_by_category(
    function: &Function,
    arg_count: usize,
    candidates: &[usize],
    registry: &TypeRegistry,
    sources: &SourceMap,
) -> CodegenResult<Selection> {
    for arg_index in 0..arg_count {
        let mut tests = Vec::with_capacity(candidates.len());
        for &candidate in candidates {
            let arg = function.variants[candidate]
                .real_args(registry)
                .nth(arg_index);
            match arg.and_then(|arg| registry.category(arg.ty)) {
                Some(category) if tests.iter().all(|(seen, _)| *seen != category) => {
                    tests.push((category, candidate));
                }
                _ => break,
            }
        }
        if tests.len() == candidates.len() {
            tests.sort_by_key(|(category, _)| *category);
            let (_, fallback) = tests.pop().unwrap_or((ValueCategory::Undefined, candidates[0]));
            return Ok(Selection::ByCategory {
                arg_index,
                tests,
                fallback,
            });
        }
    }

    let signatures = candidates
        .iter()
        .map(|&index| {
            let args: Vec<_> = function.variants[index]
                .real_args(registry)
                .map(|arg| describe_type(arg.ty, registry))
                .collect();
            format!("    {}({})", function.name, args.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n");
    Err(CodegenError::AmbiguousOverload {
        function: function.name.clone(),
        arg_count,
        variants: format!(
            "Variants with {arg_count} arguments need one argument whose kinds differ:\n{signatures}"
        ),
        src: sources.named_source(function.origin.file),
        span: function.origin.span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_source::{DefinitionSet, Loader};

    fn load(contents: &str) -> DefinitionSet {
        let mut loader = Loader::new();
        loader.add_file("fs.bind.toml", contents).unwrap();
        loader.finish().unwrap()
    }

    fn plan(contents: &str) -> CodegenResult<DispatchPlan> {
        let set = load(contents);
        plan_dispatch(&set.files[0].functions[0], &set.registry, &set.sources)
    }

    #[test]
    fn distinct_counts_dispatch_without_type_tests() {
        let plan = plan(
            r#"
[[functions.f.variants]]
args = [{ name = "s", type = "DOMString" }]
[[functions.f.variants]]
args = [{ name = "a", type = "f64" }, { name = "b", type = "f64" }]
"#,
        )
        .unwrap();
        assert_eq!(plan.min_required_args, 1);
        assert_eq!(plan.max_args, 2);
        assert_eq!(
            plan.groups,
            vec![
                ArgCountGroup { arg_count: 2, check_count: true, selection: Selection::Single(1) },
                ArgCountGroup { arg_count: 1, check_count: false, selection: Selection::Single(0) },
            ]
        );
    }

    #[test]
    fn same_count_is_split_by_category() {
        let plan = plan(
            r#"
[[functions.g.variants]]
args = [{ name = "n", type = "i32" }]
[[functions.g.variants]]
args = [{ name = "s", type = "BunString" }]
"#,
        )
        .unwrap();
        assert_eq!(
            plan.groups,
            vec![ArgCountGroup {
                arg_count: 1,
                check_count: false,
                selection: Selection::ByCategory {
                    arg_index: 0,
                    tests: vec![(ValueCategory::String, 1)],
                    fallback: 0,
                },
            }]
        );
    }

    #[test]
    fn optional_tails_register_twice() {
        let plan = plan(
            r#"
[[functions.h.variants]]
args = [
  { name = "path", type = "DOMString" },
  { name = "mode", type = "u32", optional = true },
]
[[functions.h.variants]]
args = [{ name = "fd", type = "i32" }, { name = "mode", type = "u32" }]
"#,
        )
        .unwrap();
        let counts: Vec<_> = plan.groups.iter().map(|g| g.arg_count).collect();
        assert_eq!(counts, [2, 1]);
        assert!(matches!(
            plan.groups[0].selection,
            Selection::ByCategory { arg_index: 0, fallback: 1, .. }
        ));
        assert_eq!(plan.groups[1].selection, Selection::Single(0));
        assert!(plan.needs_argument_count());
    }

    #[test]
    fn indistinguishable_variants_are_fatal() {
        let err = plan(
            r#"
[[functions.k.variants]]
args = [{ name = "a", type = "u8" }]
[[functions.k.variants]]
args = [{ name = "b", type = "f64" }]
"#,
        )
        .unwrap_err();
        match err {
            CodegenError::AmbiguousOverload { function, arg_count, variants, .. } => {
                assert_eq!(function, "k");
                assert_eq!(arg_count, 1);
                assert!(variants.contains("k(u8)"));
                assert!(variants.contains("k(f64)"));
            }
            other => panic!("expected an ambiguity error, got {other:?}"),
        }
    }
}
