//! One generation run, from definition files to written artifacts.
//!
//! Every artifact is rendered in memory first. The first error ends the run
//! before anything touches the disk, so a failed run leaves the previous
//! output in place.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbind_layout::AbiPrimitive;
use crossbind_source::{load_definitions_with, DefinitionSet, GeneratorConfig, ProjectConfig};
use crossbind_types::TypeId;
use rustc_hash::FxHashMap;

use crate::context::GenerationContext;
use crate::dispatch::{plan_dispatch, DispatchPlan};
use crate::enums::{collect_requests, EnumResolver, StaticEnumResolver, ToolchainEnumResolver};
use crate::error::CodegenResult;
use crate::header::{check_namespaces, HeaderAssembler};
use crate::managed::ManagedEmitter;
use crate::native::NativeEmitter;
use crate::output::OutputSet;
use crate::resolve::StrategyResolver;

pub const MANAGED_OUTPUT_NAME: &str = "GeneratedBindings.cpp";

/// Settings of one run, after merging the project file with command-line overrides.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Directory searched for definition files.
    pub source_root: PathBuf,
    /// Directory receiving the managed artifact and the headers.
    pub codegen_dir: PathBuf,
    /// Aggregated native artifact, relative to `source_root`.
    pub native_output: PathBuf,
    pub value_pass: Vec<AbiPrimitive>,
    pub reorder_fields: bool,
    pub debug: bool,
    pub exclude: Vec<String>,
    /// Native toolchain binary used to extract enums.
    pub zig: PathBuf,
    /// Precomputed enum metadata; the toolchain is not run when set.
    pub enum_metadata: Option<PathBuf>,
}

impl GeneratorOptions {
    pub fn from_config(
        source_root: impl Into<PathBuf>,
        codegen_dir: impl Into<PathBuf>,
        config: &ProjectConfig,
    ) -> CodegenResult<Self> {
        let source_root = source_root.into();
        Ok(Self {
            value_pass: config.value_pass_set()?,
            reorder_fields: config.generator.reorder_fields,
            native_output: config.generator.native_output.clone(),
            exclude: config.generator.exclude.clone(),
            debug: false,
            zig: PathBuf::from("zig"),
            enum_metadata: config
                .enums
                .metadata
                .as_ref()
                .map(|path| source_root.join(path)),
            codegen_dir: codegen_dir.into(),
            source_root,
        })
    }

    fn loader_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            native_output: self.native_output.clone(),
            exclude: self.exclude.clone(),
            ..GeneratorConfig::default()
        }
    }
}

/// Receives human-readable phase updates.
pub trait StatusReporter {
    fn status(&mut self, message: &str);

    fn finish(&mut self, _summary: &GenerationSummary) {}
}

/// Sends status lines to the `log` facade.
#[derive(Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn status(&mut self, message: &str) {
        log::info!("{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub files: usize,
    pub types: usize,
    pub written: usize,
    pub unchanged: usize,
    pub elapsed: Duration,
}

impl GenerationSummary {
    pub fn message(&self) -> String {
        format!(
            "processed {} files, {} types. ({} ms)",
            self.files,
            self.types,
            self.elapsed.as_millis()
        )
    }
}

/// Artifacts of one run, not yet written.
#[derive(Debug)]
pub struct Rendered {
    pub outputs: OutputSet,
    pub files: usize,
    /// Reachable types.
    pub types: usize,
}

pub struct Generator {
    options: GeneratorOptions,
    enum_resolver: Option<Box<dyn EnumResolver>>,
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            enum_resolver: None,
        }
    }

    /// Replaces the resolver chosen from the options.
    pub fn with_enum_resolver(mut self, resolver: impl EnumResolver + 'static) -> Self {
        self.enum_resolver = Some(Box::new(resolver));
        self
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Renders every artifact without writing any of them.
    pub fn render(&mut self, reporter: &mut dyn StatusReporter) -> CodegenResult<Rendered> {
        let root = self.options.source_root.clone();
        let mut set = load_definitions_with(&root, &self.options.loader_config(), |path| {
            reporter.status(&format!("Loading {}", path.display()));
        })?;
        check_namespaces(&set.files)?;

        let enum_files = self.resolve_enums(&mut set, reporter)?;

        let resolver = StrategyResolver::new(
            self.options.value_pass.clone(),
            self.options.reorder_fields,
        );
        let DefinitionSet {
            sources,
            registry,
            files,
            ..
        } = &mut set;
        for file in files.iter_mut() {
            for function in &mut file.functions {
                resolver.resolve_function(function, registry, sources)?;
            }
        }

        let mut plans: FxHashMap<(usize, usize), DispatchPlan> = FxHashMap::default();
        for (file_index, file) in set.files.iter().enumerate() {
            for (function_index, function) in file.functions.iter().enumerate() {
                if function.variants.len() > 1 {
                    let plan = plan_dispatch(function, &set.registry, &set.sources)?;
                    plans.insert((file_index, function_index), plan);
                }
            }
        }

        let mut ctx =
            GenerationContext::new(&set.registry, &set.sources, &self.options.native_output);
        ctx.debug = self.options.debug;
        ctx.enum_files = enum_files;

        let mut managed = ManagedEmitter::new(&ctx);
        let mut native = NativeEmitter::new(&ctx);
        let headers = HeaderAssembler::new(&ctx);
        let mut outputs = OutputSet::new();

        managed.emit_dictionary_converters()?;
        for (file_index, file) in set.files.iter().enumerate() {
            for (function_index, function) in file.functions.iter().enumerate() {
                managed.emit_function(file, function, plans.get(&(file_index, function_index)))?;
            }
            native.emit_file(file, &file.functions)?;
            outputs.add(
                self.options.codegen_dir.join(HeaderAssembler::file_name(file)),
                headers.render(file, &file.functions)?,
            )?;
        }
        outputs.add(
            self.options.codegen_dir.join(MANAGED_OUTPUT_NAME),
            managed.finish()?,
        )?;
        outputs.add(root.join(&self.options.native_output), native.finish())?;

        Ok(Rendered {
            outputs,
            files: set.files.len(),
            types: set.registry.reachable().len(),
        })
    }

    /// Renders and writes every artifact whose contents changed.
    pub fn run(&mut self, reporter: &mut dyn StatusReporter) -> CodegenResult<GenerationSummary> {
        let started = Instant::now();
        let rendered = self.render(reporter)?;
        let written = rendered.outputs.write_all(|path| {
            let name = path.file_name().map(Path::new).unwrap_or(path);
            reporter.status(&format!("Writing {}", name.display()));
        })?;
        let summary = GenerationSummary {
            files: rendered.files,
            types: rendered.types,
            written: written.written,
            unchanged: written.unchanged,
            elapsed: started.elapsed(),
        };
        reporter.status(&summary.message());
        reporter.finish(&summary);
        Ok(summary)
    }

    /// Resolves every reachable native enum into the registry.
    ///
    /// Returns the native source of each enum, keyed by its definition.
    fn resolve_enums(
        &mut self,
        set: &mut DefinitionSet,
        reporter: &mut dyn StatusReporter,
    ) -> CodegenResult<FxHashMap<TypeId, PathBuf>> {
        let requests = collect_requests(&set.registry, &set.sources, &set.native_sources)?;
        let mut files = FxHashMap::default();
        if requests.is_empty() {
            return Ok(files);
        }
        reporter.status(&format!("Extracting {} enum definitions", requests.len()));
        let mut resolver = match self.enum_resolver.take() {
            Some(resolver) => resolver,
            None => self.default_enum_resolver()?,
        };
        let resolved = resolver.resolve(&requests);
        self.enum_resolver = Some(resolver);
        for (request, resolved) in requests.into_iter().zip(resolved?) {
            log::debug!(
                "{} in {}: {} variants, tag {}",
                request.name,
                request.file.display(),
                resolved.variants.len(),
                resolved.tag
            );
            set.registry.set_resolved_enum(request.id, resolved);
            files.insert(request.id, request.file);
        }
        Ok(files)
    }

    fn default_enum_resolver(&self) -> CodegenResult<Box<dyn EnumResolver>> {
        Ok(match &self.options.enum_metadata {
            Some(path) => Box::new(StaticEnumResolver::from_json_file(path)?),
            None => Box::new(ToolchainEnumResolver {
                root: self.options.source_root.clone(),
                codegen_dir: self.options.codegen_dir.clone(),
                native_output: self.options.native_output.clone(),
                zig: self.options.zig.clone(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_message() {
        let summary = GenerationSummary {
            files: 3,
            types: 12,
            written: 1,
            unchanged: 4,
            elapsed: Duration::from_millis(41),
        };
        assert_eq!(summary.message(), "processed 3 files, 12 types. (41 ms)");
    }

    #[test]
    fn options_follow_the_project_file() {
        let mut config = ProjectConfig::default();
        config.generator.reorder_fields = false;
        config.enums.metadata = Some(PathBuf::from("enums.json"));
        let options = GeneratorOptions::from_config("/src", "/out", &config).unwrap();
        assert!(!options.reorder_fields);
        assert_eq!(options.enum_metadata, Some(PathBuf::from("/src/enums.json")));
        assert_eq!(options.zig, PathBuf::from("zig"));
    }
}
