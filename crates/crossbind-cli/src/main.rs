mod error;
mod progress;

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use crossbind_codegen::{Generator, GeneratorOptions};
use crossbind_source::ProjectConfig;

use crate::error::CliError;
use crate::progress::SpinnerReporter;

#[derive(Parser, Debug)]
#[command(name = "crossbind")]
#[command(about = "Generates managed and native glue from binding definitions", long_about = None)]
struct Args {
    /// Directory receiving the generated C++ and headers
    #[arg(long, value_name = "DIR")]
    codegen_root: PathBuf,

    /// Directory searched for *.bind.toml files
    #[arg(long, value_name = "DIR", default_value = ".")]
    source_root: PathBuf,

    /// Annotate generated glue with the resolved lowering plans
    #[arg(long)]
    debug: bool,

    /// Zig binary used to extract native enums
    #[arg(long, value_name = "PATH")]
    zig: Option<PathBuf>,

    /// Precomputed enum metadata, used instead of running zig
    #[arg(long, value_name = "FILE")]
    enum_metadata: Option<PathBuf>,

    /// Aggregated native output, relative to the source root
    #[arg(long, value_name = "PATH")]
    native_output: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity,
}

impl Args {
    fn options(&self) -> Result<GeneratorOptions, CliError> {
        if !self.source_root.is_dir() {
            return Err(CliError::SourceRootNotFound {
                path: self.source_root.clone(),
            });
        }
        let config = ProjectConfig::load(&self.source_root)?;
        let mut options =
            GeneratorOptions::from_config(&self.source_root, &self.codegen_root, &config)?;
        options.debug = self.debug;
        if let Some(zig) = &self.zig {
            options.zig = zig.clone();
        }
        if let Some(metadata) = &self.enum_metadata {
            options.enum_metadata = Some(metadata.clone());
        }
        if let Some(native_output) = &self.native_output {
            options.native_output = native_output.clone();
        }
        Ok(options)
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let options = args.options()?;
    log::debug!("{options:#?}");
    let mut reporter = SpinnerReporter::new(args.verbose.is_silent());
    let summary = Generator::new(options).run(&mut reporter)?;
    log::info!(
        "{} written, {} unchanged",
        summary.written,
        summary.unchanged
    );
    Ok(())
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.verbose.log_level_filter().as_str()),
    )
    .format_timestamp(None)
    .init();

    run(&args)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codegen_root_is_required() {
        let err = Args::try_parse_from(["crossbind"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn flags_override_the_project_file() {
        let dir = std::env::temp_dir();
        let args = Args::try_parse_from([
            "crossbind",
            "--codegen-root",
            "out",
            "--source-root",
            dir.to_str().unwrap(),
            "--debug",
            "--zig",
            "/opt/zig/zig",
        ])
        .unwrap();
        let options = args.options().unwrap();
        assert!(options.debug);
        assert_eq!(options.zig, PathBuf::from("/opt/zig/zig"));
        assert_eq!(options.codegen_dir, PathBuf::from("out"));
    }

    #[test]
    fn missing_source_root_is_reported() {
        let args = Args::try_parse_from([
            "crossbind",
            "--codegen-root",
            "out",
            "--source-root",
            "/definitely/not/here",
        ])
        .unwrap();
        assert!(matches!(
            args.options(),
            Err(CliError::SourceRootNotFound { .. })
        ));
    }
}
