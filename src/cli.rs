//! Minimal CLI: load snapshots → compile → track usage → render a dialect
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CompilerConfig;
use crate::diag::Diagnostics;
use crate::pipeline;
use crate::render::{Dialect, RenderOptions};

// ----------------------------------------------------------------------------
// TYPES
// ----------------------------------------------------------------------------

/// compile type-graph snapshots into runtime validator modules (Joi or yup)
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// emit Joi validator modules
    Joi(EmitSettings),
    /// emit yup validator modules
    Yup(EmitSettings),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more snapshot files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct EmitSettings {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory (defaults to writing next to each source path)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// suffix inserted before the output file extension
    #[arg(long, default_value = ".generated")]
    suffix: String,

    /// suffix appended to generated validator identifiers
    #[arg(long, default_value = "Schema")]
    id_suffix: String,

    /// passthrough compiler configuration (JSON)
    #[arg(long)]
    compiler_config: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ----------------------------------------------------------------------------
// IMPLEMENTATION
// ----------------------------------------------------------------------------

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let (dialect, settings) = match &self.cmd {
            Command::Joi(settings) => (Dialect::Joi, settings),
            Command::Yup(settings) => (Dialect::Yup, settings),
        };

        // debug path
        if settings.no_op {
            eprintln!("{self:#?}");
            return Ok(());
        }

        let config = match &settings.compiler_config {
            Some(path) => crate::config::load(path)?,
            None => CompilerConfig::default(),
        };

        let diags = Diagnostics::new();
        let source_paths = resolve_file_path_patterns(&settings.input_settings.input)?;
        let mut snapshots = Vec::with_capacity(source_paths.len());
        for path in &source_paths {
            snapshots.push(crate::snapshot::load(path)?);
        }

        // phase one: populate every file's tables, then close reachability
        let store = pipeline::build_store(&snapshots, &config, &diags)?;

        // phase two: render, then write everything out in parallel
        let opts = RenderOptions {
            id_suffix: settings.id_suffix.clone(),
            file_suffix: settings.suffix.clone(),
        };
        let outputs =
            pipeline::render_all(&store, dialect, &opts, settings.out_dir.as_deref(), &diags)?;
        pipeline::write_outputs(&outputs)?;

        if diags.warning_count() > 0 {
            eprintln!(
                "finished with {} warning(s); {} file(s) written",
                diags.warning_count(),
                outputs.len(),
            );
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// INTERNAL HELPERS
// ----------------------------------------------------------------------------

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
