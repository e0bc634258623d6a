//! Minimal CLI: graph documents → (validators | module dump)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use tracing::info;

use raml_validator_gen::model::document;
use raml_validator_gen::{compile, compile_declared, Codegen, Module, Options};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile resolved RAML type graphs into standalone JavaScript validators
#[derive(Parser, Debug)]
#[command(version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile and emit the CommonJS validator module
    Compile(CompileOut),
    /// compile and print the assembled module (names, constant tables, fragments) as JSON
    Inspect(InspectOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more graph documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// Type to export (repeatable); every declared type when omitted
    #[arg(long = "root")]
    roots: Vec<String>,

    /// compare `enum` members case-insensitively
    #[arg(long, default_value_t = false)]
    case_insensitive_enums: bool,
}

#[derive(clap::Parser, Debug)]
struct CompileOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .js file, or a directory when there are several inputs (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct InspectOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file, or a directory when there are several inputs (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn options(&self) -> Options {
        Options { case_insensitive_enums: self.case_insensitive_enums }
    }

    /// One independent compile session per input document.
    fn build_modules(&self) -> Result<Vec<(PathBuf, Module)>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        source_paths
            .into_par_iter()
            .map(|path| {
                let module = self.build_module(&path)?;
                Ok((path, module))
            })
            .collect()
    }

    fn build_module(&self, path: &Path) -> Result<Module> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read source file {}", path.display()))?;
        let loaded = document::load_str(&source)
            .with_context(|| format!("failed to load graph document {}", path.display()))?;
        if self.roots.is_empty() {
            info!(path = %path.display(), roots = loaded.declared.len(), "compiling graph document");
            return compile_declared(&loaded.graph, self.options())
                .with_context(|| format!("failed to compile {}", path.display()));
        }
        let roots = self
            .roots
            .iter()
            .map(|name| {
                loaded
                    .declared
                    .get(name)
                    .copied()
                    .with_context(|| format!("unknown root type `{name}` in {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        info!(path = %path.display(), roots = roots.len(), "compiling graph document");
        compile(&loaded.graph, &roots, self.options())
            .with_context(|| format!("failed to compile {}", path.display()))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Compile(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let outputs = target
                    .input_settings
                    .build_modules()?
                    .into_iter()
                    .map(|(path, module)| {
                        let mut cg = Codegen::new();
                        cg.emit(&module);
                        (path, cg.into_string())
                    })
                    .collect::<Vec<_>>();
                write_outputs(&outputs, target.out.as_deref(), "js")
            }
            Command::Inspect(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let outputs = target
                    .input_settings
                    .build_modules()?
                    .into_iter()
                    .map(|(path, module)| Ok((path, serde_json::to_string_pretty(&module)?)))
                    .collect::<Result<Vec<_>>>()?;
                write_outputs(&outputs, target.out.as_deref(), "json")
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// One output → `out` is a file; several → `out` is a directory of `<stem>.<ext>`.
fn write_outputs(outputs: &[(PathBuf, String)], out: Option<&Path>, ext: &str) -> Result<()> {
    let Some(out) = out else {
        for (_, text) in outputs {
            println!("{text}");
        }
        return Ok(());
    };
    if let [(_, text)] = outputs {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
        return Ok(());
    }
    std::fs::create_dir_all(out)?;
    for (source, text) in outputs {
        let stem = source
            .file_stem()
            .with_context(|| format!("input path has no file name: {}", source.display()))?;
        let target = out.join(stem).with_extension(ext);
        std::fs::write(&target, text).with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
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
                anyhow::bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //
