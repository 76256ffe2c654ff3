//! Minimal CLI: schema documents → (check | generate)
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::document::DocumentLoader;
use crate::generate::{Generated, generate};
use crate::model::SchemaMap;
use crate::options::{GenerateOptions, MissingFieldPolicy, ReferencePolicy};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// turn a registry of validation schemas into structural TypeScript declarations
#[derive(Parser, Debug)]
#[command(name = "schema-to-types", version)]
pub struct CommandLineInterface {
    /// more log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve every declaration and write the generated file
    Generate(GenerateOut),
    /// resolve every declaration and report diagnostics without writing
    Check(CheckOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer selecting the schema document inside each input (e.g. /types)
    #[arg(long)]
    json_pointer: Option<String>,

    /// generation options file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// leave unresolvable fields out instead of failing
    #[arg(long, default_value_t = false)]
    skip_missing: bool,

    /// fail when a reference goes through an instance registered under several names
    #[arg(long, default_value_t = false)]
    strict_references: bool,

    /// nesting limit for anonymous schemas
    #[arg(long)]
    max_depth: Option<usize>,

    /// One or more schema documents. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// omit the generated-file banner
    #[arg(long)]
    no_header: bool,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn options(&self) -> Result<GenerateOptions> {
        let mut options = match self.config.as_ref() {
            Some(path) => GenerateOptions::from_json_file(path)
                .with_context(|| format!("failed to load options from {}", path.display()))?,
            None => GenerateOptions::default(),
        };
        if self.skip_missing {
            options.missing_field_policy = MissingFieldPolicy::Skip;
        }
        if self.strict_references {
            options.reference_policy = ReferencePolicy::Strict;
        }
        if let Some(max_depth) = self.max_depth {
            options.max_depth = max_depth;
        }
        options.validate().context("invalid generation options")?;
        Ok(options)
    }

    fn load_registry(&self, options: &GenerateOptions) -> Result<SchemaMap> {
        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut loader = DocumentLoader::new(options);
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read schema document {source_path_str}"))?;
            let result = match self.json_pointer.as_ref() {
                None => loader.load_str(&source),
                Some(pointer) => {
                    let value = serde_json::from_str::<serde_json::Value>(&source)
                        .with_context(|| format!("failed to parse JSON ({source_path_str})"))?;
                    crate::document::select(value, pointer).and_then(|value| loader.load_value(value))
                }
            };
            result.with_context(|| format!("invalid schema document {source_path_str}"))?;
            tracing::info!(path = %source_path_str, "schema document loaded");
        }
        Ok(loader.finish())
    }

    fn run_generation(&self, options: &GenerateOptions) -> Result<Generated> {
        let registry = self.load_registry(options)?;
        let generated = generate(&registry, options)?;
        for diagnostic in &generated.diagnostics {
            eprintln!("{} {diagnostic}", "warning:".yellow().bold());
        }
        Ok(generated)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let default_level = match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                let mut options = target.input_settings.options()?;
                if target.no_header {
                    options.header = false;
                }
                let generated = target.input_settings.run_generation(&options)?;
                let text = generated.to_text();

                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    std::fs::write(out, &text).with_context(|| format!("failed to write {}", out.display()))?;
                    eprintln!("{} {}", "File saved:".green(), out.display());
                } else {
                    print!("{text}");
                }
            }
            Command::Check(target) => {
                let options = target.input_settings.options()?;
                let generated = target.input_settings.run_generation(&options)?;
                eprintln!(
                    "{} {} declarations, {} diagnostics",
                    "ok:".green().bold(),
                    generated.declarations.len(),
                    generated.diagnostics.len()
                );
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched = glob::glob(pattern)
                .with_context(|| format!("bad glob pattern: {pattern}"))?
                .collect::<Result<Vec<_>, _>>()?;
            if matched.is_empty() {
                bail!("glob pattern matched no files: {pattern}");
            }
            // glob yields alphabetical order already; keep it stable regardless
            matched.sort();
            out.append(&mut matched);
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn unmatched_glob_is_an_error() {
        let err = resolve_file_path_patterns(["/definitely/not/here/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"));
    }

    #[test]
    fn flags_override_the_defaults() {
        let cli = CommandLineInterface::try_parse_from([
            "schema-to-types",
            "generate",
            "-i",
            "schemas.json",
            "--skip-missing",
            "--strict-references",
            "--max-depth",
            "5",
        ])
        .unwrap();
        let Command::Generate(target) = &cli.cmd else { panic!("expected generate") };
        let options = target.input_settings.options().unwrap();
        assert_eq!(options.missing_field_policy, MissingFieldPolicy::Skip);
        assert_eq!(options.reference_policy, ReferencePolicy::Strict);
        assert_eq!(options.max_depth, 5);
    }

    #[test]
    fn depth_flag_above_the_limit_is_rejected() {
        let cli = CommandLineInterface::try_parse_from([
            "schema-to-types",
            "check",
            "-i",
            "schemas.json",
            "--max-depth",
            "100000",
        ])
        .unwrap();
        let Command::Check(target) = &cli.cmd else { panic!("expected check") };
        let err = target.input_settings.options().unwrap_err();
        assert!(format!("{err:#}").contains("maxDepth"), "{err:#}");
    }
}
