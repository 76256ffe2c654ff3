//! Regenerates every `fixtures/*.json` document and diffs it against the
//! golden `fixtures/*.ts` next to it. `BLESS=1` rewrites the golden files.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use schema_to_types::{GenerateOptions, document, generate};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("fixtures")
}

fn check_fixture(source: &Path, bless: bool) -> Result<bool> {
    let options = match source.with_extension("options.json") {
        path if path.exists() => GenerateOptions::from_json_file(&path)?,
        _ => GenerateOptions::default(),
    };
    let src = std::fs::read_to_string(source)?;
    let registry = document::load_str(&src, &options)?;
    let actual = generate(&registry, &options)?.to_text();

    let golden = source.with_extension("ts");
    if bless {
        std::fs::write(&golden, &actual)?;
        return Ok(true);
    }
    let expected = std::fs::read_to_string(&golden)
        .with_context(|| format!("missing golden file {}", golden.display()))?;
    if expected == actual {
        return Ok(true);
    }
    for (i, (e, a)) in expected.lines().zip(actual.lines()).enumerate() {
        if e != a {
            eprintln!("  line {}: expected {}", i + 1, e.green());
            eprintln!("  line {}:   actual {}", i + 1, a.red());
            break;
        }
    }
    Ok(false)
}

fn main() -> Result<()> {
    let bless = std::env::var_os("BLESS").is_some();
    let mut sources = std::fs::read_dir(fixtures_dir())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            name.ends_with(".json") && !name.ends_with(".options.json")
        })
        .collect::<Vec<_>>();
    sources.sort();

    let mut failed = 0;
    for source in &sources {
        match check_fixture(source, bless) {
            Ok(true) => eprintln!("✅ {}", source.display()),
            Ok(false) => {
                failed += 1;
                eprintln!("❌ {}: output differs", source.display());
            }
            Err(error) => {
                failed += 1;
                eprintln!("❌ {}: {error:#}", source.display());
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} fixtures failed", sources.len());
    }
    Ok(())
}
