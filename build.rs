//! Records the `hyper` version resolved for this build as `TAPEDECK_HYPER_VERSION`

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from);
    let out_dir = env::var_os("OUT_DIR").map(PathBuf::from);

    // The consumer's lockfile sits above OUT_DIR; a packaged lockfile next to
    // the manifest is only a fallback
    let mut lockfiles: Vec<PathBuf> = Vec::new();
    for start in out_dir.iter().chain(manifest_dir.iter()) {
        for dir in start.ancestors() {
            let candidate = dir.join("Cargo.lock");
            if candidate.is_file() && !lockfiles.contains(&candidate) {
                lockfiles.push(candidate);
            }
        }
    }

    let locked = lockfiles.iter().find_map(|lockfile| {
        let version = locked_hyper_version(lockfile)?;
        println!("cargo:rerun-if-changed={}", lockfile.display());
        Some(version)
    });

    let version = locked
        .or_else(|| {
            let manifest = manifest_dir.as_deref()?.join("Cargo.toml");
            let declared = declared_hyper_version(&manifest)?;
            println!(
                "cargo:warning=No Cargo.lock found; reporting hyper {declared} from the manifest"
            );
            Some(declared)
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TAPEDECK_HYPER_VERSION={version}");
}

/// Highest locked `hyper` 1.x version in `lockfile`
fn locked_hyper_version(lockfile: &Path) -> Option<String> {
    let content = fs::read_to_string(lockfile).ok()?;
    let lock: toml::Value = content.parse().ok()?;

    lock.get("package")?
        .as_array()?
        .iter()
        .filter(|package| package.get("name").and_then(toml::Value::as_str) == Some("hyper"))
        .filter_map(|package| package.get("version").and_then(toml::Value::as_str))
        .filter(|version| version.starts_with("1."))
        .max_by_key(|version| numeric_parts(version))
        .map(str::to_string)
}

/// Base version of the `hyper` requirement in `manifest`
fn declared_hyper_version(manifest: &Path) -> Option<String> {
    let content = fs::read_to_string(manifest).ok()?;
    let manifest: toml::Value = content.parse().ok()?;

    let hyper = manifest.get("dependencies")?.get("hyper")?;
    let requirement = hyper
        .as_str()
        .or_else(|| hyper.get("version").and_then(toml::Value::as_str))?;

    Some(
        requirement
            .trim_start_matches(|c: char| matches!(c, '^' | '=' | '~' | '>' | ' '))
            .to_string(),
    )
}

fn numeric_parts(version: &str) -> Vec<u64> {
    version
        .split(|c| c == '-' || c == '+')
        .next()
        .unwrap_or_default()
        .split('.')
        .map(|piece| piece.parse().unwrap_or(0))
        .collect()
}
