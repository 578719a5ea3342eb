//! Common utilities for integration tests.
//!
//! Integration tests drive the demo binaries over stdin/stdout. The demos
//! live in `demos/` and are built as cargo examples.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Result, ensure};

/// Build the demo binaries unless all of them already exist.
pub fn ensure_demos_built() -> Result<()> {
    let binaries_dir = get_binaries_dir();
    let demos = get_demo_names()?;

    if !demos.iter().all(|name| binaries_dir.join(name).exists()) {
        eprintln!("Demo binaries not found, building...");

        let status = Command::new("cargo")
            .args(["build", "--examples"])
            .status()?;

        ensure!(
            status.success(),
            "cargo build --examples failed with status: {}",
            status
        );
    }

    Ok(())
}

/// Path to a demo binary, building the demos first if needed.
pub fn get_demo_path(name: &str) -> Result<PathBuf> {
    ensure_demos_built()?;

    let binary_path = get_binaries_dir().join(name);
    ensure!(
        binary_path.exists(),
        "Demo binary '{}' not found at: {}",
        name,
        binary_path.display()
    );

    Ok(binary_path)
}

fn manifest_dir() -> PathBuf {
    PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()))
}

/// `target/<profile>/examples`, where cargo puts example binaries.
fn get_binaries_dir() -> PathBuf {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    let target_dir = std::env::var("CARGO_TARGET_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| manifest_dir().join("target"));
    target_dir.join(profile).join("examples")
}

/// Names of the `.rs` files in `demos/`.
fn get_demo_names() -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in fs::read_dir(manifest_dir().join("demos"))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "rs") {
            if let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(name.to_string());
            }
        }
    }

    ensure!(!names.is_empty(), "No demo files found in demos/");
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binaries_dir_is_under_examples() {
        assert!(get_binaries_dir().ends_with("examples"));
    }

    #[test]
    fn math_server_is_a_demo() {
        assert!(get_demo_names().unwrap().contains(&"math_server".to_string()));
    }
}
