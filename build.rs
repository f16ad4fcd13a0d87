//! Build script for selfext.
//!
//! Prepares the two payloads embedded with `include_bytes!`:
//!
//! - the wrapper project (`assets/wrapper/`), packed into a tar.gz here;
//! - the Go toolchain distribution named by `SELFEXT_TOOLCHAIN_ARCHIVE`
//!   (for example `go1.22.5.linux-amd64.tar.gz` from go.dev/dl). Without it
//!   an empty placeholder is embedded and the toolchain must be supplied at
//!   run time through the same variable.
//!
//! It also records the git commit and date for `selfext --version`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

fn pack_wrapper_project(src: &Path, dest: &Path) {
    let file = fs::File::create(dest).expect("Failed to create wrapper archive");
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::best());
    let mut builder = tar::Builder::new(encoder);

    let mut entries: Vec<_> = WalkDir::new(src)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();
    // Stable order keeps the embedded archive reproducible
    entries.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in entries {
        let relative = entry.path().strip_prefix(src).expect("walkdir yields children");
        let data = fs::read(entry.path()).expect("Failed to read wrapper asset");

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder
            .append_data(&mut header, relative, data.as_slice())
            .expect("Failed to append wrapper asset");
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("Failed to finish wrapper archive");
}

fn stage_toolchain(out_dir: &Path) -> (PathBuf, String) {
    match env::var("SELFEXT_TOOLCHAIN_ARCHIVE") {
        Ok(source) if !source.is_empty() => {
            let source = PathBuf::from(source);
            let file_name = source
                .file_name()
                .and_then(|n| n.to_str())
                .expect("SELFEXT_TOOLCHAIN_ARCHIVE must name a file")
                .to_string();
            let dest = out_dir.join(&file_name);
            fs::copy(&source, &dest).unwrap_or_else(|e| {
                panic!("Failed to copy toolchain {}: {}", source.display(), e)
            });
            println!("cargo:rerun-if-changed={}", source.display());
            (dest, file_name)
        }
        _ => {
            println!(
                "cargo:warning=SELFEXT_TOOLCHAIN_ARCHIVE not set, embedding no Go toolchain"
            );
            let dest = out_dir.join("toolchain-placeholder.tar.gz");
            fs::write(&dest, b"").expect("Failed to write toolchain placeholder");
            (dest, String::new())
        }
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn main() {
    println!("cargo:rerun-if-changed=assets/wrapper");
    println!("cargo:rerun-if-changed=templates");
    println!("cargo:rerun-if-env-changed=SELFEXT_TOOLCHAIN_ARCHIVE");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    let wrapper_archive = out_dir.join("wrapper.tar.gz");
    pack_wrapper_project(&manifest_dir.join("assets").join("wrapper"), &wrapper_archive);
    println!(
        "cargo:rustc-env=SELFEXT_WRAPPER_PATH={}",
        wrapper_archive.display()
    );

    let (toolchain_path, toolchain_file) = stage_toolchain(&out_dir);
    println!(
        "cargo:rustc-env=SELFEXT_TOOLCHAIN_PATH={}",
        toolchain_path.display()
    );
    println!("cargo:rustc-env=SELFEXT_TOOLCHAIN_FILE={}", toolchain_file);

    let commit = git(&["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| "unknown".to_string());
    let date = git(&["log", "-1", "--format=%cs"]).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=SELFEXT_GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=SELFEXT_BUILD_DATE={}", date);
    println!(
        "cargo:rustc-env=SELFEXT_BUILD_TARGET={}",
        env::var("TARGET").unwrap_or_default()
    );
}
