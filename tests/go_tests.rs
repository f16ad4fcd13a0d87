//! End-to-end tests against an installed Go
//!
//! These use the Go found on `PATH` through `--goroot`-style configuration
//! and skip themselves when there is none.

use selfext::{
    ArchiveFormat, BuildBackend, EmbeddedAssets, GenerationParams, PackConfig, PackOutcome,
    PackOutput, Packer, ScratchWorkspace, TemplateId, TemplateRenderer, ToolchainDriver,
    ToolchainHandle,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// `GOROOT` of the Go on `PATH`, if any
fn installed_goroot() -> Option<PathBuf> {
    let output = Command::new("go").args(["env", "GOROOT"]).output().ok()?;
    let goroot = String::from_utf8(output.stdout).ok()?;
    let goroot = goroot.trim();
    (output.status.success() && !goroot.is_empty()).then(|| PathBuf::from(goroot))
}

macro_rules! require_go {
    () => {
        match installed_goroot() {
            Some(goroot) => goroot,
            None => {
                eprintln!("skipping: no Go toolchain on PATH");
                return;
            }
        }
    };
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

fn write_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn pack_with(goroot: &Path, archive: &Path, scratch: &Path) -> PackOutput {
    let config = PackConfig::new()
        .with_archive(archive.to_string_lossy())
        .with_goroot(goroot)
        .with_scratch_root(scratch);
    let assets = EmbeddedAssets::new();
    let driver = ToolchainDriver::new();

    match Packer::with_backends(config, &assets, &driver).pack().unwrap() {
        PackOutcome::Packed(output) => output,
        PackOutcome::Skipped => panic!("expected an executable"),
    }
}

#[test]
fn test_packed_zip_unpacks_into_default_destination() {
    let goroot = require_go!();
    let temp = TempDir::new().unwrap();
    let scratch = temp.path().join("scratch");
    fs::create_dir_all(&scratch).unwrap();
    // `=` is legal in file names but not in `//go:embed` patterns
    let archive = temp.path().join("v=1.zip");
    write_zip(&archive, &[("a.txt", b"alpha\n"), ("docs/b.txt", b"bravo\n")]);

    let output = pack_with(&goroot, &archive, &scratch);
    assert_eq!(output.executable, temp.path().join("v=1.zip.exe"));

    let status = Command::new(&output.executable)
        .current_dir(temp.path())
        .status()
        .unwrap();
    assert!(status.success());

    let dest = temp.path().join("v=1");
    assert_eq!(fs::read(dest.join("a.txt")).unwrap(), b"alpha\n");
    assert_eq!(fs::read(dest.join("docs/b.txt")).unwrap(), b"bravo\n");
    assert!(fs::read_dir(&scratch).unwrap().next().is_none());
}

#[test]
fn test_packed_tarball_unpacks_into_chosen_destination() {
    let goroot = require_go!();
    let temp = TempDir::new().unwrap();
    // Glob characters in the name
    let archive = temp.path().join("photos[1].tgz");
    write_tar_gz(&archive, &[("img/1.jpg", b"\xff\xd8jpeg"), ("index.txt", b"1.jpg\n")]);

    let output = pack_with(&goroot, &archive, temp.path());

    let dest = temp.path().join("restore");
    let run = Command::new(&output.executable)
        .arg("-d")
        .arg(&dest)
        .output()
        .unwrap();
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));
    assert!(String::from_utf8_lossy(&run.stdout).contains("photos[1].tgz"));

    assert_eq!(fs::read(dest.join("img/1.jpg")).unwrap(), b"\xff\xd8jpeg");
    assert_eq!(fs::read(dest.join("index.txt")).unwrap(), b"1.jpg\n");
}

/// Runs the wrapper project's own Go tests against a generated `wrapper.go`
#[test]
fn test_wrapper_project_go_tests() {
    let goroot = require_go!();
    let toolchain = ToolchainHandle::from_goroot(&goroot).unwrap();
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("data.zip");
    write_zip(&archive, &[("a.txt", b"alpha")]);

    let workspace = ScratchWorkspace::create(Some(temp.path()), &EmbeddedAssets::new()).unwrap();
    let params = GenerationParams::for_archive("data.zip", ArchiveFormat::Zip);
    workspace
        .stage_archive(&archive, &params.embed_directive.to_string_lossy())
        .unwrap();
    let generator = TemplateId::Generator.file_name();
    fs::write(
        workspace.wrapper_dir().join(generator),
        TemplateRenderer::new()
            .render(TemplateId::Generator, &params)
            .unwrap(),
    )
    .unwrap();
    ToolchainDriver::new()
        .run_generator(&toolchain, workspace.wrapper_dir(), Path::new(generator), "data.zip")
        .unwrap();

    let output = Command::new(toolchain.compiler_path())
        .current_dir(workspace.wrapper_dir())
        .env("GOROOT", toolchain.root_dir())
        .env("GOTOOLCHAIN", "local")
        .env("GOPROXY", "off")
        .args(["test", "."])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "go test failed:\n{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
