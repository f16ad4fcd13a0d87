//! Tests for the selfext crate surface

use selfext::{AssetKind, AssetStore, EmbeddedAssets, VersionInfo, VERSION};
use tempfile::TempDir;

#[test]
fn test_version() {
    assert!(VERSION.contains('.'), "VERSION should contain a dot");
    assert_eq!(VersionInfo::current().version, VERSION);
}

#[test]
fn test_embedded_wrapper_project_is_a_go_module() {
    let temp = TempDir::new().unwrap();
    let dir = EmbeddedAssets::new()
        .extract(AssetKind::WrapperProject, temp.path())
        .unwrap();

    let go_mod = std::fs::read_to_string(dir.join("go.mod")).unwrap();
    assert!(go_mod.contains("module selfext/wrapper"));

    let extract = std::fs::read_to_string(dir.join("extract.go")).unwrap();
    assert!(extract.starts_with("package main") || extract.contains("\npackage main"));
    assert!(extract.contains("func unpack("));
}
