use assert_cmd::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_mesh(contents: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp mesh");
    tmp.write_all(contents.as_bytes()).expect("write mesh");
    tmp
}

#[test]
fn cli_summarizes_mesh_and_frame_trace() {
    let mesh = write_mesh(
        "# quad\nv -2 0 0\nv 2 0 0\nv 2 1 0\nv -2 1 0\nf 1 2 3 4\n",
    );
    let mut cmd = Command::cargo_bin("shadow-viewer").expect("binary exists");
    cmd.arg(mesh.path()).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("with 4 vertices (2 triangles)"))
        .stdout(contains("Normalized by 0.7500; max |coordinate| = 1.5000"))
        .stdout(contains("Packed 96 vertex bytes and 6 indices"))
        .stdout(contains("Frame outcome: Rendered"))
        .stdout(contains(" - draw 6 indices (Shadow)"))
        .stdout(contains(" - draw 6 indices (Color)"))
        .stdout(contains(" - submit"));
}

#[test]
fn cli_defaults_to_builtin_cube() {
    let mut cmd = Command::cargo_bin("shadow-viewer").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded mesh from built-in cube with 8 vertices (12 triangles)"))
        .stdout(contains(" - draw 36 indices (Shadow)"));
}

#[test]
fn cli_reports_malformed_mesh() {
    let mesh = write_mesh("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n");
    let mut cmd = Command::cargo_bin("shadow-viewer").expect("binary exists");
    cmd.arg(mesh.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("malformed mesh on line 4"));
}

#[test]
fn cli_rejects_mesh_without_faces() {
    let mesh = write_mesh("v 0 0 0\nv 1 0 0\nv 0 1 0\n");
    let mut cmd = Command::cargo_bin("shadow-viewer").expect("binary exists");
    cmd.arg(mesh.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("mesh does not define any faces"));
}

#[test]
fn cli_rejects_unknown_flag() {
    let mut cmd = Command::cargo_bin("shadow-viewer").expect("binary exists");
    cmd.arg("--run-scripts");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --run-scripts"));
}
