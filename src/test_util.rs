use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    process::Command,
};

/// Write an executable shell script standing in for an external tool
///
/// The script is copied into place by a child process. Children forked
/// by concurrently running tests then never hold a write handle to the
/// executable, which would make running it fail with `ETXTBSY`.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let staged = dir.join(format!(".{name}.in"));
    fs::write(&staged, format!("#!/bin/sh\n{body}\n")).unwrap();
    let path = dir.join(name);
    let status = Command::new("cp").arg(&staged).arg(&path).status().unwrap();
    assert!(status.success());
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn script() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "tool", "echo \"ran $1\"");
    let output = Command::new(&script).arg("job").output().unwrap();
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ran job\n");
}
