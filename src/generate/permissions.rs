//! Generated file permissions
//!
//! Generated files take the permission bits of their template. Unless
//! generated files are meant to be writable, every write bit is then dropped.

use std::fs;
use std::io;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Bits kept on a read-only generated file
#[cfg(unix)]
pub const READ_ONLY_MASK: u32 = 0o555;

/// Make an existing output file writable by its owner so it can be replaced.
#[cfg(unix)]
pub fn ensure_writable(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
pub fn ensure_writable(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
}

/// Copy the template's permission bits onto the output.
#[cfg(unix)]
pub fn copy_template_permissions(template: &Path, output: &Path, writable: bool) -> io::Result<()> {
    let mode = fs::metadata(template)?.permissions().mode() & 0o7777;
    let mode = if writable { mode } else { mode & READ_ONLY_MASK };
    fs::set_permissions(output, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub fn copy_template_permissions(template: &Path, output: &Path, writable: bool) -> io::Result<()> {
    let mut permissions = fs::metadata(template)?.permissions();
    if !writable {
        permissions.set_readonly(true);
    }
    fs::set_permissions(output, permissions)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mode(path: &Path) -> u32 {
        fs::metadata(path).unwrap().permissions().mode() & 0o7777
    }

    #[test]
    fn test_read_only_output() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("run.sh.template");
        let output = dir.path().join("run.sh");
        fs::write(&template, "x").unwrap();
        fs::write(&output, "x").unwrap();
        fs::set_permissions(&template, fs::Permissions::from_mode(0o754)).unwrap();

        copy_template_permissions(&template, &output, false).unwrap();
        assert_eq!(mode(&output), 0o554);
    }

    #[test]
    fn test_writable_output_keeps_mode() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("a.template");
        let output = dir.path().join("a");
        fs::write(&template, "x").unwrap();
        fs::write(&output, "x").unwrap();
        fs::set_permissions(&template, fs::Permissions::from_mode(0o640)).unwrap();

        copy_template_permissions(&template, &output, true).unwrap();
        assert_eq!(mode(&output), 0o640);
    }

    #[test]
    fn test_ensure_writable() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("a");
        fs::write(&output, "x").unwrap();
        fs::set_permissions(&output, fs::Permissions::from_mode(0o444)).unwrap();

        ensure_writable(&output).unwrap();
        assert_eq!(mode(&output), 0o600);

        ensure_writable(&dir.path().join("missing")).unwrap();
    }
}
