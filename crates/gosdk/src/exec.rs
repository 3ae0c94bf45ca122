//! Running a chosen toolchain.

use crate::error::SdkError;
use cmdutil::EnvTable;
use once_cell::sync::OnceCell;
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::debug;

/// Returns `env` adjusted so that `go_bin` is the `go` a child process sees.
///
/// The binary's directory is moved to the front of `PATH`. When the binary
/// sits in a full toolchain (`<root>/api/go1.txt` exists) `GOROOT` is set to
/// that root as well.
///
/// # Arguments
/// * `go_bin` - Path to a `go` binary; relative paths resolve against the
///   current directory
/// * `env` - Environment to start from
pub fn go_cmd_env(go_bin: &Path, env: &EnvTable) -> Result<EnvTable, SdkError> {
    let bin = if go_bin.is_absolute() {
        go_bin.to_path_buf()
    } else {
        env::current_dir()?.join(go_bin)
    };

    let mut out = env.clone();
    let Some(bin_dir) = bin.parent() else {
        return Ok(out);
    };
    out.insert("PATH", &bin_dir.to_string_lossy())?;

    if let Some(root) = bin_dir.parent() {
        if root.join("api").join("go1.txt").is_file() {
            out.set("GOROOT", &root.to_string_lossy())?;
        }
    }
    Ok(out)
}

/// Runs `<root>/bin/go` with `args` in the current process environment.
///
/// See [`run_go_with_env`].
pub fn run_go<I, S>(root: &Path, args: I) -> Result<ExitStatus, SdkError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    run_go_with_env(root, args, &EnvTable::new())
}

/// Runs `<root>/bin/go` with `args` and the variables in `env`, inheriting
/// stdio.
///
/// `GOROOT` is set to `root` and `<root>/bin` leads `PATH`; `env` itself is
/// not modified. The first call installs a Ctrl-C handler that does nothing
/// and stays installed for the rest of the process, so an interrupt reaches
/// the child but does not kill this process.
///
/// # Returns
/// The child's exit status. A non-zero status is not an error.
///
/// # Errors
/// Returns an error if the child cannot be started or the signal handler
/// cannot be installed.
pub fn run_go_with_env<I, S>(root: &Path, args: I, env: &EnvTable) -> Result<ExitStatus, SdkError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin_dir = root.join("bin");
    let bin: PathBuf = bin_dir.join(format!("go{}", cmdutil::exe_suffix()));

    let mut env = env.clone();
    env.set("GOROOT", &root.to_string_lossy())?;
    env.insert("PATH", &bin_dir.to_string_lossy())?;

    ignore_interrupts()?;

    let mut cmd = Command::new(&bin);
    cmd.args(args);
    env.apply(&mut cmd);
    debug!("Running {:?}", cmd);

    cmd.status().map_err(|source| SdkError::Spawn {
        command: bin.display().to_string(),
        source,
    })
}

/// Installs a Ctrl-C handler that does nothing. A process can only hold one,
/// so this happens at most once and is never undone.
fn ignore_interrupts() -> Result<(), SdkError> {
    static INSTALLED: OnceCell<()> = OnceCell::new();
    INSTALLED
        .get_or_try_init(|| ctrlc::set_handler(|| debug!("Ignoring interrupt while go runs")))
        .map(|_| ())
        .map_err(SdkError::from)
}
