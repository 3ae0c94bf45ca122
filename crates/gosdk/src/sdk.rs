//! Discovery of installed Go toolchains.
//!
//! Toolchains are found in two places: the `go` on `$PATH`, and `go1.*`
//! directories under `~/sdk` (where `golang.org/dl` installs them) or any
//! extra directory configured on the [`SdkBuilder`].

use crate::version::GoVersion;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, trace};

/// One installed toolchain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoInstall {
    /// The `go` binary
    pub bin: PathBuf,
    /// Toolchain root (GOROOT)
    pub root: PathBuf,
    /// Release name, e.g. `go1.22.5`
    pub version: GoVersion,
}

/// Configures where an [`Sdk`] looks for toolchains.
#[derive(Debug, Clone)]
pub struct SdkBuilder {
    extra_dirs: Vec<PathBuf>,
    home_dir: Option<PathBuf>,
    scan_home: bool,
    use_path: bool,
    search_path: Option<OsString>,
}

impl Default for SdkBuilder {
    fn default() -> Self {
        Self {
            extra_dirs: Vec::new(),
            home_dir: None,
            scan_home: true,
            use_path: true,
            search_path: None,
        }
    }
}

impl SdkBuilder {
    /// Also scan `dir` for `go1.*` toolchain directories.
    pub fn extra_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extra_dirs.push(dir.into());
        self
    }

    /// Use `dir` instead of the user's home directory when looking for `sdk/`.
    pub fn home_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.home_dir = Some(dir.into());
        self
    }

    /// Whether to scan `<home>/sdk` at all.
    pub fn scan_home(mut self, scan: bool) -> Self {
        self.scan_home = scan;
        self
    }

    /// Whether the `go` found on the search path counts as the default.
    pub fn use_path(mut self, use_path: bool) -> Self {
        self.use_path = use_path;
        self
    }

    /// Search this list instead of `$PATH` for the default `go`.
    pub fn search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    /// Finishes configuration. Nothing is scanned until the handle is first queried.
    pub fn build(self) -> Sdk {
        Sdk {
            config: self,
            discovered: OnceCell::new(),
            inspected: Mutex::new(HashMap::new()),
        }
    }
}

#[derive(Debug)]
struct Discovery {
    installs: Vec<GoInstall>,
    default: Option<GoInstall>,
}

/// A set of discovered Go toolchains.
///
/// Discovery happens on first use and is remembered for the lifetime of the
/// handle. Build a new handle to rescan.
#[derive(Debug)]
pub struct Sdk {
    config: SdkBuilder,
    discovered: OnceCell<Discovery>,
    inspected: Mutex<HashMap<PathBuf, Option<GoInstall>>>,
}

impl Sdk {
    /// Starts configuring a handle with the `~/sdk` root and `$PATH` defaults.
    pub fn builder() -> SdkBuilder {
        SdkBuilder::default()
    }

    /// All toolchains, highest version first.
    pub fn installs(&self) -> &[GoInstall] {
        &self.discovery().installs
    }

    /// Binaries of all toolchains, highest version first.
    pub fn list(&self) -> Vec<PathBuf> {
        self.installs().iter().map(|i| i.bin.clone()).collect()
    }

    /// The highest toolchain whose release is `version` or lies within it.
    ///
    /// `version` may be written with or without the `go` prefix; see
    /// [`GoVersion::matches`].
    pub fn find(&self, version: &str) -> Option<&GoInstall> {
        self.installs().iter().find(|i| i.version.matches(version))
    }

    /// The `go` found on the search path.
    pub fn default(&self) -> Option<&GoInstall> {
        self.discovery().default.as_ref()
    }

    /// The highest installed toolchain.
    pub fn latest(&self) -> Option<&GoInstall> {
        self.installs().first()
    }

    /// The default `go`, else the latest, else the bare name `go`.
    pub fn default_or_latest(&self) -> PathBuf {
        self.default()
            .or_else(|| self.latest())
            .map_or_else(|| PathBuf::from("go"), |i| i.bin.clone())
    }

    /// The latest toolchain, else the default, else the bare name `go`.
    pub fn latest_or_default(&self) -> PathBuf {
        self.latest()
            .or_else(|| self.default())
            .map_or_else(|| PathBuf::from("go"), |i| i.bin.clone())
    }

    fn discovery(&self) -> &Discovery {
        self.discovered.get_or_init(|| self.discover())
    }

    fn discover(&self) -> Discovery {
        let mut seen = HashSet::new();
        let mut installs = Vec::new();

        let default = if self.config.use_path {
            self.path_go().and_then(|bin| self.inspect(&bin))
        } else {
            None
        };
        if let Some(install) = &default {
            seen.insert(install.bin.clone());
            installs.push(install.clone());
        }

        for dir in self.sdk_dirs() {
            for candidate in toolchain_dirs(&dir) {
                let bin = candidate.join("bin").join(format!("go{}", cmdutil::exe_suffix()));
                let Ok(bin) = which::which(&bin) else {
                    trace!("No executable at {}", bin.display());
                    continue;
                };
                if !seen.insert(bin.clone()) {
                    continue;
                }
                if let Some(install) = self.inspect(&bin) {
                    installs.push(install);
                }
            }
        }

        // Stable, so equal versions keep discovery order with the default first
        installs.sort_by(|a, b| b.version.cmp(&a.version));
        debug!("Discovered {} Go toolchain(s)", installs.len());

        Discovery { installs, default }
    }

    fn path_go(&self) -> Option<PathBuf> {
        let found = match &self.config.search_path {
            Some(paths) => {
                let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in("go", Some(paths), cwd)
            }
            None => which::which("go"),
        };
        match found {
            Ok(bin) => Some(bin),
            Err(e) => {
                debug!("No go on search path: {}", e);
                None
            }
        }
    }

    fn sdk_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if self.config.scan_home {
            if let Some(home) = self.config.home_dir.clone().or_else(home::home_dir) {
                dirs.push(home.join("sdk"));
            }
        }
        dirs.extend(self.config.extra_dirs.iter().cloned());
        dirs
    }

    fn inspect(&self, bin: &Path) -> Option<GoInstall> {
        if let Some(cached) = self.inspected.lock().get(bin) {
            return cached.clone();
        }
        let found = inspect_install(bin);
        self.inspected.lock().insert(bin.to_path_buf(), found.clone());
        found
    }
}

/// `go1.*` subdirectories of `dir`, sorted by name.
fn toolchain_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("go1."))
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn inspect_install(bin: &Path) -> Option<GoInstall> {
    // Follow links so /usr/bin/go resolves to its real toolchain root
    let real = fs::canonicalize(bin).unwrap_or_else(|_| bin.to_path_buf());
    let root = real.parent()?.parent()?.to_path_buf();

    let version = version_file(&root).or_else(|| go_env_version(bin));
    match version {
        Some(version) => {
            debug!("Found {} at {}", version, bin.display());
            Some(GoInstall {
                bin: bin.to_path_buf(),
                root,
                version,
            })
        }
        None => {
            debug!("Ignoring {}: no Go version", bin.display());
            None
        }
    }
}

fn version_file(root: &Path) -> Option<GoVersion> {
    let text = fs::read_to_string(root.join("VERSION")).ok()?;
    GoVersion::parse(text.lines().next()?)
}

fn go_env_version(bin: &Path) -> Option<GoVersion> {
    let output = Command::new(bin)
        .args(["env", "GOVERSION"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    GoVersion::parse(&String::from_utf8_lossy(&output.stdout))
}

static DEFAULT_SDK: Lazy<RwLock<Arc<Sdk>>> = Lazy::new(|| RwLock::new(Arc::new(Sdk::builder().build())));

/// The process-wide handle used by the free functions of this crate.
pub fn default_sdk() -> Arc<Sdk> {
    Arc::clone(&DEFAULT_SDK.read())
}

/// Replaces the process-wide handle, e.g. with one built from custom dirs.
pub fn set_default(sdk: Sdk) {
    *DEFAULT_SDK.write() = Arc::new(sdk);
}

/// Drops the process-wide handle so the next use rescans.
pub fn reset_default() {
    set_default(Sdk::builder().build());
}

/// [`Sdk::list`] on the process-wide handle.
pub fn list() -> Vec<PathBuf> {
    default_sdk().list()
}

/// [`Sdk::find`] on the process-wide handle, returning the binary.
pub fn find(version: &str) -> Option<PathBuf> {
    default_sdk().find(version).map(|i| i.bin.clone())
}

/// [`Sdk::default`] on the process-wide handle, returning the binary.
pub fn default() -> Option<PathBuf> {
    default_sdk().default().map(|i| i.bin.clone())
}

/// [`Sdk::latest`] on the process-wide handle, returning the binary.
pub fn latest() -> Option<PathBuf> {
    default_sdk().latest().map(|i| i.bin.clone())
}

/// [`Sdk::default_or_latest`] on the process-wide handle.
pub fn default_or_latest() -> PathBuf {
    default_sdk().default_or_latest()
}

/// [`Sdk::latest_or_default`] on the process-wide handle.
pub fn latest_or_default() -> PathBuf {
    default_sdk().latest_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_sdk_falls_back_to_bare_go() {
        let temp_dir = TempDir::new().unwrap();
        let sdk = Sdk::builder().use_path(false).home_dir(temp_dir.path()).build();

        assert!(sdk.list().is_empty());
        assert!(sdk.default().is_none());
        assert!(sdk.latest().is_none());
        assert!(sdk.find("1.21").is_none());
        assert_eq!(sdk.default_or_latest(), PathBuf::from("go"));
        assert_eq!(sdk.latest_or_default(), PathBuf::from("go"));
    }

    #[test]
    fn test_toolchain_dirs_filters_names() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["go1.21.5", "go1.20", "gotip", "other"] {
            fs::create_dir(temp_dir.path().join(name)).unwrap();
        }
        fs::write(temp_dir.path().join("go1.19.tar.gz"), b"").unwrap();

        let names: Vec<_> = toolchain_dirs(temp_dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["go1.20", "go1.21.5"]);
        assert!(toolchain_dirs(&temp_dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_version_file_reads_first_line() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("VERSION"), "go1.22.3\ntime 2024-05-01T19:59:50Z\n").unwrap();
        assert_eq!(version_file(temp_dir.path()).unwrap().as_str(), "go1.22.3");

        fs::write(temp_dir.path().join("VERSION"), "devel +abc\n").unwrap();
        assert!(version_file(temp_dir.path()).is_none());
    }
}
