//! Working-directory switching with a way back.
//!
//! The process working directory is global state. Callers that switch
//! directories from several threads must coordinate themselves.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

/// A directory change that remembers where it came from.
#[derive(Debug, Clone)]
pub struct Chdir {
    last: PathBuf,
}

impl Chdir {
    /// Records the current directory, then changes into `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be read or `to`
    /// cannot be entered. The working directory is unchanged in that case.
    pub fn new(to: impl AsRef<Path>) -> io::Result<Self> {
        let last = env::current_dir()?;
        env::set_current_dir(to.as_ref())?;
        tracing::debug!(from = %last.display(), to = %to.as_ref().display(), "changed directory");
        Ok(Self { last })
    }

    /// Like [`new`](Self::new), but panics on failure.
    pub fn must_chdir(to: impl AsRef<Path>) -> Self {
        let to = to.as_ref();
        match Self::new(to) {
            Ok(chdir) => chdir,
            Err(e) => panic!("chdir {}: {e}", to.display()),
        }
    }

    /// Directory that was current before the change.
    pub fn last(&self) -> &Path {
        &self.last
    }

    /// Returns to the recorded directory.
    pub fn go_back(&self) -> io::Result<()> {
        env::set_current_dir(&self.last)
    }

    /// Like [`go_back`](Self::go_back), but panics on failure.
    pub fn must_go_back(&self) {
        if let Err(e) = self.go_back() {
            panic!("chdir {}: {e}", self.last.display());
        }
    }
}

/// `pushd` / `popd` style directory stack.
#[derive(Debug, Default)]
pub struct DirStack {
    stack: Vec<Chdir>,
}

impl DirStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters `dir` and pushes the previous directory.
    pub fn pushd(&mut self, dir: impl AsRef<Path>) -> io::Result<()> {
        let chdir = Chdir::new(dir)?;
        self.stack.push(chdir);
        Ok(())
    }

    /// Returns to the most recently pushed directory.
    ///
    /// Popping an empty stack does nothing.
    pub fn popd(&mut self) -> io::Result<()> {
        match self.stack.pop() {
            Some(chdir) => chdir.go_back(),
            None => Ok(()),
        }
    }

    /// Like [`pushd`](Self::pushd), but panics on failure.
    pub fn must_pushd(&mut self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        if let Err(e) = self.pushd(dir) {
            panic!("pushd {}: {e}", dir.display());
        }
    }

    /// Like [`popd`](Self::popd), but panics on failure.
    pub fn must_popd(&mut self) {
        if let Err(e) = self.popd() {
            panic!("popd: {e}");
        }
    }

    /// Number of pushed directories.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}
