use cmdutil::{Chdir, DirStack};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::TempDir;

// The working directory is process-wide; tests touching it run one at a time.
static CWD_LOCK: Mutex<()> = Mutex::new(());

fn lock_cwd() -> MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn cwd() -> PathBuf {
    env::current_dir().unwrap().canonicalize().unwrap()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap()
}

#[test]
fn test_dir_stack_push_pop() {
    let _guard = lock_cwd();
    let start = cwd();
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("gosdk");
    let second = temp_dir.path().join("example");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();

    let mut stack = DirStack::new();
    stack.must_pushd(&first);
    assert_eq!(cwd(), canonical(&first));

    stack.must_pushd("../example");
    assert_eq!(cwd(), canonical(&second));
    assert_eq!(stack.depth(), 2);

    stack.must_popd();
    assert_eq!(cwd(), canonical(&first));
    stack.must_popd();
    assert_eq!(cwd(), start);

    // Popping past the bottom is not an error
    stack.must_popd();
    assert!(stack.popd().is_ok());
    assert_eq!(stack.depth(), 0);
    assert_eq!(cwd(), start);
}

#[test]
fn test_pushd_missing_dir_keeps_stack() {
    let _guard = lock_cwd();
    let start = cwd();
    let temp_dir = TempDir::new().unwrap();

    let mut stack = DirStack::new();
    assert!(stack.pushd(temp_dir.path().join("not_found")).is_err());
    assert_eq!(stack.depth(), 0);
    assert_eq!(cwd(), start);
}

#[test]
fn test_chdir_go_back() {
    let _guard = lock_cwd();
    let start = cwd();
    let temp_dir = TempDir::new().unwrap();

    let chdir = Chdir::must_chdir(temp_dir.path());
    assert_eq!(cwd(), canonical(temp_dir.path()));
    assert_eq!(canonical(chdir.last()), start);

    chdir.must_go_back();
    assert_eq!(cwd(), start);
}

#[test]
fn test_must_chdir_panics_on_missing_dir() {
    let _guard = lock_cwd();
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("not_found");

    let result = std::panic::catch_unwind(|| Chdir::must_chdir(&missing));
    assert!(result.is_err());
}
