//! `go.work` awareness.
//!
//! A workspace file higher up the tree changes how `go` resolves modules even
//! for projects it does not list. [`auto_disable_go_work`] switches it off for
//! such projects.

use crate::error::SdkError;
use crate::sdk::Sdk;
use cmdutil::EnvTable;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, PartialEq)]
enum Token {
    Word(String),
    Open,
    Close,
    Newline,
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => tokens.push(Token::Newline),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '/' if chars.peek() == Some(&'/') => {
                // Comment runs to end of line
                for c in chars.by_ref() {
                    if c == '\n' {
                        tokens.push(Token::Newline);
                        break;
                    }
                }
            }
            '"' => {
                let mut word = String::new();
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        _ => word.push(c),
                    }
                }
                tokens.push(Token::Word(word));
            }
            '`' => {
                let word: String = chars.by_ref().take_while(|&c| c != '`').collect();
                tokens.push(Token::Word(word));
            }
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_whitespace() || next == '(' || next == ')' || next == '"' {
                        break;
                    }
                    let mut ahead = chars.clone();
                    ahead.next();
                    if next == '/' && ahead.peek() == Some(&'/') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    tokens
}

/// Extracts the directories named by `use` directives in a `go.work` file.
///
/// Both the single-line form and the parenthesized block form are read, with
/// `//` comments and quoted paths. Other directives are skipped.
///
/// ```
/// let dirs = gosdk::parse_use_dirs("go 1.22\n\nuse (\n\t./api // public\n\t\"./cmd tool\"\n)\nuse ./lib\n");
/// assert_eq!(dirs, ["./api", "./cmd tool", "./lib"]);
/// ```
pub fn parse_use_dirs(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut dirs = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let Token::Word(verb) = &tokens[i] else {
            i += 1;
            continue;
        };
        let is_use = verb == "use";
        i += 1;

        if tokens.get(i) == Some(&Token::Open) {
            i += 1;
            while i < tokens.len() && tokens[i] != Token::Close {
                if let (true, Token::Word(dir)) = (is_use, &tokens[i]) {
                    dirs.push(dir.clone());
                }
                i += 1;
            }
            i += 1;
            continue;
        }

        if is_use {
            if let Some(Token::Word(dir)) = tokens.get(i) {
                dirs.push(dir.clone());
            }
        }
        // Skip the rest of the directive line
        while i < tokens.len() && tokens[i] != Token::Newline {
            i += 1;
        }
    }
    dirs
}

/// Whether the workspace file at `go_work` lists a module containing `cwd`.
///
/// Containment is by whole path components, so `/src/app` does not cover
/// `/src/application`.
pub fn go_work_covers(go_work: &Path, cwd: &Path) -> Result<bool, SdkError> {
    let text = fs::read_to_string(go_work).map_err(|source| SdkError::ReadGoWork {
        path: go_work.to_path_buf(),
        source,
    })?;
    let base = go_work.parent().unwrap_or_else(|| Path::new("."));
    let cwd = resolve(cwd);

    Ok(parse_use_dirs(&text)
        .iter()
        .map(|dir| resolve(&base.join(dir)))
        .any(|dir| cwd.starts_with(dir)))
}

/// Sets `GOWORK=off` in `env` when the active `go.work` does not cover `cwd`.
///
/// The active workspace file is the one `go env GOWORK` reports for `cwd`,
/// using the SDK's default toolchain and the variables in `env`.
///
/// # Returns
/// `true` if `GOWORK=off` was set.
///
/// # Errors
/// Returns an error if `go` cannot be run or the workspace file cannot be read.
pub fn auto_disable_go_work(sdk: &Sdk, cwd: &Path, env: &mut EnvTable) -> Result<bool, SdkError> {
    let go = sdk.default_or_latest();
    let mut cmd = Command::new(&go);
    cmd.args(["env", "GOWORK"]).current_dir(cwd).stdin(Stdio::null());
    env.apply(&mut cmd);

    let command = format!("{} env GOWORK", go.display());
    let output = cmd.output().map_err(|source| SdkError::Spawn {
        command: command.clone(),
        source,
    })?;
    if !output.status.success() {
        return Err(SdkError::CommandFailed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let go_work = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if go_work.is_empty() || go_work == "off" {
        return Ok(false);
    }
    if go_work_covers(Path::new(&go_work), cwd)? {
        debug!("{} is covered by {}", cwd.display(), go_work);
        return Ok(false);
    }

    debug!("{} is outside {}, setting GOWORK=off", cwd.display(), go_work);
    env.set("GOWORK", "off")?;
    Ok(true)
}

/// Real path if it exists, else the lexically cleaned path.
fn resolve(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| clean(path))
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_single_line_and_block() {
        let text = r#"
go 1.21

toolchain go1.21.5

use ./a

use (
    ./b
    // ./commented
    "./with space" // trailing
    `./raw`
)

replace example.com/x => ./x
"#;
        assert_eq!(parse_use_dirs(text), ["./a", "./b", "./with space", "./raw"]);
    }

    #[test]
    fn test_parse_skips_other_blocks() {
        let text = "replace (\n\tfoo => ./foo\n)\nuse(./inline)\n";
        assert_eq!(parse_use_dirs(text), ["./inline"]);
    }

    #[test]
    fn test_parse_empty_and_comment_only() {
        assert!(parse_use_dirs("").is_empty());
        assert!(parse_use_dirs("// use ./nope\ngo 1.22\n").is_empty());
        assert_eq!(parse_use_dirs("use ./x// note"), ["./x"]);
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(Path::new("/w/./a/../b")), PathBuf::from("/w/b"));
        assert_eq!(clean(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_go_work_covers_by_component() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["app", "application", "app/sub"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        let go_work = root.join("go.work");
        fs::write(&go_work, "go 1.22\n\nuse ./app\n").unwrap();

        assert!(go_work_covers(&go_work, &root.join("app")).unwrap());
        assert!(go_work_covers(&go_work, &root.join("app/sub")).unwrap());
        assert!(!go_work_covers(&go_work, &root.join("application")).unwrap());
        assert!(!go_work_covers(&go_work, root).unwrap());
    }

    #[test]
    fn test_go_work_covers_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = go_work_covers(&temp_dir.path().join("go.work"), temp_dir.path());
        assert!(matches!(result, Err(SdkError::ReadGoWork { .. })));
    }
}
