//! Gosdk - Locate installed Go toolchains and run them
//!
//! Finds the `go` on `$PATH` and the toolchains `golang.org/dl` installs under
//! `~/sdk`, orders them by release, and prepares environments for running a
//! particular one.
//!
//! # Example
//!
//! ```no_run
//! use gosdk::Sdk;
//!
//! let sdk = Sdk::builder().build();
//! for install in sdk.installs() {
//!     println!("{} {}", install.version, install.bin.display());
//! }
//! if let Some(go121) = sdk.find("1.21") {
//!     let status = gosdk::run_go(&go121.root, ["version"])?;
//!     println!("exit: {status}");
//! }
//! # Ok::<(), gosdk::SdkError>(())
//! ```

pub mod error;
pub mod exec;
pub mod gowork;
pub mod sdk;
pub mod version;

pub use error::SdkError;
pub use exec::{go_cmd_env, run_go, run_go_with_env};
pub use gowork::{auto_disable_go_work, go_work_covers, parse_use_dirs};
pub use sdk::{
    default, default_or_latest, default_sdk, find, latest, latest_or_default, list, reset_default, set_default,
    GoInstall, Sdk, SdkBuilder,
};
pub use version::GoVersion;
