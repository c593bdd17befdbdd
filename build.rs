//! Embeds `WEBP_BATCH_VERSION`: the crate version when HEAD sits on a release
//! tag, `dev@<short-hash>` otherwise.

use std::process::{Command, Output};

fn git(args: &[&str]) -> Option<Output> {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let label = if git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some() {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_default()
    } else {
        let hash = git(&["rev-parse", "--short", "HEAD"])
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default();
        if hash.is_empty() {
            "dev@unknown".to_string()
        } else {
            format!("dev@{hash}")
        }
    };

    println!("cargo:rustc-env=WEBP_BATCH_VERSION={label}");
}
