use std::process::Command;

const VERSION_ENV: &str = "OBJECTIVE_BOARD_VERSION";

fn strip_tag_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|ch: char| ch.is_ascii_digit()) => rest,
        _ => trimmed,
    }
}

fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()
        .filter(|output| output.status.success())?;

    let described = String::from_utf8(output.stdout).ok()?;
    let version = strip_tag_prefix(&described);
    (!version.is_empty()).then(|| version.to_string())
}

fn resolve_version() -> String {
    std::env::var(VERSION_ENV)
        .ok()
        .map(|raw| strip_tag_prefix(&raw).to_string())
        .filter(|version| !version.is_empty())
        .or_else(git_describe)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed={VERSION_ENV}");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let version = resolve_version();
    println!("cargo:rustc-env=OBJECTIVE_BOARD_BUILD_VERSION={version}");
    println!("cargo:rustc-env=OBJECTIVE_BOARD_USER_AGENT=objective-board/{version}");
}
