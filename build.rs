use std::process::Command;

/// Embed the git revision as `GIT_HASH` (reported by `/api/v1/health`).
/// `BANKLY_BUILD_HASH` wins when set, for builds outside a checkout.
fn main() {
    println!("cargo:rerun-if-env-changed=BANKLY_BUILD_HASH");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let hash = std::env::var("BANKLY_BUILD_HASH").ok().or_else(|| {
        Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    });

    println!(
        "cargo:rustc-env=GIT_HASH={}",
        hash.unwrap_or_else(|| "unknown".to_string())
    );
}
