use std::process::Command;

/// Short commit of the checkout, or LIVESESSION_GIT_SHA for builds outside git.
fn describe_commit() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=8"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let sha = String::from_utf8(out.stdout).ok()?;
    let sha = sha.trim();
    (!sha.is_empty()).then(|| sha.to_owned())
}

fn main() {
    let commit = describe_commit()
        .or_else(|| std::env::var("LIVESESSION_GIT_SHA").ok())
        .unwrap_or_else(|| String::from("unknown"));

    println!("cargo:rustc-env=GIT_SHA={commit}");
    for watched in [".git/HEAD", ".git/index"] {
        println!("cargo:rerun-if-changed={watched}");
    }
    println!("cargo:rerun-if-env-changed=LIVESESSION_GIT_SHA");
}
