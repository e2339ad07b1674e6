//! Build script: embeds the git hash and checks GPU toolkits for whisper.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        require_tool("nvcc", "--version", "CUDA toolkit", "https://developer.nvidia.com/cuda-downloads");
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", "--summary", "Vulkan SDK", "https://vulkan.lunarg.com/");
    }
}

/// Fail the build early, before whisper-rs-sys starts compiling.
fn require_tool(tool: &str, arg: &str, toolkit: &str, url: &str) {
    match Command::new(tool).arg(arg).output() {
        Ok(out) if out.status.success() => {
            println!("cargo::warning={} detected", toolkit);
        }
        _ => panic!(
            "\n\n`{}` not found: {} is not installed.\n  Install: {}\n  Or build without it: cargo build --release\n",
            tool, toolkit, url
        ),
    }
}
