use std::env;

fn main() {
    // Version string shown by both binaries' --version and startup banner
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());
    println!("cargo:rustc-env=AOI_SLICE_VERSION={version}");

    println!("cargo:rerun-if-changed=src/");
    println!("cargo:rerun-if-changed=Cargo.toml");
}
