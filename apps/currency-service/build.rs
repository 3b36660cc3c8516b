//! Build Script for Currency Service
//!
//! The protobuf stubs are generated with `buf generate` and checked in under
//! `packages/schema-gen/rust/currency/v1/`, so this script only tracks changes
//! and emits the coverage cfg.

use std::env;

fn main() {
    // Rerun build script if it changes
    println!("cargo:rerun-if-changed=build.rs");

    // Rerun if proto definitions or checked-in stubs change
    println!("cargo:rerun-if-changed=../../packages/proto/currency/");
    println!("cargo:rerun-if-changed=../../packages/schema-gen/rust/currency/");

    // Emit cfg for coverage detection
    if env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS")
            .map(|f| f.contains("instrument-coverage"))
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=coverage");
    }
}
