//! Generates the C header for the `extern "C"` surface.
//!
//! The header is written to `OUT_DIR`. Set `NETQUEUE_HEADER` to a file path
//! to also export it there, e.g. `NETQUEUE_HEADER=include/netqueue.h`.

use std::env;
use std::path::PathBuf;

const HEADER_ENV: &str = "NETQUEUE_HEADER";

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-env-changed={HEADER_ENV}");

    let crate_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()));
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| ".".into()));
    let config = cbindgen::Config {
        language: cbindgen::Language::C,
        include_guard: Some("NETQUEUE_H".to_string()),
        cpp_compat: true,
        ..Default::default()
    };

    let bindings = match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => bindings,
        Err(e) => {
            println!("cargo:warning=cbindgen failed: {e}");
            return;
        }
    };

    bindings.write_to_file(out_dir.join("netqueue.h"));
    if let Some(target) = env::var_os(HEADER_ENV) {
        let target = crate_dir.join(target);
        bindings.write_to_file(&target);
        println!("cargo:warning=wrote C header to {}", target.display());
    }
}
