//! Generates the C header for the exported functions and the function tables the host
//! fills in, and drops it where the host build expects it.

use std::env;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("SHIM_FFI_H")
        .with_parse_deps(true)
        .with_parse_include(&["shim-loader", "shim-bridge"])
        .generate()
        .expect("Unable to generate bindings")
        .write_to_file("includes/ShimFfi.h");
}
