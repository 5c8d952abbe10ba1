use std::env;
use std::path::PathBuf;

fn main() {
    let Ok(crate_dir) = env::var("CARGO_MANIFEST_DIR") else {
        return;
    };
    let header = PathBuf::from(&crate_dir).join("include").join("gale.h");

    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=src/types.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    // Regeneration is best effort; the committed header stays usable when
    // cbindgen cannot run.
    match cbindgen::generate(&crate_dir) {
        Ok(bindings) => {
            bindings.write_to_file(header);
        }
        Err(err) => {
            println!("cargo:warning=cbindgen failed: {err}");
        }
    }
}
