use std::env;
use std::path::PathBuf;

fn main() {
    // Rerun the build script if the library location changes.
    println!("cargo:rerun-if-env-changed=DF_LIB_PATH");
    println!("cargo:rerun-if-env-changed=DF_STATIC");

    if env::var("DOCS_RS").is_ok() {
        return;
    }

    let Some(lib_path) = env::var_os("DF_LIB_PATH").map(PathBuf::from) else {
        println!(
            "cargo:warning=DF_LIB_PATH is not set; libdf will not be linked and binaries using the DeepFilterNet backend will fail to link"
        );
        return;
    };

    println!("cargo:rustc-link-search=native={}", lib_path.display());

    if env::var_os("DF_STATIC").is_some() {
        println!("cargo:rustc-link-lib=static=df");
        add_platform_specific_libs();
    } else {
        println!("cargo:rustc-link-lib=dylib=df");
    }
}

/// System libraries the Rust runtime inside a static libdf depends on.
fn add_platform_specific_libs() {
    if cfg!(target_os = "macos") {
        println!("cargo:rustc-link-lib=framework=CoreFoundation");
        println!("cargo:rustc-link-lib=framework=Security");
    } else if cfg!(target_os = "windows") {
        println!("cargo:rustc-link-lib=advapi32");
        println!("cargo:rustc-link-lib=bcrypt");
        println!("cargo:rustc-link-lib=kernel32");
        println!("cargo:rustc-link-lib=ws2_32");
        println!("cargo:rustc-link-lib=ntdll");
    } else if cfg!(target_os = "linux") {
        println!("cargo:rustc-link-lib=pthread");
        println!("cargo:rustc-link-lib=dl");
        println!("cargo:rustc-link-lib=m");
    }
}
