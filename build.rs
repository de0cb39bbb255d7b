// build.rs

fn main() {
    // Detect CPU features on the build host and emit custom cfg flags.
    // `cfg(target_feature = ...)` only reflects `-C target-feature`, so the
    // native lanes would never be compiled in for a default build otherwise.
    println!("cargo::rustc-check-cfg=cfg(stridelane_ssse3)");
    println!("cargo::rustc-check-cfg=cfg(stridelane_avx2)");
    println!("cargo:rerun-if-changed=build.rs");

    // Cross builds get the portable lanes.
    let target_arch = std::env::var("CARGO_CFG_TARGET_ARCH").unwrap_or_default();
    let host = std::env::var("HOST").unwrap_or_default();
    let target = std::env::var("TARGET").unwrap_or_default();
    if target_arch != "x86_64" || host != target {
        return;
    }

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("ssse3") {
            println!("cargo:rustc-cfg=stridelane_ssse3");
        }
        if is_x86_feature_detected!("avx2") {
            println!("cargo:rustc-cfg=stridelane_avx2");
        }
    }
}
