use chrono::Utc;

fn main() {
    // Stamp the binary with its build time / 记录构建时间
    let build_time = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("cargo:rustc-env=QUICKSEARCH_BUILD_TIME={}", build_time);

    println!("cargo:rerun-if-changed=build.rs");
}
