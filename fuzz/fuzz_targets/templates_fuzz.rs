//! Template fuzz target: parse arbitrary text and render its templates.
//! Rendering must terminate with Ok or an error, never panic or run away.
//! Build with: cargo fuzz run templates_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(thrift) = thriftidl::parse(s) {
        let files: thriftidl::FileMap = std::iter::once((std::path::PathBuf::from("/fuzz.thrift"), thrift)).collect();
        let _ = thriftidl::render_templates(files);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run templates_fuzz");
}
