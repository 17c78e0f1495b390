#![no_main]
use libfuzzer_sys::fuzz_target;
use maskid_rs::Scatter;

fuzz_target!(|data: &[u8]| {
    let scatter = Scatter::new(141_819);
    let _ = scatter.reveal(&String::from_utf8_lossy(data));
});
