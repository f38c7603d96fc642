#![no_main]

use libfuzzer_sys::fuzz_target;
use weft_expr::parse;

fuzz_target!(|data: &str| {
    let first = parse(data);
    let second = parse(data);
    assert_eq!(first, second);
});
