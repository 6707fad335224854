#![no_main]

use duosql_core::{parse, ParamValue, Params};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let params = Params::from([
            ("a".to_string(), ParamValue::from("x")),
            ("b".to_string(), ParamValue::Null),
            ("ids".to_string(), ParamValue::from(vec![1i64, 2, 3])),
        ]);

        let _ = parse(sql, &params);
    }
});
