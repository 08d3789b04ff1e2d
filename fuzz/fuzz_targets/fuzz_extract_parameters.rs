#![no_main]

use libfuzzer_sys::fuzz_target;
use pdfcrack_security::{extract_encryption_parameters, StandardSecurityHandler};

/// Keep the harness itself bounded; real encryption dictionaries are tiny.
const MAX_INPUT_BYTES: usize = 1 << 20;

fuzz_target!(|data: &[u8]| {
    if data.len() > MAX_INPUT_BYTES {
        return;
    }

    // Force the header so inputs reach the dictionary lexer.
    let mut pdf = b"%PDF-1.7\n".to_vec();
    pdf.extend_from_slice(data);

    for input in [data, pdf.as_slice()] {
        let Ok(params) = extract_encryption_parameters(input) else {
            continue;
        };
        let _ = params.summary();
        if let Ok(handler) = StandardSecurityHandler::new(&params) {
            let _ = handler.verify_password(b"");
            let _ = handler.verify_password(b"user");
        }
    }
});
