#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use tiff_ifd::decoder::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut decoder = match Decoder::new(Cursor::new(data)) {
        Ok(d) => d,
        Err(_) => return,
    };

    loop {
        match decoder.read_next_directory() {
            Ok(Some(_)) => continue,
            _ => break,
        }
    }
});
