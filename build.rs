// CLASSIFICATION: COMMUNITY
// Filename: build.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-16

fn main() {
    use std::{env, fs, path::PathBuf};

    println!("cargo:rerun-if-env-changed=RSRREPAIR_CDHASH");

    let out = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let body = match env::var("RSRREPAIR_CDHASH") {
        Ok(text) => {
            let text = text.trim().trim_start_matches("0x");
            let bytes = hex::decode(text)
                .unwrap_or_else(|e| panic!("RSRREPAIR_CDHASH is not valid hex: {e}"));
            if bytes.len() != 20 {
                panic!(
                    "RSRREPAIR_CDHASH must be 20 bytes (40 hex digits), got {}",
                    bytes.len()
                );
            }
            let list = bytes
                .iter()
                .map(|b| format!("0x{b:02x}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("pub const EMBEDDED_CDHASH: Option<[u8; 20]> = Some([{list}]);\n")
        }
        Err(_) => {
            println!("cargo:warning=RSRREPAIR_CDHASH unset; no primary client identity embedded");
            "pub const EMBEDDED_CDHASH: Option<[u8; 20]> = None;\n".to_string()
        }
    };
    fs::write(out.join("cdhash.rs"), body).expect("failed to write cdhash.rs");
}
