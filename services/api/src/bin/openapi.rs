//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3.0 document for the GopherMart REST API.
//!
//! Usage: `openapi [PATH]`. The default path is `openapi.json`; `-` prints to stdout.

use gophermart_lib::web::rest::ApiDoc;
use std::io::Write;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());
    let doc = ApiDoc::openapi().to_pretty_json()?;

    if target == "-" {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(doc.as_bytes())?;
        stdout.write_all(b"\n")?;
    } else {
        std::fs::write(&target, doc)?;
        eprintln!("OpenAPI document written to {}", target);
    }
    Ok(())
}
