// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration JSON Schema Generator
//!
//! Prints the JSON Schema of the ddnsync configuration file, generated from
//! the types in src/config.rs. Editors with YAML language server support can
//! use it to validate configuration files.
//!
//! Usage:
//!   cargo run --bin configschema > ddnsync.schema.json
//!   cargo run --bin configschema -- docs/ddnsync.schema.json

use ddnsync::config::Config;
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(Config);
    let json = serde_json::to_string_pretty(&schema)?;

    match std::env::args().nth(1) {
        Some(output) => {
            let output = Path::new(&output);
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(output, format!("{json}\n"))?;
            eprintln!("✓ Wrote configuration schema to {}", output.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
