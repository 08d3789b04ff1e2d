use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pdfcrack_security::EncryptionParameters;
use serde::Serialize;

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// PDF file to inspect.
    #[arg(short, long)]
    file: PathBuf,

    /// Print a JSON object instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct InfoReport {
    file: String,
    pdf_version: Option<String>,
    version: u32,
    revision: u32,
    key_length_bits: u32,
    cipher: &'static str,
    permissions: i32,
    encrypt_metadata: bool,
    supported: bool,
    owner_hash: String,
    user_hash: String,
    file_id: String,
}

impl InfoReport {
    fn new(file: &str, params: &EncryptionParameters) -> Self {
        Self {
            file: file.to_string(),
            pdf_version: params.pdf_version.clone(),
            version: params.version,
            revision: params.revision,
            key_length_bits: params.key_length_bits,
            cipher: params.cipher.as_str(),
            permissions: params.permissions,
            encrypt_metadata: params.encrypt_metadata,
            supported: params.ensure_supported().is_ok(),
            owner_hash: hex::encode(&params.owner_verifier),
            user_hash: hex::encode(&params.user_verifier),
            file_id: hex::encode(&params.file_identifier),
        }
    }
}

pub fn run(args: InfoArgs) -> Result<()> {
    let params = EncryptionParameters::from_path(&args.file)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    let report = InfoReport::new(&args.file.display().to_string(), &params);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("PDF Encryption Information");
    println!("==========================");
    println!("File:        {}", report.file);
    println!(
        "PDF Version: {}",
        report.pdf_version.as_deref().unwrap_or("unknown")
    );
    println!("Encryption:  V{} R{}", report.version, report.revision);
    println!("Key Length:  {} bits", report.key_length_bits);
    println!("Algorithm:   {}", report.cipher);
    println!("Permissions: {}", report.permissions);
    println!("Metadata:    {}", if report.encrypt_metadata { "encrypted" } else { "clear" });
    println!("Owner Hash:  {}", report.owner_hash);
    println!("User Hash:   {}", report.user_hash);
    println!("File ID:     {}", report.file_id);
    if let Err(err) = params.ensure_supported() {
        println!();
        println!("Note: {err}");
    }
    Ok(())
}
