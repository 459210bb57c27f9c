use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::info;

use vtdump::itanium::{log_typeinfo, log_vtable, DumpTypeInfoResult, DumpVFTableResult};
use vtdump::{logging, Image, ItaniumReader};

#[derive(Parser)]
#[command(name = "vtdump")]
#[command(about = "Dump Itanium C++ vtables and RTTI from ELF and Mach-O images", long_about = None)]
struct Cli {
    /// Path to the executable image
    image: PathBuf,

    /// Write the JSON document here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON document
    #[arg(long)]
    pretty: bool,

    /// Log every recovered record
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Serialize)]
struct Document<'a> {
    vftable: &'a DumpVFTableResult,
    #[serde(rename = "typeInfo")]
    type_info: &'a DumpTypeInfoResult,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_tracing_json();
    } else {
        logging::init_tracing();
    }

    let image = Image::open(&cli.image)
        .with_context(|| format!("failed to load {}", cli.image.display()))?;
    let reader = ItaniumReader::new(&image);

    let vftable = reader.dump_vftables();
    info!("vtables: {}/{} parsed", vftable.parsed, vftable.total);
    let type_info = reader.dump_typeinfo();
    info!("typeinfo: {}/{} parsed", type_info.parsed, type_info.total);

    if cli.verbose {
        for vtable in &vftable.vftable {
            log_vtable(vtable);
        }
        for record in &type_info.type_info {
            log_typeinfo(record);
        }
    }

    let document = Document {
        vftable: &vftable,
        type_info: &type_info,
    };
    let text = if cli.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    match &cli.output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{text}"),
    }
    Ok(())
}
