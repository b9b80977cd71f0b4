//! Offline `ingest` and `export` subcommands.

use std::io::{Read, Write};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8};
use log::info;
use pricebox_core::AggregateSnapshot;
use pricebox_data::{export_archive, ingest_archive};

use crate::CliError;
use crate::config::{ExportArgs, ExportConfig, IngestArgs, IngestConfig};

pub(crate) fn run_ingest(args: IngestArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let mut stdout = std::io::stdout().lock();
    ingest_with(&config, &mut stdout)?;
    Ok(())
}

pub(crate) fn run_export(args: ExportArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    export_with(&config)
}

/// Ingest the configured archive and write the snapshot to `writer` as JSON.
pub(crate) fn ingest_with(
    config: &IngestConfig,
    writer: &mut dyn Write,
) -> Result<AggregateSnapshot, CliError> {
    let bytes = read_archive(&config.archive)?;
    let store = config.store.open()?;
    let snapshot = ingest_archive(&store, &bytes).map_err(|source| CliError::Ingest { source })?;
    write_summary(writer, &snapshot)?;
    Ok(snapshot)
}

/// Export the configured store to the configured output path.
pub(crate) fn export_with(config: &ExportConfig) -> Result<(), CliError> {
    let store = config.store.open()?;
    let archive = export_archive(&store).map_err(|source| CliError::Export { source })?;
    write_export(&config.output, &archive)?;
    info!("wrote {} bytes to {}", archive.len(), config.output);
    Ok(())
}

fn read_archive(path: &Utf8Path) -> Result<Vec<u8>, CliError> {
    let read_error = |source: std::io::Error| CliError::ReadArchive {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs_utf8::File::open_ambient(path, ambient_authority()).map_err(read_error)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_error)?;
    Ok(bytes)
}

fn write_export(path: &Utf8Path, archive: &[u8]) -> Result<(), CliError> {
    let write_error = |source: std::io::Error| CliError::WriteExport {
        path: path.to_path_buf(),
        source,
    };
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().ok_or_else(|| {
        write_error(std::io::Error::other("output path should include a file name"))
    })?;
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority()).map_err(write_error)?;
    dir.write(file_name, archive).map_err(write_error)
}

fn write_summary(writer: &mut dyn Write, snapshot: &AggregateSnapshot) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(snapshot).map_err(CliError::SerializeSummary)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}
