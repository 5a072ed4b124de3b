use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::{AppError, AppResult};

const ZSTD_LEVEL: i32 = 19;

/// On-disk encodings understood by the loaders, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.json`
    Json,
    /// `.bin`, bincode with the standard config
    Bincode,
    /// `.zst`, zstd-compressed bincode
    Zstd,
}

impl FileFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(FileFormat::Json),
            Some(ext) if ext.eq_ignore_ascii_case("bin") => Ok(FileFormat::Bincode),
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Ok(FileFormat::Zstd),
            _ => Err(AppError::UnknownFormat(path.to_path_buf())),
        }
    }
}

/// Deserialize a value from disk in the format implied by its extension.
#[tracing::instrument(name = "Reading file", level = "debug")]
pub fn read_file<T, P>(path: P) -> AppResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path> + std::fmt::Debug,
{
    let format = FileFormat::from_path(&path)?;
    match format {
        FileFormat::Json => {
            let raw = fs::read_to_string(&path)?;
            parse_json(&raw)
        }
        FileFormat::Bincode => {
            let mut reader = BufReader::new(File::open(&path)?);
            Ok(bincode::serde::decode_from_std_read(
                &mut reader,
                bincode::config::standard(),
            )?)
        }
        FileFormat::Zstd => {
            let mut decoder = zstd::stream::read::Decoder::new(File::open(&path)?)?;
            Ok(bincode::serde::decode_from_std_read(
                &mut decoder,
                bincode::config::standard(),
            )?)
        }
    }
}

/// Serialize a value to disk, overwriting any existing content.
#[tracing::instrument(name = "Writing file", level = "debug", skip(value))]
pub fn write_file<T, P>(path: P, value: &T) -> AppResult<()>
where
    T: Serialize,
    P: AsRef<Path> + std::fmt::Debug,
{
    let format = FileFormat::from_path(&path)?;
    if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(&path)?);
    match format {
        FileFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, value)?;
        }
        FileFormat::Bincode => {
            let written = bincode::serde::encode_into_std_write(
                value,
                &mut writer,
                bincode::config::standard(),
            )?;
            debug!("Wrote {} bytes", written);
        }
        FileFormat::Zstd => {
            let mut encoder = zstd::stream::write::Encoder::new(&mut writer, ZSTD_LEVEL)?;
            bincode::serde::encode_into_std_write(
                value,
                &mut encoder,
                bincode::config::standard(),
            )?;
            encoder.finish()?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Parse JSON, reporting the path of the field that failed.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    let jd = &mut serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Failed to parse JSON at path: {}", e.path());
            Err(e.into_inner().into())
        }
    }
}
