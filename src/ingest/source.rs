use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::info;

use crate::ingest::IngestError;

pub const YELLOW_TRIPDATA_PREFIX: &str =
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/yellow";

/// Where a dataset comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// One month of yellow taxi trips under `prefix`.
    Templated {
        prefix: String,
        year: i32,
        month: u32,
    },
    /// A URL or local path given as-is.
    Direct(String),
}

impl SourceSpec {
    pub fn resolve(&self) -> String {
        match self {
            SourceSpec::Templated {
                prefix,
                year,
                month,
            } => format!(
                "{}/yellow_tripdata_{}-{:02}.csv.gz",
                prefix.trim_end_matches('/'),
                year,
                month
            ),
            SourceSpec::Direct(url) => url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    /// Anything not ending in `.parquet` is read as CSV.
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(".parquet") {
            SourceFormat::Parquet
        } else {
            SourceFormat::Csv
        }
    }
}

/// A source file on local disk. Downloads are deleted on drop.
#[derive(Debug)]
pub enum LocalFile {
    InPlace(PathBuf),
    Downloaded(NamedTempFile),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalFile::InPlace(path) => path,
            LocalFile::Downloaded(file) => file.path(),
        }
    }
}

/// Makes `url` readable from disk, downloading HTTP(S) sources.
pub fn fetch(url: &str) -> Result<LocalFile, IngestError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return download(url).map(LocalFile::Downloaded);
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    Ok(LocalFile::InPlace(PathBuf::from(path)))
}

fn download(url: &str) -> Result<NamedTempFile, IngestError> {
    info!("Downloading {}", url);

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(None::<Duration>)
        .build()?;

    let mut response = client.get(url).send()?.error_for_status()?;

    let mut file = tempfile::Builder::new()
        .prefix("taxi-ingest-")
        .tempfile()?;
    let bytes = response.copy_to(&mut file)?;

    info!("Downloaded {} bytes to {}", bytes, file.path().display());
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templated_url_zero_pads_month() {
        let source = SourceSpec::Templated {
            prefix: "https://x".to_string(),
            year: 2021,
            month: 3,
        };
        assert_eq!(source.resolve(), "https://x/yellow_tripdata_2021-03.csv.gz");
    }

    #[test]
    fn templated_url_tolerates_trailing_slash() {
        let source = SourceSpec::Templated {
            prefix: "https://x/yellow/".to_string(),
            year: 2020,
            month: 12,
        };
        assert_eq!(
            source.resolve(),
            "https://x/yellow/yellow_tripdata_2020-12.csv.gz"
        );
    }

    #[test]
    fn direct_url_is_unchanged() {
        let source = SourceSpec::Direct("https://host/data.csv?x=1".to_string());
        assert_eq!(source.resolve(), "https://host/data.csv?x=1");
    }

    #[test]
    fn parquet_dispatch_on_suffix() {
        assert_eq!(
            SourceFormat::from_url("https://host/green_2021-01.parquet"),
            SourceFormat::Parquet
        );
        assert_eq!(SourceFormat::from_url("https://host/a.csv"), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_url("https://host/a.csv.gz"), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_url("https://host/export"), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_url("/tmp/a.parquet.gz"), SourceFormat::Csv);
    }

    #[test]
    fn local_sources_are_read_in_place() -> Result<(), Box<dyn std::error::Error>> {
        let plain = fetch("/data/trips.csv")?;
        assert_eq!(plain.path(), Path::new("/data/trips.csv"));

        let file_url = fetch("file:///data/trips.parquet")?;
        assert_eq!(file_url.path(), Path::new("/data/trips.parquet"));
        Ok(())
    }
}
