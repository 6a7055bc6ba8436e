use reqwest::blocking::Client;
use reqwest::Url;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

const DRIVE_HOST_MARKER: &str = "drive.google.com";
const DRIVE_FILE_PREFIX: &str = "https://drive.google.com/file";
const DRIVE_OPEN_PREFIX: &str = "https://drive.google.com/open?";
const DRIVE_DOWNLOAD_URL: &str = "https://docs.google.com/uc?export=download";
const DOWNLOAD_WARNING_PREFIX: &str = "download_warning";
const CHUNK_SIZE: usize = 32 * 1024;

/// Why a single file could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("didn't recognize url {0}")]
    UnrecognizedUrl(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("could not write file: {0}")]
    Io(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Request(err.to_string())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(err.to_string())
    }
}

/// Anything that can place the file behind `url` at `destination`.
pub trait Fetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError>;
}

/// Where a registry URL points to, and therefore how to download it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Plain file URL (e.g. GitHub raw), fetched in one request.
    Direct { url: String },
    /// Google Drive file, fetched through the large-file confirmation flow.
    GoogleDrive { file_id: String },
}

impl FileSource {
    pub fn classify(url: &str) -> Result<Self, FetchError> {
        if !url.contains(DRIVE_HOST_MARKER) {
            return Ok(FileSource::Direct {
                url: url.to_string(),
            });
        }

        let unrecognized = || FetchError::UnrecognizedUrl(url.to_string());
        let parsed = Url::parse(url).map_err(|_| unrecognized())?;

        let file_id = if url.starts_with(DRIVE_FILE_PREFIX) {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        } else if url.starts_with(DRIVE_OPEN_PREFIX) {
            parsed
                .query_pairs()
                .find(|(key, _)| key == "id")
                .map(|(_, value)| value.into_owned())
        } else {
            None
        };

        match file_id {
            Some(file_id) if !file_id.is_empty() => Ok(FileSource::GoogleDrive { file_id }),
            _ => Err(unrecognized()),
        }
    }

    pub fn download(&self, destination: &Path) -> Result<(), FetchError> {
        match self {
            FileSource::Direct { url } => download_direct(url, destination),
            FileSource::GoogleDrive { file_id } => download_drive(file_id, destination),
        }
    }
}

fn download_direct(url: &str, destination: &Path) -> Result<(), FetchError> {
    download_direct_with(&Client::builder().build()?, url, destination)
}

fn download_direct_with(client: &Client, url: &str, destination: &Path) -> Result<(), FetchError> {
    let bytes = client.get(url).send()?.error_for_status()?.bytes()?;
    fs::write(destination, &bytes)?;

    tracing::debug!(url, size = bytes.len(), "downloaded file");
    Ok(())
}

fn download_drive(file_id: &str, destination: &Path) -> Result<(), FetchError> {
    // One cookie session per file.
    let client = Client::builder().cookie_store(true).build()?;
    download_drive_from(&client, DRIVE_DOWNLOAD_URL, file_id, destination)
}

/// Drive's large-file flow against `endpoint`: a `download_warning*` cookie on
/// the first response carries the token for a confirmed second request.
fn download_drive_from(
    client: &Client,
    endpoint: &str,
    file_id: &str,
    destination: &Path,
) -> Result<(), FetchError> {
    let mut response = client.get(endpoint).query(&[("id", file_id)]).send()?;

    let token = response
        .cookies()
        .filter(|cookie| cookie.name().starts_with(DOWNLOAD_WARNING_PREFIX))
        .map(|cookie| cookie.value().to_string())
        .last();

    if let Some(token) = token {
        tracing::debug!(file_id, "confirming large Google Drive download");
        response = client
            .get(endpoint)
            .query(&[("id", file_id), ("confirm", token.as_str())])
            .send()?;
    }

    let mut response = response.error_for_status()?;
    let mut file = File::create(destination)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written = 0usize;
    loop {
        let n = match response.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&buffer[..n])?;
        written += n;
    }
    file.flush()?;

    tracing::debug!(file_id, size = written, "downloaded Google Drive file");
    Ok(())
}

/// Production fetcher: pauses before each request, then dispatches on the
/// URL kind.
pub struct HttpFetcher {
    delay: Duration,
}

impl HttpFetcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        thread::sleep(self.delay);
        FileSource::classify(url)?.download(destination)
    }
}
