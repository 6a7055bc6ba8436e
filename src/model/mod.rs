pub mod downloader;
pub mod nmt_config;
pub mod registry;
pub mod source;

pub use downloader::ModelDownloader;
pub use registry::ModelRegistry;
