use crate::config::Config;
use crate::error::{Error, FileFailure, Result};
use crate::model::nmt_config::{self, LocalPaths};
use crate::model::source::{Fetcher, HttpFetcher};
use crate::model::ModelRegistry;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const CKPT_FILE: &str = "model.ckpt";
const SRC_VOCAB_FILE: &str = "src_vocab.txt";
const TRG_VOCAB_FILE: &str = "trg_vocab.txt";
const RAW_CONFIG_FILE: &str = "config_orig.yaml";
const CONFIG_FILE: &str = "config.yaml";
const SRC_BPE_FILE: &str = "src.bpe.model";
const TRG_BPE_FILE: &str = "trg.bpe.model";

/// Registry column and local filename for every part of a model, in download order.
const MODEL_PARTS: [(&str, &str); 6] = [
    ("ckpt", CKPT_FILE),
    ("src_vocab", SRC_VOCAB_FILE),
    ("trg_vocab", TRG_VOCAB_FILE),
    ("config.yaml", RAW_CONFIG_FILE),
    ("src_bpe", SRC_BPE_FILE),
    ("trg_bpe", TRG_BPE_FILE),
];

/// A fully downloaded model ready for JoeyNMT.
#[derive(Debug, Clone)]
pub struct DownloadedModel {
    pub model_dir: PathBuf,
    pub config: serde_yaml::Value,
    pub lowercased: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

pub struct ModelDownloader<F = HttpFetcher> {
    registry: ModelRegistry,
    models_dir: PathBuf,
    fetcher: F,
}

impl ModelDownloader<HttpFetcher> {
    pub fn new(config: &Config, registry: ModelRegistry) -> Self {
        Self::with_fetcher(
            registry,
            config.models_dir.clone(),
            HttpFetcher::new(config.request_delay()),
        )
    }
}

impl<F: Fetcher> ModelDownloader<F> {
    pub fn with_fetcher(registry: ModelRegistry, models_dir: PathBuf, fetcher: F) -> Self {
        Self {
            registry,
            models_dir,
            fetcher,
        }
    }

    /// `<models_dir>/<src>-<trg>`
    pub fn model_dir(&self, trg_language: &str) -> PathBuf {
        self.models_dir
            .join(format!("{}-{}", self.registry.src_language(), trg_language))
    }

    /// Download every part of the model for `trg_language` and prepare its config.
    ///
    /// All parts are attempted even after a failure; any failed part fails the
    /// whole model.
    pub fn download_model(&self, trg_language: &str) -> Result<DownloadedModel> {
        let src_language = self.registry.src_language();
        let descriptor = self
            .registry
            .get(trg_language)
            .ok_or_else(|| Error::ModelNotFound(format!("{}-{}", src_language, trg_language)))?;

        let model_dir = self.model_dir(trg_language);
        tracing::info!(
            "Downloading model for {} to {}",
            trg_language,
            model_dir.display()
        );
        if !model_dir.exists() {
            fs::create_dir_all(&model_dir)?;
            tracing::info!("Directory {} created", model_dir.display());
        }

        let mut failures = Vec::new();
        for (part, filename) in MODEL_PARTS {
            let url = descriptor.require(part)?;
            let destination = model_dir.join(filename);

            if let Err(reason) = self.fetcher.fetch(url, &destination) {
                tracing::warn!(
                    part,
                    url,
                    destination = %destination.display(),
                    "Couldn't download file: {}",
                    reason
                );
                failures.push(FileFailure {
                    part,
                    url: url.to_string(),
                    reason,
                });
            }
        }

        let paths = LocalPaths {
            src_vocab: model_dir.join(SRC_VOCAB_FILE),
            trg_vocab: model_dir.join(TRG_VOCAB_FILE),
            model_dir: model_dir.clone(),
            checkpoint: model_dir.join(CKPT_FILE),
        };

        let raw_config_missing = failures.iter().any(|f| f.part == "config.yaml");
        let config = if raw_config_missing {
            None
        } else {
            let raw = nmt_config::load(&model_dir.join(RAW_CONFIG_FILE))?;
            let config = nmt_config::rewrite(raw, &paths)?;
            nmt_config::save(&config, &model_dir.join(CONFIG_FILE))?;
            Some(config)
        };

        match config {
            Some(config) if failures.is_empty() => {
                let lowercased = is_lowercased(&paths.src_vocab)?;
                tracing::info!(
                    "Downloaded model for {}-{} successfully.",
                    src_language,
                    trg_language
                );
                Ok(DownloadedModel {
                    model_dir,
                    config,
                    lowercased,
                })
            }
            _ => {
                tracing::error!(
                    "Download of model for {}-{} FAILED ({} of {} files).",
                    src_language,
                    trg_language,
                    failures.len(),
                    MODEL_PARTS.len()
                );
                Err(Error::IncompleteDownload {
                    src: src_language.to_string(),
                    trg: trg_language.to_string(),
                    failures,
                })
            }
        }
    }

    /// Try every model in the registry and report which ones downloaded.
    pub fn download_and_check_all_models(&self) -> BatchReport {
        let mut report = BatchReport::default();

        for trg_language in self.registry.target_languages() {
            match self.download_model(&trg_language) {
                Ok(_) => report.succeeded.push(trg_language),
                Err(e) => {
                    tracing::warn!("Model {} failed: {}", trg_language, e);
                    report.failed.push(trg_language);
                }
            }
        }

        tracing::info!(
            "Model loading succeeded for {}/{} models: {:?}",
            report.succeeded.len(),
            report.total(),
            report.succeeded
        );
        tracing::info!(
            "Model loading failed for {}/{} models: {:?}",
            report.failed.len(),
            report.total(),
            report.failed
        );

        report
    }
}

/// A model counts as lowercased when no line of its source vocabulary
/// changes under lowercasing.
pub fn is_lowercased(src_vocab: &Path) -> Result<bool> {
    let reader = BufReader::new(File::open(src_vocab)?);
    for line in reader.lines() {
        let line = line?;
        if line != line.to_lowercase() {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::source::FetchError;
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};

    const HEADER: &str =
        "src_language\ttrg_language\tdomain\tcomplete\tckpt\tsrc_vocab\ttrg_vocab\tconfig.yaml\tsrc_bpe\ttrg_bpe";

    const CONFIG_YAML: &str = r#"
data:
    src: "en"
    trg: "zu"
    src_vocab: "/content/src_vocab.txt"
    trg_vocab: "/content/trg_vocab.txt"
training:
    model_dir: "/content/models/enzu"
model:
    tied_embeddings: false
"#;

    /// Serves canned bodies by URL and records every request.
    #[derive(Default)]
    struct FakeFetcher {
        files: HashMap<String, Vec<u8>>,
        failing: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, url: &str, destination: &Path) -> std::result::Result<(), FetchError> {
            self.calls.borrow_mut().push(url.to_string());
            if self.failing.contains(url) {
                return Err(FetchError::Request(format!("connection refused: {}", url)));
            }
            let body = self
                .files
                .get(url)
                .ok_or_else(|| FetchError::Request(format!("404 Not Found: {}", url)))?;
            fs::write(destination, body)?;
            Ok(())
        }
    }

    fn url(trg: &str, part: &str) -> String {
        format!("https://raw.githubusercontent.com/masakhane/en-{}/{}", trg, part)
    }

    fn registry_for(targets: &[&str]) -> ModelRegistry {
        let mut text = HEADER.to_string();
        for trg in targets {
            text.push('\n');
            text.push_str(&format!("en\t{trg}\tJW300\tyes"));
            for (part, _) in MODEL_PARTS {
                text.push('\t');
                text.push_str(&url(trg, part));
            }
        }
        ModelRegistry::parse(&text, "en", "JW300").unwrap()
    }

    fn fetcher_for(targets: &[&str], src_vocab: &str) -> FakeFetcher {
        let mut fetcher = FakeFetcher::default();
        for trg in targets {
            for (part, _) in MODEL_PARTS {
                let body = match part {
                    "config.yaml" => CONFIG_YAML.as_bytes().to_vec(),
                    "src_vocab" => src_vocab.as_bytes().to_vec(),
                    _ => format!("{} for en-{}", part, trg).into_bytes(),
                };
                fetcher.files.insert(url(trg, part), body);
            }
        }
        fetcher
    }

    #[test]
    fn test_download_model_success() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = ModelDownloader::with_fetcher(
            registry_for(&["zu"]),
            dir.path().to_path_buf(),
            fetcher_for(&["zu"], "<unk>\n<pad>\nthe\nhouse\n"),
        );

        let model = downloader.download_model("zu").unwrap();

        let model_dir = dir.path().join("en-zu");
        assert_eq!(model.model_dir, model_dir);
        assert!(model.lowercased);
        for file in [
            CKPT_FILE,
            SRC_VOCAB_FILE,
            TRG_VOCAB_FILE,
            RAW_CONFIG_FILE,
            CONFIG_FILE,
            SRC_BPE_FILE,
            TRG_BPE_FILE,
        ] {
            assert!(model_dir.join(file).exists(), "missing {}", file);
        }

        let written = nmt_config::load(&model_dir.join(CONFIG_FILE)).unwrap();
        assert_eq!(written, model.config);
        assert_eq!(
            written["training"]["load_model"],
            model_dir.join(CKPT_FILE).to_string_lossy().as_ref()
        );
        assert_eq!(
            written["data"]["trg_vocab"],
            model_dir.join(TRG_VOCAB_FILE).to_string_lossy().as_ref()
        );

        let raw = nmt_config::load(&model_dir.join(RAW_CONFIG_FILE)).unwrap();
        assert_eq!(raw["training"]["model_dir"], "/content/models/enzu");
    }

    #[test]
    fn test_download_model_reuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("en-zu")).unwrap();
        let downloader = ModelDownloader::with_fetcher(
            registry_for(&["zu"]),
            dir.path().to_path_buf(),
            fetcher_for(&["zu"], "a\nb\n"),
        );

        assert!(downloader.download_model("zu").is_ok());
    }

    #[test]
    fn test_download_model_detects_cased_vocab() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = ModelDownloader::with_fetcher(
            registry_for(&["zu"]),
            dir.path().to_path_buf(),
            fetcher_for(&["zu"], "<unk>\nthe\nThe\nhouse\n"),
        );

        let model = downloader.download_model("zu").unwrap();

        assert!(!model.lowercased);
    }

    #[test]
    fn test_download_model_unknown_language_makes_no_requests() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = ModelDownloader::with_fetcher(
            registry_for(&["zu"]),
            dir.path().to_path_buf(),
            fetcher_for(&["zu"], "a\n"),
        );

        let err = downloader.download_model("xh").unwrap_err();

        assert!(matches!(err, Error::ModelNotFound(_)));
        assert!(downloader.fetcher.calls.borrow().is_empty());
        assert!(!dir.path().join("en-xh").exists());
    }

    #[test]
    fn test_any_single_failure_fails_the_model() {
        for (failing_part, _) in MODEL_PARTS {
            let dir = tempfile::tempdir().unwrap();
            let mut fetcher = fetcher_for(&["zu"], "a\n");
            fetcher.failing.insert(url("zu", failing_part));
            let downloader = ModelDownloader::with_fetcher(
                registry_for(&["zu"]),
                dir.path().to_path_buf(),
                fetcher,
            );

            let err = downloader.download_model("zu").unwrap_err();

            match err {
                Error::IncompleteDownload { src, trg, failures } => {
                    assert_eq!(src, "en");
                    assert_eq!(trg, "zu");
                    assert_eq!(failures.len(), 1);
                    assert_eq!(failures[0].part, failing_part);
                }
                other => panic!("unexpected error for {}: {}", failing_part, other),
            }
            assert_eq!(downloader.fetcher.calls.borrow().len(), MODEL_PARTS.len());
        }
    }

    #[test]
    fn test_all_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = fetcher_for(&["zu"], "a\n");
        fetcher.failing.insert(url("zu", "ckpt"));
        fetcher.failing.insert(url("zu", "trg_bpe"));
        let downloader =
            ModelDownloader::with_fetcher(registry_for(&["zu"]), dir.path().to_path_buf(), fetcher);

        let err = downloader.download_model("zu").unwrap_err();

        let Error::IncompleteDownload { failures, .. } = err else {
            panic!("expected incomplete download");
        };
        let parts: Vec<_> = failures.iter().map(|f| f.part).collect();
        assert_eq!(parts, vec!["ckpt", "trg_bpe"]);
        assert!(dir.path().join("en-zu").join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = fetcher_for(&["zu"], "a\n");
        fetcher
            .files
            .insert(url("zu", "config.yaml"), b"data:\n    src: en\nmodel: {}\n".to_vec());
        let downloader =
            ModelDownloader::with_fetcher(registry_for(&["zu"]), dir.path().to_path_buf(), fetcher);

        let err = downloader.download_model("zu").unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(msg) if msg.contains("training")));
    }

    #[test]
    fn test_batch_partitions_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut fetcher = fetcher_for(&["zu", "yo", "sw"], "a\n");
        fetcher.failing.insert(url("yo", "src_bpe"));
        let downloader = ModelDownloader::with_fetcher(
            registry_for(&["zu", "yo", "sw"]),
            dir.path().to_path_buf(),
            fetcher,
        );

        let report = downloader.download_and_check_all_models();

        assert_eq!(report.succeeded, vec!["sw", "zu"]);
        assert_eq!(report.failed, vec!["yo"]);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn test_is_lowercased() {
        let dir = tempfile::tempdir().unwrap();
        let lower = dir.path().join("lower.txt");
        let mixed = dir.path().join("mixed.txt");
        fs::write(&lower, "<unk>\nngiyabonga\nékuseni\n").unwrap();
        fs::write(&mixed, "<unk>\nngiyabonga\nÉkuseni\n").unwrap();

        assert!(is_lowercased(&lower).unwrap());
        assert!(!is_lowercased(&mixed).unwrap());
    }

    #[test]
    fn test_is_lowercased_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_lowercased(&dir.path().join("nope.txt")).is_err());
    }
}
