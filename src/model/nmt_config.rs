//! Loading and patching of the JoeyNMT YAML config shipped with each model.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

const REQUIRED_SECTIONS: [&str; 3] = ["data", "model", "training"];

/// Local locations the rewritten config should point at.
#[derive(Debug, Clone)]
pub struct LocalPaths {
    pub src_vocab: PathBuf,
    pub trg_vocab: PathBuf,
    pub model_dir: PathBuf,
    pub checkpoint: PathBuf,
}

pub fn load(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

pub fn save(config: &Value, path: &Path) -> Result<()> {
    fs::write(path, serde_yaml::to_string(config)?)?;
    Ok(())
}

/// Point vocabularies, model dir and checkpoint at `paths`.
///
/// With tied embeddings the target vocabulary is the source vocabulary.
pub fn rewrite(mut config: Value, paths: &LocalPaths) -> Result<Value> {
    let root = match config.as_mapping_mut() {
        Some(root) if !root.is_empty() => root,
        _ => return Err(Error::InvalidConfig("Configuration is empty!".to_string())),
    };

    for section in REQUIRED_SECTIONS {
        if !matches!(root.get(section), Some(Value::Mapping(_))) {
            return Err(Error::InvalidConfig(format!(
                "Configuration is missing {} section!",
                section
            )));
        }
    }

    let tied = root
        .get("model")
        .and_then(|model| model.get("tied_embeddings"))
        .is_some_and(is_truthy);

    let src_vocab = path_value(&paths.src_vocab);
    let trg_vocab = if tied {
        src_vocab.clone()
    } else {
        path_value(&paths.trg_vocab)
    };

    let data = section_mut(root, "data")?;
    data.insert("src_vocab".into(), src_vocab);
    data.insert("trg_vocab".into(), trg_vocab);

    let training = section_mut(root, "training")?;
    training.insert("model_dir".into(), path_value(&paths.model_dir));
    training.insert("load_model".into(), path_value(&paths.checkpoint));

    Ok(config)
}

fn section_mut<'a>(root: &'a mut Mapping, name: &str) -> Result<&'a mut Mapping> {
    root.get_mut(name)
        .and_then(Value::as_mapping_mut)
        .ok_or_else(|| Error::InvalidConfig(format!("Configuration is missing {} section!", name)))
}

fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Sequence(seq) => !seq.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}
