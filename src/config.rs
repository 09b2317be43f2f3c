use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};
use crate::folder::DEFAULT_EXTENSIONS;
use crate::store::MergePolicy;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Annotation document, rewritten on every save
    pub store_path: PathBuf,
    /// One class label per line
    pub class_list: PathBuf,
    pub image_extensions: Vec<String>,
    pub merge_policy: MergePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("output.json"),
            class_list: PathBuf::from("class_list.txt"),
            image_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            merge_policy: MergePolicy::Append,
        }
    }
}

impl Config {
    /// Read `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(AnnotateError::ReadConfig {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| AnnotateError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}
