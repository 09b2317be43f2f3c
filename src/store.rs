use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::error::{AnnotateError, Result};
use crate::model::{BoundingBox, ClassAnnotationGroup, ImageAnnotation};
use crate::session::PendingCommit;

/// How new boxes are merged into an existing class group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Append every new box, even if an identical one is already saved.
    #[default]
    Append,
    /// Drop new boxes that exactly match a box already in the group.
    SkipDuplicates,
}

/// Every saved annotation, plus the file it lives in.
#[derive(Clone, Debug)]
pub struct AnnotationStore {
    path: PathBuf,
    images: Vec<ImageAnnotation>,
    policy: MergePolicy,
}

impl AnnotationStore {
    /// Empty store that will write to `path` on the first commit.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            images: Vec::new(),
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Read the document at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let images = read_document(&path)?;
        info!("Loaded {} annotated images from {}", images.len(), path.display());
        Ok(Self {
            path,
            images,
            policy: MergePolicy::default(),
        })
    }

    /// Like [`AnnotationStore::load`], but a corrupt or unreadable file falls
    /// back to an empty store so a fresh session can still start.
    pub fn load_or_empty(path: impl Into<PathBuf>) -> (Self, Option<AnnotateError>) {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => (store, None),
            Err(err) => {
                error!("{err}; starting with an empty store");
                (Self::new(path), Some(err))
            }
        }
    }

    /// Replace the in-memory records with what is on disk. On failure the
    /// current records are kept.
    pub fn reload(&mut self) -> Result<()> {
        self.images = read_document(&self.path)?;
        debug!("Reloaded {} annotated images", self.images.len());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    pub fn images(&self) -> &[ImageAnnotation] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// First record whose key is exactly `image_path`.
    pub fn find_image(&self, image_path: &str) -> Option<&ImageAnnotation> {
        self.images.iter().find(|i| i.image_path == image_path)
    }

    /// Merge `pending` into the record for `image_path` and rewrite the file.
    /// If the write fails, the in-memory records are restored. An empty
    /// `pending` leaves both the records and the file alone.
    pub fn commit(
        &mut self,
        image_path: &str,
        pending: &PendingCommit,
    ) -> Result<Option<&ImageAnnotation>> {
        if pending.is_empty() {
            debug!("Nothing to commit for {image_path}");
            return Ok(self.find_image(image_path));
        }

        let snapshot = self.images.clone();
        let added = merge(&mut self.images, image_path, pending, self.policy);

        if let Err(err) = self.save() {
            error!("Commit for {image_path} rolled back: {err}");
            self.images = snapshot;
            return Err(err);
        }
        info!("Committed {added} boxes for {image_path}");

        Ok(self.find_image(image_path))
    }

    /// Rewrite the whole document. The data goes to a temporary file next to
    /// the target which is then renamed over it.
    pub fn save(&self) -> Result<()> {
        let persistence = |source: std::io::Error| AnnotateError::Persistence {
            path: self.path.clone(),
            source,
        };

        let data = serde_json::to_string_pretty(&self.images)
            .map_err(|e| persistence(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(persistence)?;
        tmp.write_all(data.as_bytes()).map_err(persistence)?;
        if let Ok(meta) = std::fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(persistence)?;
        }
        tmp.as_file().sync_all().map_err(persistence)?;
        tmp.persist(&self.path).map_err(|e| persistence(e.error))?;

        debug!("Wrote {}", self.path.display());
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<Vec<ImageAnnotation>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} does not exist yet", path.display());
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(AnnotateError::ReadState {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&data).map_err(|source| AnnotateError::CorruptState {
        path: path.to_path_buf(),
        source,
    })
}

/// Fold `pending` into `images`. Returns the number of boxes added.
///
/// Existing boxes are never touched: new boxes go to the end of the matching
/// class group, unknown classes get a new group at the end of the image.
pub fn merge(
    images: &mut Vec<ImageAnnotation>,
    image_path: &str,
    pending: &PendingCommit,
    policy: MergePolicy,
) -> usize {
    if pending.is_empty() {
        return 0;
    }

    let idx = match images.iter().position(|i| i.image_path == image_path) {
        Some(idx) => idx,
        None => {
            images.push(ImageAnnotation::new(image_path));
            images.len() - 1
        }
    };
    let image = &mut images[idx];

    let mut added = 0;
    for (class_name, boxes) in pending.iter() {
        if boxes.is_empty() {
            continue;
        }
        match image.group_mut(class_name) {
            Some(group) => added += append_boxes(&mut group.boxes, boxes, policy),
            None => {
                let mut group = ClassAnnotationGroup {
                    class_name: class_name.to_string(),
                    boxes: Vec::with_capacity(boxes.len()),
                };
                added += append_boxes(&mut group.boxes, boxes, policy);
                image.groups.push(group);
            }
        }
    }
    added
}

fn append_boxes(dst: &mut Vec<BoundingBox>, new: &[BoundingBox], policy: MergePolicy) -> usize {
    let before = dst.len();
    match policy {
        MergePolicy::Append => dst.extend_from_slice(new),
        MergePolicy::SkipDuplicates => {
            for b in new {
                if !dst.contains(b) {
                    dst.push(*b);
                }
            }
        }
    }
    dst.len() - before
}
