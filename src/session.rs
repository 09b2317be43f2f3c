//! Per-image editing state: the box being dragged, the boxes drawn but not
//! yet saved, and which image of the folder is open.
//!
//! The session never touches the file system for annotations itself; every
//! operation that needs saved data takes the [`AnnotationStore`] explicitly.
//! Anything the front end has to show is pushed as a [`SessionEvent`] and
//! collected with [`Session::take_events`].

use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::{AnnotateError, ErrorKind, GestureIssue, Result};
use crate::folder;
use crate::model::{BoundingBox, ImageAnnotation, Point};
use crate::store::AnnotationStore;

/// An in-progress drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    pub anchor: Point,
    pub cursor: Option<Point>,
}

impl DrawState {
    /// Box spanned so far. Before the first move this is the empty box at
    /// the anchor.
    pub fn rect(&self) -> BoundingBox {
        BoundingBox::normalize(self.anchor, self.cursor.unwrap_or(self.anchor))
    }
}

/// Boxes drawn on the open image and not yet saved, grouped by class in the
/// order each class was first used.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PendingCommit {
    groups: Vec<(String, Vec<BoundingBox>)>,
}

impl PendingCommit {
    pub fn push(&mut self, class_name: &str, bbox: BoundingBox) {
        match self.groups.iter_mut().find(|(c, _)| c == class_name) {
            Some((_, boxes)) => boxes.push(bbox),
            None => self.groups.push((class_name.to_string(), vec![bbox])),
        }
    }

    pub fn get(&self, class_name: &str) -> Option<&[BoundingBox]> {
        self.groups
            .iter()
            .find(|(c, _)| c == class_name)
            .map(|(_, boxes)| boxes.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[BoundingBox])> {
        self.groups.iter().map(|(c, b)| (c.as_str(), b.as_slice()))
    }

    pub fn box_count(&self) -> usize {
        self.groups.iter().map(|(_, b)| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.box_count() == 0
    }

    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// Output for the front end, in the order it happened.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Live drag rectangle, `None` once the drag is over.
    PreviewRect(Option<BoundingBox>),
    /// Saved annotations of the open image, for a full redraw.
    AnnotationsChanged(Option<ImageAnnotation>),
    Error { kind: ErrorKind, message: String },
    NavigationStateChanged {
        index: usize,
        total: usize,
        can_prev: bool,
        can_next: bool,
    },
    /// Unsaved boxes that were dropped by leaving the image.
    PendingDiscarded(usize),
}

#[derive(Debug, Default)]
pub struct Session {
    folder: PathBuf,
    images: Vec<PathBuf>,
    index: usize,
    current: Option<String>,
    draw: Option<DrawState>,
    pending: PendingCommit,
    selected_class: Option<String>,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn current_image(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|_| self.images[self.index].as_path())
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn draw_state(&self) -> Option<&DrawState> {
        self.draw.as_ref()
    }

    pub fn pending(&self) -> &PendingCommit {
        &self.pending
    }

    pub fn selected_class(&self) -> Option<&str> {
        self.selected_class.as_deref()
    }

    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn report(&mut self, err: &AnnotateError) {
        self.events.push(SessionEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    // ── Folder & navigation ────────────────────────────────────────────────

    /// Open every supported image under `dir` and show the first one.
    pub fn open_folder(
        &mut self,
        dir: &Path,
        extensions: &[String],
        store: &AnnotationStore,
    ) -> Result<usize> {
        self.folder = dir.to_path_buf();
        let images = match folder::list_images(dir, extensions) {
            Ok(images) => images,
            Err(err) => {
                self.report(&err);
                self.set_images(Vec::new());
                return Err(err);
            }
        };
        info!("Opened {} images from {}", images.len(), dir.display());
        let total = images.len();
        self.set_images(images);
        self.go_to(0, store);
        Ok(total)
    }

    /// Replace the image list without touching the file system.
    pub fn set_images(&mut self, images: Vec<PathBuf>) {
        self.images = images;
        self.index = 0;
        self.discard_pending();
        self.current = None;
        if self.images.is_empty() {
            self.emit_navigation();
            self.events.push(SessionEvent::AnnotationsChanged(None));
        }
    }

    /// Step to the neighbouring image. Stays put at either end of the list.
    pub fn navigate(&mut self, direction: Direction, store: &AnnotationStore) {
        if self.images.is_empty() {
            let err = AnnotateError::ImageListEmpty(self.folder.clone());
            self.report(&err);
            return;
        }
        let target = match direction {
            Direction::Prev => self.index.saturating_sub(1),
            Direction::Next => (self.index + 1).min(self.images.len() - 1),
        };
        if target != self.index {
            self.go_to(target, store);
        }
    }

    /// Show image `index`, dropping any unsaved boxes of the image being left.
    pub fn go_to(&mut self, index: usize, store: &AnnotationStore) {
        let Some(path) = self.images.get(index) else {
            warn!("Image index {index} out of range ({} images)", self.images.len());
            return;
        };
        let key = path.to_string_lossy().into_owned();
        self.discard_pending();

        debug!("Opening {key}");
        self.index = index;
        self.current = Some(key);
        self.emit_navigation();
        self.emit_annotations(store);
    }

    fn discard_pending(&mut self) {
        let dropped = self.pending.box_count();
        if dropped > 0 {
            warn!(
                "Leaving {} with {dropped} unsaved boxes",
                self.current.as_deref().unwrap_or("?")
            );
            self.events.push(SessionEvent::PendingDiscarded(dropped));
        }
        if self.draw.take().is_some() {
            self.events.push(SessionEvent::PreviewRect(None));
        }
        self.pending.clear();
    }

    fn emit_navigation(&mut self) {
        let total = self.images.len();
        self.events.push(SessionEvent::NavigationStateChanged {
            index: self.index,
            total,
            can_prev: total > 0 && self.index > 0,
            can_next: self.index + 1 < total,
        });
    }

    fn emit_annotations(&mut self, store: &AnnotationStore) {
        let saved = self
            .current
            .as_deref()
            .and_then(|key| store.find_image(key))
            .cloned();
        self.events.push(SessionEvent::AnnotationsChanged(saved));
    }

    // ── Class selection ─────────────────────────────────────────────────────

    /// Select the label for the next boxes. A blank name clears the selection.
    pub fn select_class(&mut self, name: &str) {
        let name = name.trim();
        self.selected_class = (!name.is_empty()).then(|| name.to_string());
    }

    // ── Gestures ────────────────────────────────────────────────────────────

    pub fn gesture_start(&mut self, x: f64, y: f64) {
        if self.current.is_none() {
            self.report(&AnnotateError::InvalidGesture(GestureIssue::NoImage));
            return;
        }
        self.draw = Some(DrawState {
            anchor: Point::new(x, y),
            cursor: None,
        });
    }

    pub fn gesture_move(&mut self, x: f64, y: f64) {
        let Some(draw) = self.draw.as_mut() else {
            return;
        };
        draw.cursor = Some(Point::new(x, y));
        let rect = draw.rect();
        self.events.push(SessionEvent::PreviewRect(Some(rect)));
    }

    /// Finish the drag. Returns the box added to the pending set, if any.
    pub fn gesture_end(&mut self) -> Option<BoundingBox> {
        let draw = self.draw.take()?;
        self.events.push(SessionEvent::PreviewRect(None));

        let bbox = draw.rect();
        if bbox.is_empty() {
            debug!("Discarding zero-area box at {:?}", draw.anchor);
            return None;
        }
        let Some(class_name) = self.selected_class.as_deref() else {
            warn!("Discarding box {bbox:?}: no class selected");
            self.report(&AnnotateError::InvalidGesture(GestureIssue::NoClassSelected));
            return None;
        };

        self.pending.push(class_name, bbox);
        debug!("Pending {class_name}: {bbox:?}");
        Some(bbox)
    }

    pub fn gesture_cancel(&mut self) {
        if self.draw.take().is_some() {
            self.events.push(SessionEvent::PreviewRect(None));
        }
    }

    // ── Saving ──────────────────────────────────────────────────────────────

    /// Commit the pending boxes of the open image and return how many were
    /// written. On failure they are kept so the save can be retried.
    pub fn save(&mut self, store: &mut AnnotationStore) -> Result<usize> {
        let Some(key) = self.current.clone() else {
            warn!("Save requested with no image open");
            return Ok(0);
        };
        if self.pending.is_empty() {
            self.emit_annotations(store);
            return Ok(0);
        }

        let count = self.pending.box_count();
        match store.commit(&key, &self.pending) {
            Ok(image) => {
                let image = image.cloned();
                self.pending.clear();
                self.events.push(SessionEvent::AnnotationsChanged(image));
                Ok(count)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Re-read the annotation file and redraw the open image.
    pub fn refresh(&mut self, store: &mut AnnotationStore) -> Result<()> {
        if let Err(err) = store.reload() {
            self.report(&err);
            return Err(err);
        }
        self.emit_annotations(store);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_on(image: &str) -> Session {
        let mut session = Session::new();
        session.set_images(vec![PathBuf::from(image)]);
        session.go_to(0, &AnnotationStore::new("unused.json"));
        session.take_events();
        session
    }

    fn drag(session: &mut Session, from: (f64, f64), to: (f64, f64)) -> Option<BoundingBox> {
        session.gesture_start(from.0, from.1);
        session.gesture_move(to.0, to.1);
        session.gesture_end()
    }

    fn errors(events: &[SessionEvent]) -> Vec<ErrorKind> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Error { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn drag_is_normalized_into_pending() {
        let mut session = session_on("a.jpg");
        session.select_class("x");
        let bbox = drag(&mut session, (10.0, 10.0), (2.0, 20.0));
        assert_eq!(bbox, Some(BoundingBox::new(2.0, 10.0, 8.0, 10.0)));
        assert_eq!(
            session.pending().get("x"),
            Some(&[BoundingBox::new(2.0, 10.0, 8.0, 10.0)][..])
        );
        assert!(session.draw_state().is_none());
    }

    #[test]
    fn preview_follows_cursor() {
        let mut session = session_on("a.jpg");
        session.gesture_start(5.0, 5.0);
        session.gesture_move(1.0, 9.0);
        assert_eq!(
            session.take_events(),
            vec![SessionEvent::PreviewRect(Some(BoundingBox::new(1.0, 5.0, 4.0, 4.0)))]
        );
        session.gesture_cancel();
        assert_eq!(session.take_events(), vec![SessionEvent::PreviewRect(None)]);
        assert!(session.pending().is_empty());
    }

    #[test]
    fn zero_area_is_discarded_quietly() {
        let mut session = session_on("a.jpg");
        session.select_class("x");
        assert_eq!(drag(&mut session, (4.0, 4.0), (4.0, 4.0)), None);
        assert_eq!(drag(&mut session, (4.0, 4.0), (4.0, 9.0)), None);
        assert_eq!(drag(&mut session, (4.0, 4.0), (9.0, 4.0)), None);

        session.gesture_start(3.0, 3.0);
        assert_eq!(session.gesture_end(), None);

        assert!(session.pending().is_empty());
        assert!(errors(&session.take_events()).is_empty());
    }

    #[test]
    fn missing_class_is_reported() {
        let mut session = session_on("a.jpg");
        assert_eq!(drag(&mut session, (0.0, 0.0), (5.0, 5.0)), None);
        assert!(session.pending().is_empty());
        assert_eq!(errors(&session.take_events()), vec![ErrorKind::InvalidGesture]);

        session.select_class("  ");
        assert_eq!(session.selected_class(), None);
    }

    #[test]
    fn gesture_without_image_is_rejected() {
        let mut session = Session::new();
        session.select_class("x");
        assert_eq!(drag(&mut session, (0.0, 0.0), (5.0, 5.0)), None);
        assert_eq!(errors(&session.take_events()), vec![ErrorKind::InvalidGesture]);
    }

    #[test]
    fn pending_keeps_first_use_order() {
        let mut pending = PendingCommit::default();
        pending.push("dog", BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        pending.push("cat", BoundingBox::new(1.0, 1.0, 1.0, 1.0));
        pending.push("dog", BoundingBox::new(2.0, 2.0, 1.0, 1.0));
        let classes: Vec<_> = pending.iter().map(|(c, b)| (c, b.len())).collect();
        assert_eq!(classes, [("dog", 2), ("cat", 1)]);
        assert_eq!(pending.box_count(), 3);
    }

    #[test]
    fn save_commits_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotationStore::new(dir.path().join("output.json"));
        let mut session = session_on("a.jpg");
        session.select_class("cat");
        drag(&mut session, (1.0, 2.0), (4.0, 6.0));
        session.select_class("dog");
        drag(&mut session, (0.0, 0.0), (1.0, 1.0));
        session.take_events();

        assert_eq!(session.save(&mut store).unwrap(), 2);
        assert!(session.pending().is_empty());

        let image = store.find_image("a.jpg").unwrap().clone();
        assert_eq!(image.groups.len(), 2);
        assert_eq!(
            session.take_events(),
            vec![SessionEvent::AnnotationsChanged(Some(image))]
        );
    }

    #[test]
    fn failed_save_keeps_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotationStore::new(dir.path().join("nope").join("output.json"));
        let mut session = session_on("a.jpg");
        session.select_class("cat");
        drag(&mut session, (1.0, 2.0), (4.0, 6.0));
        session.take_events();

        assert!(session.save(&mut store).is_err());
        assert_eq!(session.pending().box_count(), 1);
        assert!(store.is_empty());
        assert_eq!(errors(&session.take_events()), vec![ErrorKind::Persistence]);
    }

    #[test]
    fn empty_save_leaves_store_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        let mut store = AnnotationStore::new(&path);
        let mut session = session_on("a.jpg");
        assert_eq!(session.save(&mut store).unwrap(), 0);
        assert!(!path.exists());
        assert_eq!(
            session.take_events(),
            vec![SessionEvent::AnnotationsChanged(None)]
        );
    }

    #[test]
    fn navigation_drops_pending_and_loads_saved() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = AnnotationStore::new(dir.path().join("output.json"));
        let mut session = Session::new();
        session.set_images(vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")]);
        session.go_to(0, &store);

        session.select_class("cat");
        drag(&mut session, (0.0, 0.0), (2.0, 2.0));
        session.save(&mut store).unwrap();
        drag(&mut session, (5.0, 5.0), (8.0, 8.0));
        session.take_events();

        session.navigate(Direction::Next, &store);
        assert_eq!(session.current_image(), Some("b.jpg"));
        assert!(session.pending().is_empty());
        assert_eq!(
            session.take_events(),
            vec![
                SessionEvent::PendingDiscarded(1),
                SessionEvent::NavigationStateChanged {
                    index: 1,
                    total: 2,
                    can_prev: true,
                    can_next: false
                },
                SessionEvent::AnnotationsChanged(None),
            ]
        );

        session.navigate(Direction::Next, &store);
        assert!(session.take_events().is_empty());

        session.navigate(Direction::Prev, &store);
        let events = session.take_events();
        let saved = store.find_image("a.jpg").cloned();
        assert!(saved.is_some());
        assert_eq!(events.last(), Some(&SessionEvent::AnnotationsChanged(saved)));
        assert_eq!(store.find_image("a.jpg").unwrap().box_count(), 1);
    }

    #[test]
    fn replacing_image_list_reports_dropped_pending() {
        let mut session = session_on("a.jpg");
        session.select_class("cat");
        drag(&mut session, (0.0, 0.0), (2.0, 2.0));
        drag(&mut session, (3.0, 3.0), (5.0, 5.0));
        session.gesture_start(1.0, 1.0);
        session.gesture_move(4.0, 4.0);
        session.take_events();

        session.set_images(vec![PathBuf::from("b.jpg")]);
        assert!(session.pending().is_empty());
        assert_eq!(
            session.take_events(),
            vec![
                SessionEvent::PendingDiscarded(2),
                SessionEvent::PreviewRect(None),
            ]
        );
    }

    #[test]
    fn navigation_on_empty_list_is_reported() {
        let mut session = Session::new();
        session.navigate(Direction::Next, &AnnotationStore::new("unused.json"));
        assert_eq!(errors(&session.take_events()), vec![ErrorKind::ImageListEmpty]);
    }

    #[test]
    fn refresh_picks_up_external_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.json");
        let mut store = AnnotationStore::new(&path);
        let mut session = session_on("a.jpg");

        std::fs::write(
            &path,
            r#"[{"image": "a.jpg", "class_and_bboxes": [{"class": "cat", "bboxes": [[1, 2, 3, 4]]}]}]"#,
        )
        .unwrap();
        session.refresh(&mut store).unwrap();
        match session.take_events().as_slice() {
            [SessionEvent::AnnotationsChanged(Some(image))] => assert_eq!(image.box_count(), 1),
            other => panic!("unexpected events {other:?}"),
        }
    }
}
