//! Bounding-box annotation for folders of images.
//!
//! [`AnnotationStore`] owns the saved annotations and the JSON document they
//! live in. [`Session`] turns pointer drags into boxes for the open image and
//! commits them into the store on save.

pub mod classes;
pub mod config;
pub mod error;
pub mod folder;
pub mod model;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{AnnotateError, ErrorKind, GestureIssue};
pub use model::{BoundingBox, ClassAnnotationGroup, ImageAnnotation, Point};
pub use session::{Direction, DrawState, PendingCommit, Session, SessionEvent};
pub use store::{AnnotationStore, MergePolicy};
