use std::path::{Path, PathBuf};

use bbox_annotate::{
    classes, AnnotationStore, BoundingBox, Config, Direction, ErrorKind, ImageAnnotation, Session,
    SessionEvent,
};
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use log::error;

const SAVED_COLOR: egui::Color32 = egui::Color32::from_rgb(40, 120, 255);
const PENDING_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 160, 0);
const PREVIEW_COLOR: egui::Color32 = egui::Color32::from_rgb(230, 30, 30);

// ── Front-end state ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default)]
struct NavState {
    index: usize,
    total: usize,
    can_prev: bool,
    can_next: bool,
}

/// Keyboard shortcuts pressed this frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Shortcuts {
    prev: bool,
    next: bool,
    save: bool,
    cancel: bool,
}

impl Shortcuts {
    fn read(ctx: &egui::Context) -> Self {
        let typing = ctx.wants_keyboard_input();
        ctx.input(|i| {
            Self::from_keys(
                typing,
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::ArrowRight),
                i.modifiers.command && i.key_pressed(egui::Key::S),
                i.key_pressed(egui::Key::Escape),
            )
        })
    }

    // Arrow keys move the caret while a text field has focus.
    fn from_keys(typing: bool, left: bool, right: bool, save: bool, escape: bool) -> Self {
        Self {
            prev: left && !typing,
            next: right && !typing,
            save,
            cancel: escape,
        }
    }
}

#[derive(Clone, Debug)]
struct Status {
    text: String,
    warning: bool,
}

pub struct AnnotateApp {
    config: Config,
    store: AnnotationStore,
    session: Session,
    class_names: Vec<String>,
    class_input: String,

    // mirrored from session events
    saved: Option<ImageAnnotation>,
    preview: Option<BoundingBox>,
    nav: NavState,
    status: Option<Status>,

    // image display
    loaded: Option<PathBuf>,
    texture: Option<egui::TextureHandle>,
    image_size: (f32, f32),
    pan: egui::Vec2,
    zoom: f32,
}

impl AnnotateApp {
    pub fn new(config: Config, folder: Option<PathBuf>) -> Self {
        let (store, load_err) = AnnotationStore::load_or_empty(&config.store_path);
        let store = store.with_policy(config.merge_policy);
        let class_names = classes::read_class_names(&config.class_list);

        let mut app = Self {
            config,
            store,
            session: Session::new(),
            class_names,
            class_input: String::new(),
            saved: None,
            preview: None,
            nav: NavState::default(),
            status: load_err.map(|e| Status {
                text: e.to_string(),
                warning: false,
            }),
            loaded: None,
            texture: None,
            image_size: (800.0, 600.0),
            pan: egui::Vec2::ZERO,
            zoom: 1.0,
        };
        if let Some(dir) = folder {
            app.open_folder(&dir);
        }
        app
    }

    fn open_folder(&mut self, dir: &Path) {
        // errors arrive as session events
        let _ = self
            .session
            .open_folder(dir, &self.config.image_extensions, &self.store);
    }

    fn apply_events(&mut self) {
        for event in self.session.take_events() {
            match event {
                SessionEvent::PreviewRect(rect) => self.preview = rect,
                SessionEvent::AnnotationsChanged(image) => self.saved = image,
                SessionEvent::Error { kind, message } => {
                    self.status = Some(Status {
                        text: message,
                        warning: kind == ErrorKind::InvalidGesture,
                    });
                }
                SessionEvent::NavigationStateChanged {
                    index,
                    total,
                    can_prev,
                    can_next,
                } => {
                    self.nav = NavState {
                        index,
                        total,
                        can_prev,
                        can_next,
                    };
                }
                SessionEvent::PendingDiscarded(count) => {
                    self.status = Some(Status {
                        text: format!("{count} unsaved boxes discarded"),
                        warning: true,
                    });
                }
            }
        }
    }

    fn save(&mut self) {
        if matches!(self.session.save(&mut self.store), Ok(n) if n > 0) {
            self.status = Some(Status {
                text: format!("Saved to {}", self.store.path().display()),
                warning: false,
            });
        }
    }

    fn refresh(&mut self) {
        let _ = self.session.refresh(&mut self.store);
    }

    fn navigate(&mut self, direction: Direction) {
        self.session.navigate(direction, &self.store);
    }

    fn ensure_texture(&mut self, ctx: &egui::Context) {
        let current = self.session.current_path().map(Path::to_path_buf);
        if current == self.loaded {
            return;
        }
        self.loaded = current.clone();
        self.texture = None;
        self.pan = egui::Vec2::ZERO;
        self.zoom = 1.0;

        let Some(path) = current else {
            return;
        };
        match image::open(&path) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let size = [rgba.width() as usize, rgba.height() as usize];
                self.image_size = (size[0] as f32, size[1] as f32);
                let color_image =
                    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice());
                self.texture = Some(ctx.load_texture(
                    path.to_string_lossy(),
                    color_image,
                    egui::TextureOptions::LINEAR,
                ));
            }
            Err(e) => {
                error!("Failed to open {}: {e}", path.display());
                self.status = Some(Status {
                    text: format!("Cannot display {}: {e}", path.display()),
                    warning: false,
                });
            }
        }
    }

    // ── Coordinates ─────────────────────────────────────────────────────────

    fn image_to_screen(&self, canvas_rect: egui::Rect, img_pos: egui::Pos2) -> egui::Pos2 {
        let center = canvas_rect.center();
        center
            + self.pan
            + (img_pos.to_vec2() - egui::vec2(self.image_size.0, self.image_size.1) * 0.5)
                * self.zoom
    }

    /// Screen position to image pixels, clamped to the image.
    fn screen_to_image(&self, canvas_rect: egui::Rect, screen_pos: egui::Pos2) -> (f64, f64) {
        let center = canvas_rect.center();
        let rel = screen_pos - center - self.pan;
        let x = (rel.x / self.zoom + self.image_size.0 * 0.5).clamp(0.0, self.image_size.0);
        let y = (rel.y / self.zoom + self.image_size.1 * 0.5).clamp(0.0, self.image_size.1);
        (x.round() as f64, y.round() as f64)
    }

    fn bbox_on_screen(&self, canvas_rect: egui::Rect, b: &BoundingBox) -> egui::Rect {
        let max = b.max();
        egui::Rect::from_two_pos(
            self.image_to_screen(canvas_rect, egui::pos2(b.x as f32, b.y as f32)),
            self.image_to_screen(canvas_rect, egui::pos2(max.x as f32, max.y as f32)),
        )
    }

    // ── Painting ────────────────────────────────────────────────────────────

    fn draw_labelled_box(
        &self,
        painter: &egui::Painter,
        canvas_rect: egui::Rect,
        class_name: &str,
        b: &BoundingBox,
        color: egui::Color32,
    ) {
        let rect = self.bbox_on_screen(canvas_rect, b);
        painter.rect_stroke(rect, 0.0, egui::Stroke::new(2.0, color), egui::StrokeKind::Middle);
        painter.text(
            rect.center_top() - egui::vec2(0.0, 4.0),
            egui::Align2::CENTER_BOTTOM,
            class_name,
            egui::FontId::proportional(14.0),
            color,
        );
    }

    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let canvas_rect = response.rect;

        painter.rect_filled(canvas_rect, 0.0, egui::Color32::from_gray(40));

        if let Some(ref tex) = self.texture {
            let img_rect = egui::Rect::from_min_max(
                self.image_to_screen(canvas_rect, egui::Pos2::ZERO),
                self.image_to_screen(canvas_rect, egui::pos2(self.image_size.0, self.image_size.1)),
            );
            painter.image(
                tex.id(),
                img_rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }

        if let Some(ref saved) = self.saved {
            for (class_name, b) in saved.labelled_boxes() {
                self.draw_labelled_box(&painter, canvas_rect, class_name, b, SAVED_COLOR);
            }
        }
        for (class_name, boxes) in self.session.pending().iter() {
            for b in boxes {
                self.draw_labelled_box(&painter, canvas_rect, class_name, b, PENDING_COLOR);
            }
        }
        if let Some(ref preview) = self.preview {
            let rect = self.bbox_on_screen(canvas_rect, preview);
            painter.rect_stroke(
                rect,
                0.0,
                egui::Stroke::new(2.0, PREVIEW_COLOR),
                egui::StrokeKind::Middle,
            );
        }

        // pan (middle mouse button)
        if ui.input(|i| i.pointer.middle_down()) {
            self.pan += ui.input(|i| i.pointer.delta());
        }

        // zoom (scroll wheel)
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta != 0.0 && response.hovered() {
            let new_zoom = (self.zoom * (1.0 + scroll_delta * 0.002)).clamp(0.1, 10.0);
            if let Some(cursor) = response.hover_pos() {
                let cursor_rel = cursor - canvas_rect.center() - self.pan;
                self.pan -= cursor_rel * (new_zoom / self.zoom - 1.0);
            }
            self.zoom = new_zoom;
        }

        // box drawing (primary button)
        if response.drag_started_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = self.screen_to_image(canvas_rect, pos);
                self.session.gesture_start(x, y);
            }
        }
        if response.dragged_by(egui::PointerButton::Primary) {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = self.screen_to_image(canvas_rect, pos);
                self.session.gesture_move(x, y);
            }
        }
        if response.drag_stopped_by(egui::PointerButton::Primary) {
            self.session.gesture_end();
        }
    }

    fn draw_annotation_list(&self, ui: &mut egui::Ui) {
        ui.heading("Bounding boxes");
        let Some(ref saved) = self.saved else {
            ui.label("No existing bounding boxes for this image.");
            return;
        };

        TableBuilder::new(ui)
            .striped(true)
            .column(Column::auto())
            .columns(Column::auto(), 4)
            .header(20.0, |mut header| {
                for title in ["Class", "x", "y", "w", "h"] {
                    header.col(|ui| {
                        ui.strong(title);
                    });
                }
            })
            .body(|mut body| {
                for (class_name, b) in saved.labelled_boxes() {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(class_name);
                        });
                        for v in [b.x, b.y, b.width, b.height] {
                            row.col(|ui| {
                                ui.label(format!("{v:.0}"));
                            });
                        }
                    });
                }
            });
    }
}

// ── eframe App impl ────────────────────────────────────────────────────────

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let keys = Shortcuts::read(ctx);
        if keys.cancel {
            self.session.gesture_cancel();
        }
        if keys.save {
            self.save();
        }
        if keys.prev {
            self.navigate(Direction::Prev);
        }
        if keys.next {
            self.navigate(Direction::Next);
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Choose Folder").clicked() {
                    if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                        self.open_folder(&dir);
                    }
                }
                ui.separator();

                let mut chosen = None;
                egui::ComboBox::from_id_salt("class")
                    .selected_text(self.session.selected_class().unwrap_or("(no class)").to_string())
                    .show_ui(ui, |ui| {
                        for name in &self.class_names {
                            let selected = self.session.selected_class() == Some(name.as_str());
                            if ui.selectable_label(selected, name).clicked() {
                                chosen = Some(name.clone());
                            }
                        }
                    });
                if ui
                    .add(egui::TextEdit::singleline(&mut self.class_input).hint_text("class"))
                    .changed()
                {
                    self.session.select_class(&self.class_input);
                }
                if let Some(name) = chosen {
                    self.session.select_class(&name);
                    self.class_input = name;
                }
                ui.separator();

                if ui
                    .add_enabled(self.nav.can_prev, egui::Button::new("<- Previous"))
                    .clicked()
                {
                    self.navigate(Direction::Prev);
                }
                if ui
                    .add_enabled(self.nav.can_next, egui::Button::new("Next ->"))
                    .clicked()
                {
                    self.navigate(Direction::Next);
                }
                if self.nav.total > 0 {
                    ui.label(format!("{} of {}", self.nav.index + 1, self.nav.total));
                }
                ui.separator();
                if ui.button("Refresh").clicked() {
                    self.refresh();
                }
                let pending = self.session.pending().box_count();
                if ui.button(format!("Save ({pending})")).clicked() {
                    self.save();
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    self.session
                        .current_image()
                        .unwrap_or("Choose a folder of images"),
                );
                if let Some(ref status) = self.status {
                    ui.separator();
                    let color = if status.warning {
                        egui::Color32::YELLOW
                    } else {
                        ui.visuals().error_fg_color
                    };
                    ui.colored_label(color, &status.text);
                }
            });
        });

        egui::SidePanel::right("annotations")
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.draw_annotation_list(ui);
                });
            });

        self.apply_events();
        self.ensure_texture(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        self.apply_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_navigate_only_outside_text_fields() {
        let idle = Shortcuts::from_keys(false, true, true, false, false);
        assert!(idle.prev && idle.next);

        let typing = Shortcuts::from_keys(true, true, true, false, false);
        assert_eq!(typing, Shortcuts::default());
    }

    #[test]
    fn save_and_cancel_work_while_typing() {
        let keys = Shortcuts::from_keys(true, false, false, true, true);
        assert!(keys.save && keys.cancel);
        assert!(!keys.prev && !keys.next);
    }
}
