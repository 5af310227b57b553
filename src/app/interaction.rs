use super::{StoryboardApp, Tab, geometry, render};
use eframe::egui;
use storyframe::model::{EntityKind, Point, Selection};

impl StoryboardApp {
    fn hit_test(&self, world: egui::Pos2) -> Option<Selection> {
        let project = self.store.active_project()?;
        let viewports = self.store.viewports();
        match self.tab {
            Tab::Canvas => project.sequences.iter().rev().filter(|s| s.visible).find_map(|s| {
                let position = render::shown_position(viewports, s.id, s.position);
                let scene = geometry::scene_rects(s, position)
                    .into_iter()
                    .find(|(_, r)| r.contains(world))
                    .map(|(id, _)| Selection {
                        id,
                        kind: EntityKind::Scene,
                    });
                scene.or_else(|| {
                    geometry::sequence_rect(s, position)
                        .contains(world)
                        .then_some(Selection {
                            id: s.id,
                            kind: EntityKind::Sequence,
                        })
                })
            }),
            Tab::MoodBoard => {
                let mut items: Vec<_> = project.moodboard.iter().collect();
                items.sort_by_key(|i| std::cmp::Reverse(i.z_index));
                items
                    .into_iter()
                    .find(|i| geometry::item_rect(i, i.position).contains(world))
                    .map(|i| Selection {
                        id: i.id,
                        kind: EntityKind::MoodBoardItem,
                    })
            }
        }
    }

    pub(super) fn handle_canvas_input(
        &mut self,
        ctx: &egui::Context,
        rect: egui::Rect,
        response: &egui::Response,
    ) {
        let surface = self.tab.surface();
        let origin = rect.min;
        let local = |p: egui::Pos2| (p - origin).to_pos2();

        let (scroll, zoom_modifier, hover) =
            ctx.input(|i| (i.raw_scroll_delta, i.modifiers.command, i.pointer.hover_pos()));
        if scroll != egui::Vec2::ZERO {
            if let Some(hover) = hover.filter(|h| rect.contains(*h)) {
                self.store
                    .viewports_mut()
                    .wheel(surface, scroll, local(hover), zoom_modifier);
            }
        }

        let pointer = response.interact_pointer_pos().map(local);
        let t = self.store.viewports().transform(surface);

        if response.clicked() {
            let hit = pointer.and_then(|p| self.hit_test(t.screen_to_world(p)));
            self.store.viewports_mut().select(surface, hit);
        }

        if response.drag_started() {
            self.drag_travel = egui::Vec2::ZERO;
            let hit = pointer.and_then(|p| self.hit_test(t.screen_to_world(p)));
            match hit {
                Some(target) if target.kind != EntityKind::Scene => {
                    self.store.viewports_mut().select(surface, Some(target));
                    let started = self.store.begin_drag(surface, target);
                    self.report(started);
                }
                Some(target) => self.store.viewports_mut().select(surface, Some(target)),
                None => {
                    if let Some(p) = pointer {
                        self.store.viewports_mut().begin_pan(surface, p);
                    }
                }
            }
        }

        if response.dragged() {
            if self.store.viewports().drag().is_some() {
                self.drag_travel += response.drag_delta();
                self.store.drag_to(self.drag_travel);
            } else if let Some(p) = pointer {
                self.store.viewports_mut().pan_to(p);
            }
        }

        if response.drag_stopped() {
            self.store.viewports_mut().end_pan();
            let committed = self.runtime.block_on(self.store.end_drag());
            self.report(committed);
            self.drag_travel = egui::Vec2::ZERO;
        }
    }

    pub(super) fn handle_shortcuts(&mut self, ctx: &egui::Context, canvas: egui::Rect) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let redo = ctx.input_mut(|i| {
            i.consume_key(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::Z)
                || i.consume_key(egui::Modifiers::COMMAND, egui::Key::Y)
        });
        if redo {
            self.redo();
        } else if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Z)) {
            self.undo();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Escape)) {
            self.store.cancel_drag();
        }
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Delete)) {
            self.delete_selection();
        }

        if self.tab != Tab::MoodBoard {
            return;
        }
        let copy = ctx.input(|i| i.events.iter().any(|e| matches!(e, egui::Event::Copy)));
        if copy {
            if let Some(selection) = self.store.viewports().selection(self.tab.surface()) {
                let copied = self.store.copy_moodboard_item(selection.id);
                if let Some(text) = self.report(copied) {
                    ctx.copy_text(text);
                }
            }
        }
        let pasted = ctx.input(|i| {
            i.events.iter().find_map(|e| match e {
                egui::Event::Paste(text) => Some(text.clone()),
                _ => None,
            })
        });
        if let Some(text) = pasted {
            let at = self.view_center(canvas);
            let result = self.runtime.block_on(self.store.paste(Some(text.as_str()), None, at));
            if let Some(None) = self.report(result) {
                self.status = Some("Nothing to paste".to_string());
            }
        }
    }

    pub(super) fn delete_selection(&mut self) {
        let Some(selection) = self.store.viewports().selection(self.tab.surface()) else {
            return;
        };
        let deleted = match selection.kind {
            EntityKind::Sequence => self.runtime.block_on(self.store.delete_sequence(selection.id)),
            EntityKind::Scene => self.runtime.block_on(self.store.delete_scene(selection.id)),
            EntityKind::MoodBoardItem => self
                .runtime
                .block_on(self.store.delete_moodboard_item(selection.id)),
            _ => Ok(()),
        };
        self.report(deleted);
    }

    /// Adds an image from disk to the moodboard at the view center.
    pub(super) fn add_image_from_file(&mut self, canvas: egui::Rect) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.status = Some(format!("Couldn't read {}: {e}", path.display()));
                return;
            }
        };
        let at: Point = self.view_center(canvas);
        let result = self.runtime.block_on(self.store.paste(None, Some(bytes.as_slice()), at));
        if let Some(None) = self.report(result) {
            self.status = Some(format!("{} is not a supported image", path.display()));
        }
    }
}
