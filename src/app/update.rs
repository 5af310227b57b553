use super::{StoryboardApp, Tab, render};
use eframe::egui;
use storyframe::graph::{self, MarkerEdge, RenderNode, Step};
use storyframe::model::{EntityId, EntityKind, NodeKind, Selection};
use storyframe::patch::MoodBoardPatch;

impl StoryboardApp {
    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let current = self
                .store
                .active_project()
                .map_or_else(|| "No project".to_string(), |p| p.name.clone());
            let mut chosen = None;
            egui::ComboBox::from_id_salt("project")
                .selected_text(current)
                .show_ui(ui, |ui| {
                    for project in self.store.projects() {
                        let active = Some(project.id) == self.store.active_project_id();
                        if ui.selectable_label(active, &project.name).clicked() {
                            chosen = Some(project.id);
                        }
                    }
                });
            if let Some(id) = chosen {
                self.switch_project(id);
            }
            ui.add(egui::TextEdit::singleline(&mut self.new_project_name).hint_text("New project"));
            if ui.button("Create").clicked() {
                let name = std::mem::take(&mut self.new_project_name);
                let created = self.runtime.block_on(self.store.create_project(&name));
                if self.report(created).is_some() {
                    self.restore_moodboard_view();
                }
            }
            if let Some(id) = self.active_project_id() {
                if ui.button("Delete project").clicked() {
                    let deleted = self.runtime.block_on(self.store.delete_project(id));
                    if self.report(deleted).is_some() {
                        if let Some(view_state) = self.view_state.as_mut() {
                            view_state.forget_project(id);
                        }
                        self.restore_moodboard_view();
                    }
                }
            }
            ui.separator();
            ui.selectable_value(&mut self.tab, Tab::Canvas, "Canvas");
            ui.selectable_value(&mut self.tab, Tab::MoodBoard, "Moodboard");
            ui.separator();
            if ui
                .add_enabled(self.store.can_undo(), egui::Button::new("Undo"))
                .on_hover_text(self.store.history().undo_label().unwrap_or(""))
                .clicked()
            {
                self.undo();
            }
            if ui
                .add_enabled(self.store.can_redo(), egui::Button::new("Redo"))
                .on_hover_text(self.store.history().redo_label().unwrap_or(""))
                .clicked()
            {
                self.redo();
            }
            ui.separator();
            let surface = self.tab.surface();
            let anchor = (self.canvas.center() - self.canvas.min).to_pos2();
            if ui.button("−").clicked() {
                self.store.viewports_mut().zoom_out(surface, anchor);
            }
            if ui.button("100%").clicked() {
                self.store.viewports_mut().set_zoom(surface, 1.0, anchor);
            }
            if ui.button("+").clicked() {
                self.store.viewports_mut().zoom_in(surface, anchor);
            }
        });
    }

    fn canvas_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Sequences");
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.new_sequence_title).hint_text("Title"));
            if ui.button("Add").clicked() {
                let title = std::mem::take(&mut self.new_sequence_title);
                let at = self.view_center(self.canvas);
                let created = self.runtime.block_on(self.store.create_sequence(&title, at));
                self.report(created);
            }
        });

        ui.add(egui::TextEdit::singleline(&mut self.query).hint_text("Search scenes"));
        let hits = self.store.search(&self.query);
        for hit in hits.into_iter().take(8) {
            let kind = match hit.kind {
                NodeKind::Sequence => EntityKind::Sequence,
                NodeKind::Scene => EntityKind::Scene,
            };
            if ui.link(&hit.title).clicked() {
                self.store.viewports_mut().select(
                    self.tab.surface(),
                    Some(Selection { id: hit.id, kind }),
                );
            }
        }
        ui.separator();

        let Some(selection) = self.store.viewports().selection(self.tab.surface()) else {
            ui.label("Select a sequence or scene.");
            return;
        };
        let sequence_id = match selection.kind {
            EntityKind::Sequence => Some(selection.id),
            EntityKind::Scene => self.store.active_project().and_then(|p| {
                p.locate_scene(selection.id)
                    .map(|(si, _)| p.sequences[si].id)
            }),
            _ => None,
        };
        let Some(sequence_id) = sequence_id else {
            return;
        };
        self.sequence_details(ui, sequence_id, selection.id);
    }

    fn sequence_details(&mut self, ui: &mut egui::Ui, sequence_id: EntityId, selected: EntityId) {
        let Some(sequence) = self
            .store
            .active_project()
            .and_then(|p| p.sequence(sequence_id))
            .cloned()
        else {
            return;
        };
        ui.strong(&sequence.title);
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut self.new_scene_title).hint_text("Scene title"));
            if ui.button("Add scene").clicked() {
                let title = std::mem::take(&mut self.new_scene_title);
                let created = self
                    .runtime
                    .block_on(self.store.create_scene(sequence_id, &title, None));
                self.report(created);
            }
        });
        if selected != sequence_id && ui.button("Add sub-scene").clicked() {
            let title = std::mem::take(&mut self.new_scene_title);
            let created = self
                .runtime
                .block_on(self.store.create_scene(sequence_id, &title, Some(selected)));
            self.report(created);
        }
        if ui.button("Add marker").clicked() {
            let label = format!("Beat {}", sequence.markers.len() + 1);
            let created = self
                .runtime
                .block_on(self.store.create_marker(sequence_id, &label));
            self.report(created);
        }

        ui.separator();
        let mut action = None;
        for node in graph::render_order(&sequence) {
            let RenderNode::Group { marker, .. } = node else {
                continue;
            };
            ui.horizontal(|ui| {
                ui.colored_label(marker.color.to_color32(), &marker.label);
                for (text, edge, step) in [
                    ("⏴[", MarkerEdge::Start, Step::Backward),
                    ("[⏵", MarkerEdge::Start, Step::Forward),
                    ("⏴]", MarkerEdge::End, Step::Backward),
                    ("]⏵", MarkerEdge::End, Step::Forward),
                ] {
                    if ui.small_button(text).clicked() {
                        action = Some((marker.id, Some((edge, step))));
                    }
                }
                if ui.small_button("✕").clicked() {
                    action = Some((marker.id, None));
                }
            });
        }
        match action {
            Some((marker_id, Some((edge, step)))) => {
                let moved = self.runtime.block_on(
                    self.store
                        .update_marker_range(sequence_id, marker_id, edge, step),
                );
                self.report(moved);
            }
            Some((marker_id, None)) => {
                let deleted = self
                    .runtime
                    .block_on(self.store.delete_marker(sequence_id, marker_id));
                self.report(deleted);
            }
            None => {}
        }
    }

    fn moodboard_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Moodboard");
        ui.add(egui::TextEdit::multiline(&mut self.note_text).hint_text("Note"));
        if ui.button("Add note").clicked() {
            let text = std::mem::take(&mut self.note_text);
            let at = self.view_center(self.canvas);
            let created = self.runtime.block_on(self.store.create_note(&text, at));
            self.report(created);
        }
        if ui.button("Add image…").clicked() {
            self.add_image_from_file(self.canvas);
        }
        let Some(selection) = self.store.viewports().selection(self.tab.surface()) else {
            return;
        };
        ui.separator();
        if ui.button("Bring to front").clicked() {
            let raised = self.runtime.block_on(self.store.bring_to_front(selection.id));
            self.report(raised);
        }
        if ui.button("Rotate 15°").clicked() {
            let rotation = self
                .store
                .active_project()
                .and_then(|p| p.moodboard_item(selection.id))
                .and_then(|i| i.rotation)
                .unwrap_or(0.0);
            let patch = MoodBoardPatch {
                rotation: Some(Some((rotation + 15.0) % 360.0)),
                ..MoodBoardPatch::default()
            };
            let rotated = self
                .runtime
                .block_on(self.store.update_moodboard_item(selection.id, patch));
            self.report(rotated);
        }
        if ui.button("Delete").clicked() {
            self.delete_selection();
        }
    }
}

impl eframe::App for StoryboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.save_view_state();
        }
        self.handle_shortcuts(ctx, self.canvas);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.top_bar(ui));

        let details = egui::SidePanel::right("details")
            .default_width(self.prefs.sidebar_width)
            .show(ctx, |ui| match self.tab {
                Tab::Canvas => self.canvas_panel(ui),
                Tab::MoodBoard => self.moodboard_panel(ui),
            });
        self.prefs.sidebar_width = details.response.rect.width();

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match &self.status {
                    Some(status) => ui.label(status),
                    None => ui.label("Ready"),
                };
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let zoom = self.store.viewports().transform(self.tab.surface()).zoom;
                    ui.label(format!("Zoom: {:.0}%", zoom * 100.0));
                    if let Some(project) = self.store.active_project() {
                        ui.separator();
                        ui.label(format!("Sequences: {}", project.sequences.len()));
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (rect, response) =
                ui.allocate_exact_size(ui.available_size(), egui::Sense::click_and_drag());
            self.canvas = rect;
            self.handle_canvas_input(ctx, rect, &response);

            let painter = ui.painter_at(rect);
            let surface = self.tab.surface();
            let t = self.store.viewports().transform(surface);
            let selected = self.store.viewports().selection(surface).map(|s| s.id);
            let Some(project) = self.store.active_project() else {
                painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
                return;
            };
            let viewports = self.store.viewports();
            match self.tab {
                Tab::Canvas => {
                    render::draw_background(&painter, rect, &t, project.background);
                    let connectors = self.prefs.connector_style;
                    render::draw_project(
                        &painter, rect.min, project, viewports, &t, selected, connectors,
                    );
                    render::draw_guides(&painter, rect, rect.min, &t, viewports.guides());
                }
                Tab::MoodBoard => {
                    render::draw_background(&painter, rect, &t, self.prefs.grid_style);
                    render::draw_moodboard(&painter, rect.min, project, viewports, &t, selected);
                }
            }
            if project.sequences.is_empty() && self.tab == Tab::Canvas {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Add a sequence to get started",
                    egui::FontId::proportional(16.0),
                    egui::Color32::GRAY,
                );
            }
        });
    }
}
