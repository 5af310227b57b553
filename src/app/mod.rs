use eframe::egui;
use std::sync::Arc;
use storyframe::model::{EntityId, Point};
use storyframe::persistence::MemoryPersistence;
use storyframe::settings::{self, ViewState, ViewStateStore};
use storyframe::viewport::Surface;
use storyframe::{ProjectStore, StoreConfig, StoreEvent, StoreResult};

mod geometry;
mod interaction;
mod render;
mod update;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tab {
    Canvas,
    MoodBoard,
}

impl Tab {
    fn surface(self) -> Surface {
        match self {
            Tab::Canvas => Surface::Main,
            Tab::MoodBoard => Surface::MoodBoard,
        }
    }
}

pub struct StoryboardApp {
    runtime: tokio::runtime::Runtime,
    store: ProjectStore,
    view_state: Option<ViewStateStore>,
    /// Display preferences read at startup; the sidebar width tracks the panel.
    prefs: ViewState,
    tab: Tab,
    status: Option<String>,
    /// Pointer travel since the current drag started, in screen units.
    drag_travel: egui::Vec2,
    /// Canvas area from the previous frame, for anchoring button zooms.
    canvas: egui::Rect,
    new_project_name: String,
    new_sequence_title: String,
    new_scene_title: String,
    note_text: String,
    query: String,
}

impl StoryboardApp {
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: tokio::runtime::Runtime) -> Self {
        let view_state = match ViewStateStore::load(settings::config_path()) {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable view state");
                None
            }
        };
        let prefs = view_state
            .as_ref()
            .map(|v| v.state().clone())
            .unwrap_or_default();
        apply_font_size(&cc.egui_ctx, prefs.font_size);
        let config = StoreConfig {
            snap_threshold: prefs.snap_threshold,
            default_aspect_ratio: prefs.default_aspect_ratio,
            ..StoreConfig::default()
        };
        let mut store = ProjectStore::new(Arc::new(MemoryPersistence::new()), config);
        let ctx = cc.egui_ctx.clone();
        store.subscribe(Box::new(move |_: &StoreEvent| ctx.request_repaint()));

        let mut app = Self {
            runtime,
            store,
            view_state,
            prefs,
            tab: Tab::Canvas,
            status: None,
            drag_travel: egui::Vec2::ZERO,
            canvas: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0)),
            new_project_name: String::new(),
            new_sequence_title: String::new(),
            new_scene_title: String::new(),
            note_text: String::new(),
            query: String::new(),
        };
        let loaded = app.runtime.block_on(app.store.load());
        app.report(loaded);
        if app.store.projects().is_empty() {
            let created = app.runtime.block_on(app.store.create_project("Untitled project"));
            app.report(created);
        }
        app.restore_moodboard_view();
        app
    }

    /// Surfaces errors and queued notices in the status bar.
    fn report<T>(&mut self, result: StoreResult<T>) -> Option<T> {
        let notices = self.store.take_notices();
        match result {
            Ok(value) => {
                if let Some(last) = notices.into_iter().last() {
                    self.status = Some(last);
                }
                Some(value)
            }
            Err(e) => {
                if !e.is_persistence() {
                    self.status = Some(e.to_string());
                } else {
                    self.status = notices.into_iter().last().or(Some(e.to_string()));
                }
                None
            }
        }
    }

    fn active_project_id(&self) -> Option<EntityId> {
        self.store.active_project_id()
    }

    fn restore_moodboard_view(&mut self) {
        let (Some(view_state), Some(project)) = (&self.view_state, self.active_project_id()) else {
            return;
        };
        if let Some(t) = view_state.moodboard_viewport(project) {
            let viewport = self.store.viewports_mut().viewport_mut(Surface::MoodBoard);
            viewport.transform = t;
        }
    }

    fn remember_moodboard_view(&mut self) {
        let Some(project) = self.active_project_id() else {
            return;
        };
        let t = self.store.viewports().transform(Surface::MoodBoard);
        if let Some(view_state) = self.view_state.as_mut() {
            view_state.set_moodboard_viewport(project, t);
        }
    }

    fn save_view_state(&mut self) {
        self.remember_moodboard_view();
        if let Some(view_state) = self.view_state.as_mut() {
            view_state.state_mut().sidebar_width = self.prefs.sidebar_width;
            if let Err(e) = view_state.save() {
                tracing::warn!(error = %e, "could not save view state");
            }
        }
    }

    fn switch_project(&mut self, id: EntityId) {
        self.remember_moodboard_view();
        let switched = self.store.switch_project(id);
        self.report(switched);
        self.restore_moodboard_view();
    }

    fn undo(&mut self) {
        let undone = self.runtime.block_on(self.store.undo());
        self.report(undone);
    }

    fn redo(&mut self) {
        let redone = self.runtime.block_on(self.store.redo());
        self.report(redone);
    }

    /// World point at the center of the visible canvas.
    fn view_center(&self, canvas: egui::Rect) -> Point {
        let t = self.store.viewports().transform(self.tab.surface());
        Point::from_pos2(t.screen_to_world((canvas.center() - canvas.min).to_pos2()))
    }
}

fn apply_font_size(ctx: &egui::Context, size: f32) {
    use egui::{FontId, TextStyle};
    ctx.style_mut(|style| {
        style.text_styles = [
            (TextStyle::Small, FontId::proportional(size * 0.75)),
            (TextStyle::Body, FontId::proportional(size)),
            (TextStyle::Button, FontId::proportional(size)),
            (TextStyle::Monospace, FontId::monospace(size)),
            (TextStyle::Heading, FontId::proportional(size * 1.4)),
        ]
        .into();
    });
}
