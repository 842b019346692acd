use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use eframe::egui;
use inpaint_tools::generation::{GenerationService, HttpGenerationService};
use inpaint_tools::{
    EditorConfig, GenerationError, HistoryState, MaskMode, PendingGeneration, ReviewState,
    Session, Surface, Tool, spawn_generation,
};

use super::canvas::{CanvasView, render_canvas};

pub struct InpaintApp {
    surface: Surface,
    canvas: CanvasView,
    service: Option<Arc<dyn GenerationService>>,
    pending: Option<PendingGeneration>,
    history_state: Rc<Cell<HistoryState>>,
    prompt: String,
    comparing: bool,
    status_message: String,
}

impl InpaintApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: EditorConfig) -> Self {
        let service: Option<Arc<dyn GenerationService>> =
            match HttpGenerationService::from_config(&config) {
                Ok(service) => Some(Arc::new(service)),
                Err(e) => {
                    tracing::warn!("Generation disabled: {}", e);
                    None
                }
            };

        let history_state = Rc::new(Cell::new(HistoryState::default()));
        let mut surface = Surface::new();
        surface.mount(config);
        let observed = Rc::clone(&history_state);
        surface.with_session(|s| s.set_history_observer(move |state| observed.set(state)));

        Self {
            surface,
            canvas: CanvasView::new(),
            service,
            pending: None,
            history_state,
            prompt: String::new(),
            comparing: false,
            status_message: String::from("Ready - Open an image to begin"),
        }
    }

    fn open_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg"])
            .pick_file()
        else {
            return;
        };
        let result = self.surface.with_session(|s| s.load_image_file(&path));
        self.status_message = match result {
            Some(Ok(())) => format!("Loaded: {}", path.display()),
            Some(Err(e)) => format!("Error loading file: {}", e),
            None => return,
        };
    }

    fn save_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("inpaint.png")
            .save_file()
        else {
            return;
        };
        let result = self.surface.with_session(|s| s.download_to(&path));
        self.status_message = match result {
            Some(Ok(())) => format!("Saved: {}", path.display()),
            Some(Err(e)) => format!("Error saving file: {}", e),
            None => return,
        };
    }

    fn generate(&mut self) {
        let Some(service) = self.service.clone() else {
            self.status_message = "Generation service is not configured".to_string();
            return;
        };
        let prompt = self.prompt.clone();
        let Some(prepared) = self.surface.with_session(|s| {
            if !s.has_image() {
                return Err(GenerationError::Failed("Add an image first!".into()));
            }
            s.build_generate_request(&prompt).map(|req| (req, s.liveness()))
        }) else {
            return;
        };

        match prepared {
            Ok((request, liveness)) => {
                self.pending = Some(spawn_generation(service, request, liveness));
                self.status_message = "Generating...".to_string();
            }
            Err(GenerationError::EmptyPrompt) => {
                self.status_message = "Enter a prompt first".to_string();
            }
            Err(e) => self.status_message = e.to_string(),
        }
    }

    fn poll_generation(&mut self, ctx: &egui::Context) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        match pending.poll() {
            Some(outcome) => {
                self.pending = None;
                let applied = self.surface.with_session(|s| s.apply_generation(outcome));
                self.status_message = match applied {
                    Some(Ok(())) => "Review the result: hold Compare, then Accept or Discard".into(),
                    Some(Err(e)) => format!("Generation failed: {}", e),
                    None => return,
                };
            }
            None if pending.is_finished() => self.pending = None,
            None => ctx.request_repaint_after(std::time::Duration::from_millis(100)),
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        let history = self.history_state.get();
        ui.horizontal(|ui| {
            if ui.button("Open Image").clicked() {
                self.open_file();
            }
            if ui.button("Download").clicked() {
                self.save_file();
            }

            ui.separator();

            if ui
                .add_enabled(history.can_undo, egui::Button::new("↶ Undo"))
                .on_hover_text("Ctrl+Z")
                .clicked()
            {
                self.surface.with_session(Session::undo);
            }
            if ui
                .add_enabled(history.can_redo, egui::Button::new("↷ Redo"))
                .on_hover_text("Ctrl+Y or Ctrl+Shift+Z")
                .clicked()
            {
                self.surface.with_session(Session::redo);
            }

            ui.separator();

            let Some(session) = self.surface.session_mut() else {
                return;
            };

            ui.label("Tool:");
            for (tool, label) in [(Tool::Select, "Select"), (Tool::Brush, "Brush"), (Tool::Pan, "Pan")] {
                if ui.selectable_label(session.tool() == tool, label).clicked() {
                    session.set_tool(tool);
                }
            }

            if session.tool() == Tool::Brush {
                ui.separator();
                for (mode, label) in [(MaskMode::Paint, "Paint"), (MaskMode::Erase, "Erase")] {
                    if ui
                        .selectable_label(session.mask_mode() == mode, label)
                        .clicked()
                    {
                        session.set_mask_mode(mode);
                    }
                }
            }

            if ui.button("Clear Mask").clicked() {
                session.clear_mask();
            }

            ui.separator();

            ui.label(format!("Zoom: {:.0}%", session.viewport().zoom * 100.0));
            if ui.button("Fit").clicked() {
                session.fit_to_container();
            }
        });
    }

    fn render_prompt_bar(&mut self, ui: &mut egui::Ui) {
        let review = self
            .surface
            .session()
            .map_or(ReviewState::Idle, Session::review_state);

        ui.horizontal(|ui| match review {
            ReviewState::Idle => {
                ui.label("Prompt:");
                let edit = ui.add(
                    egui::TextEdit::singleline(&mut self.prompt)
                        .hint_text("Describe what should fill the mask")
                        .desired_width(ui.available_width() - 120.0),
                );
                let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let busy = self.pending.is_some();
                if (ui
                    .add_enabled(!busy, egui::Button::new(if busy { "Generating..." } else { "Generate" }))
                    .clicked()
                    || submitted)
                    && !busy
                {
                    self.generate();
                }
            }
            ReviewState::Proposed => {
                let compare = ui.button("Hold to Compare");
                let held = compare.is_pointer_button_down_on();
                if held != self.comparing {
                    self.comparing = held;
                    self.surface.with_session(|s| s.toggle_compare(held));
                }
                if ui.button("Discard").clicked() {
                    self.comparing = false;
                    self.surface.with_session(Session::discard_result);
                    self.status_message = "Result discarded".to_string();
                }
                if ui.button("Accept").clicked() {
                    self.comparing = false;
                    self.surface.with_session(Session::commit_result);
                    self.status_message = "Result accepted".to_string();
                }
            }
        });
    }
}

impl eframe::App for InpaintApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut do_undo = false;
        let mut do_redo = false;

        ctx.input(|i| {
            if i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift {
                do_undo = true;
            }
            if i.key_pressed(egui::Key::Y) && i.modifiers.command {
                do_redo = true;
            }
            if i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift {
                do_redo = true;
            }
        });

        if do_undo {
            self.surface.with_session(Session::undo);
        }
        if do_redo {
            self.surface.with_session(Session::redo);
        }

        self.poll_generation(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.render_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_message);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(img) = self.surface.session().and_then(|s| s.scene().base_image()) {
                        ui.label(format!("Image: {} x {}", img.width, img.height));
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("prompt").show(ctx, |ui| {
            self.render_prompt_bar(ui);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                if let Some(session) = self.surface.session_mut() {
                    render_canvas(ui, session, &mut self.canvas);
                }
            });

        if self.surface.session().is_some_and(|s| s.stroke_in_progress().is_some()) {
            ctx.request_repaint();
        }
    }
}
