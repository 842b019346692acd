mod app;
mod canvas;

use app::InpaintApp;
use inpaint_tools::EditorConfig;

fn main() -> eframe::Result<()> {
    inpaint_tools::init_logging("inpaint_tools=info");

    let config = EditorConfig::resolve(None).unwrap_or_else(|e| {
        tracing::warn!("{}; using default settings", e);
        EditorConfig::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Inpaint Editor",
        options,
        Box::new(|cc| Ok(Box::new(InpaintApp::new(cc, config)))),
    )
}
