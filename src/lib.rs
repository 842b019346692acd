//! # inpaint-tools
//!
//! Canvas engine for mask-based photo editing with a remote inpainting
//! service.
//!
//! ## Features
//!
//! - **Session**: one image, a painted mask, pan/zoom and a bounded undo log
//! - **Review cycle**: generated results are proposed, compared, then
//!   committed or discarded
//! - **Export**: pixel-aligned image + mask PNGs for the generation service
//! - **Generation client**: blocking HTTP client and a background runner
//!
//! ## Example
//!
//! ```rust,ignore
//! use inpaint_tools::{EditorConfig, Session, geometry::Point};
//!
//! let mut session = Session::new(EditorConfig::default());
//! session.load_image_file("photo.jpg")?;
//! session.add_mask_stroke(vec![Point::new(40.0, 40.0), Point::new(120.0, 60.0)], None);
//! let data = session.get_export_data().unwrap();
//! std::fs::write("mask.png", &data.mask.png)?;
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod generation;
pub mod geometry;
pub mod gesture;
pub mod history;
pub mod mode;
pub mod scene;
pub mod session;
pub mod viewport;

// Re-export commonly used items
pub use config::EditorConfig;
pub use error::{EditorError, GenerationError};
pub use export::{ExportData, Rasterizer, SkiaRasterizer};
pub use generation::{
    GenerateRequest, GenerationService, HttpGenerationService, PendingGeneration, spawn_generation,
};
pub use history::{History, HistoryState, MAX_HISTORY_SIZE};
pub use mode::{InteractionMode, MaskMode, Tool};
pub use session::{Liveness, ReviewState, Session, Surface};
pub use viewport::ViewportTransform;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global log subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
