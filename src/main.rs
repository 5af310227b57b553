mod app;

use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storyframe=info")),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "Storyframe",
        native_options,
        Box::new(|cc| Ok(Box::new(app::StoryboardApp::new(cc, runtime)))),
    )?;
    Ok(())
}
