use disview_render::config::DEFAULT_CONFIG_FILE;
use disview_render::Settings;

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let settings = match Settings::load_or_default(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path, e);
            std::process::exit(2);
        }
    };
    // validate() already rejected unknown levels
    let level = settings.log_level_filter().unwrap_or(log::LevelFilter::Info);

    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(level)
        .with_module_level("eframe", log::LevelFilter::Warn)
        .with_module_level("egui_glow", log::LevelFilter::Warn)
        .with_module_level("egui_winit", log::LevelFilter::Warn)
        .init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }

    log::info!("Disview starting with {}", config_path);

    let exit_code = disview_gui::run_gui(settings);

    log::info!("Application exited with code: {exit_code}");
    std::process::exit(exit_code);
}
