mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use anyhow::Context;
use app::AqiDashboardApp;
use eframe::egui;

use aqi_forecast::model::TrainerConfig;
use state::AppState;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = TrainerConfig::from_env().context("Failed to read trainer configuration")?;
    let mut state = AppState::new(config);
    if let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) {
        let result = state.open_path(&path);
        state.report(result);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "AQI Forecast",
        options,
        Box::new(move |_cc| Ok(Box::new(AqiDashboardApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
