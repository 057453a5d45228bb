// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod app;
mod config;
mod gesture;
mod gesture_pane;
mod headless;

use clap::Parser;
use log::{info, warn};

use app::DashboardApp;
use config::AppConfig;

/// ZeroTouch dashboard with a live gesture feed
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Gesture backend endpoint (overrides the config file)
    #[arg(long)]
    endpoint: Option<String>,

    /// Connect to the backend at startup
    #[arg(long)]
    connect: bool,

    /// Run without a window and log gestures to the console
    #[arg(long)]
    headless: bool,

    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Starting ZeroTouch Dashboard...");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config ({}), using defaults", e);
        AppConfig::default()
    });
    if let Ok(path) = AppConfig::config_path() {
        info!("Config file: {}", path.display());
    }

    if let Some(endpoint) = args.endpoint {
        config.backend_endpoint = endpoint;
    }
    if args.connect {
        config.auto_connect = true;
    }
    if args.save_config {
        config.save()?;
        info!("Saved configuration");
    }

    let runtime = tokio::runtime::Runtime::new()?;

    if args.headless {
        headless::run(&config, &runtime);
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_title("ZeroTouch Dashboard"),
        ..Default::default()
    };

    eframe::run_native(
        "ZeroTouch Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(DashboardApp::new(&config, runtime)))),
    )?;

    Ok(())
}
