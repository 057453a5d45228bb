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

//! Desktop shell: owns the gesture link and feeds the gesture pane.

use std::time::Duration;

use gesture_link::GestureLink;
use log::info;
use tokio::runtime::Runtime;

use crate::config::AppConfig;
use crate::gesture::{GestureFeed, GestureReadout};
use crate::gesture_pane::{GesturePane, PaneAction};

pub struct DashboardApp {
    runtime: Runtime,
    link: GestureLink,
    endpoint: String,
    feed: GestureFeed,
    readout: GestureReadout,
    gesture_pane: GesturePane,
}

impl DashboardApp {
    pub fn new(config: &AppConfig, runtime: Runtime) -> Self {
        let link = GestureLink::new(config.link_config());
        let feed = GestureFeed::new(link.subscribe_status(), link.subscribe_messages());

        let app = Self {
            runtime,
            link,
            endpoint: config.backend_endpoint.clone(),
            feed,
            readout: GestureReadout::default(),
            gesture_pane: GesturePane::new(),
        };

        if config.auto_connect {
            app.connect();
        }

        app
    }

    fn connect(&self) {
        let link = self.link.clone();
        let endpoint = self.endpoint.clone();
        self.runtime.spawn(async move {
            link.connect(&endpoint).await;
        });
    }

    fn disconnect(&self) {
        let link = self.link.clone();
        self.runtime.spawn(async move {
            link.disconnect().await;
        });
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Request repaint periodically for real-time updates
        ctx.request_repaint_after(Duration::from_millis(100));

        self.feed.drain_into(&mut self.readout);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.centered_and_justified(|ui| {
                ui.label(egui::RichText::new(format!(
                    "{}  ·  {}",
                    self.readout.last_gesture, self.readout.connection_status
                ))
                .color(egui::Color32::from_rgb(90, 100, 110))
                .size(28.0));
            });
        });

        let connected = self.link.is_connected();
        match self.gesture_pane.render(ctx, &self.readout, &self.endpoint, connected) {
            Some(PaneAction::Connect) => self.connect(),
            Some(PaneAction::Disconnect) => self.disconnect(),
            None => {}
        }
    }
}

impl Drop for DashboardApp {
    fn drop(&mut self) {
        info!("Shutting down dashboard - closing gesture link");
        self.runtime.block_on(self.link.disconnect());
    }
}
