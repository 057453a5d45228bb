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

use crate::gesture::GestureReadout;

/// Button pressed in the pane this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneAction {
    Connect,
    Disconnect,
}

pub struct GesturePane {
    pub visible: bool,
}

impl GesturePane {
    pub fn new() -> Self {
        Self { visible: true }
    }

    /// Render the gesture debug pane as a floating window
    pub fn render(
        &mut self,
        ctx: &egui::Context,
        readout: &GestureReadout,
        endpoint: &str,
        connected: bool,
    ) -> Option<PaneAction> {
        let mut action = None;

        if !self.visible {
            egui::Window::new("show_gestures")
                .title_bar(false)
                .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
                .resizable(false)
                .frame(Self::frame(ctx, 200))
                .show(ctx, |ui| {
                    if ui.button(egui::RichText::new("✋ Show Gestures")
                        .color(egui::Color32::from_rgb(150, 200, 220))
                        .size(11.0))
                        .clicked() {
                        self.visible = true;
                    }
                });
            return None;
        }

        egui::Window::new("Gesture Link")
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-10.0, 10.0))
            .fixed_size(egui::vec2(300.0, 220.0))
            .resizable(false)
            .collapsible(false)
            .title_bar(false)
            .frame(Self::frame(ctx, 230))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("◈ GESTURES")
                        .color(egui::Color32::from_rgb(100, 180, 220))
                        .size(12.0)
                        .strong());

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button(egui::RichText::new("✕")
                            .size(12.0)
                            .color(egui::Color32::from_rgb(200, 100, 100)))
                            .on_hover_text("Hide gesture pane")
                            .clicked() {
                            self.visible = false;
                        }
                    });
                });

                ui.separator();

                egui::Grid::new("gesture_link_grid")
                    .num_columns(2)
                    .spacing([12.0, 4.0])
                    .show(ui, |ui| {
                        ui.label(Self::caption("Backend"));
                        ui.label(egui::RichText::new(endpoint).monospace().size(11.0));
                        ui.end_row();

                        ui.label(Self::caption("Status"));
                        ui.label(egui::RichText::new(&readout.connection_status)
                            .color(status_color(&readout.connection_status))
                            .size(11.0));
                        ui.end_row();

                        ui.label(Self::caption("Gesture"));
                        ui.label(egui::RichText::new(&readout.last_gesture)
                            .color(egui::Color32::WHITE)
                            .size(16.0)
                            .strong());
                        ui.end_row();

                        ui.label(Self::caption("Confidence"));
                        #[allow(clippy::cast_possible_truncation, reason = "display only")]
                        let fraction = readout.confidence.clamp(0.0, 1.0) as f32;
                        ui.add(egui::ProgressBar::new(fraction)
                            .desired_width(160.0)
                            .text(format!("{:.2}", readout.confidence)));
                        ui.end_row();

                        ui.label(Self::caption("Messages"));
                        let age = readout
                            .seconds_since_last_message()
                            .map_or_else(|| "never".to_string(), |secs| format!("{secs}s ago"));
                        ui.label(egui::RichText::new(format!(
                            "{} ({} invalid), last {}",
                            readout.message_count, readout.invalid_count, age
                        ))
                        .size(11.0));
                        ui.end_row();
                    });

                ui.add_space(6.0);

                ui.horizontal(|ui| {
                    if ui.add_enabled(!connected, egui::Button::new("Connect")).clicked() {
                        action = Some(PaneAction::Connect);
                    }
                    if ui.add_enabled(connected, egui::Button::new("Disconnect")).clicked() {
                        action = Some(PaneAction::Disconnect);
                    }
                });
            });

        action
    }

    fn frame(ctx: &egui::Context, alpha: u8) -> egui::Frame {
        egui::Frame::window(&ctx.style())
            .fill(egui::Color32::from_rgba_unmultiplied(25, 30, 35, alpha))
            .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(60, 80, 100)))
            .corner_radius(6.0)
    }

    fn caption(text: &str) -> egui::RichText {
        egui::RichText::new(text)
            .color(egui::Color32::from_rgb(150, 160, 170))
            .size(11.0)
    }
}

fn status_color(status: &str) -> egui::Color32 {
    if status == "Connected" {
        egui::Color32::from_rgb(100, 220, 100)
    } else if status.starts_with("Error") || status.starts_with("Receive error") {
        egui::Color32::from_rgb(220, 100, 100)
    } else if status.starts_with("Connecting") {
        egui::Color32::from_rgb(220, 200, 100)
    } else {
        egui::Color32::from_rgb(150, 150, 150)
    }
}
