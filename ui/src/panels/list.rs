use playermap::{Player, format_distance, format_price};

use crate::app::PlayermapApp;

const ONLINE: egui::Color32 = egui::Color32::from_rgb(16, 185, 129);
const OFFLINE: egui::Color32 = egui::Color32::from_rgb(107, 114, 128);

pub(crate) const EMPTY_LIST_TEXT: &str = "No players found nearby";

/// Second line of a list row: "Game · 3.2km away".
pub(crate) fn summary_line(player: &Player) -> String {
    format!("{} · {} away", player.game, format_distance(player.distance))
}

impl PlayermapApp {
    /// Player list. Returns a contact handle whose copy button was pressed.
    pub(crate) fn render_player_list(&self, ui: &mut egui::Ui, now: f64) -> Option<String> {
        let mut copy = None;
        ui.heading(format!("Nearby Players ({})", self.filtered.len()));
        ui.separator();

        if self.filtered.is_empty() {
            ui.add_space(24.0);
            ui.vertical_centered(|ui| {
                ui.label(egui::RichText::new(EMPTY_LIST_TEXT).color(OFFLINE));
            });
            return None;
        }

        egui::ScrollArea::vertical()
            .auto_shrink(false)
            .show(ui, |ui| {
                for player in &self.filtered {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        ui.set_width(ui.available_width());
                        if let Some(handle) = self.render_player_row(ui, player, now) {
                            copy = Some(handle);
                        }
                    });
                    ui.add_space(4.0);
                }
            });
        copy
    }

    fn render_player_row(&self, ui: &mut egui::Ui, player: &Player, now: f64) -> Option<String> {
        let mut copy = None;
        ui.horizontal(|ui| {
            let color = if player.is_online { ONLINE } else { OFFLINE };
            let (dot, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
            ui.painter().circle_filled(dot.center(), 5.0, color);
            ui.strong(&player.name);
            if let Some(level) = player.level {
                ui.label(egui::RichText::new(format!("Lv {level}")).small().color(OFFLINE));
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(egui::RichText::new(&player.last_seen).small().color(OFFLINE));
            });
        });
        ui.label(summary_line(player));

        if player.has_listings() {
            ui.add_space(2.0);
            let heading = format!("🎮 {} for sale", player.listings.len());
            ui.label(egui::RichText::new(heading).small());
            for listing in &player.listings {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(&listing.name).small());
                    ui.label(
                        egui::RichText::new(format_price(listing.price))
                            .small()
                            .strong(),
                    );
                    ui.label(
                        egui::RichText::new(format!("{} · {}", listing.condition, listing.platform))
                            .small()
                            .color(OFFLINE),
                    );
                });
            }
            if let Some(contact) = &player.contact {
                ui.horizontal(|ui| {
                    ui.monospace(contact);
                    if ui
                        .small_button(self.copy_feedback.label(contact, now))
                        .clicked()
                    {
                        copy = Some(contact.clone());
                    }
                });
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playermap::Coordinate;

    #[test]
    fn summary_uses_formatted_distance() {
        let player = Player {
            id: "3".into(),
            name: "user3".into(),
            game: "Valorant".into(),
            location: Coordinate::DEFAULT_ORIGIN,
            distance: 0.85,
            is_online: true,
            last_seen: "2 minutes ago".into(),
            level: Some(12),
            achievements: Vec::new(),
            listings: Vec::new(),
            contact: None,
        };
        assert_eq!(summary_line(&player), "Valorant · 850m away");
    }
}
