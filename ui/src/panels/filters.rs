use playermap::{DISTANCE_CHOICES_KM, GameFilter};

use crate::app::PlayermapApp;

fn distance_label(km: f64) -> String {
    format!("Within {km} km")
}

fn game_label(filter: &GameFilter) -> &str {
    match filter {
        GameFilter::All => "All Games",
        GameFilter::Exact(game) => game,
    }
}

impl PlayermapApp {
    /// Filter bar. Every edit takes effect on the next frame; the text
    /// field is not debounced.
    pub(crate) fn render_filter_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.criteria.search_term)
                    .hint_text("Search players, games, listings")
                    .desired_width(220.0),
            );

            egui::ComboBox::from_id_salt("filter_game")
                .selected_text(game_label(&self.criteria.selected_game).to_string())
                .show_ui(ui, |ui| {
                    ui.selectable_value(
                        &mut self.criteria.selected_game,
                        GameFilter::All,
                        game_label(&GameFilter::All),
                    );
                    for game in &self.games {
                        ui.selectable_value(
                            &mut self.criteria.selected_game,
                            GameFilter::Exact(game.clone()),
                            game,
                        );
                    }
                });

            egui::ComboBox::from_id_salt("filter_distance")
                .selected_text(distance_label(self.criteria.max_distance_km))
                .show_ui(ui, |ui| {
                    for &km in DISTANCE_CHOICES_KM {
                        ui.selectable_value(
                            &mut self.criteria.max_distance_km,
                            km,
                            distance_label(km),
                        );
                    }
                });

            ui.checkbox(&mut self.criteria.online_only, "Online only");
            ui.checkbox(&mut self.criteria.has_listings, "Selling games");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!(
                    "{} of {} players",
                    self.filtered.len(),
                    self.players.len()
                ));
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(distance_label(2.0), "Within 2 km");
        assert_eq!(distance_label(25.0), "Within 25 km");
        assert_eq!(game_label(&GameFilter::All), "All Games");
        assert_eq!(game_label(&GameFilter::Exact("FIFA 24".into())), "FIFA 24");
    }
}
