use crate::app::PlayermapApp;

impl PlayermapApp {
    /// Map area. Returns a contact handle whose copy button was pressed.
    pub(crate) fn render_map(&mut self, ui: &mut egui::Ui, now: f64) -> Option<String> {
        let Some(map) = self.map.surface_mut() else {
            ui.centered_and_justified(|ui| {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Finding your location…");
                });
            });
            return None;
        };
        let feedback = &self.copy_feedback;
        map.show(ui, |handle| feedback.label(handle, now)).copy
    }
}
