use eframe::egui;

/// Onboarding dialog shown until a nickname is saved. Returns the submitted
/// name.
pub fn render(ctx: &egui::Context, nickname_input: &mut String) -> Option<String> {
    let mut submitted = None;

    egui::Window::new("Choose a nickname")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.label("Pick a short name other people will see in their sidebar.");
            let response = ui.text_edit_singleline(nickname_input);
            let mut save = ui.button("Save").clicked();
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                save = true;
            }
            if save && !nickname_input.trim().is_empty() {
                submitted = Some(nickname_input.trim().to_string());
            }
        });

    submitted
}
