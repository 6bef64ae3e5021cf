use eframe::egui;

#[derive(Default)]
pub struct InputActions {
    pub submitted: Option<String>,
    /// Set on empty/non-empty transitions of the buffer: `Some(true)` when
    /// composition starts, `Some(false)` when the buffer is cleared out.
    pub typing_transition: Option<bool>,
}

pub fn render(ui: &mut egui::Ui, input_text: &mut String, enabled: bool) -> InputActions {
    let mut actions = InputActions::default();
    let was_empty = input_text.is_empty();
    let mut send = false;

    ui.horizontal(|ui| {
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
                send = true;
            }

            let edit = egui::TextEdit::singleline(input_text)
                .hint_text("Type a message...")
                .desired_width(ui.available_width());
            let response = ui.add_enabled(enabled, edit);

            if response.changed() {
                let now_empty = input_text.is_empty();
                if was_empty != now_empty {
                    actions.typing_transition = Some(!now_empty);
                }
            }
            if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send = true;
            }
        });
    });

    if send && !input_text.trim().is_empty() {
        let message = input_text.clone();
        input_text.clear();
        actions.submitted = Some(message);
    }

    actions
}
