use eframe::egui;

use crate::ui::state::AppState;

pub fn render(ui: &mut egui::Ui, state: &AppState) {
    let title = state.conversation_title();
    match &title {
        Some(name) => ui.heading(name),
        None => ui.heading("Select a correspondent"),
    };
    ui.separator();

    egui::ScrollArea::vertical()
        .auto_shrink(false)
        .stick_to_bottom(true)
        .show(ui, |ui| {
            if state.messages.is_empty() && !state.typing {
                let prompt = match &title {
                    Some(name) => format!("Say hi to {name}!"),
                    None => "Pick someone from the sidebar to start chatting.".to_string(),
                };
                ui.vertical_centered(|ui| {
                    ui.add_space(40.0);
                    ui.label(egui::RichText::new(prompt).weak());
                });
                return;
            }

            for message in &state.messages {
                let mine = state.my_id.as_deref() == Some(message.sender_id.as_str());
                ui.horizontal(|ui| {
                    if mine {
                        // Own messages hug the right edge.
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(egui::RichText::new(&message.text).strong());
                        });
                    } else {
                        ui.label(&message.text);
                    }
                });
            }

            if state.typing {
                let name = title.as_deref().unwrap_or("Correspondent");
                ui.label(
                    egui::RichText::new(format!("{name} is typing..."))
                        .weak()
                        .italics(),
                );
            }
        });
}
