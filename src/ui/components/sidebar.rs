use eframe::egui;

use crate::ui::state::AppState;

#[derive(Default)]
pub struct SidebarActions {
    pub selected: Option<String>,
    pub refresh: bool,
    pub toggle_theme: bool,
}

pub fn render(ui: &mut egui::Ui, state: &AppState) -> SidebarActions {
    let mut actions = SidebarActions::default();

    ui.horizontal(|ui| {
        ui.heading("Chats");
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button(state.theme.toggle_label()).clicked() {
                actions.toggle_theme = true;
            }
        });
    });
    ui.separator();

    match (&state.nickname, &state.auth_error) {
        (Some(nickname), _) => {
            ui.label(format!("My nickname: {nickname}"));
        }
        (None, Some(reason)) => {
            ui.colored_label(egui::Color32::RED, "Offline (sign-in failed)");
            ui.label(egui::RichText::new(reason.clone()).weak().small());
        }
        (None, None) => {
            ui.label("Loading...");
        }
    }
    ui.separator();

    let onboarded = state.onboarded();
    ui.horizontal(|ui| {
        ui.label("Correspondents:");
        if ui
            .add_enabled(onboarded, egui::Button::new("Refresh").small())
            .clicked()
        {
            actions.refresh = true;
        }
    });

    if state.roster.is_empty() {
        ui.label(egui::RichText::new("Nobody yet").weak());
        return actions;
    }

    for entry in &state.roster {
        let selected = state.selected.as_deref() == Some(entry.user_id.as_str());
        if onboarded {
            if ui.selectable_label(selected, &entry.nickname).clicked() && !selected {
                actions.selected = Some(entry.user_id.clone());
            }
        } else {
            // Inert until onboarding completes.
            ui.label(egui::RichText::new(&entry.nickname).weak());
        }
    }

    actions
}
