use eframe::egui;
use tokio::sync::mpsc;

use crate::common::{ClientCommand, ClientEvent};

use super::components::{
    chat_area, input_bar, nickname_modal,
    sidebar::{self, SidebarActions},
};
use super::state::AppState;

pub struct ChatApp {
    state: AppState,
    command_sender: mpsc::Sender<ClientCommand>,
    event_receiver: mpsc::Receiver<ClientEvent>,
}

impl ChatApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        command_sender: mpsc::Sender<ClientCommand>,
        event_receiver: mpsc::Receiver<ClientEvent>,
    ) -> Self {
        let state = AppState::new();
        state.theme.apply(&cc.egui_ctx);
        Self {
            state,
            command_sender,
            event_receiver,
        }
    }

    fn handle_client_events(&mut self) {
        while let Ok(event) = self.event_receiver.try_recv() {
            self.state.apply_event(event);
        }
    }

    fn send_command(&self, command: ClientCommand) {
        if let Err(err) = self.command_sender.try_send(command) {
            log::warn!("Failed to send command to client: {err}");
        }
    }

    fn select(&mut self, user_id: String) {
        self.state.begin_selection(&user_id);
        self.send_command(ClientCommand::SelectCorrespondent(Some(user_id)));
    }
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_client_events();

        egui::SidePanel::left("roster_sidebar")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                let actions: SidebarActions = sidebar::render(ui, &self.state);
                if actions.toggle_theme {
                    self.state.theme = self.state.theme.toggled();
                    self.state.theme.apply(ctx);
                }
                if actions.refresh {
                    self.send_command(ClientCommand::RefreshRoster);
                }
                if let Some(user_id) = actions.selected {
                    self.select(user_id);
                }
            });

        egui::TopBottomPanel::bottom("composer").show(ctx, |ui| {
            let enabled = self.state.selected.is_some();
            let actions = input_bar::render(ui, &mut self.state.input_text, enabled);
            if let Some(is_typing) = actions.typing_transition {
                self.send_command(ClientCommand::SetTyping(is_typing));
            }
            if let Some(text) = actions.submitted {
                self.send_command(ClientCommand::SubmitMessage(text));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            chat_area::render(ui, &self.state);
        });

        if self.state.needs_nickname {
            if let Some(nickname) = nickname_modal::render(ctx, &mut self.state.nickname_input) {
                self.send_command(ClientCommand::SetNickname(nickname));
                self.state.nickname_input.clear();
            }
        }

        ctx.request_repaint();
    }
}
