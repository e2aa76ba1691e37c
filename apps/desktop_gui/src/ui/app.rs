use client_core::{route, Alert, AuthMode, ProductLister, ProfileDraft, View, ViewState};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::domain::{ProductEntry, ProfileField, ProfileRecord, SaveTarget, PLACEHOLDER_IMAGE};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{err_label, UiError, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const CARD_WIDTH: f32 = 420.0;

#[derive(Debug, Clone, Default)]
struct LoginInputs {
    email: String,
    password: String,
    error: Option<String>,
    pending: bool,
}

#[derive(Debug, Clone, Default)]
struct RegisterInputs {
    email: String,
    password: String,
    confirm_password: String,
    error: Option<String>,
    pending: bool,
}

/// Rows of the profile card. The name row edits first and last name together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileRow {
    Name,
    Single(ProfileField),
}

impl ProfileRow {
    const ALL: [ProfileRow; 3] = [
        ProfileRow::Name,
        ProfileRow::Single(ProfileField::Location),
        ProfileRow::Single(ProfileField::Bio),
    ];

    fn label(self) -> &'static str {
        match self {
            ProfileRow::Name => "Name",
            ProfileRow::Single(field) => field.label(),
        }
    }

    /// Field the core tracks as being edited for this row.
    fn edit_marker(self) -> ProfileField {
        match self {
            ProfileRow::Name => ProfileField::FirstName,
            ProfileRow::Single(field) => field,
        }
    }

    fn is_editing(self, editing: Option<ProfileField>) -> bool {
        match (self, editing) {
            (_, None) => false,
            (ProfileRow::Name, Some(field)) => {
                matches!(field, ProfileField::FirstName | ProfileField::LastName)
            }
            (ProfileRow::Single(row), Some(field)) => row == field,
        }
    }

    fn save_target(self) -> SaveTarget {
        match self {
            ProfileRow::Name => SaveTarget::Name,
            ProfileRow::Single(field) => SaveTarget::Field(field),
        }
    }

    fn fields(self) -> &'static [ProfileField] {
        match self {
            ProfileRow::Name => &[ProfileField::FirstName, ProfileField::LastName],
            ProfileRow::Single(ProfileField::Location) => &[ProfileField::Location],
            ProfileRow::Single(ProfileField::Bio) => &[ProfileField::Bio],
            ProfileRow::Single(ProfileField::FirstName) => &[ProfileField::FirstName],
            ProfileRow::Single(ProfileField::LastName) => &[ProfileField::LastName],
        }
    }

    fn shown_value(self, draft: &ProfileDraft) -> String {
        match self {
            ProfileRow::Name => {
                let name = draft.record.display_name();
                let name = name.trim();
                if name.is_empty() {
                    "Not set".to_string()
                } else {
                    name.to_string()
                }
            }
            ProfileRow::Single(field) => draft.shown_value(field).to_string(),
        }
    }
}

pub struct GearReviewsApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    view_state: ViewState,
    status: String,
    fatal_error: Option<UiError>,
    login: LoginInputs,
    register: RegisterInputs,
    products: Vec<ProductEntry>,
    profile: ProfileDraft,
    edit_buffer: ProfileRecord,
    alert: Option<Alert>,
}

impl GearReviewsApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            view_state: ViewState::default(),
            status: "Starting".to_string(),
            fatal_error: None,
            login: LoginInputs::default(),
            register: RegisterInputs::default(),
            products: ProductLister::entries(),
            profile: ProfileDraft::default(),
            edit_buffer: ProfileRecord::default(),
            alert: None,
        }
    }

    fn view(&self) -> View {
        route(&self.view_state)
    }

    fn send(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Info(message) => self.status = message,
            UiEvent::ViewChanged(state) => {
                if state.session.is_none() && self.view_state.session.is_some() {
                    self.profile = ProfileDraft::default();
                }
                if state.session.is_some() {
                    self.login = LoginInputs::default();
                }
                self.view_state = state;
            }
            UiEvent::ProfileUpdated(draft) => {
                if draft.editing != self.profile.editing || draft.editing.is_none() {
                    self.edit_buffer = draft.record.clone();
                }
                self.profile = draft;
            }
            UiEvent::Alert(alert) => self.alert = Some(alert),
            UiEvent::SignInFailed(message) => {
                self.login.pending = false;
                self.login.error = Some(message);
            }
            UiEvent::RegisterFailed(message) => {
                self.register.pending = false;
                self.register.error = Some(message);
            }
            UiEvent::Registered => self.register = RegisterInputs::default(),
            UiEvent::Error(err) => {
                self.status = format!("{}: {}", err_label(err.category()), err.message());
                if err.is_fatal() {
                    self.fatal_error = Some(err);
                }
            }
        }
    }

    fn submit_login(&mut self) {
        self.login.pending = true;
        self.login.error = None;
        let cmd = BackendCommand::SignIn {
            email: self.login.email.clone(),
            password: self.login.password.clone(),
        };
        self.send(cmd);
    }

    fn submit_register(&mut self) {
        self.register.pending = true;
        self.register.error = None;
        let cmd = BackendCommand::Register {
            email: self.register.email.clone(),
            password: self.register.password.clone(),
            confirm_password: self.register.confirm_password.clone(),
        };
        self.send(cmd);
    }

    fn begin_edit(&mut self, row: ProfileRow) {
        self.edit_buffer = self.profile.record.clone();
        self.profile.editing = Some(row.edit_marker());
        self.send(BackendCommand::BeginEdit(row.edit_marker()));
    }

    fn cancel_edit(&mut self) {
        self.edit_buffer = self.profile.record.clone();
        self.profile.editing = None;
        self.send(BackendCommand::CancelEdit);
    }

    fn save_row(&mut self, row: ProfileRow) {
        let values = row
            .fields()
            .iter()
            .map(|field| (*field, self.edit_buffer.value(*field).to_string()))
            .collect();
        self.send(BackendCommand::SaveProfile {
            target: row.save_target(),
            values,
        });
    }

    fn show_loading_screen(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() * 0.4);
                if let Some(err) = &self.fatal_error {
                    ui.heading(err_label(err.category()));
                    ui.label(err.message());
                } else {
                    ui.spinner();
                    ui.weak(&self.status);
                }
            });
        });
    }

    fn auth_card(ui: &mut egui::Ui, title: &str, add: impl FnOnce(&mut egui::Ui)) {
        ui.vertical_centered(|ui| {
            ui.set_width(CARD_WIDTH.min(ui.available_width()));
            egui::Frame::NONE
                .fill(ui.visuals().faint_bg_color)
                .corner_radius(12.0)
                .inner_margin(egui::Margin::symmetric(18, 16))
                .show(ui, |ui| {
                    ui.style_mut().spacing.item_spacing = egui::vec2(8.0, 8.0);
                    ui.heading(title);
                    ui.add_space(6.0);
                    add(ui);
                });
        });
    }

    fn text_field(
        ui: &mut egui::Ui,
        id: &'static str,
        label: &str,
        value: &mut String,
        password: bool,
    ) -> egui::Response {
        ui.label(egui::RichText::new(label).strong());
        let edit = egui::TextEdit::singleline(value)
            .id_salt(id)
            .password(password)
            .desired_width(f32::INFINITY);
        ui.add_sized([ui.available_width(), 30.0], edit)
    }

    fn show_error_line(ui: &mut egui::Ui, error: Option<&str>) {
        if let Some(error) = error {
            ui.colored_label(ui.visuals().error_fg_color, error);
        }
    }

    fn show_login_screen(&mut self, ctx: &egui::Context) {
        let mut submit = false;
        let mut switch = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space((ui.available_height() * 0.15).clamp(12.0, 90.0));
            let login = &mut self.login;
            Self::auth_card(ui, "Login", |ui| {
                Self::text_field(ui, "login_email", "Email", &mut login.email, false);
                let password =
                    Self::text_field(ui, "login_password", "Password", &mut login.password, true);
                if password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                Self::show_error_line(ui, login.error.as_deref());
                let button = egui::Button::new(egui::RichText::new("Login").strong())
                    .min_size(egui::vec2(ui.available_width(), 36.0));
                if ui.add_enabled(!login.pending, button).clicked() {
                    submit = true;
                }
                if ui.link("Don't have an account? Register").clicked() {
                    switch = true;
                }
            });
        });
        if submit {
            self.submit_login();
        }
        if switch {
            self.send(BackendCommand::SetRegistering(true));
        }
    }

    fn show_register_screen(&mut self, ctx: &egui::Context) {
        let mut submit = false;
        let mut switch = false;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space((ui.available_height() * 0.15).clamp(12.0, 90.0));
            let register = &mut self.register;
            Self::auth_card(ui, "Register", |ui| {
                Self::text_field(ui, "register_email", "Email", &mut register.email, false);
                Self::text_field(
                    ui,
                    "register_password",
                    "Password",
                    &mut register.password,
                    true,
                );
                Self::text_field(
                    ui,
                    "register_confirm",
                    "Confirm Password",
                    &mut register.confirm_password,
                    true,
                );
                Self::show_error_line(ui, register.error.as_deref());
                let button = egui::Button::new(egui::RichText::new("Register").strong())
                    .min_size(egui::vec2(ui.available_width(), 36.0));
                if ui.add_enabled(!register.pending, button).clicked() {
                    submit = true;
                }
                if ui.link("Already have an account? Login").clicked() {
                    switch = true;
                }
            });
        });
        if submit {
            self.submit_register();
        }
        if switch {
            self.send(BackendCommand::SetRegistering(false));
        }
    }

    fn show_products_screen(&mut self, ctx: &egui::Context) {
        let mut open_profile = false;
        egui::TopBottomPanel::top("products_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(ProductLister::TITLE);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Profile").clicked() {
                        open_profile = true;
                    }
                });
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                for product in &self.products {
                    egui::Frame::NONE
                        .fill(ui.visuals().faint_bg_color)
                        .corner_radius(10.0)
                        .inner_margin(egui::Margin::symmetric(12, 10))
                        .show(ui, |ui| {
                            ui.set_width(ui.available_width());
                            ui.horizontal(|ui| {
                                photo_placeholder(ui, 48.0);
                                ui.vertical(|ui| {
                                    ui.label(egui::RichText::new(&product.name).strong());
                                    ui.weak(&product.image);
                                });
                            });
                        });
                    ui.add_space(6.0);
                }
            });
        });
        if open_profile {
            self.send(BackendCommand::ShowProfile);
        }
    }

    fn show_profile_screen(&mut self, ctx: &egui::Context) {
        let mut back = false;
        let mut change_photo = false;
        let mut sign_out = false;
        let mut begin: Option<ProfileRow> = None;
        let mut save: Option<ProfileRow> = None;
        let mut cancel = false;

        egui::TopBottomPanel::top("profile_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("Back").clicked() {
                    back = true;
                }
                ui.heading("Profile");
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    if self.profile.photo == PLACEHOLDER_IMAGE {
                        photo_placeholder(ui, 120.0);
                    } else {
                        ui.label(egui::RichText::new(&self.profile.photo).monospace());
                    }
                    if ui.button("Change Photo").clicked() {
                        change_photo = true;
                    }
                });
                ui.add_space(10.0);

                ui.label(egui::RichText::new("Email").strong());
                ui.label(self.profile.email.as_deref().unwrap_or("Not set"));
                ui.separator();

                let editing = self.profile.editing;
                for row in ProfileRow::ALL {
                    ui.label(egui::RichText::new(row.label()).strong());
                    if row.is_editing(editing) {
                        for field in row.fields() {
                            let value = self.edit_buffer.value_mut(*field);
                            let edit = if *field == ProfileField::Bio {
                                egui::TextEdit::multiline(value)
                            } else {
                                egui::TextEdit::singleline(value)
                            };
                            ui.add(edit.hint_text(field.label()).desired_width(f32::INFINITY));
                        }
                        ui.horizontal(|ui| {
                            if ui.button("Save").clicked() {
                                save = Some(row);
                            }
                            if ui.button("Cancel").clicked() {
                                cancel = true;
                            }
                        });
                    } else {
                        ui.horizontal(|ui| {
                            ui.label(row.shown_value(&self.profile));
                            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                if ui.small_button("Edit").clicked() {
                                    begin = Some(row);
                                }
                            });
                        });
                    }
                    ui.separator();
                }

                ui.add_space(12.0);
                if ui
                    .add_sized([ui.available_width(), 34.0], egui::Button::new("Sign Out"))
                    .clicked()
                {
                    sign_out = true;
                }
            });
        });

        if let Some(row) = begin {
            self.begin_edit(row);
        }
        if let Some(row) = save {
            self.save_row(row);
        }
        if cancel {
            self.cancel_edit();
        }
        if change_photo {
            self.send(BackendCommand::ChangePhoto);
        }
        if sign_out {
            self.send(BackendCommand::SignOut);
        }
        if back {
            self.send(BackendCommand::ShowProducts);
        }
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(alert) = &self.alert else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(alert.title.as_str())
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(&alert.message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.alert = None;
        }
    }
}

fn photo_placeholder(ui: &mut egui::Ui, size: f32) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(size, size), egui::Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, size * 0.5, ui.visuals().widgets.inactive.bg_fill);
    painter.text(
        rect.center(),
        egui::Align2::CENTER_CENTER,
        "150",
        egui::FontId::proportional(size * 0.25),
        ui.visuals().weak_text_color(),
    );
}

impl eframe::App for GearReviewsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        match self.view() {
            View::Loading => self.show_loading_screen(ctx),
            View::Auth(AuthMode::Login) => self.show_login_screen(ctx),
            View::Auth(AuthMode::Register) => self.show_register_screen(ctx),
            View::Products => self.show_products_screen(ctx),
            View::Profile => self.show_profile_screen(ctx),
        }
        self.show_alert(ctx);

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use client_core::ViewState;
    use crossbeam_channel::bounded;
    use shared::domain::{Session, SessionId};

    use super::*;
    use crate::controller::events::UiErrorContext;

    fn app() -> (GearReviewsApp, Receiver<BackendCommand>) {
        let (cmd_tx, cmd_rx) = bounded(16);
        let (_ui_tx, ui_rx) = bounded(16);
        (GearReviewsApp::new(cmd_tx, ui_rx), cmd_rx)
    }

    fn signed_in_state() -> ViewState {
        ViewState {
            initializing: false,
            session: Some(Session::anonymous(SessionId::from("u1"))),
            show_profile: false,
            is_registering: false,
        }
    }

    #[test]
    fn starts_on_loading_view() {
        let (app, _) = app();
        assert_eq!(app.view(), View::Loading);
        assert_eq!(app.products.len(), 5);
    }

    #[test]
    fn view_follows_backend_state() {
        let (mut app, _) = app();
        app.apply_event(UiEvent::ViewChanged(signed_in_state()));
        assert_eq!(app.view(), View::Products);

        let mut state = signed_in_state();
        state.show_profile = true;
        app.apply_event(UiEvent::ViewChanged(state));
        assert_eq!(app.view(), View::Profile);
    }

    #[test]
    fn sign_in_failure_shows_message_and_reenables_button() {
        let (mut app, cmd_rx) = app();
        app.login.email = "ada@example.com".into();
        app.login.password = "secret1".into();
        app.submit_login();
        assert!(app.login.pending);
        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(BackendCommand::SignIn { email, .. }) if email == "ada@example.com"
        ));

        app.apply_event(UiEvent::SignInFailed("Invalid email or password.".into()));
        assert!(!app.login.pending);
        assert_eq!(app.login.error.as_deref(), Some("Invalid email or password."));
    }

    #[test]
    fn registration_success_clears_form() {
        let (mut app, _) = app();
        app.register.email = "ada@example.com".into();
        app.submit_register();
        app.apply_event(UiEvent::Registered);
        assert!(app.register.email.is_empty());
        assert!(!app.register.pending);
    }

    #[test]
    fn name_row_saves_both_name_fields() {
        let (mut app, cmd_rx) = app();
        app.begin_edit(ProfileRow::Name);
        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(BackendCommand::BeginEdit(ProfileField::FirstName))
        ));
        app.edit_buffer.first_name = "Ada".into();
        app.edit_buffer.last_name = "Lovelace".into();
        app.save_row(ProfileRow::Name);

        match cmd_rx.try_recv() {
            Ok(BackendCommand::SaveProfile { target, values }) => {
                assert_eq!(target, SaveTarget::Name);
                assert_eq!(
                    values,
                    vec![
                        (ProfileField::FirstName, "Ada".to_string()),
                        (ProfileField::LastName, "Lovelace".to_string()),
                    ]
                );
            }
            _ => panic!("expected a save command"),
        }
    }

    #[test]
    fn successful_save_leaves_edit_mode() {
        let (mut app, _) = app();
        app.begin_edit(ProfileRow::Single(ProfileField::Location));
        app.edit_buffer.location = "Lisbon".into();

        let mut saved = ProfileDraft::default();
        saved.record.location = "Lisbon".into();
        app.apply_event(UiEvent::ProfileUpdated(saved));
        assert_eq!(app.profile.editing, None);
        assert_eq!(
            ProfileRow::Single(ProfileField::Location).shown_value(&app.profile),
            "Lisbon"
        );
        assert_eq!(ProfileRow::Name.shown_value(&app.profile), "Not set");
    }

    #[test]
    fn alert_is_kept_until_dismissed() {
        let (mut app, _) = app();
        app.apply_event(UiEvent::Alert(Alert::error("Failed to update profile")));
        assert_eq!(
            app.alert.as_ref().map(|a| a.message.as_str()),
            Some("Failed to update profile")
        );
    }

    #[test]
    fn startup_failure_is_fatal() {
        let (mut app, _) = app();
        app.apply_event(UiEvent::Error(UiError::from_message(
            UiErrorContext::BackendStartup,
            "backend worker startup failure: failed to open database",
        )));
        assert!(app.fatal_error.is_some());
        assert!(app.status.starts_with("Storage"));
    }

    #[test]
    fn signing_out_drops_the_profile_copy() {
        let (mut app, _) = app();
        app.apply_event(UiEvent::ViewChanged(signed_in_state()));
        let mut draft = ProfileDraft::default();
        draft.record.bio = "rides a lot".into();
        app.apply_event(UiEvent::ProfileUpdated(draft));

        let mut signed_out = signed_in_state();
        signed_out.session = None;
        app.apply_event(UiEvent::ViewChanged(signed_out));
        assert_eq!(app.profile, ProfileDraft::default());
        assert_eq!(app.view(), View::Auth(AuthMode::Login));
    }
}
