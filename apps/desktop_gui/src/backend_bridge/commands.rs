//! Backend commands queued from UI to backend worker.

use shared::domain::{ProfileField, SaveTarget};

pub enum BackendCommand {
    SignIn {
        email: String,
        password: String,
    },
    Register {
        email: String,
        password: String,
        confirm_password: String,
    },
    SetRegistering(bool),
    ShowProducts,
    ShowProfile,
    BeginEdit(ProfileField),
    CancelEdit,
    SaveProfile {
        target: SaveTarget,
        values: Vec<(ProfileField, String)>,
    },
    ChangePhoto,
    SignOut,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SignIn { .. } => "sign_in",
            Self::Register { .. } => "register",
            Self::SetRegistering(_) => "set_registering",
            Self::ShowProducts => "show_products",
            Self::ShowProfile => "show_profile",
            Self::BeginEdit(_) => "begin_edit",
            Self::CancelEdit => "cancel_edit",
            Self::SaveProfile { .. } => "save_profile",
            Self::ChangePhoto => "change_photo",
            Self::SignOut => "sign_out",
        }
    }
}
