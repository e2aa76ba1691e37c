//! Runtime bridge between UI command queue and backend event intake.

use std::{sync::Arc, thread};

use anyhow::{anyhow, Context, Result};
use client_core::{
    AppShell, ClientEvent, DocumentStore, FirebaseConfig, FirebaseIdentity, FirestoreStore,
    IdentityProvider, LocalIdentity, LoginForm, RegisterForm,
};
use crossbeam_channel::{Receiver, Sender};
use storage::{prepare_database_url, Storage};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::backend_bridge::commands::BackendCommand;
use crate::config::{BackendKind, Settings};
use crate::controller::events::{UiError, UiErrorContext, UiEvent};
use crate::media::RfdMediaPicker;

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                report_startup_failure(
                    &ui_tx,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                );
                return;
            }
        };

        runtime.block_on(async move {
            let (identity, store) = match build_backend(&settings).await {
                Ok(backend) => backend,
                Err(err) => {
                    report_startup_failure(
                        &ui_tx,
                        format!("backend worker startup failure: {err:#}"),
                    );
                    return;
                }
            };

            let app = AppShell::new_with_dependencies(
                identity,
                store,
                Arc::new(RfdMediaPicker),
                &settings.profile_collection,
            );
            forward_view_changes(&app, ui_tx.clone());
            forward_client_events(&app, ui_tx.clone());
            app.start();
            info!(backend = %settings.backend, "backend worker ready");
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            // Commands run one at a time, in the order the UI queued them.
            while let Ok(cmd) = cmd_rx.recv() {
                handle_command(&app, &ui_tx, cmd).await;
            }
            info!("ui command queue closed; backend worker exiting");
        });
    });
}

fn report_startup_failure(ui_tx: &Sender<UiEvent>, message: String) {
    error!("{message}");
    let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
        UiErrorContext::BackendStartup,
        message,
    )));
}

async fn build_backend(
    settings: &Settings,
) -> Result<(Arc<dyn IdentityProvider>, Arc<dyn DocumentStore>)> {
    // Both backends keep the remembered session in the local database.
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            error = %format!("{error:#}"),
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    match settings.backend {
        BackendKind::Local => {
            info!(%database_url, "using local sqlite backend");
            let identity: Arc<dyn IdentityProvider> =
                Arc::new(LocalIdentity::restore(storage.clone()).await?);
            let store: Arc<dyn DocumentStore> = Arc::new(storage);
            Ok((identity, store))
        }
        BackendKind::Firebase => {
            let api_key = settings
                .firebase_api_key
                .clone()
                .ok_or_else(|| anyhow!("firebase_api_key is not set"))?;
            let project_id = settings
                .firebase_project_id
                .clone()
                .ok_or_else(|| anyhow!("firebase_project_id is not set"))?;
            let config = FirebaseConfig::new(api_key, project_id)
                .context("invalid firebase configuration")?;
            info!(project_id = %config.project_id, "using firebase backend");
            let identity = FirebaseIdentity::restore(config, storage).await;
            let store: Arc<dyn DocumentStore> = Arc::new(FirestoreStore::new(Arc::clone(&identity)));
            let identity: Arc<dyn IdentityProvider> = identity;
            Ok((identity, store))
        }
    }
}

fn forward_view_changes(app: &AppShell, ui_tx: Sender<UiEvent>) {
    let mut views = app.views().subscribe();
    tokio::spawn(async move {
        loop {
            let state = views.borrow_and_update().clone();
            if ui_tx.send(UiEvent::ViewChanged(state)).is_err() {
                return;
            }
            if views.changed().await.is_err() {
                return;
            }
        }
    });
}

fn forward_client_events(app: &AppShell, ui_tx: Sender<UiEvent>) {
    let mut events = app.subscribe_events();
    tokio::spawn(async move {
        loop {
            let ui_event = match events.recv().await {
                Ok(ClientEvent::Alert(alert)) => UiEvent::Alert(alert),
                Ok(ClientEvent::ProfileUpdated(draft)) => UiEvent::ProfileUpdated(draft),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "ui event forwarder lagged");
                    continue;
                }
                Err(RecvError::Closed) => return,
            };
            if ui_tx.send(ui_event).is_err() {
                return;
            }
        }
    });
}

async fn handle_command(app: &AppShell, ui_tx: &Sender<UiEvent>, cmd: BackendCommand) {
    let profile = app.profile();
    // Failures below are already logged and surfaced as alerts by the core.
    match cmd {
        BackendCommand::SignIn { email, password } => {
            let mut form = LoginForm {
                email,
                password,
                error: None,
            };
            if !app.sign_in(&mut form).await {
                let message = form.error.unwrap_or_default();
                let _ = ui_tx.send(UiEvent::SignInFailed(message));
            }
        }
        BackendCommand::Register {
            email,
            password,
            confirm_password,
        } => {
            let mut form = RegisterForm {
                email,
                password,
                confirm_password,
                error: None,
            };
            let event = if app.register(&mut form).await {
                UiEvent::Registered
            } else {
                UiEvent::RegisterFailed(form.error.unwrap_or_default())
            };
            let _ = ui_tx.send(event);
        }
        BackendCommand::SetRegistering(true) => app.switch_to_register(),
        BackendCommand::SetRegistering(false) => app.switch_to_login(),
        BackendCommand::ShowProducts => app.show_products(),
        BackendCommand::ShowProfile => {
            let _ = app.show_profile().await;
        }
        BackendCommand::BeginEdit(field) => profile.begin_edit(field).await,
        BackendCommand::CancelEdit => profile.cancel_edit().await,
        BackendCommand::SaveProfile { target, values } => {
            for (field, value) in values {
                profile.set_draft_value(field, value).await;
            }
            let _ = profile.save_field(target).await;
        }
        BackendCommand::ChangePhoto => {
            let _ = profile.change_photo().await;
        }
        BackendCommand::SignOut => {
            let _ = profile.sign_out().await;
        }
    }
}
