use std::sync::atomic::Ordering;

use super::*;
use crate::{
    test_support::{wait_for_view, FakeIdentity, FakeStore},
    view::AuthMode,
};
use shared::domain::ProfileField;

fn shell(identity: Arc<FakeIdentity>) -> (AppShell, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::default());
    (AppShell::new(identity, store.clone()), store)
}

#[tokio::test]
async fn launch_goes_from_loading_to_products() {
    let identity = Arc::new(FakeIdentity::default());
    let (app, _) = shell(identity.clone());
    assert_eq!(app.view(), View::Loading);

    app.start();
    app.start();
    wait_for_view(app.views(), View::Products).await;
    assert_eq!(identity.call_count("sign_in_anonymously").await, 1);
}

#[tokio::test]
async fn register_toggle_makes_no_network_call() {
    let identity = Arc::new(FakeIdentity::default());
    identity.fail_anonymous.store(true, Ordering::SeqCst);
    let (app, _) = shell(identity.clone());
    app.start();
    wait_for_view(app.views(), View::Auth(AuthMode::Login)).await;
    tokio::time::timeout(std::time::Duration::from_secs(2), async {
        while identity.call_count("sign_in_anonymously").await == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("anonymous attempt recorded");
    let calls_before = identity.calls.lock().await.len();

    app.switch_to_register();
    assert_eq!(app.view(), View::Auth(AuthMode::Register));
    app.switch_to_login();
    assert_eq!(app.view(), View::Auth(AuthMode::Login));

    assert_eq!(identity.calls.lock().await.len(), calls_before);
}

#[tokio::test]
async fn opening_profile_creates_the_record() {
    let identity = Arc::new(FakeIdentity::signed_in("u1"));
    let (app, store) = shell(identity);
    app.start();
    wait_for_view(app.views(), View::Products).await;

    let record = app.show_profile().await.expect("mount").expect("record");
    assert_eq!(app.view(), View::Profile);
    assert_eq!(record.value(ProfileField::Bio), "");
    assert!(store.doc("users", "u1").await.is_some());

    app.show_products();
    assert_eq!(app.view(), View::Products);
}

#[tokio::test]
async fn successful_registration_returns_to_login_mode_then_products() {
    let identity = Arc::new(FakeIdentity::default());
    identity.fail_anonymous.store(true, Ordering::SeqCst);
    let (app, _) = shell(identity);
    app.start();
    wait_for_view(app.views(), View::Auth(AuthMode::Login)).await;
    app.switch_to_register();

    let mut form = RegisterForm {
        email: "ada@example.com".into(),
        password: "secret1".into(),
        confirm_password: "secret1".into(),
        error: None,
    };
    assert!(app.register(&mut form).await);
    assert!(!app.view_state().is_registering);
    wait_for_view(app.views(), View::Products).await;
}

#[tokio::test]
async fn failed_login_keeps_auth_view() {
    let identity = Arc::new(FakeIdentity::default());
    identity.fail_anonymous.store(true, Ordering::SeqCst);
    *identity.password_error.lock().await = Some(shared::error::AuthError::new(
        shared::error::AuthErrorCode::UserNotFound,
        "EMAIL_NOT_FOUND",
    ));
    let (app, _) = shell(identity);
    app.start();
    wait_for_view(app.views(), View::Auth(AuthMode::Login)).await;

    let mut form = LoginForm {
        email: "ghost@example.com".into(),
        password: "whatever".into(),
        error: None,
    };
    assert!(!app.sign_in(&mut form).await);
    assert_eq!(form.error.as_deref(), Some("Invalid email or password."));
    assert_eq!(app.view(), View::Auth(AuthMode::Login));
}

#[test]
fn products_are_static() {
    let identity = Arc::new(FakeIdentity::default());
    let (app, _) = shell(identity);
    assert_eq!(app.products(), ProductLister::entries());
}
