use std::{sync::atomic::Ordering, time::Duration};

use super::*;
use crate::{
    test_support::{wait_for_view, FakeIdentity},
    view::{AuthMode, View},
};

#[tokio::test]
async fn empty_provider_gets_an_anonymous_session() {
    let identity = Arc::new(FakeIdentity::default());
    let views = Arc::new(ViewStore::new());
    let task = SessionObserver::new(identity.clone(), views.clone()).spawn();

    wait_for_view(&views, View::Products).await;
    assert_eq!(identity.call_count("sign_in_anonymously").await, 1);
    assert!(views.snapshot().session.is_some_and(|s| s.is_anonymous));

    task.abort();
}

#[tokio::test]
async fn failed_anonymous_sign_in_stays_on_login() {
    let identity = Arc::new(FakeIdentity::default());
    identity.fail_anonymous.store(true, Ordering::SeqCst);
    let views = Arc::new(ViewStore::new());
    let task = SessionObserver::new(identity.clone(), views.clone()).spawn();

    wait_for_view(&views, View::Auth(AuthMode::Login)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(identity.call_count("sign_in_anonymously").await, 1);
    assert_eq!(views.view(), View::Auth(AuthMode::Login));
    assert!(!task.is_finished(), "observer keeps running after the failure");

    task.abort();
}

#[tokio::test]
async fn existing_session_skips_anonymous_sign_in() {
    let identity = Arc::new(FakeIdentity::signed_in("u1"));
    let views = Arc::new(ViewStore::new());
    let task = SessionObserver::new(identity.clone(), views.clone()).spawn();

    wait_for_view(&views, View::Products).await;
    assert_eq!(identity.call_count("sign_in_anonymously").await, 0);

    task.abort();
}

#[tokio::test]
async fn sign_out_triggers_a_fresh_anonymous_session_on_products() {
    let identity = Arc::new(FakeIdentity::signed_in("u1"));
    let views = Arc::new(ViewStore::new());
    let task = SessionObserver::new(identity.clone(), views.clone()).spawn();
    wait_for_view(&views, View::Products).await;

    views.set_show_profile(true);
    assert_eq!(views.view(), View::Profile);

    identity.sign_out().await.expect("sign out");
    let mut rx = views.subscribe();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let state = rx.borrow_and_update().clone();
            if state
                .session
                .as_ref()
                .is_some_and(|s| s.id.as_str().starts_with("anon-"))
            {
                return state;
            }
            rx.changed().await.expect("view store alive");
        }
    })
    .await
    .map(|state| assert!(!state.show_profile))
    .expect("anonymous session after sign out");

    assert_eq!(views.view(), View::Products);
    task.abort();
}

#[tokio::test]
async fn initializing_clears_once_per_lifetime() {
    let identity = Arc::new(FakeIdentity::default());
    identity.fail_anonymous.store(true, Ordering::SeqCst);
    let views = Arc::new(ViewStore::new());
    let observer = SessionObserver::new(identity.clone(), views.clone());

    observer.handle(None);
    assert!(!views.snapshot().initializing);
    observer.handle(Some(Session::anonymous("x".into())));
    observer.handle(None);
    assert!(!views.snapshot().initializing);
}
