//! Session lifecycle tests against a stub backend.
//!
//! Run with: `cargo test -p ns-client --test session_test`

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{start_client, start_client_with, wait_for_snapshot, within, Backend, PASSWORD};
use ns_client::access::GuardDecision;
use ns_client::api::ApiError;
use ns_client::config::TokenStoreKind;
use ns_client::identity::{
    ExternalCredential, ExternalProvider, IdentityError, MockIdentityProvider, ProfileUpdate,
};
use ns_client::routes::Location;
use ns_client::session::{
    FileTokenStore, NoticeLevel, SessionError, SessionEvent, SessionSnapshot, SignUp, TokenStore,
    SESSION_FILE,
};
use ns_common::PageRequest;

#[tokio::test]
async fn test_stale_token_not_trusted_until_provider_reports() {
    let dir = tempfile::tempdir().unwrap();
    FileTokenStore::new(dir.path(), SESSION_FILE)
        .unwrap()
        .save("tok-ada@example.com")
        .unwrap();

    let client = start_client(
        MockIdentityProvider::silent(),
        TokenStoreKind::File(dir.path().to_path_buf()),
    )
    .await;
    assert!(client.app.session.snapshot().loading);

    // Provider never reports: settles signed out after the identity timeout
    let settled = within(client.app.session.settled()).await.unwrap();
    assert!(settled.identity.is_none());
    assert!(!settled.is_authenticated());
    assert!(matches!(
        client.app.api.list_articles(PageRequest::default()).await,
        Err(ApiError::NotAuthenticated)
    ));

    // The durable token survives and is reused once the provider catches up
    let identity = client
        .provider
        .add_account("ada@example.com", PASSWORD, Some("Ada"));
    client.provider.restore(identity.clone());

    let snapshot =
        wait_for_snapshot(&client.app.session.subscribe(), |s| s.is_authenticated()).await;
    assert_eq!(snapshot.identity, Some(identity));
    assert_eq!(Backend::count(&client.backend().jwt_calls), 0);
    assert!(client
        .app
        .api
        .list_articles(PageRequest::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_sign_in_exchanges_token_once_and_resumes() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    client
        .provider
        .add_account("ada@example.com", PASSWORD, Some("Ada"));

    let settled = within(client.app.session.settled()).await.unwrap();
    let origin = Location::parse("/subscription?plan=five_days");
    let decision = client.app.auth_guard.evaluate(&settled, &origin);
    let redirect = decision.redirect().cloned().expect("signed-out user is redirected");
    assert_eq!(redirect.to.path(), "/login");

    let destination = within(client.app.session.sign_in_and_resume(
        "ada@example.com",
        PASSWORD,
        Some(&redirect),
    ))
    .await
    .unwrap();
    assert_eq!(destination, origin);
    assert_eq!(Backend::count(&client.backend().jwt_calls), 1);

    let decision = client
        .app
        .auth_guard
        .resolve(&client.app.session, &origin)
        .await
        .unwrap();
    assert!(decision.is_granted());
}

#[tokio::test]
async fn test_failed_exchange_leaves_session_unauthenticated() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    client
        .backend()
        .fail_token_exchange
        .store(true, std::sync::atomic::Ordering::SeqCst);
    client
        .provider
        .add_account("bo@example.com", PASSWORD, None);

    let result = within(client.app.session.sign_in_and_resume(
        "bo@example.com",
        PASSWORD,
        None,
    ))
    .await;
    assert!(matches!(result, Err(SessionError::NotAuthenticated)));

    let snapshot = client.app.session.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.identity.is_some());
    assert!(!snapshot.is_authenticated());
}

#[tokio::test]
async fn test_wrong_password_reports_and_clears_loading() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    within(client.app.session.settled()).await.unwrap();
    client
        .provider
        .add_account("ada@example.com", PASSWORD, None);
    let mut events = client.app.session.events();

    let result = client.app.session.sign_in("ada@example.com", "nope").await;
    assert!(matches!(
        result,
        Err(SessionError::Identity(IdentityError::InvalidCredentials))
    ));
    assert!(!client.app.session.snapshot().loading);

    match within(events.recv()).await.unwrap() {
        SessionEvent::Notice(notice) => assert_eq!(notice.level, NoticeLevel::Error),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_dismissed_popup_is_not_an_error_notice() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    within(client.app.session.settled()).await.unwrap();
    let mut events = client.app.session.events();

    let result = client
        .app
        .session
        .sign_in_with(ExternalCredential {
            provider: ExternalProvider::Google,
            id_token: None,
        })
        .await;
    assert!(matches!(
        result,
        Err(SessionError::Identity(IdentityError::Cancelled))
    ));

    match within(events.recv()).await.unwrap() {
        SessionEvent::Notice(notice) => assert_eq!(notice.level, NoticeLevel::Info),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_sign_up_sets_profile_and_authenticates() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    within(client.app.session.settled()).await.unwrap();

    let weak = client
        .app
        .session
        .sign_up(SignUp {
            name: "Cy".into(),
            email: "cy@example.com".into(),
            password: "short".into(),
            avatar_url: None,
        })
        .await;
    assert!(matches!(
        weak,
        Err(SessionError::Identity(IdentityError::WeakPassword(_)))
    ));

    let identity = client
        .app
        .session
        .sign_up(SignUp {
            name: "Cy".into(),
            email: "cy@example.com".into(),
            password: PASSWORD.into(),
            avatar_url: Some("https://img.example/cy.png".into()),
        })
        .await
        .unwrap();
    assert_eq!(identity.display_name.as_deref(), Some("Cy"));

    let snapshot = wait_for_snapshot(&client.app.session.subscribe(), |s| {
        s.is_authenticated() && s.identity.as_ref().and_then(|i| i.display_name.as_deref()) == Some("Cy")
    })
    .await;
    assert_eq!(
        snapshot.identity.unwrap().avatar_url.as_deref(),
        Some("https://img.example/cy.png")
    );
}

#[tokio::test]
async fn test_sign_out_removes_durable_token() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_client(
        MockIdentityProvider::new(),
        TokenStoreKind::File(dir.path().to_path_buf()),
    )
    .await;
    helpers::sign_in(&client, "ada@example.com").await;

    let store = FileTokenStore::new(dir.path(), SESSION_FILE).unwrap();
    assert_eq!(store.load().unwrap().as_deref(), Some("tok-ada@example.com"));

    client.app.session.sign_out().await.unwrap();
    let snapshot =
        wait_for_snapshot(&client.app.session.subscribe(), |s| s.is_unauthenticated()).await;
    assert!(snapshot.identity.is_none());
    assert_eq!(store.load().unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_rejections_force_one_sign_out() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    helpers::sign_in(&client, "ada@example.com").await;

    let mut events = client.app.session.events();
    client
        .backend()
        .reject_tokens
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let api = Arc::new(client.app.api.clone());
    let calls = (0..8).map(|_| {
        let api = Arc::clone(&api);
        async move { api.list_articles(PageRequest::default()).await }
    });
    let results = futures::future::join_all(calls).await;
    assert!(results
        .iter()
        .all(|r| r.as_ref().err().is_some_and(ApiError::is_auth_failure)));

    let snapshot =
        wait_for_snapshot(&client.app.session.subscribe(), |s| s.is_unauthenticated()).await;
    assert!(snapshot.identity.is_none());

    // Let any duplicate handling surface before counting
    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut redirects = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Redirect(redirect) = event {
            redirects.push(redirect);
        }
    }
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].to.path(), "/login");
    assert_eq!(client.provider.sign_out_count(), 1);
}

#[tokio::test]
async fn test_shutdown_stops_session_service() {
    let mut client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    within(client.app.session.settled()).await.unwrap();

    client.app.shutdown();
    client.app.shutdown();

    // Snapshots stay readable after teardown
    assert!(client.app.session.snapshot().is_unauthenticated());
}

#[tokio::test]
async fn test_failed_action_before_first_report_keeps_loading() {
    let client = start_client_with(MockIdentityProvider::silent(), |config| {
        config.identity_timeout = Duration::from_secs(5);
    })
    .await;
    let identity = client
        .provider
        .add_account("ada@example.com", PASSWORD, Some("Ada"));

    let dismissed = client
        .app
        .session
        .sign_in_with(ExternalCredential {
            provider: ExternalProvider::Google,
            id_token: None,
        })
        .await;
    assert!(matches!(
        dismissed,
        Err(SessionError::Identity(IdentityError::Cancelled))
    ));
    assert!(client.app.session.snapshot().loading);

    let session = client.app.session.clone();
    let guard = client.app.auth_guard.clone();
    let decision = tokio::spawn(async move {
        guard
            .resolve(&session, &Location::parse("/my-articles"))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!decision.is_finished());

    client.provider.restore(identity);
    let decision = within(decision).await.unwrap().unwrap();
    assert_eq!(decision, GuardDecision::Granted);
}

#[tokio::test]
async fn test_failed_action_during_token_exchange_keeps_loading() {
    let client = start_client(MockIdentityProvider::new(), TokenStoreKind::Memory).await;
    within(client.app.session.settled()).await.unwrap();
    client
        .backend()
        .jwt_delay_ms
        .store(300, std::sync::atomic::Ordering::SeqCst);
    let identity = client
        .provider
        .add_account("ada@example.com", PASSWORD, None);
    let snapshots = client.app.session.subscribe();

    client.provider.restore(identity);
    wait_for_snapshot(&snapshots, |s| s.loading && s.identity.is_some()).await;

    let wrong = client.app.session.sign_in("ada@example.com", "nope").await;
    assert!(matches!(
        wrong,
        Err(SessionError::Identity(IdentityError::InvalidCredentials))
    ));

    let during_exchange = client.app.session.snapshot();
    assert!(during_exchange.loading);
    assert!(client
        .app
        .auth_guard
        .evaluate(&during_exchange, &Location::parse("/my-articles"))
        .is_loading());

    wait_for_snapshot(&snapshots, |s| s.is_authenticated()).await;
}

#[tokio::test]
async fn test_loading_stays_raised_until_first_report_resolves() {
    let client = start_client_with(MockIdentityProvider::silent(), |config| {
        config.identity_timeout = Duration::from_secs(5);
    })
    .await;
    let identity = client
        .provider
        .add_account("ada@example.com", PASSWORD, None);

    let mut rx = client.app.session.subscribe();
    let collector = tokio::spawn(async move {
        let mut seen = vec![rx.borrow_and_update().clone()];
        while !seen.last().is_some_and(SessionSnapshot::is_authenticated) {
            if rx.changed().await.is_err() {
                break;
            }
            seen.push(rx.borrow_and_update().clone());
        }
        seen
    });

    let session = &client.app.session;
    assert!(session.sign_in("ada@example.com", "nope").await.is_err());
    assert!(session
        .sign_in_with(ExternalCredential {
            provider: ExternalProvider::GitHub,
            id_token: None,
        })
        .await
        .is_err());
    assert!(session.update_profile(ProfileUpdate::default()).await.is_err());
    client.provider.restore(identity);

    let seen = within(collector).await.unwrap();
    let (last, before) = seen.split_last().unwrap();
    assert!(last.is_authenticated());
    assert!(before.iter().all(|s| s.loading), "unsettled snapshot: {before:?}");
}
