mod common;

use axum::body::Bytes;

use wardrobe::categories::CategoryInput;
use wardrobe::client::{
    resolve, ApiClient, AuthStatus, AuthStore, CategoryStore, ClientError, ItemFilters, ItemStore,
    MemoryTokenStore, Navigation, Session, View,
};
use wardrobe::items::ItemInput;
use wardrobe::storage::UploadedImage;

use common::{TestApp, PNG};

/// Serves the app on an ephemeral port and returns the API base URL.
async fn spawn_server(app: &TestApp) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn png(name: &str) -> UploadedImage {
    UploadedImage {
        file_name: Some(name.into()),
        data: Bytes::from_static(PNG),
    }
}

#[tokio::test]
async fn stores_drive_a_full_session() {
    let app = TestApp::new();
    let base = spawn_server(&app).await;
    let session = Session::new(MemoryTokenStore::new());
    let api = ApiClient::new(&base, session.clone()).unwrap();

    let mut auth = AuthStore::new(api.clone());
    auth.register("Alice", "alice@example.com", "password123").await.unwrap();
    assert_eq!(auth.status, AuthStatus::Authenticated);
    assert!(auth.is_authenticated());
    assert!(!auth.loading);
    assert_eq!(resolve("/items", &session), Navigation::Render(View::Items));

    let mut categories = CategoryStore::new(api.clone());
    let tops = categories
        .create(&CategoryInput {
            name: Some("Tops".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(categories.get_by_id(tops.id).unwrap().clothing_items_count, 0);

    let mut items = ItemStore::new(api.clone());
    let created = items
        .create_item(&ItemInput {
            name: Some("Blue Tee".into()),
            category_id: Some(tops.id),
            color: Some(Some("blue".into())),
            image: Some(png("tee.png")),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(created.item.image_path.is_some());
    assert_eq!(items.items.len(), 1);

    items
        .create_item(&ItemInput {
            name: Some("Red Tee".into()),
            category_id: Some(tops.id),
            color: Some(Some("red".into())),
            ..Default::default()
        })
        .await
        .unwrap();

    let filters = ItemFilters {
        colors: vec!["blue".into()],
        ..Default::default()
    };
    items.fetch_items(1, Some(filters)).await.unwrap();
    assert_eq!(items.items.len(), 1);
    assert_eq!(items.pagination.per_page, 12);
    assert_eq!(items.pagination.total, 1);

    let toggled = items.toggle_favorite(created.item.id).await.unwrap();
    assert!(toggled.item.favorite);
    assert!(items.items[0].item.favorite);

    items.fetch_filter_options().await.unwrap();
    assert_eq!(items.filter_options.colors, ["blue", "red"]);

    items.remove_image(created.item.id).await.unwrap();
    assert!(items.items[0].item.image_path.is_none());
    let uploaded = items.upload_image(created.item.id, &png("again.png")).await.unwrap();
    assert_eq!(items.items[0].item.image_path.as_deref(), Some(uploaded.image_path.as_str()));

    match categories.delete(tops.id).await {
        Err(ClientError::Conflict { item_count, .. }) => assert_eq!(item_count, Some(2)),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert!(categories.error.is_some());
    assert!(categories.get_by_id(tops.id).is_some());

    items.delete_item(created.item.id).await.unwrap();
    assert!(items.items.is_empty());

    auth.logout().await.unwrap();
    assert_eq!(auth.status, AuthStatus::Anonymous);
    assert!(!session.has_token());
    assert_eq!(resolve("/items", &session), Navigation::Redirect("/login".into()));
}

#[tokio::test]
async fn unauthorized_response_forces_logout() {
    let app = TestApp::new();
    let base = spawn_server(&app).await;
    let session = Session::new(MemoryTokenStore::with_token("revoked-or-forged"));
    let api = ApiClient::new(&base, session.clone()).unwrap();

    let mut items = ItemStore::new(api.clone());
    let err = items.fetch_items(1, None).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert_eq!(items.error.as_deref(), Some("Unauthenticated."));
    assert!(!items.loading);

    assert!(!session.has_token());
    assert_eq!(session.take_redirect().as_deref(), Some("/login"));

    let mut auth = AuthStore::new(api);
    auth.fetch_user().await.unwrap();
    assert_eq!(auth.status, AuthStatus::Anonymous);
}

#[tokio::test]
async fn failed_login_keeps_the_error() {
    let app = TestApp::new();
    app.register("Alice", "alice@example.com").await;
    let base = spawn_server(&app).await;
    let api = ApiClient::new(&base, Session::new(MemoryTokenStore::new())).unwrap();

    let mut auth = AuthStore::new(api);
    assert!(auth.login("alice@example.com", "wrong-password").await.is_err());
    assert_eq!(auth.status, AuthStatus::Anonymous);
    assert_eq!(auth.error.as_deref(), Some("Invalid credentials"));

    auth.login("alice@example.com", "password123").await.unwrap();
    assert_eq!(auth.status, AuthStatus::Authenticated);
    assert_eq!(auth.user.as_ref().map(|u| u.email.as_str()), Some("alice@example.com"));
}
