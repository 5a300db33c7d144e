mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn category_crud() {
    let app = TestApp::new();
    let (token, _) = app.register("Alice", "alice@example.com").await;

    let (status, created) = app
        .json(
            Method::POST,
            "/api/categories",
            Some(&token),
            Some(json!({ "name": "Tops", "icon": "shirt", "color": "#ff0000" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, body) = app
        .json(Method::POST, "/api/categories", Some(&token), Some(json!({ "name": "Tops" })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["name"][0], "The name has already been taken.");

    let (status, updated) = app
        .json(
            Method::PUT,
            &format!("/api/categories/{id}"),
            Some(&token),
            Some(json!({ "description": "Upper body", "icon": null })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Tops");
    assert_eq!(updated["description"], "Upper body");
    assert!(updated["icon"].is_null());

    let (status, list) = app.get("/api/categories?search=upper", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["clothing_items_count"], 0);

    let (status, _) = app.json(Method::DELETE, &format!("/api/categories/{id}"), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/categories/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_with_items_cannot_be_deleted() {
    let app = TestApp::new();
    let (token, _) = app.register("Alice", "alice@example.com").await;
    let category_id = app.create_category(&token, "Tops").await;
    app.create_item(&token, json!({ "name": "Blue Tee", "category_id": category_id })).await;

    let (status, body) = app
        .json(Method::DELETE, &format!("/api/categories/{category_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["item_count"], 1);

    let (status, detail) = app.get(&format!("/api/categories/{category_id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["clothing_items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn category_detail_only_lists_the_callers_items() {
    let app = TestApp::new();
    let (alice, _) = app.register("Alice", "alice@example.com").await;
    let (bob, _) = app.register("Bob", "bob@example.com").await;
    let category_id = app.create_category(&alice, "Tops").await;
    app.create_item(&alice, json!({ "name": "Blue Tee", "category_id": category_id })).await;

    let (status, detail) = app.get(&format!("/api/categories/{category_id}"), &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Tops");
    assert!(detail["clothing_items"].as_array().unwrap().is_empty());

    let (_, list) = app.get("/api/categories", &bob).await;
    assert_eq!(list[0]["clothing_items_count"], 1);
}

#[tokio::test]
async fn wrongly_typed_fields_are_validation_errors() {
    let app = TestApp::new();
    let (token, _) = app.register("Alice", "alice@example.com").await;

    let (status, body) = app
        .json(Method::POST, "/api/categories", Some(&token), Some(json!({ "name": 5 })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].is_string());
    assert!(body["errors"]["name"][0].as_str().unwrap().starts_with("The name field is invalid"));
}
