use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

mod common;

use common::{body_json, request, sample_book, TestApp};

async fn member(app: &TestApp) -> String {
    // ---
    app.activated_member("elrond", "elrond@rivendell.example").await
}

#[tokio::test]
async fn book_lifecycle_for_activated_member() {
    // ---
    let app = TestApp::new();
    let token = member(&app).await;

    // create
    let response = app
        .json(Method::POST, "/api/v1/books", sample_book(), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION].to_str().unwrap().to_string();
    let created = body_json(response).await;
    let id = created["book"]["id"].as_i64().unwrap();
    assert_eq!(location, format!("/api/v1/books/{id}"));
    assert_eq!(created["book"]["version"], 1);

    // anyone can read it
    let response = app.get(&location, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["book"]["title"], "The Fellowship of the Ring");

    // partial update
    let response = app
        .json(Method::PATCH, &location, json!({ "avg_rating": 4.9 }), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["book"]["avg_rating"], 4.9);
    assert_eq!(updated["book"]["author"], "J. R. R. Tolkien");
    assert_eq!(updated["book"]["version"], 2);

    // delete
    let response = app
        .send(request(Method::DELETE, &location, None, Some(&token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get(&location, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "the requested resource could not be found"
    );
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    // ---
    let app = TestApp::new();
    let token = member(&app).await;
    let response = app
        .json(Method::POST, "/api/v1/books", sample_book(), Some(&token))
        .await;
    let id = body_json(response).await["book"]["id"].as_i64().unwrap();
    let uri = format!("/api/v1/books/{id}");

    let response = app
        .json(Method::PATCH, &uri, json!({ "genre": "epic" }), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let req = Request::builder()
        .method(Method::PATCH)
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Expected-Version", "1")
        .body(Body::from(json!({ "genre": "myth" }).to_string()))
        .unwrap();
    let response = app.send(req).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_books_are_rejected_with_field_errors() {
    // ---
    let app = TestApp::new();
    let token = member(&app).await;

    let response = app
        .json(
            Method::POST,
            "/api/v1/books",
            json!({ "title": "Untitled", "isbn": "abc", "avg_rating": 7.5 }),
            Some(&token),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["author"], "must be provided");
    assert_eq!(body["error"]["pub_date"], "must be provided");
    assert_eq!(body["error"]["isbn"], "must contain only digits, hyphens, or X");
    assert_eq!(body["error"]["avg_rating"], "must be between 0 and 5");
}

#[tokio::test]
async fn malformed_and_unknown_fields_are_bad_requests() {
    // ---
    let app = TestApp::new();
    let token = member(&app).await;

    let mut with_extra = sample_book();
    with_extra["publisher"] = json!("Allen & Unwin");
    let response = app
        .json(Method::POST, "/api/v1/books", with_extra, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/books")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.send(req).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_filters_sorts_and_pages() {
    // ---
    let app = TestApp::new();
    let token = member(&app).await;

    for (title, rating) in [("The Hobbit", 4.7), ("The Silmarillion", 3.9), ("Farmer Giles", 3.5)] {
        let mut book = sample_book();
        book["title"] = json!(title);
        book["avg_rating"] = json!(rating);
        let response = app
            .json(Method::POST, "/api/v1/books", book, Some(&token))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .get("/api/v1/books?title=the&sort=-avg_rating&page_size=1", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["books"].as_array().unwrap().len(), 1);
    assert_eq!(body["books"][0]["title"], "The Hobbit");
    assert_eq!(body["@metadata"]["total_records"], 2);
    assert_eq!(body["@metadata"]["last_page"], 2);

    let response = app.get("/api/v1/books?sort=isbn&page=zero", None).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["sort"], "invalid sort value");
    assert_eq!(body["error"]["page"], "must be an integer value");
}

#[tokio::test]
async fn bad_ids_are_not_found() {
    // ---
    let app = TestApp::new();

    for uri in ["/api/v1/books/0", "/api/v1/books/-1", "/api/v1/books/abc", "/api/v1/books/99"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}
