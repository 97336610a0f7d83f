use axum::http::{header, StatusCode};
use serde_json::json;

use super::{Multipart, TestApp};
use crate::database::models::Role;

#[tokio::test]
async fn ping_needs_no_token() {
    let app = TestApp::new();
    let res = app.get("/ping", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ALIVE");
    assert_eq!(res.body["message"], "pong");
    assert!(res.body["time"].as_str().unwrap().ends_with('Z'));
    assert_eq!(res.body["debug"], "100% clean");
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn health_reports_database() {
    let app = TestApp::new();
    let res = app.get("/health", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["database"], "ok");
}

#[tokio::test]
async fn missing_malformed_and_expired_tokens_are_401_before_the_data_layer() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let expired = app.expired_token_for(&user);

    for token in [None, Some("not-a-token"), Some(expired.as_str())] {
        for uri in ["/markers", "/me", "/objects", "/marker/1"] {
            let res = app.get(uri, token).await;
            assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri} with {token:?}");
            assert_eq!(res.body["status"], "error");
        }
    }

    let res = app
        .post_form("/upload", Some("not-a-token"), Multipart::new().text("lat", "1").text("lon", "1"))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.calls(), 0);
    assert_eq!(app.store.marker_count(), 0);
}

#[tokio::test]
async fn admin_routes_refuse_user_tokens() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let token = app.token_for(&user);

    for uri in ["/admin/users", "/admin/object", "/assignments", "/markers/by-object/1"] {
        let res = app.get(uri, Some(&token)).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{uri}");
    }
    let res = app
        .post_json("/assignments/toggle", Some(&token), json!({ "user_id": user.id, "object_id": 1 }))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    assert_eq!(app.store.calls(), 0);
}

#[tokio::test]
async fn users_only_see_markers_of_their_objects() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let mine = app.store.add_object("North kennel");
    let other = app.store.add_object("South kennel");
    app.store.appoint(user.id, mine.id);

    let visible = app.store.add_marker(Some(mine.id));
    app.store.add_marker(Some(other.id));
    app.store.add_marker(None);

    let res = app.get("/markers", Some(&app.token_for(&user))).await;
    assert_eq!(res.status, StatusCode::OK);
    let markers = res.body["markers"].as_array().unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0]["id"], visible.id);
    assert_eq!(markers[0]["object_name"], "North kennel");
}

#[tokio::test]
async fn users_without_appointments_see_no_markers() {
    let app = TestApp::new();
    let user = app.store.add_user("newbie", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.add_marker(Some(object.id));
    app.store.add_marker(None);

    let res = app.get("/markers", Some(&app.token_for(&user))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["markers"], json!([]));
}

#[tokio::test]
async fn admins_see_every_marker() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let object = app.store.add_object("Kennel");
    app.store.add_marker(Some(object.id));
    app.store.add_marker(None);

    let res = app.get("/markers", Some(&app.token_for(&admin))).await;
    assert_eq!(res.body["markers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn creating_a_marker_without_photos() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.appoint(user.id, object.id);

    let res = app
        .post_form(
            "/upload",
            Some(&app.token_for(&user)),
            Multipart::new()
                .text("lat", "51.5")
                .text("lon", "-0.1")
                .text("object_id", &object.id.to_string()),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "success");
    assert_eq!(res.body["marker"]["lat"], json!(51.5));
    assert_eq!(res.body["marker"]["lon"], json!(-0.1));
    assert_eq!(res.body["marker"]["color"], "green");
    assert_eq!(res.body["marker"]["photos"], json!([]));
    assert_eq!(app.store.marker_count(), 1);
}

#[tokio::test]
async fn non_numeric_latitude_is_rejected_without_a_row() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);

    let res = app
        .post_form(
            "/upload",
            Some(&app.token_for(&user)),
            Multipart::new().text("lat", "fifty-one").text("lon", "-0.1"),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "error");
    assert!(res.body["message"].as_str().unwrap().contains("lat"));
    assert_eq!(app.store.marker_count(), 0);
    assert!(app.blobs.keys().is_empty());
}

#[tokio::test]
async fn photos_are_uploaded_under_the_marker_id() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.appoint(user.id, object.id);

    let form = Multipart::new()
        .text("lat", "1.5")
        .text("lon", "2.5")
        .text("object_id", &object.id.to_string())
        .text("color", "red")
        .file("photos", "dog one.jpg", "image/jpeg", b"jpeg-bytes")
        .file("photos", "empty.jpg", "image/jpeg", b"");
    let res = app.post_form("/upload", Some(&app.token_for(&user)), form).await;

    assert_eq!(res.status, StatusCode::CREATED);
    let marker = &res.body["marker"];
    let id = marker["id"].as_i64().unwrap();
    assert_eq!(marker["object_id"], object.id);
    assert_eq!(marker["color"], "red");

    let photos = marker["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    let key = photos[0]["blob_path"].as_str().unwrap();
    assert!(key.starts_with(&format!("markers/{id}/")));
    assert!(key.ends_with("dog_one.jpg"));
    assert_eq!(app.blobs.keys(), vec![key.to_string()]);
}

#[tokio::test]
async fn failed_upload_leaves_no_marker_and_no_blobs() {
    let app = TestApp::new();
    let user = app.store.add_user("boss", Role::Admin);
    app.blobs.fail_upload(2);

    let form = Multipart::new()
        .text("lat", "1")
        .text("lon", "1")
        .file("photos", "a.jpg", "image/jpeg", b"a")
        .file("photos", "b.jpg", "image/jpeg", b"b");
    let res = app.post_form("/upload", Some(&app.token_for(&user)), form).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["status"], "error");
    assert_eq!(app.store.marker_count(), 0);
    assert!(app.blobs.keys().is_empty());
    assert_eq!(app.blobs.deleted().len(), 1);
}

#[tokio::test]
async fn failed_insert_deletes_uploaded_blobs() {
    let app = TestApp::new();
    let user = app.store.add_user("boss", Role::Admin);
    app.store.fail_inserts();

    let form = Multipart::new()
        .text("lat", "1")
        .text("lon", "1")
        .file("photo", "a.jpg", "image/jpeg", b"a");
    let res = app.post_form("/upload", Some(&app.token_for(&user)), form).await;

    assert!(res.status.is_server_error());
    assert_eq!(app.store.marker_count(), 0);
    assert!(app.blobs.keys().is_empty());
    assert_eq!(app.blobs.deleted().len(), 1);
}

#[tokio::test]
async fn only_admins_keep_markers_without_an_object() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let admin = app.store.add_user("boss", Role::Admin);
    let object = app.store.add_object("Kennel");
    app.store.appoint(user.id, object.id);
    let token = app.token_for(&user);

    let res = app
        .post_form("/upload", Some(&token), Multipart::new().text("lat", "1").text("lon", "1"))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["field_errors"]["object_id"], "is required");
    assert_eq!(app.store.marker_count(), 0);

    let marker = app.store.add_marker(Some(object.id));
    let uri = format!("/marker/{}", marker.id);
    let res = app.post_form(&uri, Some(&token), Multipart::new().text("object_id", "")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let res = app.get(&uri, Some(&token)).await;
    assert_eq!(res.body["marker"]["object_id"], object.id);

    let res = app
        .post_form(
            "/upload",
            Some(&app.token_for(&admin)),
            Multipart::new().text("lat", "1").text("lon", "1"),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["marker"]["object_id"], json!(null));
}

#[tokio::test]
async fn markers_cannot_be_attached_to_foreign_or_missing_objects() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let foreign = app.store.add_object("Elsewhere");
    let token = app.token_for(&user);

    let res = app
        .post_form(
            "/upload",
            Some(&token),
            Multipart::new().text("lat", "1").text("lon", "1").text("object_id", &foreign.id.to_string()),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post_form(
            "/upload",
            Some(&token),
            Multipart::new().text("lat", "1").text("lon", "1").text("object_id", "9999"),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.marker_count(), 0);
}

#[tokio::test]
async fn markers_outside_the_callers_objects_are_not_found() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Elsewhere");
    let marker = app.store.add_marker(Some(object.id));
    let token = app.token_for(&user);
    let uri = format!("/marker/{}", marker.id);

    assert_eq!(app.get(&uri, Some(&token)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::NOT_FOUND);
    let res = app.post_form(&uri, Some(&token), Multipart::new().text("note", "mine now")).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.marker_count(), 1);
}

#[tokio::test]
async fn editing_a_marker_swaps_photos() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let marker = app.store.add_marker(None);
    let old = app.store.add_photo(marker.id, "markers/old.jpg");
    app.blobs.insert("markers/old.jpg");

    let form = Multipart::new()
        .text("note", "  limping  ")
        .text("delete_photo", &old.id.to_string())
        .file("photos", "new.png", "image/png", b"png");
    let res = app
        .post_form(&format!("/marker/{}", marker.id), Some(&app.token_for(&admin)), form)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    let edited = &res.body["marker"];
    assert_eq!(edited["note"], "limping");
    assert_eq!(edited["lat"], json!(marker.lat));
    let photos = edited["photos"].as_array().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0]["filename"], "new.png");
    assert_eq!(app.blobs.deleted(), vec!["markers/old.jpg".to_string()]);
    assert!(!app.blobs.keys().contains(&"markers/old.jpg".to_string()));
}

#[tokio::test]
async fn deleting_a_marker_deletes_its_blobs() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.appoint(user.id, object.id);
    let marker = app.store.add_marker(Some(object.id));
    app.store.add_photo(marker.id, "markers/a.jpg");
    app.store.add_photo(marker.id, "markers/b.jpg");
    app.blobs.insert("markers/a.jpg");
    app.blobs.insert("markers/b.jpg");

    let res = app
        .delete(&format!("/marker/{}", marker.id), Some(&app.token_for(&user)))
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(app.store.marker_count(), 0);
    assert!(app.blobs.keys().is_empty());
    assert_eq!(app.blobs.deleted().len(), 2);
}

#[tokio::test]
async fn photo_route_redirects_to_public_url() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.appoint(user.id, object.id);
    let marker = app.store.add_marker(Some(object.id));
    let photo = app.store.add_photo(marker.id, "markers/1/dog.jpg");

    let res = app.get("/photo/markers/1/dog.jpg", Some(&app.token_for(&user))).await;
    assert_eq!(res.status, StatusCode::FOUND);
    assert_eq!(res.headers[header::LOCATION], photo.url.as_str());

    let stranger = app.store.add_user("stranger", Role::User);
    let res = app.get("/photo/markers/1/dog.jpg", Some(&app.token_for(&stranger))).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_returns_profile_and_objects() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    app.store.add_object("Other");
    app.store.appoint(user.id, object.id);

    let res = app.get("/me", Some(&app.token_for(&user))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["user"]["telegram_username"], "walker");
    assert_eq!(res.body["user"]["role"], "user");
    assert_eq!(res.body["objects"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["objects"][0]["name"], "Kennel");
}

#[tokio::test]
async fn creating_an_object_appoints_the_creator() {
    let app = TestApp::new();
    let user = app.store.add_user("walker", Role::User);
    let token = app.token_for(&user);

    let res = app.post_json("/objects", Some(&token), json!({ "name": "  Shelter  " })).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["object"]["name"], "Shelter");
    let id = res.body["object"]["id"].as_i64().unwrap();
    assert!(app.store.is_appointed(user.id, id));

    let res = app.get("/objects", Some(&token)).await;
    assert_eq!(res.body["objects"][0]["id"], id);
}

#[tokio::test]
async fn duplicate_object_names_are_rejected() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let token = app.token_for(&admin);

    let first = app.post_json("/admin/object", Some(&token), json!({ "name": "Kennel" })).await;
    assert_eq!(first.status, StatusCode::CREATED);

    let second = app.post_json("/admin/object", Some(&token), json!({ "name": "Kennel" })).await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["code"], "CONFLICT");
    assert_eq!(app.store.objects_named("Kennel"), 1);

    let blank = app.post_json("/admin/object", Some(&token), json!({ "name": " " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_object_lifecycle() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let token = app.token_for(&admin);
    let object = app.store.add_object("Kennel");
    let uri = format!("/admin/object/{}", object.id);

    let res = app
        .post_json(&uri, Some(&token), json!({ "name": "Kennel 2", "additional_info": "east wing" }))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["object"]["additional_info"], "east wing");

    assert_eq!(app.get(&uri, Some(&token)).await.body["object"]["name"], "Kennel 2");
    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::OK);
    assert_eq!(app.get(&uri, Some(&token)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn toggling_twice_restores_the_assignment() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let user = app.store.add_user("walker", Role::User);
    let object = app.store.add_object("Kennel");
    let token = app.token_for(&admin);
    let body = json!({ "user_id": user.id, "object_id": object.id.to_string() });

    let first = app.post_json("/assignments/toggle", Some(&token), body.clone()).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["assigned"], true);
    assert!(app.store.is_appointed(user.id, object.id));

    let second = app.post_json("/assignments/toggle", Some(&token), body).await;
    assert_eq!(second.body["assigned"], false);
    assert!(!app.store.is_appointed(user.id, object.id));
}

#[tokio::test]
async fn toggle_rejects_unknown_and_malformed_ids() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let object = app.store.add_object("Kennel");
    let token = app.token_for(&admin);

    let res = app
        .post_json("/assignments/toggle", Some(&token), json!({ "user_id": 999, "object_id": object.id }))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .post_json("/assignments/toggle", Some(&token), json!({ "user_id": "abc", "object_id": object.id }))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assignments_overview_lists_the_matrix() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let object = app.store.add_object("Kennel");
    app.store.appoint(admin.id, object.id);

    let res = app.get("/assignments", Some(&app.token_for(&admin))).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["users"].as_array().unwrap().len(), 1);
    assert_eq!(res.body["objects"].as_array().unwrap().len(), 1);
    assert_eq!(
        res.body["assignments"],
        json!([{ "user_id": admin.id, "object_id": object.id }])
    );
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);

    let res = app
        .delete(&format!("/admin/user/{}", admin.id), Some(&app.token_for(&admin)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.store.has_user(admin.id));
}

#[tokio::test]
async fn user_management() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let token = app.token_for(&admin);

    let res = app
        .post_json("/admin/user", Some(&token), json!({ "telegram_username": "@rex", "full_name": "Rex" }))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["user"]["telegram_username"], "rex");
    assert_eq!(res.body["user"]["role"], "user");
    let id = res.body["user"]["id"].as_i64().unwrap();

    let dup = app
        .post_json("/admin/user", Some(&token), json!({ "telegram_username": "rex" }))
        .await;
    assert_eq!(dup.status, StatusCode::BAD_REQUEST);

    let res = app
        .post_json(&format!("/admin/user/{id}"), Some(&token), json!({ "role": "admin" }))
        .await;
    assert_eq!(res.body["user"]["role"], "admin");
    assert_eq!(res.body["user"]["full_name"], "Rex");

    let res = app.get("/admin/users", Some(&token)).await;
    assert_eq!(res.body["users"].as_array().unwrap().len(), 2);

    assert_eq!(
        app.delete(&format!("/admin/user/{id}"), Some(&token)).await.status,
        StatusCode::OK
    );
    assert!(!app.store.has_user(id));
    assert_eq!(
        app.delete(&format!("/admin/user/{id}"), Some(&token)).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn markers_by_object_for_admins() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let object = app.store.add_object("Kennel");
    app.store.add_marker(Some(object.id));
    app.store.add_marker(None);
    let token = app.token_for(&admin);

    let res = app.get(&format!("/markers/by-object/{}", object.id), Some(&token)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["markers"].as_array().unwrap().len(), 1);

    let res = app.get("/markers/by-object/9999", Some(&token)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_json_and_paths_get_error_envelopes() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);
    let token = app.token_for(&admin);

    let res = app.get("/admin/object/abc", Some(&token)).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "error");

    let res = app
        .send(
            axum::http::Request::builder()
                .method("POST")
                .uri("/admin/object")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["code"], "INVALID_JSON");
}

#[tokio::test]
async fn uploads_must_be_multipart() {
    let app = TestApp::new();
    let admin = app.store.add_user("boss", Role::Admin);

    let res = app
        .post_json("/upload", Some(&app.token_for(&admin)), json!({ "lat": 1.0, "lon": 2.0 }))
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "error");
    assert_eq!(res.body["code"], "BAD_REQUEST");
    assert_eq!(app.store.marker_count(), 0);
}

#[tokio::test]
async fn deleted_users_lose_their_session() {
    let app = TestApp::new();
    let user = app.store.add_user("ghost", Role::User);
    let token = app.token_for(&user);
    let admin = app.store.add_user("boss", Role::Admin);
    app.delete(&format!("/admin/user/{}", user.id), Some(&app.token_for(&admin)))
        .await;

    let res = app.get("/me", Some(&token)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}
