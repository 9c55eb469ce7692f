mod common;

use axum::http::{Method, StatusCode, header};
use serde_json::json;
use uuid::Uuid;

use common::TestApp;
use folio_api::session::TokenCarrier;

const PLAN: &[u8] = b"%PDF-1.7 research plan";

#[tokio::test]
async fn owner_invites_participant_who_uploads() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;
    let bob = app.signed_up("bob").await;

    let project = app.project(&alice, "Thesis").await;
    let info = format!("/project/{}/info", project);
    let documents = format!("/project/{}/documents", project);

    // Not invited yet.
    assert_eq!(app.get(&info, Some(&bob)).await.status, StatusCode::FORBIDDEN);
    assert_eq!(app.upload(&project, &bob, &[("plan.pdf", PLAN)]).await.status, StatusCode::FORBIDDEN);

    let invite = format!("/project/{}/invite", project);
    let invited = app.json(Method::POST, &invite, Some(&alice), json!({ "login": "bob" })).await;
    assert_eq!(invited.status, StatusCode::CREATED);

    let again = app.json(Method::POST, &invite, Some(&alice), json!({ "login": "bob" })).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let viewed = app.get(&info, Some(&bob)).await;
    assert_eq!(viewed.status, StatusCode::OK);
    assert_eq!(viewed.json()["role"], "participant");

    let uploaded = app.upload(&project, &bob, &[("plan.pdf", PLAN)]).await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    let document = uploaded.json()["documents"][0].clone();
    assert_eq!(document["original_filename"], "plan.pdf");
    assert_eq!(document["file_type"], "pdf");
    assert_eq!(document["uploaded_by"], "bob");
    let document_id = document["id"].as_str().unwrap().to_string();

    let listed = app.get(&documents, Some(&alice)).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json().as_array().unwrap().len(), 1);

    let download = app.get(&format!("/document/{}", document_id), Some(&alice)).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(download.body, PLAN);
    assert_eq!(download.headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        download.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"plan.pdf\""
    );

    // Owner-only operations stay closed to the participant.
    assert_eq!(app.delete(&format!("/project/{}", project), Some(&bob)).await.status, StatusCode::FORBIDDEN);
    let renamed_project = app.json(Method::PUT, &info, Some(&bob), json!({ "name": "Mine now" })).await;
    assert_eq!(renamed_project.status, StatusCode::FORBIDDEN);
    let bob_invites = app.json(Method::POST, &invite, Some(&bob), json!({ "login": "alice" })).await;
    assert_eq!(bob_invites.status, StatusCode::FORBIDDEN);

    // Document edits are open to any member.
    let renamed = app
        .json(
            Method::PUT,
            &format!("/document/{}", document_id),
            Some(&bob),
            json!({ "original_filename": "final-plan.pdf" }),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.json()["original_filename"], "final-plan.pdf");

    assert_eq!(app.blob_count(), 1);
    let removed = app.delete(&format!("/document/{}", document_id), Some(&alice)).await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(app.blob_count(), 0);
    assert!(app.get(&documents, Some(&bob)).await.json().as_array().unwrap().is_empty());
    assert_eq!(
        app.get(&format!("/document/{}", document_id), Some(&alice)).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn project_listing_is_scoped_to_membership() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;
    let bob = app.signed_up("bob").await;

    let shared = app.project(&alice, "Shared").await;
    app.project(&alice, "Private").await;
    app.json(
        Method::POST,
        &format!("/project/{}/invite", shared),
        Some(&alice),
        json!({ "login": "bob" }),
    )
    .await;

    let alice_projects = app.get("/projects", Some(&alice)).await.json();
    assert_eq!(alice_projects.as_array().unwrap().len(), 2);
    assert!(alice_projects.as_array().unwrap().iter().all(|p| p["role"] == "owner"));

    let bob_projects = app.get("/projects", Some(&bob)).await.json();
    let bob_projects = bob_projects.as_array().unwrap();
    assert_eq!(bob_projects.len(), 1);
    assert_eq!(bob_projects[0]["id"], shared.as_str());
    assert_eq!(bob_projects[0]["role"], "participant");
}

#[tokio::test]
async fn owner_updates_and_deletes_project() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;
    let project = app.project(&alice, "Thesis").await;
    let info = format!("/project/{}/info", project);

    let updated = app.json(Method::PUT, &info, Some(&alice), json!({ "name": "Dissertation" })).await;
    assert_eq!(updated.status, StatusCode::OK);
    let body = updated.json();
    assert_eq!(body["name"], "Dissertation");
    assert_eq!(body["description"], "drafts and notes");

    let uploaded = app
        .upload(&project, &alice, &[("notes.docx", &b"PK"[..]), ("plan.pdf", PLAN)])
        .await;
    assert_eq!(uploaded.status, StatusCode::CREATED);
    assert_eq!(app.blob_count(), 2);

    assert_eq!(app.delete(&format!("/project/{}", project), Some(&alice)).await.status, StatusCode::OK);
    assert_eq!(app.blob_count(), 0);
    assert_eq!(app.get(&info, Some(&alice)).await.status, StatusCode::NOT_FOUND);
    assert!(app.get("/projects", Some(&alice)).await.json().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejected_upload_stores_nothing() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;
    let project = app.project(&alice, "Thesis").await;

    let mixed = app
        .upload(&project, &alice, &[("plan.pdf", PLAN), ("payload.exe", &b"MZ"[..])])
        .await;
    assert_eq!(mixed.status, StatusCode::BAD_REQUEST);

    let listed = app.get(&format!("/project/{}/documents", project), Some(&alice)).await;
    assert!(listed.json().as_array().unwrap().is_empty());
    assert_eq!(app.blob_count(), 0);

    // Extensions match case-insensitively.
    let upper = app.upload(&project, &alice, &[("SCAN.PDF", PLAN)]).await;
    assert_eq!(upper.status, StatusCode::CREATED);
    assert_eq!(upper.json()["documents"][0]["file_type"], "pdf");
}

#[tokio::test]
async fn missing_resources_are_404_before_403() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;
    let missing = Uuid::new_v4();

    assert_eq!(
        app.get(&format!("/project/{}/info", missing), Some(&alice)).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.get(&format!("/document/{}", missing), Some(&alice)).await.status,
        StatusCode::NOT_FOUND
    );

    let project = app.project(&alice, "Thesis").await;
    let unknown_invitee = app
        .json(
            Method::POST,
            &format!("/project/{}/invite", project),
            Some(&alice),
            json!({ "login": "nobody" }),
        )
        .await;
    assert_eq!(unknown_invitee.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let app = TestApp::new(TokenCarrier::Bearer).await;
    let alice = app.signed_up("alice").await;

    let blank = app.json(Method::POST, "/projects", Some(&alice), json!({ "name": "   " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let project = app.project(&alice, "Thesis").await;
    let uploaded = app.upload(&project, &alice, &[("plan.pdf", PLAN)]).await.json();
    let document_id = uploaded["documents"][0]["id"].as_str().unwrap().to_string();

    let rename = app
        .json(
            Method::PUT,
            &format!("/document/{}", document_id),
            Some(&alice),
            json!({ "original_filename": "" }),
        )
        .await;
    assert_eq!(rename.status, StatusCode::BAD_REQUEST);
}
