//! User accounts, application onboarding and resource CRUD

mod helpers;

use axum::http::StatusCode;
use gym_access::TokenKind;
use helpers::{Creds, TestRouter};
use serde_json::json;

#[tokio::test]
async fn test_registration_and_login_errors() {
    let router = TestRouter::new().await;
    let none = Creds::none();

    let (status, user) = router
        .post(
            "/register",
            &none,
            json!({ "email": "Lifter@Example.com", "password": "deadlift-99" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "lifter@example.com");
    assert!(user.get("password_hash").is_none());

    let (status, body) = router
        .post(
            "/register",
            &none,
            json!({ "email": "lifter@example.com", "password": "another-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = router
        .post(
            "/register",
            &none,
            json!({ "email": "short@example.com", "password": "tiny" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = router
        .post(
            "/login",
            &none,
            json!({ "email": "lifter@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, unknown) = router
        .post(
            "/login",
            &none,
            json!({ "email": "ghost@example.com", "password": "whatever-123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["message"], body["message"]);
}

#[tokio::test]
async fn test_login_token_carries_store_roles() {
    let router = TestRouter::new().await;
    router
        .state
        .policy
        .assign_role("coach@example.com", "trainer")
        .await
        .unwrap();

    let token = router.login("coach@example.com", "whistle-1234").await;
    let identity = router.state.tokens.validate(&token).unwrap();

    assert_eq!(identity.subject, "coach@example.com");
    assert_eq!(identity.roles, vec!["trainer".to_string()]);
    assert_eq!(identity.kind, TokenKind::User);
}

#[tokio::test]
async fn test_application_approval_workflow() {
    let router = TestRouter::new().await;
    let admin = router.admin().await;
    let none = Creds::none();

    let (status, application) = router
        .post(
            "/applications/register",
            &none,
            json!({ "name": "Rep Counter", "email": "app@reps.example" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(application["status"], "pending");
    let id = application["id"].as_str().unwrap().to_string();

    // Pending applications get no token
    let (status, body) = router
        .post("/applications/token", &none, json!({ "email": "app@reps.example" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    // pending is not a review outcome
    let (status, _) = router
        .put(
            &format!("/applications/{}/status", id),
            &admin,
            Some(json!({ "status": "pending" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = router
        .put(
            &format!("/applications/{}/status", id),
            &admin,
            Some(json!({ "status": "approved" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, issued) = router
        .post("/applications/token", &none, json!({ "email": "app@reps.example" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["token_type"], "Bearer");
    let token = issued["token"].as_str().unwrap().to_string();
    assert_eq!(
        router.state.tokens.validate(&token).unwrap().kind,
        TokenKind::Application
    );

    // The application is an ordinary subject to the policy
    let app = Creds::bearer(&token);
    let (status, _) = router.get("/exercises", &app).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    router
        .state
        .policy
        .add_permission("app@reps.example", "exercises", "read")
        .await
        .unwrap();
    let (status, _) = router.get("/exercises", &app).await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = router.get("/applications", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = router
        .delete(&format!("/applications/{}", id), &admin, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = router
        .put(
            &format!("/applications/{}/status", id),
            &admin,
            Some(json!({ "status": "rejected" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_exercise_crud() {
    let router = TestRouter::new().await;
    let admin = router.admin().await;

    let (status, body) = router
        .post(
            "/exercises",
            &admin,
            json!({ "name": "", "primary_muscles": "chest", "type": "strength", "focus": "push" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, created) = router
        .post(
            "/exercises",
            &admin,
            json!({
                "name": "Bench Press",
                "primary_muscles": "chest",
                "secondary_muscles": "triceps",
                "type": "strength",
                "focus": "push"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["type"], "strength");
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/exercises/{}", id);

    let (status, fetched) = router.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = router
        .put(
            &uri,
            &admin,
            Some(json!({
                "name": "Incline Bench Press",
                "primary_muscles": "chest",
                "type": "strength",
                "focus": "push"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id.as_str());
    assert_eq!(updated["name"], "Incline Bench Press");

    let (_, listed) = router.get("/exercises", &admin).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = router.delete(&uri, &admin, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = router.get(&uri, &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Exercise not found");
}

#[tokio::test]
async fn test_routine_owner_is_the_caller() {
    let router = TestRouter::new().await;
    let policy = &router.state.policy;
    for action in ["read", "create", "update"] {
        policy
            .add_permission("athlete", "routines", action)
            .await
            .unwrap();
    }
    policy
        .assign_role("runner@example.com", "athlete")
        .await
        .unwrap();
    let runner = Creds::bearer(&router.token_for("runner@example.com"));

    let (status, routine) = router
        .post(
            "/routines",
            &runner,
            json!({
                "name": "Leg day",
                "description": "Heavy lower body",
                "exercises": [
                    { "exercise_id": "squat", "order": 1,
                      "sets": [{ "reps": 5, "weight": 100.0, "rest": 180 }] }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(routine["owner"], "runner@example.com");
    let uri = format!("/routines/{}", routine["id"].as_str().unwrap());

    let (status, updated) = router
        .put(
            &uri,
            &runner,
            Some(json!({ "name": "Leg day v2", "exercises": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["owner"], "runner@example.com");
    assert_eq!(updated["created_at"], routine["created_at"]);
    assert_eq!(updated["exercises"], json!([]));

    let (status, fetched) = router.get(&uri, &runner).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Leg day v2");

    // athletes cannot delete
    let (status, _) = router.delete(&uri, &runner, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
