mod common;

use study_vault::api::error::AppError;
use study_vault::services::accounts::{AccountService, LoginRequest, ProfileUpdate};

#[tokio::test]
async fn test_registration_creates_profile() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let (_, bob) = common::register(&ctx.state, "bob").await;
    let lookups = common::create_lookups(&ctx.state).await;
    common::create_material(&ctx.state, &alice, &lookups, "Notes", b"%PDF").await;
    let db = &ctx.state.db;

    let own = AccountService::profile(db, &alice, "alice").await.unwrap();
    assert!(own.editable);
    assert!(!own.is_staff);
    assert_eq!(own.materials_uploaded, 1);
    assert!(own.bio.is_none());
    assert!(!own.has_avatar);

    let seen_by_bob = AccountService::profile(db, &bob, "alice").await.unwrap();
    assert!(!seen_by_bob.editable);

    let missing = AccountService::profile(db, &bob, "nobody").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_update_profile_limits() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let db = &ctx.state.db;

    let updated = AccountService::update_profile(
        db,
        &alice,
        ProfileUpdate {
            university: Some("Dhaka University".to_string()),
            subject: Some("Computer Science".to_string()),
            bio: Some("Third year".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.university.as_deref(), Some("Dhaka University"));
    assert_eq!(updated.bio.as_deref(), Some("Third year"));

    let too_long = AccountService::update_profile(
        db,
        &alice,
        ProfileUpdate {
            department: Some("d".repeat(121)),
            ..Default::default()
        },
    )
    .await;
    match too_long {
        Err(AppError::Validation(errors)) => assert!(errors.contains("department")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_and_staff_flag() {
    let ctx = common::setup().await;
    common::register(&ctx.state, "alice").await;
    let db = &ctx.state.db;
    let secret = &ctx.state.config.jwt_secret;

    let ok = AccountService::login(
        db,
        LoginRequest {
            username: "alice".to_string(),
            password: "password123".to_string(),
        },
        secret,
        1,
    )
    .await;
    assert!(ok.is_ok());

    let unknown = AccountService::login(
        db,
        LoginRequest {
            username: "mallory".to_string(),
            password: "password123".to_string(),
        },
        secret,
        1,
    )
    .await;
    assert!(matches!(unknown, Err(AppError::Unauthorized(_))));

    AccountService::set_staff(db, "alice", true).await.unwrap();
    let (_, viewer) = common::register(&ctx.state, "bob").await;
    assert!(AccountService::profile(db, &viewer, "alice").await.unwrap().is_staff);

    let missing = AccountService::set_staff(db, "nobody", true).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_avatar_key_replacement() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let db = &ctx.state.db;

    assert!(matches!(
        AccountService::avatar_key(db, "alice").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        AccountService::avatar_key(db, "nobody").await,
        Err(AppError::NotFound(_))
    ));

    let previous = AccountService::set_avatar(db, &alice.id, "avatars/a.png").await.unwrap();
    assert_eq!(previous, None);

    let previous = AccountService::set_avatar(db, &alice.id, "avatars/b.jpg").await.unwrap();
    assert_eq!(previous.as_deref(), Some("avatars/a.png"));
    assert_eq!(AccountService::avatar_key(db, "alice").await.unwrap(), "avatars/b.jpg");

    // Same key again has nothing to clean up
    let previous = AccountService::set_avatar(db, &alice.id, "avatars/b.jpg").await.unwrap();
    assert_eq!(previous, None);
    assert!(AccountService::profile(db, &alice, "alice").await.unwrap().has_avatar);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_registrations_for_one_username() {
    use study_vault::services::accounts::RegisterRequest;

    let ctx = common::setup_file_backed().await;

    let mut handles = Vec::new();
    for _ in 0..5 {
        let db = ctx.state.db.clone();
        let secret = ctx.state.config.jwt_secret.clone();
        handles.push(tokio::spawn(async move {
            AccountService::register(
                &db,
                RegisterRequest {
                    username: "alice".to_string(),
                    password: "password123".to_string(),
                },
                &secret,
                1,
            )
            .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AppError::Validation(errors)) => assert!(errors.contains("username")),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(created, 1);
}
