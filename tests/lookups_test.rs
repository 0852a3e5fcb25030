mod common;

use study_vault::api::error::AppError;
use study_vault::infrastructure::seed::{CORE_CATEGORIES, seed_core_categories};
use study_vault::services::lookups::{LookupKind, LookupService};

#[tokio::test]
async fn test_seed_is_idempotent() {
    let db = common::setup_db().await;

    assert_eq!(seed_core_categories(&db).await.unwrap(), CORE_CATEGORIES.len());
    assert_eq!(seed_core_categories(&db).await.unwrap(), 0);

    let categories = LookupService::list(&db, LookupKind::Category).await.unwrap();
    assert_eq!(categories.len(), CORE_CATEGORIES.len());
    assert!(categories.iter().all(|c| c.slug == c.name));
}

#[tokio::test]
async fn test_rename_keeps_slug() {
    let db = common::setup_db().await;

    let created = LookupService::create(&db, LookupKind::Semester, "Fall 2023", None)
        .await
        .unwrap();
    assert_eq!(created.slug, "fall-2023");

    let renamed = LookupService::rename(&db, LookupKind::Semester, created.id, "Autumn 2023")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Autumn 2023");
    assert_eq!(renamed.slug, "fall-2023");

    let other = LookupService::create(&db, LookupKind::Semester, "Spring 2024", None)
        .await
        .unwrap();
    let clash = LookupService::rename(&db, LookupKind::Semester, other.id, "Autumn 2023").await;
    assert!(matches!(clash, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_create_validation_and_conflicts() {
    let db = common::setup_db().await;

    let blank = LookupService::create(&db, LookupKind::Category, "   ", None).await;
    match blank {
        Err(AppError::Validation(errors)) => assert!(errors.contains("name")),
        other => panic!("expected validation error, got {:?}", other),
    }

    let long = "x".repeat(81);
    assert!(matches!(
        LookupService::create(&db, LookupKind::Category, &long, None).await,
        Err(AppError::Validation(_))
    ));

    LookupService::create(&db, LookupKind::Category, "Slides", None).await.unwrap();
    assert!(matches!(
        LookupService::create(&db, LookupKind::Category, "Slides", Some("other")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        LookupService::create(&db, LookupKind::Category, "Slide Decks", Some("slides")).await,
        Err(AppError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_delete_is_protected_while_referenced() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let material = common::create_material(&ctx.state, &alice, &lookups, "Thermo", b"%PDF").await;
    let db = &ctx.state.db;

    let result = LookupService::delete(db, LookupKind::Category, lookups.category).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(LookupService::exists(db, LookupKind::Category, lookups.category).await.unwrap());
    assert!(common::material_exists(db, material.id).await);

    let missing = LookupService::delete(db, LookupKind::Category, 9999).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_top_universities_ranking() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let db = &ctx.state.db;

    let buet = LookupService::create(db, LookupKind::University, "BUET", None).await.unwrap();
    LookupService::create(db, LookupKind::University, "Aardvark College", None)
        .await
        .unwrap();

    for title in ["One", "Two"] {
        common::create_material(&ctx.state, &alice, &lookups, title, b"%PDF").await;
    }
    let at_buet = common::Lookups {
        university: buet.id,
        ..lookups
    };
    common::create_material(&ctx.state, &alice, &at_buet, "Three", b"%PDF").await;

    let top = LookupService::top_universities(db, 12).await.unwrap();
    let ranked: Vec<(&str, i64)> = top.iter().map(|u| (u.name.as_str(), u.num_materials)).collect();
    assert_eq!(
        ranked,
        vec![("Dhaka University", 2), ("BUET", 1), ("Aardvark College", 0)]
    );

    let top_one = LookupService::top_universities(db, 1).await.unwrap();
    assert_eq!(top_one.len(), 1);
}

#[tokio::test]
async fn test_names_for_many_ids() {
    let ctx = common::setup().await;
    let db = &ctx.state.db;

    let cse = LookupService::create(db, LookupKind::Department, "CSE", None).await.unwrap();
    let eee = LookupService::create(db, LookupKind::Department, "EEE", None).await.unwrap();
    LookupService::create(db, LookupKind::Department, "Civil", None).await.unwrap();

    let names = LookupService::names(db, LookupKind::Department, [cse.id, eee.id, cse.id, 9999])
        .await
        .unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names[&cse.id], "CSE");
    assert_eq!(names[&eee.id], "EEE");

    // Same id, other table
    let categories = LookupService::names(db, LookupKind::Category, [cse.id]).await.unwrap();
    assert!(categories.is_empty());

    assert!(LookupService::names(db, LookupKind::University, Vec::new()).await.unwrap().is_empty());
}
