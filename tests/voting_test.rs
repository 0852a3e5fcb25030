mod common;

use study_vault::api::error::AppError;
use study_vault::services::catalog::CatalogService;
use study_vault::services::votes::{VoteService, VoteState};

#[tokio::test]
async fn test_vote_toggle_sequence() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let material = common::create_material(&ctx.state, &alice, &lookups, "Graph Theory", b"%PDF").await;
    let db = &ctx.state.db;

    // 1. First upvote
    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Up).await.unwrap();
    assert_eq!(tally.status, "ok");
    assert_eq!(tally.your_vote, VoteState::Up);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (1, 0));

    // 2. Upvote again clears it
    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Up).await.unwrap();
    assert_eq!(tally.your_vote, VoteState::None);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (0, 0));

    // 3. Downvote from nothing
    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Down).await.unwrap();
    assert_eq!(tally.your_vote, VoteState::Down);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (0, 1));

    // 4. Switching direction replaces the vote
    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Up).await.unwrap();
    assert_eq!(tally.your_vote, VoteState::Up);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (1, 0));

    // 5. "none" clears whatever is there
    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::None).await.unwrap();
    assert_eq!(tally.your_vote, VoteState::None);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (0, 0));
}

#[tokio::test]
async fn test_votes_from_several_users_are_counted_separately() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let (_, bob) = common::register(&ctx.state, "bob").await;
    let (_, carol) = common::register(&ctx.state, "carol").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let material = common::create_material(&ctx.state, &alice, &lookups, "OS Notes", b"%PDF").await;
    let db = &ctx.state.db;

    VoteService::set_vote(db, &alice.id, material.id, VoteState::Up).await.unwrap();
    VoteService::set_vote(db, &bob.id, material.id, VoteState::Up).await.unwrap();
    let tally = VoteService::set_vote(db, &carol.id, material.id, VoteState::Down).await.unwrap();
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (2, 1));
    assert_eq!(tally.your_vote, VoteState::Down);

    assert_eq!(VoteService::vote_state(db, &bob.id, material.id).await.unwrap(), VoteState::Up);

    let detail = CatalogService::detail(db, material.id, Some(&carol.id)).await.unwrap();
    assert_eq!(detail.total_upvotes, 2);
    assert_eq!(detail.total_downvotes, 1);
    assert_eq!(detail.your_vote, Some(VoteState::Down));

    let anonymous = CatalogService::detail(db, material.id, None).await.unwrap();
    assert_eq!(anonymous.your_vote, None);
}

#[tokio::test]
async fn test_mixed_votes_from_two_users() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let (_, bob) = common::register(&ctx.state, "bob").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let material = common::create_material(&ctx.state, &alice, &lookups, "Networks", b"%PDF").await;
    let db = &ctx.state.db;

    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Up).await.unwrap();
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (1, 0));

    let tally = VoteService::set_vote(db, &bob.id, material.id, VoteState::Down).await.unwrap();
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (1, 1));

    let tally = VoteService::set_vote(db, &alice.id, material.id, VoteState::Down).await.unwrap();
    assert_eq!(tally.your_vote, VoteState::Down);
    assert_eq!((tally.total_upvotes, tally.total_downvotes), (0, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_from_many_users() {
    let ctx = common::setup_file_backed().await;
    let lookups = common::create_lookups(&ctx.state).await;

    let mut voters = Vec::new();
    for i in 0..10 {
        let (_, user) = common::register(&ctx.state, &format!("voter{}", i)).await;
        voters.push(user);
    }
    let material_id = common::create_material(&ctx.state, &voters[0], &lookups, "Databases", b"%PDF")
        .await
        .id;

    let mut handles = Vec::new();
    for voter in &voters {
        let db = ctx.state.db.clone();
        let user_id = voter.id.clone();
        handles.push(tokio::spawn(async move {
            VoteService::set_vote(&db, &user_id, material_id, VoteState::Up).await
        }));
    }
    for handle in handles {
        let tally = handle.await.unwrap();
        assert!(tally.is_ok(), "vote failed: {:?}", tally.err());
    }

    let totals = VoteService::totals(&ctx.state.db, material_id).await.unwrap();
    assert_eq!(totals, (10, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_never_leave_both_rows() {
    let ctx = common::setup_file_backed().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;
    let lookups = common::create_lookups(&ctx.state).await;
    let material_id = common::create_material(&ctx.state, &alice, &lookups, "Compilers", b"%PDF")
        .await
        .id;

    let mut handles = Vec::new();
    for i in 0..10 {
        let db = ctx.state.db.clone();
        let user_id = alice.id.clone();
        let pressed = if i % 2 == 0 { VoteState::Up } else { VoteState::Down };
        handles.push(tokio::spawn(async move {
            VoteService::set_vote(&db, &user_id, material_id, pressed).await
        }));
    }
    for handle in handles {
        let tally = handle.await.unwrap();
        assert!(tally.is_ok(), "vote failed: {:?}", tally.err());
    }

    let (up, down) = VoteService::totals(&ctx.state.db, material_id).await.unwrap();
    assert!(up + down <= 1, "user holds {} upvotes and {} downvotes", up, down);
}

#[tokio::test]
async fn test_vote_on_missing_material() {
    let ctx = common::setup().await;
    let (_, alice) = common::register(&ctx.state, "alice").await;

    let result = VoteService::set_vote(&ctx.state.db, &alice.id, 999, VoteState::Up).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
