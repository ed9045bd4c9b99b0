//! Integration tests against a real Postgres.
//!
//! Run with `cargo test -p canopeum-db --features test-postgres` (needs docker).

#![cfg(feature = "test-postgres")]

use canopeum::{Coordinate, InvitationError, Role};
use canopeum_db::queries::asset::{asset_by_id, insert_asset};
use canopeum_db::queries::batch::{
    Composition, NewBatch, SponsorInput, add_fertilizer, add_species, batch_by_id, insert_batch,
};
use canopeum_db::queries::lookup::{LookupTable, insert as insert_lookup};
use canopeum_db::queries::site::{
    NewSite, coordinate_by_id, create_site, delete_site, is_site_admin, set_site_coordinate,
    site_by_id,
};
use canopeum_db::queries::social::{FeedQuery, PrivateAccess, feed, insert_comment, insert_post, like};
use canopeum_db::queries::user::{NewUser, insert_invitation, insert_user, register, user_by_email};
use canopeum_db::seed::{DEMO_ACCOUNTS, Seeder};
use canopeum_db::{DbError, MigrationRunner, RegistrationError};
use jiff::{SignedDuration, Timestamp};
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::{Client, NoTls};

struct TestDb {
    client: Client,
    url: String,
    // Dropping the container stops it.
    _container: ContainerAsync<Postgres>,
}

async fn setup() -> TestDb {
    let container = Postgres::default().start().await.unwrap();
    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

    let mut client = connect(&url).await;
    MigrationRunner::new(&mut client).migrate().await.unwrap();
    TestDb {
        client,
        url,
        _container: container,
    }
}

async fn connect(url: &str) -> Client {
    let (client, connection) = tokio_postgres::connect(url, NoTls).await.unwrap();
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

async fn new_site(client: &Client, name: &str, is_public: bool) -> i64 {
    let coordinate =
        Coordinate::with_address("45°30'06.1\"N", "73°34'02.3\"W", "Montréal, QC").unwrap();
    create_site(
        client,
        &NewSite {
            name: name.to_string(),
            is_public,
            site_type_id: None,
            coordinate,
            description: None,
            size: None,
            research_partnership: None,
            visible_map: None,
            visitor_count: None,
            image_id: None,
            species: Vec::new(),
        },
    )
    .await
    .unwrap()
    .id
}

async fn new_user(client: &Client, username: &str, role: Role) -> i64 {
    insert_user(
        client,
        &NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "not-a-real-hash".to_string(),
            role,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn migrations_are_recorded() {
    let mut db = setup().await;
    let mut runner = MigrationRunner::new(&mut db.client);

    let status = runner.status().await.unwrap();
    assert!(!status.is_empty());
    assert!(status.iter().all(|m| m.is_applied()));

    // A second run finds nothing to do.
    assert!(runner.migrate().await.unwrap().is_empty());
}

#[tokio::test]
async fn site_delete_cascades_and_returns_asset_paths() {
    let mut db = setup().await;
    let client = &db.client;

    let site_id = new_site(client, "Doomed", true).await;
    let user_id = new_user(client, "walker", Role::User).await;
    let logo = insert_asset(client, "20240101000000000000_logo.png").await.unwrap();
    let media = insert_asset(client, "20240101000000000001_post.jpg").await.unwrap();

    let batch = insert_batch(
        client,
        &NewBatch {
            site_id,
            name: "First Batch".to_string(),
            sponsor: Some(SponsorInput {
                name: "Verdant Ventures".to_string(),
                url: None,
                logo_id: Some(logo.id),
            }),
            ..NewBatch::default()
        },
    )
    .await
    .unwrap();
    let post = insert_post(client, site_id, "planted", &[media.id]).await.unwrap();
    insert_comment(client, post.id, user_id, "nice").await.unwrap();
    like(client, user_id, post.id).await.unwrap();

    let tx = db.client.transaction().await.unwrap();
    let mut paths = delete_site(&tx, site_id).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    paths.sort();

    assert_eq!(
        paths,
        vec![
            "20240101000000000000_logo.png".to_string(),
            "20240101000000000001_post.jpg".to_string(),
        ]
    );
    let client = &db.client;
    assert!(site_by_id(client, site_id).await.unwrap().is_none());
    assert!(batch_by_id(client, batch.id).await.unwrap().is_none());
    assert!(asset_by_id(client, logo.id).await.unwrap().is_none());

    let tx = db.client.transaction().await.unwrap();
    assert!(delete_site(&tx, site_id).await.unwrap().is_none());
}

#[tokio::test]
async fn site_without_coordinate_gets_one_linked() {
    let db = setup().await;
    let site_id = new_site(&db.client, "Drifting", true).await;
    db.client
        .execute("UPDATE site SET coordinate_id = NULL WHERE id = $1", &[&site_id])
        .await
        .unwrap();
    let site = site_by_id(&db.client, site_id).await.unwrap().unwrap();
    assert_eq!(site.coordinate_id, None);

    let coordinate =
        Coordinate::with_address("46°48'47.9\"N", "71°12'29.4\"W", "Québec, QC").unwrap();
    let site = set_site_coordinate(&db.client, site, &coordinate).await.unwrap();
    let coordinate_id = site.coordinate_id.unwrap();
    let stored = coordinate_by_id(&db.client, coordinate_id).await.unwrap().unwrap();
    assert_eq!(stored.address, "Québec, QC");

    // A second update rewrites the linked row.
    let moved =
        Coordinate::with_address("45°30'06.1\"N", "73°34'02.3\"W", "Montréal, QC").unwrap();
    let site = set_site_coordinate(&db.client, site, &moved).await.unwrap();
    assert_eq!(site.coordinate_id, Some(coordinate_id));
    let stored = coordinate_by_id(&db.client, coordinate_id).await.unwrap().unwrap();
    assert_eq!(stored.address, "Montréal, QC");
}

#[tokio::test]
async fn duplicate_associations_are_unique_violations() {
    let db = setup().await;
    let client = &db.client;

    let site_id = new_site(client, "Grove", true).await;
    let fertilizer = insert_lookup(client, LookupTable::FertilizerType, "Manure", "Fumier")
        .await
        .unwrap();
    let oak = insert_lookup(client, LookupTable::TreeType, "Red Oak", "Chêne rouge")
        .await
        .unwrap();
    let batch = insert_batch(
        client,
        &NewBatch {
            site_id,
            name: "First Batch".to_string(),
            composition: Composition {
                species: Some(vec![(oak.id, 10)]),
                ..Composition::default()
            },
            ..NewBatch::default()
        },
    )
    .await
    .unwrap();

    add_fertilizer(client, batch.id, fertilizer.id).await.unwrap();
    let err = add_fertilizer(client, batch.id, fertilizer.id).await.unwrap_err();
    assert!(err.is_unique_violation("batch_fertilizer_unique"), "{err:?}");

    let err = add_species(client, batch.id, oak.id, 3).await.unwrap_err();
    assert!(err.is_unique_violation("batch_species_unique"), "{err:?}");

    let err = add_fertilizer(client, batch.id, fertilizer.id + 1000).await.unwrap_err();
    assert!(matches!(err, DbError::ForeignKeyViolation { .. }), "{err:?}");
}

#[tokio::test]
async fn invitation_is_redeemed_once() {
    let mut db = setup().await;
    let now = Timestamp::now();

    let first = new_site(&db.client, "North", true).await;
    let second = new_site(&db.client, "South", false).await;
    let invitation = insert_invitation(&db.client, "steward@example.com", &[first, second, first], now)
        .await
        .unwrap();

    let tx = db.client.transaction().await.unwrap();
    let user = register(&tx, "steward", "steward@example.com", "hash", Some(&invitation.code), now)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(user.role().unwrap(), Role::ForestSteward);
    assert!(is_site_admin(&db.client, user.id, first).await.unwrap());
    assert!(is_site_admin(&db.client, user.id, second).await.unwrap());

    let err = register(&db.client, "again", "again@example.com", "hash", Some(&invitation.code), now)
        .await
        .unwrap_err();
    assert!(matches!(err, RegistrationError::Invitation(InvitationError::Invalid)));
}

#[tokio::test]
async fn concurrent_redemptions_of_one_invitation_yield_one_account() {
    let mut db = setup().await;
    let mut other = connect(&db.url).await;
    let now = Timestamp::now();
    let site = new_site(&db.client, "Contested", true).await;
    let invitation = insert_invitation(&db.client, "race@example.com", &[site], now)
        .await
        .unwrap();

    let first = db.client.transaction().await.unwrap();
    register(&first, "first", "first@example.com", "hash", Some(&invitation.code), now)
        .await
        .unwrap();

    // The second redemption blocks on the invitation row until the first commits.
    let second = other.transaction().await.unwrap();
    let (late, committed) = tokio::join!(
        register(&second, "second", "second@example.com", "hash", Some(&invitation.code), now),
        first.commit(),
    );
    committed.unwrap();
    let err = late.unwrap_err();
    assert!(
        matches!(err, RegistrationError::Invitation(InvitationError::Invalid)),
        "{err:?}"
    );
    second.rollback().await.unwrap();

    let stewards = db
        .client
        .query_one("SELECT COUNT(*) AS count FROM \"user\" WHERE role = 'ForestSteward'", &[])
        .await
        .unwrap();
    assert_eq!(stewards.get::<_, i64>("count"), 1);
}

#[tokio::test]
async fn expired_invitation_is_rejected() {
    let db = setup().await;
    let created = Timestamp::now() - SignedDuration::from_hours(24 * 8);
    let invitation = insert_invitation(&db.client, "late@example.com", &[], created)
        .await
        .unwrap();

    let err = register(
        &db.client,
        "late",
        "late@example.com",
        "hash",
        Some(&invitation.code),
        Timestamp::now(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RegistrationError::Invitation(InvitationError::Expired)));
}

#[tokio::test]
async fn duplicate_email_names_its_constraint() {
    let db = setup().await;
    new_user(&db.client, "twin", Role::User).await;

    let err = register(&db.client, "other", "twin@example.com", "hash", None, Timestamp::now())
        .await
        .unwrap_err();
    let RegistrationError::Db(err) = err else {
        panic!("expected a database error, got {err:?}");
    };
    assert!(err.is_unique_violation(canopeum_db::queries::user::EMAIL_UNIQUE));
}

#[tokio::test]
async fn email_uniqueness_ignores_case() {
    let db = setup().await;
    new_user(&db.client, "alice", Role::User).await;

    let err = register(&db.client, "shouty", "ALICE@Example.com", "hash", None, Timestamp::now())
        .await
        .unwrap_err();
    let RegistrationError::Db(err) = err else {
        panic!("expected a database error, got {err:?}");
    };
    assert!(err.is_unique_violation(canopeum_db::queries::user::EMAIL_UNIQUE), "{err:?}");

    let found = user_by_email(&db.client, "Alice@example.com").await.unwrap().unwrap();
    assert_eq!(found.username, "alice");
}

#[tokio::test]
async fn a_post_is_liked_once_per_user() {
    let db = setup().await;
    let site_id = new_site(&db.client, "Likes", true).await;
    let user_id = new_user(&db.client, "fan", Role::User).await;
    let post = insert_post(&db.client, site_id, "hello", &[]).await.unwrap();

    like(&db.client, user_id, post.id).await.unwrap();
    let err = like(&db.client, user_id, post.id).await.unwrap_err();
    assert!(err.is_unique_violation("post_like_pkey"), "{err:?}");
}

#[tokio::test]
async fn feed_pages_and_hides_private_sites() {
    let db = setup().await;
    let public = new_site(&db.client, "Open", true).await;
    let private = new_site(&db.client, "Closed", false).await;
    let viewer = new_user(&db.client, "viewer", Role::User).await;

    for i in 0..7 {
        insert_post(&db.client, public, &format!("public {i}"), &[]).await.unwrap();
    }
    let hidden = insert_post(&db.client, private, "private", &[]).await.unwrap();
    like(&db.client, viewer, hidden.id).await.unwrap();

    let query = FeedQuery {
        site_ids: None,
        viewer_id: Some(viewer),
        limit: 5,
        offset: 0,
    };
    let (count, page) = feed(&db.client, &query, &PrivateAccess::None).await.unwrap();
    assert_eq!(count, 7);
    assert_eq!(page.len(), 5);
    assert!(page.iter().all(|post| post.site_id == public));
    assert!(page.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let rest = FeedQuery {
        offset: 5,
        ..query.clone()
    };
    let (_, page) = feed(&db.client, &rest, &PrivateAccess::None).await.unwrap();
    assert_eq!(page.len(), 2);

    let (count, page) = feed(&db.client, &query, &PrivateAccess::Sites(vec![private]))
        .await
        .unwrap();
    assert_eq!(count, 8);
    let liked = page.iter().find(|post| post.id == hidden.id).unwrap();
    assert!(liked.has_liked);
    assert_eq!(liked.like_count, 1);

    let only_private = FeedQuery {
        site_ids: Some(vec![private]),
        ..query
    };
    let (count, _) = feed(&db.client, &only_private, &PrivateAccess::All).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn seeding_runs_once() {
    let mut db = setup().await;
    let accounts: Vec<_> = DEMO_ACCOUNTS
        .iter()
        .map(|account| (*account, format!("hash-of-{}", account.username)))
        .collect();

    let tx = db.client.transaction().await.unwrap();
    let report = Seeder::default().run(&tx, &accounts).await.unwrap().unwrap();
    tx.commit().await.unwrap();
    assert_eq!(report.users, DEMO_ACCOUNTS.len());
    assert_eq!(report.sites, 4);
    assert!(report.batches >= 12);

    assert!(Seeder::default().run(&db.client, &accounts).await.unwrap().is_none());
}
