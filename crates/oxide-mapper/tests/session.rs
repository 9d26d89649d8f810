//! End-to-end tests against an in-memory SQLite database.

mod common;

use std::time::{Duration, Instant};

use common::{create_test_pool, ById, Tweet, User};
use oxide_mapper::dialect::Sqlite3;
use oxide_mapper::{OrmError, Session};

#[tokio::test]
async fn test_single_with_bound_parameters() {
    let session = Session::new(create_test_pool().await);

    let user: User = session
        .find("select * from users where id=:id")
        .bind(&ById { id: 1 })
        .single()
        .await
        .unwrap();

    assert_eq!(user.id, 1);
    assert_eq!(user.name, "Oliver");
    assert_eq!(user.karma, Some(42.13));
    assert!(!user.suspended);
}

#[tokio::test]
async fn test_single_without_rows_is_no_rows() {
    let session = Session::new(create_test_pool().await);

    let err = session
        .find("select * from users where id=999")
        .single::<User>()
        .await
        .unwrap_err();
    assert!(err.is_no_rows(), "{err}");
}

#[tokio::test]
async fn test_insert_writes_back_generated_key() {
    let session = Session::new(create_test_pool().await).dialect(Sqlite3);
    let before = session.count("select count(*) from users").await.unwrap();

    let mut george = User {
        name: String::from("George"),
        ..User::default()
    };
    session.insert(&mut george).await.unwrap();

    assert!(george.id > 0);
    let after = session.count("select count(*) from users").await.unwrap();
    assert_eq!(after, before + 1);

    let stored: User = session.get(george.id).fetch().await.unwrap();
    assert_eq!(stored.name, "George");
    assert_eq!(stored.karma, None);
}

#[tokio::test]
async fn test_rolled_back_insert_leaves_no_row() {
    let session = Session::new(create_test_pool().await);
    let before = session.count("select count(*) from users").await.unwrap();

    let mut tx = session.begin().await.unwrap();
    let mut george = User {
        name: String::from("George"),
        ..User::default()
    };
    session.insert_tx(&mut tx, &mut george).await.unwrap();
    assert!(george.id > 0);

    let inside = session
        .find_tx(&mut tx, "select count(*) from users")
        .count()
        .await
        .unwrap();
    assert_eq!(inside, before + 1);
    tx.rollback().await.unwrap();

    let after = session.count("select count(*) from users").await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_committed_transaction_persists() {
    let session = Session::new(create_test_pool().await);

    let mut user: User = session.get(2).fetch().await.unwrap();
    user.karma = None;

    let mut tx = session.begin().await.unwrap();
    assert_eq!(session.update_tx(&mut tx, &user).await.unwrap(), 1);
    tx.commit().await.unwrap();

    let stored: User = session.get(2).fetch().await.unwrap();
    assert_eq!(stored.karma, None);
    assert!(stored.suspended);
}

#[tokio::test]
async fn test_update_without_primary_key_writes_nothing() {
    let session = Session::new(create_test_pool().await);
    let tweet = Tweet {
        id: 1,
        message: String::from("changed"),
    };

    let err = session.update(&tweet).await.unwrap_err();
    assert!(matches!(err, OrmError::NoPrimaryKey("Tweet")));

    let message: String = session
        .find("select message from tweets where id=1")
        .scalar()
        .await
        .unwrap();
    assert_eq!(message, "hello");
}

#[tokio::test]
async fn test_update_and_delete_report_rows() {
    let session = Session::new(create_test_pool().await);

    let mut oliver: User = session.get(1).fetch().await.unwrap();
    oliver.name = String::from("Mc'Oliver");
    assert_eq!(session.update(&oliver).await.unwrap(), 1);
    let renamed: User = session.get(1).fetch().await.unwrap();
    assert_eq!(renamed.name, "Mc'Oliver");

    assert_eq!(session.delete(&oliver).await.unwrap(), 1);
    assert_eq!(session.delete(&oliver).await.unwrap(), 0);
    let err = session.get::<User>(1).fetch().await.unwrap_err();
    assert!(err.is_no_rows());
}

#[tokio::test]
async fn test_projection_leaves_other_fields_at_default() {
    let session = Session::new(create_test_pool().await);

    let user: User = session
        .find("select name from users where id=2")
        .single()
        .await
        .unwrap();
    assert_eq!(
        user,
        User {
            name: String::from("Sandra"),
            ..User::default()
        }
    );
}

#[tokio::test]
async fn test_unknown_columns_are_ignored() {
    let session = Session::new(create_test_pool().await);

    let user: User = session
        .find("select users.*, 'x' as nickname, 1 + 1 as two from users where id=1")
        .single()
        .await
        .unwrap();
    assert_eq!(user.id, 1);
    assert_eq!(user.name, "Oliver");
    assert!(user.note.is_empty());
}

#[tokio::test]
async fn test_all_returns_rows_in_order() {
    let session = Session::new(create_test_pool().await);

    let users: Vec<User> = session
        .find("select * from users order by id")
        .all()
        .await
        .unwrap();
    let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, ["Oliver", "Sandra"]);

    let boxed: Vec<Box<User>> = session
        .find("select * from users where suspended=:flag")
        .param("flag", true)
        .all()
        .await
        .unwrap();
    assert_eq!(boxed.len(), 1);
    assert_eq!(boxed[0].name, "Sandra");
}

#[tokio::test]
async fn test_all_without_rows_is_empty() {
    let session = Session::new(create_test_pool().await);

    let users: Vec<User> = session
        .find("select * from users where id > 100")
        .all()
        .await
        .unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_scalar_and_count() {
    let session = Session::new(create_test_pool().await);

    let name: String = session
        .find("select name from users where id=:id")
        .param("id", 2)
        .scalar()
        .await
        .unwrap();
    assert_eq!(name, "Sandra");

    let karma: Option<f64> = session
        .find("select karma from users where id=1")
        .scalar()
        .await
        .unwrap();
    assert_eq!(karma, Some(42.13));

    assert_eq!(session.count("select count(*) from orders").await.unwrap(), 3);

    let err = session
        .find("select name from users where id=999")
        .scalar::<String>()
        .await
        .unwrap_err();
    assert!(err.is_no_rows());
}

#[tokio::test]
async fn test_count_of_text_is_wrong_type() {
    let session = Session::new(create_test_pool().await);

    let err = session
        .count("select name from users where id=1")
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::WrongType(_)), "{err}");
}

#[tokio::test]
async fn test_conversion_error_names_the_column() {
    let session = Session::new(create_test_pool().await);

    let err = session
        .find("select 'not a number' as karma")
        .single::<User>()
        .await
        .unwrap_err();
    match err {
        OrmError::Conversion {
            type_name, column, ..
        } => {
            assert_eq!(type_name, "User");
            assert_eq!(column, "karma");
        }
        other => panic!("expected a conversion error, got {other}"),
    }
}

const SLOW: &str = "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 1000000000) SELECT count(*) FROM c";

#[tokio::test]
async fn test_slow_query_times_out() {
    let session = Session::new(create_test_pool().await).timeout(Duration::from_secs(30));

    let err = session
        .find(SLOW)
        .timeout(Duration::from_millis(20))
        .count()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Timeout(limit) if limit == Duration::from_millis(20)));
}

#[tokio::test]
async fn test_timed_out_query_frees_the_connection() {
    let session = Session::new(create_test_pool().await);

    let err = session
        .find(SLOW)
        .timeout(Duration::from_millis(20))
        .count()
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Timeout(_)), "{err}");

    let started = Instant::now();
    let users = session
        .find("select count(*) from users")
        .timeout(Duration::from_secs(3))
        .count()
        .await
        .unwrap();
    assert_eq!(users, 2);
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());

    let mut oliver: User = session.get(1).fetch().await.unwrap();
    oliver.name = String::from("Ollie");
    let session = session.timeout(Duration::from_secs(3));
    assert_eq!(session.update(&oliver).await.unwrap(), 1);
}
