//! Literals rendered by `quote` read back through SQLite unchanged.

mod common;

use std::fmt::Debug;

use chrono::NaiveDate;
use common::create_test_pool;
use oxide_mapper::{quote, FromValue, Session, ToValue};
use sqlx::sqlite::SqlitePool;

async fn round_trip<T: ToValue + FromValue>(session: &Session<SqlitePool>, value: &T) -> T {
    let literal = quote(session.sql_dialect(), &value.to_value()).unwrap();
    session
        .find(format!("SELECT {literal}"))
        .scalar()
        .await
        .unwrap_or_else(|e| panic!("SELECT {literal}: {e}"))
}

async fn assert_round_trips<T>(session: &Session<SqlitePool>, values: &[T])
where
    T: ToValue + FromValue + PartialEq + Debug,
{
    for value in values {
        assert_eq!(&round_trip(session, value).await, value);
    }
}

#[tokio::test]
async fn test_scalars_survive_quoting() {
    let session = Session::new(create_test_pool().await);

    assert_round_trips(
        &session,
        &[
            String::from("Mc'Al\\ister"),
            String::from("it''s \\' done"),
            String::new(),
            String::from("naïve ✓"),
        ],
    )
    .await;
    assert_round_trips(&session, &[0_i64, -42, 7, i64::MIN + 1, i64::MAX]).await;
    assert_round_trips(&session, &[0_u64, 4_000_000_000, i64::MAX.unsigned_abs()]).await;
    assert_round_trips(&session, &[42.13_f64, -0.5, 1e10]).await;
    assert_round_trips(&session, &[true, false]).await;
    assert_round_trips(&session, &[None::<String>, Some(String::from("x"))]).await;
    assert_round_trips(&session, &[None::<i64>, Some(-1)]).await;
}

#[tokio::test]
async fn test_datetime_comes_back_at_whole_seconds() {
    let session = Session::new(create_test_pool().await);
    let date = NaiveDate::from_ymd_opt(2014, 2, 14).unwrap();
    let precise = date.and_hms_milli_opt(9, 30, 15, 123).unwrap();

    let read = round_trip(&session, &precise).await;
    assert_eq!(read, date.and_hms_opt(9, 30, 15).unwrap());
}
