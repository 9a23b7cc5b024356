use crate::fixtures::{binds, named, post_row, storage};
use mooring::driver::mock::TransactionEvent;
use mooring::driver::{mock, MockDriver};
use mooring::query::StatementKind;
use mooring::{BackendError, Entity, Order, StorageError, Value};
use std::rc::Rc;

#[test]
fn test_count_and_read_one() {
    let driver = Rc::new(
        MockDriver::new()
            .append_count("posts", 3)
            .append_rows(StatementKind::Select, "posts", vec![post_row(2)]),
    );
    let storage = storage(&driver);

    assert_eq!(storage.count("post").filter("title", "post 2").execute().unwrap().count(), 3);

    let post = storage
        .read_one("post")
        .order_by("id", Order::Desc)
        .one()
        .unwrap()
        .unwrap();
    assert_eq!(post.value("id"), Some(&Value::from(2)));

    let select = &driver.statements_for(StatementKind::Select, "posts")[0];
    assert!(select.sql.contains("ORDER BY \"id\" DESC"));
    assert!(select.sql.contains("LIMIT"));
}

#[test]
fn test_insert_fetches_generated_key_before_relations() {
    let driver = Rc::new(MockDriver::new().append_rows(
        StatementKind::Insert,
        "posts",
        vec![mock::row([("id", 42)])],
    ));
    let storage = storage(&driver);

    let post = Entity::new().with("title", "fresh").with("tags", vec![named(10, "t1")]);
    let saved = storage.insert("post", post).with("tags").one().unwrap().unwrap();

    assert_eq!(saved.value("id"), Some(&Value::from(42)));
    let insert = &driver.statements_for(StatementKind::Insert, "posts")[0];
    assert!(insert.sql.contains("RETURNING \"id\""));
    let link = &driver.statements_for(StatementKind::Insert, "post_tags")[0];
    assert!(binds(link, 42) && binds(link, 10));
}

#[test]
fn test_update_requires_primary_values() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    let err = storage.update("post", Entity::new().with("title", "x")).one().unwrap_err();

    assert!(matches!(err, StorageError::Query(_)));
    assert!(driver.statements().is_empty());
}

#[test]
fn test_unknown_names_are_not_found() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    assert!(matches!(storage.read("page").all(), Err(StorageError::NotFound { .. })));
    assert!(matches!(storage.read("post").with("likes").all(), Err(StorageError::NotFound { .. })));
    assert!(matches!(storage.read("post").filter("slug", "a").all(), Err(StorageError::NotFound { .. })));
}

#[test]
fn test_backend_errors_pass_through_unchanged() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(1)])
            .append_error(StatementKind::Select, "post_tags", "connection reset"),
    );
    let storage = storage(&driver);

    let err = storage.read("post").with("tags").all().unwrap_err();

    assert!(matches!(err, StorageError::Backend(BackendError::Mock(ref m)) if m == "connection reset"));
    assert_eq!(err.to_string(), "Mock driver error: connection reset");
    assert_eq!(driver.count_on("tags"), 0);
}

#[test]
fn test_transaction_wraps_a_through_write() {
    let driver = Rc::new(MockDriver::new().append_error(StatementKind::Insert, "post_tags", "duplicate key"));
    let storage = storage(&driver);
    let post = Entity::new().with("id", 1).with("tags", vec![named(10, "t1")]);

    let result = storage.transaction(|s| s.write("post", post).with("tags").one());

    assert!(matches!(result, Err(StorageError::Backend(_))));
    assert_eq!(driver.transaction_log(), vec![TransactionEvent::Start, TransactionEvent::Rollback]);
    // the target row was written before the failing link
    assert_eq!(driver.count_of(StatementKind::Insert, "tags"), 1);
    assert_eq!(driver.count_of(StatementKind::Delete, "post_tags"), 0);
}

#[test]
fn test_nested_relations_follow_dotted_paths() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(1)])
            .append_rows(
                StatementKind::Select,
                "comments",
                vec![mock::row([("id", Value::from(5)), ("post_id", Value::from(1)), ("body", Value::from("hi"))])],
            ),
    );
    let storage = storage(&driver);

    // comments have no relations of their own
    let err = storage.read("post").with("comments.author").all().unwrap_err();
    assert!(matches!(err, StorageError::NotFound { ref name, .. } if name == "author"));
}

#[test]
fn test_entity_json_round_trip_through_write() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let post = Entity::from_json(serde_json::json!({
        "id": 3,
        "title": "from json",
        "tags": [{"id": 10, "name": "t1"}]
    }))
    .unwrap();

    let saved = storage.write("post", post).with("tags").one().unwrap().unwrap();

    assert_eq!(saved.to_json()["tags"][0]["name"], serde_json::json!("t1"));
    assert_eq!(driver.count_of(StatementKind::Insert, "post_tags"), 1);
}
