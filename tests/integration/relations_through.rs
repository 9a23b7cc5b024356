use crate::fixtures::{binds, category_link, named, named_row, names, post_row, storage, tag_link};
use mooring::driver::MockDriver;
use mooring::query::StatementKind;
use mooring::{Entity, Value};
use std::rc::Rc;

// ============================================================================
// Read
// ============================================================================

#[test]
fn test_many_through_read_is_two_statements() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(1), post_row(2), post_row(3)])
            .append_rows(StatementKind::Select, "post_tags", vec![tag_link(3, 10), tag_link(3, 20)])
            // target rows arrive in a different order than their links
            .append_rows(StatementKind::Select, "tags", vec![named_row(20, "t2"), named_row(10, "t1")]),
    );
    let storage = storage(&driver);

    let posts = storage.read("post").with("tags").all().unwrap();

    assert_eq!(driver.count_of(StatementKind::Select, "post_tags"), 1);
    assert_eq!(driver.count_of(StatementKind::Select, "tags"), 1);
    assert_eq!(driver.statements().len(), 3);

    assert!(names(&posts[0], "tags").is_empty());
    assert!(names(&posts[1], "tags").is_empty());
    assert_eq!(names(&posts[2], "tags"), vec!["t1", "t2"]);

    let links = &driver.statements_for(StatementKind::Select, "post_tags")[0];
    assert!(links.sql.contains("IN"));
    assert!(binds(links, 1) && binds(links, 2) && binds(links, 3));
}

#[test]
fn test_one_through_read_takes_first_link() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(1), post_row(2)])
            .append_rows(StatementKind::Select, "post_categories", vec![category_link(1, 5)])
            .append_rows(StatementKind::Select, "categories", vec![named_row(5, "news")]),
    );
    let storage = storage(&driver);

    let posts = storage.read("post").with("category").all().unwrap();

    let category = posts[0].get("category").and_then(|p| p.as_entity()).unwrap();
    assert_eq!(category.value("name"), Some(&Value::from("news")));
    assert_eq!(posts[1].value("category"), Some(&Value::Null));
}

#[test]
fn test_nothing_to_read_issues_no_relation_statement() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    let posts = storage.read("post").with("tags").all().unwrap();

    assert!(posts.is_empty());
    assert_eq!(driver.count_on("post_tags"), 0);
    assert_eq!(driver.count_on("tags"), 0);
}

// ============================================================================
// Write
// ============================================================================

fn post_with_category(category: impl Into<mooring::Property>) -> Entity {
    Entity::new().with("id", 1).with("category", category)
}

#[test]
fn test_one_through_write_then_replace() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    storage
        .write("post", post_with_category(named(5, "x")))
        .with("category")
        .one()
        .unwrap();

    assert_eq!(driver.count_of(StatementKind::Insert, "categories"), 1);
    assert_eq!(driver.count_of(StatementKind::Insert, "post_categories"), 1);
    assert_eq!(driver.count_of(StatementKind::Delete, "post_categories"), 0);

    // second write: the post exists, Y is new and the X link is still stored
    driver.clear_log();
    driver.queue(StatementKind::Count, "posts", mooring::driver::MockResult::Rows(vec![mooring::driver::mock::row([("count", 1)])]));
    driver.queue(
        StatementKind::Select,
        "post_categories",
        mooring::driver::MockResult::Rows(vec![category_link(1, 5)]),
    );

    storage
        .write("post", post_with_category(named(6, "y")))
        .with("category")
        .one()
        .unwrap();

    assert_eq!(driver.count_of(StatementKind::Insert, "post_categories"), 1);
    let deletes = driver.statements_for(StatementKind::Delete, "post_categories");
    assert_eq!(deletes.len(), 1);
    assert!(binds(&deletes[0], 5));
    assert!(!binds(&deletes[0], 6));
    assert_eq!(driver.count_of(StatementKind::Delete, "categories"), 0);
}

#[test]
fn test_one_through_write_null_unlinks() {
    let driver = Rc::new(
        MockDriver::new()
            .append_count("posts", 1)
            .append_rows(StatementKind::Select, "post_categories", vec![category_link(1, 5)]),
    );
    let storage = storage(&driver);

    let saved = storage
        .write("post", post_with_category(Value::Null))
        .with("category")
        .one()
        .unwrap()
        .unwrap();

    assert_eq!(saved.value("category"), Some(&Value::Null));
    assert_eq!(driver.count_of(StatementKind::Insert, "post_categories"), 0);
    let deletes = driver.statements_for(StatementKind::Delete, "post_categories");
    assert_eq!(deletes.len(), 1);
    assert!(binds(&deletes[0], 5));
}

#[test]
fn test_write_twice_is_idempotent() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let post = Entity::new().with("id", 1).with("tags", vec![named(10, "t1"), named(20, "t2")]);

    storage.write("post", post.clone()).with("tags").one().unwrap();
    assert_eq!(driver.count_of(StatementKind::Insert, "post_tags"), 2);
    assert_eq!(driver.count_of(StatementKind::Delete, "post_tags"), 0);

    driver.clear_log();
    let exists = || mooring::driver::MockResult::Rows(vec![mooring::driver::mock::row([("count", 1)])]);
    driver.queue(StatementKind::Count, "posts", exists());
    for _ in 0..2 {
        driver.queue(StatementKind::Count, "tags", exists());
    }
    driver.queue(
        StatementKind::Select,
        "post_tags",
        mooring::driver::MockResult::Rows(vec![tag_link(1, 10), tag_link(1, 20)]),
    );

    storage.write("post", post).with("tags").one().unwrap();

    assert_eq!(driver.count_of(StatementKind::Insert, "post_tags"), 0);
    assert_eq!(driver.count_of(StatementKind::Delete, "post_tags"), 0);
    assert_eq!(driver.count_of(StatementKind::Update, "tags"), 2);
}

#[test]
fn test_cleanup_is_one_fetch_for_all_owners() {
    let driver = Rc::new(MockDriver::new().append_rows(
        StatementKind::Select,
        "post_tags",
        // post 2 dropped tag 30; post 3 was not processed and keeps its link
        vec![tag_link(1, 10), tag_link(2, 30), tag_link(3, 30)],
    ));
    let storage = storage(&driver);
    let post = storage.model("post").unwrap();
    let tags = mooring::Relation::new(&storage, &post, post.relation("tags").unwrap(), Default::default()).unwrap();

    let owners = vec![
        Entity::new().with("id", 1).with("tags", vec![named(10, "t1")]),
        Entity::new().with("id", 2).with("tags", Vec::<Entity>::new()),
        Entity::new().with("id", 3),
    ];
    tags.write(&storage, owners).unwrap();

    assert_eq!(driver.count_of(StatementKind::Select, "post_tags"), 1);
    let deletes = driver.statements_for(StatementKind::Delete, "post_tags");
    assert_eq!(deletes.len(), 1);
    assert!(binds(&deletes[0], 2) && binds(&deletes[0], 30));
}

#[test]
fn test_wrong_container_shape_is_a_relation_error() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    let err = storage
        .write("post", Entity::new().with("id", 1).with("tags", named(1, "solo")))
        .with("tags")
        .one()
        .unwrap_err();

    assert!(matches!(err, mooring::StorageError::Relation { ref relation, .. } if relation == "tags"));
    assert_eq!(driver.count_on("post_tags"), 0);
}

// ============================================================================
// Delete and clear
// ============================================================================

#[test]
fn test_clear_is_one_statement_on_the_mediator() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let post = storage.model("post").unwrap();
    let tags = mooring::Relation::new(&storage, &post, post.relation("tags").unwrap(), Default::default()).unwrap();

    tags.clear(&storage).unwrap();

    assert_eq!(driver.statements().len(), 1);
    let clear = &driver.statements()[0];
    assert_eq!(clear.kind, StatementKind::Clear);
    assert_eq!(clear.table, "post_tags");
    assert!(!clear.sql.contains("WHERE"));
}

#[test]
fn test_clear_entity_with_relation() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    storage.clear("post").with("tags").execute().unwrap();

    assert_eq!(driver.count_of(StatementKind::Clear, "post_tags"), 1);
    assert_eq!(driver.count_of(StatementKind::Clear, "posts"), 1);
    assert_eq!(driver.count_on("tags"), 0);
}
