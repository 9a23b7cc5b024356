//! Relations narrowed by fixed values.
//!
//! `tags` and `labels` share the `post_tags` mediator and are told apart by
//! its `kind` column. `notes` only applies to draft posts and stores its
//! rows with `kind = "internal"`.

use crate::fixtures::binds;
use mooring::driver::{mock, MockDriver, Row};
use mooring::model::{FieldDef, FieldType, IndexDef, Model, RelationDef};
use mooring::query::{Statement, StatementKind};
use mooring::{Entity, SeaQueryBuilder, Storage, Value};
use std::rc::Rc;

fn storage(driver: &Rc<MockDriver>) -> Storage {
    let tags = RelationDef::many_through("tags", "tag", "post_tag", [("id", "post_id")], [("tag_id", "id")])
        .unwrap()
        .foreign_values([("kind", "topic")]);
    let labels = RelationDef::many_through("labels", "tag", "post_tag", [("id", "post_id")], [("tag_id", "id")])
        .unwrap()
        .foreign_values([("kind", "label")]);
    let notes = RelationDef::many("notes", "note", [("id", "post_id")])
        .unwrap()
        .local_values([("status", "draft")])
        .foreign_values([("kind", "internal")]);

    let post = Model::new(
        "post",
        "posts",
        vec![FieldDef::new("id", FieldType::Integer), FieldDef::new("status", FieldType::String)],
        vec![IndexDef::primary(["id"]).unwrap()],
        vec![tags, labels, notes],
    )
    .unwrap();
    let tag = Model::new(
        "tag",
        "tags",
        vec![FieldDef::new("id", FieldType::Integer)],
        vec![IndexDef::primary(["id"]).unwrap()],
        vec![],
    )
    .unwrap();
    let post_tag = Model::new(
        "post_tag",
        "post_tags",
        vec![
            FieldDef::new("post_id", FieldType::Integer),
            FieldDef::new("tag_id", FieldType::Integer),
            FieldDef::new("kind", FieldType::String),
        ],
        vec![],
        vec![],
    )
    .unwrap();
    let note = Model::new(
        "note",
        "notes",
        vec![
            FieldDef::new("id", FieldType::Integer),
            FieldDef::new("post_id", FieldType::Integer),
            FieldDef::new("kind", FieldType::String),
            FieldDef::new("body", FieldType::String),
        ],
        vec![IndexDef::primary(["id"]).unwrap()],
        vec![],
    )
    .unwrap();

    Storage::new(driver.clone(), SeaQueryBuilder::default())
        .with_model(post)
        .with_model(tag)
        .with_model(post_tag)
        .with_model(note)
}

fn link(post: i64, tag: i64, kind: &str) -> Row {
    mock::row([("post_id", Value::from(post)), ("tag_id", Value::from(tag)), ("kind", Value::from(kind))])
}

fn binds_text(statement: &Statement, value: &str) -> bool {
    statement.parameters().contains(&sea_query::Value::from(value.to_string()))
}

fn tag(id: i64) -> Entity {
    Entity::new().with("id", id)
}

fn post(id: i64, status: &str) -> Entity {
    Entity::new().with("id", id).with("status", status)
}

// ============================================================================
// foreign values
// ============================================================================

#[test]
fn test_written_link_carries_its_kind() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    storage
        .write("post", post(1, "draft").with("tags", vec![tag(10)]))
        .with("tags")
        .one()
        .unwrap();

    let inserts = driver.statements_for(StatementKind::Insert, "post_tags");
    assert_eq!(inserts.len(), 1);
    assert!(binds(&inserts[0], 1) && binds(&inserts[0], 10));
    assert!(binds_text(&inserts[0], "topic"));

    let existing = &driver.statements_for(StatementKind::Select, "post_tags")[0];
    assert!(binds_text(existing, "topic"));
    assert!(!binds_text(existing, "label"));
}

#[test]
fn test_direct_write_stores_kind_on_target_rows() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let note = Entity::new().with("id", 5).with("body", "check the intro");

    let saved = storage
        .write("post", post(1, "draft").with("notes", vec![note]))
        .with("notes")
        .one()
        .unwrap()
        .unwrap();

    let insert = &driver.statements_for(StatementKind::Insert, "notes")[0];
    assert!(binds(insert, 5) && binds(insert, 1));
    assert!(binds_text(insert, "internal"));
    let stored = &saved.get("notes").and_then(|p| p.as_collection()).unwrap()[0];
    assert_eq!(stored.value("kind"), Some(&Value::from("internal")));
    assert_eq!(stored.value("post_id"), Some(&Value::from(1)));
}

#[test]
fn test_relations_sharing_a_mediator_leave_each_other_alone() {
    let driver = Rc::new(
        MockDriver::new()
            .append_count("posts", 1)
            .append_count("tags", 1)
            .append_rows(StatementKind::Select, "post_tags", vec![link(1, 10, "topic"), link(1, 20, "label")]),
    );
    let storage = storage(&driver);

    storage
        .write("post", post(1, "draft").with("tags", vec![tag(10)]))
        .with("tags")
        .one()
        .unwrap();

    // the label link is not a stale topic link
    assert_eq!(driver.count_of(StatementKind::Insert, "post_tags"), 0);
    assert_eq!(driver.count_of(StatementKind::Delete, "post_tags"), 0);

    driver.clear_log();
    driver.queue(
        StatementKind::Select,
        "post_tags",
        mock::MockResult::Rows(vec![link(1, 10, "topic"), link(1, 20, "label")]),
    );

    storage
        .write("post", post(1, "draft").with("labels", Vec::<Entity>::new()))
        .with("labels")
        .one()
        .unwrap();

    let deletes = driver.statements_for(StatementKind::Delete, "post_tags");
    assert_eq!(deletes.len(), 1);
    assert!(binds(&deletes[0], 20) && binds_text(&deletes[0], "label"));
    assert!(!binds(&deletes[0], 10));
}

#[test]
fn test_read_ignores_links_of_the_other_kind() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![mock::row([("id", Value::from(1))])])
            .append_rows(StatementKind::Select, "post_tags", vec![link(1, 10, "topic"), link(1, 20, "label")])
            .append_rows(StatementKind::Select, "tags", vec![mock::row([("id", Value::from(10))])]),
    );
    let storage = storage(&driver);

    let posts = storage.read("post").with("labels").all().unwrap();

    assert_eq!(driver.count_of(StatementKind::Select, "tags"), 1);
    let targets = &driver.statements_for(StatementKind::Select, "tags")[0];
    assert!(binds(targets, 20) && !binds(targets, 10));
    assert!(binds_text(&driver.statements_for(StatementKind::Select, "post_tags")[0], "label"));
    // the queued tag row does not carry the linked key
    assert!(posts[0].get("labels").and_then(|p| p.as_collection()).unwrap().is_empty());
}

// ============================================================================
// local values
// ============================================================================

#[test]
fn test_published_post_skips_notes_on_write() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let note = Entity::new().with("id", 5).with("body", "stale");

    let saved = storage
        .write("post", post(2, "published").with("notes", vec![note]))
        .with("notes")
        .one()
        .unwrap()
        .unwrap();

    assert_eq!(driver.count_of(StatementKind::Insert, "posts"), 1);
    assert_eq!(driver.count_on("notes"), 0);
    // the container is returned as given
    let kept = &saved.get("notes").and_then(|p| p.as_collection()).unwrap()[0];
    assert_eq!(kept.value("kind"), None);
}

#[test]
fn test_published_post_skips_notes_on_delete() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let notes = vec![Entity::new().with("id", 5).with("post_id", 2)];

    storage
        .delete("post", post(2, "published").with("notes", notes.clone()))
        .with("notes")
        .execute()
        .unwrap();
    assert_eq!(driver.count_on("notes"), 0);
    assert_eq!(driver.count_of(StatementKind::Delete, "posts"), 1);

    storage
        .delete("post", post(2, "draft").with("notes", notes))
        .with("notes")
        .execute()
        .unwrap();
    let deletes = driver.statements_for(StatementKind::Delete, "notes");
    assert_eq!(deletes.len(), 1);
    assert!(binds(&deletes[0], 5));
}

#[test]
fn test_read_fetches_notes_for_drafts_only() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(
                StatementKind::Select,
                "posts",
                vec![
                    mock::row([("id", Value::from(1)), ("status", Value::from("draft"))]),
                    mock::row([("id", Value::from(2)), ("status", Value::from("published"))]),
                ],
            )
            .append_rows(
                StatementKind::Select,
                "notes",
                vec![mock::row([
                    ("id", Value::from(5)),
                    ("post_id", Value::from(1)),
                    ("kind", Value::from("internal")),
                    ("body", Value::from("todo")),
                ])],
            ),
    );
    let storage = storage(&driver);

    let posts = storage.read("post").with("notes").all().unwrap();

    let select = &driver.statements_for(StatementKind::Select, "notes")[0];
    assert!(binds(select, 1) && !binds(select, 2));
    assert!(binds_text(select, "internal"));
    let count = |post: &Entity| post.get("notes").and_then(|p| p.as_collection()).map_or(0, |n| n.len());
    assert_eq!(count(&posts[0]), 1);
    assert_eq!(count(&posts[1]), 0);
}
