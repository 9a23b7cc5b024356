use crate::fixtures::{binds, post_row, storage};
use mooring::driver::{mock, MockDriver};
use mooring::model::{FieldDef, FieldType, IndexDef, Model, RelationDef};
use mooring::query::StatementKind;
use mooring::{Entity, SeaQueryBuilder, Storage, Value};
use std::rc::Rc;

fn comment_row(id: i64, post: i64, body: &str) -> mooring::Row {
    mock::row([("id", Value::from(id)), ("post_id", Value::from(post)), ("body", Value::from(body))])
}

#[test]
fn test_many_read_groups_rows_by_owner() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(1), post_row(2)])
            .append_rows(
                StatementKind::Select,
                "comments",
                vec![comment_row(7, 2, "first"), comment_row(8, 1, "second"), comment_row(9, 2, "third")],
            ),
    );
    let storage = storage(&driver);

    let posts = storage.read("post").with("comments").all().unwrap();

    assert_eq!(driver.count_of(StatementKind::Select, "comments"), 1);
    let bodies = |post: &Entity| -> Vec<Value> {
        post.get("comments")
            .and_then(|p| p.as_collection())
            .unwrap()
            .iter()
            .map(|c| c.value_or_null("body"))
            .collect()
    };
    assert_eq!(bodies(&posts[0]), vec![Value::from("second")]);
    assert_eq!(bodies(&posts[1]), vec![Value::from("first"), Value::from("third")]);

    // `body` is stored in the `content` column
    let select = &driver.statements_for(StatementKind::Select, "comments")[0];
    assert!(select.sql.contains("\"content\" AS \"body\""));
}

#[test]
fn test_relation_scope_reaches_the_target_fetch() {
    let driver = Rc::new(MockDriver::new().append_rows(StatementKind::Select, "posts", vec![post_row(1)]));
    let storage = storage(&driver);

    storage
        .read("post")
        .with_scope("comments", |s| s.filter("body", "spam").limit(3))
        .all()
        .unwrap();

    let select = &driver.statements_for(StatementKind::Select, "comments")[0];
    assert!(select.sql.contains("\"content\" = "));
    assert!(select.sql.contains("LIMIT"));
    assert!(select.parameters().contains(&sea_query::Value::from("spam".to_string())));
}

#[test]
fn test_many_delete_never_touches_a_mediator() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);
    let post = Entity::new().with("id", 1).with(
        "comments",
        vec![Entity::new().with("id", 7).with("post_id", 1), Entity::new().with("id", 8).with("post_id", 1)],
    );

    storage.delete("post", post).with("comments").execute().unwrap();

    let deletes = driver.statements_for(StatementKind::Delete, "comments");
    assert_eq!(deletes.len(), 2);
    assert!(binds(&deletes[0], 7));
    assert!(binds(&deletes[1], 8));
    assert_eq!(driver.count_on("post_tags"), 0);
    assert_eq!(driver.count_on("post_categories"), 0);
    assert_eq!(driver.count_of(StatementKind::Delete, "posts"), 1);
}

#[test]
fn test_delete_where_reads_relations_first() {
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(StatementKind::Select, "posts", vec![post_row(4)])
            .append_rows(StatementKind::Select, "comments", vec![comment_row(40, 4, "bye")])
            .append_affected(StatementKind::Delete, "posts", 1),
    );
    let storage = storage(&driver);

    let outcome = storage.delete_where("post").filter("title", "post 4").with("comments").execute().unwrap();

    assert_eq!(outcome.count(), 1);
    let kinds: Vec<(StatementKind, String)> = driver.statements().into_iter().map(|s| (s.kind, s.table)).collect();
    assert_eq!(
        kinds,
        vec![
            (StatementKind::Select, "posts".to_string()),
            (StatementKind::Select, "comments".to_string()),
            (StatementKind::Delete, "comments".to_string()),
            (StatementKind::Delete, "posts".to_string()),
        ]
    );
}

#[test]
fn test_composite_keys_correlate_exactly() {
    let account = Model::new(
        "account",
        "accounts",
        vec![FieldDef::new("tenant", FieldType::String), FieldDef::new("id", FieldType::Integer)],
        vec![IndexDef::primary(["tenant", "id"]).unwrap()],
        vec![RelationDef::many("invoices", "invoice", [("tenant", "tenant"), ("id", "account_id")]).unwrap()],
    )
    .unwrap();
    let invoice = Model::new(
        "invoice",
        "invoices",
        vec![
            FieldDef::new("number", FieldType::Integer),
            FieldDef::new("tenant", FieldType::String),
            FieldDef::new("account_id", FieldType::Integer),
        ],
        vec![IndexDef::primary(["number"]).unwrap()],
        vec![],
    )
    .unwrap();
    let invoice_row = |number: i64, tenant: &str, account: i64| {
        mock::row([
            ("number", Value::from(number)),
            ("tenant", Value::from(tenant)),
            ("account_id", Value::from(account)),
        ])
    };
    let driver = Rc::new(
        MockDriver::new()
            .append_rows(
                StatementKind::Select,
                "accounts",
                vec![
                    mock::row([("tenant", Value::from("a")), ("id", Value::from(1))]),
                    mock::row([("tenant", Value::from("b")), ("id", Value::from(2))]),
                ],
            )
            // ("a", 2) matches both IN lists but belongs to no account
            .append_rows(
                StatementKind::Select,
                "invoices",
                vec![invoice_row(100, "a", 1), invoice_row(101, "a", 2), invoice_row(102, "b", 2)],
            ),
    );
    let storage = Storage::new(driver.clone(), SeaQueryBuilder::default())
        .with_model(account)
        .with_model(invoice);

    let accounts = storage.read("account").with("invoices").all().unwrap();

    let numbers = |account: &Entity| -> Vec<Value> {
        account
            .get("invoices")
            .and_then(|p| p.as_collection())
            .unwrap()
            .iter()
            .map(|i| i.value_or_null("number"))
            .collect()
    };
    assert_eq!(numbers(&accounts[0]), vec![Value::from(100)]);
    assert_eq!(numbers(&accounts[1]), vec![Value::from(102)]);
}

#[test]
fn test_unknown_relation_field_fails_before_any_statement() {
    let driver = Rc::new(MockDriver::new());
    let storage = storage(&driver);

    let err = storage.read("post").with("broken").all().unwrap_err();

    assert!(matches!(err, mooring::StorageError::Definition(_)));
    assert!(driver.statements().is_empty());
}
