use mooring::model::{FieldDef, FieldType, IndexDef, Model, RelationDef};
use mooring::StorageError;

fn fields() -> Vec<FieldDef> {
    vec![
        FieldDef::new("tenant", FieldType::String),
        FieldDef::new("id", FieldType::Integer),
        FieldDef::new("title", FieldType::String),
    ]
}

#[test]
fn test_index_on_unknown_field_is_rejected() {
    let result = Model::new("post", "posts", fields(), vec![IndexDef::unique("slug", ["slug"]).unwrap()], vec![]);
    assert!(matches!(result, Err(StorageError::Definition(_))));
}

#[test]
fn test_relation_on_unknown_field_is_rejected() {
    let relation = RelationDef::many("comments", "comment", [("uuid", "post_uuid")]).unwrap();
    let result = Model::new("post", "posts", fields(), vec![], vec![relation]);
    assert!(matches!(result, Err(StorageError::Definition(_))));
}

#[test]
fn test_empty_key_sets_are_rejected() {
    let keys: [(&str, &str); 0] = [];
    assert!(matches!(RelationDef::many("comments", "comment", keys), Err(StorageError::Definition(_))));
    assert!(matches!(
        RelationDef::many_through("tags", "tag", "post_tag", [("id", "post_id")], keys),
        Err(StorageError::Definition(_))
    ));
    assert!(IndexDef::primary(Vec::<String>::new()).is_err());
}

#[test]
fn test_primary_fields_follow_index_order() {
    let model = Model::new(
        "post",
        "posts",
        fields(),
        vec![IndexDef::primary(["id", "tenant"]).unwrap()],
        vec![],
    )
    .unwrap();
    let primary: Vec<&str> = model.primary_fields().iter().map(|f| f.name()).collect();
    assert_eq!(primary, vec!["id", "tenant"]);
    assert!(model.is_primary("tenant").unwrap());
    assert!(!model.is_primary("title").unwrap());

    let keyless = Model::new("log", "logs", fields(), vec![], vec![]).unwrap();
    assert!(keyless.primary_fields().is_empty());
}

#[test]
fn test_lookups_name_the_entity() {
    let model = Model::new("post", "posts", fields(), vec![], vec![]).unwrap();
    let err = model.relation("tags").unwrap_err();
    assert_eq!(err.to_string(), "Unknown relation 'tags' in entity 'post'");
    assert!(matches!(model.index("primary"), Err(StorageError::NotFound { .. })));
    assert!(model.field("nope").is_err());
}
