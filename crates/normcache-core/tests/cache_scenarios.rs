//! # Cache Scenarios
//!
//! End-to-end behavior of the store through its public API, grouped by
//! concern.

use normcache_core::document::fields;
use normcache_core::{
    CacheConfig, CacheError, Completeness, Document, Field, InputValue, IntrospectionSchema, Link,
    Resolved, Selection, Store, Variables,
};
use serde_json::{Value as Json, json};

fn vars(value: Json) -> Variables {
    match value {
        Json::Object(map) => map,
        _ => Variables::new(),
    }
}

fn todo_query(selection: &[&str]) -> Document {
    Document::query(vec![Field::new("todo").select(fields(selection)).into()])
}

/// A schema where `Todo` and `Photo` implement `Node`, `Todo.text` is
/// non-null, `todos` is `[Todo]!` and `pinned` is `[Todo!]`.
fn node_schema() -> IntrospectionSchema {
    let raw = json!({
        "data": {
            "__schema": {
                "queryType": {"name": "Query"},
                "mutationType": null,
                "types": [
                    {"kind": "OBJECT", "name": "Query", "fields": [
                        {"name": "node", "type": {"kind": "INTERFACE", "name": "Node"}},
                        {"name": "todos", "type": {"kind": "NON_NULL", "ofType": {"kind": "LIST", "ofType": {"kind": "OBJECT", "name": "Todo"}}}},
                        {"name": "pinned", "type": {"kind": "LIST", "ofType": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Todo"}}}},
                        {"name": "todo", "type": {"kind": "OBJECT", "name": "Todo"}}
                    ]},
                    {"kind": "INTERFACE", "name": "Node",
                     "fields": [{"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}],
                     "possibleTypes": [{"name": "Todo"}, {"name": "Photo"}]},
                    {"kind": "OBJECT", "name": "Todo", "interfaces": [{"name": "Node"}], "fields": [
                        {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                        {"name": "text", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                        {"name": "done", "type": {"kind": "SCALAR", "name": "Boolean"}}
                    ]},
                    {"kind": "OBJECT", "name": "Photo", "interfaces": [{"name": "Node"}], "fields": [
                        {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                        {"name": "url", "type": {"kind": "SCALAR", "name": "String"}}
                    ]}
                ]
            }
        }
    });
    IntrospectionSchema::from_json(&raw.to_string()).expect("schema")
}

// =============================================================================
// PROPERTY RESOLUTION
// =============================================================================

mod resolution {
    use super::*;

    /// A written scalar resolves; an unselected one is unknown and makes a
    /// read of it partial.
    #[test]
    fn scalar_and_unselected_fields() {
        let mut store = Store::default();
        store
            .write(
                &todo_query(&["__typename", "id", "text"]),
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1", "text": "a"}}),
            )
            .expect("write");

        let todo = store.find("Todo:1").expect("record");
        assert_eq!(
            store.resolve_property(&todo, "text", None),
            Resolved::Scalar(json!("a"))
        );
        assert!(store.resolve_property(&todo, "done", None).is_missing());

        let result = store
            .read(&todo_query(&["id", "done"]), &Variables::new())
            .expect("read");
        assert_eq!(result.completeness, Completeness::Partial);
        assert_eq!(result.data, Some(json!({"todo": {"id": "1", "done": null}})));
    }

    /// Without a schema a type-conditioned fragment always applies, so a
    /// field it needs that was never cached keeps the read partial.
    #[test]
    fn type_conditions_without_schema_require_their_fields() {
        let mut store = Store::default();
        store
            .write(
                &todo_query(&["__typename", "id"]),
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1"}}),
            )
            .expect("write");

        let query = Document::query(vec![
            Field::new("todo")
                .select(vec![Field::new("id").into(), Selection::on("Node", fields(&["text"]))])
                .into(),
        ]);
        let result = store.read(&query, &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Partial);
        assert_eq!(result.data, Some(json!({"todo": {"id": "1", "text": null}})));
    }

    /// List links keep null slots in place.
    #[test]
    fn list_link_with_null_slot() {
        let mut store = Store::default();
        let document = Document::query(vec![
            Field::new("user")
                .select(vec![
                    Field::new("__typename").into(),
                    Field::new("id").into(),
                    Field::new("todos").select(fields(&["__typename", "id"])).into(),
                ])
                .into(),
        ]);
        let data = json!({"user": {
            "__typename": "User",
            "id": "1",
            "todos": [{"__typename": "Todo", "id": "1"}, null]
        }});
        store.write(&document, &Variables::new(), &data).expect("write");

        assert_eq!(
            store.read_link("User:1.todos"),
            Some(&Link::Many(vec![Some("Todo:1".into()), None]))
        );

        let user = store.find("User:1").expect("record");
        let items = match store.resolve_property(&user, "todos", None) {
            Resolved::List(items) => items,
            _ => Vec::new(),
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Resolved::Entity { key, .. } if key == "Todo:1"));
        assert_eq!(items[1], Resolved::Null);

        let result = store.read(&document, &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Full);
        assert_eq!(result.data, Some(data));
    }

    /// Removing an entity leaves links dangling; reads degrade instead of
    /// failing.
    #[test]
    fn removed_entity_leaves_dangling_link() {
        let mut store = Store::default();
        let document = Document::query(vec![
            Field::new("todos").select(fields(&["__typename", "id"])).into(),
        ]);
        store
            .write(
                &document,
                &Variables::new(),
                &json!({"todos": [{"__typename": "Todo", "id": "1"}, {"__typename": "Todo", "id": "2"}]}),
            )
            .expect("write");
        store.remove("Todo:1");

        assert_eq!(
            store.read_link("Query.todos"),
            Some(&Link::Many(vec![Some("Todo:1".into()), Some("Todo:2".into())]))
        );
        let result = store.read(&document, &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Partial);
        assert_eq!(
            result.data,
            Some(json!({"todos": [null, {"__typename": "Todo", "id": "2"}]}))
        );
    }

    /// Variables fill arguments, and declared defaults fill missing variables.
    #[test]
    fn arguments_and_variable_defaults() {
        let mut store = Store::default();
        let document = Document::query(vec![
            Field::new("todos")
                .arg("first", InputValue::Variable("first".into()))
                .select(fields(&["__typename", "id"]))
                .into(),
        ])
        .with_variable_default("first", json!(10));

        store
            .write(
                &document,
                &Variables::new(),
                &json!({"todos": [{"__typename": "Todo", "id": "1"}]}),
            )
            .expect("write");
        assert!(store.read_link(r#"Query.todos({"first":10})"#).is_some());

        let explicit = store
            .read(&document, &vars(json!({"first": 10})))
            .expect("read");
        assert_eq!(explicit.completeness, Completeness::Full);

        let other = store
            .read(&document, &vars(json!({"first": 5})))
            .expect("read");
        assert_eq!(other.completeness, Completeness::Empty);
    }
}

// =============================================================================
// SCHEMA-AWARE READS
// =============================================================================

mod schema_aware {
    use super::*;

    fn node_query() -> Document {
        Document::query(vec![
            Field::new("node")
                .arg("id", InputValue::Literal(json!("1")))
                .select(vec![
                    Field::new("__typename").into(),
                    Field::new("id").into(),
                    Selection::spread("NodeText"),
                    Selection::on("Photo", fields(&["url"])),
                ])
                .into(),
        ])
        .with_fragment("NodeText", "Node", fields(&["id"]))
        .with_fragment("Unused", "Todo", fields(&["text"]))
    }

    /// A `Todo` satisfies a fragment on `Node` and skips a fragment on
    /// `Photo`.
    #[test]
    fn interface_fragment_matches_implementation() {
        let mut store = Store::new(CacheConfig::new().schema(node_schema())).expect("store");
        let data = json!({"node": {"__typename": "Todo", "id": "1"}});
        store
            .write(&node_query(), &Variables::new(), &data)
            .expect("write");

        let result = store.read(&node_query(), &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Full);
        assert_eq!(result.data, Some(data));
    }

    /// With a schema, fragment matching no longer guesses from cached fields.
    #[test]
    fn schema_rejects_unrelated_fragment() {
        let mut store = Store::new(CacheConfig::new().schema(node_schema())).expect("store");
        let query = Document::query(vec![
            Field::new("todo")
                .select(vec![
                    Field::new("__typename").into(),
                    Field::new("id").into(),
                    Selection::on("Photo", fields(&["id"])),
                ])
                .into(),
        ]);
        store
            .write(
                &query,
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1"}}),
            )
            .expect("write");
        let result = store.read(&query, &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Full);
        assert_eq!(
            result.data,
            Some(json!({"todo": {"__typename": "Todo", "id": "1"}}))
        );
    }

    /// A null cached for a non-null field makes the read partial; a null on
    /// a nullable field does not.
    #[test]
    fn non_null_fields_demote_nulls() {
        let mut store = Store::new(CacheConfig::new().schema(node_schema())).expect("store");
        let query = todo_query(&["__typename", "id", "text", "done"]);
        store
            .write(
                &query,
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1", "text": null, "done": null}}),
            )
            .expect("write");
        let result = store.read(&query, &Variables::new()).expect("read");
        assert_eq!(result.completeness, Completeness::Partial);

        let nullable_only = store
            .read(&todo_query(&["id", "done"]), &Variables::new())
            .expect("read");
        assert_eq!(nullable_only.completeness, Completeness::Full);
    }

    /// Null list slots are judged by the item type: `[Todo]!` tolerates
    /// them, `[Todo!]` does not.
    #[test]
    fn list_items_use_item_nullability() {
        let mut store = Store::new(CacheConfig::new().schema(node_schema())).expect("store");
        for name in ["todos", "pinned"] {
            let query = Document::query(vec![
                Field::new(name).select(fields(&["__typename", "id"])).into(),
            ]);
            let mut data = serde_json::Map::new();
            data.insert(name.to_string(), json!([{"__typename": "Todo", "id": "1"}, null]));
            let data = Json::Object(data);
            store.write(&query, &Variables::new(), &data).expect("write");

            let result = store.read(&query, &Variables::new()).expect("read");
            assert_eq!(result.data, Some(data));
            let expected = if name == "todos" {
                Completeness::Full
            } else {
                Completeness::Partial
            };
            assert_eq!(result.completeness, expected, "{name}");
        }
    }

    /// Configuration naming fields the schema lacks is rejected up front.
    #[test]
    fn config_is_checked_against_schema() {
        let config = CacheConfig::new()
            .schema(node_schema())
            .update("Todo", "title", |_, _, _, _| {});
        assert!(matches!(
            Store::new(config),
            Err(CacheError::InvalidConfig(_))
        ));
    }
}

// =============================================================================
// OPTIMISTIC LAYERS
// =============================================================================

mod optimistic {
    use super::*;

    fn toggle(id: &str) -> (Document, Variables) {
        let document = Document::mutation(vec![
            Field::new("toggle")
                .arg("id", InputValue::Variable("id".into()))
                .select(fields(&["__typename", "id", "done"]))
                .into(),
        ]);
        (document, vars(json!({"id": id})))
    }

    fn seeded() -> Store {
        let config = CacheConfig::new().optimistic("toggle", |args, store, _| {
            let id = args.get("id").and_then(Json::as_str).unwrap_or_default();
            let done = store
                .find(&format!("Todo:{id}"))
                .and_then(|todo| todo.scalar("done").and_then(Json::as_bool))
                .unwrap_or(false);
            json!({"__typename": "Todo", "id": id, "done": !done})
        });
        let mut store = Store::new(config).expect("store");
        store
            .write(
                &todo_query(&["__typename", "id", "done"]),
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1", "done": false}}),
            )
            .expect("write");
        store
    }

    fn done(store: &Store) -> Option<Json> {
        store.read(&todo_query(&["done"]), &Variables::new()).ok()?.data
    }

    /// Concurrent layers stack; reverting one leaves the others.
    #[test]
    fn layers_stack_and_revert_independently() {
        let mut store = seeded();
        let (mutation, variables) = toggle("1");

        store
            .write_optimistic(&mutation, &variables, 1)
            .expect("optimistic");
        assert_eq!(done(&store), Some(json!({"todo": {"done": true}})));

        store
            .write_optimistic(&mutation, &variables, 2)
            .expect("optimistic");
        assert_eq!(done(&store), Some(json!({"todo": {"done": false}})));
        assert_eq!(store.optimistic_layers(), vec![2, 1]);

        store.clear_layer(2);
        assert_eq!(done(&store), Some(json!({"todo": {"done": true}})));

        store.clear_layer(1);
        assert_eq!(done(&store), Some(json!({"todo": {"done": false}})));
    }

    /// Committing writes the real result to base and closes the layer.
    #[test]
    fn commit_promotes_result() {
        let mut store = seeded();
        let (mutation, variables) = toggle("1");
        store
            .write_optimistic(&mutation, &variables, 7)
            .expect("optimistic");
        store
            .commit(
                &mutation,
                &variables,
                &json!({"toggle": {"__typename": "Todo", "id": "1", "done": true}}),
                7,
            )
            .expect("commit");

        assert!(store.optimistic_layers().is_empty());
        assert_eq!(done(&store), Some(json!({"todo": {"done": true}})));
    }

    /// `update_query` during an optimistic write stays inside the layer.
    #[test]
    fn update_query_follows_layer() {
        let config = CacheConfig::new().update("Mutation", "addTodo", |value, _, store, _| {
            let list = Document::query(vec![
                Field::new("todos").select(fields(&["__typename", "id"])).into(),
            ]);
            let added = value.clone();
            let outcome = store.update_query(&list, &Variables::new(), move |current| {
                let mut todos = current
                    .and_then(|data| data.get("todos").cloned())
                    .and_then(|todos| todos.as_array().cloned())
                    .unwrap_or_default();
                todos.push(json!({"__typename": added["__typename"], "id": added["id"]}));
                Some(json!({"todos": todos}))
            });
            assert!(outcome.is_ok());
        });
        let mut store = Store::new(config).expect("store");
        let list = Document::query(vec![
            Field::new("todos").select(fields(&["__typename", "id"])).into(),
        ]);
        store
            .write(
                &list,
                &Variables::new(),
                &json!({"todos": [{"__typename": "Todo", "id": "1"}]}),
            )
            .expect("write");

        let add = Document::mutation(vec![
            Field::new("addTodo")
                .select(fields(&["__typename", "id"]))
                .into(),
        ]);
        store
            .write_in_layer(
                &add,
                &Variables::new(),
                &json!({"addTodo": {"__typename": "Todo", "id": "2"}}),
                3,
            )
            .expect("write");

        let ids = |store: &Store| {
            store
                .read(&list, &Variables::new())
                .ok()
                .and_then(|result| result.data)
                .and_then(|data| data["todos"].as_array().map(Vec::len))
        };
        assert_eq!(ids(&store), Some(2));
        store.clear_layer(3);
        assert_eq!(ids(&store), Some(1));
    }
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

mod snapshots {
    use super::*;

    #[test]
    fn snapshot_reflects_visible_state() {
        let mut store = Store::default();
        store
            .write(
                &todo_query(&["__typename", "id", "text"]),
                &Variables::new(),
                &json!({"todo": {"__typename": "Todo", "id": "1", "text": "a"}}),
            )
            .expect("write");

        let snapshot = store.snapshot();
        assert_eq!(
            snapshot.records.keys().collect::<Vec<_>>(),
            vec!["Query", "Todo:1"]
        );
        assert_eq!(
            snapshot.links.get("Query.todo"),
            Some(&Link::One("Todo:1".into()))
        );

        let encoded = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(
            encoded["records"]["Todo:1"]["text"],
            json!({"kind": "scalar", "value": "a"})
        );
        assert_eq!(encoded["links"]["Query.todo"], json!("Todo:1"));
    }
}
