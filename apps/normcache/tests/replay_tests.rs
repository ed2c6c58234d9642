//! Replay script tests against real files and schemas.

#![allow(clippy::unwrap_used, clippy::panic)]

use normcache::cli::{build_store, cmd_key, cmd_replay, cmd_schema};
use normcache::script::{Script, replay};
use normcache_core::{CacheError, Completeness};
use serde_json::{Value as Json, json};
use std::fs;
use std::path::Path;

fn query(selection_set: Json) -> Json {
    json!({"definitions": [{"kind": "operation", "selection_set": selection_set}]})
}

fn mutation(selection_set: Json) -> Json {
    json!({"definitions": [{
        "kind": "operation",
        "operation": "mutation",
        "selection_set": selection_set
    }]})
}

fn todo_fields() -> Json {
    json!([
        {"kind": "field", "name": "__typename"},
        {"kind": "field", "name": "id"},
        {"kind": "field", "name": "text"}
    ])
}

fn todos_query() -> Json {
    query(json!([{"kind": "field", "name": "todos", "selection_set": todo_fields()}]))
}

fn update_todo() -> Json {
    mutation(json!([{
        "kind": "field",
        "name": "updateTodo",
        "arguments": [{"name": "id", "value": {"variable": "id"}}],
        "selection_set": todo_fields()
    }]))
}

/// Introspection with a renamed query root and a non-null `Todo.text`.
fn schema_json() -> Json {
    let todo_ref = json!({"kind": "OBJECT", "name": "Todo"});
    let string_ref = json!({"kind": "SCALAR", "name": "String"});
    json!({"data": {"__schema": {
        "queryType": {"name": "RootQuery"},
        "mutationType": {"name": "Mutation"},
        "types": [
            {"kind": "OBJECT", "name": "RootQuery", "fields": [
                {"name": "todos", "type": {"kind": "LIST", "ofType": todo_ref}}
            ]},
            {"kind": "OBJECT", "name": "Mutation", "fields": [
                {"name": "updateTodo", "type": todo_ref}
            ]},
            {"kind": "OBJECT", "name": "Todo", "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "text", "type": {"kind": "NON_NULL", "ofType": string_ref}}
            ]}
        ]
    }}})
}

fn write_file(dir: &Path, name: &str, value: &Json) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

#[test]
fn test_optimistic_mutation_then_commit() {
    let initial = json!({"todos": [
        {"__typename": "Todo", "id": "1", "text": "draft"},
        {"__typename": "Todo", "id": "2", "text": "other"}
    ]});
    let guess = json!({"updateTodo": {"__typename": "Todo", "id": "1", "text": "guess"}});
    let real = json!({"updateTodo": {"__typename": "Todo", "id": "1", "text": "final"}});
    let script = Script::from_json(
        &json!({"steps": [
            {"op": "write", "document": todos_query(), "data": initial},
            {"op": "write_optimistic", "document": update_todo(), "variables": {"id": "1"}, "data": guess, "layer": 1},
            {"op": "read", "document": todos_query()},
            {"op": "commit", "document": update_todo(), "variables": {"id": "1"}, "data": real, "layer": 1},
            {"op": "read", "document": todos_query()}
        ]})
        .to_string(),
    )
    .unwrap();

    let mut store = build_store(None).unwrap();
    let outcomes = replay(&mut store, &script).unwrap();

    assert_eq!(outcomes[1].layers, vec![1]);
    assert_eq!(outcomes[2].data.as_ref().unwrap()["todos"][0]["text"], json!("guess"));
    assert!(outcomes[3].layers.is_empty());
    assert_eq!(outcomes[4].completeness, Some(Completeness::Full));
    assert_eq!(outcomes[4].data.as_ref().unwrap()["todos"][0]["text"], json!("final"));
    assert_eq!(outcomes[4].data.as_ref().unwrap()["todos"][1]["text"], json!("other"));
}

#[test]
fn test_schema_roots_and_nullability() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_file(dir.path(), "schema.json", &schema_json());
    let mut store = build_store(Some(&schema)).unwrap();

    let script = Script::from_json(
        &json!({"steps": [
            {"op": "write", "document": todos_query(), "data": {"todos": [
                {"__typename": "Todo", "id": "1", "text": null}
            ]}},
            {"op": "read", "document": todos_query()}
        ]})
        .to_string(),
    )
    .unwrap();
    let outcomes = replay(&mut store, &script).unwrap();

    assert!(outcomes[0].dependencies.contains("Todo:1"));
    assert!(outcomes[1].dependencies.contains("RootQuery"));
    // Null on a non-null field cannot be served as-is.
    assert_eq!(outcomes[1].completeness, Some(Completeness::Partial));
    assert!(store.read_link("RootQuery.todos").is_some());
}

#[test]
fn test_fragment_steps() {
    let fragment = json!({"definitions": [{
        "kind": "fragment",
        "name": "TodoText",
        "type_condition": "Todo",
        "selection_set": [
            {"kind": "field", "name": "id"},
            {"kind": "field", "name": "text"}
        ]
    }]});
    let script = Script::from_json(
        &json!({"steps": [
            {"op": "write_fragment", "document": fragment, "data": {"__typename": "Todo", "id": "3", "text": "x"}},
            {"op": "read_fragment", "document": fragment, "entity": "Todo:3"},
            {"op": "read_fragment", "document": fragment, "entity": {"__typename": "Todo", "id": "4"}}
        ]})
        .to_string(),
    )
    .unwrap();

    let mut store = build_store(None).unwrap();
    let outcomes = replay(&mut store, &script).unwrap();

    assert_eq!(outcomes[1].completeness, Some(Completeness::Full));
    assert_eq!(outcomes[1].data, Some(json!({"id": "3", "text": "x"})));
    assert_eq!(outcomes[2].completeness, Some(Completeness::Empty));
    assert_eq!(outcomes[2].data, None);
}

#[test]
fn test_failing_step_stops_replay() {
    let script = Script::from_json(
        &json!({"steps": [
            {"op": "write", "document": {"definitions": []}, "data": {}}
        ]})
        .to_string(),
    )
    .unwrap();
    let mut store = build_store(None).unwrap();
    let err = replay(&mut store, &script).unwrap_err();
    assert!(matches!(err, CacheError::MissingOperation));
}

#[test]
fn test_commands_accept_files() {
    let dir = tempfile::tempdir().unwrap();
    let schema = write_file(dir.path(), "schema.json", &schema_json());
    let script = write_file(
        dir.path(),
        "steps.json",
        &json!({"steps": [{"op": "read", "document": todos_query()}]}),
    );

    cmd_replay(Some(&schema), true, &script, true).unwrap();
    cmd_replay(None, false, &script, false).unwrap();
    cmd_schema(Some(&schema), false).unwrap();
    cmd_key(None, true, r#"{"__typename": "Todo", "id": 1}"#).unwrap();
}

#[test]
fn test_bad_inputs_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "not json").unwrap();

    assert!(matches!(
        cmd_replay(None, false, &garbage, false).unwrap_err(),
        CacheError::SerializationError(_)
    ));
    assert!(matches!(
        build_store(Some(&garbage)).unwrap_err(),
        CacheError::Schema(_)
    ));
    assert!(matches!(
        cmd_key(None, false, "{").unwrap_err(),
        CacheError::SerializationError(_)
    ));
}
