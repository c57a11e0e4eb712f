use archetype::prelude::*;
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;

//
// Models
//

#[derive(Model)]
struct Tag;

impl Tag {
    fn declare_model(decl: &mut ModelDecl) {
        decl.field("label", TypeExpr::Str);
    }
}

#[derive(Model)]
struct Record;

impl Record {
    fn declare_model(decl: &mut ModelDecl) {
        decl.field("flag", TypeExpr::Bool);
        decl.field("count", TypeExpr::Int);
        decl.field("ratio", TypeExpr::Float);
        decl.field("label", TypeExpr::Str);
        decl.field("notes", TypeExpr::list(TypeExpr::Str));
        decl.field("scores", TypeExpr::dict(TypeExpr::Str, TypeExpr::Int));
        decl.field("tag", TypeExpr::model::<Tag>().nullable());
    }
}

#[derive(Model)]
struct Strict;

impl Strict {
    fn declare_model(decl: &mut ModelDecl) {
        decl.field("code", TypeExpr::Str)
            .options(FieldOptions::str().min_length(3));
        decl.field("size", TypeExpr::Int)
            .options(FieldOptions::int().min_value(0).max_value(10));
        decl.field("extra", TypeExpr::Int.nullable()).default(Value::Null);
    }
}

fn record_input() -> impl Strategy<Value = Value> {
    (
        any::<bool>(),
        any::<i64>(),
        -1.0e9..1.0e9f64,
        ".{0,12}",
        prop::collection::vec("[a-z]{0,6}", 0..4),
        prop::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..4),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(flag, count, ratio, label, notes, scores, tag)| {
            let scores: BTreeMap<Key, Value> = scores
                .into_iter()
                .map(|(k, v)| (Key::from(k), Value::from(v)))
                .collect();
            let tag = tag.map_or(Value::Null, |label| Value::map([("label", label)]));

            Value::map([
                ("flag", Value::from(flag)),
                ("count", Value::from(count)),
                ("ratio", Value::from(ratio)),
                ("label", Value::from(label)),
                ("notes", Value::from(notes)),
                ("scores", Value::from(scores)),
                ("tag", tag),
            ])
        })
}

proptest! {
    #[test]
    fn construct_of_serialize_round_trips(raw in record_input()) {
        let record = Record::construct(&raw).unwrap();
        let again = Record::construct(&record.serialize()).unwrap();

        prop_assert_eq!(&again, &record);
        prop_assert_eq!(again.serialize(), raw);
    }

    #[test]
    fn unknown_role_falls_back_by_emptiness(empty in any::<bool>(), label in "[a-z]{1,8}") {
        let role = Role::new(format!("adhoc-{label}"), empty);
        let tag = Tag::construct(&Value::map([("label", label.as_str())])).unwrap();

        let expected = if empty { Value::empty_map() } else { tag.serialize() };
        prop_assert_eq!(tag.serialize_for(&role), expected);
    }

    #[test]
    fn integers_and_bool_strings_coerce(n in any::<i64>(), b in any::<bool>()) {
        let raw = Value::map([
            ("flag", Value::from(if b { "yes" } else { "no" })),
            ("count", Value::from(n.to_string())),
            ("ratio", Value::from(n)),
            ("label", Value::from(n)),
            ("notes", Value::from(Vec::<Value>::new())),
            ("scores", Value::empty_map()),
        ]);
        let record = Record::construct(&raw).unwrap();

        prop_assert_eq!(record.value("flag"), Some(&Value::Bool(b)));
        prop_assert_eq!(record.value("count"), Some(&Value::Int(n)));
        prop_assert_eq!(record.value("label"), Some(&Value::from(n.to_string())));
    }

    #[test]
    fn missing_required_field_reports_only_required(size in -100_i64..100) {
        let strict = Strict::construct(&Value::map([("size", size)])).unwrap();
        let err = strict.validate().unwrap_err();

        let code_errors: Vec<_> = err
            .error_list()
            .iter()
            .filter(|e| e.path == ["code"])
            .collect();
        prop_assert_eq!(code_errors.len(), 1);
        prop_assert_eq!(code_errors[0].message.as_str(), archetype::REQUIRED_MESSAGE);
    }
}

#[test]
fn deep_copy_is_independent_and_shallow_copy_shares() {
    let record = Record::construct_json(json!({
        "flag": true, "count": 1, "ratio": 0.5, "label": "x",
        "notes": ["a", "b"], "scores": {"a": 1}, "tag": {"label": "t"}
    }))
    .unwrap();

    let mut deep = record.copy(true);
    if let Some(Value::List(notes)) = deep.value_mut("notes").unwrap() {
        notes.push(Value::from("c"));
    }
    assert_eq!(record.value("notes").and_then(Value::as_list).map(<[Value]>::len), Some(2));
    assert!(!deep.shares_storage(&record, "tag"));

    let shallow = record.copy(false);
    assert!(shallow.shares_storage(&record, "notes"));
    assert!(shallow.shares_storage(&record, "tag"));
    assert_eq!(shallow, record);
}

#[test]
fn validation_reports_every_invalid_field() {
    let strict = Strict::construct_json(json!({"code": "ab", "size": 11})).unwrap();
    let err = strict.validate().unwrap_err();

    assert_eq!(
        serde_json::to_value(err.errors()).unwrap(),
        json!({
            "code": ["Must be at least 3 characters long"],
            "size": ["Must be between 0 and 10"],
        })
    );
}

#[test]
fn null_on_required_field_is_reported_as_required() {
    let strict = Strict::construct_json(json!({"code": null, "size": 1})).unwrap();
    let err = strict.validate().unwrap_err();

    assert_eq!(err.error_list().len(), 1);
    assert_eq!(err.to_string(), "code: This field is required");
}
