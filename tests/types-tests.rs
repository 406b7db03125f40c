use indexmap::IndexMap;
use jsonpath_types::{DataType, PathSegment};
use serde_json::json;

fn object(properties: &[(&str, DataType)], rest: DataType, required: &[&str]) -> DataType {
    let properties: IndexMap<String, DataType> = properties
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    DataType::object(properties, rest, required.iter().map(|s| s.to_string()))
}

fn samples() -> Vec<DataType> {
    vec![
        DataType::any(),
        DataType::never(),
        DataType::number(),
        DataType::string(),
        DataType::boolean(),
        DataType::null(),
        DataType::nothing(),
        DataType::literal(json!(1)),
        DataType::literal(json!("a")),
        DataType::literal(json!(true)),
        DataType::union([DataType::string(), DataType::number()]),
        DataType::array_of(DataType::number()),
        DataType::array(vec![DataType::string()], DataType::never(), 1),
        object(&[("a", DataType::number())], DataType::never(), &["a"]),
        object(&[("a", DataType::number())], DataType::any(), &[]),
        DataType::record_of(DataType::string()),
    ]
}

#[test]
fn subtyping_is_reflexive_and_transitive() {
    let samples = samples();

    for a in &samples {
        assert!(a.is_subtype_of(a), "{a}");
        for b in &samples {
            for c in &samples {
                if a.is_subtype_of(b) && b.is_subtype_of(c) {
                    assert!(a.is_subtype_of(c), "{a} <: {b} <: {c}");
                }
            }
        }
    }
}

#[test]
fn equivalence_is_mutual_subtyping() {
    let samples = samples();

    for a in &samples {
        for b in &samples {
            assert_eq!(
                a.equivalent(b),
                a.is_subtype_of(b) && b.is_subtype_of(a),
                "{a} ~ {b}"
            );
        }
    }
}

#[test]
fn identities() {
    for t in samples() {
        assert!(t.intersect(&DataType::never()).is_never(), "{t}");
        assert!(DataType::never().intersect(&t).is_never(), "{t}");
        assert_eq!(t.intersect(&DataType::any()), t);
        assert_eq!(DataType::union([t.clone(), DataType::never()]), t);
        assert_eq!(DataType::union([t.clone()]), t);
    }
    assert!(DataType::union([]).is_never());
}

#[test]
fn unions_are_normalized() {
    let samples = samples();
    let t = DataType::union(samples.iter().skip(1).cloned());

    let members = t.members();
    for (i, a) in members.iter().enumerate() {
        for (j, b) in members.iter().enumerate() {
            if i != j {
                assert!(!a.is_subtype_of(b), "{a} <: {b} in {t}");
            }
        }
    }

    let t = DataType::union([DataType::literal(json!(true)), DataType::literal(json!(false))]);
    assert_eq!(t, DataType::boolean());
}

#[test]
fn unsatisfiable_shapes_collapse() {
    assert!(object(&[("a", DataType::never())], DataType::never(), &["a"]).is_never());
    assert!(object(&[], DataType::never(), &["a"]).is_never());
    assert!(DataType::array(vec![], DataType::never(), 1).is_never());
}

#[test]
fn change_then_get() {
    let inner = object(&[("b", DataType::number())], DataType::never(), &["b"]);
    let t = object(&[("a", inner)], DataType::never(), &["a"]);
    let path = vec![
        PathSegment::Name("a".to_owned()),
        PathSegment::Name("b".to_owned()),
    ];
    let one = DataType::literal(json!(1));
    let f = |x: &DataType| x.intersect(&one);

    assert_eq!(
        t.change_type_at_path(&path, &f).get_type_at_path(&path),
        f(&t.get_type_at_path(&path))
    );
    assert_eq!(
        t.change_type_at_path(&path, &f).to_string(),
        "{a: {b: 1}}"
    );
}

#[test]
fn subtract_is_conservative() {
    let number = DataType::number();
    let one = DataType::literal(json!(1));

    assert!(one.subtract(&number).is_never());
    assert_eq!(number.subtract(&one), number);
    assert_eq!(
        DataType::boolean().subtract(&DataType::literal(json!(true))),
        DataType::literal(json!(false))
    );
}

#[test]
fn rendering() {
    let t = object(
        &[
            ("id", DataType::number()),
            ("tags", DataType::array_of(DataType::string())),
            ("first name", DataType::string()),
        ],
        DataType::any(),
        &["id"],
    );
    assert_eq!(
        t.to_string(),
        "{id: number, tags?: string[], \"first name\"?: string, ...}"
    );

    let pretty = t.to_pretty_string();
    assert!(pretty.starts_with("{\n  id: number,"), "{pretty}");

    let t = DataType::union([DataType::string(), DataType::null()]);
    assert_eq!(t.to_pretty_string(), "string | null");
}
