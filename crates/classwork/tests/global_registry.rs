//! The process-wide registry is shared state, so everything touching it lives
//! in this one test binary and runs as a single test.

use std::sync::Arc;

use classwork::{
    param_set_type, registry, ClassworkError, Collection, EncodeOptions, ParamMap, Record,
    RecordType, Value,
};

#[test]
fn test_global_registry_lifecycle() {
    registry::reset();

    let base = RecordType::builder("app.global.Base")
        .field("n", 1)
        .build()
        .unwrap();
    let child = RecordType::builder("app.global.Child")
        .extends(&base)
        .field("m", 2)
        .build()
        .unwrap();

    let mut record = Record::new(&child);
    record.set("m", 5);
    let text = record
        .to_json_str(false, false, &EncodeOptions::default())
        .unwrap();

    // Nothing registered: the child tag is unknown from the base.
    let err = Record::from_json(&base, None, Some(text.as_str())).unwrap_err();
    assert!(matches!(err, ClassworkError::UnknownClass { .. }));

    registry::register(Arc::clone(&base));
    registry::register(Arc::clone(&child));
    assert_eq!(registry::with_global(|reg| reg.len()), 2);

    let decoded = Record::from_json(&base, None, Some(text.as_str())).unwrap();
    assert_eq!(decoded.type_tag(), "app.global.Child");
    assert_eq!(decoded.get("m").unwrap(), &Value::Int(5));

    let mut params = ParamMap::new();
    params.insert("_cls".into(), Value::from("Child"));
    params.insert("n".into(), Value::Int(7));
    let built = Record::construct(&base, params, ParamMap::new()).unwrap();
    assert_eq!(built.type_tag(), "app.global.Base");
    assert_eq!(built.get("n").unwrap(), &Value::Int(7));

    let mut params = ParamMap::new();
    params.insert("_cls".into(), Value::from("Stranger"));
    let err = Record::construct(&base, params, ParamMap::new()).unwrap_err();
    assert!(matches!(err, ClassworkError::UnknownType { .. }));

    let set_type = param_set_type().unwrap();
    registry::register(Arc::clone(&set_type));
    let set = Collection::param_set(&base, record, "high", Value::Unset, Value::Unset).unwrap();
    let text = set
        .to_json_str(false, false, &EncodeOptions::default())
        .unwrap();
    let decoded = Collection::from_json(&set_type, &base, None, Some(text.as_str())).unwrap();
    assert_eq!(decoded.get(0).unwrap().type_tag(), "app.global.Child");

    registry::reset();
    assert!(registry::with_global(|reg| reg.is_empty()));
}
