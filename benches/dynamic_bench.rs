use criterion::{Criterion, criterion_group, criterion_main};
use dynamic_model::deserialization::decode_extra_fields;
use dynamic_model::serialization::{encode_extra_fields, serialize_row};
use dynamic_model::{
    DefinitionStore, DynamicFieldDefinition, DynamicOptions, DynamicRecord, FieldDef, ModelDef,
    ObjectMap, RedbStore, SchemaResolver, Value,
};
use smol_str::SmolStr;
use std::hint::black_box;
use std::sync::Arc;
use tempfile::NamedTempFile;

// ─── Test Data ──────────────────────────────────────────────────────────────

fn make_extra_fields() -> ObjectMap {
    let mut nested = ObjectMap::new();
    nested.insert("theme".into(), Value::from("dark"));
    nested.insert("level".into(), Value::from(3i64));

    let mut fields = ObjectMap::new();
    fields.insert("email".into(), Value::from("alice@example.com"));
    fields.insert("age".into(), Value::from(28i64));
    fields.insert("score".into(), Value::from(99.5f64));
    fields.insert("visits".into(), Value::from(u64::MAX));
    fields.insert("active".into(), Value::from(true));
    fields.insert("note".into(), Value::Null);
    fields.insert(
        "tags".into(),
        Value::Array(vec![Value::from("rust"), Value::from("db")]),
    );
    fields.insert("settings".into(), Value::Object(nested));
    fields
}

fn make_model() -> Arc<ModelDef> {
    ModelDef::builder("bench_model")
        .field(FieldDef::new("type", "CharField").not_editable().default_value("contact"))
        .field(FieldDef::new("about", "CharField").default_value("about value"))
        .type_descriptor("type")
        .dynamic(DynamicOptions::default())
        .build()
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 1: extra_fields slot codec
// ═══════════════════════════════════════════════════════════════════════════

fn bench_slot_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("slot_codec");
    let fields = make_extra_fields();
    let encoded = encode_extra_fields(&fields).unwrap();

    group.bench_function("encode_extra_fields", |b| {
        b.iter(|| encode_extra_fields(black_box(&fields)).unwrap())
    });
    group.bench_function("decode_extra_fields", |b| {
        b.iter(|| decode_extra_fields(black_box(&encoded)).unwrap())
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 2: Row serialization
// ═══════════════════════════════════════════════════════════════════════════

fn bench_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("rows");
    let mut row_fields = ObjectMap::new();
    row_fields.insert("type".into(), Value::from("contact"));
    row_fields.insert("about".into(), Value::from("about value"));
    row_fields.insert(
        SmolStr::new_static("extra_fields"),
        Value::Bytes(encode_extra_fields(&make_extra_fields()).unwrap()),
    );

    group.bench_function("serialize_row", |b| {
        b.iter(|| serialize_row(black_box(&row_fields)).unwrap())
    });

    let row = serialize_row(&row_fields).unwrap();
    group.bench_function("Row::get_field", |b| {
        b.iter(|| row.as_row().get_field(black_box("about")))
    });

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════
// Group 3: Attribute classification
// ═══════════════════════════════════════════════════════════════════════════

fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");

    let tmp = NamedTempFile::new().unwrap();
    let store = Arc::new(RedbStore::new(tmp.path()).unwrap());
    let resolver = SchemaResolver::new(store.clone());
    let mut record = DynamicRecord::new(make_model(), resolver).unwrap();
    let key = record.schema_key();
    for name in ["email", "phone", "company"] {
        store
            .create(&DynamicFieldDefinition::new(key.clone(), name, "CharField"))
            .unwrap();
    }
    record.set("email", "a@a.com").unwrap();

    group.bench_function("classify declared", |b| {
        b.iter(|| record.classify(black_box("about")).unwrap())
    });
    group.bench_function("get dynamic (store lookup)", |b| {
        b.iter(|| record.get(black_box("email")).unwrap())
    });

    record.pin_schema().unwrap();
    group.bench_function("get dynamic (pinned)", |b| {
        b.iter(|| record.get(black_box("email")).unwrap())
    });

    group.finish();
}

// ─── Criterion Main ─────────────────────────────────────────────────────────

criterion_group!(benches, bench_slot_codec, bench_rows, bench_classification);
criterion_main!(benches);
