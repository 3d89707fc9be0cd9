//! 与 bson crate 的逐字节互操作测试

use babybson::{
    decode_document, encode_document, Binary, DateTime, DbPointer, Decimal128, Document,
    JavaScriptCodeWithScope, ObjectId, Regex, Timestamp, Value,
};
use bson::{doc, Bson};

fn reference_bytes(doc: &bson::Document) -> Vec<u8> {
    let mut buf = Vec::new();
    doc.to_writer(&mut buf).unwrap();
    buf
}

fn all_types() -> Document {
    Document::builder()
        .append("s", "hi")
        .append("i", 1)
        .append("l", 2i64)
        .append("d", 1.5)
        .append("b", true)
        .append("n", Value::Null)
        .append("arr", Value::Array(vec![Value::Int32(1), Value::from("two")]))
        .append_document("sub", |b| b.append("k", "v"))
        .append("bin", Binary::generic(vec![1, 2, 3]))
        .append("oid", ObjectId::from_bytes([1; 12]))
        .append("dt", DateTime::from_millis(1_700_000_000_000))
        .append("ts", Timestamp { time: 5, increment: 7 })
        .append("re", Regex::new("^a", "i"))
        .append("js", Value::JavaScriptCode("f()".into()))
        .append("sym", Value::Symbol("s".into()))
        .append("u", Value::Undefined)
        .append("dec", Decimal128::from_bytes([3; 16]))
        .append(
            "cws",
            JavaScriptCodeWithScope {
                code: "g".into(),
                scope: Document::builder().append("z", 1).build(),
            },
        )
        .append("min", Value::MinKey)
        .append("max", Value::MaxKey)
        .build()
}

fn all_types_reference() -> bson::Document {
    doc! {
        "s": "hi",
        "i": 1i32,
        "l": 2i64,
        "d": 1.5,
        "b": true,
        "n": Bson::Null,
        "arr": [1i32, "two"],
        "sub": { "k": "v" },
        "bin": Bson::Binary(bson::Binary {
            subtype: bson::spec::BinarySubtype::Generic,
            bytes: vec![1, 2, 3],
        }),
        "oid": bson::oid::ObjectId::from_bytes([1; 12]),
        "dt": bson::DateTime::from_millis(1_700_000_000_000),
        "ts": Bson::Timestamp(bson::Timestamp { time: 5, increment: 7 }),
        "re": Bson::RegularExpression(bson::Regex {
            pattern: "^a".to_string(),
            options: "i".to_string(),
        }),
        "js": Bson::JavaScriptCode("f()".to_string()),
        "sym": Bson::Symbol("s".to_string()),
        "u": Bson::Undefined,
        "dec": Bson::Decimal128(bson::Decimal128::from_bytes([3; 16])),
        "cws": Bson::JavaScriptCodeWithScope(bson::JavaScriptCodeWithScope {
            code: "g".to_string(),
            scope: doc! { "z": 1i32 },
        }),
        "min": Bson::MinKey,
        "max": Bson::MaxKey,
    }
}

#[test]
fn test_canonical_fixture() {
    let expected = [
        0x14, 0x00, 0x00, 0x00, 0x03, 0x78, 0x00, 0x0c, 0x00, 0x00, 0x00, 0x10, 0x79, 0x00, 0x01,
        0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let ours = Document::builder()
        .append_document("x", |b| b.append("y", 1))
        .build();
    assert_eq!(encode_document(&ours).unwrap(), expected);
    assert_eq!(reference_bytes(&doc! { "x": { "y": 1i32 } }), expected);
}

#[test]
fn test_empty_document() {
    assert_eq!(encode_document(&Document::new()).unwrap(), reference_bytes(&doc! {}));
}

#[test]
fn test_all_types_match_reference_encoder() {
    assert_eq!(
        encode_document(&all_types()).unwrap(),
        reference_bytes(&all_types_reference())
    );
}

#[test]
fn test_decode_reference_output() {
    let bytes = reference_bytes(&all_types_reference());
    assert_eq!(decode_document(&bytes).unwrap(), all_types());
}

#[test]
fn test_reference_decodes_our_output() {
    let bytes = encode_document(&all_types()).unwrap();
    let theirs = bson::Document::from_reader(&bytes[..]).unwrap();
    assert_eq!(theirs, all_types_reference());
}

#[test]
fn test_db_pointer_layout() {
    // bson crate 不公开构造 DBPointer，这里只核对布局: 字符串 + 12 字节 ObjectId
    let doc = Document::builder()
        .append(
            "p",
            DbPointer {
                namespace: "db.c".into(),
                id: ObjectId::from_bytes([9; 12]),
            },
        )
        .build();
    let bytes = encode_document(&doc).unwrap();
    assert_eq!(bytes[4], 0x0c);
    assert_eq!(&bytes[7..11], &5i32.to_le_bytes());
    assert_eq!(&bytes[11..16], b"db.c\0");
    assert_eq!(&bytes[16..28], &[9; 12]);
    let theirs = bson::Document::from_reader(&bytes[..]).unwrap();
    assert!(matches!(theirs.get("p"), Some(Bson::DbPointer(_))));
}
