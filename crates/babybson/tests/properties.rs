use babybson::{
    decode_document, encode_document, Binary, DateTime, DbPointer, DecodeError, Decimal128,
    Document, JavaScriptCodeWithScope, ObjectId, Regex, Timestamp, Value,
};
use proptest::collection::vec;
use proptest::prelude::*;

fn key() -> impl Strategy<Value = String> {
    "[a-z]{0,8}"
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u64>().prop_map(|bits| Value::Double(f64::from_bits(bits))),
        "\\PC{0,12}".prop_map(Value::from),
        (any::<u8>(), vec(any::<u8>(), 0..16))
            .prop_map(|(subtype, bytes)| Value::Binary(Binary::new(subtype.into(), bytes))),
        Just(Value::Undefined),
        any::<[u8; 12]>().prop_map(|b| Value::ObjectId(ObjectId::from_bytes(b))),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(|ms| Value::DateTime(DateTime::from_millis(ms))),
        Just(Value::Null),
        ("[a-z.*^$]{0,6}", "[imsx]{0,3}")
            .prop_map(|(pattern, options)| Value::Regex(Regex::new(pattern, options))),
        ("[a-z.]{0,10}", any::<[u8; 12]>()).prop_map(|(ns, id)| Value::DbPointer(DbPointer {
            namespace: ns.into(),
            id: ObjectId::from_bytes(id),
        })),
        "[a-z()]{0,10}".prop_map(|code| Value::JavaScriptCode(code.into())),
        "[a-z]{0,6}".prop_map(|s| Value::Symbol(s.into())),
        any::<i32>().prop_map(Value::Int32),
        (any::<u32>(), any::<u32>())
            .prop_map(|(time, increment)| Value::Timestamp(Timestamp { time, increment })),
        any::<i64>().prop_map(Value::Int64),
        any::<[u8; 16]>().prop_map(|b| Value::Decimal128(Decimal128::from_bytes(b))),
        Just(Value::MinKey),
        Just(Value::MaxKey),
    ]
}

fn document_of(inner: impl Strategy<Value = Value>) -> impl Strategy<Value = Document> {
    vec((key(), inner), 0..6).prop_map(|pairs| pairs.into_iter().collect::<Document>())
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..6).prop_map(Value::Array),
            document_of(inner.clone()).prop_map(Value::Document),
            ("[a-z()]{0,8}", document_of(inner)).prop_map(|(code, scope)| {
                Value::JavaScriptCodeWithScope(JavaScriptCodeWithScope {
                    code: code.into(),
                    scope,
                })
            }),
        ]
    })
}

fn document() -> impl Strategy<Value = Document> {
    document_of(value())
}

proptest! {
    #[test]
    fn roundtrip(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        prop_assert_eq!(decode_document(&bytes).unwrap(), doc);
    }

    #[test]
    fn reencode_is_byte_identical(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        let again = encode_document(&decode_document(&bytes).unwrap()).unwrap();
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn length_prefix_and_terminator(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        let declared = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        prop_assert_eq!(declared as usize, bytes.len());
        prop_assert_eq!(bytes[bytes.len() - 1], 0);
    }

    #[test]
    fn every_prefix_is_truncated(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        for cut in 0..bytes.len() {
            let err = decode_document(&bytes[..cut]).unwrap_err();
            prop_assert!(
                matches!(err, DecodeError::TruncatedInput { offset: 0, .. }),
                "cut {} gave {:?}",
                cut,
                err
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected(doc in document(), extra in vec(any::<u8>(), 1..8)) {
        let mut bytes = encode_document(&doc).unwrap();
        let len = bytes.len();
        bytes.extend_from_slice(&extra);
        prop_assert_eq!(
            decode_document(&bytes),
            Err(DecodeError::TrailingGarbage { offset: len, remaining: extra.len() })
        );
    }

    #[test]
    fn corrupted_bytes_never_panic(doc in document(), index in any::<prop::sample::Index>(), byte in any::<u8>()) {
        let mut bytes = encode_document(&doc).unwrap();
        let i = index.index(bytes.len());
        bytes[i] = byte;
        if let Err(err) = decode_document(&bytes) {
            prop_assert!(err.offset() <= bytes.len());
        }
    }

    #[test]
    fn doubles_are_bit_exact(bits in any::<u64>()) {
        let doc = Document::builder().append("d", f64::from_bits(bits)).build();
        let decoded = decode_document(&encode_document(&doc).unwrap()).unwrap();
        match decoded.get("d") {
            Some(Value::Double(d)) => prop_assert_eq!(d.to_bits(), bits),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}
