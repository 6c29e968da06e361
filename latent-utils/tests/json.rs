use flate2::read::ZlibDecoder;
use latent_utils::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Read;

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Record {
    zeta: u32,
    alpha: Vec<f64>,
    nested: Nested,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Nested {
    name: String,
    flag: bool,
}

fn record() -> Record {
    Record {
        zeta: 7,
        alpha: vec![0.5, -1.25],
        nested: Nested {
            name: "level".to_string(),
            flag: true,
        },
    }
}

#[test]
fn test_jsonify_sorts_keys() {
    assert_eq!(
        jsonify(&record()),
        r#"{"alpha":[0.5,-1.25],"nested":{"flag":true,"name":"level"},"zeta":7}"#
    );
    assert_eq!(
        jsonify(&json!([{"b": 1, "a": 2}])),
        r#"[{"a":2,"b":1}]"#
    );
}

#[test]
fn test_dejsonify() {
    let parsed: Record = dejsonify(&jsonify(&record())).unwrap();
    assert_eq!(parsed, record());
    assert!(dejsonify::<Record>("{\"zeta\": 1}").is_err());
}

#[test]
fn test_compressed_dump() {
    let compressed = compress_obj(&record()).unwrap();
    let mut decoded = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, jsonify(&record()));
}

#[test]
fn test_load_json_arg_inline() {
    let nested: Nested = load_json_arg(r#"{"name": "x", "flag": false}"#).unwrap();
    assert_eq!(nested.name, "x");
    assert!(load_json_arg::<Nested>("{").is_err());
}

#[test]
fn test_load_json_arg_file() {
    let path = std::env::temp_dir().join(format!("latent-utils-{}.json", std::process::id()));
    std::fs::write(&path, jsonify(&record())).unwrap();
    let loaded: Record = load_json_arg(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded, record());

    assert!(load_json_arg::<Record>("/does/not/exist.json").is_err());
}
