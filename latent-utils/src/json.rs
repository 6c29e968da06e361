use anyhow::{anyhow, Result};
use flate2::{write::ZlibEncoder, Compression};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{to_string, to_value, Map, Value};
use std::{fs, io::Write};

pub fn dejsonify<'a, T>(json_str: &'a str) -> serde_json::Result<T>
where
    T: Deserialize<'a>,
{
    serde_json::from_str::<T>(json_str)
}

/// Serializes with object keys sorted at every depth.
pub fn jsonify<T>(obj: &T) -> String
where
    T: Serialize,
{
    to_string(&jsonify_internal(
        &to_value(obj).expect("to_value failed on serializable object"),
    ))
    .expect("to_string failed on serializable object")
}

pub fn jsonify_internal(json_value: &Value) -> Value {
    match json_value {
        Value::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            let sorted_map: Map<String, Value> = keys
                .into_iter()
                .filter_map(|key| {
                    obj.get(key)
                        .map(|value| (key.clone(), jsonify_internal(value)))
                })
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(items) => Value::Array(items.iter().map(jsonify_internal).collect()),
        _ => json_value.clone(),
    }
}

pub fn compress_obj<T>(input: T) -> Result<Vec<u8>>
where
    T: Serialize,
{
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(jsonify(&input).as_bytes())?;
    Ok(encoder.finish()?)
}

/// Accepts either an inline json string or a path to a `.json` file.
pub fn load_json_arg<T>(arg: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let json_str = if arg.ends_with(".json") {
        fs::read_to_string(arg).map_err(|e| anyhow!("Failed to read file '{}': {}", arg, e))?
    } else {
        arg.to_string()
    };
    dejsonify::<T>(&json_str).map_err(|e| anyhow!("Failed to parse '{}': {}", arg, e))
}
