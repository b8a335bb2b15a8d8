use std::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::{ByteBuf, Bytes};

use super::{Dictionary, Value};

impl Value {
    pub fn to_bencode(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }

    pub fn from_bencode(buf: &[u8]) -> Result<Self, serde_bencode::Error> {
        serde_bencode::from_bytes(buf)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::ByteString(s) => serializer.serialize_bytes(s),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Dictionary(dict) => {
                let mut map = serializer.serialize_map(Some(dict.len()))?;
                for (key, value) in dict {
                    map.serialize_entry(Bytes::new(key), value)?;
                }
                map.end()
            }
            Value::Undefined => Err(ser::Error::custom("cannot encode an undefined value")),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer, byte string, list or dictionary")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {v} does not fit in 64 signed bits")))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::ByteString(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::ByteString(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut list = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            list.push(item);
        }
        Ok(Value::List(list))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut dict = Dictionary::new();
        while let Some((key, value)) = map.next_entry::<ByteBuf, Value>()? {
            dict.insert(key.into_vec(), value);
        }
        Ok(Value::Dictionary(dict))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping() -> Value {
        let mut msg = Value::Undefined;
        *msg.entry("q").unwrap() = Value::from("ping");
        *msg.entry("t").unwrap() = Value::from("10");
        *msg.entry("y").unwrap() = Value::from("q");
        *msg.entry("a").unwrap().entry("id").unwrap() = Value::from("00000000000000000000");
        msg
    }

    #[test]
    fn encodes_dht_query_with_sorted_keys() {
        let encoded = ping().to_bencode().unwrap();
        assert_eq!(
            encoded,
            b"d1:ad2:id20:00000000000000000000e1:q4:ping1:t2:101:y1:qe".to_vec()
        );
    }

    #[test]
    fn decodes_back_into_the_same_value() {
        let msg = ping();
        let decoded = Value::from_bencode(&msg.to_bencode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn binary_strings_and_negative_integers_survive() {
        let value = Value::from(vec![
            Value::from(vec![0u8, 0xff, 0x13]),
            Value::from(-42i64),
            Value::from(Vec::<Value>::new()),
        ]);
        let encoded = value.to_bencode().unwrap();
        assert_eq!(Value::from_bencode(&encoded).unwrap(), value);
    }

    #[test]
    fn undefined_cannot_be_encoded() {
        assert!(Value::Undefined.to_bencode().is_err());
        let nested = Value::from(vec![Value::Undefined]);
        assert!(nested.to_bencode().is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(Value::from_bencode(b"i12").is_err());
    }
}
