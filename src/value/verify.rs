use super::{MessageError, Value, ValueKind};

/// one expected key of an incoming message.
#[derive(Debug, Clone, Copy)]
pub struct KeyDesc {
    pub name: &'static str,
    pub kind: ValueKind,
    /// exact length for byte strings, 0 accepts any length
    pub size: usize,
    pub optional: bool,
}

impl KeyDesc {
    pub const fn required(name: &'static str, kind: ValueKind, size: usize) -> Self {
        Self {
            name,
            kind,
            size,
            optional: false,
        }
    }

    pub const fn optional(name: &'static str, kind: ValueKind, size: usize) -> Self {
        Self {
            name,
            kind,
            size,
            optional: true,
        }
    }
}

/// checks `msg` against `desc` and returns the matching values in `desc` order. Missing optional
/// keys come back as `None`.
pub fn verify_message<'a>(
    msg: &'a Value,
    desc: &[KeyDesc],
) -> Result<Vec<Option<&'a Value>>, MessageError> {
    let dict = msg.dict().map_err(|_| MessageError::NotADictionary)?;

    desc.iter()
        .map(|key| {
            let Some(value) = dict.get(key.name.as_bytes()) else {
                return match key.optional {
                    true => Ok(None),
                    false => Err(MessageError::MissingKey(key.name)),
                };
            };

            if value.kind() != key.kind {
                return Err(MessageError::WrongType {
                    key: key.name,
                    expected: key.kind,
                    found: value.kind(),
                });
            }

            if let Value::ByteString(s) = value {
                if key.size != 0 && s.len() != key.size {
                    return Err(MessageError::WrongSize {
                        key: key.name,
                        expected: key.size,
                        found: s.len(),
                    });
                }
            }

            Ok(Some(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PONG: [KeyDesc; 2] = [
        KeyDesc::required("y", ValueKind::ByteString, 1),
        KeyDesc::required("t", ValueKind::ByteString, 2),
    ];

    fn reply(y: &str, t: &str) -> Value {
        let mut msg = Value::Undefined;
        *msg.entry("y").unwrap() = Value::from(y);
        *msg.entry("t").unwrap() = Value::from(t);
        msg
    }

    #[test]
    fn accepts_well_formed_pong() {
        let msg = reply("r", "10");
        let parsed = verify_message(&msg, &PONG).unwrap();
        assert_eq!(parsed[0].unwrap().string().unwrap(), b"r");
        assert_eq!(parsed[1].unwrap().string().unwrap(), b"10");
    }

    #[test]
    fn reports_missing_required_key() {
        let msg = reply("r", "10");
        let desc = [KeyDesc::required("e", ValueKind::List, 0)];
        assert_eq!(
            verify_message(&msg, &desc),
            Err(MessageError::MissingKey("e"))
        );
    }

    #[test]
    fn optional_keys_may_be_absent() {
        let msg = reply("r", "10");
        let desc = [
            KeyDesc::optional("e", ValueKind::List, 0),
            KeyDesc::required("y", ValueKind::ByteString, 0),
        ];
        let parsed = verify_message(&msg, &desc).unwrap();
        assert!(parsed[0].is_none());
        assert!(parsed[1].is_some());
    }

    #[test]
    fn checks_string_length_and_type() {
        let msg = reply("r", "100");
        assert_eq!(
            verify_message(&msg, &PONG),
            Err(MessageError::WrongSize {
                key: "t",
                expected: 2,
                found: 3
            })
        );

        let desc = [KeyDesc::required("y", ValueKind::Integer, 0)];
        assert_eq!(
            verify_message(&msg, &desc),
            Err(MessageError::WrongType {
                key: "y",
                expected: ValueKind::Integer,
                found: ValueKind::ByteString
            })
        );
    }

    #[test]
    fn non_dictionary_is_rejected() {
        assert_eq!(
            verify_message(&Value::from(1i64), &PONG),
            Err(MessageError::NotADictionary)
        );
    }
}
