use std::fmt::{self, Write};

use super::Value;

// printable ascii, space included
fn is_printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| matches!(b, 0x20..=0x7e))
}

// strings carry both names and raw hashes/ids, binary ones are dumped as hex so the output
// stays on the terminal intact.
fn write_bytes(out: &mut impl Write, bytes: &[u8]) -> fmt::Result {
    if is_printable(bytes) {
        // only printable ascii at this point
        bytes.iter().try_for_each(|&b| out.write_char(b as char))
    } else {
        out.write_str(&hex::encode(bytes))
    }
}

fn write_indent(out: &mut impl Write, indent: usize) -> fmt::Result {
    write!(out, "{:indent$}", "")
}

impl Value {
    /// debug dump of the value, one line per scalar, nested containers indented by one space
    /// per level. A dictionary entry with a scalar value is a single line, `[key] ` followed by
    /// the value at the entry's value indent (`indent + 2`).
    pub fn print(&self, out: &mut impl Write, indent: usize) -> fmt::Result {
        write_indent(out, indent)?;
        self.print_body(out, indent)
    }

    fn print_body(&self, out: &mut impl Write, indent: usize) -> fmt::Result {
        match self {
            Value::Integer(i) => writeln!(out, "{i}"),
            Value::ByteString(s) => {
                write_bytes(out, s)?;
                out.write_char('\n')
            }
            Value::List(list) => {
                out.write_str("list\n")?;
                list.iter().try_for_each(|item| item.print(out, indent + 1))
            }
            Value::Dictionary(dict) => {
                out.write_str("dictionary\n")?;
                for (key, value) in dict {
                    write_indent(out, indent + 1)?;
                    out.write_char('[')?;
                    write_bytes(out, key)?;
                    out.write_char(']')?;

                    // scalars stay on the key's line, still indented like the nested values
                    match value {
                        Value::Integer(_) | Value::ByteString(_) => out.write_char(' ')?,
                        _ => out.write_char('\n')?,
                    }
                    value.print(out, indent + 2)?;
                }
                Ok(())
            }
            Value::Undefined => out.write_str("<uninitialized>\n"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.print(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Dictionary, ValueKind};
    use rstest::rstest;

    fn printed(value: &Value, indent: usize) -> String {
        let mut out = String::new();
        value.print(&mut out, indent).unwrap();
        out
    }

    #[rstest]
    #[case(b"hello".as_slice(), "hello\n")]
    #[case(b"with space".as_slice(), "with space\n")]
    #[case(&[0x01, 0x41], "0141\n")]
    #[case(&[0xff, 0x00, 0x0a], "ff000a\n")]
    #[case(b"".as_slice(), "\n")]
    fn byte_strings_print_verbatim_or_as_hex(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(printed(&Value::from(bytes), 0), expected);
    }

    #[test]
    fn integers_print_in_decimal() {
        assert_eq!(printed(&Value::from(-17i64), 2), "  -17\n");
    }

    #[test]
    fn undefined_prints_placeholder() {
        assert_eq!(printed(&Value::new(ValueKind::Undefined), 0), "<uninitialized>\n");
    }

    #[test]
    fn list_elements_are_indented_one_level() {
        let value = Value::from(vec![Value::from(1i64), Value::from("a")]);
        assert_eq!(printed(&value, 0), "list\n 1\n a\n");
    }

    #[test]
    fn dictionary_keys_are_sorted_and_scalars_inline() {
        let mut dict = Dictionary::new();
        dict.insert(b"y".to_vec(), Value::from("q"));
        dict.insert(b"a".to_vec(), Value::from(vec![Value::from(5i64)]));
        dict.insert(b"t".to_vec(), Value::from(7i64));

        let expected = "dictionary\n [a]\n  list\n   5\n [t]   7\n [y]   q\n";
        assert_eq!(printed(&Value::from(dict), 0), expected);
    }

    #[test]
    fn inline_scalars_follow_the_nesting_depth() {
        let mut dict = Dictionary::new();
        dict.insert(b"k".to_vec(), Value::from(1i64));
        assert_eq!(printed(&Value::from(dict), 2), "  dictionary\n   [k]     1\n");
    }

    #[test]
    fn binary_dictionary_keys_print_as_hex() {
        let mut dict = Dictionary::new();
        dict.insert(vec![0x00, 0x10], Value::from(1i64));
        assert_eq!(printed(&Value::from(dict), 0), "dictionary\n [0010]   1\n");
    }

    #[test]
    fn display_matches_print_at_zero_indent() {
        let value = Value::from(vec![Value::from("x")]);
        assert_eq!(value.to_string(), printed(&value, 0));
    }
}
