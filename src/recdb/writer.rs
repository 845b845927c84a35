//! RecDB writer: formats a record tree back to text (spec §4.1, §8
//! round-trip property).

use super::record::Record;

const WRAP_COLUMN: usize = 72;

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Write `record` (expected to be an `Object`) as a top-level RecDB document
/// (no enclosing braces at the root, matching the parser's implicit-root
/// grammar).
pub fn write(record: &Record) -> String {
    let mut out = String::new();
    match record {
        Record::Object(obj) => {
            for (key, value) in obj.iter() {
                write_pair(&mut out, 0, key, value);
            }
        }
        other => write_pair(&mut out, 0, "", other),
    }
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_pair(out: &mut String, depth: usize, key: &str, value: &Record) {
    indent(out, depth);
    if !key.is_empty() {
        out.push_str(&escape(key));
        out.push(' ');
    }
    match value {
        Record::QString(s) => {
            out.push_str(&escape(s));
            out.push_str(";\n");
        }
        Record::StringList(items) => {
            write_string_list(out, depth, items);
            out.push_str(";\n");
        }
        Record::Object(obj) => {
            out.push_str("{\n");
            for (k, v) in obj.iter() {
                write_pair(out, depth + 1, k, v);
            }
            indent(out, depth);
            out.push_str("};\n");
        }
    }
}

/// Write a string list, wrapping at [`WRAP_COLUMN`] for readability. Wrapping
/// is whitespace-only (extra newlines + indent between items) so it never
/// changes the parsed result.
fn write_string_list(out: &mut String, depth: usize, items: &[String]) {
    out.push('(');
    let mut col = depth * 2 + 1;
    for (i, item) in items.iter().enumerate() {
        let escaped = escape(item);
        let piece_len = escaped.len() + if i + 1 < items.len() { 1 } else { 0 };
        if i > 0 && col + piece_len > WRAP_COLUMN {
            out.push('\n');
            indent(out, depth + 1);
            col = depth * 2 + 2;
        } else if i > 0 {
            out.push(' ');
            col += 1;
        }
        out.push_str(&escaped);
        col += escaped.len();
        if i + 1 < items.len() {
            out.push(',');
            col += 1;
        }
    }
    out.push(')');
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    #[test]
    fn round_trips_flat_object() {
        let doc = r#" "a" "1"; "b" "two"; "#;
        let rec = parse(doc).unwrap();
        let written = write(&rec);
        let reparsed = parse(&written).unwrap();
        assert_eq!(rec, reparsed);
    }

    #[test]
    fn round_trips_nested_and_lists() {
        let doc = r#"
            "server" {
                "name" "irc.example.net";
                "admins" ("alice", "bob", "carol");
            };
            "empty" ();
        "#;
        let rec = parse(doc).unwrap();
        let written = write(&rec);
        let reparsed = parse(&written).unwrap();
        assert_eq!(rec, reparsed);
    }

    #[test]
    fn escapes_special_characters() {
        let mut obj = Record::empty_object();
        obj.set_path("a", Record::QString("has \"quotes\" and \\backslash\\".into()));
        let written = write(&obj);
        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed.get_str("a"), Some("has \"quotes\" and \\backslash\\"));
    }

    #[test]
    fn long_list_wraps_but_still_parses() {
        let items: Vec<String> = (0..40).map(|i| format!("item-number-{i}")).collect();
        let mut obj = Record::empty_object();
        obj.set_path("list", Record::StringList(items.clone()));
        let written = write(&obj);
        assert!(written.lines().any(|l| l.len() < written.len()));
        let reparsed = parse(&written).unwrap();
        assert_eq!(reparsed.get_string_list("list"), Some(items.as_slice()));
    }

    #[test]
    fn preserves_key_order() {
        let doc = r#" "z" "1"; "a" "2"; "m" "3"; "#;
        let rec = parse(doc).unwrap();
        let written = write(&rec);
        let positions: Vec<usize> = ["z", "a", "m"]
            .iter()
            .map(|k| written.find(&format!("\"{k}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
