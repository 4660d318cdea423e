//! Minimal flat-table codec for the registry and training files.
//!
//! Fields are comma separated; a field containing a comma, quote or newline
//! is wrapped in double quotes with inner quotes doubled. Blank lines and
//! lines starting with `#` are skipped.

/// A parsed table: header names plus data rows with their 1-based line numbers.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// One data row.
#[derive(Debug, Clone)]
pub struct Row {
    /// Line number in the source text (header is line 1 when it is first).
    pub line: usize,
    pub fields: Vec<String>,
}

impl Row {
    /// The field at `idx`, or `""` when the row is short.
    pub fn get(&self, idx: usize) -> &str {
        self.fields.get(idx).map(String::as_str).unwrap_or("")
    }
}

impl Table {
    /// Parse a whole document. Returns an empty table if there is no header.
    pub fn parse(content: &str) -> Self {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('#')
            });

        let Some((_, header)) = lines.next() else {
            return Self::default();
        };
        let headers = split_line(header)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        let rows = lines
            .map(|(line, l)| Row {
                line,
                fields: split_line(l),
            })
            .collect();

        Self { headers, rows }
    }

    /// Index of the named column.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Split one line into fields, honouring double quotes.
pub fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// Join fields into one line, quoting where needed.
pub fn join_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| quote(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_field_keeps_commas() {
        let fields = split_line("+254711,17,\"bleeding,fever\",");
        assert_eq!(fields, vec!["+254711", "17", "bleeding,fever", ""]);
    }

    #[test]
    fn doubled_quotes_unescape() {
        let fields = split_line("\"say \"\"hi\"\"\",x");
        assert_eq!(fields, vec!["say \"hi\"", "x"]);
    }

    #[test]
    fn join_quotes_only_when_needed() {
        let line = join_line(&["a", "b,c", "d\"e"]);
        assert_eq!(line, "a,\"b,c\",\"d\"\"e\"");
        assert_eq!(split_line(&line), vec!["a", "b,c", "d\"e"]);
    }

    #[test]
    fn table_skips_comments_and_blanks() {
        let table = Table::parse("# comment\nage,symptoms\n\n30,\n17,\"bleeding,fever\"\n");
        assert_eq!(table.headers, vec!["age", "symptoms"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].line, 4);
        assert_eq!(table.rows[1].get(1), "bleeding,fever");
        assert_eq!(table.rows[0].get(5), "");
        assert_eq!(table.column("symptoms"), Some(1));
        assert_eq!(table.column("missing"), None);
    }

    #[test]
    fn empty_document_has_no_headers() {
        let table = Table::parse("\n# only comments\n");
        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }
}
