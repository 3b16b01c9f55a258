//! Reader for the ARFF text format OpenML serves dataset content in.
//!
//! Dense and sparse data sections are both supported. Missing values (`?`)
//! become empty cells; omitted sparse values become `0`.

use crate::error::HarvestError;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub kind: String,
}

pub fn parse(text: &str) -> Result<Table, HarvestError> {
    let mut attributes = Vec::new();
    let mut table: Option<Table> = None;

    for (number, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let line_no = number + 1;

        if let Some(table) = table.as_mut() {
            let row = if line.starts_with('{') {
                parse_sparse(line, table.columns.len())
            } else {
                parse_dense(line, table.columns.len())
            }
            .map_err(|message| HarvestError::Arff(format!("line {line_no}: {message}")))?;
            table.rows.push(row);
            continue;
        }

        let lowered = line.to_ascii_lowercase();
        if lowered.starts_with("@relation") {
            continue;
        }
        if lowered.starts_with("@attribute") {
            let attribute = parse_attribute(&line["@attribute".len()..])
                .map_err(|message| HarvestError::Arff(format!("line {line_no}: {message}")))?;
            attributes.push(attribute);
            continue;
        }
        if lowered.starts_with("@data") {
            if attributes.is_empty() {
                return Err(HarvestError::Arff("no attributes declared".to_string()));
            }
            table = Some(Table::new(
                attributes.iter().map(|attr| attr.name.clone()).collect(),
            ));
            continue;
        }
        return Err(HarvestError::Arff(format!(
            "line {line_no}: unexpected header line"
        )));
    }

    table.ok_or_else(|| HarvestError::Arff("missing @data section".to_string()))
}

fn parse_attribute(rest: &str) -> Result<Attribute, String> {
    let rest = rest.trim_start();
    let (name, kind) = match rest.chars().next() {
        Some(quote @ ('\'' | '"')) => {
            let (name, consumed) = read_quoted(&rest[1..], quote)?;
            (name, &rest[1 + consumed..])
        }
        Some(_) => {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            (rest[..end].to_string(), &rest[end..])
        }
        None => return Err("attribute without name".to_string()),
    };
    let kind = kind.trim();
    if kind.is_empty() {
        return Err(format!("attribute {name} has no type"));
    }
    Ok(Attribute {
        name,
        kind: kind.to_string(),
    })
}

/// Reads up to the closing `quote`, returning the unescaped text and the
/// number of bytes consumed including the closing quote.
fn read_quoted(text: &str, quote: char) -> Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = text.char_indices();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            }
            c if c == quote => return Ok((value, index + c.len_utf8())),
            c => value.push(c),
        }
    }
    Err("unterminated quote".to_string())
}

/// Reads one value from the start of `text`, quoted or bare, and returns it
/// with the unread remainder. A bare value ends at the next comma.
fn read_value(text: &str) -> Result<(String, &str), String> {
    match text.chars().next() {
        Some(quote @ ('\'' | '"')) => {
            let (value, consumed) = read_quoted(&text[1..], quote)?;
            Ok((value, &text[1 + consumed..]))
        }
        _ => {
            let end = text.find(',').unwrap_or(text.len());
            let value = text[..end].trim();
            let value = if value == "?" { "" } else { value };
            Ok((value.to_string(), &text[end..]))
        }
    }
}

/// Steps past the comma after a value. Returns `None` at the end of the line.
fn next_separator(remainder: &str) -> Result<Option<&str>, String> {
    let remainder = remainder.trim_start();
    match remainder.strip_prefix(',') {
        Some(next) => Ok(Some(next)),
        None if remainder.is_empty() => Ok(None),
        None => Err(format!("unexpected text after value: {remainder}")),
    }
}

fn split_values(line: &str) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    let mut rest = line;
    loop {
        let (value, remainder) = read_value(rest.trim_start())?;
        values.push(value);
        match next_separator(remainder)? {
            Some(next) => rest = next,
            None => return Ok(values),
        }
    }
}

fn parse_dense(line: &str, width: usize) -> Result<Vec<String>, String> {
    let values = split_values(line)?;
    if values.len() != width {
        return Err(format!("expected {width} values, found {}", values.len()));
    }
    Ok(values)
}

fn parse_sparse(line: &str, width: usize) -> Result<Vec<String>, String> {
    let inner = line
        .strip_prefix('{')
        .and_then(|rest| rest.trim_end().strip_suffix('}'))
        .ok_or_else(|| "malformed sparse row".to_string())?;
    let mut row = vec!["0".to_string(); width];
    let mut rest = inner.trim_start();
    while !rest.is_empty() {
        let index_end = rest
            .find(char::is_whitespace)
            .ok_or_else(|| format!("malformed sparse pair: {rest}"))?;
        let index: usize = rest[..index_end]
            .parse()
            .map_err(|_| format!("invalid sparse index: {}", &rest[..index_end]))?;
        let cell = row
            .get_mut(index)
            .ok_or_else(|| format!("sparse index {index} out of range"))?;
        let (value, remainder) = read_value(rest[index_end..].trim_start())?;
        *cell = value;
        rest = match next_separator(remainder)? {
            Some(next) => next.trim_start(),
            None => "",
        };
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const IRIS: &str = "% Iris sample\n\
@RELATION iris\n\
\n\
@ATTRIBUTE sepallength REAL\n\
@ATTRIBUTE 'petal width' NUMERIC\n\
@ATTRIBUTE class {Iris-setosa,Iris-versicolor}\n\
\n\
@DATA\n\
5.1,0.2,Iris-setosa\n\
% inline comment\n\
7.0, ?, 'Iris-versicolor'\n";

    #[test]
    fn parses_dense_data() {
        let table = parse(IRIS).unwrap();
        assert_eq!(table.columns, vec!["sepallength", "petal width", "class"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["5.1", "0.2", "Iris-setosa"]);
        assert_eq!(table.rows[1], vec!["7.0", "", "Iris-versicolor"]);
    }

    #[test]
    fn quoted_values_keep_commas() {
        let text = "@relation r\n@attribute name string\n@attribute n numeric\n@data\n'a, b',1\n\"it\\'s\",2\n";
        let table = parse(text).unwrap();
        assert_eq!(table.rows[0][0], "a, b");
        assert_eq!(table.rows[1][0], "it's");
    }

    #[test]
    fn parses_sparse_rows() {
        let text = "@relation r\n@attribute a numeric\n@attribute b numeric\n@attribute c string\n@data\n{1 5, 2 'x y'}\n{}\n{0 ?, 2 'x,y'}\n{2 \"a, \\\"b\\\"\", 1 7}\n";
        let table = parse(text).unwrap();
        assert_eq!(table.rows[0], vec!["0", "5", "x y"]);
        assert_eq!(table.rows[1], vec!["0", "0", "0"]);
        assert_eq!(table.rows[2], vec!["", "0", "x,y"]);
        assert_eq!(table.rows[3], vec!["0", "7", "a, \"b\""]);
    }

    #[test]
    fn rejects_ragged_rows_and_missing_data() {
        let ragged = "@relation r\n@attribute a numeric\n@attribute b numeric\n@data\n1,2,3\n";
        assert_matches!(parse(ragged), Err(HarvestError::Arff(msg)) if msg.contains("line 5"));

        let no_data = "@relation r\n@attribute a numeric\n";
        assert_matches!(parse(no_data), Err(HarvestError::Arff(_)));
    }
}
