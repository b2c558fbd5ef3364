//! Splitting SQL scripts into batches on `GO` separator lines.

/// `GO` or `GO <count>` on a line of its own, case-insensitive.
fn separator(line: &str) -> Option<usize> {
    let mut words = line.split_whitespace();
    let first = words.next()?;
    if !first.eq_ignore_ascii_case("go") {
        return None;
    }
    match (words.next(), words.next()) {
        (None, _) => Some(1),
        (Some(count), None) => count.parse().ok(),
        _ => None,
    }
}

/// Split `text` into the batches a SQL Server client tool would send.
///
/// A `GO <count>` separator repeats the preceding batch `count` times.
/// Batches containing only whitespace are dropped.
#[must_use]
pub fn split_batches(text: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        match separator(line) {
            Some(repeat) => {
                let batch = current.trim();
                if !batch.is_empty() {
                    batches.extend(std::iter::repeat_n(batch.to_string(), repeat));
                }
                current.clear();
            }
            None => {
                current.push_str(line);
                current.push('\n');
            }
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        batches.push(tail.to_string());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_go_lines_only() {
        let script = "create table t (id int)\nGO\ninsert into t values (1)\ninsert into t values (2)\n  go  \nselect * from t -- go\n";
        assert_eq!(
            split_batches(script),
            vec![
                "create table t (id int)",
                "insert into t values (1)\ninsert into t values (2)",
                "select * from t -- go",
            ]
        );
    }

    #[test]
    fn go_count_repeats_and_blank_batches_vanish() {
        let script = "GO\ninsert into t default values\nGO 3\n\nGO\n";
        let batches = split_batches(script);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b == "insert into t default values"));
    }

    #[test]
    fn words_starting_with_go_are_sql() {
        assert_eq!(split_batches("goto_table\nGOTO"), vec!["goto_table\nGOTO"]);
        assert_eq!(split_batches("go fish"), vec!["go fish"]);
    }
}
