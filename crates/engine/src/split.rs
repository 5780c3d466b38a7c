//! Map-step item splitting (spec §4.3).
//!
//! Tries a sequence of heuristics in order; the first one that yields at
//! least two items wins. Falls back to the whole text as a single item,
//! and an empty input yields no items at all.

/// Split `text` into items for a map step.
pub fn split_items(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    for splitter in [split_numbered_lines, split_headings, split_bullets, split_paragraphs] {
        let items = splitter(text);
        if items.len() >= 2 {
            return items;
        }
    }

    vec![text.to_string()]
}

fn is_numbered_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(0);
    digits_end > 0 && trimmed[digits_end..].starts_with('.')
}

fn split_numbered_lines(text: &str) -> Vec<String> {
    split_on_marker_lines(text, is_numbered_line)
}

fn split_headings(text: &str) -> Vec<String> {
    split_on_marker_lines(text, |line| line.trim_start().starts_with('#'))
}

fn split_bullets(text: &str) -> Vec<String> {
    split_on_marker_lines(text, |line| {
        let trimmed = line.trim_start();
        trimmed.starts_with("- ") || trimmed.starts_with("* ")
    })
}

/// Split `text` into groups starting at each line matching `is_marker`,
/// joining the marker line with any following non-marker lines until the
/// next marker (or end of text). Leading text before the first marker is
/// discarded.
fn split_on_marker_lines(text: &str, is_marker: impl Fn(&str) -> bool) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for line in text.lines() {
        if is_marker(line) {
            items.push(line.to_string());
        } else if let Some(last) = items.last_mut() {
            last.push('\n');
            last.push_str(line);
        }
    }
    items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

fn split_paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n").map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
#[path = "split_tests.rs"]
mod tests;
