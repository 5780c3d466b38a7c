use super::*;

#[test]
fn empty_input_yields_no_items() {
    assert!(split_items("").is_empty());
    assert!(split_items("   \n  ").is_empty());
}

#[test]
fn numbered_lines_win_when_present() {
    let text = "1. first\ndetail\n2. second\n3. third";
    let items = split_items(text);
    assert_eq!(items.len(), 3);
    assert!(items[0].starts_with("1. first"));
    assert!(items[0].contains("detail"));
}

#[test]
fn headings_used_when_no_numbered_lines() {
    let text = "# One\nbody one\n# Two\nbody two";
    let items = split_items(text);
    assert_eq!(items.len(), 2);
    assert!(items[1].contains("body two"));
}

#[test]
fn bullets_used_when_no_numbers_or_headings() {
    let text = "- alpha\n- beta\n- gamma";
    let items = split_items(text);
    assert_eq!(items, vec!["- alpha", "- beta", "- gamma"]);
}

#[test]
fn paragraphs_used_as_last_resort() {
    let text = "first paragraph\nstill first\n\nsecond paragraph";
    let items = split_items(text);
    assert_eq!(items.len(), 2);
    assert!(items[0].contains("still first"));
}

#[test]
fn single_chunk_falls_back_to_whole_text() {
    let text = "just one plain sentence with no structure";
    let items = split_items(text);
    assert_eq!(items, vec![text.to_string()]);
}

#[test]
fn a_single_bullet_is_not_enough_to_win_and_falls_back() {
    let text = "- only one bullet here, nothing else";
    let items = split_items(text);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0], text);
}
