use super::*;

#[test]
fn widths_match_afm_metrics() {
    // "Hi" = H(722) + i(222) in regular, H(722) + i(278) in bold.
    assert!((text_width(Font::Helvetica, 10.0, "Hi") - 9.44).abs() < 1e-9);
    assert!((text_width(Font::HelveticaBold, 10.0, "Hi") - 10.0).abs() < 1e-9);
    assert_eq!(
        text_width(Font::HelveticaOblique, 12.0, "abc"),
        text_width(Font::Helvetica, 12.0, "abc")
    );
    assert_eq!(text_width(Font::Helvetica, 11.0, ""), 0.0);
}

#[test]
fn encoding_replaces_unmappable_characters() {
    assert_eq!(encode_win_ansi("Café"), vec![b'C', b'a', b'f', 0xe9]);
    assert_eq!(encode_win_ansi("a\u{2014}b"), vec![b'a', 0x97, b'b']);
    assert_eq!(encode_win_ansi("日本"), b"??".to_vec());
    assert_eq!(encode_win_ansi("\u{85}"), b"?".to_vec());
}

#[test]
fn wrap_keeps_lines_within_width() {
    let text = "Nairobi International Jazz and Arts Festival Closing Night";
    let lines = wrap_text(Font::HelveticaBold, 18.0, text, 150.0);
    assert!(lines.len() > 1);
    for line in &lines {
        assert!(text_width(Font::HelveticaBold, 18.0, line) <= 150.0, "{line}");
    }
    assert_eq!(lines.join(" "), text);
}

#[test]
fn wrap_splits_overlong_words() {
    let lines = wrap_text(Font::Helvetica, 10.0, "Supercalifragilisticexpialidocious", 40.0);
    assert!(lines.len() > 1);
    assert_eq!(lines.concat(), "Supercalifragilisticexpialidocious");
    assert!(wrap_text(Font::Helvetica, 10.0, "   ", 40.0).is_empty());
}

#[test]
fn truncation_adds_ellipsis_only_when_needed() {
    assert_eq!(truncate_to_width(Font::Helvetica, 11.0, "KICC", 100.0), "KICC");
    let cut = truncate_to_width(
        Font::Helvetica,
        11.0,
        "Kenyatta International Convention Centre, Harambee Avenue",
        100.0,
    );
    assert!(cut.ends_with("..."));
    assert!(text_width(Font::Helvetica, 11.0, &cut) <= 100.0);
}
