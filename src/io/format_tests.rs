use super::{banner_lines, nice_bool, section_line, verdict, BANNER_WIDTH};

#[test]
fn test_banner_lines_have_equal_width() {
    for title in ["LASSI Matrix Summary", "x".repeat(BANNER_WIDTH + 20).as_str()] {
        let lines = banner_lines(title);
        let widths = lines.iter().map(|line| line.chars().count()).collect::<Vec<_>>();
        assert!(widths.iter().all(|&w| w == widths[0]));
        assert!(widths[0] >= BANNER_WIDTH);
        assert!(lines[1].contains(title));
    }
}

#[test]
fn test_section_lines_match_in_width() {
    let begin = section_line("Cross-tier certification", true);
    let end = section_line("Cross-tier certification", false);
    assert!(begin.contains("[Begin] Cross-tier certification "));
    assert!(end.contains("[ End ] Cross-tier certification "));
    assert_eq!(begin.chars().count(), end.chars().count());
}

#[test]
fn test_verdicts() {
    assert_eq!(verdict(true), "ok");
    assert_eq!(verdict(false), "MISMATCH");
    assert_eq!(nice_bool(false), "no");
}
