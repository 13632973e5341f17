use regex::Captures;

use super::Pattern;

/// Renders `template` against the first match of `pattern` in `filename`.
///
/// Text outside the matched span is kept. When the pattern does not match,
/// `filename` is returned unchanged.
pub fn render(pattern: &Pattern, template: &str, filename: &str) -> String {
    let Some(caps) = pattern.regex().captures(filename) else {
        return filename.to_string();
    };
    let Some(whole) = caps.get(0) else {
        return filename.to_string();
    };

    let mut out = String::with_capacity(filename.len() + template.len());
    out.push_str(&filename[..whole.start()]);
    expand(template, &caps, &mut out);
    out.push_str(&filename[whole.end()..]);
    out
}

/// Renders the last component of a `/`-separated relative path and keeps
/// its directory part, so the source layout is mirrored in the target.
pub fn render_target_name(pattern: &Pattern, template: &str, relative_path: &str) -> String {
    match relative_path.rsplit_once('/') {
        Some((dir, basename)) => format!("{}/{}", dir, render(pattern, template, basename)),
        None => render(pattern, template, relative_path),
    }
}

/// Expands `$N` and `$N+K` / `$N-K` placeholders.
fn expand(template: &str, caps: &Captures<'_>, out: &mut String) {
    let bytes = template.as_bytes();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }

        let index_len = leading_digits(&bytes[i + 1..], 2);
        if index_len == 0 {
            i += 1;
            continue;
        }

        out.push_str(&template[literal_start..i]);

        let index_end = i + 1 + index_len;
        let index: usize = template[i + 1..index_end].parse().unwrap_or(0);
        let value = caps.get(index).map_or("", |m| m.as_str());

        let offset_len = offset_len(&bytes[index_end..]);
        let next = index_end + offset_len;
        if offset_len > 0 {
            let offset = &template[index_end..next];
            match apply_offset(value, offset) {
                Some(number) => out.push_str(&number.to_string()),
                None => {
                    out.push_str(value);
                    out.push_str(offset);
                }
            }
        } else {
            out.push_str(value);
        }

        i = next;
        literal_start = next;
    }

    out.push_str(&template[literal_start..]);
}

fn leading_digits(bytes: &[u8], max: usize) -> usize {
    bytes
        .iter()
        .take(max)
        .take_while(|b| b.is_ascii_digit())
        .count()
}

/// Length of a `+K` / `-K` suffix, or 0 when there is none.
fn offset_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b'+') | Some(b'-') => {
            let digits = leading_digits(&bytes[1..], usize::MAX);
            if digits == 0 {
                0
            } else {
                digits + 1
            }
        }
        _ => 0,
    }
}

/// Integer arithmetic on a fully numeric capture; `None` leaves it literal.
fn apply_offset(value: &str, offset: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let base: i64 = value.parse().ok()?;
    let delta: i64 = offset.parse().ok()?;
    base.checked_add(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> Pattern {
        Pattern::parse(raw).unwrap()
    }

    #[test]
    fn test_offset_addition() {
        assert_eq!(render(&pattern(r"/(\d+)/"), "$1+5", "10"), "15");
    }

    #[test]
    fn test_offset_subtraction() {
        assert_eq!(render(&pattern(r"/(\d+)/"), "$1-3", "10"), "7");
    }

    #[test]
    fn test_dash_before_placeholder_is_literal() {
        assert_eq!(render(&pattern(r"/(a)(\d+)/"), "$1-$2", "a10"), "a-10");
    }

    #[test]
    fn test_offset_only_applies_to_its_group() {
        assert_eq!(render(&pattern(r"/(a)(\d+)/"), "$1$2-3", "a10"), "a7");
    }

    #[test]
    fn test_no_match_passes_through() {
        let p = pattern(r"/^(.+)\.txt$/");
        assert_eq!(render(&p, "$1.bak", "photo.jpg"), "photo.jpg");
    }

    #[test]
    fn test_full_match_replacement() {
        let p = pattern(r"/^(.+)\.txt$/");
        assert_eq!(render(&p, "$1.bak", "a.txt"), "a.bak");
    }

    #[test]
    fn test_text_outside_match_is_kept() {
        let p = pattern(r"/E(\d+)/");
        assert_eq!(render(&p, "Episode $1+0", "Show.E07.mkv"), "Show.Episode 7.mkv");
    }

    #[test]
    fn test_only_first_match_is_replaced() {
        let p = pattern(r"/(\d+)/");
        assert_eq!(render(&p, "[$1]", "1-2-3"), "[1]-2-3");
    }

    #[test]
    fn test_missing_group_is_empty() {
        let p = pattern(r"/^(\w+)(-draft)?\.md$/");
        assert_eq!(render(&p, "$1$2.txt", "notes.md"), "notes.txt");
        assert_eq!(render(&p, "$1$5.txt", "notes.md"), "notes.txt");
    }

    #[test]
    fn test_non_numeric_capture_keeps_offset_text() {
        let p = pattern(r"/^(\w+)\.txt$/");
        assert_eq!(render(&p, "$1-2024.txt", "report.txt"), "report-2024.txt");
    }

    #[test]
    fn test_offset_may_go_negative() {
        let p = pattern(r"/^(\d+)$/");
        assert_eq!(render(&p, "$1-5", "3"), "-2");
    }

    #[test]
    fn test_leading_zeros_are_not_preserved() {
        let p = pattern(r"/^s(\d+)e(\d+)$/");
        assert_eq!(render(&p, "S$1 E$2+1", "s01e09"), "S01 E10");
    }

    #[test]
    fn test_overflow_leaves_capture_literal() {
        let p = pattern(r"/^(\d+)$/");
        assert_eq!(
            render(&p, "$1+1", "9223372036854775807"),
            "9223372036854775807+1"
        );
    }

    #[test]
    fn test_group_zero_is_whole_match() {
        let p = pattern(r"/\d+/");
        assert_eq!(render(&p, "<$0>", "ab12cd"), "ab<12>cd");
    }

    #[test]
    fn test_dollar_without_digit_is_literal() {
        let p = pattern(r"/^(.+)$/");
        assert_eq!(render(&p, "$$1 $x", "v"), "$v $x");
    }

    #[test]
    fn test_two_digit_group_index() {
        let p = pattern(r"/^(a)(b)(c)(d)(e)(f)(g)(h)(i)(j)(k)$/");
        assert_eq!(render(&p, "$11$1", "abcdefghijk"), "ka");
        assert_eq!(render(&p, "$123", "abcdefghijk"), "3");
    }

    #[test]
    fn test_render_is_deterministic() {
        let p = pattern(r"/^(\d+)_(.+)$/");
        let first = render(&p, "$2_$1+1", "07_clip.mp4");
        for _ in 0..10 {
            assert_eq!(render(&p, "$2_$1+1", "07_clip.mp4"), first);
        }
        assert_eq!(first, "clip.mp4_8");
    }

    #[test]
    fn test_render_target_name_keeps_directory() {
        let p = pattern(r"/^(.+)\.txt$/");
        assert_eq!(render_target_name(&p, "$1.bak", "sub/dir/a.txt"), "sub/dir/a.bak");
        assert_eq!(render_target_name(&p, "$1.bak", "a.txt"), "a.bak");
    }

    #[test]
    fn test_render_target_name_only_touches_basename() {
        let p = pattern(r"/^(\d+)/");
        assert_eq!(render_target_name(&p, "x$1", "2024/05.jpg"), "2024/x05.jpg");
    }
}
