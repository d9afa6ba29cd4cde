//! Line pass that limits CommonMark to the supported markdown subset.
//!
//! Only `#`..`###` headings and `* ` / `<digits>. ` list markers keep their
//! block meaning. Everything else a CommonMark parser would act on (block
//! quotes, setext underlines, indented code, fences, `_` emphasis, backslash
//! escapes, entities, raw HTML) is backslash-escaped so it reads as literal
//! text. `*` stays live for bold and italic, and brackets stay live for
//! inline links.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Item,
    Other,
}

/// `#`, `##` or `###` followed by a space, at the very start of the line.
fn heading(line: &str) -> Option<(&str, &str)> {
    let hashes = line.len() - line.trim_start_matches('#').len();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    line[hashes..].strip_prefix(' ').map(|rest| (&line[..hashes], rest))
}

fn list_marker(line: &str) -> Option<(&str, &str)> {
    if let Some(rest) = line.strip_prefix("* ") {
        return Some(("* ", rest));
    }
    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ").map(|rest| (&line[..digits + 2], rest))
}

/// `***`, `* * *` and the like would parse as a horizontal rule.
fn is_star_rule(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '*' | ' ' | '\t')) && line.matches('*').count() >= 3
}

/// Escapes `body`, which begins a block. A bare leading `*` or a `<digits>)`
/// prefix would still open a list, so those are escaped as well.
fn push_escaped(body: &str, out: &mut String) {
    let bare_star = body.starts_with('*') && body[1..].chars().next().map_or(true, char::is_whitespace);
    let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let list_paren = (digits > 0 && body[digits..].starts_with(')')).then_some(digits);

    for (i, c) in body.char_indices() {
        let escape = match c {
            '*' => i == 0 && bare_star,
            ')' => list_paren == Some(i),
            '[' | ']' | '(' => false,
            c => c.is_ascii_punctuation(),
        };
        if escape {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Rewrites `text` so that the parser only sees subset constructs.
///
/// Leading indentation is dropped except on list lines that follow another
/// list line, where it is capped at the previous item's content offset so it
/// nests the item and never opens an indented code block. A list line right
/// after a paragraph line gets a blank line in front, so numbered items
/// starting at any number become items.
pub(crate) fn restrict_to_subset(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    let mut previous = LineKind::Blank;
    let mut item_offset: Option<usize> = None;

    for raw in text.lines() {
        let line = raw.trim_start_matches([' ', '\t']);

        if line.trim_end().is_empty() {
            previous = LineKind::Blank;
        } else if is_star_rule(line) {
            out.push_str(&line.replace('*', "\\*"));
            previous = LineKind::Other;
            item_offset = None;
        } else if let Some((hashes, rest)) = heading(raw) {
            out.push_str(hashes);
            out.push(' ');
            push_escaped(rest, &mut out);
            previous = LineKind::Other;
            item_offset = None;
        } else if let Some((marker, rest)) = list_marker(line) {
            let indent = item_offset.map_or(0, |offset| (raw.len() - line.len()).min(offset));
            if previous == LineKind::Other {
                out.push('\n');
            }
            out.push_str(&" ".repeat(indent));
            out.push_str(marker);
            push_escaped(rest.trim_start(), &mut out);
            previous = LineKind::Item;
            item_offset = Some(indent + marker.len());
        } else {
            push_escaped(line, &mut out);
            previous = LineKind::Other;
            item_offset = None;
        }
        out.push('\n');
    }
    out
}
