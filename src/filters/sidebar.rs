use std::collections::HashSet;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::layout::LayoutElement;

// ASCII capitals only; accented capitals disqualify a group.
static SIDEBAR_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z\s\d,]+$").unwrap()
});

const MIN_SIDEBAR_ELEMENTS: usize = 3;

/// Drop running sidebars from one page.
///
/// Elements sharing the same integer horizontal span form a group. A group is
/// a sidebar when it sits on the page edge (first element of the page at the
/// leftmost x, or ending at the second-to-last element at the rightmost x),
/// has at least three members, and its joined text is upper case. The page
/// number caption attached to a sidebar is dropped with it.
pub fn remove_sidebars(elements: Vec<LayoutElement>) -> Vec<LayoutElement> {
    if elements.is_empty() {
        return elements;
    }

    let mut groups: IndexMap<(i64, i64), Vec<usize>> = IndexMap::new();
    let mut min_x = i64::MAX;
    let mut max_x = i64::MIN;
    for (index, element) in elements.iter().enumerate() {
        let span = element.horizontal_span();
        groups.entry(span).or_default().push(index);
        min_x = min_x.min(span.0);
        max_x = max_x.max(span.1);
    }

    let second_to_last = elements.len().checked_sub(2);
    let mut removed: HashSet<usize> = HashSet::new();

    for (&(x_l, x_r), members) in &groups {
        let (Some(&first), Some(&last)) = (members.first(), members.last()) else {
            continue;
        };
        let on_left = first == 0 && x_l == min_x;
        let on_right = second_to_last == Some(last) && x_r == max_x;
        if !(on_left || on_right) || members.len() < MIN_SIDEBAR_ELEMENTS {
            continue;
        }

        let joined: String = members.iter().map(|&i| elements[i].text.as_str()).collect();
        if !SIDEBAR_TEXT.is_match(&joined) {
            continue;
        }

        removed.extend(members.iter().copied());

        let caption = if on_left { last + 1 } else { elements.len() - 1 };
        if elements.get(caption).is_some_and(is_page_caption) {
            removed.insert(caption);
        }
    }

    if removed.is_empty() {
        return elements;
    }

    tracing::debug!(removed = removed.len(), "Removed sidebar elements");
    elements
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !removed.contains(index))
        .map(|(_, element)| element)
        .collect()
}

fn is_page_caption(element: &LayoutElement) -> bool {
    let text = element.text.trim();
    element.is_uncategorized() && !text.is_empty() && text.chars().all(char::is_alphanumeric)
}
