/// Stable ordering of named inputs against a fixed priority list.
///
/// Known names come first in priority-list order; unknown names keep their
/// relative order and go last.
pub fn order_by_priority<T, F>(items: Vec<T>, priority: &[String], name_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut keyed: Vec<(usize, T)> = items
        .into_iter()
        .map(|item| {
            let rank = priority
                .iter()
                .position(|p| p == name_of(&item))
                .unwrap_or(priority.len());
            (rank, item)
        })
        .collect();
    // sort_by_key is stable
    keyed.sort_by_key(|(rank, _)| *rank);
    keyed.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    fn order_names(names: &[String], priority: &[String]) -> Vec<String> {
        order_by_priority(names.to_vec(), priority, |s| s.as_str())
    }

    #[test]
    fn known_names_follow_priority_order() {
        let priority = s(&["본사", "도이치오토월드", "DT네트웍스", "물류"]);
        let input = s(&["물류", "DT네트웍스", "본사"]);
        assert_eq!(order_names(&input, &priority), s(&["본사", "DT네트웍스", "물류"]));
    }

    #[test]
    fn unknown_names_go_last_in_original_order() {
        let priority = s(&["A", "B"]);
        let input = s(&["zeta", "B", "alpha", "A", "mid"]);
        assert_eq!(
            order_names(&input, &priority),
            s(&["A", "B", "zeta", "alpha", "mid"])
        );
    }

    #[test]
    fn empty_priority_keeps_upload_order() {
        let input = s(&["c", "a", "b"]);
        assert_eq!(order_names(&input, &[]), input);
    }

    #[test]
    fn duplicate_names_keep_relative_order() {
        let priority = s(&["A"]);
        let input = vec![("A", 1), ("x", 2), ("A", 3)];
        let out = order_by_priority(input, &priority, |item| item.0);
        assert_eq!(out, vec![("A", 1), ("A", 3), ("x", 2)]);
    }
}
