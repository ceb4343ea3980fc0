use twilight_model::guild::Member;

/// A value that can be found by name.
pub trait Searchable {
    /// Returns every name this value answers to.
    fn names(&self) -> Vec<&str>;
}

impl Searchable for Member {
    fn names(&self) -> Vec<&str> {
        let mut names = vec![self.user.name.as_str()];

        names.extend(self.nick.as_deref());
        names.extend(self.user.global_name.as_deref());

        names
    }
}

/// Finds the candidate best matching the query, ignoring case.
///
/// An exact name match wins over a partial one. Otherwise the first candidate with a name
/// containing the query is returned.
pub fn find<'c, T: Searchable>(candidates: &'c [T], query: &str) -> Option<&'c T> {
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return None;
    }

    let exact = candidates.iter().find(|c| c.names().iter().any(|n| n.to_lowercase() == query));

    exact.or_else(|| candidates.iter().find(|c| c.names().iter().any(|n| n.to_lowercase().contains(&query))))
}

/// Resolves a comma-separated list of names, returning the found candidates and the names that
/// matched nobody.
pub fn find_all<'c, T: Searchable>(candidates: &'c [T], input: &str) -> (Vec<&'c T>, Vec<String>) {
    let mut found = Vec::new();
    let mut missing = Vec::new();

    for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match self::find(candidates, name) {
            Some(candidate) => found.push(candidate),
            None => missing.push(name.to_string()),
        }
    }

    (found, missing)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Person(&'static str, Option<&'static str>);

    impl Searchable for Person {
        fn names(&self) -> Vec<&str> {
            let mut names = vec![self.0];

            names.extend(self.1);

            names
        }
    }

    const PEOPLE: [Person; 3] =
        [Person("annabelle", None), Person("bob", Some("Anna")), Person("carl", Some("Carl the Great"))];

    #[test]
    fn exact_beats_partial() {
        assert_eq!(find(&PEOPLE, "anna"), Some(&PEOPLE[1]));
        assert_eq!(find(&PEOPLE, "ANNAB"), Some(&PEOPLE[0]));
    }

    #[test]
    fn partial_takes_the_first() {
        assert_eq!(find(&PEOPLE, "a"), Some(&PEOPLE[0]));
        assert_eq!(find(&PEOPLE, "great"), Some(&PEOPLE[2]));
        assert_eq!(find(&PEOPLE, "dora"), None);
        assert_eq!(find(&PEOPLE, "  "), None);
    }

    #[test]
    fn lists_split_on_commas() {
        let (found, missing) = find_all(&PEOPLE, "Anna, dora ,, carl");

        assert_eq!(found, vec![&PEOPLE[1], &PEOPLE[2]]);
        assert_eq!(missing, vec!["dora".to_string()]);
    }
}
