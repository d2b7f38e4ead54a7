//! Views computed from raw vote records.

use indexmap::IndexMap;

use crate::state::poll::{RunoffVoteRecord, VoteRecord};

/// Book title to the distinct names of its voters, in first-seen order.
pub type NamesByBook = IndexMap<String, Vec<String>>;
/// Book title to its number of distinct voters.
pub type CountByBook = IndexMap<String, usize>;

/// Group primary-poll votes by book.
///
/// Records are visited in the order given; blank voters and blank books are ignored and a
/// name appears at most once per book.
pub fn names_by_book<'a>(votes: impl IntoIterator<Item = &'a VoteRecord>) -> NamesByBook {
    let mut grouped = NamesByBook::new();
    for vote in votes {
        for book in &vote.books {
            push_name(&mut grouped, book, &vote.voter);
        }
    }
    grouped
}

/// Group runoff votes by book.
pub fn runoff_names_by_book<'a>(
    votes: impl IntoIterator<Item = &'a RunoffVoteRecord>,
) -> NamesByBook {
    let mut grouped = NamesByBook::new();
    for vote in votes {
        push_name(&mut grouped, &vote.book, &vote.voter);
    }
    grouped
}

/// Count voters per book.
pub fn count_by_book(names: &NamesByBook) -> CountByBook {
    names
        .iter()
        .map(|(book, voters)| (book.clone(), voters.len()))
        .collect()
}

fn push_name(grouped: &mut NamesByBook, book: &str, voter: &str) {
    let (book, voter) = (book.trim(), voter.trim());
    if book.is_empty() || voter.is_empty() {
        return;
    }
    let names = grouped.entry(book.to_string()).or_default();
    if !names.iter().any(|name| name == voter) {
        names.push(voter.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(voter: &str, books: &[&str]) -> VoteRecord {
        VoteRecord {
            voter: voter.into(),
            books: books.iter().map(|b| b.to_string()).collect(),
            at: None,
        }
    }

    #[test]
    fn groups_multi_select_votes() {
        let votes = [vote("alice", &["X", "Y"]), vote("bob", &["Y"])];
        let names = names_by_book(&votes);

        assert_eq!(names["X"], vec!["alice"]);
        assert_eq!(names["Y"], vec!["alice", "bob"]);
        assert_eq!(names.keys().collect::<Vec<_>>(), vec!["X", "Y"]);

        let counts = count_by_book(&names);
        assert_eq!(counts["X"], 1);
        assert_eq!(counts["Y"], 2);
    }

    #[test]
    fn collapses_duplicates_and_skips_blanks() {
        let votes = [
            vote(" alice ", &["X", "X", "  "]),
            vote("alice", &["X"]),
            vote("", &["X"]),
        ];
        let names = names_by_book(&votes);
        assert_eq!(names.len(), 1);
        assert_eq!(names["X"], vec!["alice"]);
    }

    #[test]
    fn runoff_votes_group_by_single_book() {
        let votes = [
            RunoffVoteRecord {
                voter: "carol".into(),
                book: "Z".into(),
                at: None,
            },
            RunoffVoteRecord {
                voter: "dave".into(),
                book: "Z".into(),
                at: None,
            },
        ];
        let names = runoff_names_by_book(&votes);
        assert_eq!(names["Z"], vec!["carol", "dave"]);
        assert_eq!(count_by_book(&names)["Z"], 2);
    }
}
