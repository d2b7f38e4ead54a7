//! Candidate feed: fetch the submissions CSV and turn it into [`Candidate`]s.

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info};

use crate::state::poll::Candidate;

/// Column holding the title when the feed has no recognizable header.
const DEFAULT_TITLE_COLUMN: usize = 1;
/// Column holding the suggester's name when the feed has no recognizable header.
const DEFAULT_SUGGESTED_BY_COLUMN: usize = 2;

/// Failures while loading the candidate feed.
#[derive(Debug, Error)]
pub enum CandidateError {
    /// No feed location configured.
    #[error("no candidate feed configured")]
    NotConfigured,
    /// The HTTP request could not be completed.
    #[error("failed to fetch candidate feed `{url}`")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The feed answered with a non-success status.
    #[error("candidate feed `{url}` answered {status}")]
    Status { url: String, status: StatusCode },
    /// A local feed file could not be read.
    #[error("failed to read candidate file `{path}`")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fetch and parse the feed at `source` (an `http(s)` URL or a file path).
pub async fn load_candidates(
    client: &Client,
    source: Option<&str>,
) -> Result<Vec<Candidate>, CandidateError> {
    let source = source
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .ok_or(CandidateError::NotConfigured)?;

    let text = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_remote(client, source).await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|err| CandidateError::Read {
                path: source.to_string(),
                source: err,
            })?
    };

    let candidates = parse_candidates(&text);
    info!(count = candidates.len(), "loaded candidate feed");
    Ok(candidates)
}

async fn fetch_remote(client: &Client, url: &str) -> Result<String, CandidateError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| CandidateError::Fetch {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(CandidateError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    response.text().await.map_err(|source| CandidateError::Fetch {
        url: url.to_string(),
        source,
    })
}

/// Parse the submissions CSV.
///
/// A first row naming both a book/title column and a suggester column, with no numeric or
/// date cells, is treated as a header and its columns are used; otherwise every row is data with the title in column 1 and the suggester in
/// column 2. Rows without a title are dropped.
pub fn parse_candidates(text: &str) -> Vec<Candidate> {
    let rows = parse_csv(text);
    let Some(first) = rows.first() else {
        return Vec::new();
    };

    let (title_column, name_column, skip) = match detect_header(first) {
        Some((title, name)) => (title, name, 1),
        None => (DEFAULT_TITLE_COLUMN, DEFAULT_SUGGESTED_BY_COLUMN, 0),
    };
    debug!(title_column, name_column, header = skip == 1, "parsing candidate feed");

    rows.iter()
        .skip(skip)
        .filter_map(|row| {
            let title = row.get(title_column).map(|cell| cell.trim())?;
            if title.is_empty() {
                return None;
            }
            let name = row.get(name_column).map(String::as_str).unwrap_or_default();
            Some(Candidate::new(title, name))
        })
        .collect()
}

fn detect_header(row: &[String]) -> Option<(usize, usize)> {
    let lowered = row
        .iter()
        .map(|cell| cell.trim().to_lowercase())
        .collect::<Vec<_>>();
    if lowered.iter().any(|cell| looks_like_data(cell)) {
        return None;
    }
    let title = lowered
        .iter()
        .position(|cell| cell.contains("book") || cell.contains("title"))?;
    let name = lowered.iter().enumerate().position(|(column, cell)| {
        column != title && (cell.contains("suggest") || cell.contains("name"))
    })?;
    Some((title, name))
}

/// Row numbers and submission dates only show up in data rows.
fn looks_like_data(cell: &str) -> bool {
    let starts_with_digit = cell.chars().next().is_some_and(|ch| ch.is_ascii_digit());
    starts_with_digit && cell.chars().all(|ch| ch.is_ascii_digit() || "-/:.tz ".contains(ch))
}

/// Split CSV text into rows of cells. Quoted cells may contain commas, newlines and
/// doubled quotes.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => row.push(std::mem::take(&mut cell)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                row.push(std::mem::take(&mut cell));
                rows.push(std::mem::take(&mut row));
            }
            other => cell.push(other),
        }
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.title.as_str()).collect()
    }

    #[test]
    fn header_columns_are_detected() {
        let csv = "Timestamp,Book title,Suggested by\r\n\
                   2024-01-01,Dune,Alice\r\n\
                   2024-01-02,  Emma ,Bob\r\n";
        let candidates = parse_candidates(csv);
        assert_eq!(titles(&candidates), vec!["Dune", "Emma"]);
        assert_eq!(candidates[1].suggested_by, "Bob");
    }

    #[test]
    fn header_can_reorder_columns() {
        let csv = "Your name,Book\nAlice,Dune\n";
        let candidates = parse_candidates(csv);
        assert_eq!(candidates, vec![Candidate::new("Dune", "Alice")]);
    }

    #[test]
    fn fixed_positions_without_header() {
        let csv = "1,Dune,Alice\n2,Emma,Bob";
        let candidates = parse_candidates(csv);
        assert_eq!(titles(&candidates), vec!["Dune", "Emma"]);
    }

    #[test]
    fn data_row_mentioning_a_book_is_not_a_header() {
        let csv = "1,The Book Thief,Alice\n2,Dune,Bob\n3,Emma,Carol\n";
        let candidates = parse_candidates(csv);
        assert_eq!(titles(&candidates), vec!["The Book Thief", "Dune", "Emma"]);
        assert_eq!(candidates[0].suggested_by, "Alice");
    }

    #[test]
    fn quotes_and_empty_titles() {
        let csv = "ts,title,name\n\
                   x,\"War, and \"\"Peace\"\"\",Leo\n\
                   y,   ,Nobody\n\
                   z,\"Multi\nline\",Ann\n";
        let candidates = parse_candidates(csv);
        assert_eq!(titles(&candidates), vec!["War, and \"Peace\"", "Multi\nline"]);
    }

    #[test]
    fn empty_feed_has_no_candidates() {
        assert!(parse_candidates("").is_empty());
    }

    #[tokio::test]
    async fn missing_source_is_reported() {
        let err = load_candidates(&Client::new(), None).await.unwrap_err();
        assert!(matches!(err, CandidateError::NotConfigured));
    }

    #[tokio::test]
    async fn reads_local_files() {
        let path = std::env::temp_dir().join(format!("candidates-{}.csv", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, "ts,book,name\n1,Dune,Alice\n")
            .await
            .unwrap();

        let candidates = load_candidates(&Client::new(), path.to_str()).await.unwrap();
        assert_eq!(titles(&candidates), vec!["Dune"]);

        let _ = tokio::fs::remove_file(path).await;
    }
}
