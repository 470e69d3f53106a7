//! SPARQL query files: numbered blocks, one query each.
//!
//! A block starts at a header comment such as `# Query 3` or `# Consulta 3`
//! and runs until the next header. Lines before the first header are ignored.
//! Within a block, the query starts at the first line opening with `PREFIX`,
//! `SELECT`, `ASK`, `CONSTRUCT` or `DESCRIBE`; without such a line the whole
//! block is kept.

use std::sync::OnceLock;

use regex::Regex;

const QUERY_KEYWORDS: &[&str] = &["PREFIX", "SELECT", "ASK", "CONSTRUCT", "DESCRIBE"];

/// One query of a SPARQL query file, numbered from 1 in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparqlQuery {
    pub number: usize,
    pub text: String,
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*#[ \t]*(?:query|consulta)[ \t]+\d+").expect("valid header regex")
    })
}

/// Split `content` into numbered queries. Blocks that are empty after
/// trimming are skipped and do not take a number.
pub fn split_sparql_queries(content: &str) -> Vec<SparqlQuery> {
    let starts: Vec<usize> = header_regex().find_iter(content).map(|m| m.start()).collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(content.len());
            query_body(&content[start..end])
        })
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(i, text)| SparqlQuery { number: i + 1, text })
        .collect()
}

fn query_body(block: &str) -> String {
    let lines: Vec<&str> = block.trim().lines().collect();
    let start = lines
        .iter()
        .position(|line| {
            let upper = line.trim().to_uppercase();
            QUERY_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
        })
        .unwrap_or(0);
    lines[start..].join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_block_with_description_when_splitting_then_query_starts_at_keyword() {
        let queries = split_sparql_queries(
            "# Consulta 1\n# patients by sex\nPREFIX mel: <http://x#>\nSELECT ?s WHERE { ?s a mel:p }\n",
        );
        assert_eq!(queries.len(), 1);
        assert!(queries[0].text.starts_with("PREFIX mel:"));
    }

    #[test]
    fn given_text_before_first_header_when_splitting_then_ignored() {
        let queries = split_sparql_queries("SELECT * WHERE {}\n# Query 1\nASK {}\n");
        assert_eq!(
            queries,
            vec![SparqlQuery {
                number: 1,
                text: "ASK {}".to_string()
            }]
        );
    }
}
