use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::{MAX_RANK, MAX_RANK_EXPR_LEN};

/// Which 1-based ranks a template group claims: either an expression such as
/// `"1-3, 5,7"` or a raw list of numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RankSpec {
    List(Vec<u32>),
    Expr(String),
}

impl Default for RankSpec {
    fn default() -> Self {
        RankSpec::Expr(String::new())
    }
}

impl RankSpec {
    /// Concrete ranks in declaration order, duplicates removed.
    pub fn resolve(&self) -> Result<Vec<u32>, &'static str> {
        match self {
            RankSpec::Expr(expr) => parse_ranks(expr),
            RankSpec::List(list) => {
                let mut ranks = Ranks::default();
                for &r in list {
                    ranks.push(check_rank(r)?);
                }
                Ok(ranks.out)
            }
        }
    }
}

impl fmt::Display for RankSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankSpec::Expr(expr) => f.write_str(expr),
            RankSpec::List(list) => {
                let parts: Vec<String> = list.iter().map(u32::to_string).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

#[derive(Default)]
struct Ranks {
    seen: BTreeSet<u32>,
    out: Vec<u32>,
}

impl Ranks {
    fn push(&mut self, rank: u32) {
        if self.seen.insert(rank) {
            self.out.push(rank);
        }
    }
}

fn check_rank(rank: u32) -> Result<u32, &'static str> {
    if rank == 0 {
        return Err("ranks start at 1");
    }
    if rank > MAX_RANK {
        return Err("rank too large");
    }
    Ok(rank)
}

fn parse_rank(s: &str) -> Result<u32, &'static str> {
    let rank = s.trim().parse::<u32>().map_err(|_| "not a number")?;
    check_rank(rank)
}

/// Parse comma-separated terms. A term containing `-` is an inclusive range;
/// any other term is a whitespace-separated list of single ranks.
pub fn parse_ranks(expr: &str) -> Result<Vec<u32>, &'static str> {
    if expr.len() > MAX_RANK_EXPR_LEN {
        return Err("expression too long");
    }
    let mut ranks = Ranks::default();
    let trimmed = expr.trim();
    if trimmed.is_empty() {
        return Ok(ranks.out);
    }

    for term in trimmed.split(',') {
        let term = term.trim();
        if term.is_empty() {
            return Err("empty term");
        }
        if let Some((lo, hi)) = term.split_once('-') {
            let lo = parse_rank(lo)?;
            let hi = parse_rank(hi)?;
            if lo > hi {
                return Err("descending range");
            }
            for r in lo..=hi {
                ranks.push(r);
            }
        } else {
            for item in term.split_whitespace() {
                ranks.push(parse_rank(item)?);
            }
        }
    }
    Ok(ranks.out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_rank() {
        assert_eq!(parse_ranks("4"), Ok(vec![4]));
    }

    #[test]
    fn dash_range_is_inclusive() {
        assert_eq!(parse_ranks("1-3"), Ok(vec![1, 2, 3]));
        assert_eq!(parse_ranks(" 2 - 4 "), Ok(vec![2, 3, 4]));
    }

    #[test]
    fn comma_list_and_mixed_terms() {
        assert_eq!(parse_ranks("5,7"), Ok(vec![5, 7]));
        assert_eq!(parse_ranks("1-2, 9, 4-5"), Ok(vec![1, 2, 9, 4, 5]));
    }

    #[test]
    fn whitespace_list() {
        assert_eq!(parse_ranks("3 1 2"), Ok(vec![3, 1, 2]));
    }

    #[test]
    fn duplicates_keep_first_position() {
        assert_eq!(parse_ranks("2,1-3,2"), Ok(vec![2, 1, 3]));
    }

    #[test]
    fn empty_expression_claims_nothing() {
        assert_eq!(parse_ranks(""), Ok(vec![]));
        assert_eq!(parse_ranks("   "), Ok(vec![]));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        assert_eq!(parse_ranks("1,,2"), Err("empty term"));
        assert_eq!(parse_ranks("a"), Err("not a number"));
        assert_eq!(parse_ranks("5-3"), Err("descending range"));
        assert_eq!(parse_ranks("0-2"), Err("ranks start at 1"));
        assert_eq!(parse_ranks("1-"), Err("not a number"));
        assert_eq!(parse_ranks("1-3 5"), Err("not a number"));
        assert_eq!(parse_ranks("2000"), Err("rank too large"));
    }

    #[test]
    fn overlong_expression_is_rejected() {
        let expr = "1,".repeat(MAX_RANK_EXPR_LEN);
        assert_eq!(parse_ranks(&expr), Err("expression too long"));
    }

    #[test]
    fn raw_list_spec() {
        assert_eq!(RankSpec::List(vec![3, 3, 1]).resolve(), Ok(vec![3, 1]));
        assert_eq!(RankSpec::List(vec![0]).resolve(), Err("ranks start at 1"));
    }

    #[test]
    fn spec_deserializes_from_string_or_array() {
        let expr: RankSpec = serde_json::from_str("\"1-3\"").unwrap();
        assert_eq!(expr, RankSpec::Expr("1-3".into()));
        let list: RankSpec = serde_json::from_str("[4, 6]").unwrap();
        assert_eq!(list, RankSpec::List(vec![4, 6]));
        assert_eq!(list.to_string(), "[4,6]");
    }
}
