//! Caching directives embedded in SQL text as comment lines.
//!
//! A directive line is `-- Stash:<body>`. Recognized bodies:
//! `TTL=<seconds>` (opt in; 0 keeps the configured defaults),
//! `TTL=<seconds>,Sliding=<seconds>`, `Profile=<name>`, and `NoCache`
//! (opt out, supersedes everything else).

use std::time::Duration;

/// The literal that marks a caching directive inside a `--` comment.
pub const DIRECTIVE_MARKER: &str = "Stash:";

/// Parsed caching intent for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    pub no_cache: bool,
    pub opt_in: bool,
    /// Absolute TTL; `None` defers to the configured default.
    pub ttl: Option<Duration>,
    /// Sliding TTL; `None` defers to the configured default.
    pub sliding: Option<Duration>,
    pub profile: Option<String>,
}

/// Scan the SQL text for directive lines.
pub fn parse(sql: &str) -> Directives {
    let mut out = Directives::default();
    for line in sql.lines() {
        let trimmed = line.trim();
        let Some(comment) = trimmed.strip_prefix("--") else {
            continue;
        };
        let Some(body) = comment.trim_start().strip_prefix(DIRECTIVE_MARKER) else {
            continue;
        };
        apply(body.trim(), &mut out);
    }
    out
}

fn apply(body: &str, out: &mut Directives) {
    if body.eq_ignore_ascii_case("NoCache") {
        out.no_cache = true;
        return;
    }
    for part in body.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next().unwrap_or("").trim();
        let value = kv.next().unwrap_or("").trim();
        if key.eq_ignore_ascii_case("TTL") {
            if let Ok(seconds) = value.parse::<u64>() {
                out.opt_in = true;
                if seconds > 0 {
                    out.ttl = Some(Duration::from_secs(seconds));
                }
            }
        } else if key.eq_ignore_ascii_case("Sliding") {
            if let Ok(seconds) = value.parse::<u64>() {
                out.opt_in = true;
                if seconds > 0 {
                    out.sliding = Some(Duration::from_secs(seconds));
                }
            }
        } else if key.eq_ignore_ascii_case("Profile") && !value.is_empty() {
            out.opt_in = true;
            out.profile = Some(value.to_string());
        }
    }
}

/// Append an opt-in TTL directive to a query.
pub fn with_ttl(sql: &str, ttl_seconds: u64) -> String {
    format!("{sql}\n-- {DIRECTIVE_MARKER}TTL={ttl_seconds}")
}

/// Append an opt-in TTL directive with a sliding window.
pub fn with_ttl_sliding(sql: &str, ttl_seconds: u64, sliding_seconds: u64) -> String {
    format!("{sql}\n-- {DIRECTIVE_MARKER}TTL={ttl_seconds},Sliding={sliding_seconds}")
}

/// Append a profile reference.
pub fn with_profile(sql: &str, profile: &str) -> String {
    format!("{sql}\n-- {DIRECTIVE_MARKER}Profile={profile}")
}

/// Append an opt-out directive.
pub fn with_no_cache(sql: &str) -> String {
    format!("{sql}\n-- {DIRECTIVE_MARKER}NoCache")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_directive() {
        let d = parse("SELECT * FROM Products");
        assert_eq!(d, Directives::default());
    }

    #[test]
    fn test_ttl_directive() {
        let d = parse("SELECT 1\n-- Stash:TTL=300");
        assert!(d.opt_in);
        assert!(!d.no_cache);
        assert_eq!(d.ttl, Some(Duration::from_secs(300)));
        assert_eq!(d.sliding, None);
    }

    #[test]
    fn test_ttl_zero_means_defaults() {
        let d = parse("SELECT 1\n-- Stash:TTL=0");
        assert!(d.opt_in);
        assert_eq!(d.ttl, None);
    }

    #[test]
    fn test_ttl_with_sliding() {
        let d = parse("SELECT 1\n-- Stash:TTL=3600,Sliding=900");
        assert_eq!(d.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(d.sliding, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_profile_directive() {
        let d = parse("SELECT 1\n-- Stash:Profile=hot-data");
        assert!(d.opt_in);
        assert_eq!(d.profile.as_deref(), Some("hot-data"));
    }

    #[test]
    fn test_no_cache_wins_over_opt_in() {
        let d = parse("SELECT 1\n-- Stash:TTL=300\n-- Stash:NoCache");
        assert!(d.no_cache);
        assert!(d.opt_in);
    }

    #[test]
    fn test_marker_requires_comment_prefix() {
        let d = parse("SELECT 'Stash:TTL=300' FROM t");
        assert_eq!(d, Directives::default());
    }

    #[test]
    fn test_helpers_round_trip() {
        assert!(parse(&with_ttl("SELECT 1", 300)).opt_in);
        assert!(parse(&with_no_cache("SELECT 1")).no_cache);
        let d = parse(&with_ttl_sliding("SELECT 1", 60, 30));
        assert_eq!(d.sliding, Some(Duration::from_secs(30)));
        let d = parse(&with_profile("SELECT 1", "hot"));
        assert_eq!(d.profile.as_deref(), Some("hot"));
    }
}
