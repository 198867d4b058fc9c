//! Queue-group configuration grammar.
//!
//! A compact string declares how a job-queue backend is partitioned into
//! independently-sized schedulers:
//!
//! ```text
//! spec  := group (";" group)*
//! group := names ":" integer
//! names := name ("," name)*
//! name  := identifier | "*"
//! ```
//!
//! An identifier is one or more ASCII alphanumerics, `_`, or `-`.
//! The integer is the group's thread capacity (zero is legal and yields a
//! scheduler that never runs tasks). Whitespace around delimiters is
//! insignificant. Declaration order is preserved and significant for
//! routing.
//!
//! # Example
//!
//! ```rust
//! use queue_scheduler::config;
//!
//! let groups = config::parse("*:1;mice,ferrets:2;elephant:4").unwrap();
//! assert_eq!(groups.len(), 3);
//! assert_eq!(groups[1].names.to_string(), "mice,ferrets");
//! assert_eq!(groups[2].max_threads, 4);
//! ```

use crate::core::{Result, SchedulerError};
use serde::Serialize;
use std::fmt;

/// The set of queue names a group owns.
///
/// Routing is a match on this tagged variant rather than string comparison
/// scattered across call sites: an `Explicit` group matches only names it
/// lists, while the `Wildcard` group matches everything (the router gives
/// explicit listings precedence).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueueNames {
    /// The catch-all group, declared as `*`
    Wildcard,
    /// Literal queue names, in declaration order
    Explicit(Vec<String>),
}

impl QueueNames {
    /// Whether this name set matches the given queue name.
    ///
    /// `Wildcard` matches any name; precedence of explicit listings over the
    /// wildcard is the router's concern, not this predicate's.
    pub fn matches(&self, queue_name: &str) -> bool {
        match self {
            QueueNames::Wildcard => true,
            QueueNames::Explicit(names) => names.iter().any(|n| n == queue_name),
        }
    }

    /// Whether this is the catch-all group
    pub fn is_wildcard(&self) -> bool {
        matches!(self, QueueNames::Wildcard)
    }

    /// Whether the given name is literally listed in this set.
    ///
    /// Always false for the wildcard; the router uses this to apply
    /// explicit-over-wildcard precedence.
    pub fn lists(&self, queue_name: &str) -> bool {
        match self {
            QueueNames::Wildcard => false,
            QueueNames::Explicit(names) => names.iter().any(|n| n == queue_name),
        }
    }
}

impl fmt::Display for QueueNames {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueNames::Wildcard => write!(f, "*"),
            QueueNames::Explicit(names) => write!(f, "{}", names.join(",")),
        }
    }
}

/// One parsed queue group: a name set plus a thread capacity.
///
/// Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueGroup {
    /// Queue names this group owns
    pub names: QueueNames,
    /// Maximum worker threads for this group's scheduler
    pub max_threads: usize,
}

// Queue identifiers: ASCII alphanumerics plus '_' and '-'. Embedded ':',
// whitespace, or a stray '*' never form a valid name.
fn is_identifier(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse a queue-configuration string into its ordered queue groups.
///
/// Deterministic and pure.
///
/// # Errors
///
/// Returns [`SchedulerError::ConfigSyntax`] on an empty spec, a group with
/// no `:`, a blank or malformed name, a non-integer capacity, or `*`
/// combined with other names in one group.
pub fn parse(spec: &str) -> Result<Vec<QueueGroup>> {
    if spec.trim().is_empty() {
        return Err(SchedulerError::config_syntax(
            spec,
            "queue specification is empty",
        ));
    }

    let mut groups = Vec::new();
    for group in spec.split(';') {
        let group = group.trim();
        if group.is_empty() {
            return Err(SchedulerError::config_syntax(spec, "empty queue group"));
        }

        let (names_part, capacity_part) = group.rsplit_once(':').ok_or_else(|| {
            SchedulerError::config_syntax(spec, format!("group '{}' is missing ':'", group))
        })?;

        let max_threads: usize = capacity_part.trim().parse().map_err(|_| {
            SchedulerError::config_syntax(
                spec,
                format!("'{}' is not a valid thread count", capacity_part.trim()),
            )
        })?;

        let mut names: Vec<String> = Vec::new();
        for name in names_part.split(',') {
            let name = name.trim();
            if name.is_empty() {
                return Err(SchedulerError::config_syntax(
                    spec,
                    format!("group '{}' contains an empty queue name", group),
                ));
            }
            if name != "*" && !is_identifier(name) {
                return Err(SchedulerError::config_syntax(
                    spec,
                    format!("'{}' is not a valid queue name", name),
                ));
            }
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }

        let names = if names.iter().any(|n| n == "*") {
            if names.len() > 1 {
                return Err(SchedulerError::config_syntax(
                    spec,
                    format!("group '{}' combines '*' with other queue names", group),
                ));
            }
            QueueNames::Wildcard
        } else {
            QueueNames::Explicit(names)
        };

        groups.push(QueueGroup { names, max_threads });
    }

    Ok(groups)
}
