//! Node name range expansion
//!
//! A node field such as `n1,rack[01-03,7]x` names several nodes at once.
//! Expansion is purely textual and keeps the order in which ranges are
//! written: `rack[3,1-2]` yields `rack3, rack1, rack2`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// Malformed pattern; `column` is a 0-based char offset into the field
    Syntax { column: usize, reason: String },
    /// Expansion would exceed the configured number of names
    TooLarge {
        pattern: String,
        count: u128,
        limit: usize,
    },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::Syntax { reason, .. } => f.write_str(reason),
            RangeError::TooLarge { pattern, count, limit } => {
                write!(f, "range '{}' expands to {} nodes, limit is {}", pattern, count, limit)
            }
        }
    }
}

/// Split a node field on commas that are not inside brackets
pub fn split_node_field(field: &str) -> Result<Vec<(usize, &str)>, RangeError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (offset, ch) in field.char_indices() {
        match ch {
            '[' => {
                if depth > 0 {
                    return Err(RangeError::Syntax {
                        column: char_column(field, offset),
                        reason: "nested '[' in node range".to_string(),
                    });
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err(RangeError::Syntax {
                        column: char_column(field, offset),
                        reason: "unmatched ']' in node name".to_string(),
                    });
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                parts.push((start, &field[start..offset]));
                start = offset + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(RangeError::Syntax {
            column: char_column(field, field.len()),
            reason: "unterminated '[' in node range".to_string(),
        });
    }
    parts.push((start, &field[start..]));

    for (offset, part) in &parts {
        if part.is_empty() {
            return Err(RangeError::Syntax {
                column: char_column(field, *offset),
                reason: "empty node name".to_string(),
            });
        }
    }

    Ok(parts)
}

/// Expand one node pattern (no top-level commas) into concrete names
pub fn expand(pattern: &str, limit: usize) -> Result<Vec<String>, RangeError> {
    let open = match pattern.find('[') {
        Some(open) => open,
        None => return Ok(vec![pattern.to_string()]),
    };
    let close = match pattern[open..].find(']') {
        Some(rel) => open + rel,
        None => {
            return Err(RangeError::Syntax {
                column: char_column(pattern, open),
                reason: "unterminated '[' in node range".to_string(),
            })
        }
    };

    let prefix = &pattern[..open];
    let body = &pattern[open + 1..close];
    let suffix = &pattern[close + 1..];

    if suffix.contains('[') || suffix.contains(']') {
        return Err(RangeError::Syntax {
            column: char_column(pattern, close + 1),
            reason: "only one range is allowed per node name".to_string(),
        });
    }

    let items = parse_body(body).map_err(|reason| RangeError::Syntax {
        column: char_column(pattern, open + 1),
        reason,
    })?;

    let total: u128 = items.iter().map(|r| (r.high - r.low) as u128 + 1).sum();
    if total > limit as u128 {
        return Err(RangeError::TooLarge {
            pattern: pattern.to_string(),
            count: total,
            limit,
        });
    }

    let mut names = Vec::with_capacity(total as usize);
    for item in &items {
        for n in item.low..=item.high {
            names.push(format!("{}{:0width$}{}", prefix, n, suffix, width = item.width));
        }
    }

    Ok(names)
}

#[derive(Debug, Clone, Copy)]
struct NumRange {
    low: u64,
    high: u64,
    width: usize,
}

fn parse_body(body: &str) -> Result<Vec<NumRange>, String> {
    if body.is_empty() {
        return Err("empty node range".to_string());
    }

    body.split(',')
        .map(|item| {
            let (low_str, high_str) = match item.split_once('-') {
                Some((low, high)) => (low, high),
                None => (item, item),
            };
            let low = parse_bound(low_str)?;
            let high = parse_bound(high_str)?;
            if low > high {
                return Err(format!("reversed numeric range '{}'", item));
            }
            let width = if low_str.len() > 1 && low_str.starts_with('0') {
                low_str.len()
            } else {
                0
            };
            Ok(NumRange { low, high, width })
        })
        .collect()
}

fn parse_bound(s: &str) -> Result<u64, String> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid range bound '{}'", s));
    }
    s.parse::<u64>()
        .map_err(|e| format!("invalid range bound '{}': {}", s, e))
}

fn char_column(s: &str, byte_offset: usize) -> usize {
    s[..byte_offset].chars().count()
}
