//! Text deltas between consecutive revisions.
//!
//! A delta is an ordered list of span edits. Offsets are UTF-8 byte offsets into
//! the content as it stands when that op runs, so ops must be applied in exactly
//! the stored order:
//!
//! ```text
//!   "Hello"  ── Insert { at: 5, text: " world" } ──►  "Hello world"
//!   "Hello world" ── Replace { at: 0, len: 5, text: "Goodbye" } ──► "Goodbye world"
//! ```
//!
//! Diffs are computed with `similar` at line, word or character granularity and
//! coalesced so that a replaced run becomes a single `Replace`.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// A single span edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOp {
    Insert { at: usize, text: String },
    Delete { at: usize, len: usize },
    Replace { at: usize, len: usize, text: String },
}

/// Tokenization used when diffing two revisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffGranularity {
    Lines,
    #[default]
    Words,
    Chars,
}

impl std::str::FromStr for DiffGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lines" => Ok(DiffGranularity::Lines),
            "words" => Ok(DiffGranularity::Words),
            "chars" => Ok(DiffGranularity::Chars),
            other => Err(format!("unknown diff granularity '{other}'")),
        }
    }
}

/// Why a delta could not be applied to its base.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("op #{op_index} addresses {at}..{end} but content is {content_len} bytes")]
    OutOfBounds {
        op_index: usize,
        at: usize,
        end: usize,
        content_len: usize,
    },

    #[error("op #{op_index} offset {offset} is not on a UTF-8 character boundary")]
    NotCharBoundary { op_index: usize, offset: usize },
}

/// Compute the ops that turn `old` into `new`.
pub fn compute_delta(old: &str, new: &str, granularity: DiffGranularity) -> Vec<DeltaOp> {
    let diff = match granularity {
        DiffGranularity::Lines => TextDiff::from_lines(old, new),
        DiffGranularity::Words => TextDiff::from_words(old, new),
        DiffGranularity::Chars => TextDiff::from_chars(old, new),
    };

    // `cursor` is the byte position in the partially rewritten text: everything
    // before it already matches `new`, everything after it is still `old`.
    let mut ops: Vec<DeltaOp> = Vec::new();
    let mut cursor = 0usize;
    for change in diff.iter_all_changes() {
        let value: &str = change.value();
        match change.tag() {
            ChangeTag::Equal => cursor += value.len(),
            ChangeTag::Delete => push_delete(&mut ops, cursor, value.len()),
            ChangeTag::Insert => {
                push_insert(&mut ops, cursor, value);
                cursor += value.len();
            }
        }
    }
    ops
}

fn push_delete(ops: &mut Vec<DeltaOp>, cursor: usize, len: usize) {
    if let Some(DeltaOp::Delete { at, len: pending }) = ops.last_mut() {
        if *at == cursor {
            *pending += len;
            return;
        }
    }
    ops.push(DeltaOp::Delete { at: cursor, len });
}

fn push_insert(ops: &mut Vec<DeltaOp>, cursor: usize, value: &str) {
    if let Some(last) = ops.last_mut() {
        match last {
            DeltaOp::Insert { at, text } | DeltaOp::Replace { at, text, .. }
                if *at + text.len() == cursor =>
            {
                text.push_str(value);
                return;
            }
            DeltaOp::Delete { at, len } if *at == cursor => {
                let (at, len) = (*at, *len);
                *last = DeltaOp::Replace {
                    at,
                    len,
                    text: value.to_owned(),
                };
                return;
            }
            _ => {}
        }
    }
    ops.push(DeltaOp::Insert {
        at: cursor,
        text: value.to_owned(),
    });
}

/// Apply `ops` to `base` in order.
pub fn apply_delta(base: &str, ops: &[DeltaOp]) -> Result<String, ApplyError> {
    let mut content = base.to_owned();
    for (op_index, op) in ops.iter().enumerate() {
        match op {
            DeltaOp::Insert { at, text } => {
                check_range(&content, op_index, *at, 0)?;
                content.insert_str(*at, text);
            }
            DeltaOp::Delete { at, len } => {
                let end = check_range(&content, op_index, *at, *len)?;
                content.replace_range(*at..end, "");
            }
            DeltaOp::Replace { at, len, text } => {
                let end = check_range(&content, op_index, *at, *len)?;
                content.replace_range(*at..end, text);
            }
        }
    }
    Ok(content)
}

fn check_range(content: &str, op_index: usize, at: usize, len: usize) -> Result<usize, ApplyError> {
    let end = at.checked_add(len).ok_or(ApplyError::OutOfBounds {
        op_index,
        at,
        end: usize::MAX,
        content_len: content.len(),
    })?;
    if end > content.len() {
        return Err(ApplyError::OutOfBounds {
            op_index,
            at,
            end,
            content_len: content.len(),
        });
    }
    for offset in [at, end] {
        if !content.is_char_boundary(offset) {
            return Err(ApplyError::NotCharBoundary { op_index, offset });
        }
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(old: &str, new: &str, granularity: DiffGranularity) {
        let ops = compute_delta(old, new, granularity);
        let applied = apply_delta(old, &ops).unwrap();
        assert_eq!(applied, new, "granularity {granularity:?}, ops {ops:?}");
    }

    #[test]
    fn test_append_is_single_insert() {
        let ops = compute_delta("Hello", "Hello world", DiffGranularity::Words);
        assert_eq!(
            ops,
            vec![DeltaOp::Insert {
                at: 5,
                text: " world".into()
            }]
        );
    }

    #[test]
    fn test_word_replacement_coalesces() {
        let ops = compute_delta("Hello world", "Goodbye world", DiffGranularity::Words);
        assert_eq!(
            ops,
            vec![DeltaOp::Replace {
                at: 0,
                len: 5,
                text: "Goodbye".into()
            }]
        );
    }

    #[test]
    fn test_identical_content_has_no_ops() {
        assert!(compute_delta("same text", "same text", DiffGranularity::Chars).is_empty());
        assert!(compute_delta("", "", DiffGranularity::Lines).is_empty());
    }

    #[test]
    fn test_edits_reproduce_target_at_every_granularity() {
        let cases = [
            ("", "fresh content"),
            ("remove everything", ""),
            ("line one\nline two\nline three\n", "line one\nline 2\nline three\nline four\n"),
            ("# Title\n\nSome *markdown* body.", "# New title\n\nSome **markdown** body!\n"),
            ("naïve café", "naive café ☕"),
            ("a b c d e f", "f e d c b a"),
        ];
        for (old, new) in cases {
            for granularity in [DiffGranularity::Lines, DiffGranularity::Words, DiffGranularity::Chars] {
                roundtrip(old, new, granularity);
            }
        }
    }

    #[test]
    fn test_ops_apply_in_stored_order() {
        let ops = vec![
            DeltaOp::Insert { at: 0, text: "ab".into() },
            DeltaOp::Delete { at: 1, len: 1 },
            DeltaOp::Replace { at: 0, len: 1, text: "xyz".into() },
        ];
        // "" -> "ab" -> "a" -> "xyz"
        assert_eq!(apply_delta("", &ops).unwrap(), "xyz");
    }

    #[test]
    fn test_out_of_bounds_delete_is_rejected() {
        let ops = vec![DeltaOp::Delete { at: 3, len: 10 }];
        let err = apply_delta("short", &ops).unwrap_err();
        assert_eq!(
            err,
            ApplyError::OutOfBounds {
                op_index: 0,
                at: 3,
                end: 13,
                content_len: 5
            }
        );
    }

    #[test]
    fn test_insert_past_end_is_rejected() {
        let ops = vec![
            DeltaOp::Insert { at: 0, text: "ok".into() },
            DeltaOp::Insert { at: 9, text: "bad".into() },
        ];
        let err = apply_delta("", &ops).unwrap_err();
        assert!(matches!(err, ApplyError::OutOfBounds { op_index: 1, .. }));
    }

    #[test]
    fn test_offset_inside_multibyte_char_is_rejected() {
        // 'é' occupies bytes 3..5
        let ops = vec![DeltaOp::Insert { at: 4, text: "x".into() }];
        let err = apply_delta("café", &ops).unwrap_err();
        assert_eq!(err, ApplyError::NotCharBoundary { op_index: 0, offset: 4 });
    }

    #[test]
    fn test_overflowing_range_is_rejected() {
        let ops = vec![DeltaOp::Delete { at: 1, len: usize::MAX }];
        assert!(matches!(
            apply_delta("abc", &ops),
            Err(ApplyError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_granularity_parse() {
        assert_eq!("lines".parse::<DiffGranularity>().unwrap(), DiffGranularity::Lines);
        assert_eq!("chars".parse::<DiffGranularity>().unwrap(), DiffGranularity::Chars);
        assert!("bytes".parse::<DiffGranularity>().is_err());
        assert_eq!(DiffGranularity::default(), DiffGranularity::Words);
    }
}
