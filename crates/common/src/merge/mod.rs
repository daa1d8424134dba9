//! Three-way textual merge over line diffs.
//!
//! Both the client (reconciling a pulled document against local edits) and
//! the server (bulk upsert with a supplied base) run the same algorithm:
//! diff `local` and `remote` against a shared `base`, then walk the two edit
//! streams in base order. Non-overlapping edits apply cleanly; overlapping
//! edits that differ become [`ConflictRegion`]s for a human to resolve.

mod diff;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use diff::{diff_lines, lcs_pairs, Edit};

/// Largest input accepted on any side of a merge.
pub const MAX_MERGE_BYTES: usize = 10 * 1024 * 1024;

/// Largest line count accepted on any side. Bounds the LCS DP table at
/// roughly 16 MiB of cells.
pub const MAX_MERGE_LINES: usize = 2_000;

/// A span where local and remote rewrote the same base range differently.
///
/// Field names follow the wire format used inside bulk-docs conflict
/// replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRegion {
    pub base_lines: Vec<String>,
    pub local_lines: Vec<String>,
    pub remote_lines: Vec<String>,
    /// First base line covered by the region.
    pub start_line: usize,
}

/// Outcome of a three-way merge: fully merged text, or the regions that
/// could not be reconciled. Conflicts never come with partial content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(String),
    Conflicts(Vec<ConflictRegion>),
}

impl MergeOutcome {
    pub fn is_merged(&self) -> bool {
        matches!(self, MergeOutcome::Merged(_))
    }
}

/// Inputs too large to merge. These are caller errors, not conflicts.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("merge input exceeds size limit: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("merge input exceeds line limit: {lines} lines (max {max})")]
    TooManyLines { lines: usize, max: usize },
}

fn check_limits(text: &str) -> Result<Vec<&str>, MergeError> {
    if text.len() > MAX_MERGE_BYTES {
        return Err(MergeError::TooLarge {
            size: text.len(),
            max: MAX_MERGE_BYTES,
        });
    }
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() > MAX_MERGE_LINES {
        return Err(MergeError::TooManyLines {
            lines: lines.len(),
            max: MAX_MERGE_LINES,
        });
    }
    Ok(lines)
}

/// Merge `local` and `remote` relative to their common `base`.
///
/// Short-circuits before any diffing: equal sides return immediately, and a
/// side equal to the base yields the other side unchanged.
pub fn three_way_merge(
    base: &str,
    local: &str,
    remote: &str,
) -> Result<MergeOutcome, MergeError> {
    if local == remote {
        return Ok(MergeOutcome::Merged(local.to_owned()));
    }
    if local == base {
        return Ok(MergeOutcome::Merged(remote.to_owned()));
    }
    if remote == base {
        return Ok(MergeOutcome::Merged(local.to_owned()));
    }

    let base_lines = check_limits(base)?;
    let local_lines = check_limits(local)?;
    let remote_lines = check_limits(remote)?;

    let local_edits = diff_lines(&base_lines, &local_lines);
    let remote_edits = diff_lines(&base_lines, &remote_lines);

    Ok(merge_edit_streams(
        &base_lines,
        &local_edits,
        &remote_edits,
    ))
}

/// Half-open interval overlap. Pure insertions (empty intervals) never
/// overlap anything under this test.
fn overlaps(a: &Edit, b: &Edit) -> bool {
    a.base_start < b.base_end && b.base_start < a.base_end
}

fn merge_edit_streams(base: &[&str], local: &[Edit], remote: &[Edit]) -> MergeOutcome {
    let mut out: Vec<String> = Vec::with_capacity(base.len());
    let mut conflicts: Vec<ConflictRegion> = Vec::new();
    let mut base_idx = 0usize;
    let (mut li, mut ri) = (0usize, 0usize);

    // Copy untouched base lines up to `until`.
    let flush = |out: &mut Vec<String>, base_idx: &mut usize, until: usize| {
        while *base_idx < until {
            out.push(base[*base_idx].to_owned());
            *base_idx += 1;
        }
    };

    loop {
        let l = local.get(li);
        let r = remote.get(ri);
        match (l, r) {
            (Some(a), Some(b)) if overlaps(a, b) => {
                let start = a.base_start.min(b.base_start);
                let end = a.base_end.max(b.base_end);
                flush(&mut out, &mut base_idx, start);
                if a.base_start == b.base_start
                    && a.base_end == b.base_end
                    && a.new_lines == b.new_lines
                {
                    // Both sides made the same change.
                    out.extend(a.new_lines.iter().cloned());
                } else {
                    conflicts.push(ConflictRegion {
                        base_lines: base[start..end].iter().map(|s| (*s).to_owned()).collect(),
                        local_lines: a.new_lines.clone(),
                        remote_lines: b.new_lines.clone(),
                        start_line: start,
                    });
                }
                base_idx = end;
                li += 1;
                ri += 1;
            }
            (Some(a), Some(b))
                if a.is_insertion() && b.is_insertion() && a.base_start == b.base_start =>
            {
                // Dueling insertions at one position. Identical text inserts
                // once; divergent text inserts neither side, leaving the
                // base as-is. The drop is a documented limitation of the
                // line walk, not a conflict.
                flush(&mut out, &mut base_idx, a.base_start);
                if a.new_lines == b.new_lines {
                    out.extend(a.new_lines.iter().cloned());
                }
                li += 1;
                ri += 1;
            }
            (Some(a), Some(b)) => {
                if a.base_start <= b.base_start {
                    flush(&mut out, &mut base_idx, a.base_start);
                    out.extend(a.new_lines.iter().cloned());
                    base_idx = a.base_end;
                    li += 1;
                } else {
                    flush(&mut out, &mut base_idx, b.base_start);
                    out.extend(b.new_lines.iter().cloned());
                    base_idx = b.base_end;
                    ri += 1;
                }
            }
            (Some(a), None) => {
                flush(&mut out, &mut base_idx, a.base_start);
                out.extend(a.new_lines.iter().cloned());
                base_idx = a.base_end;
                li += 1;
            }
            (None, Some(b)) => {
                flush(&mut out, &mut base_idx, b.base_start);
                out.extend(b.new_lines.iter().cloned());
                base_idx = b.base_end;
                ri += 1;
            }
            (None, None) => break,
        }
    }
    flush(&mut out, &mut base_idx, base.len());

    if conflicts.is_empty() {
        MergeOutcome::Merged(out.join("\n"))
    } else {
        MergeOutcome::Conflicts(conflicts)
    }
}

/// Reconstruct a usable base from two texts when none was saved: the LCS of
/// their line arrays. The result is never longer than either input.
///
/// Inputs over the merge limits yield an empty base, which degrades the
/// following three-way merge into conflict reporting instead of erroring.
pub fn compute_common_base(local: &str, remote: &str) -> String {
    let local_lines = match check_limits(local) {
        Ok(l) => l,
        Err(_) => return String::new(),
    };
    let remote_lines = match check_limits(remote) {
        Ok(l) => l,
        Err(_) => return String::new(),
    };

    let pairs = lcs_pairs(&local_lines, &remote_lines);
    pairs
        .iter()
        .map(|&(i, _)| local_lines[i])
        .collect::<Vec<_>>()
        .join("\n")
}
