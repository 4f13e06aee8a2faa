//! Splits a unified diff into chunks that each stay near a target line
//! count, favoring splits between file blocks and falling back to
//! splitting within a hunk boundary when a single file's diff is too big
//! on its own. Ported from the original Go `SplitShotgunDiff`: a first
//! pass greedily packs file blocks (and splits oversized ones by hunk),
//! then a second pass bin-packs the small leftover splits back together
//! under a 20%-over-limit ceiling, scored by the same cost function.

/// `approx_line_limit <= 0` disables the merge pass: the caller gets the
/// first-pass splits back unmodified.
#[derive(Debug, Clone, Copy)]
pub struct DiffSplitConfig {
    pub approx_line_limit: i64,
}

struct MergeGroup {
    splits: Vec<String>,
    line_count: usize,
}

/// Split `diff_text` (a `git diff`-style unified diff) into chunks no
/// larger than roughly `config.approx_line_limit` lines each.
pub fn split_diff(diff_text: &str, config: DiffSplitConfig) -> Vec<String> {
    if diff_text.trim().is_empty() {
        return Vec::new();
    }

    let file_blocks = split_into_file_blocks(diff_text);
    let initial_splits = pack_file_blocks(&file_blocks, config.approx_line_limit);

    let (splits, sizes): (Vec<String>, Vec<usize>) = initial_splits
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(|s| {
            let lines = s.lines().count();
            (s, lines)
        })
        .unzip();

    if config.approx_line_limit <= 0 {
        tracing::info!(
            limit = config.approx_line_limit,
            splits = splits.len(),
            "diffsplit: limit is non-positive, skipping merge pass"
        );
        return splits;
    }

    if splits.len() <= 1 {
        return splits;
    }

    merge_small_splits(splits, sizes, config.approx_line_limit as usize)
}

fn split_into_file_blocks(diff_text: &str) -> Vec<String> {
    let starts: Vec<usize> = diff_text
        .match_indices("\ndiff --git ")
        .map(|(i, _)| i + 1)
        .chain(if diff_text.starts_with("diff --git ") { Some(0) } else { None })
        .collect();
    let mut starts = starts;
    starts.sort_unstable();

    if starts.is_empty() {
        tracing::warn!("diffsplit: no 'diff --git' blocks found in input, treating as single block");
        return vec![diff_text.to_string()];
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(diff_text.len());
        let block = diff_text[start..end].trim();
        if !block.is_empty() {
            blocks.push(block.to_string());
        }
    }
    blocks
}

fn path_from_diff_header(header_line: &str) -> &str {
    header_line.split_whitespace().nth(2).unwrap_or("unknown_file")
}

/// Mirrors the original packing pass literally: it compares raw line
/// counts against `approx_line_limit` without clamping, so a
/// non-positive limit makes every block take the oversized-split path.
/// Only the later merge pass special-cases a non-positive limit.
fn pack_file_blocks(file_blocks: &[String], approx_line_limit: i64) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current = String::new();
    let mut current_lines: i64 = 0;

    for block in file_blocks {
        let block_lines: Vec<&str> = block.lines().collect();
        let num_lines = block_lines.len() as i64;

        if num_lines > approx_line_limit {
            if !current.is_empty() {
                splits.push(std::mem::take(&mut current));
                current_lines = 0;
            }
            split_oversized_block(&block_lines, approx_line_limit, &mut splits);
            continue;
        }

        if current_lines > 0 && current_lines + num_lines > approx_line_limit {
            splits.push(std::mem::take(&mut current));
            current_lines = 0;
        }
        current.push_str(block);
        current.push('\n');
        current_lines += num_lines;
    }

    if !current.is_empty() {
        splits.push(current);
    }

    splits
}

fn split_oversized_block(block_lines: &[&str], limit: i64, splits: &mut Vec<String>) {
    let first_hunk_index = block_lines.iter().position(|line| is_hunk_header(line));

    let Some(first_hunk_index) = first_hunk_index else {
        tracing::warn!(
            file = path_from_diff_header(block_lines.first().copied().unwrap_or("")),
            "diffsplit: large file block without hunks, treating as single block"
        );
        splits.push(format!("{}\n", block_lines.join("\n")));
        return;
    };

    let file_header = format!("{}\n", block_lines[..first_hunk_index].join("\n"));
    let header_lines = first_hunk_index as i64;

    let mut current_hunks = String::new();
    let mut current_hunk_lines: i64 = 0;

    let mut hunk_start = first_hunk_index;
    while hunk_start < block_lines.len() {
        let mut hunk_end = hunk_start + 1;
        while hunk_end < block_lines.len() && !is_hunk_header(block_lines[hunk_end]) {
            hunk_end += 1;
        }

        let hunk_content = block_lines[hunk_start..hunk_end].join("\n");
        let hunk_line_count = (hunk_end - hunk_start) as i64;

        if header_lines + hunk_line_count > limit && current_hunk_lines == 0 {
            splits.push(format!("{file_header}{hunk_content}\n"));
            hunk_start = hunk_end;
            continue;
        }

        if current_hunk_lines > 0 && header_lines + current_hunk_lines + hunk_line_count > limit {
            splits.push(format!("{file_header}{current_hunks}"));
            current_hunks.clear();
            current_hunk_lines = 0;
        }

        current_hunks.push_str(&hunk_content);
        current_hunks.push('\n');
        current_hunk_lines += hunk_line_count;
        hunk_start = hunk_end;
    }

    if !current_hunks.is_empty() {
        splits.push(format!("{file_header}{current_hunks}"));
    }
}

fn is_hunk_header(line: &str) -> bool {
    line.starts_with("@@ ") && line[3..].contains(" @@")
}

fn score(solution: &[MergeGroup], max_allowed_lines: usize) -> f64 {
    if solution.is_empty() {
        return f64::MAX;
    }

    let mut score = solution.len() as f64 * 1000.0;
    for group in solution {
        let utilization = group.line_count as f64 / max_allowed_lines as f64;
        if utilization > 1.0 {
            score += 10_000.0 * (utilization - 1.0);
        } else {
            score += 100.0 * (1.0 - utilization);
        }
    }
    score
}

fn merge_small_splits(
    splits: Vec<String>,
    sizes: Vec<usize>,
    approx_line_limit: usize,
) -> Vec<String> {
    let max_allowed_lines = (approx_line_limit as f64 * 1.20) as usize;

    let mut large: Vec<MergeGroup> = Vec::new();
    let mut small: Vec<MergeGroup> = Vec::new();

    for (content, size) in splits.into_iter().zip(sizes.into_iter()) {
        if size >= approx_line_limit {
            large.push(MergeGroup { splits: vec![content], line_count: size });
        } else {
            small.push(MergeGroup { splits: vec![content], line_count: size });
        }
    }

    if small.is_empty() {
        return large.into_iter().map(|g| g.splits.into_iter().next().unwrap()).collect();
    }

    let mut current = small;
    loop {
        let best_score = score(&current, max_allowed_lines);
        let mut best_pair: Option<(usize, usize, f64)> = None;

        for i in 0..current.len() {
            for j in (i + 1)..current.len() {
                let combined = current[i].line_count + current[j].line_count + 1;
                if combined > max_allowed_lines {
                    continue;
                }

                let mut candidate: Vec<MergeGroup> = Vec::with_capacity(current.len() - 1);
                let mut merged_splits = current[i].splits.clone();
                merged_splits.extend(current[j].splits.clone());
                candidate.push(MergeGroup { splits: merged_splits, line_count: combined });
                for (k, group) in current.iter().enumerate() {
                    if k != i && k != j {
                        candidate.push(MergeGroup { splits: group.splits.clone(), line_count: group.line_count });
                    }
                }

                let candidate_score = score(&candidate, max_allowed_lines);
                let is_better = match best_pair {
                    Some((_, _, s)) => candidate_score < s,
                    None => candidate_score < best_score,
                };
                if is_better {
                    best_pair = Some((i, j, candidate_score));
                }
            }
        }

        match best_pair {
            Some((i, j, new_score)) if new_score < best_score => {
                let (lo, hi) = (i.min(j), i.max(j));
                let removed = current.remove(hi);
                let combined_lines = current[lo].line_count + removed.line_count + 1;
                current[lo].splits.extend(removed.splits);
                current[lo].line_count = combined_lines;
                tracing::debug!(groups = current.len(), score = new_score, "diffsplit: merged two groups");
            }
            _ => break,
        }
    }

    large
        .into_iter()
        .chain(current)
        .map(|g| {
            if g.splits.len() == 1 {
                g.splits.into_iter().next().unwrap()
            } else {
                g.splits.join("\n")
            }
        })
        .collect()
}
