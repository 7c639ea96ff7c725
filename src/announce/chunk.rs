//! Splitting of long messages into sendable chunks.

/// Splits `body` into chunks of at most `limit` characters.
///
/// Chunks break between blocks (blank line separated) when possible, then
/// between lines, and only cut inside a line that is longer than `limit`.
pub fn split_message(body: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = vec![];
    let mut current = String::new();

    for block in body.split("\n\n").filter(|block| !block.trim().is_empty()) {
        if fits(&current, block, "\n\n", limit) {
            push_with(&mut current, block, "\n\n");
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if char_len(block) <= limit {
            current.push_str(block);
            continue;
        }

        for line in block.lines() {
            if fits(&current, line, "\n", limit) {
                push_with(&mut current, line, "\n");
                continue;
            }
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut pieces = hard_split(line, limit);
            if let Some(last) = pieces.pop() {
                chunks.extend(pieces);
                current = last;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn fits(current: &str, addition: &str, separator: &str, limit: usize) -> bool {
    let separator_len = if current.is_empty() { 0 } else { separator.len() };
    char_len(current) + separator_len + char_len(addition) <= limit
}

fn push_with(current: &mut String, addition: &str, separator: &str) {
    if !current.is_empty() {
        current.push_str(separator);
    }
    current.push_str(addition);
}

fn hard_split(line: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    chars
        .chunks(limit)
        .map(|piece| piece.iter().collect())
        .collect()
}
