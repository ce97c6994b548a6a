//! Truncation for log lines
//!
//! Collaborator replies and engine output can be long; logs keep the head and
//! the tail and note how much was cut. Cuts always fall on UTF-8 boundaries.

const APPROX_BYTES_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncationPolicy {
    Bytes(usize),
    Tokens(usize),
}

impl TruncationPolicy {
    pub fn byte_budget(&self) -> usize {
        match self {
            TruncationPolicy::Bytes(b) => *b,
            TruncationPolicy::Tokens(t) => t.saturating_mul(APPROX_BYTES_PER_TOKEN),
        }
    }
}

/// Largest char boundary not after `index`.
fn floor_boundary(text: &str, index: usize) -> usize {
    (0..=index.min(text.len()))
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0)
}

/// Smallest char boundary not before `index`.
fn ceil_boundary(text: &str, index: usize) -> usize {
    (index..=text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len())
}

pub fn truncate_text(content: &str, policy: TruncationPolicy) -> String {
    let budget = policy.byte_budget();
    if content.len() <= budget {
        return content.to_string();
    }
    if budget == 0 {
        return format!("[{} bytes omitted]", content.len());
    }

    let head_end = floor_boundary(content, budget / 2);
    let tail_start = ceil_boundary(content, content.len() - budget / 2).max(head_end);
    let omitted = tail_start - head_end;

    format!(
        "{} [... {} bytes omitted ...] {}",
        &content[..head_end],
        omitted,
        &content[tail_start..]
    )
}
