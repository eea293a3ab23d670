//! Decomposition of the reasoning segment into titled steps.

use serde::Serialize;
use threadlens_search::highlight::{split_sentences, truncate_at_word};

/// Synthetic steps built from plain paragraphs never exceed this count.
pub const MAX_SYNTHETIC_STEPS: usize = 4;

/// Paragraph grouping starts at this many paragraphs.
pub const MIN_PARAGRAPHS_FOR_GROUPING: usize = 3;

/// Synthetic step titles are cut at a word boundary beyond this length.
pub const MAX_TITLE_CHARS: usize = 80;

/// Section titles that introduce the answer rather than a reasoning step.
const ANSWER_HEADINGS: &[&str] = &[
    "answer",
    "final answer",
    "conclusion",
    "in conclusion",
    "summary",
    "tl;dr",
    "tldr",
];

/// One titled step of the model's reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasoningStep {
    pub title: String,
    pub content: String,
}

/// Break reasoning text into ordered steps.
///
/// Tried in order: `Step N` headers (or bare `N.` / `N)` headers when no
/// `Step` header exists), then markdown headings other than answer or
/// conclusion headings, then paragraphs grouped evenly into at most
/// [`MAX_SYNTHETIC_STEPS`] steps. Shorter text becomes a single step and
/// empty text yields none.
pub fn decompose_steps(reasoning: &str) -> Vec<ReasoningStep> {
    let reasoning = reasoning.trim();
    if reasoning.is_empty() {
        return Vec::new();
    }
    let lines: Vec<&str> = reasoning.lines().collect();

    let explicit: Vec<Header> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| numbered_header(line, true).map(|h| h.at(index)))
        .collect();
    if !explicit.is_empty() {
        return sections(&lines, &explicit);
    }

    let bare: Vec<Header> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| numbered_header(line, false).map(|h| h.at(index)))
        .collect();
    if !bare.is_empty() {
        return sections(&lines, &bare);
    }

    let headings: Vec<Header> = lines
        .iter()
        .enumerate()
        .filter_map(|(index, line)| markdown_heading(line).map(|h| h.at(index)))
        .collect();
    if headings.iter().any(|h| !h.skip) {
        return sections(&lines, &headings);
    }

    paragraph_steps(reasoning)
}

#[derive(Debug, Clone)]
struct Header {
    line: usize,
    title: String,
    skip: bool,
}

impl Header {
    fn new(title: String, skip: bool) -> Self {
        Self {
            line: 0,
            title,
            skip,
        }
    }

    fn at(mut self, line: usize) -> Self {
        self.line = line;
        self
    }
}

// Each header owns the lines up to the next header. Text before the first
// header is not a step.
fn sections(lines: &[&str], headers: &[Header]) -> Vec<ReasoningStep> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| !header.skip)
        .map(|(position, header)| {
            let end = headers
                .get(position + 1)
                .map_or(lines.len(), |next| next.line);
            ReasoningStep {
                title: header.title.clone(),
                content: lines[header.line + 1..end].join("\n").trim().to_string(),
            }
        })
        .collect()
}

/// Parses `Step 3: Title`, `### Step 3 - Title`, `**Step 3.** Title` and,
/// when `require_word` is false, `3. Title` or `3) Title`.
fn numbered_header(line: &str, require_word: bool) -> Option<Header> {
    let rest = line.trim().trim_start_matches('#').trim_start();
    let rest = rest.trim_start_matches('*').trim_start();

    let (number, rest) = if require_word {
        let head = rest.get(..4)?;
        if !head.eq_ignore_ascii_case("step") {
            return None;
        }
        let rest = &rest[4..];
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        leading_number(rest.trim_start())?
    } else {
        let (number, rest) = leading_number(rest)?;
        let rest = rest.strip_prefix(['.', ')'])?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        (number, rest)
    };

    let rest = rest.trim_start_matches('*').trim_start();
    let rest = rest
        .strip_prefix([':', '.', ')', '-', '–', '—'])
        .unwrap_or(rest);
    let title = clean_title(rest);
    let title = if title.is_empty() {
        format!("Step {number}")
    } else {
        title
    };
    Some(Header::new(title, false))
}

fn leading_number(text: &str) -> Option<(u32, &str)> {
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits > 2 {
        return None;
    }
    let number = text[..digits].parse().ok()?;
    Some((number, &text[digits..]))
}

fn markdown_heading(line: &str) -> Option<Header> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let title = clean_title(rest);
    if title.is_empty() {
        return None;
    }
    let normalized = title.to_lowercase();
    let normalized = normalized.trim_end_matches(':');
    let skip = ANSWER_HEADINGS.contains(&normalized);
    Some(Header::new(title, skip))
}

fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == '_')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

fn paragraph_steps(text: &str) -> Vec<ReasoningStep> {
    let paragraphs = paragraphs(text);
    if paragraphs.len() < MIN_PARAGRAPHS_FOR_GROUPING {
        return vec![synthetic_step(&paragraphs)];
    }

    let groups = paragraphs.len().min(MAX_SYNTHETIC_STEPS);
    let base = paragraphs.len() / groups;
    let extra = paragraphs.len() % groups;

    let mut steps = Vec::with_capacity(groups);
    let mut start = 0;
    for group in 0..groups {
        let size = base + usize::from(group < extra);
        steps.push(synthetic_step(&paragraphs[start..start + size]));
        start += size;
    }
    steps
}

fn synthetic_step(group: &[String]) -> ReasoningStep {
    let content = group.join("\n\n");
    let first = group.first().map(String::as_str).unwrap_or_default();
    let sentence = split_sentences(first)
        .into_iter()
        .next()
        .unwrap_or_else(|| first.to_string());
    let sentence = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = truncate_at_word(&sentence, MAX_TITLE_CHARS);
    ReasoningStep {
        title: title.trim_end_matches(['.', ':']).to_string(),
        content,
    }
}
