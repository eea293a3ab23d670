//! Highlight extraction: the most keyword-dense sentences of a result body.

/// Highlights returned per result.
pub const MAX_HIGHLIGHTS: usize = 3;

/// Sentences shorter than this (in characters) are never highlighted.
pub const MIN_SENTENCE_CHARS: usize = 20;

/// Highlights longer than this are cut at a word boundary.
pub const MAX_HIGHLIGHT_CHARS: usize = 200;

/// Abbreviations whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "vs.", "etc.", "e.g.", "i.e.",
    "approx.", "no.", "vol.", "fig.", "inc.", "ltd.", "co.", "corp.", "u.s.", "u.k.", "jan.",
    "feb.", "mar.", "apr.", "jun.", "jul.", "aug.", "sep.", "sept.", "oct.", "nov.", "dec.",
];

/// Pick up to [`MAX_HIGHLIGHTS`] sentences of `text` that best match `keywords`.
///
/// Keywords are matched case-insensitively. Repeated hits of one keyword
/// inside a sentence earn a smaller bonus. Ties keep text order.
pub fn extract_highlights(text: &str, keywords: &[String]) -> Vec<String> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    let mut scored: Vec<(f64, usize, String)> = split_sentences(text)
        .into_iter()
        .enumerate()
        .filter(|(_, sentence)| sentence.chars().count() >= MIN_SENTENCE_CHARS)
        .map(|(position, sentence)| (sentence_score(&sentence, &keywords), position, sentence))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(MAX_HIGHLIGHTS)
        .map(|(_, _, sentence)| truncate_at_word(&sentence, MAX_HIGHLIGHT_CHARS))
        .collect()
}

fn sentence_score(sentence: &str, keywords: &[String]) -> f64 {
    let lower = sentence.to_lowercase();
    keywords
        .iter()
        .map(|keyword| match lower.matches(keyword.as_str()).count() {
            0 => 0.0,
            hits => 1.0 + 0.5 * (hits - 1) as f64,
        })
        .sum()
}

/// Split text into sentences.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace and a capital
/// letter, at a blank line, or at the end of the text. Periods of known
/// abbreviations and single-letter initials do not end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut paragraph = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            split_paragraph(&paragraph, &mut sentences);
            paragraph.clear();
        } else {
            if !paragraph.is_empty() {
                paragraph.push(' ');
            }
            paragraph.push_str(line.trim());
        }
    }
    split_paragraph(&paragraph, &mut sentences);
    sentences
}

fn split_paragraph(paragraph: &str, out: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            i += 1;
            continue;
        }

        // Swallow runs like "?!" or closing quotes and brackets.
        let mut j = i + 1;
        while j < chars.len() && matches!(chars[j].1, '.' | '!' | '?' | '"' | '\'' | ')' | '”') {
            j += 1;
        }
        let mut k = j;
        while k < chars.len() && chars[k].1.is_whitespace() {
            k += 1;
        }

        let boundary = k > j
            && k < chars.len()
            && chars[k].1.is_uppercase()
            && !(c == '.' && ends_with_abbreviation(&paragraph[start..pos + 1]));
        if boundary {
            let end = chars[j].0;
            push_sentence(&paragraph[start..end], out);
            start = chars[k].0;
            i = k;
        } else {
            i = j;
        }
    }
    push_sentence(&paragraph[start..], out);
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let Some(token) = segment.split_whitespace().last() else {
        return false;
    };
    let token = token.trim_start_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
    if ABBREVIATIONS.contains(&token.as_str()) {
        return true;
    }
    let mut letters = token.chars();
    matches!((letters.next(), letters.next(), letters.next()), (Some(c), Some('.'), None) if c.is_alphabetic())
}

fn push_sentence(raw: &str, out: &mut Vec<String>) {
    let sentence = raw.trim();
    if !sentence.is_empty() {
        out.push(sentence.to_string());
    }
}

/// Cut `text` to at most `max_chars` characters at a word boundary, appending `…`.
pub fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(index, _)| index);
    let head = &text[..cut];
    let head = match head.rfind(char::is_whitespace) {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    let head = head.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '-'));
    format!("{head}…")
}
