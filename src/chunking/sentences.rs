const ABBREVIATIONS: &[&str] = &[
    "no", "nos", "rs", "inr", "dr", "mr", "mrs", "ms", "st", "jr", "sr", "co", "ltd", "inc",
    "pvt", "corp", "sec", "secs", "cl", "art", "vol", "fig", "p", "pp", "para", "viz", "vs",
    "e.g", "i.e", "approx", "max", "min", "govt", "dept", "u.s",
];

/// Splits text into sentences on terminal punctuation. A lone list marker such
/// as `1.` or `a)` never ends a sentence, and opens a new one when it follows
/// punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let words = text.split_whitespace().collect::<Vec<&str>>();
    let mut sentences = Vec::<String>::new();
    let mut current = Vec::<&str>::new();

    for (index, &word) in words.iter().enumerate() {
        let next = words.get(index + 1).copied();

        let opens_list_item = looks_like_marker(word)
            && current
                .last()
                .map(|previous| previous.ends_with(['.', ':', ';', '!', '?']))
                .unwrap_or(false);
        if opens_list_item {
            sentences.push(current.join(" "));
            current.clear();
        }

        current.push(word);

        let Some(next) = next else {
            continue;
        };

        if current.len() == 1 && looks_like_marker(word) {
            continue;
        }

        if ends_sentence(word) && opens_sentence(next) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    sentences
}

fn ends_sentence(word: &str) -> bool {
    let stripped = word.trim_end_matches(['"', '\'', ')', ']', '\u{201d}', '\u{2019}']);
    let Some(last) = stripped.chars().last() else {
        return false;
    };

    match last {
        '!' | '?' => true,
        '.' => !is_abbreviation(stripped),
        _ => false,
    }
}

fn opens_sentence(word: &str) -> bool {
    word.chars()
        .next()
        .map(|character| {
            character.is_uppercase()
                || character.is_ascii_digit()
                || matches!(character, '"' | '(' | '[' | '\u{201c}')
        })
        .unwrap_or(false)
}

fn is_abbreviation(word: &str) -> bool {
    let bare = word
        .trim_start_matches(['(', '"', '\''])
        .trim_end_matches('.')
        .to_lowercase();
    if bare.is_empty() {
        return true;
    }

    let mut characters = bare.chars();
    if let (Some(first), None) = (characters.next(), characters.next()) {
        return first.is_alphabetic();
    }

    ABBREVIATIONS.contains(&bare.as_str())
}

/// `1.`, `2.1.`, `a)`, `(iv)`, `iv.` standing alone as a word.
pub(super) fn looks_like_marker(word: &str) -> bool {
    let inner = word.strip_prefix('(').unwrap_or(word);
    let (body, terminator) = match inner.char_indices().last() {
        Some((index, character @ ('.' | ')'))) => (&inner[..index], character),
        _ => return false,
    };
    if body.is_empty() || body.len() > 6 {
        return false;
    }
    if word.starts_with('(') && terminator != ')' {
        return false;
    }

    let numeric = body
        .split('.')
        .all(|part| !part.is_empty() && part.chars().all(|character| character.is_ascii_digit()));
    let lettered = body.chars().count() == 1
        && body
            .chars()
            .all(|character| character.is_ascii_lowercase())
        && terminator == ')';
    let roman = body
        .chars()
        .all(|character| matches!(character.to_ascii_lowercase(), 'i' | 'v' | 'x'));

    numeric || lettered || roman
}
