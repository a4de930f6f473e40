//! Character substitution ("leet") expansion.

/// Substitutes for `c`; empty when the character is left alone.
pub fn substitutes(c: char) -> &'static [char] {
    match c {
        'a' | 'A' => &['4', '@'],
        'e' | 'E' => &['3'],
        'i' | 'I' => &['1', '!', '|'],
        'o' | 'O' => &['0'],
        's' | 'S' => &['$', '5'],
        't' | 'T' => &['7'],
        'l' | 'L' => &['1'],
        'g' | 'G' => &['9'],
        'b' | 'B' => &['8'],
        _ => &[],
    }
}

/// Number of characters in `word` that have at least one substitute.
pub fn substitutable_positions(word: &str) -> usize {
    word.chars().filter(|&c| !substitutes(c).is_empty()).count()
}

/// Every combination of keeping or substituting each character of `word`.
///
/// The unmodified word comes first. A word with k substitutable characters
/// having r_1..r_k alternatives yields exactly the product of (r_i + 1)
/// strings.
pub fn expand(word: &str) -> Vec<String> {
    expand_limited(word, usize::MAX)
}

/// Like [`expand`], but only the first `max_positions` substitutable
/// characters vary; later ones are kept as written.
pub fn expand_limited(word: &str, max_positions: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    expand_from(&chars, max_positions)
        .into_iter()
        .map(|mut rev| {
            rev.reverse();
            rev.into_iter().collect()
        })
        .collect()
}

// Builds each variant back to front so every branch only pushes onto the
// vectors returned by its own recursive call.
fn expand_from(chars: &[char], budget: usize) -> Vec<Vec<char>> {
    let Some((&first, rest)) = chars.split_first() else {
        return vec![Vec::new()];
    };

    let choices: &[char] = if budget == 0 { &[] } else { substitutes(first) };
    let rest_budget = if choices.is_empty() { budget } else { budget - 1 };
    let tails = expand_from(rest, rest_budget);
    let mut out = Vec::with_capacity(tails.len() * (choices.len() + 1));

    for c in std::iter::once(first).chain(choices.iter().copied()) {
        for tail in &tails {
            let mut variant = tail.clone();
            variant.push(c);
            out.push(variant);
        }
    }
    out
}
