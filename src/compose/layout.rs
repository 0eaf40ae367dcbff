/// Greedy word wrap. `measure` returns the rendered width of a candidate
/// line; a word that alone exceeds `max_width` keeps its own line.
pub(crate) fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let tokens = tokenize_text(text);
    wrap_tokens(&tokens, max_width, measure)
}

fn wrap_tokens<F>(tokens: &[String], max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut result = Vec::new();
    let mut current = String::new();

    for token in tokens {
        if token == "\n" {
            if !current.trim().is_empty() {
                result.push(current.trim_end().to_string());
            }
            current.clear();
            continue;
        }
        if token.is_empty() {
            continue;
        }
        if token == " " {
            if !current.ends_with(' ') && !current.is_empty() {
                current.push(' ');
            }
            continue;
        }
        if !current.trim().is_empty() {
            let candidate = format!("{}{}", current, token);
            if measure(candidate.trim_end()) > max_width {
                result.push(current.trim_end().to_string());
                current.clear();
            }
        }
        current.push_str(token);
    }

    if !current.trim().is_empty() {
        result.push(current.trim_end().to_string());
    }
    result
}

fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
    )
}

fn tokenize_text(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch == '\n' || ch.is_whitespace() || is_cjk(ch) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(match ch {
                '\n' => "\n".to_string(),
                _ if ch.is_whitespace() => " ".to_string(),
                _ => ch.to_string(),
            });
            continue;
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
