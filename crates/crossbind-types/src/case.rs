//! Identifier case conversions shared by the loader and both emitters.

fn words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in input.chars() {
        if !ch.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_ascii_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Uppercases the first character and leaves the rest alone.
pub fn cap(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `read-file`, `read_file` and `readFile` all become `ReadFile`.
pub fn pascal(input: &str) -> String {
    words(input).iter().map(|w| cap(w)).collect()
}

/// `readFile` and `read-file` both become `read_file`.
pub fn snake(input: &str) -> String {
    words(input)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(cap("readFile"), "ReadFile");
        assert_eq!(pascal("read-file"), "ReadFile");
        assert_eq!(pascal("node_fs"), "NodeFs");
        assert_eq!(pascal("utf8"), "Utf8");
        assert_eq!(snake("readFile"), "read_file");
        assert_eq!(snake("fdSet"), "fd_set");
        assert_eq!(snake("with-dashes"), "with_dashes");
        assert_eq!(snake("already_snake"), "already_snake");
    }
}
