//! Prompt batch parsing

/// Split raw batch text into individual prompts
///
/// Prompts are separated by runs of commas and/or newlines; each piece is
/// trimmed and empty pieces are dropped.
pub fn split_prompts(raw: &str) -> Vec<String> {
    raw.split(|c| c == ',' || c == '\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("a, b,, c\n" => vec!["a", "b", "c"]; "mixed separators")]
    #[test_case("warm key light" => vec!["warm key light"]; "single prompt")]
    #[test_case("  rim light \n\n\n blue fill  " => vec!["rim light", "blue fill"]; "newline runs")]
    #[test_case("neon, sunset\r\nstorm" => vec!["neon", "sunset", "storm"]; "crlf input")]
    #[test_case("" => Vec::<String>::new(); "empty")]
    #[test_case(" ,\n , " => Vec::<String>::new(); "only separators")]
    fn test_split_prompts(raw: &str) -> Vec<String> {
        split_prompts(raw)
    }

    #[test]
    fn test_split_preserves_order() {
        assert_eq!(
            split_prompts("three,one,two"),
            vec!["three".to_string(), "one".to_string(), "two".to_string()]
        );
    }
}
