/// A byte range of a post body, `start..end`, plus the value it denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub value: String,
}

/// Finds hashtags: a `#` followed by at least one non-whitespace character,
/// running until whitespace or the end of the text. The value excludes the `#`.
pub fn hashtag_spans(s: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    let mut close = |start: &mut Option<usize>, end: usize| {
        if let Some(begin) = start.take() {
            // At least one character after the '#'
            if end - begin > 1 {
                spans.push(Span {
                    start: begin,
                    end,
                    value: s[begin + 1..end].to_string(),
                });
            }
        }
    };

    for (i, c) in s.char_indices() {
        if c == '#' {
            start = Some(i);
        } else if c.is_whitespace() {
            close(&mut start, i);
        }
    }
    close(&mut start, s.len());

    spans
}

/// Finds whitespace-delimited words starting with `https://`.
pub fn link_spans(s: &str) -> Vec<Span> {
    words_with_offsets(s)
        .filter(|(_, word)| word.starts_with("https://"))
        .map(|(start, word)| Span {
            start,
            end: start + word.len(),
            value: word.to_string(),
        })
        .collect()
}

fn words_with_offsets(s: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(begin)) => {
                words.push((begin, &s[begin..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(begin) = start {
        words.push((begin, &s[begin..]));
    }
    words.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashtags() {
        let text = "news\n#NixOS #Nix #HomeManager";
        let tags: Vec<_> = hashtag_spans(text).into_iter().map(|s| s.value).collect();
        assert_eq!(tags, vec!["NixOS", "Nix", "HomeManager"]);

        let spans = hashtag_spans(text);
        assert_eq!(&text[spans[0].start..spans[0].end], "#NixOS");
        assert_eq!(spans[2].end, text.len());
    }

    #[test]
    fn test_lone_hash_is_not_a_tag() {
        assert!(hashtag_spans("a # b #").is_empty());
    }

    #[test]
    fn test_hashtag_offsets_are_bytes() {
        let text = "über #Tag";
        let spans = hashtag_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start, 6);
        assert_eq!(&text[spans[0].start..spans[0].end], "#Tag");
    }

    #[test]
    fn test_links() {
        let text = "see https://example.com/a and https://example.com/a again http://plain.org";
        let spans = link_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].value, "https://example.com/a");
        assert_eq!(&text[spans[1].start..spans[1].end], "https://example.com/a");
        assert!(spans[1].start > spans[0].start);
    }
}
