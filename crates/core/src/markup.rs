//! Inline vocabulary markup for card text.
//!
//! A tagged span is written between two `#` characters:
//! `There are schools #all around the world#.` There is no nesting and no way
//! to write a literal `#`. Offsets reported by [`decode_annotations`] are char
//! positions in the text with the delimiters removed, i.e. what the reader sees.

use std::iter::Enumerate;
use std::str::Split;

use serde::Serialize;
use thiserror::Error;

/// Delimiter that opens and closes a tagged span.
pub const DELIMITER: char = '#';

/// CSS class placed on the wrapper emitted by [`render`].
pub const NEW_WORD_CLASS: &str = "new-word";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarkupError {
    /// An odd number of delimiters: the last one never closes.
    #[error("unterminated `#` tag opened at char {offset}")]
    Unterminated { offset: usize },
}

/// One tagged span, located in the delimiter-stripped text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Annotation<'a> {
    /// Inclusive start char offset.
    pub start: usize,
    /// Exclusive end char offset.
    pub end: usize,
    pub text: &'a str,
}

impl Annotation<'_> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Lazy left-to-right sequence of the annotations in a card text.
///
/// Cloning the iterator before it is consumed gives an independent restart point.
#[derive(Debug, Clone)]
pub struct Annotations<'a> {
    parts: Enumerate<Split<'a, char>>,
    offset: usize,
}

impl<'a> Annotations<'a> {
    /// A sequence with no annotations.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parts: "".split(DELIMITER).enumerate(),
            offset: 0,
        }
    }
}

impl<'a> Iterator for Annotations<'a> {
    type Item = Annotation<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for (index, part) in self.parts.by_ref() {
            let len = part.chars().count();
            let start = self.offset;
            self.offset += len;
            // Odd split positions sit between an opening and a closing delimiter.
            if index % 2 == 1 {
                return Some(Annotation {
                    start,
                    end: self.offset,
                    text: part,
                });
            }
        }
        None
    }
}

/// Validate the delimiters in `text` and return its annotations.
///
/// # Errors
///
/// Returns `MarkupError::Unterminated` if `text` contains an odd number of `#`.
pub fn decode_annotations(text: &str) -> Result<Annotations<'_>, MarkupError> {
    check_balanced(text)?;
    Ok(Annotations {
        parts: text.split(DELIMITER).enumerate(),
        offset: 0,
    })
}

/// Remove the delimiters, keeping every other character.
///
/// Span boundaries are lost; keep the original text if they are needed later.
///
/// # Errors
///
/// Returns `MarkupError::Unterminated` if `text` contains an odd number of `#`.
pub fn strip(text: &str) -> Result<String, MarkupError> {
    check_balanced(text)?;
    Ok(text.split(DELIMITER).collect())
}

/// Render card text as HTML, wrapping each tagged span in a styled `<span>`.
///
/// Both tagged and untagged text are escaped before they reach the output.
///
/// # Errors
///
/// Returns `MarkupError::Unterminated` if `text` contains an odd number of `#`.
pub fn render(text: &str) -> Result<String, MarkupError> {
    check_balanced(text)?;
    let mut builder = MarkupBuilder::with_capacity(text.len());
    for (index, part) in text.split(DELIMITER).enumerate() {
        if index % 2 == 1 {
            builder.push_new_word(part);
        } else {
            builder.push_text(part);
        }
    }
    Ok(builder.finish())
}

/// Incrementally assembles escaped display markup.
#[derive(Debug, Default)]
pub struct MarkupBuilder {
    out: String,
}

impl MarkupBuilder {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity),
        }
    }

    /// Append a plain run of text.
    pub fn push_text(&mut self, text: &str) -> &mut Self {
        self.out.push_str(&html_escape::encode_text(text));
        self
    }

    /// Append a highlighted vocabulary run.
    pub fn push_new_word(&mut self, text: &str) -> &mut Self {
        self.out.push_str("<span class=\"");
        self.out.push_str(NEW_WORD_CLASS);
        self.out.push_str("\">");
        self.out.push_str(&html_escape::encode_text(text));
        self.out.push_str("</span>");
        self
    }

    #[must_use]
    pub fn finish(self) -> String {
        self.out
    }
}

fn check_balanced(text: &str) -> Result<(), MarkupError> {
    let mut count = 0usize;
    let mut last = 0usize;
    for (offset, ch) in text.chars().enumerate() {
        if ch == DELIMITER {
            count += 1;
            last = offset;
        }
    }
    if count % 2 == 1 {
        return Err(MarkupError::Unterminated { offset: last });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<(usize, usize, &str)> {
        decode_annotations(text)
            .unwrap()
            .map(|a| (a.start, a.end, a.text))
            .collect()
    }

    #[test]
    fn decodes_offsets_against_stripped_text() {
        let text = "Is your school #big# or #little#?";
        assert_eq!(spans(text), vec![(15, 18, "big"), (22, 28, "little")]);

        let plain = strip(text).unwrap();
        assert_eq!(plain, "Is your school big or little?");
        let chars: Vec<char> = plain.chars().collect();
        for (start, end, surface) in spans(text) {
            let slice: String = chars[start..end].iter().collect();
            assert_eq!(slice, surface);
        }
    }

    #[test]
    fn decodes_span_at_start_and_multiword() {
        assert_eq!(
            spans("#There are# big schools."),
            vec![(0, 9, "There are")]
        );
        assert_eq!(
            spans("There are schools #all around the world#."),
            vec![(18, 38, "all around the world")]
        );
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        assert_eq!(spans("café #thé# ok"), vec![(5, 8, "thé")]);
    }

    #[test]
    fn spans_are_increasing_and_disjoint() {
        let text = "#a# b #cd# e #f# #g#";
        let found = spans(text);
        assert_eq!(found.len(), 4);
        for pair in found.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
            assert!(pair[0].0 < pair[1].0);
        }
    }

    #[test]
    fn odd_delimiters_are_rejected() {
        let err = decode_annotations("Is your school #big or little?").unwrap_err();
        assert_eq!(err, MarkupError::Unterminated { offset: 15 });
        assert!(decode_annotations("#a# #b").is_err());
        assert!(render("#").is_err());
        assert!(strip("a#").is_err());
    }

    #[test]
    fn text_without_tags_has_no_annotations() {
        assert_eq!(decode_annotations("plain text").unwrap().count(), 0);
        assert_eq!(render("Plain123").unwrap(), "Plain123");
        assert_eq!(render("").unwrap(), "");
    }

    #[test]
    fn empty_span_is_reported_with_zero_length() {
        let found: Vec<_> = decode_annotations("a ## b").unwrap().collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].is_empty());
        assert_eq!(found[0].start, 2);
    }

    #[test]
    fn iterator_can_be_restarted_from_a_clone() {
        let fresh = decode_annotations("#New# or #old#?").unwrap();
        let first: Vec<_> = fresh.clone().collect();
        let second: Vec<_> = fresh.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn render_wraps_tagged_spans_and_keeps_whitespace() {
        let html = render("Is your school  #big#\tor #little#?").unwrap();
        assert_eq!(
            html,
            "Is your school  <span class=\"new-word\">big</span>\tor \
             <span class=\"new-word\">little</span>?"
        );
    }

    #[test]
    fn render_escapes_markup_significant_characters() {
        let html = render("1 < 2 & #<b>bold</b>#").unwrap();
        assert_eq!(
            html,
            "1 &lt; 2 &amp; <span class=\"new-word\">&lt;b&gt;bold&lt;/b&gt;</span>"
        );
    }
}
