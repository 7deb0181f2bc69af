use std::ops::Range;

use crate::cue::Cue;

/// Contiguous run of cues translated as one sentence
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceGroup {
    /// Position in traversal order
    pub index: usize,
    /// Cue indices belonging to this group
    pub cues: Range<usize>,
    /// Cue texts joined with single spaces
    pub text: String,
}

/// Sentence groups plus the reverse lookup from cue index to group index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segmentation {
    pub groups: Vec<SentenceGroup>,
    pub cue_groups: Vec<usize>,
}

impl Segmentation {
    pub fn texts(&self) -> Vec<&str> {
        self.groups.iter().map(|group| group.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Cue indices that close a sentence, including the final cue
pub fn sentence_boundaries(cues: &[Cue]) -> Vec<usize> {
    let mut boundaries: Vec<usize> = cues
        .iter()
        .enumerate()
        .filter(|(_, cue)| cue.ends_sentence())
        .map(|(idx, _)| idx)
        .collect();

    if let Some(last) = cues.len().checked_sub(1) {
        if boundaries.last() != Some(&last) {
            boundaries.push(last);
        }
    }

    boundaries
}

/// Group cues into sentences at their boundaries
pub fn segment(cues: &[Cue]) -> Segmentation {
    let mut groups = Vec::new();
    let mut cue_groups = Vec::with_capacity(cues.len());
    let mut start = 0;

    for (index, boundary) in sentence_boundaries(cues).into_iter().enumerate() {
        let range = start..boundary + 1;
        let text = cues[range.clone()]
            .iter()
            .map(|cue| cue.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        cue_groups.extend(std::iter::repeat(index).take(range.len()));
        groups.push(SentenceGroup { index, cues: range, text });
        start = boundary + 1;
    }

    Segmentation { groups, cue_groups }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(texts: &[&str]) -> Vec<Cue> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Cue::timed(i as f64, i as f64 + 1.0, *text))
            .collect()
    }

    #[test]
    fn test_boundaries_at_sentence_ends_and_tail() {
        let cues = cues(&["Hello", "world.", "This is", "a test.", "Trailing"]);
        assert_eq!(sentence_boundaries(&cues), vec![1, 3, 4]);
    }

    #[test]
    fn test_no_duplicate_tail_boundary() {
        let cues = cues(&["One.", "Two."]);
        assert_eq!(sentence_boundaries(&cues), vec![0, 1]);
        assert!(sentence_boundaries(&[]).is_empty());
    }

    #[test]
    fn test_mid_string_period_is_not_a_boundary() {
        let cues = cues(&["Version 2.0 is", "out now."]);
        assert_eq!(sentence_boundaries(&cues), vec![1]);
    }

    #[test]
    fn test_every_cue_in_exactly_one_contiguous_group() {
        let cues = cues(&["a", "b.", "c.", "d", "e", "f.", "g"]);
        let segmentation = segment(&cues);

        assert_eq!(segmentation.cue_groups, vec![0, 0, 1, 2, 2, 2, 3]);

        let mut next = 0;
        for (idx, group) in segmentation.groups.iter().enumerate() {
            assert_eq!(group.index, idx);
            assert_eq!(group.cues.start, next);
            next = group.cues.end;
        }
        assert_eq!(next, cues.len());

        assert_eq!(segmentation.groups[0].text, "a b.");
        assert_eq!(segmentation.groups[2].text, "d e f.");
        assert_eq!(segmentation.groups[3].text, "g");
    }

    #[test]
    fn test_empty_input() {
        let segmentation = segment(&[]);
        assert!(segmentation.is_empty());
        assert!(segmentation.cue_groups.is_empty());
    }
}
