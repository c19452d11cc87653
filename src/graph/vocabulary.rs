use smol_str::SmolStr;
use std::collections::HashMap;

/// Ordered set of vertex labels shared by every graph taking part in one matching run.
///
/// Neighborhood histograms are dense vectors indexed through the vocabulary, so two
/// graphs can only be compared when their signatures were built from the same instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<SmolStr>,
    index: HashMap<SmolStr, usize>,
}

impl LabelVocabulary {
    /// Builds a vocabulary from arbitrary labels; duplicates collapse, order is lexicographic.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let mut labels: Vec<SmolStr> = labels.into_iter().map(Into::into).collect();
        labels.sort_unstable();
        labels.dedup();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self { labels, index }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn labels(&self) -> &[SmolStr] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Reports whether every label in `labels` is known.
    pub fn covers<'a>(&self, mut labels: impl Iterator<Item = &'a str>) -> bool {
        labels.all(|label| self.index.contains_key(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_sorted_and_deduplicated() {
        let vocab = LabelVocabulary::from_labels(["O", "C", "N", "C", "O"]);
        assert_eq!(vocab.labels(), &["C", "N", "O"]);
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.index_of("N"), Some(1));
        assert_eq!(vocab.index_of("S"), None);
    }

    #[test]
    fn covers_checks_every_label() {
        let vocab = LabelVocabulary::from_labels(["C", "N"]);
        assert!(vocab.covers(["C", "N", "C"].into_iter()));
        assert!(!vocab.covers(["C", "O"].into_iter()));
    }
}
