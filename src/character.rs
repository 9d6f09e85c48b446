//! Character-state table: per-sample site states used to match redundant samples.

use std::collections::BTreeMap;

use crate::io::Table;

/// Ordered map from sample id to its per-site character states.
///
/// Only the concatenated lookup string matters downstream: two samples are redundant
/// copies of each other iff their lookup strings are identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterTable {
    states: BTreeMap<String, Vec<String>>,
}

impl CharacterTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row of `table` becomes one sample; every column one site.
    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        let mut out = Self::new();
        for (sample, row) in table.rows() {
            out.insert(sample, row.iter().map(String::as_str));
        }
        out
    }

    /// Insert (or replace) the states of `sample`.
    pub fn insert<I, S>(&mut self, sample: &str, states: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let states = states.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.states.insert(sample.to_string(), states);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn contains(&self, sample: &str) -> bool {
        self.states.contains_key(sample)
    }

    /// Sample ids in ascending order.
    pub fn samples(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    #[must_use]
    pub fn states(&self, sample: &str) -> Option<&[String]> {
        self.states.get(sample).map(Vec::as_slice)
    }

    /// Site states concatenated without a separator.
    ///
    /// States are joined verbatim, so `["1", "23"]` and `["12", "3"]` collide; tables with
    /// multi-character states should be written with fixed-width encodings.
    #[must_use]
    pub fn lookup_key(&self, sample: &str) -> Option<String> {
        self.states.get(sample).map(|s| s.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_concatenates_states() {
        let mut t = CharacterTable::new();
        t.insert("s1", ["0", "12", "-"]);
        assert_eq!(t.lookup_key("s1").as_deref(), Some("012-"));
        assert_eq!(t.lookup_key("nope"), None);
    }

    #[test]
    fn samples_are_sorted() {
        let mut t = CharacterTable::new();
        t.insert("b", ["1"]);
        t.insert("a", ["1"]);
        t.insert("c", ["1"]);
        assert_eq!(t.samples().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn from_table_keeps_site_order() {
        let table = Table::parse("cell\tr1\tr2\tr3\ns1\t1\t0\t2\ns2\t1\t0\t2\n".as_bytes()).unwrap();
        let t = CharacterTable::from_table(&table);
        assert_eq!(t.states("s1").unwrap(), &["1", "0", "2"]);
        assert_eq!(t.lookup_key("s1"), t.lookup_key("s2"));
    }
}
