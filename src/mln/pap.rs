use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// One row of a wordlist: a word attested for a taxon, assigned to a cognate
/// set within a concept.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Row {
    pub taxon: String,
    pub cogid: String,
    pub concept: String,
}

/// A lexicostatistical wordlist reduced to the columns the analysis needs.
#[derive(Clone, Debug, Default)]
pub struct Wordlist {
    pub rows: Vec<Row>,
}

/// Tab-separated wordlist files: comment lines start with `#` or `@`, the
/// first data line is a header naming (at least) the `taxon`, `cogid` and
/// `concept` columns in any order.
impl FromStr for Wordlist {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lines = s.lines().filter(|l| {
            let l = l.trim();
            !l.is_empty() && !l.starts_with('#') && !l.starts_with('@')
        });
        let header = lines.next().ok_or("empty wordlist")?;
        let columns: Vec<String> = header
            .split('\t')
            .map(|c| c.trim().to_lowercase())
            .collect();
        let position = |names: &[&str]| {
            columns.iter().position(|c| names.contains(&c.as_str()))
        };
        let taxon = position(&["taxon", "taxa", "doculect", "language"])
            .ok_or("wordlist has no taxon column")?;
        let cogid = position(&["cogid"])
            .ok_or("wordlist has no cogid column")?;
        let concept = position(&["concept", "gloss"])
            .ok_or("wordlist has no concept column")?;

        let mut rows = Vec::new();
        for line in lines {
            let cells: Vec<&str> = line.split('\t').collect();
            let cell = |i: usize| {
                cells.get(i).map(|c| c.trim().to_string()).ok_or_else(|| {
                    format!("short wordlist row: {}", line)
                })
            };
            rows.push(Row {
                taxon: cell(taxon)?,
                cogid: cell(cogid)?,
                concept: cell(concept)?,
            });
        }
        Ok(Wordlist { rows })
    }
}

/// The presence-absence profiles of a dataset: one binary vector per
/// character (cognate set within a concept), aligned to a canonical taxon
/// order. Characters are keyed `"{cogid}:{concept}"` and stored in key
/// order, so character ids enumerate the keys lexicographically.
#[derive(Clone, Debug, Default)]
pub struct PapIndex {
    /// canonical taxon order
    pub taxa: Vec<String>,
    /// character keys; the position of a key is the character id
    pub keys: Vec<String>,
    /// per-character profiles over the taxon order
    pub paps: Vec<Vec<u8>>,
    /// characters attested in exactly one taxon, excluded from inference
    pub singletons: Vec<usize>,
    /// characters that take part in inference
    pub cogs: Vec<usize>,
}

impl PapIndex {
    pub fn new(wordlist: &Wordlist) -> PapIndex {
        let taxa: Vec<String> = wordlist
            .rows
            .iter()
            .map(|r| r.taxon.clone())
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect();
        let index: BTreeMap<&str, usize> = taxa
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut profiles: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for row in &wordlist.rows {
            let key = format!("{}:{}", row.cogid, row.concept);
            let pap = profiles
                .entry(key)
                .or_insert_with(|| vec![0; taxa.len()]);
            pap[index[row.taxon.as_str()]] = 1;
        }

        let mut keys = Vec::new();
        let mut paps = Vec::new();
        let mut singletons = Vec::new();
        let mut cogs = Vec::new();
        for (key, pap) in profiles {
            let id = keys.len();
            let ones = pap.iter().filter(|&&p| p >= 1).count();
            match ones {
                0 => warn!("character {} has no positive tips", key),
                1 => singletons.push(id),
                _ => cogs.push(id),
            }
            keys.push(key);
            paps.push(pap);
        }
        PapIndex {
            taxa,
            keys,
            paps,
            singletons,
            cogs,
        }
    }

    /// Total number of characters, singletons included.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, character: usize) -> &str {
        &self.keys[character]
    }

    pub fn pap(&self, character: usize) -> &[u8] {
        &self.paps[character]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDLIST: &str = "\
# test data
ID\tConcept\tCogID\tTaxon
1\thand\t17\ta
2\thand\t17\tb
3\thand\t18\tc
4\tfoot\t17\ta
5\tfoot\t17\tc
6\tfoot\t17\td
";

    #[test]
    fn test_wordlist_parsing() {
        let wordlist: Wordlist = WORDLIST.parse().unwrap();
        assert_eq!(wordlist.rows.len(), 6);
        assert_eq!(wordlist.rows[0].taxon, "a");
        assert_eq!(wordlist.rows[0].cogid, "17");
        assert_eq!(wordlist.rows[0].concept, "hand");
    }

    #[test]
    fn test_missing_column() {
        assert!("ID\tConcept\tCogID\n1\thand\t17\n"
            .parse::<Wordlist>()
            .is_err());
    }

    #[test]
    fn test_profiles() {
        let wordlist: Wordlist = WORDLIST.parse().unwrap();
        let paps = PapIndex::new(&wordlist);
        assert_eq!(paps.taxa, vec!["a", "b", "c", "d"]);
        // keys sorted lexicographically
        assert_eq!(paps.keys, vec!["17:foot", "17:hand", "18:hand"]);
        assert_eq!(paps.pap(0), &[1, 0, 1, 1]);
        assert_eq!(paps.pap(1), &[1, 1, 0, 0]);
        assert_eq!(paps.pap(2), &[0, 0, 1, 0]);
        assert_eq!(paps.singletons, vec![2]);
        assert_eq!(paps.cogs, vec![0, 1]);
    }
}
