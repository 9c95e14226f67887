//! Tree-based detection of lexical borrowing.
//!
//! Every cognate character of a dataset is a presence-absence profile over
//! the taxa of a rooted reference tree. The solvers in this module infer a
//! gain-loss scenario per character: an annotation of tree nodes with gain
//! (1) and loss (0) events that reproduces the observed profile on the tips,
//! minimal under either a gain/loss weight ratio or a cap on the number of
//! gains. Characters with several origins are the footprint of borrowing;
//! their origin sets are aggregated into a minimal lateral network by
//! [`network`]. The approach follows the minimal lateral networks of [Nelson-
//! Sathi et al. 2011](https://doi.org/10.1073/pnas.1105113108), with the
//! root-ward tie-breaking suggested by [Mirkin et al.
//! 2003](https://doi.org/10.1186/1471-2148-3-2).

pub mod distribution;
pub mod error;
pub mod network;
pub mod output;
pub mod pap;
pub mod tree;

use error::MlnError;
use log::warn;
use pap::PapIndex;
use rayon::prelude::*;
use std::cmp::{self, Reverse};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tree::Tree;

/// Hard ceiling on the number of candidate histories kept per node. A
/// character that overflows it is reported as exhausted instead of
/// thrashing.
const HISTORY_CEILING: usize = 200_000;

/// An analysis mode: either gain and loss events are weighted by a ratio of
/// positive integers, or the number of gains is capped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    Weighted { gain: u64, loss: u64 },
    Restricted { max_gains: u64 },
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = |p: &str| p.parse::<u64>().ok().filter(|&n| n > 0);
        let parts: Vec<&str> = s.split('-').collect();
        match parts.as_slice() {
            &["w", g, l] => match (number(g), number(l)) {
                (Some(gain), Some(loss)) => Ok(Mode::Weighted { gain, loss }),
                _ => Err(s.to_string()),
            },
            &["r", k] => match number(k) {
                Some(max_gains) => Ok(Mode::Restricted { max_gains }),
                None => Err(s.to_string()),
            },
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Mode::Weighted { gain, loss } => write!(f, "w-{}-{}", gain, loss),
            Mode::Restricted { max_gains } => write!(f, "r-{}", max_gains),
        }
    }
}

/// A gain-loss scenario: the nodes at which a character's state changes,
/// with the new state. States propagate unchanged towards the tips until the
/// next listed node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Gls {
    pub events: Vec<(usize, u8)>,
}

impl Gls {
    /// The nodes at which the character originates.
    pub fn origins(&self) -> Vec<usize> {
        self.events
            .iter()
            .filter(|&&(_, e)| e == 1)
            .map(|&(v, _)| v)
            .collect()
    }

    pub fn number_of_origins(&self) -> usize {
        self.events.iter().filter(|&&(_, e)| e == 1).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `name:event` pairs joined by commas, the on-disk format.
    pub fn render(&self, tree: &Tree) -> String {
        self.events
            .iter()
            .map(|&(v, e)| format!("{}:{}", tree.name(v), e))
            .collect::<Vec<String>>()
            .join(",")
    }
}

/// The scenarios of one mode over all inferred characters, keyed by
/// character id. Exhausted characters stay in the map with an empty
/// scenario so that output and statistics still see them.
#[derive(Clone, Debug)]
pub struct GlsSet {
    pub mode: Mode,
    pub scenarios: BTreeMap<usize, Gls>,
    pub exhausted: Vec<usize>,
    /// mean number of co-optimal scenarios the selector chose from
    pub alternatives: f64,
}

impl GlsSet {
    pub fn average_origins(&self) -> f64 {
        let total: usize = self
            .scenarios
            .values()
            .map(|gls| gls.number_of_origins())
            .sum();
        total as f64 / cmp::max(self.scenarios.len(), 1) as f64
    }

    pub fn maximum_origins(&self) -> usize {
        self.scenarios
            .values()
            .map(|gls| gls.number_of_origins())
            .max()
            .unwrap_or(0)
    }
}

/// Admissibility bound applied to partial histories while combining.
enum Bound {
    Weight { gain: u64, loss: u64, ceiling: u64 },
    Gains { max: u64 },
}

impl Bound {
    /// Whether a history with the given upward state and committed events is
    /// worth keeping. The upward state stands for a pending gain above the
    /// current node.
    fn admits(&self, state: u8, events: &[(usize, u8)]) -> bool {
        let gains = events.iter().filter(|&&(_, e)| e == 1).count() as u64;
        match *self {
            Bound::Weight {
                gain,
                loss,
                ceiling,
            } => {
                let losses = events.len() as u64 - gains;
                let pending = if state == 1 { gain } else { 0 };
                gains * gain + losses * loss + pending <= ceiling
            }
            Bound::Gains { max } => gains + u64::from(state) <= max,
        }
    }
}

/// A dataset bound to its reference tree: the presence-absence profiles with
/// every taxon resolved to a tip of the tree.
pub struct Mln {
    tree: Tree,
    paps: PapIndex,
    taxon_tips: Vec<usize>,
}

impl Mln {
    pub fn new(tree: Tree, paps: PapIndex) -> Result<Mln, MlnError> {
        let mut taxon_tips = Vec::with_capacity(paps.taxa.len());
        for taxon in &paps.taxa {
            match tree.node(taxon) {
                Some(v) if tree.is_tip(v) => taxon_tips.push(v),
                _ => return Err(MlnError::MissingTaxon(taxon.clone())),
            }
        }
        Ok(Mln {
            tree,
            paps,
            taxon_tips,
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn paps(&self) -> &PapIndex {
        &self.paps
    }

    /// The tip node carrying each taxon, in canonical taxon order.
    pub fn taxon_tips(&self) -> &[usize] {
        &self.taxon_tips
    }

    /// Calculate a weighted gain-loss scenario for a profile. Returns the
    /// selected scenario and the number of co-optimal scenarios it was
    /// chosen from.
    pub fn weighted_gls(
        &self,
        pap: &[u8],
        ratio: (u64, u64),
    ) -> Result<(Gls, usize), MlnError> {
        let (gain, loss) = ratio;
        let scenarios = self.evolve(pap, &Mode::Weighted { gain, loss })?;
        Ok(select(scenarios, |events| {
            let gains =
                events.iter().filter(|&&(_, e)| e == 1).count() as u64;
            let losses = events.len() as u64 - gains;
            (gains * gain + losses * loss, gains)
        }))
    }

    /// Calculate a gain-loss scenario under a cap on the number of gains.
    /// The cheapest scenario is the one with the fewest events overall.
    pub fn restricted_gls(
        &self,
        pap: &[u8],
        max_gains: u64,
    ) -> Result<(Gls, usize), MlnError> {
        let scenarios =
            self.evolve(pap, &Mode::Restricted { max_gains })?;
        Ok(select(scenarios, |events| {
            (events.len() as u64, events.len() as u64)
        }))
    }

    /// Bottom-up combination of partial histories over the subtree spanned
    /// by the positive tips.
    ///
    /// Every tip starts with its observed state and an empty event list.
    /// Interior nodes are processed by increasing tip count; for each pair
    /// of child histories the states either agree and propagate upward, or
    /// the stable state propagates and the change event is committed on the
    /// branch that switches. A history whose upward state is 1 while a gain
    /// is already committed below is dropped: the pending gain above would
    /// be redundant with the committed one.
    fn evolve(
        &self,
        pap: &[u8],
        mode: &Mode,
    ) -> Result<Vec<Vec<(usize, u8)>>, MlnError> {
        let positives: Vec<usize> = pap
            .iter()
            .enumerate()
            .filter(|&(_, &p)| p >= 1)
            .map(|(i, _)| self.taxon_tips[i])
            .collect();
        let sub = self
            .tree
            .lca(&positives)
            .ok_or(MlnError::EmptyCharacter)?;
        let tips = self.tree.tips(sub);

        let mut histories: Vec<Vec<(u8, Vec<(usize, u8)>)>> =
            vec![Vec::new(); self.tree.len()];
        let mut present = 0;
        for &tip in &tips {
            // tree leaves without wordlist data count as absences
            let state = match self.taxon_tips.iter().position(|&v| v == tip)
            {
                Some(taxon) if pap[taxon] >= 1 => 1,
                _ => 0,
            };
            present += usize::from(state == 1);
            histories[tip].push((state, Vec::new()));
        }
        // single origin at the root of the subtree covers everything
        if present == tips.len() {
            return Ok(vec![vec![(sub, 1)]]);
        }

        // the ceiling counts the tips the subtree actually spans, data-less
        // tips included: the cheaper of an origin at every positive tip, or
        // a single origin at the root of the subtree plus a loss at every
        // negative tip
        let bound = match *mode {
            Mode::Weighted { gain, loss } => {
                let ones = present as u64;
                let zeros = (tips.len() - present) as u64;
                Bound::Weight {
                    gain,
                    loss,
                    ceiling: cmp::min(ones * gain, zeros * loss + gain),
                }
            }
            Mode::Restricted { max_gains } => Bound::Gains { max: max_gains },
        };

        let mut order = self.tree.internals(sub);
        order.sort_by_key(|&v| (self.tree.tip_count(v), v));
        for &node in &order {
            let (a, b) = match *self.tree.children(node) {
                [a, b] => (a, b),
                _ => {
                    return Err(MlnError::Parse(format!(
                        "node {} is not binary",
                        self.tree.name(node)
                    )))
                }
            };
            let mut merged: Vec<(u8, Vec<(usize, u8)>)> = Vec::new();
            for (sa, ea) in &histories[a] {
                for (sb, eb) in &histories[b] {
                    if sa == sb {
                        let mut events = ea.clone();
                        events.extend_from_slice(eb);
                        if bound.admits(*sa, &events) {
                            merged.push((*sa, events));
                        }
                    } else {
                        let gained = ea
                            .iter()
                            .chain(eb.iter())
                            .any(|&(_, e)| e == 1);
                        for &(up, down, switch) in
                            &[(*sa, *sb, b), (*sb, *sa, a)]
                        {
                            if up == 1 && gained {
                                continue;
                            }
                            let mut events = ea.clone();
                            events.extend_from_slice(eb);
                            events.push((switch, down));
                            if bound.admits(up, &events) {
                                merged.push((up, events));
                            }
                        }
                    }
                }
            }
            if merged.is_empty() || merged.len() > HISTORY_CEILING {
                return Err(MlnError::SolverExhausted);
            }
            histories[node] = merged;
        }

        let scenarios = histories[sub]
            .iter()
            .map(|(state, events)| {
                if *state == 1 {
                    let mut full = vec![(sub, 1)];
                    full.extend_from_slice(events);
                    full
                } else {
                    events.clone()
                }
            })
            .collect();
        Ok(scenarios)
    }

    /// Run one mode over all inferred characters. Characters are
    /// independent, so they are solved in parallel; the result map is
    /// ordered by character id, which keeps every aggregation downstream
    /// deterministic.
    pub fn gls_set(&self, mode: &Mode) -> GlsSet {
        let solved: Vec<(usize, Result<(Gls, usize), MlnError>)> = self
            .paps
            .cogs
            .par_iter()
            .map(|&cog| {
                let pap = self.paps.pap(cog);
                let result = match *mode {
                    Mode::Weighted { gain, loss } => {
                        self.weighted_gls(pap, (gain, loss))
                    }
                    Mode::Restricted { max_gains } => {
                        self.restricted_gls(pap, max_gains)
                    }
                };
                (cog, result)
            })
            .collect();

        let mut scenarios = BTreeMap::new();
        let mut exhausted = Vec::new();
        let mut alternatives = 0usize;
        for (cog, result) in solved {
            match result {
                Ok((gls, count)) => {
                    alternatives += count;
                    scenarios.insert(cog, gls);
                }
                Err(MlnError::SolverExhausted) => {
                    warn!(
                        "solver exhausted on character {}, reporting an \
                         empty scenario",
                        self.paps.key(cog)
                    );
                    exhausted.push(cog);
                    scenarios.insert(cog, Gls::default());
                }
                Err(e) => {
                    warn!("skipping character {}: {}", self.paps.key(cog), e);
                }
            }
        }
        let analysed = cmp::max(scenarios.len(), 1);
        GlsSet {
            mode: mode.clone(),
            scenarios,
            exhausted,
            alternatives: alternatives as f64 / analysed as f64,
        }
    }

    /// Interior nodes in reporting order: the root first, then the
    /// remaining interior nodes by decreasing tip count.
    pub fn ancestral_nodes(&self) -> Vec<usize> {
        let root = self.tree.root();
        let mut nodes: Vec<usize> = self
            .tree
            .nontips()
            .into_iter()
            .filter(|&v| v != root)
            .collect();
        nodes.sort_by_key(|&v| (Reverse(self.tree.tip_count(v)), v));
        let mut ordered = vec![root];
        ordered.extend(nodes);
        ordered
    }

    /// Project a scenario onto the interior nodes, in the order of
    /// [`Mln::ancestral_nodes`]. Every node starts from the root state;
    /// events are applied by decreasing tip count so deeper annotations
    /// override shallower ones, each overwriting the whole interior of its
    /// subtree, the annotated node included.
    pub fn ancestral_states(&self, gls: &Gls) -> Vec<u8> {
        let nodes = self.ancestral_nodes();
        let mut position = vec![None; self.tree.len()];
        for (i, &v) in nodes.iter().enumerate() {
            position[v] = Some(i);
        }
        let root_gain = gls
            .events
            .iter()
            .any(|&(v, e)| v == self.tree.root() && e == 1);
        let mut states = vec![u8::from(root_gain); nodes.len()];
        let mut events = gls.events.clone();
        events.sort_by_key(|&(v, _)| (Reverse(self.tree.tip_count(v)), v));
        for (v, e) in events {
            for m in self.tree.internals(v) {
                if let Some(i) = position[m] {
                    states[i] = e;
                }
            }
        }
        states
    }
}

/// Keep the scenarios with minimal primary score and return the first after
/// a stable sort by the secondary score, together with the number of
/// candidates the choice was made from. For the weighted mode the secondary
/// score is the number of gains, which pushes gains towards the root; for
/// the restricted mode primary and secondary coincide.
fn select<F>(scenarios: Vec<Vec<(usize, u8)>>, score: F) -> (Gls, usize)
where
    F: Fn(&[(usize, u8)]) -> (u64, u64),
{
    let best = scenarios
        .iter()
        .map(|s| score(s).0)
        .min()
        .unwrap_or_default();
    let mut minimal: Vec<Vec<(usize, u8)>> = scenarios
        .into_iter()
        .filter(|s| score(s).0 == best)
        .collect();
    let count = minimal.len();
    minimal.sort_by_key(|s| score(s).1);
    let events = minimal.into_iter().next().unwrap_or_default();
    (Gls { events }, count)
}
