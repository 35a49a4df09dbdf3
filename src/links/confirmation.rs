//! Support-count frequency tables for positive and negative links

use std::collections::BTreeMap;
use std::fmt;

/// How many links are confirmed by exactly k experiments, per sign
///
/// Filled while a `LinkStatistics` is summarized, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkConfirmationStatistics {
    pos: BTreeMap<u32, u64>,
    neg: BTreeMap<u32, u64>,
}

impl LinkConfirmationStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one positive link supported by `support` experiments
    pub fn add_pos(&mut self, support: u32) {
        *self.pos.entry(support).or_insert(0) += 1;
    }

    /// Record one negative link supported by `support` experiments
    pub fn add_neg(&mut self, support: u32) {
        *self.neg.entry(support).or_insert(0) += 1;
    }

    pub fn total_pos(&self) -> u64 {
        self.pos.values().sum()
    }

    pub fn total_neg(&self) -> u64 {
        self.neg.values().sum()
    }

    pub fn total(&self) -> u64 {
        self.total_pos() + self.total_neg()
    }

    /// Positive links with support exactly `k`
    pub fn pos_count(&self, k: u32) -> u64 {
        self.pos.get(&k).copied().unwrap_or(0)
    }

    pub fn neg_count(&self, k: u32) -> u64 {
        self.neg.get(&k).copied().unwrap_or(0)
    }

    /// Positive links with support of at least `k`
    pub fn cumulative_pos(&self, k: u32) -> u64 {
        self.pos.range(k..).map(|(_, &c)| c).sum()
    }

    pub fn cumulative_neg(&self, k: u32) -> u64 {
        self.neg.range(k..).map(|(_, &c)| c).sum()
    }

    /// Highest support level observed in either sign, 0 when empty
    pub fn max_support(&self) -> u32 {
        let p = self.pos.keys().next_back().copied().unwrap_or(0);
        let n = self.neg.keys().next_back().copied().unwrap_or(0);
        p.max(n)
    }

    /// `(support, count)` pairs for positive links, ascending support
    pub fn pos_distribution(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.pos.iter().map(|(&k, &c)| (k, c))
    }

    pub fn neg_distribution(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.neg.iter().map(|(&k, &c)| (k, c))
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty() && self.neg.is_empty()
    }
}

impl fmt::Display for LinkConfirmationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# {} links ({} positive, {} negative)",
            self.total(),
            self.total_pos(),
            self.total_neg()
        )?;
        writeln!(f, "Support\tPosLinks\tNegLinks")?;
        for k in 1..=self.max_support() {
            writeln!(f, "{}\t{}\t{}", k, self.pos_count(k), self.neg_count(k))?;
        }
        Ok(())
    }
}
