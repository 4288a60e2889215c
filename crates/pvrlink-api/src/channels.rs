//! Channel catalog and the user's sort order.

use std::collections::{HashMap, HashSet};

use crate::types::Channel;

/// Channels keyed by id in catalog order, plus the user's favorites order.
#[derive(Debug, Clone, Default)]
pub struct ChannelLineup {
    /// Catalog in backend order.
    catalog: Vec<Channel>,
    /// Index into `catalog` by channel id.
    by_id: HashMap<i64, usize>,
    /// Favorite channel ids in the user's order, all present in `catalog`.
    favorites: Vec<i64>,
}

impl ChannelLineup {
    /// Builds a lineup from a catalog and a sort order.
    ///
    /// Later catalog duplicates of an id are ignored; sort-order ids that are
    /// unknown or repeated are dropped.
    #[must_use]
    pub fn new(catalog: impl IntoIterator<Item = Channel>, sort_order: &[i64]) -> Self {
        let mut lineup = Self::default();
        for channel in catalog {
            if lineup.by_id.contains_key(&channel.id) {
                tracing::warn!(channel_id = channel.id, "Duplicate channel id in catalog");
                continue;
            }
            lineup.by_id.insert(channel.id, lineup.catalog.len());
            lineup.catalog.push(channel);
        }
        let mut seen = HashSet::new();
        lineup.favorites = sort_order
            .iter()
            .copied()
            .filter(|id| lineup.by_id.contains_key(id) && seen.insert(*id))
            .collect();
        lineup
    }

    /// Looks up a channel by id.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Channel> {
        self.by_id.get(&id).and_then(|&i| self.catalog.get(i))
    }

    /// Number of channels that [`Self::ordered`] yields.
    #[must_use]
    pub fn count(&self, favorites_only: bool) -> usize {
        if favorites_only {
            self.favorites.len()
        } else {
            self.catalog.len()
        }
    }

    /// Channels with 1-based display numbers.
    ///
    /// Favorites come first in the user's order; unless `favorites_only`,
    /// the remaining catalog channels follow in backend order.
    #[must_use]
    pub fn ordered(&self, favorites_only: bool) -> Vec<(&Channel, u32)> {
        let favorites = self.favorites.iter().filter_map(|&id| self.get(id));
        let rest = self
            .catalog
            .iter()
            .filter(move |c| !favorites_only && !self.favorites.contains(&c.id));
        favorites.chain(rest).zip(1_u32..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineup() -> ChannelLineup {
        let catalog = [
            Channel::new(1, "One"),
            Channel::new(2, "Two"),
            Channel::new(3, "Three"),
        ];
        ChannelLineup::new(catalog, &[3, 1, 9])
    }

    fn ids(ordered: &[(&Channel, u32)]) -> Vec<(i64, u32)> {
        ordered.iter().map(|(c, n)| (c.id, *n)).collect()
    }

    #[test]
    fn test_favorites_only_drops_unknown_ids() {
        // Arrange
        let lineup = lineup();

        // Act
        let ordered = lineup.ordered(true);

        // Assert
        assert_eq!(ids(&ordered), vec![(3, 1), (1, 2)]);
        assert_eq!(lineup.count(true), 2);
    }

    #[test]
    fn test_all_channels_appends_rest_in_catalog_order() {
        // Arrange
        let lineup = lineup();

        // Act
        let ordered = lineup.ordered(false);

        // Assert
        assert_eq!(ids(&ordered), vec![(3, 1), (1, 2), (2, 3)]);
        assert_eq!(lineup.count(false), 3);
    }

    #[test]
    fn test_repeated_favorites_are_listed_once() {
        // Arrange
        let lineup = ChannelLineup::new([Channel::new(5, "Five")], &[5, 5]);

        // Act & Assert
        assert_eq!(ids(&lineup.ordered(false)), vec![(5, 1)]);
    }

    #[test]
    fn test_get_unknown_channel() {
        // Arrange & Act & Assert
        assert!(lineup().get(9).is_none());
        assert_eq!(lineup().get(2).map(|c| c.name.as_str()), Some("Two"));
    }
}
