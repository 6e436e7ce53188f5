//! Registry mapping consumer tags to the channels they consume on.
//!
//! The registry is owned by the session, so a plain `HashMap` is enough;
//! lookups of unknown tags surface as [`SessionError::ConsumerTagNotFound`].

use std::collections::HashMap;

use crate::{
    error::{Result, SessionError},
    frame::ChannelId,
};

/// Consumer tag to channel id map.
#[derive(Debug, Default)]
pub struct ConsumerRegistry(HashMap<String, ChannelId>);

impl ConsumerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `tag` as consuming on `channel`, replacing any previous entry.
    pub fn add(&mut self, tag: impl Into<String>, channel: ChannelId) {
        self.0.insert(tag.into(), channel);
    }

    /// Unregister `tag`, returning the channel it consumed on.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConsumerTagNotFound`] if `tag` is not
    /// registered.
    pub fn remove(&mut self, tag: &str) -> Result<ChannelId> {
        self.0
            .remove(tag)
            .ok_or_else(|| SessionError::ConsumerTagNotFound(tag.to_owned()))
    }

    /// Look up the channel `tag` consumes on.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConsumerTagNotFound`] if `tag` is not
    /// registered.
    pub fn channel(&self, tag: &str) -> Result<ChannelId> {
        self.0
            .get(tag)
            .copied()
            .ok_or_else(|| SessionError::ConsumerTagNotFound(tag.to_owned()))
    }

    /// Every channel with at least one registered consumer, ascending and
    /// without duplicates.
    #[must_use]
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut channels: Vec<ChannelId> = self.0.values().copied().collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }

    /// Iterate over registered tags.
    pub fn tags(&self) -> impl Iterator<Item = &str> { self.0.keys().map(String::as_str) }

    /// Drop every entry pointing at `channel`.
    pub(crate) fn remove_channel(&mut self, channel: ChannelId) {
        self.0.retain(|_, ch| *ch != channel);
    }

    /// Drop every entry.
    pub(crate) fn clear(&mut self) { self.0.clear(); }

    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn registry() -> ConsumerRegistry {
        let mut registry = ConsumerRegistry::new();
        registry.add("orders", 3);
        registry.add("audit", 1);
        registry.add("reply", 3);
        registry
    }

    #[rstest]
    fn lookup_returns_registered_channel(registry: ConsumerRegistry) {
        assert_eq!(registry.channel("orders").expect("orders"), 3);
        assert_eq!(registry.channel("audit").expect("audit"), 1);
    }

    #[rstest]
    #[case("missing")]
    #[case("")]
    fn unknown_tag_is_reported(mut registry: ConsumerRegistry, #[case] tag: &str) {
        let err = registry.channel(tag).expect_err("unknown tag");
        assert!(matches!(&err, SessionError::ConsumerTagNotFound(t) if t == tag));
        let err = registry.remove(tag).expect_err("unknown tag");
        assert!(matches!(err, SessionError::ConsumerTagNotFound(_)));
        assert_eq!(registry.len(), 3);
    }

    #[rstest]
    fn remove_unregisters(mut registry: ConsumerRegistry) {
        assert_eq!(registry.remove("orders").expect("orders"), 3);
        assert!(registry.channel("orders").is_err());
        assert_eq!(registry.channels(), vec![1, 3]);
    }

    #[rstest]
    fn channels_are_deduplicated(registry: ConsumerRegistry) {
        assert_eq!(registry.channels(), vec![1, 3]);
    }

    #[rstest]
    fn remove_channel_drops_all_its_tags(mut registry: ConsumerRegistry) {
        registry.remove_channel(3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.tags().collect::<Vec<_>>(), vec!["audit"]);
    }
}
