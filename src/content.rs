//! Content kinds and their per-kind capabilities.
//!
//! The four kinds share one pipeline; everything that differs between them
//! (API route, channel binding tag, page slug rules, viewport) lives here as
//! data so the rest of the crate never branches on a kind by hand.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Weapon,
    Mode,
    Map,
    Hero,
}

impl ContentKind {
    /// All kinds in refresh order.
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Weapon,
        ContentKind::Mode,
        ContentKind::Map,
        ContentKind::Hero,
    ];

    /// Route segment on the site API. Doubles as the localization key and the
    /// `type` column value in the database.
    pub fn api_route(self) -> &'static str {
        match self {
            ContentKind::Weapon => "weapons",
            ContentKind::Mode => "modes",
            ContentKind::Map => "maps",
            ContentKind::Hero => "heroes",
        }
    }

    /// Topic prefix that binds a channel to this kind. The two characters
    /// after the opening parenthesis carry the channel language.
    pub fn channel_tag(self) -> &'static str {
        match self {
            ContentKind::Weapon => "#EBP_WEAPONS_BOT(",
            ContentKind::Mode => "#EBP_MODES_BOT(",
            ContentKind::Map => "#EBP_MAPS_BOT(",
            ContentKind::Hero => "#EBP_HEROES_BOT(",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ContentKind::Weapon => "🔫",
            ContentKind::Mode => "🚩",
            ContentKind::Map => "🗺️",
            ContentKind::Hero => "🤖",
        }
    }

    /// Browser window size used when rendering this kind's pages.
    pub fn default_viewport(self) -> (u32, u32) {
        match self {
            ContentKind::Weapon => (1728, 972),
            ContentKind::Mode | ContentKind::Map => (1200, 800),
            ContentKind::Hero => (1550, 1300),
        }
    }

    pub fn from_route(route: &str) -> Option<Self> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.api_route() == route)
    }

    /// Extract the channel language from a topic, if the topic carries this
    /// kind's binding tag. Unknown languages are resolved downstream, the
    /// localization table falls back to English.
    pub fn language_from_topic(self, topic: &str) -> Option<String> {
        let tag = self.channel_tag();
        if !topic.contains(tag) {
            return None;
        }
        let rest = topic.rsplit(tag).next().unwrap_or_default();
        Some(rest.chars().take(2).collect::<String>().to_lowercase())
    }

    /// URL path segment for an item page. Weapon pages use dashed slugs, the
    /// other kinds keep spaces percent-encoded.
    pub fn page_slug(self, name: &str) -> String {
        match self {
            ContentKind::Weapon => name.to_lowercase().replace(' ', "-"),
            _ => name.to_lowercase().replace(' ', "%20"),
        }
    }

    /// Address rendered for a screenshot. `discord=1` asks the site for the
    /// stripped-down capture layout.
    pub fn capture_url(self, base_url: &str, name: &str) -> String {
        format!("{base_url}/{}?discord=1", self.page_slug(name))
    }

    /// Embed link for an item message. Weapon embeds deep-link to the item
    /// page when the site published a base URL for the language; everything
    /// else links to the localized site root.
    pub fn item_link(
        self,
        base_url: Option<&str>,
        site_url: &str,
        language: &str,
        name: &str,
    ) -> String {
        match (self, base_url) {
            (ContentKind::Weapon, Some(base)) => format!("{base}/{}", encode_spaces(name)),
            _ => format!("{site_url}/{language}"),
        }
    }

    /// Link advertised in the separator message below the item listing.
    pub fn source_link(self, base_url: Option<&str>, site_url: &str, language: &str) -> String {
        match (self, base_url) {
            (ContentKind::Weapon, Some(base)) => base.to_string(),
            _ => format!("{site_url}/{language}"),
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_route())
    }
}

fn encode_spaces(name: &str) -> String {
    name.replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_and_tags_line_up() {
        assert_eq!(ContentKind::Weapon.api_route(), "weapons");
        assert_eq!(ContentKind::Hero.channel_tag(), "#EBP_HEROES_BOT(");
        assert_eq!(ContentKind::from_route("maps"), Some(ContentKind::Map));
        assert_eq!(ContentKind::from_route("gadgets"), None);
    }

    #[test]
    fn language_comes_from_the_topic_tag() {
        let kind = ContentKind::Weapon;
        assert_eq!(
            kind.language_from_topic("Stats live: #EBP_WEAPONS_BOT(FR)"),
            Some("fr".to_string())
        );
        assert_eq!(
            kind.language_from_topic("#EBP_WEAPONS_BOT(en) do not edit"),
            Some("en".to_string())
        );
        assert_eq!(kind.language_from_topic("#EBP_HEROES_BOT(en)"), None);
        assert_eq!(kind.language_from_topic("plain topic"), None);
    }

    #[test]
    fn weapon_slugs_are_dashed_and_lowercase() {
        assert_eq!(
            ContentKind::Weapon.page_slug("Plasma Rifle"),
            "plasma-rifle"
        );
        assert_eq!(ContentKind::Hero.page_slug("Iron Sentinel"), "iron%20sentinel");
    }

    #[test]
    fn capture_urls_request_the_capture_layout() {
        assert_eq!(
            ContentKind::Weapon.capture_url("https://ebp.gg/en/weapons", "Plasma Rifle"),
            "https://ebp.gg/en/weapons/plasma-rifle?discord=1"
        );
    }

    #[test]
    fn weapon_links_keep_the_display_name_case() {
        let link = ContentKind::Weapon.item_link(
            Some("https://ebp.gg/en/weapons"),
            "https://ebp.gg",
            "en",
            "Plasma Rifle",
        );
        assert_eq!(link, "https://ebp.gg/en/weapons/Plasma%20Rifle");
    }

    #[test]
    fn non_weapon_links_point_at_the_localized_root() {
        let link = ContentKind::Mode.item_link(
            Some("https://ebp.gg/en/modes"),
            "https://ebp.gg",
            "fr",
            "Capture",
        );
        assert_eq!(link, "https://ebp.gg/fr");
        assert_eq!(
            ContentKind::Weapon.item_link(None, "https://ebp.gg", "de", "Falcon"),
            "https://ebp.gg/de"
        );
    }

    #[test]
    fn source_links_follow_the_same_split() {
        assert_eq!(
            ContentKind::Weapon.source_link(Some("https://ebp.gg/en/weapons"), "https://ebp.gg", "en"),
            "https://ebp.gg/en/weapons"
        );
        assert_eq!(
            ContentKind::Map.source_link(Some("https://ebp.gg/en/maps"), "https://ebp.gg", "es"),
            "https://ebp.gg/es"
        );
    }
}
