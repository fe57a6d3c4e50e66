//! Chat platform abstraction.
//!
//! The sync pipeline talks to Discord exclusively through [`ChatClient`], so
//! tests can drive it against an in-memory double and the reconciler never
//! sees platform types.

pub mod discord;
pub mod traits;

pub use traits::ChatClient;

pub type ServerId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;

/// Embed background color, matches the Discord dark theme so screenshots sit
/// flush in the message.
pub const EMBED_COLOR: u32 = 0x31_33_38;

/// A server the bot is a member of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub id: ServerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerInfo {
    pub id: u64,
    pub name: String,
}

/// A text channel with the fields binding detection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub server_id: ServerId,
    pub server_name: String,
    pub name: String,
    pub topic: Option<String>,
}

/// Snapshot of one message as the reconciler sees it. Nothing is tracked
/// across passes; state of record is the channel itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedMessage {
    pub id: MessageId,
    pub authored_by_bot: bool,
    pub content: String,
    pub embed_title: Option<String>,
    pub embed_footer: Option<String>,
    pub attachment_url: Option<String>,
}

/// Embed payload for one item message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemEmbed {
    pub title: String,
    pub url: String,
    pub image_url: String,
    pub footer: String,
}

/// Page through history via `fetch_page(before, size)` until `limit` messages
/// are collected or a page comes back empty. Pages arrive newest first; the
/// cursor for the next page is the oldest id of the current one.
pub async fn paginate_history<F, Fut>(limit: usize, mut fetch_page: F) -> crate::Result<Vec<TrackedMessage>>
where
    F: FnMut(Option<MessageId>, u8) -> Fut,
    Fut: std::future::Future<Output = crate::Result<Vec<TrackedMessage>>>,
{
    let mut collected = Vec::new();
    let mut before = None;
    let mut remaining = limit;
    while remaining > 0 {
        let page_size = remaining.min(100) as u8;
        let page = fetch_page(before, page_size).await?;
        if page.is_empty() {
            break;
        }
        remaining = remaining.saturating_sub(page.len());
        before = page.last().map(|message| message.id);
        collected.extend(page);
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: MessageId) -> TrackedMessage {
        TrackedMessage {
            id,
            authored_by_bot: true,
            content: String::new(),
            embed_title: None,
            embed_footer: None,
            attachment_url: None,
        }
    }

    #[tokio::test]
    async fn stops_on_an_empty_page() {
        let mut calls = 0;
        let history = paginate_history(250, |before, size| {
            calls += 1;
            assert_eq!(size, 100);
            let page = match before {
                None => (0..100).map(|i| message(1000 - i)).collect(),
                Some(_) => Vec::new(),
            };
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(history.len(), 100);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn caps_page_size_at_the_remaining_limit() {
        let history = paginate_history(130, |before, size| {
            let page = match before {
                None => {
                    assert_eq!(size, 100);
                    (0..100).map(|i| message(1000 - i)).collect::<Vec<_>>()
                }
                Some(cursor) => {
                    assert_eq!(cursor, 901);
                    assert_eq!(size, 30);
                    (0..30).map(|i| message(900 - i)).collect()
                }
            };
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(history.len(), 130);
        assert_eq!(history.first().map(|m| m.id), Some(1000));
        assert_eq!(history.last().map(|m| m.id), Some(871));
    }

    #[tokio::test]
    async fn short_pages_still_advance_the_cursor() {
        let mut calls = 0;
        let history = paginate_history(100, |before, _| {
            calls += 1;
            let page: Vec<_> = match (calls, before) {
                (1, None) => vec![message(5), message(4)],
                (2, Some(4)) => vec![message(3)],
                (3, Some(3)) => Vec::new(),
                other => panic!("unexpected fetch {other:?}"),
            };
            async move { Ok(page) }
        })
        .await
        .unwrap();

        assert_eq!(history.len(), 3);
    }
}
