use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

pub const ORIGIN_MAX_LEN: usize = 25;
pub const EVENT_MAX_LEN: usize = 25;
pub const DESCRIPTION_MAX_LEN: usize = 255;

/// Creation payload for a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub origin: String,
    pub event: String,
    pub description: String,
}

/// A feed entry as read back from the store. `id` is `None` until persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FeedDetail {
    pub origin: String,
    pub event: String,
    pub description: String,
    pub id: Option<i64>,
}

#[derive(Error, Debug)]
pub enum FeedError {
    /// Insert failed; carries the underlying cause.
    #[error("Unable to create a new feed. {0}")]
    Create(String),

    #[error("{field} must be at most {max} characters")]
    Invalid { field: &'static str, max: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Feed {
    pub fn new(
        origin: impl Into<String>,
        event: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.into(),
            event: event.into(),
            description: description.into(),
        }
    }

    /// Check the column bounds. Lengths count chars, not bytes.
    pub fn validate(&self) -> Result<(), FeedError> {
        let checks = [
            ("origin", &self.origin, ORIGIN_MAX_LEN),
            ("event", &self.event, EVENT_MAX_LEN),
            ("description", &self.description, DESCRIPTION_MAX_LEN),
        ];

        for (field, value, max) in checks {
            if value.chars().count() > max {
                return Err(FeedError::Invalid { field, max });
            }
        }
        Ok(())
    }
}

impl FeedDetail {
    pub fn from_feed(feed: Feed, id: Option<i64>) -> Self {
        Self {
            origin: feed.origin,
            event: feed.event,
            description: feed.description,
            id,
        }
    }
}

impl From<Feed> for FeedDetail {
    fn from(feed: Feed) -> Self {
        FeedDetail::from_feed(feed, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_feed() -> Feed {
        Feed::new(
            "fake.origin",
            "A fake event",
            "This is a fake description",
        )
    }

    #[test]
    fn test_feed_json_keeps_every_field() {
        let feed = fake_feed();
        let json = serde_json::to_value(&feed).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "origin": "fake.origin",
                "event": "A fake event",
                "description": "This is a fake description",
            })
        );

        let back: Feed = serde_json::from_value(json).unwrap();
        assert_eq!(back, feed);
    }

    #[test]
    fn test_feed_requires_all_fields() {
        let result: Result<Feed, _> = serde_json::from_str(
            r#"{"origin": "fake.origin", "event": "A fake event"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_feed_detail_defaults_to_null_id() {
        let detail = FeedDetail::from(fake_feed());
        assert!(detail.id.is_none());

        let json = serde_json::to_string(&detail).unwrap();
        assert_eq!(
            json,
            r#"{"origin":"fake.origin","event":"A fake event","description":"This is a fake description","id":null}"#
        );
    }

    #[test]
    fn test_feed_detail_from_feed_with_id() {
        let detail = FeedDetail::from_feed(fake_feed(), Some(6));
        assert_eq!(detail.id, Some(6));
        assert_eq!(detail.origin, "fake.origin");
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_valid_feed() {
            assert!(fake_feed().validate().is_ok());
        }

        #[test]
        fn test_fields_at_limit_are_valid() {
            let feed = Feed::new(
                "o".repeat(ORIGIN_MAX_LEN),
                "e".repeat(EVENT_MAX_LEN),
                "d".repeat(DESCRIPTION_MAX_LEN),
            );
            assert!(feed.validate().is_ok());
        }

        #[test]
        fn test_origin_too_long() {
            let feed = Feed::new("o".repeat(ORIGIN_MAX_LEN + 1), "event", "description");
            match feed.validate() {
                Err(FeedError::Invalid { field, max }) => {
                    assert_eq!(field, "origin");
                    assert_eq!(max, ORIGIN_MAX_LEN);
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }

        #[test]
        fn test_description_too_long() {
            let feed = Feed::new("origin", "event", "d".repeat(DESCRIPTION_MAX_LEN + 1));
            assert!(matches!(
                feed.validate(),
                Err(FeedError::Invalid {
                    field: "description",
                    ..
                })
            ));
        }

        #[test]
        fn test_length_counts_chars_not_bytes() {
            // 25 two-byte chars
            let feed = Feed::new("é".repeat(ORIGIN_MAX_LEN), "event", "description");
            assert!(feed.validate().is_ok());
        }
    }

    #[test]
    fn test_create_error_message_carries_cause() {
        let err = FeedError::Create("database is locked".to_string());
        assert_eq!(
            err.to_string(),
            "Unable to create a new feed. database is locked"
        );
    }
}
