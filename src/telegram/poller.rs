use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use super::api::{MAX_MESSAGE_CHARS, TelegramClient, TelegramError, Update, split_message};
use crate::commands::{Dispatcher, Sender};
use crate::storage::TelegramConfig;

/// A text message pulled out of an update
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    pub text: String,
    pub sender: Sender,
}

impl Incoming {
    /// Extract the text message from an update, if it carries one
    pub fn from_update(update: Update) -> Option<Self> {
        let message = update.message?;
        let text = message.text?;

        Some(Incoming {
            chat_id: message.chat.id,
            text,
            sender: Sender {
                first_name: message.from.map(|user| user.first_name),
            },
        })
    }
}

/// Long-polling loop feeding chat messages to the dispatcher
pub struct Poller {
    client: Arc<TelegramClient>,
    dispatcher: Dispatcher,
    bot_username: Option<String>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
}

impl Poller {
    pub fn new(
        client: TelegramClient,
        dispatcher: Dispatcher,
        config: &TelegramConfig,
        bot_username: Option<String>,
    ) -> Self {
        Poller {
            client: Arc::new(client),
            dispatcher,
            bot_username,
            poll_timeout_secs: config.poll_timeout_secs,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    /// Poll until Ctrl-C or a conflicting instance
    /// Returns `TelegramError::Conflict` when another process polls the same token.
    pub async fn run(self) -> Result<(), TelegramError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` completes or another instance takes over
    /// Replies still in flight are delivered before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), TelegramError>
    where
        F: Future<Output = ()>,
    {
        log::info!(
            "Polling for updates (timeout {}s)",
            self.poll_timeout_secs
        );

        // One signal future for the whole loop, so a signal is never missed
        let mut shutdown = pin!(shutdown);
        let mut handlers = JoinSet::new();
        let mut offset: Option<i64> = None;

        let result = loop {
            let polled = tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested");
                    break Ok(());
                }
                polled = self.client.get_updates(offset, self.poll_timeout_secs) => polled,
            };

            // Reap finished handlers
            while handlers.try_join_next().is_some() {}

            match polled {
                Ok(updates) => {
                    if !updates.is_empty() {
                        log::debug!("Received {} updates", updates.len());
                    }
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some(incoming) = Incoming::from_update(update) {
                            self.spawn_handler(&mut handlers, incoming);
                        }
                    }
                }
                Err(TelegramError::Conflict(description)) => {
                    log::error!("Bot conflict detected: {}", description);
                    log::error!("Another bot instance is running. Stopping this instance.");
                    break Err(TelegramError::Conflict(description));
                }
                Err(e) => {
                    log::error!(
                        "Polling failed, retrying in {}s: {}",
                        self.retry_delay.as_secs(),
                        e
                    );
                    tokio::select! {
                        _ = &mut shutdown => {
                            log::info!("Shutdown requested");
                            break Ok(());
                        }
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        };

        if !handlers.is_empty() {
            log::info!("Waiting for {} pending replies", handlers.len());
        }
        while let Some(joined) = handlers.join_next().await {
            if let Err(e) = joined {
                log::error!("Exception while handling an update: {}", e);
            }
        }

        result
    }

    /// Handle one message on its own task; store I/O runs on the blocking pool
    fn spawn_handler(&self, handlers: &mut JoinSet<()>, incoming: Incoming) {
        let client = Arc::clone(&self.client);
        let dispatcher = self.dispatcher.clone();
        let bot_username = self.bot_username.clone();

        handlers.spawn(async move {
            let chat_id = incoming.chat_id;
            let reply = tokio::task::spawn_blocking(move || {
                dispatcher.handle_text(&incoming.text, &incoming.sender, bot_username.as_deref())
            })
            .await;

            let reply = match reply {
                Ok(Some(reply)) if !reply.text.trim().is_empty() => reply,
                Ok(_) => return,
                Err(e) => {
                    log::error!("Exception while handling an update: {}", e);
                    return;
                }
            };

            for chunk in split_message(&reply.text, MAX_MESSAGE_CHARS) {
                if let Err(e) = client.send_message(chat_id, &chunk).await {
                    log::error!("Failed to send reply to chat {}: {}", chat_id, e);
                    return;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BirthdayStore;
    use tempfile::TempDir;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_incoming_from_text_message() {
        let incoming = Incoming::from_update(update(
            r#"{"update_id": 1, "message": {"message_id": 2, "chat": {"id": 99},
                "from": {"id": 3, "first_name": "Ada"}, "text": "/list"}}"#,
        ))
        .unwrap();

        assert_eq!(incoming.chat_id, 99);
        assert_eq!(incoming.text, "/list");
        assert_eq!(incoming.sender.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_incoming_skips_non_text() {
        let photo = update(
            r#"{"update_id": 1, "message": {"message_id": 2, "chat": {"id": 99}, "photo": []}}"#,
        );
        assert!(Incoming::from_update(photo).is_none());

        let other = update(r#"{"update_id": 5, "channel_post": {}}"#);
        assert!(Incoming::from_update(other).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_delay() {
        let dir = TempDir::new().unwrap();
        let store = BirthdayStore::open(dir.path().join("birthdays.json"));
        let config = TelegramConfig {
            // Nothing listens here, so every poll fails straight into the retry delay
            api_url: "http://127.0.0.1:9".to_string(),
            token: "123:abc".to_string(),
            poll_timeout_secs: 1,
            retry_delay_secs: 3600,
            ..TelegramConfig::default()
        };
        let client = TelegramClient::new(&config.api_url, &config.token, Duration::from_secs(1))
            .unwrap();
        let poller = Poller::new(client, Dispatcher::new(Arc::new(store)), &config, None);

        let stopped = tokio::time::timeout(
            Duration::from_secs(30),
            poller.run_until(tokio::time::sleep(Duration::from_millis(500))),
        )
        .await;

        assert!(matches!(stopped, Ok(Ok(()))));
    }
}
