//! Admin command handling.
//!
//! Commands arrive as plain text starting with `/`. `/start` and `/help`
//! answer anyone; FAQ management and `/stats` require the sender to be a
//! configured admin.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::faq::FaqMatcher;
use crate::store::Store;

const HELP_TEXT: &str = "\
Available commands:
/start - About this bot
/help - This message

Admin commands:
/add_faq question | answer | category - Add a FAQ (category optional)
/list_faqs - List stored FAQs
/delete_faq <id> - Delete a FAQ by id
/stats - Show usage counters";

const START_TEXT: &str = "\
👋 I keep this community tidy: I remove spam, answer common questions from \
the FAQ, and tag mentors on hard ones. Send /help for commands.";

/// Handles slash commands from the transport.
pub struct AdminHandler {
    settings: Settings,
    store: Arc<dyn Store>,
    faq: FaqMatcher,
}

impl AdminHandler {
    pub fn new(settings: Settings, store: Arc<dyn Store>, faq: FaqMatcher) -> Self {
        Self {
            settings,
            store,
            faq,
        }
    }

    /// Dispatch a command. Returns `None` when the text is not a command.
    pub async fn handle(&self, sender_platform_id: i64, text: &str) -> Option<String> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let (command, rest) = match text.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (text, ""),
        };
        // Telegram appends @botname in groups.
        let command = command.split('@').next().unwrap_or(command);

        match command {
            "/start" => Some(START_TEXT.to_string()),
            "/help" => Some(HELP_TEXT.to_string()),
            "/add_faq" => Some(self.admin_only(sender_platform_id, self.add_faq(sender_platform_id, rest)).await),
            "/list_faqs" => Some(self.admin_only(sender_platform_id, self.list_faqs()).await),
            "/delete_faq" => Some(self.admin_only(sender_platform_id, self.delete_faq(rest)).await),
            "/stats" => Some(self.admin_only(sender_platform_id, self.stats()).await),
            _ => None,
        }
    }

    async fn admin_only<F>(&self, sender_platform_id: i64, action: F) -> String
    where
        F: std::future::Future<Output = String>,
    {
        if !self.settings.is_admin(sender_platform_id) {
            warn!(sender = sender_platform_id, "Non-admin used an admin command");
            return "⛔ This command is for admins only.".to_string();
        }
        action.await
    }

    /// `/add_faq question | answer | category` — category is optional.
    async fn add_faq(&self, sender_platform_id: i64, args: &str) -> String {
        let parts: Vec<&str> = args.split('|').map(str::trim).collect();
        let (question, answer, category) = match parts.as_slice() {
            [q, a] if !q.is_empty() && !a.is_empty() => (*q, *a, None),
            [q, a, c] if !q.is_empty() && !a.is_empty() => (*q, *a, Some(*c)),
            _ => {
                return "Usage: /add_faq question | answer | category (category optional)"
                    .to_string()
            }
        };

        let created_by = match self.store.get_member(sender_platform_id).await {
            Ok(member) => member.map(|m| m.id),
            Err(_) => None,
        };

        match self.faq.add_entry(question, answer, category, created_by).await {
            Ok(entry) => {
                info!(faq = %entry.id, "FAQ added via admin command");
                format!("✅ FAQ added: {}", entry.id)
            }
            Err(e) => format!("❌ Failed to add FAQ: {e}"),
        }
    }

    async fn list_faqs(&self) -> String {
        let entries = match self.faq.list_entries().await {
            Ok(entries) => entries,
            Err(e) => return format!("❌ Failed to list FAQs: {e}"),
        };
        if entries.is_empty() {
            return "No FAQs stored yet.".to_string();
        }

        let mut out = format!("📚 {} FAQs:\n", entries.len());
        for entry in entries {
            out.push_str(&format!(
                "\n• {} — {} (matched {} times)\n  id: {}",
                entry.question,
                entry.category.as_deref().unwrap_or("uncategorized"),
                entry.times_matched,
                entry.id
            ));
        }
        out
    }

    async fn delete_faq(&self, args: &str) -> String {
        let id = match Uuid::parse_str(args.trim()) {
            Ok(id) => id,
            Err(_) => return "Usage: /delete_faq <id>".to_string(),
        };
        match self.faq.delete_entry(id).await {
            Ok(true) => format!("🗑 FAQ {id} deleted."),
            Ok(false) => format!("No FAQ with id {id}."),
            Err(e) => format!("❌ Failed to delete FAQ: {e}"),
        }
    }

    async fn stats(&self) -> String {
        match self.store.stats().await {
            Ok(stats) => format!(
                "📊 Stats\nMembers: {}\nMessages: {}\nDeleted: {}\nFAQs: {}\nMentor tags: {}",
                stats.members,
                stats.messages,
                stats.deleted_messages,
                stats.faqs,
                stats.mentor_tags
            ),
            Err(e) => format!("❌ Failed to load stats: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmBackend;
    use crate::store::LibSqlStore;
    use crate::testing::ScriptedProvider;
    use secrecy::SecretString;
    use std::collections::HashMap;

    fn settings_with_admin(admin_id: i64) -> Settings {
        Settings {
            bot_token: SecretString::from("t"),
            llm_backend: LlmBackend::OpenAi,
            llm_api_key: SecretString::from("k"),
            llm_model: None,
            admin_ids: vec![admin_id],
            mentor_domains: HashMap::new(),
            moderation_threshold: 0.7,
            faq_threshold: 0.85,
            db_path: ":memory:".to_string(),
        }
    }

    async fn handler(provider: ScriptedProvider) -> AdminHandler {
        let store: Arc<LibSqlStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let llm = Arc::new(provider);
        let faq = FaqMatcher::new(llm, store.clone(), 0.85);
        AdminHandler::new(settings_with_admin(10), store, faq)
    }

    #[tokio::test]
    async fn non_commands_are_ignored() {
        let h = handler(ScriptedProvider::default()).await;
        assert!(h.handle(10, "hello there").await.is_none());
        assert!(h.handle(10, "/unknown_command").await.is_none());
    }

    #[tokio::test]
    async fn help_answers_everyone() {
        let h = handler(ScriptedProvider::default()).await;
        let reply = h.handle(999, "/help").await.unwrap();
        assert!(reply.contains("/add_faq"));
    }

    #[tokio::test]
    async fn admin_commands_rejected_for_non_admins() {
        let h = handler(ScriptedProvider::default()).await;
        let reply = h.handle(999, "/stats").await.unwrap();
        assert!(reply.contains("admins only"));
    }

    #[tokio::test]
    async fn add_and_list_and_delete_faq() {
        let provider = ScriptedProvider::default().with_default_embedding(vec![1.0, 0.0]);
        let h = handler(provider).await;

        let reply = h
            .handle(10, "/add_faq What is SGD? | An optimizer. | optimization")
            .await
            .unwrap();
        assert!(reply.starts_with("✅"));

        let listing = h.handle(10, "/list_faqs").await.unwrap();
        assert!(listing.contains("What is SGD?"));
        assert!(listing.contains("optimization"));

        let id_line = listing.lines().find(|l| l.contains("id: ")).unwrap();
        let id = id_line.trim().trim_start_matches("id: ");
        let deleted = h.handle(10, &format!("/delete_faq {id}")).await.unwrap();
        assert!(deleted.contains("deleted"));

        let empty = h.handle(10, "/list_faqs").await.unwrap();
        assert!(empty.contains("No FAQs"));
    }

    #[tokio::test]
    async fn add_faq_rejects_malformed_args() {
        let h = handler(ScriptedProvider::default()).await;
        let reply = h.handle(10, "/add_faq just one part").await.unwrap();
        assert!(reply.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn delete_faq_rejects_bad_id() {
        let h = handler(ScriptedProvider::default()).await;
        let reply = h.handle(10, "/delete_faq not-a-uuid").await.unwrap();
        assert!(reply.starts_with("Usage:"));
    }

    #[tokio::test]
    async fn command_with_bot_suffix_is_recognized() {
        let h = handler(ScriptedProvider::default()).await;
        let reply = h.handle(10, "/stats@triage_bot").await.unwrap();
        assert!(reply.contains("Members"));
    }
}
