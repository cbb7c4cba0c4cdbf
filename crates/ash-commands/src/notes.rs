use ash_kv::{keys, KvStore};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single CRT-authored note about a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub author: String,
    pub text: String,
    pub timestamp: i64,
}

/// CRT-only notes per user, stored as the JSON list documented at
/// `ash:notes:{user_id}` (spec §6), with no TTL. Newest note is appended;
/// the whole list is returned on view.
#[derive(Clone)]
pub struct NotesStore {
    kv: KvStore,
}

impl NotesStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub async fn add(&self, user_id: &str, author: &str, text: &str, now: i64) -> bool {
        let key = keys::notes_key(user_id);
        let mut notes: Vec<Note> = self.kv.get_json(&key).await.unwrap_or_default().unwrap_or_default();
        notes.push(Note {
            author: author.to_string(),
            text: text.to_string(),
            timestamp: now,
        });
        match self.kv.set_json(&key, &notes, None).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, user_id, "failed to append crt note");
                false
            }
        }
    }

    pub async fn view(&self, user_id: &str) -> Vec<Note> {
        let key = keys::notes_key(user_id);
        match self.kv.get_json(&key).await {
            Ok(notes) => notes.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, user_id, "failed to read crt notes");
                Vec::new()
            }
        }
    }
}
