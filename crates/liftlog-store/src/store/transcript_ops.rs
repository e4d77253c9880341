//! Transcript read-modify-write.

use rusqlite::{OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, warn};

use liftlog_types::ChatMessage;

use crate::error::Result;

use super::query::{Transcript, TranscriptDraft, normalize_entries};
use super::{LiftlogStore, now_stamp};

impl LiftlogStore {
    /// Load the transcript of `session_id` for modification.
    ///
    /// A session without a row yields an empty draft. A stored message list
    /// that cannot be decoded is logged and treated as empty.
    pub fn load_draft(&self, session_id: &str) -> Result<TranscriptDraft> {
        let conn = self.conn.lock();

        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT id, name, message, user_id FROM conversation WHERE dialog_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, name, message, user_id)) = row else {
            return Ok(TranscriptDraft::empty(session_id, &self.default_user));
        };

        let entries = decode_entries(&message).unwrap_or_else(|reason| {
            warn!(session_id = %session_id, reason = %reason, "Discarding undecodable transcript");
            Vec::new()
        });

        Ok(TranscriptDraft {
            session_id: session_id.to_string(),
            id,
            name,
            user_id,
            entries,
            existing: true,
        })
    }

    /// Write a draft back, creating the row when the session has none.
    ///
    /// The write replaces the stored message list wholesale.
    pub fn commit_draft(&self, draft: &TranscriptDraft) -> Result<()> {
        let message = serde_json::to_string(&draft.entries)?;
        let (now_ms, now_dt) = now_stamp();

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO conversation
                (id, dialog_id, name, message, reference, user_id,
                 create_time, create_date, update_time, update_date)
            VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?6, ?7, ?6, ?7)
            ON CONFLICT(dialog_id) DO UPDATE SET
                message = excluded.message,
                update_time = excluded.update_time,
                update_date = excluded.update_date
            "#,
            params![
                draft.id,
                draft.session_id,
                draft.name,
                message,
                draft.user_id,
                now_ms,
                now_dt,
            ],
        )?;

        debug!(
            session_id = %draft.session_id,
            entries = draft.entries.len(),
            created = draft.is_new(),
            "Committed transcript"
        );
        Ok(())
    }

    /// Append one exchange to the transcript of `session_id`.
    ///
    /// Stored entries are kept as they are, including ones that do not read
    /// as messages. Not serialized against other writers: two overlapping
    /// calls for the same session can lose one exchange.
    pub fn append_turn(&self, session_id: &str, user_text: &str, assistant_text: &str) -> Result<()> {
        let mut draft = self.load_draft(session_id)?;
        draft.push_turn(user_text, assistant_text);
        self.commit_draft(&draft)
    }

    /// Read a transcript for display.
    ///
    /// Messages with empty content are skipped.
    pub fn read_transcript(&self, session_id: &str) -> Result<Option<Transcript>> {
        let conn = self.conn.lock();

        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT name, message, create_date FROM conversation WHERE dialog_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        Ok(row.map(|(name, message, created_at)| Transcript {
            session_id: session_id.to_string(),
            name,
            messages: visible_messages(session_id, &message),
            created_at,
        }))
    }

    /// List stored transcripts, newest first.
    pub fn list_transcripts(&self, limit: usize) -> Result<Vec<Transcript>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            r#"
            SELECT dialog_id, name, message, create_date
            FROM conversation
            ORDER BY create_time DESC
            LIMIT ?1
            "#,
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![limit])?;

        let mut transcripts = Vec::new();
        while let Some(row) = rows.next()? {
            let session_id: String = row.get(0)?;
            let message: String = row.get(2)?;
            transcripts.push(Transcript {
                messages: visible_messages(&session_id, &message),
                name: row.get(1)?,
                created_at: row.get(3)?,
                session_id,
            });
        }

        Ok(transcripts)
    }

    /// Remove the transcript of `session_id`. Returns whether a row existed.
    pub fn delete_transcript(&self, session_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "DELETE FROM conversation WHERE dialog_id = ?1",
            params![session_id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn visible_messages(session_id: &str, raw: &str) -> Vec<ChatMessage> {
    match decode_entries(raw) {
        Ok(entries) => normalize_entries(&entries)
            .into_iter()
            .filter(|m| !m.content.is_empty())
            .collect(),
        Err(reason) => {
            warn!(session_id = %session_id, reason = %reason, "Transcript is not a message list");
            Vec::new()
        }
    }
}

/// Decode a stored message list.
///
/// Accepts a JSON array or a JSON string that itself holds an array.
fn decode_entries(raw: &str) -> std::result::Result<Vec<Value>, String> {
    let mut value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if let Value::String(inner) = &value {
        value = serde_json::from_str(inner).map_err(|e| e.to_string())?;
    }

    match value {
        Value::Array(items) => Ok(items),
        _ => Err("expected a JSON array".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LiftlogStore {
        LiftlogStore::open_in_memory().unwrap()
    }

    fn raw_insert(store: &LiftlogStore, session_id: &str, message: &str) {
        let conn = store.conn.lock();
        conn.execute(
            r#"
            INSERT INTO conversation
                (id, dialog_id, name, message, reference, user_id,
                 create_time, create_date, update_time, update_date)
            VALUES ('r1', ?1, 'seeded', ?2, '[]', 'default_user', 1, '2025-01-01 00:00:00', 1, '2025-01-01 00:00:00')
            "#,
            params![session_id, message],
        )
        .unwrap();
    }

    #[test]
    fn test_append_turn_orders_messages() {
        let store = store();

        store.append_turn("s1", "I ran 5km", "Great run!").unwrap();
        let first = store.read_transcript("s1").unwrap().unwrap();
        assert_eq!(first.name, "I ran 5km");
        assert_eq!(
            first.messages,
            vec![
                ChatMessage::user("I ran 5km"),
                ChatMessage::assistant("Great run!"),
            ]
        );

        store.append_turn("s1", "Then squats", "Nice").unwrap();
        let second = store.read_transcript("s1").unwrap().unwrap();
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[2], ChatMessage::user("Then squats"));
        assert_eq!(second.messages[3], ChatMessage::assistant("Nice"));
        // name comes from the first turn only
        assert_eq!(second.name, "I ran 5km");
        assert_eq!(second.created_at, first.created_at);
    }

    #[test]
    fn test_one_row_per_session() {
        let store = store();
        store.append_turn("s1", "a", "b").unwrap();
        store.append_turn("s1", "c", "d").unwrap();
        store.append_turn("s2", "e", "f").unwrap();

        let count: i64 = store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM conversation", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);

        let reference: String = store
            .conn
            .lock()
            .query_row(
                "SELECT reference FROM conversation WHERE dialog_id = 's1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(reference, "[]");
    }

    #[test]
    fn test_interleaved_writers_lose_a_turn() {
        let store = store();
        store.append_turn("s1", "first", "one").unwrap();

        // Two writers load the same state before either commits.
        let mut a = store.load_draft("s1").unwrap();
        let mut b = store.load_draft("s1").unwrap();
        a.push_turn("from a", "reply a");
        b.push_turn("from b", "reply b");
        store.commit_draft(&a).unwrap();
        store.commit_draft(&b).unwrap();

        let messages = store.read_transcript("s1").unwrap().unwrap().messages;
        assert_eq!(messages.len(), 4);
        assert!(!messages.contains(&ChatMessage::user("from a")));
        assert_eq!(messages[2], ChatMessage::user("from b"));
    }

    #[test]
    fn test_append_keeps_stored_entries_verbatim() {
        let store = store();
        let seeded = r#"[{"role":"assistant","content":"Hi","id":"m0"},{"role":"system","content":"sys"},{"role":"user","content":null}]"#;
        raw_insert(&store, "s1", seeded);

        store.append_turn("s1", "q", "a").unwrap();

        let stored: String = store
            .conn
            .lock()
            .query_row(
                "SELECT message FROM conversation WHERE dialog_id = 's1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let expected = format!(
            "{},{}]",
            &seeded[..seeded.len() - 1],
            r#"{"role":"user","content":"q"},{"role":"assistant","content":"a"}"#
        );
        assert_eq!(stored, expected);

        // Reads still normalize: the null entry is hidden, system reads as assistant.
        let messages = store.read_transcript("s1").unwrap().unwrap().messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1], ChatMessage::assistant("sys"));
        assert_eq!(messages[3], ChatMessage::assistant("a"));
    }

    #[test]
    fn test_read_missing_session() {
        assert!(store().read_transcript("nope").unwrap().is_none());
    }

    #[test]
    fn test_read_tolerates_double_encoding() {
        let store = store();
        let inner = r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#;
        let double = serde_json::to_string(inner).unwrap();
        raw_insert(&store, "s1", &double);

        let transcript = store.read_transcript("s1").unwrap().unwrap();
        assert_eq!(transcript.name, "seeded");
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[0], ChatMessage::user("hi"));
    }

    #[test]
    fn test_read_skips_empty_and_defaults_role() {
        let store = store();
        raw_insert(
            &store,
            "s1",
            r#"[{"role":"user","content":""},{"content":"no role"},{"role":"system","content":"sys"},{"role":"user"},42]"#,
        );

        let messages = store.read_transcript("s1").unwrap().unwrap().messages;
        assert_eq!(
            messages,
            vec![
                ChatMessage::assistant("no role"),
                ChatMessage::assistant("sys"),
            ]
        );
    }

    #[test]
    fn test_undecodable_transcript_is_empty_and_recoverable() {
        let store = store();
        raw_insert(&store, "s1", "not json at all");

        let transcript = store.read_transcript("s1").unwrap().unwrap();
        assert!(transcript.messages.is_empty());

        store.append_turn("s1", "q", "a").unwrap();
        let transcript = store.read_transcript("s1").unwrap().unwrap();
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.name, "seeded");
    }

    #[test]
    fn test_list_and_delete_transcripts() {
        let store = store();
        store.append_turn("old", "a", "b").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.append_turn("new", "c", "d").unwrap();

        let listed = store.list_transcripts(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "new");
        assert_eq!(store.list_transcripts(1).unwrap().len(), 1);

        assert!(store.delete_transcript("old").unwrap());
        assert!(!store.delete_transcript("old").unwrap());
        assert_eq!(store.list_transcripts(10).unwrap().len(), 1);
    }
}
