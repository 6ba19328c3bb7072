use crate::models::{EventRow, InboxMessageRow, MessageRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, name: Option<&str>, avatar_url: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, name, avatar_url) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, avatar_url],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Events --

    pub fn create_event(
        &self,
        id: &str,
        title: &str,
        image_src: Option<&str>,
        owner_id: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (id, title, image_src, owner_id) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, title, image_src, owner_id],
            )?;
            Ok(())
        })
    }

    pub fn get_event_by_id(&self, id: &str) -> Result<Option<EventRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, image_src, owner_id FROM events WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(EventRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            image_src: row.get(2)?,
                            owner_id: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        event_id: &str,
        sender_id: &str,
        receiver_id: &str,
        content: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO private_messages (id, event_id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, event_id, sender_id, receiver_id, content, created_at],
            )?;
            Ok(())
        })
    }

    /// Messages exchanged between the two users for one event, ascending
    /// creation order. Soft-deleted rows are excluded.
    pub fn list_messages(&self, event_id: &str, user_a: &str, user_b: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, event_id, user_a, user_b, None))
    }

    /// Same as [`Self::list_messages`] but restricted to rows created
    /// strictly after `since` (RFC 3339). Drives the polling fallback.
    pub fn list_messages_since(
        &self,
        event_id: &str,
        user_a: &str,
        user_b: &str,
        since: &str,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages(conn, event_id, user_a, user_b, Some(since)))
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.event_id, m.sender_id, m.receiver_id, m.content,
                        m.is_read, m.created_at, m.deleted_at, u.name, u.avatar_url
                 FROM private_messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.id = ?1",
            )?;
            let row = stmt.query_row([id], map_message_row).optional()?;
            Ok(row)
        })
    }

    /// Flip is_read on everything the reader received from the counterpart
    /// in this thread. Only ever moves false → true, so concurrent calls
    /// are harmless. Returns the number of rows updated.
    pub fn mark_read(&self, event_id: &str, reader_id: &str, counterpart_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE private_messages
                 SET is_read = 1
                 WHERE event_id = ?1 AND receiver_id = ?2 AND sender_id = ?3 AND is_read = 0",
                rusqlite::params![event_id, reader_id, counterpart_id],
            )?;
            Ok(changed)
        })
    }

    /// Stamp deleted_at. The caller owns the sender check; a second stamp
    /// on an already-deleted row is a no-op.
    pub fn soft_delete_message(&self, id: &str, deleted_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE private_messages SET deleted_at = ?2
                 WHERE id = ?1 AND deleted_at IS NULL",
                rusqlite::params![id, deleted_at],
            )?;
            Ok(())
        })
    }

    // -- Unread accounting --

    pub fn unread_count_for_thread(
        &self,
        event_id: &str,
        viewer_id: &str,
        counterpart_id: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM private_messages
                 WHERE event_id = ?1 AND receiver_id = ?2 AND sender_id = ?3
                   AND is_read = 0 AND deleted_at IS NULL",
                rusqlite::params![event_id, viewer_id, counterpart_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// (total unread messages, distinct threads with at least one unread).
    /// The second figure is what UI badges show.
    pub fn aggregate_unread(&self, viewer_id: &str) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let pair = conn.query_row(
                "SELECT COUNT(*), COUNT(DISTINCT event_id || '|' || sender_id)
                 FROM private_messages
                 WHERE receiver_id = ?1 AND is_read = 0 AND deleted_at IS NULL",
                [viewer_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(pair)
        })
    }

    // -- Inbox --

    /// Every visible message the user sent or received, newest first,
    /// joined with event and participant metadata. The aggregator groups
    /// these into one summary per (event, counterpart) pair.
    pub fn list_inbox_messages(&self, viewer_id: &str) -> Result<Vec<InboxMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.event_id, e.title, e.image_src,
                        m.sender_id, s.name, s.avatar_url,
                        m.receiver_id, r.name, r.avatar_url,
                        m.content, m.is_read, m.created_at
                 FROM private_messages m
                 JOIN events e ON m.event_id = e.id
                 LEFT JOIN users s ON m.sender_id = s.id
                 LEFT JOIN users r ON m.receiver_id = r.id
                 WHERE (m.sender_id = ?1 OR m.receiver_id = ?1)
                   AND m.deleted_at IS NULL
                 ORDER BY m.created_at DESC, m.rowid DESC",
            )?;

            let rows = stmt
                .query_map([viewer_id], |row| {
                    Ok(InboxMessageRow {
                        event_id: row.get(0)?,
                        event_title: row.get(1)?,
                        event_image: row.get(2)?,
                        sender_id: row.get(3)?,
                        sender_name: row.get(4)?,
                        sender_avatar: row.get(5)?,
                        receiver_id: row.get(6)?,
                        receiver_name: row.get(7)?,
                        receiver_avatar: row.get(8)?,
                        content: row.get(9)?,
                        is_read: row.get::<_, i64>(10)? != 0,
                        created_at: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Notifications --

    /// Best-effort sink; callers log and swallow the error.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_notification(
        &self,
        id: &str,
        user_id: &str,
        kind: &str,
        title: &str,
        body: &str,
        link: Option<&str>,
        event_id: Option<&str>,
        from_user_id: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, title, body, link, event_id, from_user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, user_id, kind, title, body, link, event_id, from_user_id],
            )?;
            Ok(())
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT id, name, avatar_url FROM users WHERE id = ?1")?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                avatar_url: row.get(2)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_messages(
    conn: &Connection,
    event_id: &str,
    user_a: &str,
    user_b: &str,
    since: Option<&str>,
) -> Result<Vec<MessageRow>> {
    // JOIN users to fetch sender metadata in a single query. Ties on
    // created_at are broken by rowid to keep ordering deterministic.
    let mut sql = String::from(
        "SELECT m.id, m.event_id, m.sender_id, m.receiver_id, m.content,
                m.is_read, m.created_at, m.deleted_at, u.name, u.avatar_url
         FROM private_messages m
         LEFT JOIN users u ON m.sender_id = u.id
         WHERE m.event_id = ?1
           AND ((m.sender_id = ?2 AND m.receiver_id = ?3)
             OR (m.sender_id = ?3 AND m.receiver_id = ?2))
           AND m.deleted_at IS NULL",
    );
    if since.is_some() {
        sql.push_str(" AND m.created_at > ?4");
    }
    sql.push_str(" ORDER BY m.created_at ASC, m.rowid ASC");

    let mut stmt = conn.prepare(&sql)?;

    let rows = if let Some(since) = since {
        stmt.query_map(
            rusqlite::params![event_id, user_a, user_b, since],
            map_message_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?
    } else {
        stmt.query_map(rusqlite::params![event_id, user_a, user_b], map_message_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    Ok(rows)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        sender_id: row.get(2)?,
        receiver_id: row.get(3)?,
        content: row.get(4)?,
        is_read: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        deleted_at: row.get(7)?,
        sender_name: row.get(8)?,
        sender_avatar: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("usr_1", Some("Anar"), None).unwrap();
        db.create_user("usr_2", Some("Bolor"), Some("/a/b.png")).unwrap();
        db.create_user("usr_3", Some("Chono"), None).unwrap();
        db.create_event("evt_1", "Jazz Night", None, "usr_1").unwrap();
        db.create_event("evt_2", "Food Fair", None, "usr_2").unwrap();
        db
    }

    #[test]
    fn listing_is_ordered_and_excludes_deleted() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_1", "usr_2", "hi", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.insert_message("m2", "evt_1", "usr_2", "usr_1", "hello", "2026-01-01T00:00:01.000Z")
            .unwrap();
        db.insert_message("m3", "evt_1", "usr_1", "usr_2", "bye", "2026-01-01T00:00:02.000Z")
            .unwrap();
        db.soft_delete_message("m2", "2026-01-01T00:01:00.000Z").unwrap();

        let messages = db.list_messages("evt_1", "usr_1", "usr_2").unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m1", "m3"]);
        assert_eq!(messages[0].sender_name.as_deref(), Some("Anar"));
    }

    #[test]
    fn equal_timestamps_keep_insertion_order() {
        let db = seeded();
        for i in 0..5 {
            db.insert_message(
                &format!("m{}", i),
                "evt_1",
                "usr_1",
                "usr_2",
                "x",
                "2026-01-01T00:00:00.000Z",
            )
            .unwrap();
        }

        let messages = db.list_messages("evt_1", "usr_2", "usr_1").unwrap();
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn list_since_returns_strictly_newer_rows() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_1", "usr_2", "old", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.insert_message("m2", "evt_1", "usr_1", "usr_2", "new", "2026-01-01T00:00:05.000Z")
            .unwrap();

        let messages = db
            .list_messages_since("evt_1", "usr_1", "usr_2", "2026-01-01T00:00:00.000Z")
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "m2");
    }

    #[test]
    fn mark_read_is_idempotent() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_2", "usr_1", "hi", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.insert_message("m2", "evt_1", "usr_2", "usr_1", "yo", "2026-01-01T00:00:01.000Z")
            .unwrap();

        assert_eq!(db.mark_read("evt_1", "usr_1", "usr_2").unwrap(), 2);
        assert_eq!(db.unread_count_for_thread("evt_1", "usr_1", "usr_2").unwrap(), 0);
        // Second run touches nothing.
        assert_eq!(db.mark_read("evt_1", "usr_1", "usr_2").unwrap(), 0);
    }

    #[test]
    fn unread_badge_counts_threads_not_messages() {
        let db = seeded();
        for i in 0..5 {
            db.insert_message(
                &format!("a{}", i),
                "evt_1",
                "usr_2",
                "usr_1",
                "spam",
                "2026-01-01T00:00:00.000Z",
            )
            .unwrap();
        }
        db.insert_message("b1", "evt_2", "usr_3", "usr_1", "hey", "2026-01-01T00:00:00.000Z")
            .unwrap();

        let (total, threads) = db.aggregate_unread("usr_1").unwrap();
        assert_eq!(total, 6);
        assert_eq!(threads, 2);
    }

    #[test]
    fn unread_ignores_soft_deleted() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_2", "usr_1", "hi", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.soft_delete_message("m1", "2026-01-01T00:01:00.000Z").unwrap();

        assert_eq!(db.unread_count_for_thread("evt_1", "usr_1", "usr_2").unwrap(), 0);
        let (total, threads) = db.aggregate_unread("usr_1").unwrap();
        assert_eq!((total, threads), (0, 0));
    }

    #[test]
    fn soft_delete_keeps_first_timestamp() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_1", "usr_2", "hi", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.soft_delete_message("m1", "2026-01-01T00:01:00.000Z").unwrap();
        db.soft_delete_message("m1", "2026-02-02T00:00:00.000Z").unwrap();

        let row = db.get_message("m1").unwrap().unwrap();
        assert_eq!(row.deleted_at.as_deref(), Some("2026-01-01T00:01:00.000Z"));
    }

    #[test]
    fn inbox_rows_cover_both_directions() {
        let db = seeded();
        db.insert_message("m1", "evt_1", "usr_1", "usr_2", "sent", "2026-01-01T00:00:00.000Z")
            .unwrap();
        db.insert_message("m2", "evt_2", "usr_3", "usr_1", "received", "2026-01-01T00:00:01.000Z")
            .unwrap();

        let rows = db.list_inbox_messages("usr_1").unwrap();
        assert_eq!(rows.len(), 2);
        // Newest first.
        assert_eq!(rows[0].content, "received");
        assert_eq!(rows[0].event_title, "Food Fair");
    }
}
