use std::collections::HashMap;

use agora_shared::{Profile, UserId};
use rusqlite::{params, params_from_iter};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::messages::{format_ts, now_micros};

/// Ids bound per `IN (...)` query.
const PROFILE_LOOKUP_CHUNK: usize = 500;

impl Database {
    /// Create or replace the profile row of `user`.
    pub fn upsert_profile(&self, user: &UserId, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (id, full_name, avatar_url, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 full_name = excluded.full_name,
                 avatar_url = excluded.avatar_url,
                 updated_at = excluded.updated_at",
            params![
                user.as_str(),
                profile.display_name,
                profile.avatar_url,
                format_ts(&now_micros()?),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user: &UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT full_name, avatar_url FROM profiles WHERE id = ?1",
                params![user.as_str()],
                |row| {
                    Ok(Profile {
                        display_name: row.get(0)?,
                        avatar_url: row.get(1)?,
                    })
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Batch lookup. Users without a row are absent from the result.
    ///
    /// Ids are queried in chunks to stay under SQLite's bound-parameter limit.
    pub fn get_profiles<'a, I>(&self, users: I) -> Result<HashMap<UserId, Profile>>
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let ids: Vec<&str> = users.into_iter().map(UserId::as_str).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut profiles = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(PROFILE_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT id, full_name, avatar_url FROM profiles WHERE id IN ({placeholders})"
            );

            let mut stmt = self.conn().prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().copied()), |row| {
                let id: String = row.get(0)?;
                Ok((
                    UserId(id),
                    Profile {
                        display_name: row.get(1)?,
                        avatar_url: row.get(2)?,
                    },
                ))
            })?;

            for row in rows {
                let (id, profile) = row?;
                profiles.insert(id, profile);
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Profile {
        Profile {
            display_name: Some(name.to_string()),
            avatar_url: None,
        }
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::new("a1");

        db.upsert_profile(&user, &profile("Ada")).unwrap();
        db.upsert_profile(&user, &profile("Ada L.")).unwrap();

        assert_eq!(db.get_profile(&user).unwrap(), profile("Ada L."));
    }

    #[test]
    fn batch_lookup_skips_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_profile(&UserId::new("a1"), &profile("Ada")).unwrap();
        db.upsert_profile(&UserId::new("b2"), &profile("Bob")).unwrap();

        let wanted = [UserId::new("a1"), UserId::new("zz")];
        let found = db.get_profiles(&wanted).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[&UserId::new("a1")], profile("Ada"));
    }

    #[test]
    fn batch_lookup_spans_several_chunks() {
        let db = Database::open_in_memory().unwrap();
        let users: Vec<UserId> = (0..PROFILE_LOOKUP_CHUNK * 2 + 7)
            .map(|i| UserId::new(format!("user-{i}")))
            .collect();
        for (i, user) in users.iter().enumerate() {
            if i % 2 == 0 {
                db.upsert_profile(user, &profile(&format!("User {i}"))).unwrap();
            }
        }

        let found = db.get_profiles(&users).unwrap();
        assert_eq!(found.len(), (users.len() + 1) / 2);
        assert_eq!(found[&users[1000]], profile("User 1000"));
        assert!(!found.contains_key(&users[1001]));
    }

    #[test]
    fn empty_batch_skips_query() {
        let db = Database::open_in_memory().unwrap();
        let none: [UserId; 0] = [];
        assert!(db.get_profiles(&none).unwrap().is_empty());
        assert!(matches!(
            db.get_profile(&UserId::new("nobody")),
            Err(StoreError::NotFound)
        ));
    }
}
