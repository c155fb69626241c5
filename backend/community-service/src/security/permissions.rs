/// Ownership checks for editing and deleting community content
///
/// Every app picks one policy per operation. A record without an author
/// (tennis posts can lose theirs) is only editable by staff.
use crate::error::{AppError, Result};
use crate::models::{Authored, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipPolicy {
    /// Only the author
    AuthorOnly,
    /// The author or any staff account
    AuthorOrStaff,
    /// The author, staff, or a marketplace moderator
    AuthorOrModerator,
}

impl OwnershipPolicy {
    pub fn allows<T: Authored + ?Sized>(self, user: &User, record: &T) -> bool {
        let is_author = record.author_id() == Some(user.id);
        match (self, record.author_id()) {
            (_, None) => user.is_staff,
            (OwnershipPolicy::AuthorOnly, _) => is_author,
            (OwnershipPolicy::AuthorOrStaff, _) => is_author || user.is_staff,
            (OwnershipPolicy::AuthorOrModerator, _) => {
                is_author || user.is_staff || user.is_moderator
            }
        }
    }

    /// `Err(Authorization)` when `user` may not modify `record`
    pub fn check<T: Authored + ?Sized>(self, user: &User, record: &T) -> Result<()> {
        if self.allows(user, record) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = user.id,
                author_id = ?record.author_id(),
                policy = ?self,
                "Permission denied"
            );
            Err(AppError::Authorization(
                "You don't have permission to modify this content".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Record(Option<i64>);

    impl Authored for Record {
        fn author_id(&self) -> Option<i64> {
            self.0
        }
    }

    fn user(id: i64, is_staff: bool, is_moderator: bool) -> User {
        User {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            is_staff,
            is_moderator,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn author_only_rejects_staff() {
        let record = Record(Some(1));
        assert!(OwnershipPolicy::AuthorOnly.allows(&user(1, false, false), &record));
        assert!(!OwnershipPolicy::AuthorOnly.allows(&user(2, true, false), &record));
    }

    #[test]
    fn author_or_staff() {
        let record = Record(Some(1));
        assert!(OwnershipPolicy::AuthorOrStaff.allows(&user(2, true, false), &record));
        assert!(!OwnershipPolicy::AuthorOrStaff.allows(&user(2, false, true), &record));
    }

    #[test]
    fn moderators_may_edit_marketplace_items() {
        let record = Record(Some(1));
        assert!(OwnershipPolicy::AuthorOrModerator.allows(&user(3, false, true), &record));
        assert!(!OwnershipPolicy::AuthorOrModerator.allows(&user(3, false, false), &record));
    }

    #[test]
    fn authorless_records_are_staff_only() {
        let record = Record(None);
        assert!(!OwnershipPolicy::AuthorOnly.allows(&user(1, false, false), &record));
        assert!(OwnershipPolicy::AuthorOnly.allows(&user(1, true, false), &record));
        assert!(!OwnershipPolicy::AuthorOrModerator.allows(&user(1, false, true), &record));
    }

    #[test]
    fn check_maps_to_forbidden() {
        let err = OwnershipPolicy::AuthorOrStaff
            .check(&user(2, false, false), &Record(Some(1)))
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
    }
}
