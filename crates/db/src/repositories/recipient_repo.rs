//! Recipient resolution against the directory tables.
//!
//! Compiles a [`Selection`] into a single `SELECT` over `users`. Position
//! and placement conditions are `EXISTS` subqueries, so a user appears at
//! most once no matter how many links match. Results are ordered by id.

use lagooz_core::communication::RecipientContact;
use lagooz_core::roles::UserRole;
use lagooz_core::targeting::predicate::{Audience, Selection, StaffFilter};
use lagooz_core::targeting::{CallerContext, RecipientPredicate};
use lagooz_core::types::DbId;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::recipient::RecipientRow;
use crate::models::user::User;
use crate::repositories::{SchoolClassRepo, UserRepo};

const SELECT_RECIPIENTS: &str = "SELECT u.id, b.name AS branch_name, u.first_name, u.last_name, \
    u.email, u.profile_picture \
    FROM users u LEFT JOIN branches b ON b.id = u.branch_id WHERE ";

pub struct RecipientRepo;

impl RecipientRepo {
    /// Load what the engine needs to know about `user`.
    pub async fn caller_context(pool: &PgPool, user: &User) -> Result<CallerContext, sqlx::Error> {
        let role = user.user_role();
        let mut caller = CallerContext {
            user_id: user.id,
            role,
            branch_id: user.branch_id,
            ..Default::default()
        };
        match role {
            Some(UserRole::Student) => {
                caller.linked_parent_ids = UserRepo::linked_parent_ids(pool, user.id).await?;
            }
            Some(UserRole::Parent) => {
                caller.child_placements = SchoolClassRepo::child_placements(pool, user.id).await?;
            }
            _ => {}
        }
        Ok(caller)
    }

    /// All users matched by `predicate`, ordered by id.
    pub async fn resolve(
        pool: &PgPool,
        predicate: &RecipientPredicate,
    ) -> Result<Vec<RecipientRow>, sqlx::Error> {
        let RecipientPredicate::Match(selection) = predicate else {
            return Ok(Vec::new());
        };
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPIENTS);
        push_selection(&mut qb, selection);
        qb.push(" ORDER BY u.id");
        qb.build_query_as::<RecipientRow>().fetch_all(pool).await
    }

    /// One user, if `predicate` matches them.
    pub async fn find_in_scope(
        pool: &PgPool,
        predicate: &RecipientPredicate,
        id: DbId,
    ) -> Result<Option<RecipientRow>, sqlx::Error> {
        let RecipientPredicate::Match(selection) = predicate else {
            return Ok(None);
        };
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPIENTS);
        push_selection(&mut qb, selection);
        qb.push(" AND u.id = ");
        qb.push_bind(id);
        qb.build_query_as::<RecipientRow>()
            .fetch_optional(pool)
            .await
    }

    /// The subset of `ids` that `predicate` allows, with their emails.
    pub async fn allowed_contacts(
        pool: &PgPool,
        predicate: &RecipientPredicate,
        ids: &[DbId],
    ) -> Result<Vec<RecipientContact>, sqlx::Error> {
        let RecipientPredicate::Match(selection) = predicate else {
            return Ok(Vec::new());
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPIENTS);
        push_selection(&mut qb, selection);
        qb.push(" AND u.id = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(") ORDER BY u.id");
        let rows = qb.build_query_as::<RecipientRow>().fetch_all(pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| RecipientContact {
                id: row.id,
                email: row.email,
            })
            .collect())
    }

    /// Rows for stored recipient ids regardless of any filter.
    ///
    /// Used when a draft's snapshot no longer resolves: the ids frozen at
    /// submission still have to be shown. Inactive users are left out.
    pub async fn by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<RecipientRow>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_RECIPIENTS);
        qb.push("u.is_active AND u.id = ANY(");
        qb.push_bind(ids.to_vec());
        qb.push(") ORDER BY u.id");
        qb.build_query_as::<RecipientRow>().fetch_all(pool).await
    }
}

fn push_selection(qb: &mut QueryBuilder<'_, Postgres>, selection: &Selection) {
    qb.push("u.is_active AND u.id <> ");
    qb.push_bind(selection.exclude_user_id);

    if let Some(branch_id) = selection.branch_id {
        qb.push(" AND u.branch_id = ");
        qb.push_bind(branch_id);
    }

    match &selection.audience {
        Audience::Anyone => {}
        Audience::Role(role) => {
            qb.push(" AND u.role = ");
            qb.push_bind(role.as_str());
        }
        Audience::Students {
            student_class_id,
            class_arm_id,
        } => {
            qb.push(" AND u.role = ");
            qb.push_bind(UserRole::Student.as_str());
            if let Some(class_id) = student_class_id {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM student_placements sp \
                     WHERE sp.student_id = u.id AND sp.student_class_id = ",
                );
                qb.push_bind(*class_id);
                if let Some(arm_id) = class_arm_id {
                    qb.push(" AND sp.class_arm_id = ");
                    qb.push_bind(*arm_id);
                }
                qb.push(")");
            }
        }
        Audience::Users(ids) => {
            qb.push(" AND u.id = ANY(");
            qb.push_bind(ids.clone());
            qb.push(")");
        }
        Audience::Staff(filter) => push_staff_filter(qb, filter),
    }

    if let Some(term) = &selection.search {
        let pattern = like_pattern(term);
        qb.push(" AND (u.first_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR u.last_name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR u.email ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
}

fn push_staff_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &StaffFilter) {
    let roles: Vec<String> = filter
        .role_scope
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();
    qb.push(" AND u.role = ANY(");
    qb.push_bind(roles);
    qb.push(")");

    if !filter.staff_types.is_empty() {
        let staff_types: Vec<String> = filter
            .staff_types
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();
        qb.push(" AND (u.role <> ");
        qb.push_bind(UserRole::Staff.as_str());
        qb.push(" OR u.staff_type = ANY(");
        qb.push_bind(staff_types);
        qb.push("))");
    }

    qb.push(" AND (");

    let mut first = true;
    if !filter.teaching_positions.is_empty() {
        first = false;
        qb.push(
            "EXISTS (SELECT 1 FROM user_teaching_positions utp \
             WHERE utp.user_id = u.id AND utp.teaching_position_id = ANY(",
        );
        qb.push_bind(filter.teaching_positions.clone());
        qb.push(
            ")) OR EXISTS (SELECT 1 FROM staff_assignments sa \
             WHERE sa.user_id = u.id AND sa.teaching_position_id = ANY(",
        );
        qb.push_bind(filter.teaching_positions.clone());
        qb.push("))");
    }
    if !filter.non_teaching_positions.is_empty() {
        if !first {
            qb.push(" OR ");
        }
        first = false;
        qb.push(
            "EXISTS (SELECT 1 FROM user_non_teaching_positions untp \
             WHERE untp.user_id = u.id AND untp.non_teaching_position_id = ANY(",
        );
        qb.push_bind(filter.non_teaching_positions.clone());
        qb.push(
            ")) OR EXISTS (SELECT 1 FROM staff_assignments sa \
             WHERE sa.user_id = u.id AND sa.non_teaching_position_id = ANY(",
        );
        qb.push_bind(filter.non_teaching_positions.clone());
        qb.push("))");
    }
    if first {
        // No bucket requested: match nothing rather than everyone.
        qb.push("false");
    }
    qb.push(")");

    if let Some(slot) = filter.managing {
        qb.push(
            " AND EXISTS (SELECT 1 FROM staff_assignments sa \
             WHERE sa.user_id = u.id AND sa.student_class_id = ",
        );
        qb.push_bind(slot.student_class_id);
        qb.push(" AND sa.class_arm_id = ");
        qb.push_bind(slot.class_arm_id);
        qb.push(")");
    }
}

/// Wrap a search term for `ILIKE`, escaping its wildcards.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
