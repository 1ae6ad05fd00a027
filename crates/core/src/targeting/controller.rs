//! Client-side state machine for the target-group form.
//!
//! The controller owns the form values, the displayed candidates and the
//! selection, and persists the form and the selection through a
//! [`StateStore`] under two keys. It never talks to the network: field
//! changes return a [`ResolveOutcome`] and the host issues the query and
//! feeds the response back through [`TargetGroupController::receive`].
//!
//! Every issued query carries a sequence number. Only the response to the
//! most recent query is rendered, so a slow response to an older filter can
//! never replace the candidates for a newer one.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::roles::{StaffType, UserRole};
use crate::types::DbId;

use super::criteria::FilterCriteria;
use super::predicate::EmptyReason;
use super::snapshot::{SavedFilterData, SavedFilterFields};
use super::visibility::{FieldVisibility, TargetGroupForm};

/// Storage key for the filter form values.
pub const FILTERS_KEY: &str = "targetGroupFilters";
/// Storage key for the selected recipient ids.
pub const SELECTION_KEY: &str = "selectedRecipients";

/// Durable key-value storage surviving a page reload.
pub trait StateStore {
    fn load(&self, key: &str) -> Option<String>;
    fn save(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// [`StateStore`] backed by a map. Used in tests and by hosts without
/// persistent storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn save(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// One row of the candidate table, as returned by the recipient endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: DbId,
    #[serde(rename = "branch__name")]
    pub branch_name: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_picture: Option<ProfilePicture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePicture {
    pub url: String,
}

/// A recipient query the host should issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub seq: u64,
    pub criteria: FilterCriteria,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Query(QueryRequest),
    /// Nothing to query; show the reason in place of the table.
    Empty(EmptyReason),
}

/// A single edit to the filter form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Branch(Option<DbId>),
    Role(Option<UserRole>),
    StaffType(Option<StaffType>),
    TeachingPosition { id: DbId, checked: bool },
    NonTeachingPosition { id: DbId, checked: bool },
    StudentClass(Option<DbId>),
    ClassArm(Option<DbId>),
    Search(Option<String>),
}

/// Why a submit was blocked before reaching the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitBlocked {
    #[error("Missing Branch: please select a branch before sending.")]
    MissingBranch,
    #[error("Missing Role: please select who you are messaging.")]
    MissingRole,
}

/// Hidden fields appended to the submission form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupSubmission {
    pub saved: SavedFilterFields,
    pub selected_recipients: Vec<DbId>,
}

pub struct TargetGroupController<S: StateStore> {
    caller_role: UserRole,
    class_teacher_positions: BTreeSet<DbId>,
    form: TargetGroupForm,
    visibility: FieldVisibility,
    search: Option<String>,
    candidates: Vec<Candidate>,
    placeholder: Option<EmptyReason>,
    selection: BTreeSet<DbId>,
    select_all: bool,
    next_seq: u64,
    latest_seq: Option<u64>,
    store: S,
}

impl<S: StateStore> TargetGroupController<S> {
    /// Page init: restore the form and selection from `store`.
    ///
    /// `class_teacher_positions` are the teaching positions offered on the
    /// form that confer class-teacher responsibility.
    pub fn new(
        caller_role: UserRole,
        class_teacher_positions: BTreeSet<DbId>,
        store: S,
    ) -> (Self, ResolveOutcome) {
        let form = store
            .load(FILTERS_KEY)
            .and_then(|raw| serde_json::from_str::<TargetGroupForm>(&raw).ok())
            .unwrap_or_default();
        let selection = store
            .load(SELECTION_KEY)
            .and_then(|raw| serde_json::from_str::<BTreeSet<DbId>>(&raw).ok())
            .unwrap_or_default();
        Self::start(caller_role, class_teacher_positions, form, selection, store)
    }

    /// Draft edit init: start from a stored snapshot and recipient ids,
    /// overwriting whatever the store held.
    pub fn from_snapshot(
        caller_role: UserRole,
        class_teacher_positions: BTreeSet<DbId>,
        snapshot: &SavedFilterData,
        selected: &[DbId],
        store: S,
    ) -> (Self, ResolveOutcome) {
        let form = TargetGroupForm {
            branch: snapshot.branch_id,
            role: snapshot.role,
            staff_type: snapshot.staff_type,
            teaching_positions: snapshot.teaching_positions.iter().copied().collect(),
            non_teaching_positions: snapshot.non_teaching_positions.iter().copied().collect(),
            student_class: snapshot.student_class_id,
            class_arm: snapshot.class_arm_id,
        };
        let selection = selected.iter().copied().collect();
        let (mut this, outcome) =
            Self::start(caller_role, class_teacher_positions, form, selection, store);
        this.persist_filters();
        this.persist_selection();
        (this, outcome)
    }

    fn start(
        caller_role: UserRole,
        class_teacher_positions: BTreeSet<DbId>,
        mut form: TargetGroupForm,
        selection: BTreeSet<DbId>,
        store: S,
    ) -> (Self, ResolveOutcome) {
        let visibility = form.apply_visibility(caller_role, &class_teacher_positions);
        let mut this = Self {
            caller_role,
            class_teacher_positions,
            form,
            visibility,
            search: None,
            candidates: Vec::new(),
            placeholder: None,
            selection,
            select_all: false,
            next_seq: 1,
            latest_seq: None,
            store,
        };
        let outcome = this.resolve();
        (this, outcome)
    }

    pub fn form(&self) -> &TargetGroupForm {
        &self.form
    }

    pub fn visibility(&self) -> FieldVisibility {
        self.visibility
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn placeholder(&self) -> Option<EmptyReason> {
        self.placeholder
    }

    pub fn selection(&self) -> &BTreeSet<DbId> {
        &self.selection
    }

    pub fn select_all_checked(&self) -> bool {
        self.select_all
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply a field edit.
    ///
    /// Any filter change clears the selection and the select-all toggle,
    /// saves the form, and re-resolves. A search edit only re-resolves.
    pub fn change(&mut self, change: FieldChange) -> ResolveOutcome {
        match change {
            FieldChange::Search(term) => {
                self.search = term.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
                return self.resolve();
            }
            FieldChange::Branch(v) => self.form.branch = v,
            FieldChange::Role(v) => self.form.role = v,
            FieldChange::StaffType(v) => self.form.staff_type = v,
            FieldChange::TeachingPosition { id, checked } => {
                toggle(&mut self.form.teaching_positions, id, checked)
            }
            FieldChange::NonTeachingPosition { id, checked } => {
                toggle(&mut self.form.non_teaching_positions, id, checked)
            }
            FieldChange::StudentClass(v) => self.form.student_class = v,
            FieldChange::ClassArm(v) => self.form.class_arm = v,
        }

        self.visibility = self
            .form
            .apply_visibility(self.caller_role, &self.class_teacher_positions);
        self.selection.clear();
        self.select_all = false;
        self.persist_filters();
        self.persist_selection();
        self.resolve()
    }

    /// Decide whether the current form warrants a query.
    ///
    /// Issuing a query or an empty outcome both invalidate any query still
    /// in flight.
    pub fn resolve(&mut self) -> ResolveOutcome {
        match self.empty_reason() {
            Some(reason) => {
                self.latest_seq = None;
                self.candidates.clear();
                self.placeholder = Some(reason);
                self.select_all = false;
                ResolveOutcome::Empty(reason)
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.latest_seq = Some(seq);
                ResolveOutcome::Query(QueryRequest {
                    seq,
                    criteria: self.form.to_criteria(self.search.clone()),
                })
            }
        }
    }

    fn empty_reason(&self) -> Option<EmptyReason> {
        let form = &self.form;
        if form.is_empty_for(self.caller_role) {
            return Some(EmptyReason::FiltersEmpty);
        }
        match form.role {
            Some(UserRole::Student)
                if form.student_class.is_none() || form.class_arm.is_none() =>
            {
                Some(EmptyReason::StudentClassRequired)
            }
            Some(UserRole::Staff) => {
                let staff_type = form.staff_type?;
                let missing = match staff_type {
                    StaffType::Teaching => form.teaching_positions.is_empty(),
                    StaffType::NonTeaching => form.non_teaching_positions.is_empty(),
                    StaffType::Both => {
                        form.teaching_positions.is_empty()
                            && form.non_teaching_positions.is_empty()
                    }
                };
                if missing {
                    return Some(EmptyReason::PositionsRequired(staff_type));
                }
                let ticks_class_teacher = form
                    .teaching_positions
                    .iter()
                    .any(|id| self.class_teacher_positions.contains(id));
                if self.caller_role == UserRole::Parent && !ticks_class_teacher {
                    return Some(EmptyReason::ClassTeacherRequired);
                }
                let slot_missing = form.student_class.is_none() || form.class_arm.is_none();
                (self.visibility.student_class && slot_missing)
                    .then_some(EmptyReason::ClassArmPairRequired)
            }
            _ => None,
        }
    }

    /// Render a query response. Returns `false` and changes nothing when
    /// `seq` is not the latest issued query.
    ///
    /// Selected ids absent from the new list are dropped so they are never
    /// submitted without being shown.
    pub fn receive(&mut self, seq: u64, candidates: Vec<Candidate>) -> bool {
        if self.latest_seq != Some(seq) {
            return false;
        }
        self.latest_seq = None;
        self.placeholder = None;
        self.candidates = candidates;

        let shown: BTreeSet<DbId> = self.candidates.iter().map(|c| c.id).collect();
        let before = self.selection.len();
        self.selection.retain(|id| shown.contains(id));
        if self.selection.len() != before {
            self.persist_selection();
        }
        self.refresh_select_all();
        true
    }

    /// Check or uncheck one displayed candidate.
    pub fn toggle_recipient(&mut self, id: DbId, checked: bool) {
        if !self.candidates.iter().any(|c| c.id == id) {
            return;
        }
        toggle(&mut self.selection, id, checked);
        self.persist_selection();
        self.refresh_select_all();
    }

    /// Check or uncheck exactly the displayed candidates.
    pub fn toggle_select_all(&mut self, checked: bool) {
        for candidate in &self.candidates {
            toggle(&mut self.selection, candidate.id, checked);
        }
        self.persist_selection();
        self.refresh_select_all();
    }

    /// Validate and produce the hidden fields for the final submit.
    pub fn submit(&self) -> Result<TargetGroupSubmission, SubmitBlocked> {
        if self.caller_role.is_family() {
            if self.form.role.is_none() {
                return Err(SubmitBlocked::MissingRole);
            }
        } else if self.form.branch.is_none() {
            return Err(SubmitBlocked::MissingBranch);
        }

        let snapshot = SavedFilterData {
            branch_id: self.form.branch,
            role: self.form.role,
            staff_type: self.form.staff_type,
            student_class_id: self.form.student_class,
            class_arm_id: self.form.class_arm,
            teaching_positions: self.form.teaching_positions.iter().copied().collect(),
            non_teaching_positions: self.form.non_teaching_positions.iter().copied().collect(),
        };
        Ok(TargetGroupSubmission {
            saved: snapshot.to_fields(),
            selected_recipients: self.selection.iter().copied().collect(),
        })
    }

    /// Forget persisted state after the server accepted the submission.
    pub fn submitted(&mut self) {
        self.store.remove(FILTERS_KEY);
        self.store.remove(SELECTION_KEY);
        self.selection.clear();
        self.select_all = false;
    }

    fn refresh_select_all(&mut self) {
        self.select_all = !self.candidates.is_empty()
            && self
                .candidates
                .iter()
                .all(|c| self.selection.contains(&c.id));
    }

    fn persist_filters(&mut self) {
        if let Ok(raw) = serde_json::to_string(&self.form) {
            self.store.save(FILTERS_KEY, raw);
        }
    }

    fn persist_selection(&mut self) {
        if let Ok(raw) = serde_json::to_string(&self.selection) {
            self.store.save(SELECTION_KEY, raw);
        }
    }
}

fn toggle(set: &mut BTreeSet<DbId>, id: DbId, checked: bool) {
    if checked {
        set.insert(id);
    } else {
        set.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const CLASS_TEACHER: DbId = 11;

    fn class_teachers() -> BTreeSet<DbId> {
        [CLASS_TEACHER].into()
    }

    fn controller(role: UserRole) -> (TargetGroupController<MemoryStore>, ResolveOutcome) {
        TargetGroupController::new(role, class_teachers(), MemoryStore::default())
    }

    fn candidate(id: DbId) -> Candidate {
        Candidate {
            id,
            branch_name: Some("Main".into()),
            first_name: format!("First{id}"),
            last_name: "Last".into(),
            email: format!("u{id}@school.test"),
            profile_picture: None,
        }
    }

    fn query_seq(outcome: ResolveOutcome) -> u64 {
        match outcome {
            ResolveOutcome::Query(q) => q.seq,
            other => panic!("expected a query, got {other:?}"),
        }
    }

    /// A branch-admin controller showing candidates 1..=3 for a teaching filter.
    fn loaded() -> TargetGroupController<MemoryStore> {
        let (mut c, outcome) = controller(UserRole::BranchAdmin);
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::FiltersEmpty));
        c.change(FieldChange::Branch(Some(1)));
        c.change(FieldChange::Role(Some(UserRole::Staff)));
        c.change(FieldChange::StaffType(Some(StaffType::Teaching)));
        let seq = query_seq(c.change(FieldChange::TeachingPosition { id: 5, checked: true }));
        assert!(c.receive(seq, vec![candidate(1), candidate(2), candidate(3)]));
        c
    }

    #[test]
    fn positions_required_before_querying() {
        let (mut c, _) = controller(UserRole::Staff);
        c.change(FieldChange::Branch(Some(1)));
        c.change(FieldChange::Role(Some(UserRole::Staff)));
        let outcome = c.change(FieldChange::StaffType(Some(StaffType::NonTeaching)));
        assert_eq!(
            outcome,
            ResolveOutcome::Empty(EmptyReason::PositionsRequired(StaffType::NonTeaching))
        );
    }

    #[test]
    fn student_role_requires_class_and_arm() {
        let (mut c, _) = controller(UserRole::Superadmin);
        c.change(FieldChange::Branch(Some(1)));
        c.change(FieldChange::Role(Some(UserRole::Student)));
        let outcome = c.change(FieldChange::StudentClass(Some(4)));
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::StudentClassRequired));
        assert_matches!(c.change(FieldChange::ClassArm(Some(7))), ResolveOutcome::Query(_));
    }

    #[test]
    fn parent_builds_a_class_teacher_query() {
        let (mut c, _) = controller(UserRole::Parent);
        c.change(FieldChange::Role(Some(UserRole::Staff)));
        c.change(FieldChange::StaffType(Some(StaffType::Teaching)));
        let outcome = c.change(FieldChange::TeachingPosition {
            id: CLASS_TEACHER,
            checked: true,
        });
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::ClassArmPairRequired));
        assert!(c.visibility().student_class);

        c.change(FieldChange::StudentClass(Some(100)));
        assert!(c.visibility().class_arm);
        let outcome = c.change(FieldChange::ClassArm(Some(200)));
        assert_matches!(
            outcome,
            ResolveOutcome::Query(q)
                if q.criteria.student_class_id == Some(100)
                    && q.criteria.class_arm_id == Some(200)
                    && q.criteria.teaching_positions == vec![CLASS_TEACHER]
        );
    }

    #[test]
    fn parent_needs_a_class_teacher_position() {
        let (mut c, _) = controller(UserRole::Parent);
        c.change(FieldChange::Role(Some(UserRole::Staff)));
        c.change(FieldChange::StaffType(Some(StaffType::Teaching)));
        let outcome = c.change(FieldChange::TeachingPosition { id: 5, checked: true });
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::ClassTeacherRequired));
    }

    #[test]
    fn staff_like_class_teacher_position_asks_for_class_and_arm() {
        let mut c = loaded();
        let outcome = c.change(FieldChange::TeachingPosition {
            id: CLASS_TEACHER,
            checked: true,
        });
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::ClassArmPairRequired));
        assert!(c.visibility().student_class);

        c.change(FieldChange::StudentClass(Some(100)));
        assert_matches!(
            c.change(FieldChange::ClassArm(Some(200))),
            ResolveOutcome::Query(q) if q.criteria.class_arm_id == Some(200)
        );

        c.change(FieldChange::TeachingPosition {
            id: CLASS_TEACHER,
            checked: false,
        });
        assert!(!c.visibility().student_class);
        assert_eq!(c.form().student_class, None);
        assert_eq!(c.form().class_arm, None);
    }

    #[test]
    fn family_caller_only_needs_a_role() {
        let (mut c, outcome) = controller(UserRole::Student);
        assert_eq!(outcome, ResolveOutcome::Empty(EmptyReason::FiltersEmpty));
        assert!(!c.visibility().branch);
        assert_matches!(
            c.change(FieldChange::Role(Some(UserRole::Parent))),
            ResolveOutcome::Query(q) if q.criteria.role == Some(UserRole::Parent)
        );
    }

    #[test]
    fn selection_survives_reload_with_unchanged_filters() {
        let mut c = loaded();
        c.toggle_recipient(2, true);
        let store = c.store().clone();

        let (mut reloaded, outcome) =
            TargetGroupController::new(UserRole::BranchAdmin, class_teachers(), store);
        assert_eq!(reloaded.form(), c.form());
        let seq = query_seq(outcome);
        reloaded.receive(seq, vec![candidate(1), candidate(2), candidate(3)]);
        assert_eq!(reloaded.selection(), &BTreeSet::from([2]));
    }

    #[test]
    fn filter_change_clears_selection_and_select_all() {
        let mut c = loaded();
        c.toggle_select_all(true);
        assert!(c.select_all_checked());
        assert_eq!(c.selection().len(), 3);

        c.change(FieldChange::TeachingPosition { id: 6, checked: true });
        assert!(c.selection().is_empty());
        assert!(!c.select_all_checked());
        assert_eq!(c.store().load(SELECTION_KEY).as_deref(), Some("[]"));
    }

    #[test]
    fn search_keeps_the_selection() {
        let mut c = loaded();
        c.toggle_recipient(1, true);
        let seq = query_seq(c.change(FieldChange::Search(Some("first1".into()))));
        assert!(c.receive(seq, vec![candidate(1)]));
        assert_eq!(c.selection(), &BTreeSet::from([1]));
    }

    #[test]
    fn select_all_tracks_individual_toggles() {
        let mut c = loaded();
        c.toggle_recipient(1, true);
        c.toggle_recipient(2, true);
        assert!(!c.select_all_checked());
        c.toggle_recipient(3, true);
        assert!(c.select_all_checked());
        c.toggle_recipient(3, false);
        assert!(!c.select_all_checked());
    }

    #[test]
    fn stale_response_is_discarded() {
        let (mut c, _) = controller(UserRole::Superadmin);
        c.change(FieldChange::Branch(Some(1)));
        let first = query_seq(c.change(FieldChange::Role(Some(UserRole::Parent))));
        let second = query_seq(c.change(FieldChange::Role(Some(UserRole::Staff))));
        // Role=staff without a staff type is a plain role query.
        assert!(second > first);

        assert!(!c.receive(first, vec![candidate(9)]));
        assert!(c.candidates().is_empty());
        assert!(c.receive(second, vec![candidate(4)]));
        assert_eq!(c.candidates()[0].id, 4);
    }

    #[test]
    fn empty_outcome_invalidates_in_flight_query() {
        let mut c = loaded();
        let seq = query_seq(c.change(FieldChange::TeachingPosition { id: 6, checked: true }));
        c.change(FieldChange::Branch(None));
        assert!(!c.receive(seq, vec![candidate(1)]));
        assert_eq!(c.placeholder(), Some(EmptyReason::FiltersEmpty));
    }

    #[test]
    fn ids_missing_from_new_list_are_dropped() {
        let mut store = MemoryStore::default();
        let form = TargetGroupForm {
            branch: Some(1),
            ..Default::default()
        };
        store.save(FILTERS_KEY, serde_json::to_string(&form).unwrap());
        store.save(SELECTION_KEY, "[1,42]".into());

        let (mut c, outcome) = TargetGroupController::new(UserRole::Staff, class_teachers(), store);
        c.receive(query_seq(outcome), vec![candidate(1), candidate(2)]);
        assert_eq!(c.selection(), &BTreeSet::from([1]));
        assert_eq!(c.submit().unwrap().selected_recipients, vec![1]);
    }

    #[test]
    fn submit_requires_branch_or_role() {
        let (staff, _) = controller(UserRole::Staff);
        assert_eq!(staff.submit().unwrap_err(), SubmitBlocked::MissingBranch);

        let (parent, _) = controller(UserRole::Parent);
        assert_eq!(parent.submit().unwrap_err(), SubmitBlocked::MissingRole);
    }

    #[test]
    fn submit_serializes_filters_and_clears_on_success() {
        let mut c = loaded();
        c.toggle_recipient(3, true);
        c.toggle_recipient(1, true);

        let submission = c.submit().unwrap();
        assert_eq!(submission.selected_recipients, vec![1, 3]);
        assert_eq!(submission.saved.saved_branch, "1");
        assert_eq!(submission.saved.saved_role, "staff");
        assert_eq!(submission.saved.saved_staff_type, "teaching");
        assert_eq!(submission.saved.saved_teaching_positions, "5");

        c.submitted();
        assert_eq!(c.store().load(FILTERS_KEY), None);
        assert_eq!(c.store().load(SELECTION_KEY), None);
    }

    #[test]
    fn draft_snapshot_seeds_the_form() {
        let snapshot = SavedFilterData {
            branch_id: Some(1),
            role: Some(UserRole::Student),
            student_class_id: Some(4),
            class_arm_id: Some(7),
            ..Default::default()
        };
        let (c, outcome) = TargetGroupController::from_snapshot(
            UserRole::Staff,
            class_teachers(),
            &snapshot,
            &[10, 11],
            MemoryStore::default(),
        );
        assert_matches!(
            outcome,
            ResolveOutcome::Query(q) if q.criteria.student_class_id == Some(4)
        );
        assert_eq!(c.selection(), &BTreeSet::from([10, 11]));
        assert!(c.store().load(FILTERS_KEY).is_some());
    }
}
