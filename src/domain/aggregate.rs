//! Grouping of individual requests into per-title aggregates.
//!
//! Every snapshot of the request collection is aggregated from scratch. The
//! functions here are pure: they hold no state between calls.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use nonempty::NonEmpty;

use crate::{
    domain::{
        Title,
        request::{IntegrityError, RequestRecord, VisitorId},
    },
    storage::{Document, DocumentId},
};

/// All requests for one title, merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGroup {
    /// The shared title of every member.
    pub movie_title: Title,
    /// Member request ids, in snapshot order.
    pub member_ids: NonEmpty<DocumentId>,
    /// Requester of each member, parallel to `member_ids`.
    pub requester_ids: NonEmpty<VisitorId>,
    /// Most recent `requested_at` among the members.
    pub latest_requested_at: DateTime<Utc>,
    /// Whether every member has been actioned.
    pub all_actioned: bool,
}

impl RequestGroup {
    fn start(record: RequestRecord) -> Self {
        Self {
            movie_title: record.movie_title,
            member_ids: NonEmpty::new(record.id),
            requester_ids: NonEmpty::new(record.requested_by),
            latest_requested_at: record.requested_at,
            all_actioned: record.action_taken,
        }
    }

    fn absorb(&mut self, record: RequestRecord) {
        self.member_ids.push(record.id);
        self.requester_ids.push(record.requested_by);
        self.latest_requested_at = self.latest_requested_at.max(record.requested_at);
        self.all_actioned &= record.action_taken;
    }

    /// Number of requests in the group.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.member_ids.len()
    }

    /// Number of different visitors who asked for this title.
    #[must_use]
    pub fn distinct_requesters(&self) -> usize {
        self.requester_ids.iter().collect::<HashSet<_>>().len()
    }
}

/// Group `records` by exact title and order the groups.
///
/// Groups that still need attention come first; within each half, the most
/// recently requested title comes first. Ties keep the order in which their
/// titles first appear in `records`.
#[must_use]
pub fn group_requests(records: impl IntoIterator<Item = RequestRecord>) -> Vec<RequestGroup> {
    // Insertion-ordered map: the index gives each title's slot in `groups`.
    let mut index: HashMap<Title, usize> = HashMap::new();
    let mut groups: Vec<RequestGroup> = Vec::new();

    for record in records {
        match index.get(&record.movie_title) {
            Some(&slot) => groups[slot].absorb(record),
            None => {
                index.insert(record.movie_title.clone(), groups.len());
                groups.push(RequestGroup::start(record));
            }
        }
    }

    groups.sort_by(|a, b| {
        a.all_actioned
            .cmp(&b.all_actioned)
            .then_with(|| b.latest_requested_at.cmp(&a.latest_requested_at))
    });
    groups
}

/// The aggregated view of one request snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregation {
    /// Ordered request groups.
    pub groups: Vec<RequestGroup>,
    /// Documents excluded because they are malformed.
    pub rejected: Vec<IntegrityError>,
}

impl Aggregation {
    /// Validate and aggregate a full snapshot of request documents.
    ///
    /// Malformed documents are left out of every group and reported in
    /// [`Aggregation::rejected`]; they never abort the pass.
    #[must_use]
    pub fn from_snapshot(documents: &[Document]) -> Self {
        let mut rejected = Vec::new();
        let records: Vec<_> = documents
            .iter()
            .filter_map(|document| {
                RequestRecord::from_document(document)
                    .map_err(|e| rejected.push(e))
                    .ok()
            })
            .collect();

        Self {
            groups: group_requests(records),
            rejected,
        }
    }

    /// Find the group for an exact title.
    #[must_use]
    pub fn find(&self, title: &str) -> Option<&RequestGroup> {
        self.groups.iter().find(|g| g.movie_title.as_str() == title)
    }

    /// Number of groups still awaiting action.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.groups.iter().filter(|g| !g.all_actioned).count()
    }

    /// Number of groups with every request actioned.
    #[must_use]
    pub fn actioned_count(&self) -> usize {
        self.groups.len() - self.open_count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::domain::request::Problem;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn record(id: &str, title: &str, seconds: i64, actioned: bool) -> RequestRecord {
        record_by(id, title, seconds, actioned, "visitor")
    }

    fn record_by(
        id: &str,
        title: &str,
        seconds: i64,
        actioned: bool,
        by: &str,
    ) -> RequestRecord {
        RequestRecord {
            id: DocumentId::from(id),
            movie_title: Title::try_from(title).unwrap(),
            requested_at: at(seconds),
            requested_by: VisitorId::new(by).unwrap(),
            action_taken: actioned,
        }
    }

    fn titles(groups: &[RequestGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.movie_title.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_requests(Vec::new()).is_empty());
        assert_eq!(Aggregation::from_snapshot(&[]), Aggregation::default());
    }

    #[test]
    fn mixed_actions_make_an_open_group() {
        let groups = group_requests(vec![
            record("a", "Dune", 1, false),
            record("b", "Dune", 2, true),
        ]);

        assert_eq!(groups.len(), 1);
        let dune = &groups[0];
        assert!(!dune.all_actioned);
        assert_eq!(dune.latest_requested_at, at(2));
        assert_eq!(dune.request_count(), 2);
    }

    #[test]
    fn open_groups_precede_actioned_groups_regardless_of_recency() {
        let groups = group_requests(vec![
            record("a", "Arrival", 9, true),
            record("b", "Dune", 5, false),
        ]);
        assert_eq!(titles(&groups), vec!["Dune", "Arrival"]);

        let groups = group_requests(vec![
            record("a", "Arrival", 1, true),
            record("b", "Dune", 5, false),
        ]);
        assert_eq!(titles(&groups), vec!["Dune", "Arrival"]);
    }

    #[test]
    fn most_recent_first_within_each_partition() {
        let groups = group_requests(vec![
            record("1", "Old open", 1, false),
            record("2", "Old done", 2, true),
            record("3", "New open", 10, false),
            record("4", "New done", 20, true),
            record("5", "Mid open", 5, false),
        ]);

        assert_eq!(
            titles(&groups),
            vec!["New open", "Mid open", "Old open", "New done", "Old done"]
        );
    }

    #[test]
    fn ties_keep_first_appearance_order() {
        let groups = group_requests(vec![
            record("1", "B", 3, false),
            record("2", "A", 3, false),
            record("3", "C", 3, false),
        ]);
        assert_eq!(titles(&groups), vec!["B", "A", "C"]);
    }

    #[test]
    fn members_keep_snapshot_order_and_parallel_requesters() {
        let groups = group_requests(vec![
            record_by("1", "Dune", 1, false, "alice"),
            record_by("2", "Arrival", 2, false, "bob"),
            record_by("3", "Dune", 3, false, "carol"),
        ]);
        let dune = groups.iter().find(|g| g.movie_title.as_str() == "Dune").unwrap();

        let ids: Vec<_> = dune.member_ids.iter().map(DocumentId::as_str).collect();
        let by: Vec<_> = dune.requester_ids.iter().map(VisitorId::as_str).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(by, vec!["alice", "carol"]);
    }

    #[test]
    fn duplicate_requesters_are_distinct_members() {
        let groups = group_requests(vec![
            record_by("1", "Dune", 1, false, "alice"),
            record_by("2", "Dune", 2, false, "alice"),
        ]);

        assert_eq!(groups[0].request_count(), 2);
        assert_eq!(groups[0].distinct_requesters(), 1);
    }

    #[test]
    fn titles_group_case_sensitively() {
        let groups = group_requests(vec![
            record("1", "Dune", 1, false),
            record("2", "dune", 2, false),
            record("3", "Dune ", 3, false),
        ]);
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn single_member_group_uses_its_timestamp() {
        let early = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        let mut only = record("1", "Metropolis", 0, true);
        only.requested_at = early;

        let groups = group_requests(vec![only]);

        assert_eq!(groups[0].latest_requested_at, early);
        assert!(groups[0].all_actioned);
    }

    #[test]
    fn groups_partition_the_input() {
        let records: Vec<_> = (0..40)
            .map(|n| {
                record(
                    &format!("id-{n}"),
                    ["Dune", "Arrival", "Heat", "Alien"][n % 4],
                    i64::try_from(n * 7 % 13).unwrap(),
                    n % 3 == 0,
                )
            })
            .collect();
        let groups = group_requests(records.clone());

        let mut seen: Vec<&DocumentId> = groups.iter().flat_map(|g| g.member_ids.iter()).collect();
        seen.sort();
        let mut expected: Vec<&DocumentId> = records.iter().map(|r| &r.id).collect();
        expected.sort();
        assert_eq!(seen, expected);

        for group in &groups {
            for id in group.member_ids.iter() {
                let member = records.iter().find(|r| &r.id == id).unwrap();
                assert_eq!(member.movie_title, group.movie_title);
            }
        }

        let first_actioned = groups.iter().position(|g| g.all_actioned);
        if let Some(first) = first_actioned {
            assert!(groups[first..].iter().all(|g| g.all_actioned));
        }
        for pair in groups.windows(2) {
            if pair[0].all_actioned == pair[1].all_actioned {
                assert!(pair[0].latest_requested_at >= pair[1].latest_requested_at);
            }
        }
    }

    #[test]
    fn aggregation_is_idempotent() {
        let documents: Vec<_> = [
            ("1", "Dune", "2025-01-01T00:00:00Z", false),
            ("2", "Arrival", "2025-01-02T00:00:00Z", true),
            ("3", "Dune", "2025-01-03T00:00:00Z", true),
        ]
        .into_iter()
        .map(|(id, title, at, done)| {
            Document::new(
                DocumentId::from(id),
                json!({"movieTitle": title, "requestedAt": at, "requestedBy": "v", "actionTaken": done})
                    .as_object()
                    .unwrap()
                    .clone(),
            )
        })
        .collect();

        assert_eq!(
            Aggregation::from_snapshot(&documents),
            Aggregation::from_snapshot(&documents)
        );
    }

    #[test]
    fn malformed_documents_are_excluded_and_reported() {
        let documents = vec![
            Document::new(
                DocumentId::from("good"),
                json!({"movieTitle": "Dune", "requestedAt": "2025-01-01T00:00:00Z", "requestedBy": "v"})
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
            Document::new(
                DocumentId::from("bad"),
                json!({"movieTitle": "Dune", "requestedAt": 12, "requestedBy": "v"})
                    .as_object()
                    .unwrap()
                    .clone(),
            ),
        ];

        let aggregation = Aggregation::from_snapshot(&documents);

        assert_eq!(aggregation.groups.len(), 1);
        assert_eq!(aggregation.groups[0].request_count(), 1);
        assert_eq!(aggregation.rejected.len(), 1);
        assert_eq!(aggregation.rejected[0].id.as_str(), "bad");
        assert_eq!(
            aggregation.rejected[0].problem,
            Problem::InvalidTimestamp("12".to_string())
        );
        assert_eq!(aggregation.open_count(), 1);
        assert_eq!(aggregation.actioned_count(), 0);
    }
}
