//! In-memory job registry: the single source of truth for job records.
//!
//! The registry itself is not synchronized; the download manager keeps it
//! behind one mutex so that checking and applying a transition happen in the
//! same critical section. Every list method returns owned snapshots in
//! submission order.

use std::collections::{HashMap, HashSet};

use crate::job::{JobId, JobRecord, JobStatus};

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: HashMap<JobId, JobRecord>,
    /// Submission order; ids are removed together with their record.
    order: Vec<JobId>,
    active: HashSet<JobId>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.get(id).cloned()
    }

    pub(crate) fn get_mut(&mut self, id: &JobId) -> Option<&mut JobRecord> {
        self.jobs.get_mut(id)
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs.contains_key(id)
    }

    /// Insert or replace a record.
    pub fn put(&mut self, record: JobRecord) {
        let id = record.id;
        if self.jobs.insert(id, record).is_none() {
            self.order.push(id);
        }
    }

    /// Drop a record. Returns false if the id is unknown.
    pub fn remove(&mut self, id: &JobId) -> bool {
        if self.jobs.remove(id).is_none() {
            return false;
        }
        self.order.retain(|j| j != id);
        self.active.remove(id);
        true
    }

    pub fn list_all(&self) -> Vec<JobRecord> {
        self.collect(|_| true)
    }

    pub fn list_by_group(&self, group_id: &str) -> Vec<JobRecord> {
        self.collect(|r| r.group_id.as_deref() == Some(group_id))
    }

    pub fn list_by_status(&self, status: JobStatus) -> Vec<JobRecord> {
        self.collect(|r| r.status == status)
    }

    /// Live records in submission order, without cloning.
    pub(crate) fn records(&self) -> impl Iterator<Item = &JobRecord> + '_ {
        self.order.iter().filter_map(|id| self.jobs.get(id))
    }

    pub fn size(&self) -> usize {
        self.jobs.len()
    }

    pub(crate) fn mark_active(&mut self, id: JobId) {
        self.active.insert(id);
    }

    /// Returns true if the id was in the active set.
    pub(crate) fn clear_active(&mut self, id: &JobId) -> bool {
        self.active.remove(id)
    }

    pub fn is_active(&self, id: &JobId) -> bool {
        self.active.contains(id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn active_ids(&self) -> Vec<JobId> {
        self.active.iter().copied().collect()
    }

    fn collect(&self, keep: impl Fn(&JobRecord) -> bool) -> Vec<JobRecord> {
        self.records()
            .filter(|r| keep(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;
    use std::path::PathBuf;

    fn record(source: &str, group: Option<&str>) -> JobRecord {
        JobRecord::new(NewJob {
            source_id: source.into(),
            group_id: group.map(str::to_string),
            source_url: format!("https://example.com/watch?v={source}"),
            display_name: source.to_uppercase(),
            thumbnail: None,
            output_dir: PathBuf::from("/tmp"),
            format: "mp4".into(),
            quality: "720p".into(),
        })
    }

    #[test]
    fn put_get_remove() {
        let mut reg = JobRegistry::new();
        let r = record("a", None);
        let id = r.id;
        reg.put(r);
        assert_eq!(reg.size(), 1);
        assert_eq!(reg.get(&id).unwrap().source_id, "a");
        assert!(reg.remove(&id));
        assert!(!reg.remove(&id));
        assert!(reg.get(&id).is_none());
        assert_eq!(reg.size(), 0);
    }

    #[test]
    fn lists_keep_submission_order() {
        let mut reg = JobRegistry::new();
        let ids: Vec<_> = ["c", "a", "b"]
            .iter()
            .map(|s| {
                let r = record(s, Some("PL1"));
                let id = r.id;
                reg.put(r);
                id
            })
            .collect();
        let listed: Vec<_> = reg.list_all().into_iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn filters_by_group_and_status() {
        let mut reg = JobRegistry::new();
        reg.put(record("a", Some("PL1")));
        reg.put(record("b", Some("PL2")));
        let mut c = record("c", Some("PL1"));
        c.mark_active();
        reg.put(c);
        reg.put(record("d", None));

        assert_eq!(reg.list_by_group("PL1").len(), 2);
        assert_eq!(reg.list_by_group("PL3").len(), 0);
        assert_eq!(reg.list_by_status(JobStatus::Pending).len(), 3);
        assert_eq!(reg.list_by_status(JobStatus::Active).len(), 1);
    }

    #[test]
    fn snapshots_are_detached() {
        let mut reg = JobRegistry::new();
        let r = record("a", None);
        let id = r.id;
        reg.put(r);
        let mut snap = reg.list_all();
        snap[0].display_name = "changed".into();
        assert_eq!(reg.get(&id).unwrap().display_name, "A");
    }

    #[test]
    fn replacing_a_record_keeps_single_entry() {
        let mut reg = JobRegistry::new();
        let mut r = record("a", None);
        reg.put(r.clone());
        r.display_name = "renamed".into();
        reg.put(r);
        assert_eq!(reg.size(), 1);
        assert_eq!(reg.list_all().len(), 1);
        assert_eq!(reg.list_all()[0].display_name, "renamed");
    }

    #[test]
    fn stats_count_live_records() {
        let mut reg = JobRegistry::new();
        reg.put(record("a", None));
        let mut b = record("b", None);
        b.mark_active();
        reg.put(b);
        let c = record("c", None);
        let c_id = c.id;
        reg.put(c);
        reg.remove(&c_id);

        let stats = crate::job::QueueStats::from_records(reg.records());
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.total, 2);
    }

    #[test]
    fn removing_clears_active_membership() {
        let mut reg = JobRegistry::new();
        let r = record("a", None);
        let id = r.id;
        reg.put(r);
        reg.mark_active(id);
        assert!(reg.is_active(&id));
        assert_eq!(reg.active_count(), 1);
        reg.remove(&id);
        assert!(!reg.is_active(&id));
        assert_eq!(reg.active_count(), 0);
    }
}
