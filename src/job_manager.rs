//! Job Manager for submitting NAMD jobs, independently or as a chain.

use crate::error::SubmitError;
use crate::job::{JobId, JobRequest};
use crate::scheduler::{Scheduler, SchedulerCommand, SubmitCommand};
use std::path::PathBuf;

/// Outcome of one submission pass.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    /// Configuration files that were submitted, with their job IDs
    pub submitted: Vec<(PathBuf, JobId)>,
    pub failed: Vec<(PathBuf, SubmitError)>,
    /// Chain members that were never submitted because a predecessor failed
    pub skipped: Vec<PathBuf>,
}

impl SubmissionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Turns job requests into scheduler submissions.
pub struct JobManager {
    scheduler: Box<dyn Scheduler>,
    command: SchedulerCommand,
}

impl JobManager {
    /// Create a new JobManager.
    ///
    /// # Arguments
    /// * `scheduler` - Executes the rendered submission commands
    /// * `command` - sbatch invocation prefix used when rendering
    pub fn new(scheduler: Box<dyn Scheduler>, command: SchedulerCommand) -> Self {
        Self { scheduler, command }
    }

    /// Submit all requests in order.
    ///
    /// Without `chain`, every request depends only on its own `after` IDs and
    /// a failure does not stop the remaining submissions. With `chain`, the
    /// first request depends on its `after` IDs, each later one on exactly the
    /// job submitted before it, and the first failure ends the pass.
    pub fn submit_all(&mut self, requests: &[JobRequest], chain: bool) -> SubmissionReport {
        let mut report = SubmissionReport::default();
        let mut previous: Option<JobId> = None;

        for (index, request) in requests.iter().enumerate() {
            let dependencies = match (&previous, chain) {
                (Some(id), true) => vec![id.clone()],
                _ => request.after.clone(),
            };

            let command = SubmitCommand::new(&self.command, request, &dependencies);
            log::debug!(
                "submitting {} from {} after {:?}",
                request.config.display(),
                command.work_dir.display(),
                command.dependencies()
            );

            match self.scheduler.submit(&command) {
                Ok(job_id) => {
                    log::info!("{} submitted as job {}", request.config.display(), job_id);
                    if chain {
                        previous = Some(job_id.clone());
                    }
                    report.submitted.push((request.config.clone(), job_id));
                }
                Err(err) => {
                    log::debug!("{}: {}", request.config.display(), err);
                    report.failed.push((request.config.clone(), err));
                    if chain {
                        report.skipped = requests[index + 1..]
                            .iter()
                            .map(|r| r.config.clone())
                            .collect();
                        if !report.skipped.is_empty() {
                            log::info!(
                                "chain broken, {} job(s) not submitted",
                                report.skipped.len()
                            );
                        }
                        break;
                    }
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Resources;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    /// Records commands and answers with sequential job IDs starting at 100.
    #[derive(Default)]
    struct RecordingScheduler {
        issued: Rc<RefCell<Vec<SubmitCommand>>>,
        /// Zero-based submission indices that fail
        fail_at: HashSet<usize>,
    }

    impl Scheduler for RecordingScheduler {
        fn submit(&mut self, command: &SubmitCommand) -> Result<JobId, SubmitError> {
            let index = self.issued.borrow().len();
            self.issued.borrow_mut().push(command.clone());
            if self.fail_at.contains(&index) {
                return Err(SubmitError::Failed {
                    program: "sbatch".to_string(),
                    exit_code: Some(1),
                    stderr: "sbatch: error: Batch job submission failed".to_string(),
                });
            }
            Ok(format!("{}", 100 + index).parse().unwrap())
        }
    }

    fn requests(names: &[&str], after: &[&str]) -> Vec<JobRequest> {
        let resources = Resources {
            ncpus: 2,
            ngpus: 1,
            wall_time: "12:00:00".parse().unwrap(),
        };
        let after: Vec<JobId> = after.iter().map(|id| id.parse().unwrap()).collect();
        names
            .iter()
            .map(|name| JobRequest::new(PathBuf::from(name), resources.clone(), after.clone()))
            .collect()
    }

    fn manager(fail_at: &[usize]) -> (JobManager, Rc<RefCell<Vec<SubmitCommand>>>) {
        let scheduler = RecordingScheduler {
            fail_at: fail_at.iter().copied().collect(),
            ..Default::default()
        };
        let issued = Rc::clone(&scheduler.issued);
        (
            JobManager::new(Box::new(scheduler), SchedulerCommand::default()),
            issued,
        )
    }

    #[test]
    fn test_independent_submissions() {
        let (mut manager, issued) = manager(&[]);
        let report = manager.submit_all(&requests(&["a.conf", "b.conf", "c.conf"], &[]), false);

        assert!(report.is_success());
        assert_eq!(report.submitted.len(), 3);
        let issued = issued.borrow();
        assert_eq!(issued.len(), 3);
        assert!(issued.iter().all(|c| c.dependencies().is_empty()));
    }

    #[test]
    fn test_after_applies_to_every_independent_job() {
        let (mut manager, issued) = manager(&[]);
        manager.submit_all(&requests(&["a.conf", "b.conf"], &["12345"]), false);

        for command in issued.borrow().iter() {
            assert_eq!(command.dependencies(), vec!["12345"]);
        }
    }

    #[test]
    fn test_single_after() {
        let (mut manager, issued) = manager(&[]);
        manager.submit_all(&requests(&["namd.conf"], &["12345"]), false);

        let issued = issued.borrow();
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].dependencies(), vec!["12345"]);
        assert_eq!(issued[0].argv.last().unwrap(), "namd.slurm");
    }

    #[test]
    fn test_chain_links_each_job_to_previous() {
        let (mut manager, issued) = manager(&[]);
        let report = manager.submit_all(
            &requests(&["min.conf", "eq.conf", "prod1.conf", "prod2.conf"], &[]),
            true,
        );

        assert!(report.is_success());
        let issued = issued.borrow();
        assert_eq!(issued.len(), 4);
        assert!(issued[0].dependencies().is_empty());
        for k in 1..issued.len() {
            assert_eq!(issued[k].dependencies(), vec![format!("{}", 100 + k - 1)]);
        }
    }

    #[test]
    fn test_chain_starts_after_external_job() {
        let (mut manager, issued) = manager(&[]);
        manager.submit_all(&requests(&["eq.conf", "prod.conf"], &["555"]), true);

        let issued = issued.borrow();
        assert_eq!(issued[0].dependencies(), vec!["555"]);
        assert_eq!(issued[1].dependencies(), vec!["100"]);
    }

    #[test]
    fn test_chain_halts_on_failure() {
        let (mut manager, issued) = manager(&[1]);
        let report = manager.submit_all(
            &requests(&["a.conf", "b.conf", "c.conf", "d.conf"], &[]),
            true,
        );

        assert_eq!(issued.borrow().len(), 2);
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, PathBuf::from("b.conf"));
        assert_eq!(
            report.skipped,
            vec![PathBuf::from("c.conf"), PathBuf::from("d.conf")]
        );
        assert!(!report.is_success());
    }

    #[test]
    fn test_independent_failure_continues() {
        let (mut manager, issued) = manager(&[0]);
        let report = manager.submit_all(&requests(&["a.conf", "b.conf", "c.conf"], &[]), false);

        assert_eq!(issued.borrow().len(), 3);
        assert_eq!(report.submitted.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.skipped.is_empty());
        assert!(!report.is_success());
    }

    #[test]
    fn test_failure_on_last_chain_member() {
        let (mut manager, _issued) = manager(&[1]);
        let report = manager.submit_all(&requests(&["a.conf", "b.conf"], &[]), true);

        assert_eq!(report.failed.len(), 1);
        assert!(report.skipped.is_empty());
    }
}
