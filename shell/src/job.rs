use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use std::io::{self, Write};
use thiserror::Error;

/// A background pipeline, identified by the pid of its first stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: Pid,
    pub cmdline: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("job list full (max {capacity})")]
pub struct JobTableFull {
    pub capacity: usize,
}

/// Fixed-capacity list of background jobs, in launch order.
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            capacity,
        }
    }

    pub fn add(&mut self, pid: Pid, cmdline: &str) -> Result<(), JobTableFull> {
        if self.jobs.len() >= self.capacity {
            return Err(JobTableFull {
                capacity: self.capacity,
            });
        }
        self.jobs.push(Job {
            pid,
            cmdline: cmdline.to_string(),
        });
        Ok(())
    }

    /// Remove the job led by `pid`; the remaining jobs keep their order.
    pub fn remove_by_pid(&mut self, pid: Pid) -> Option<Job> {
        let idx = self.jobs.iter().position(|job| job.pid == pid)?;
        Some(self.jobs.remove(idx))
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn list(&self, out: &mut dyn Write) -> io::Result<()> {
        if self.jobs.is_empty() {
            return writeln!(out, "No background jobs.");
        }
        for (i, job) in self.jobs.iter().enumerate() {
            writeln!(out, "[{}] PID={}  {}", i + 1, job.pid, job.cmdline)?;
        }
        Ok(())
    }

    /// Collect every child that has already terminated, without blocking.
    ///
    /// Reaped pids are dropped from the table; children that were never
    /// tracked (non-leader stages, overflowed jobs) are reaped all the same.
    pub fn reap(&mut self) -> Vec<Pid> {
        let mut reaped = Vec::new();
        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(status) => {
                    let Some(pid) = status.pid() else { break };
                    if let Some(job) = self.remove_by_pid(pid) {
                        log::info!("background job {} finished: {}", pid, job.cmdline);
                    }
                    reaped.push(pid);
                }
                Err(Errno::EINTR) => continue,
                Err(Errno::ECHILD) => break,
                Err(e) => {
                    log::warn!("waitpid failed while reaping: {e}");
                    break;
                }
            }
        }
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::lock_processes;
    use std::process::Command;
    use std::thread::sleep;
    use std::time::Duration;

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn test_add_and_list() {
        let mut table = JobTable::new(4);
        table.add(pid(100), "sleep 10").unwrap();
        table.add(pid(200), "yes | head").unwrap();
        let mut out = Vec::new();
        table.list(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[1] PID=100  sleep 10\n[2] PID=200  yes | head\n"
        );
    }

    #[test]
    fn test_empty_list() {
        let mut out = Vec::new();
        JobTable::new(1).list(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No background jobs.\n");
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut table = JobTable::new(1);
        table.add(pid(1), "a").unwrap();
        assert_eq!(table.add(pid(2), "b"), Err(JobTableFull { capacity: 1 }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut table = JobTable::new(8);
        table.add(pid(1), "a").unwrap();
        table.add(pid(2), "b").unwrap();
        table.add(pid(3), "c").unwrap();
        let removed = table.remove_by_pid(pid(2)).unwrap();
        assert_eq!(removed.cmdline, "b");
        let left: Vec<i32> = table.jobs().iter().map(|j| j.pid.as_raw()).collect();
        assert_eq!(left, [1, 3]);
        assert!(table.remove_by_pid(pid(42)).is_none());
    }

    #[test]
    fn test_reap_removes_finished_child() {
        let _lock = lock_processes();
        let child = Command::new("true").spawn().unwrap();
        let child_pid = Pid::from_raw(child.id() as i32);

        let mut table = JobTable::new(4);
        table.add(child_pid, "true").unwrap();
        table.add(pid(i32::MAX), "still tracked").unwrap();

        let mut reaped = Vec::new();
        for _ in 0..50 {
            reaped.extend(table.reap());
            if reaped.contains(&child_pid) {
                break;
            }
            sleep(Duration::from_millis(20));
        }
        assert!(reaped.contains(&child_pid));
        assert_eq!(table.len(), 1);
        assert_eq!(table.jobs()[0].cmdline, "still tracked");
    }
}
