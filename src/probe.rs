use std::fs;

use crate::error::{Error, Result};

/// One resource reading of a supervised process.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSample {
    /// Resident set size in kilobytes.
    pub memory_kb: u64,
    /// Cumulative CPU time (user + system) in milliseconds.
    pub cpu_ms: u64,
}

/// The process-control surface the poll loop runs against. Kept minimal
/// so an alternate backend (a cgroup sampler, say) can substitute without
/// touching the loop.
pub trait ProcessControl {
    fn suspend(&self);
    fn resume(&self);
    fn kill(&self);
    /// Fails once the process is gone or has turned into a zombie; the
    /// poll loop treats that as normal termination, not a fault.
    fn sample(&self) -> Result<ResourceSample>;
}

/// Signal- and procfs-based `ProcessControl`.
pub struct ProcessProbe {
    pid: u32,
    ticks_per_sec: u64,
}

impl ProcessProbe {
    pub fn new(pid: u32) -> Self {
        let ticks_per_sec = unsafe { libc::sysconf(libc::_SC_CLK_TCK) } as u64;
        Self { pid, ticks_per_sec }
    }

    fn signal(&self, sig: libc::c_int) {
        // ESRCH just means the process already left; nothing to do then
        unsafe { libc::kill(self.pid as libc::pid_t, sig) };
    }

    /// State letter and cumulative CPU ticks from /proc/<pid>/stat.
    fn read_stat(&self) -> Result<(char, u64)> {
        let content = fs::read_to_string(format!("/proc/{}/stat", self.pid))?;
        // the comm field may contain spaces; everything of interest sits
        // after the closing parenthesis
        let rest = content
            .rsplit(')')
            .next()
            .ok_or_else(|| Error::Data(format!("malformed stat for process {}", self.pid)))?;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 13 {
            return Err(Error::Data(format!(
                "malformed stat for process {}",
                self.pid
            )));
        }
        let state = fields[0].chars().next().unwrap_or('?');
        let utime: u64 = fields[11]
            .parse()
            .map_err(|_| Error::Data(format!("bad utime for process {}", self.pid)))?;
        let stime: u64 = fields[12]
            .parse()
            .map_err(|_| Error::Data(format!("bad stime for process {}", self.pid)))?;
        Ok((state, utime + stime))
    }

    /// VmRSS from /proc/<pid>/status. The line disappears for zombies,
    /// which counts as the process being gone.
    fn read_resident_kb(&self) -> Result<u64> {
        let content = fs::read_to_string(format!("/proc/{}/status", self.pid))?;
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb = rest
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| {
                        Error::Data(format!("bad VmRSS for process {}", self.pid))
                    })?;
                return Ok(kb);
            }
        }
        Err(Error::NotFound(format!(
            "resident memory of process {}",
            self.pid
        )))
    }
}

impl ProcessControl for ProcessProbe {
    fn suspend(&self) {
        self.signal(libc::SIGSTOP);
    }

    fn resume(&self) {
        self.signal(libc::SIGCONT);
    }

    fn kill(&self) {
        self.signal(libc::SIGKILL);
    }

    fn sample(&self) -> Result<ResourceSample> {
        let (state, ticks) = self.read_stat()?;
        if state == 'Z' || state == 'X' || state == 'x' {
            return Err(Error::NotFound(format!("process {}", self.pid)));
        }
        let memory_kb = self.read_resident_kb()?;
        let cpu_ms = ticks * 1000 / self.ticks_per_sec;
        Ok(ResourceSample { memory_kb, cpu_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn sample_own_process() -> Result<()> {
        let probe = ProcessProbe::new(std::process::id());
        let sample = probe.sample()?;
        assert!(sample.memory_kb > 0);
        Ok(())
    }

    #[test]
    fn sample_fails_for_missing_process() {
        // pids wrap long before this value
        let probe = ProcessProbe::new(u32::MAX - 1);
        assert!(probe.sample().is_err());
    }

    #[test]
    fn suspend_and_resume_child() -> Result<()> {
        let mut child = Command::new("sleep")
            .arg("5")
            .stdout(Stdio::null())
            .spawn()?;
        let probe = ProcessProbe::new(child.id());

        probe.suspend();
        // give the kernel a moment to park it
        std::thread::sleep(std::time::Duration::from_millis(50));
        let (state, _) = probe.read_stat()?;
        assert_eq!(state, 'T');

        probe.resume();
        probe.kill();
        child.wait()?;
        Ok(())
    }
}
