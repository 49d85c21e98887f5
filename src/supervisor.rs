use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::checker::CheckerFn;
use crate::error::{Error, Result};
use crate::model::{CheckedTest, Test};
use crate::probe::{ProcessControl, ProcessProbe};
use crate::Status;

/// Resource policy for one run, taken from the task.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Milliseconds of CPU time.
    pub time_limit: u64,
    /// Kilobytes of resident memory.
    pub memory_limit: u64,
}

/// Poll cadence and idleness threshold.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub poll_interval: Duration,
    pub idle_limit: Duration,
}

/// Run one program against one test under the suspend-sample-resume duty
/// cycle and classify the outcome into `checked`.
///
/// The child is stopped right after spawn, before any input is delivered,
/// so it cannot make unmonitored progress ahead of the first sample. The
/// input/output exchange runs on helper threads against the child's pipes
/// and never blocks the poll loop (or vice versa).
pub fn supervise(
    argv: &[String],
    test: &Test,
    checker: CheckerFn,
    limits: Limits,
    timing: Timing,
    checked: &mut CheckedTest,
) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| Error::Data("empty launch command".into()))?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let probe = ProcessProbe::new(child.id());
    probe.suspend();

    let mut stdin = child.stdin.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "failed to open stdin")
    })?;
    let mut stdout = child.stdout.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "failed to open stdout")
    })?;
    let mut stderr = child.stderr.take().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "failed to open stderr")
    })?;

    let input = test.input.clone();
    let writer = thread::spawn(move || {
        // the child may exit (or be killed) without draining its input
        let _ = stdin.write_all(input.as_bytes());
    });
    let out_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let err_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    poll_loop(&probe, limits, timing, checked);

    // in case the loop left it suspended
    probe.resume();
    let exit = child.wait()?;
    let _ = writer.join();
    let output = out_reader
        .join()
        .map_err(|_| Error::Worker("stdout collector panicked".into()))?;
    let errors = err_reader
        .join()
        .map_err(|_| Error::Worker("stderr collector panicked".into()))?;

    checked.message = String::from_utf8_lossy(&errors).to_string();

    // a kill decision made by the loop is final
    if checked.status == Status::Testing {
        if !exit.success() {
            checked.status = Status::RuntimeError;
        } else {
            let output = String::from_utf8(output)?;
            checked.status = if checker(test, &output) {
                Status::Accepted
            } else {
                Status::WrongAnswer
            };
        }
    }
    debug!(
        "test {}: {} ({} ms, {} KB)",
        test.id, checked.status, checked.time_used, checked.memory_used
    );
    Ok(())
}

/// The duty cycle: sample while stopped, account, enforce limits, let the
/// child run for one interval, stop it again. Exits when the process is
/// gone or reaped into a zombie.
fn poll_loop<P: ProcessControl>(
    probe: &P,
    limits: Limits,
    timing: Timing,
    checked: &mut CheckedTest,
) {
    let poll_ms = timing.poll_interval.as_millis() as u64;
    let idle_limit_ms = timing.idle_limit.as_millis() as u64;
    let mut idle_ms = 0u64;
    let mut last_cpu_ms = 0u64;

    loop {
        let sample = match probe.sample() {
            Ok(sample) => sample,
            // the process exited on its own; nothing left to account
            Err(_) => break,
        };

        checked.memory_used = checked.memory_used.max(sample.memory_kb);
        checked.time_used = checked.time_used.max(sample.cpu_ms);

        let worked = sample.cpu_ms.saturating_sub(last_cpu_ms);
        last_cpu_ms = sample.cpu_ms;
        // clamped at zero per sample: a multi-core child that outruns the
        // wall clock must not pay down idleness it never had
        idle_ms += poll_ms.saturating_sub(worked);

        if checked.status == Status::Testing {
            if sample.memory_kb > limits.memory_limit {
                checked.status = Status::MemoryLimitExceeded;
                probe.kill();
            } else if sample.cpu_ms > limits.time_limit {
                checked.status = Status::TimeLimitExceeded;
                probe.kill();
            } else if idle_ms > idle_limit_ms {
                checked.status = Status::IdleLimitExceeded;
                probe.kill();
            }
        }

        probe.resume();
        thread::sleep(timing.poll_interval);
        probe.suspend();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::resolve_checker;
    use crate::error::Result as GraderResult;
    use crate::probe::ResourceSample;
    use std::sync::Mutex;

    const GENEROUS: Limits = Limits {
        time_limit: 10_000,
        memory_limit: 262_144,
    };

    fn timing() -> Timing {
        Timing {
            poll_interval: Duration::from_millis(20),
            idle_limit: Duration::from_millis(5000),
        }
    }

    fn python(program: &str) -> Vec<String> {
        vec!["python3".into(), "-c".into(), program.into()]
    }

    fn run(
        argv: Vec<String>,
        input: &str,
        expected: &str,
        limits: Limits,
        timing: Timing,
    ) -> GraderResult<CheckedTest> {
        let test = Test {
            id: 1,
            input: input.into(),
            output: expected.into(),
        };
        let mut checked = CheckedTest::new(1, 1);
        supervise(&argv, &test, resolve_checker(None), limits, timing, &mut checked)?;
        Ok(checked)
    }

    #[test]
    fn empty_launch_command_is_an_error() {
        let test = Test {
            id: 1,
            input: String::new(),
            output: String::new(),
        };
        let mut checked = CheckedTest::new(1, 1);
        let result = supervise(
            &[],
            &test,
            resolve_checker(None),
            GENEROUS,
            timing(),
            &mut checked,
        );
        assert!(result.is_err());
        // classification is the caller's job once supervision fails
        assert_eq!(checked.status, Status::Testing);
    }

    #[test]
    fn accepted_run() -> GraderResult<()> {
        let argv = python("print(sum(int(x) for x in input().split()))");
        let checked = run(argv, "3 4\n", "7", GENEROUS, timing())?;
        assert_eq!(checked.status, Status::Accepted);
        assert!(checked.memory_used > 0);
        Ok(())
    }

    #[test]
    fn wrong_answer_run() -> GraderResult<()> {
        let argv = python("input(); print(8)");
        let checked = run(argv, "3 4\n", "7", GENEROUS, timing())?;
        assert_eq!(checked.status, Status::WrongAnswer);
        Ok(())
    }

    #[test]
    fn runtime_error_keeps_stderr() -> GraderResult<()> {
        let argv = python("raise RuntimeError('boom')");
        let checked = run(argv, "", "", GENEROUS, timing())?;
        assert_eq!(checked.status, Status::RuntimeError);
        assert!(checked.message.contains("boom"));
        Ok(())
    }

    #[test]
    fn busy_loop_hits_time_limit() -> GraderResult<()> {
        let limits = Limits {
            time_limit: 100,
            memory_limit: 262_144,
        };
        let argv = python("while True: pass");
        let checked = run(argv, "", "", limits, timing())?;
        assert_eq!(checked.status, Status::TimeLimitExceeded);
        assert!(checked.time_used > 100);
        assert!(checked.time_used < 300);
        Ok(())
    }

    #[test]
    fn sleeper_hits_idle_limit() -> GraderResult<()> {
        let short_idle = Timing {
            poll_interval: Duration::from_millis(20),
            idle_limit: Duration::from_millis(300),
        };
        let argv = python("import time; time.sleep(600)");
        let checked = run(argv, "", "", GENEROUS, short_idle)?;
        assert_eq!(checked.status, Status::IdleLimitExceeded);
        Ok(())
    }

    #[test]
    fn allocator_hits_memory_limit() -> GraderResult<()> {
        let limits = Limits {
            time_limit: 30_000,
            memory_limit: 65_536,
        };
        let argv = python(
            "x = []\nwhile True: x.append(' ' * (1024 * 1024))",
        );
        let checked = run(argv, "", "", limits, timing())?;
        assert_eq!(checked.status, Status::MemoryLimitExceeded);
        assert!(checked.memory_used > 65_536);
        Ok(())
    }

    /// Scripted probe for exercising the loop without a real process.
    struct FakeProbe {
        samples: Mutex<Vec<ResourceSample>>,
        killed: Mutex<bool>,
    }

    impl FakeProbe {
        fn new(samples: Vec<ResourceSample>) -> Self {
            let mut samples = samples;
            samples.reverse();
            Self {
                samples: Mutex::new(samples),
                killed: Mutex::new(false),
            }
        }

        fn killed(&self) -> bool {
            *self.killed.lock().unwrap()
        }
    }

    impl ProcessControl for FakeProbe {
        fn suspend(&self) {}
        fn resume(&self) {}
        fn kill(&self) {
            *self.killed.lock().unwrap() = true;
        }
        fn sample(&self) -> GraderResult<ResourceSample> {
            self.samples
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::NotFound("process".into()))
        }
    }

    fn fast_timing() -> Timing {
        Timing {
            poll_interval: Duration::from_millis(1),
            idle_limit: Duration::from_millis(5000),
        }
    }

    fn sample(memory_kb: u64, cpu_ms: u64) -> ResourceSample {
        ResourceSample { memory_kb, cpu_ms }
    }

    #[test]
    fn counters_are_monotonic() {
        let probe = FakeProbe::new(vec![
            sample(100, 3),
            sample(400, 6),
            sample(50, 9),
        ]);
        let mut checked = CheckedTest::new(1, 1);
        poll_loop(&probe, GENEROUS, fast_timing(), &mut checked);
        assert_eq!(checked.memory_used, 400);
        assert_eq!(checked.time_used, 9);
        assert!(!probe.killed());
    }

    #[test]
    fn memory_kill_is_not_overwritten() {
        let limits = Limits {
            time_limit: 2, // would also trip, but memory fires first
            memory_limit: 200,
        };
        let probe = FakeProbe::new(vec![
            sample(100, 1),
            sample(300, 5),
            sample(350, 9),
        ]);
        let mut checked = CheckedTest::new(1, 1);
        poll_loop(&probe, limits, fast_timing(), &mut checked);
        assert_eq!(checked.status, Status::MemoryLimitExceeded);
        assert!(probe.killed());
    }

    #[test]
    fn idle_accumulates_when_no_progress() {
        let idle_timing = Timing {
            poll_interval: Duration::from_millis(1),
            idle_limit: Duration::from_millis(3),
        };
        // no CPU progress at all: idle grows by one interval per sample
        let probe = FakeProbe::new(vec![
            sample(10, 0),
            sample(10, 0),
            sample(10, 0),
            sample(10, 0),
            sample(10, 0),
        ]);
        let mut checked = CheckedTest::new(1, 1);
        poll_loop(&probe, GENEROUS, idle_timing, &mut checked);
        assert_eq!(checked.status, Status::IdleLimitExceeded);
        assert!(probe.killed());
    }

    #[test]
    fn fast_children_never_reduce_idle() {
        let idle_timing = Timing {
            poll_interval: Duration::from_millis(1),
            idle_limit: Duration::from_millis(100),
        };
        // a multi-core child burning 10 ms of CPU per 1 ms interval
        let probe = FakeProbe::new(vec![
            sample(10, 10),
            sample(10, 20),
            sample(10, 30),
        ]);
        let mut checked = CheckedTest::new(1, 1);
        poll_loop(&probe, GENEROUS, idle_timing, &mut checked);
        assert_eq!(checked.status, Status::Testing);
        assert!(!probe.killed());
    }
}
