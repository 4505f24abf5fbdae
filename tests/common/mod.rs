//! In-memory shells for driving a channel without real processes.
//!
//! A [`ScriptedShell`] answers every written line from a script, on a
//! worker thread, by pushing CRLF-terminated bytes through the real
//! `LineBuffer` in small chunks.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use shell_channel::output::{ChunkReceiver, Line, LineBuffer};
use shell_channel::{
    Result, Shell, ShellChannelError, ShellFactory, ShellKiller, ShellKind, ShellSpec,
};

const JOB_POLL: Duration = Duration::from_millis(5);

/// One thing a scripted shell does in response to input.
#[derive(Debug, Clone)]
pub enum Step {
    /// Print a line.
    Line(String),
    /// Pause before the next step.
    Delay(Duration),
    /// Stop producing output for good.
    Hangup,
}

pub fn line(text: impl Into<String>) -> Step {
    Step::Line(text.into())
}

pub fn delay(millis: u64) -> Step {
    Step::Delay(Duration::from_millis(millis))
}

pub type Script = Arc<dyn Fn(&str) -> Vec<Step> + Send + Sync>;

/// Shared view of everything the shells of one factory did.
#[derive(Default)]
pub struct Journal {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub killed: AtomicUsize,
    written: Mutex<Vec<String>>,
}

impl Journal {
    /// Everything written, marker echoes included.
    pub fn written(&self) -> Vec<String> {
        self.written.lock().unwrap().clone()
    }

    /// Lines written other than marker echoes and setup.
    pub fn commands(&self) -> Vec<String> {
        self.written()
            .into_iter()
            .filter(|text| !text.starts_with("echo '__SHELL_"))
            .collect()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.killed.load(Ordering::SeqCst)
    }

    /// Removal commands written, in order.
    pub fn removals(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|command| command.contains(" rm "))
            .collect()
    }
}

/// How the shells of a [`ScriptedShells`] factory behave.
#[derive(Debug, Clone, Copy)]
struct Behavior {
    echo_input: bool,
    killable: bool,
    close_fails: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            echo_input: false,
            killable: true,
            close_fails: false,
        }
    }
}

/// Stops a scripted shell's worker, which ends its output.
struct ScriptedKiller {
    killed: Arc<AtomicBool>,
    journal: Arc<Journal>,
}

impl ShellKiller for ScriptedKiller {
    fn kill(&self) -> Result<()> {
        if !self.killed.swap(true, Ordering::SeqCst) {
            self.journal.killed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

pub struct ScriptedShell {
    pid: u32,
    jobs: Option<Sender<Vec<Step>>>,
    lines: LineBuffer<ChunkReceiver>,
    script: Script,
    behavior: Behavior,
    killer: Arc<ScriptedKiller>,
    journal: Arc<Journal>,
}

impl ScriptedShell {
    fn spawn(pid: u32, script: Script, behavior: Behavior, journal: Arc<Journal>) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel::<Vec<Step>>();
        let (chunks_tx, chunks_rx) = mpsc::channel::<Vec<u8>>();
        let killed = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&killed);

        // Returning drops the chunk sender, which ends the output.
        thread::spawn(move || loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            let steps = match jobs_rx.recv_timeout(JOB_POLL) {
                Ok(steps) => steps,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            };
            for step in steps {
                if stop.load(Ordering::SeqCst) {
                    return;
                }
                match step {
                    Step::Line(text) => {
                        let bytes = format!("{}\r\n", text).into_bytes();
                        // Small chunks, so terminators land on chunk edges.
                        for chunk in bytes.chunks(3) {
                            if chunks_tx.send(chunk.to_vec()).is_err() {
                                return;
                            }
                        }
                    }
                    Step::Delay(pause) => thread::sleep(pause),
                    Step::Hangup => return,
                }
            }
        });

        Self {
            pid,
            jobs: Some(jobs_tx),
            lines: LineBuffer::with_max_reads(ChunkReceiver::new(chunks_rx), 50),
            script,
            behavior,
            killer: Arc::new(ScriptedKiller {
                killed,
                journal: Arc::clone(&journal),
            }),
            journal,
        }
    }
}

/// Output of a POSIX `echo` with single-quoted arguments.
fn echo_output(text: &str) -> Option<String> {
    text.strip_prefix("echo ").map(|rest| rest.replace('\'', ""))
}

impl Shell for ScriptedShell {
    fn write(&mut self, text: &str) -> Result<()> {
        let jobs = self.jobs.as_ref().ok_or(ShellChannelError::ShellClosed)?;
        self.journal.written.lock().unwrap().push(text.to_string());

        let mut steps = Vec::new();
        if self.behavior.echo_input {
            steps.push(line(format!("$ {}", text)));
        }
        match echo_output(text) {
            Some(output) => steps.push(line(output)),
            None => steps.extend((self.script)(text)),
        }
        // The worker is gone after a hangup; writes still succeed.
        let _ = jobs.send(steps);
        Ok(())
    }

    fn kind(&self) -> ShellKind {
        ShellKind::Sh
    }

    fn pid(&self) -> Result<u32> {
        Ok(self.pid)
    }

    fn out_line(&mut self) -> Result<Line> {
        self.lines.next()
    }

    fn out_line_until(&mut self, deadline: Instant) -> Result<Option<Line>> {
        self.lines.next_until(deadline)
    }

    fn close(&mut self) -> Result<()> {
        if self.jobs.take().is_some() {
            self.journal.closed.fetch_add(1, Ordering::SeqCst);
            if self.behavior.close_fails {
                return Err(ShellChannelError::Pty("close failed".to_string()));
            }
        }
        Ok(())
    }

    fn killer(&self) -> Option<Arc<dyn ShellKiller>> {
        if !self.behavior.killable {
            return None;
        }
        let killer: Arc<dyn ShellKiller> = self.killer.clone();
        Some(killer)
    }
}

impl Drop for ScriptedShell {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Factory handing out [`ScriptedShell`]s that share one script.
pub struct ScriptedShells {
    script: Script,
    behavior: Behavior,
    next_pid: AtomicU32,
    pub journal: Arc<Journal>,
}

impl ScriptedShells {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        Self::build(script, Behavior::default())
    }

    /// Shells that print every typed line back, like a terminal with
    /// input echo left on.
    pub fn echoing<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        Self::build(
            script,
            Behavior {
                echo_input: true,
                ..Behavior::default()
            },
        )
    }

    /// Shells that offer no kill handle.
    pub fn unkillable<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        Self::build(
            script,
            Behavior {
                killable: false,
                ..Behavior::default()
            },
        )
    }

    /// Shells whose `close` reports an error.
    pub fn failing_close<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        Self::build(
            script,
            Behavior {
                close_fails: true,
                ..Behavior::default()
            },
        )
    }

    fn build<F>(script: F, behavior: Behavior) -> Arc<Self>
    where
        F: Fn(&str) -> Vec<Step> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Arc::new(script),
            behavior,
            next_pid: AtomicU32::new(1000),
            journal: Arc::new(Journal::default()),
        })
    }
}

impl ShellFactory for ScriptedShells {
    fn create(&self, _spec: &ShellSpec) -> Result<Box<dyn Shell>> {
        self.journal.created.fetch_add(1, Ordering::SeqCst);
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedShell::spawn(
            pid,
            Arc::clone(&self.script),
            self.behavior,
            Arc::clone(&self.journal),
        )))
    }
}

/// A small container engine: `run` prints a fresh id, `rm` prints the
/// removed ids, `logs` prints a startup sequence.
pub fn docker() -> impl Fn(&str) -> Vec<Step> + Send + Sync + 'static {
    let next_id = AtomicUsize::new(1);
    move |command: &str| {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        match tokens.as_slice() {
            ["docker", "run", ..] => {
                let n = next_id.fetch_add(1, Ordering::SeqCst);
                vec![line(format!("{:012x}", 0xc0ffee000 + n))]
            }
            ["docker", "rm", rest @ ..] => rest
                .iter()
                .filter(|token| !token.starts_with("--"))
                .map(|id| line(*id))
                .collect(),
            ["docker", "logs", ..] => vec![
                line("starting"),
                delay(20),
                line("initializing"),
                delay(20),
                line("ready"),
                line("serving"),
            ],
            ["docker", "ps"] => vec![line("CONTAINER ID   IMAGE"), line(""), line("abc123   alpine")],
            _ => Vec::new(),
        }
    }
}
