//! Runs build tasks, potentially in parallel.
//! Unaware of the build graph and command log; just command execution.
//! Workers hand results back to the scheduler over a channel and never
//! touch shared state.

use crate::depfile;
use crate::graph::{CmdRule, EdgeId};
use crate::recipe::DepsFormat;
use anyhow::bail;
use std::path::Path;
use std::sync::mpsc;

#[cfg(unix)]
use std::io::Write;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

pub struct FinishedTask {
    pub edge: EdgeId,
    pub result: TaskResult,
}

pub enum Termination {
    Success,
    Failure(i32),
}

/// The result of executing a build step.
pub struct TaskResult {
    pub termination: Termination,
    /// Combined stdout and stderr.
    pub output: Vec<u8>,
    pub discovered_deps: Option<Vec<String>>,
}

/// Split a command line into argv with POSIX-lite rules: whitespace
/// separates arguments, double quotes group, and a backslash escapes any
/// single following character inside or outside quotes.
pub fn tokenize(cmdline: &str) -> anyhow::Result<Vec<String>> {
    let mut args = Vec::new();
    let mut arg = String::new();
    let mut in_arg = false;
    let mut in_quotes = false;
    let mut chars = cmdline.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped) => {
                    arg.push(escaped);
                    in_arg = true;
                }
                None => bail!("trailing backslash in command {:?}", cmdline),
            },
            '"' => {
                in_quotes = !in_quotes;
                in_arg = true;
            }
            ch if ch.is_whitespace() && !in_quotes => {
                if in_arg {
                    args.push(std::mem::take(&mut arg));
                    in_arg = false;
                }
            }
            ch => {
                arg.push(ch);
                in_arg = true;
            }
        }
    }
    if in_quotes {
        bail!("unterminated quote in command {:?}", cmdline);
    }
    if in_arg {
        args.push(arg);
    }
    Ok(args)
}

/// Executes a build task as a subprocess.
/// Returns an Err() if we failed outside of the process itself.
fn run_task(cmd: &CmdRule) -> anyhow::Result<TaskResult> {
    let mut result = run_command(&cmd.cmdline)?;
    if matches!(result.termination, Termination::Success) && cmd.deps == DepsFormat::Gcc {
        let depfile = match cmd.depfile.as_deref() {
            Some(depfile) if !depfile.is_empty() => depfile,
            _ => bail!("rule {} has deps gcc but no depfile", cmd.name),
        };
        result.discovered_deps = Some(depfile::read(Path::new(depfile), None)?);
    }
    Ok(result)
}

#[cfg(unix)]
extern "C" {
    static environ: *const *mut libc::c_char;
}

#[cfg(unix)]
fn check_posix(func: &str, ret: libc::c_int) -> anyhow::Result<()> {
    if ret != 0 {
        bail!("{}: {}", func, std::io::Error::from_raw_os_error(ret));
    }
    Ok(())
}

#[cfg(unix)]
struct PosixSpawnFileActions(libc::posix_spawn_file_actions_t);

#[cfg(unix)]
impl PosixSpawnFileActions {
    fn new() -> anyhow::Result<Self> {
        unsafe {
            let mut actions: libc::posix_spawn_file_actions_t = std::mem::zeroed();
            check_posix(
                "posix_spawn_file_actions_init",
                libc::posix_spawn_file_actions_init(&mut actions),
            )?;
            Ok(Self(actions))
        }
    }

    fn as_ptr(&mut self) -> *mut libc::posix_spawn_file_actions_t {
        &mut self.0
    }

    fn addopen(&mut self, fd: i32, path: &std::ffi::CStr, oflag: i32) -> anyhow::Result<()> {
        unsafe {
            check_posix(
                "posix_spawn_file_actions_addopen",
                libc::posix_spawn_file_actions_addopen(&mut self.0, fd, path.as_ptr(), oflag, 0),
            )
        }
    }

    fn adddup2(&mut self, fd: i32, newfd: i32) -> anyhow::Result<()> {
        unsafe {
            check_posix(
                "posix_spawn_file_actions_adddup2",
                libc::posix_spawn_file_actions_adddup2(&mut self.0, fd, newfd),
            )
        }
    }

    fn addclose(&mut self, fd: i32) -> anyhow::Result<()> {
        unsafe {
            check_posix(
                "posix_spawn_file_actions_addclose",
                libc::posix_spawn_file_actions_addclose(&mut self.0, fd),
            )
        }
    }
}

#[cfg(unix)]
impl Drop for PosixSpawnFileActions {
    fn drop(&mut self) {
        unsafe { libc::posix_spawn_file_actions_destroy(&mut self.0) };
    }
}

/// Spawn the subprocess with stdin from /dev/null and stdout/stderr merged
/// into a single pipe, then collect its output and exit status.
/// posix_spawn is used rather than std::process because the latter cannot
/// feed both stdout and stderr into the same pipe.
#[cfg(unix)]
fn run_command(cmdline: &str) -> anyhow::Result<TaskResult> {
    use std::io::Read;

    let argv = tokenize(cmdline)?;
    if argv.is_empty() {
        bail!("empty command");
    }
    let cargs: Vec<std::ffi::CString> = argv
        .into_iter()
        .map(std::ffi::CString::new)
        .collect::<Result<_, _>>()?;
    let mut argv_ptrs: Vec<*const libc::c_char> = cargs.iter().map(|arg| arg.as_ptr()).collect();
    argv_ptrs.push(std::ptr::null());

    unsafe fn spawn_child(
        argv0: &std::ffi::CStr,
        argv_ptrs: &[*const libc::c_char],
        fds: &[libc::c_int; 2],
    ) -> anyhow::Result<libc::pid_t> {
        let mut actions = PosixSpawnFileActions::new()?;
        // stdin <= /dev/null, stdout/stderr => pipe
        let devnull = std::ffi::CStr::from_bytes_with_nul(b"/dev/null\0").unwrap();
        actions.addopen(0, devnull, libc::O_RDONLY)?;
        actions.adddup2(fds[1], 1)?;
        actions.adddup2(fds[1], 2)?;
        // close pipe in child
        actions.addclose(fds[0])?;
        actions.addclose(fds[1])?;

        let mut pid: libc::pid_t = 0;
        check_posix(
            "posix_spawnp",
            libc::posix_spawnp(
                &mut pid,
                argv0.as_ptr(),
                actions.as_ptr(),
                std::ptr::null(),
                argv_ptrs.as_ptr() as *const *mut libc::c_char,
                environ,
            ),
        )?;
        Ok(pid)
    }

    let (pid, mut pipe) = unsafe {
        use std::os::fd::FromRawFd;

        let mut fds: [libc::c_int; 2] = [0; 2];
        if libc::pipe(fds.as_mut_ptr()) < 0 {
            bail!("pipe: {}", std::io::Error::last_os_error());
        }

        let spawned = spawn_child(&cargs[0], &argv_ptrs, &fds);
        libc::close(fds[1]);
        let pid = match spawned {
            Ok(pid) => pid,
            Err(err) => {
                libc::close(fds[0]);
                return Err(err);
            }
        };
        (pid, std::fs::File::from_raw_fd(fds[0]))
    };

    // Drain the pipe before reaping so a chatty child cannot deadlock on a
    // full pipe buffer.
    let mut output = Vec::new();
    pipe.read_to_end(&mut output)?;

    let status = unsafe {
        let mut status: libc::c_int = 0;
        if libc::waitpid(pid, &mut status, 0) < 0 {
            bail!("waitpid: {}", std::io::Error::last_os_error());
        }
        std::process::ExitStatus::from_raw(status)
    };

    let termination = if status.success() {
        Termination::Success
    } else {
        let code = match status.code() {
            Some(code) => code,
            None => {
                let sig = status.signal().unwrap_or(0);
                write!(output, "signal {}", sig)?;
                128 + sig
            }
        };
        Termination::Failure(code)
    };

    Ok(TaskResult {
        termination,
        output,
        discovered_deps: None,
    })
}

#[cfg(not(unix))]
fn run_command(_cmdline: &str) -> anyhow::Result<TaskResult> {
    bail!("process spawning is only supported on unix");
}

/// Spawns worker threads and collects their completion messages.
pub struct Runner {
    finished_send: mpsc::Sender<FinishedTask>,
    finished_recv: mpsc::Receiver<FinishedTask>,
    running: usize,
}

impl Runner {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Runner {
            finished_send: tx,
            finished_recv: rx,
            running: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running > 0
    }

    pub fn start(&mut self, edge: EdgeId, cmd: CmdRule) {
        let tx = self.finished_send.clone();
        std::thread::spawn(move || {
            let result = run_task(&cmd).unwrap_or_else(|err| TaskResult {
                termination: Termination::Failure(-1),
                output: err.to_string().into_bytes(),
                discovered_deps: None,
            });
            // The send only fails if the receiver disappeared, e.g. during
            // shutdown after an earlier failure.
            let _ = tx.send(FinishedTask { edge, result });
        });
        self.running += 1;
    }

    /// Wait for a task to complete.  May block for a long time.
    pub fn wait(&mut self) -> FinishedTask {
        let task = self.finished_recv.recv().unwrap();
        self.running -= 1;
        task
    }

    /// Drain one already-completed task, without blocking.
    pub fn try_wait(&mut self) -> Option<FinishedTask> {
        match self.finished_recv.try_recv() {
            Ok(task) => {
                self.running -= 1;
                Some(task)
            }
            Err(_) => None,
        }
    }
}
