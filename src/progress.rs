//! Console reporting of build progress, without any overprinting.

use std::io::Write;

pub struct Progress {
    /// Whether to print command lines of started tasks instead of their
    /// descriptions.
    verbose: bool,
}

impl Progress {
    pub fn new(verbose: bool) -> Progress {
        Progress { verbose }
    }

    pub fn task_started(&self, desc: &str, cmdline: &str) {
        self.log(if self.verbose { cmdline } else { desc });
    }

    pub fn task_finished(&self, output: &[u8]) {
        if !output.is_empty() {
            let _ = std::io::stdout().write_all(output);
        }
    }

    pub fn task_failed(&self, desc: &str, output: &[u8]) {
        self.log(&format!("failed: {}", desc));
        if !output.is_empty() {
            let _ = std::io::stdout().write_all(output);
        }
    }

    pub fn log(&self, msg: &str) {
        println!("{}", msg);
    }
}
