//! Child-process oracle adapter.
//!
//! The engine being tuned runs as a separate process speaking a line
//! protocol on stdin/stdout:
//!
//! ```text
//! -> coef <index> <value>
//! <- coef <previous> <name>     (or "end" past the schema)
//! -> eval <depth> <position>
//! <- score <value>
//! -> quit
//! ```
//!
//! Exactly one reply per request, so reads are synchronous. Each worker gets
//! its own process; nothing here is shared.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use texel_core::{Coefficient, Oracle, TuneError, TuneResult};

pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wraps the stdin/stdout of one engine process.
pub struct OracleProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    label: String,
}

impl OracleProcess {
    pub fn spawn(path: &Path, args: &[String], label: String) -> Result<Self> {
        let mut cmd = Command::new(path);
        if !args.is_empty() {
            cmd.args(args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn engine at {}", path.display()))?;
        let stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow!("no stdout"))?;
        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            label,
        })
    }

    /// Send one request line and read its single reply line.
    fn transact(&mut self, request: &str) -> TuneResult<String> {
        let io = |e: std::io::Error| TuneError::Oracle(format!("{}: {e}", self.label));
        writeln!(self.stdin, "{request}").map_err(io)?;
        self.stdin.flush().map_err(io)?;

        let mut line = String::new();
        let n = self.stdout.read_line(&mut line).map_err(io)?;
        if n == 0 {
            return Err(TuneError::Oracle(format!(
                "{}: engine closed the pipe",
                self.label
            )));
        }
        Ok(line.trim_end().to_string())
    }
}

impl Oracle for OracleProcess {
    fn set_coefficient(&mut self, index: usize, value: i64) -> TuneResult<Option<Coefficient>> {
        let reply = self.transact(&format!("coef {index} {value}"))?;
        parse_coefficient_reply(&reply)
            .map_err(|e| TuneError::Oracle(format!("{}: {e}", self.label)))
    }

    fn evaluate(&mut self, position: &str, depth: u32) -> TuneResult<f64> {
        let reply = self.transact(&format!("eval {depth} {position}"))?;
        parse_score_reply(&reply).map_err(|e| TuneError::Oracle(format!("{}: {e}", self.label)))
    }
}

impl Drop for OracleProcess {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "quit");
        let _ = self.stdin.flush();
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => {
                    std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
                }
                _ => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn parse_coefficient_reply(reply: &str) -> Result<Option<Coefficient>, String> {
    if reply == "end" {
        return Ok(None);
    }
    let rest = reply
        .strip_prefix("coef ")
        .ok_or_else(|| format!("unexpected reply {reply:?}"))?;
    let (previous, name) = rest
        .split_once(' ')
        .ok_or_else(|| format!("malformed coefficient reply {reply:?}"))?;
    let previous: i64 = previous
        .parse()
        .map_err(|_| format!("bad previous value in {reply:?}"))?;
    if name.is_empty() {
        return Err(format!("missing coefficient name in {reply:?}"));
    }
    Ok(Some(Coefficient {
        previous,
        name: name.to_string(),
    }))
}

fn parse_score_reply(reply: &str) -> Result<f64, String> {
    let score = reply
        .strip_prefix("score ")
        .ok_or_else(|| format!("unexpected reply {reply:?}"))?;
    let score: f64 = score
        .parse()
        .map_err(|_| format!("bad score in {reply:?}"))?;
    if !score.is_finite() {
        return Err(format!("non-finite score in {reply:?}"));
    }
    Ok(score)
}
