//! The base code generator whose output is post-processed.

use std::env;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;

use crate::{Error, Result};

/// The default base generator, looked up on `PATH`.
pub const DEFAULT_PROGRAM: &str = "protoc-gen-go";

/// The default time the base generator is given to produce a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Produces the Go sources that are later rewritten.
///
/// The generator receives the encoded `CodeGeneratorRequest` exactly as `protoc` sent it.
pub trait BaseGenerator: Send + Sync {
    fn generate(&self, request: &[u8]) -> Result<CodeGeneratorResponse>;
}

impl<F> BaseGenerator for F
where
    F: Fn(&[u8]) -> Result<CodeGeneratorResponse> + Send + Sync,
{
    fn generate(&self, request: &[u8]) -> Result<CodeGeneratorResponse> {
        self(request)
    }
}

/// Runs an external `protoc` plugin, by default `protoc-gen-go`.
#[derive(Clone, Debug)]
pub struct ProtocGenGo {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ProtocGenGo {
    pub fn new(program: impl Into<PathBuf>) -> ProtocGenGo {
        ProtocGenGo {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Configures the base generator from the environment.
    ///
    /// `PROTOC_GEN_GO` overrides the program, and `PROTOGO_VALUES_TIMEOUT` the timeout in
    /// seconds.
    pub fn from_env() -> Result<ProtocGenGo> {
        let program = match env::var_os("PROTOC_GEN_GO") {
            Some(program) if !program.is_empty() => PathBuf::from(program),
            _ => PathBuf::from(DEFAULT_PROGRAM),
        };

        let timeout = match env::var("PROTOGO_VALUES_TIMEOUT") {
            Ok(val) => parse_timeout(&val)?,
            Err(env::VarError::NotPresent) => DEFAULT_TIMEOUT,
            Err(env::VarError::NotUnicode(..)) => {
                return Err(Error::invalid_input(
                    "PROTOGO_VALUES_TIMEOUT environment variable is not valid UTF-8",
                ));
            }
        };

        let mut generator = ProtocGenGo::new(program);
        generator.timeout(timeout);
        Ok(generator)
    }

    /// Appends a command-line argument passed to the program.
    pub fn arg(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the time the program is given to exit before it is killed.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn io_error(&self, source: io::Error) -> Error {
        Error::Io {
            program: self.program_name(),
            source,
        }
    }

    fn timed_out(&self) -> Error {
        Error::Timeout {
            program: self.program_name(),
            timeout: self.timeout,
        }
    }

    fn wait(&self, child: &mut Child, deadline: Instant) -> Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait().map_err(|e| self.io_error(e))? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                // The child may have exited between `try_wait` and `kill`.
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out());
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Joins a pipe thread, giving up at `deadline`.
    ///
    /// A process forked by the child can keep a pipe open after the child itself has exited or
    /// been killed. The thread is detached in that case.
    fn join<T>(
        &self,
        handle: JoinHandle<io::Result<T>>,
        deadline: Instant,
    ) -> Result<io::Result<T>> {
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                return Err(self.timed_out());
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(handle.join().unwrap_or_else(|_| Err(broken_thread())))
    }
}

impl Default for ProtocGenGo {
    fn default() -> ProtocGenGo {
        ProtocGenGo::new(DEFAULT_PROGRAM)
    }
}

impl BaseGenerator for ProtocGenGo {
    fn generate(&self, request: &[u8]) -> Result<CodeGeneratorResponse> {
        debug!(
            "running {} ({} byte request, timeout {:?})",
            self.program_name(),
            request.len(),
            self.timeout
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program_name(),
                source,
            })?;

        // Feed stdin and drain stdout/stderr concurrently, so that neither side blocks on a full
        // pipe while the deadline is being watched.
        let deadline = Instant::now() + self.timeout;
        let stdin = child.stdin.take();
        let input = request.to_vec();
        let writer = thread::spawn(move || -> io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });
        let stdout = read_to_end(child.stdout.take());
        let stderr = read_to_end(child.stderr.take());

        // On timeout the pipe threads are dropped undrained.
        let status = self.wait(&mut child, deadline)?;
        let written = self.join(writer, deadline)?;
        let stdout = self.join(stdout, deadline)?;
        let stderr = self.join(stderr, deadline)?;

        if !status.success() {
            let stderr = stderr.unwrap_or_default();
            return Err(Error::ExitStatus {
                program: self.program_name(),
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        written.map_err(|e| self.io_error(e))?;
        let stdout = stdout.map_err(|e| self.io_error(e))?;

        CodeGeneratorResponse::decode(&*stdout).map_err(|source| Error::MalformedResponse {
            program: self.program_name(),
            source,
        })
    }
}

fn read_to_end<R>(pipe: Option<R>) -> JoinHandle<io::Result<Vec<u8>>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn broken_thread() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "pipe thread panicked")
}

fn parse_timeout(val: &str) -> Result<Duration> {
    match val.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(Error::invalid_input(format!(
            "PROTOGO_VALUES_TIMEOUT must be a positive number of seconds, got {:?}",
            val
        ))),
    }
}
