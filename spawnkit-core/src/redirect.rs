//! Resolution of the child's standard streams into pipes or caller-owned descriptors.

use crate::descriptor::{Descriptor, RawDescriptor};
use crate::launch::{LaunchSpec, RedirectTarget, StdStream};
use crate::{error, trace_categories};

/// The two ends available for one standard stream of a child about to be spawned.
#[derive(Debug)]
pub(crate) enum StreamEnds {
    /// A pipe allocated for this spawn; both ends are owned here.
    Pipe {
        read: Descriptor,
        write: Descriptor,
    },
    /// A caller-owned descriptor, used for both roles and never closed.
    Caller(RawDescriptor),
    /// No binding at all (stderr when outputs are merged).
    Unbound,
}

impl StreamEnds {
    /// The descriptor the child should see for `stream`: the read end for stdin, the
    /// write end for stdout and stderr.
    pub fn child_end(&self, stream: StdStream) -> Option<RawDescriptor> {
        match self {
            Self::Pipe { read, write } => match stream {
                StdStream::Stdin => read.as_raw(),
                StdStream::Stdout | StdStream::Stderr => write.as_raw(),
            },
            Self::Caller(raw) => Some(*raw),
            Self::Unbound => None,
        }
    }

    /// Closes the child's end of an allocated pipe, once the child has its own copy.
    /// Caller-owned descriptors are left untouched.
    pub fn close_child_end(&mut self, stream: StdStream) {
        if let Self::Pipe { read, write } = self {
            let end = match stream {
                StdStream::Stdin => read,
                StdStream::Stdout | StdStream::Stderr => write,
            };

            if let Err(e) = end.close() {
                tracing::warn!(target: trace_categories::FDS, "failed to close {stream} pipe end: {e}");
            }
        }
    }

    /// The raw end the parent keeps, without taking it. Only pipes have one.
    #[cfg_attr(windows, allow(dead_code))]
    pub fn parent_end_raw(&self, stream: StdStream) -> Option<RawDescriptor> {
        match self {
            Self::Pipe { read, write } => match stream {
                StdStream::Stdin => write.as_raw(),
                StdStream::Stdout | StdStream::Stderr => read.as_raw(),
            },
            Self::Caller(_) | Self::Unbound => None,
        }
    }

    /// Takes the end the parent keeps: the write end for stdin, the read end for
    /// stdout and stderr. Caller-owned and unbound streams yield an empty descriptor.
    pub fn take_parent_end(&mut self, stream: StdStream) -> Descriptor {
        match self {
            Self::Pipe { read, write } => {
                let end = match stream {
                    StdStream::Stdin => write,
                    StdStream::Stdout | StdStream::Stderr => read,
                };
                std::mem::replace(end, Descriptor::invalid())
            }
            Self::Caller(_) | Self::Unbound => Descriptor::invalid(),
        }
    }
}

/// The resolved bindings for all three standard streams.
#[derive(Debug)]
pub(crate) struct ResolvedStreams {
    pub stdin: StreamEnds,
    pub stdout: StreamEnds,
    pub stderr: StreamEnds,
}

impl ResolvedStreams {
    /// Resolves the streams of `spec` in order: stdin, stdout, then stderr unless
    /// outputs are merged. Pipes are created with `make_pipe`, which is told the
    /// stream each pipe is for.
    ///
    /// If any stream fails to bind, pipes already created for earlier streams are
    /// closed before the error is returned.
    pub fn resolve<F>(spec: &LaunchSpec, mut make_pipe: F) -> Result<Self, error::Error>
    where
        F: FnMut(StdStream) -> std::io::Result<(Descriptor, Descriptor)>,
    {
        let stdin = bind(StdStream::Stdin, spec.stdin, &mut make_pipe)?;
        let stdout = bind(StdStream::Stdout, spec.stdout, &mut make_pipe)?;
        let stderr = if spec.merge_outputs {
            StreamEnds::Unbound
        } else {
            bind(StdStream::Stderr, spec.stderr, &mut make_pipe)?
        };

        Ok(Self {
            stdin,
            stdout,
            stderr,
        })
    }

    /// The descriptors the child should install as its stdin, stdout, and stderr.
    /// In merge mode, stderr shares stdout's descriptor.
    pub fn child_ends(&self) -> [Option<RawDescriptor>; 3] {
        let stdout = self.stdout.child_end(StdStream::Stdout);
        let stderr = match self.stderr {
            StreamEnds::Unbound => stdout,
            ref ends => ends.child_end(StdStream::Stderr),
        };

        [self.stdin.child_end(StdStream::Stdin), stdout, stderr]
    }

    /// The pipe ends the parent keeps, which the child must not hold open.
    #[cfg_attr(windows, allow(dead_code))]
    pub fn parent_ends(&self) -> [Option<RawDescriptor>; 3] {
        [
            self.stdin.parent_end_raw(StdStream::Stdin),
            self.stdout.parent_end_raw(StdStream::Stdout),
            self.stderr.parent_end_raw(StdStream::Stderr),
        ]
    }

    /// Closes the parent's copies of every pipe end that was handed to the child.
    pub fn close_child_ends(&mut self) {
        self.stdin.close_child_end(StdStream::Stdin);
        self.stdout.close_child_end(StdStream::Stdout);
        self.stderr.close_child_end(StdStream::Stderr);
    }
}

fn bind<F>(stream: StdStream, target: RedirectTarget, make_pipe: &mut F) -> Result<StreamEnds, error::Error>
where
    F: FnMut(StdStream) -> std::io::Result<(Descriptor, Descriptor)>,
{
    match target {
        RedirectTarget::Descriptor(raw) => Ok(StreamEnds::Caller(raw)),
        RedirectTarget::Unset => match make_pipe(stream) {
            Ok((read, write)) => Ok(StreamEnds::Pipe { read, write }),
            Err(source) => {
                tracing::debug!(target: trace_categories::SPAWN, "unable to bind {stream}; rolling back earlier pipes");
                Err(error::Error::StreamBinding { stream, source })
            }
        },
    }
}
