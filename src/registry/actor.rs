//! Single-writer registry actor
//!
//! One blocking task owns the [`VersionRegistry`]; every caller talks to it
//! through a bounded queue. Mutations from any number of async tasks are
//! applied one at a time, so none of them is lost to a read-modify-write race.

use super::{NewVersion, Version, VersionRegistry};
use crate::artifact::ArtifactDescriptor;
use crate::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Maximum queued registry commands before callers wait
const COMMAND_QUEUE_DEPTH: usize = 64;

enum Command {
    Create {
        request: NewVersion,
        reply: oneshot::Sender<Result<Version>>,
    },
    Attach {
        version_id: String,
        artifact: ArtifactDescriptor,
        reply: oneshot::Sender<Result<()>>,
    },
    Deactivate {
        version_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    History {
        reply: oneshot::Sender<Result<Vec<Version>>>,
    },
    Latest {
        reply: oneshot::Sender<Result<Option<String>>>,
    },
}

/// Owner task for a registry.
pub struct RegistryActor;

impl RegistryActor {
    /// Move `registry` onto a blocking task and return a handle to it.
    ///
    /// The task exits once every handle is dropped. Must be called inside a
    /// tokio runtime.
    #[must_use]
    pub fn spawn(registry: VersionRegistry) -> RegistryHandle {
        let (sender, mut receiver) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        tokio::task::spawn_blocking(move || {
            while let Some(command) = receiver.blocking_recv() {
                // A dropped reply receiver only means the caller gave up
                match command {
                    Command::Create { request, reply } => {
                        let _ = reply.send(registry.create_version(request));
                    }
                    Command::Attach {
                        version_id,
                        artifact,
                        reply,
                    } => {
                        let _ = reply.send(registry.attach(&version_id, artifact));
                    }
                    Command::Deactivate { version_id, reply } => {
                        let _ = reply.send(registry.deactivate(&version_id));
                    }
                    Command::History { reply } => {
                        let _ = reply.send(registry.history());
                    }
                    Command::Latest { reply } => {
                        let _ = reply.send(registry.latest());
                    }
                }
            }
            debug!(path = %registry.path().display(), "registry actor stopped");
        });

        RegistryHandle { sender }
    }
}

/// Cloneable async handle to a [`RegistryActor`].
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<Command>,
}

impl RegistryHandle {
    async fn call<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(make(reply))
            .await
            .map_err(|_| Error::ActorClosed)?;
        response.await.map_err(|_| Error::ActorClosed)?
    }

    /// Create a version.
    ///
    /// # Errors
    ///
    /// Same as [`VersionRegistry::create_version`], plus
    /// [`Error::ActorClosed`] if the actor is gone.
    pub async fn create(&self, request: NewVersion) -> Result<Version> {
        self.call(|reply| Command::Create { request, reply }).await
    }

    /// Attach an artifact descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`VersionRegistry::attach`], plus [`Error::ActorClosed`].
    pub async fn attach(&self, version_id: &str, artifact: ArtifactDescriptor) -> Result<()> {
        let version_id = version_id.to_string();
        self.call(|reply| Command::Attach {
            version_id,
            artifact,
            reply,
        })
        .await
    }

    /// Soft-delete a version.
    ///
    /// # Errors
    ///
    /// Same as [`VersionRegistry::deactivate`], plus [`Error::ActorClosed`].
    pub async fn deactivate(&self, version_id: &str) -> Result<()> {
        let version_id = version_id.to_string();
        self.call(|reply| Command::Deactivate { version_id, reply })
            .await
    }

    /// All versions in creation order.
    ///
    /// # Errors
    ///
    /// Same as [`VersionRegistry::history`], plus [`Error::ActorClosed`].
    pub async fn history(&self) -> Result<Vec<Version>> {
        self.call(|reply| Command::History { reply }).await
    }

    /// Latest pointer.
    ///
    /// # Errors
    ///
    /// Same as [`VersionRegistry::latest`], plus [`Error::ActorClosed`].
    pub async fn latest(&self) -> Result<Option<String>> {
        self.call(|reply| Command::Latest { reply }).await
    }
}
