//! The cloneable front door to a running [`Node`](crate::node::Node).
//!
//! Every call becomes a [`Command`] on the node's queue, so it is ordered
//! with received frames and engine ticks.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use reticulum_core::destination::Destination;
use reticulum_core::identity::Identity;
use reticulum_core::types::{DestinationHash, IdentityHash, PacketHash};
use reticulum_transport::{InterfaceId, InterfaceInfo};

use crate::error::NodeError;
use crate::handler::{AnnounceHandler, DestinationHandler, LinkHandler, ReceiptHandler};

/// Result of [`NodeHandle::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// At least one interface took the packet.
    pub sent: bool,
    pub packet_hash: Option<PacketHash>,
    /// A receipt is watching for the proof.
    pub receipt: bool,
}

/// The current path to a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathInfo {
    pub hops: u8,
    pub next_hop: IdentityHash,
    pub interface: InterfaceId,
}

type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Inbound {
        interface: InterfaceId,
        raw: Bytes,
    },
    AttachInterface {
        name: String,
        info: Option<InterfaceInfo>,
        sender: mpsc::Sender<Bytes>,
        reply: Reply<Result<InterfaceId, NodeError>>,
    },
    DetachInterface {
        interface: InterfaceId,
        reply: Reply<bool>,
    },
    RegisterDestination {
        destination: Destination,
        handler: Box<dyn DestinationHandler>,
        reply: Reply<Result<(), NodeError>>,
    },
    DeregisterDestination {
        destination: DestinationHash,
        reply: Reply<bool>,
    },
    AddAnnounceHandler {
        handler: Box<dyn AnnounceHandler>,
    },
    SetLinkHandler {
        handler: Box<dyn LinkHandler>,
    },
    Announce {
        destination: DestinationHash,
        app_data: Option<Bytes>,
        reply: Reply<Result<(), NodeError>>,
    },
    Send {
        destination: Destination,
        data: Bytes,
        receipt: Option<Box<dyn ReceiptHandler>>,
        reply: Reply<Result<SendOutcome, NodeError>>,
    },
    RequestPath {
        destination: DestinationHash,
        reply: Reply<Result<(), NodeError>>,
    },
    Path {
        destination: DestinationHash,
        reply: Reply<Option<PathInfo>>,
    },
    RecallIdentity {
        destination: DestinationHash,
        reply: Reply<Option<Arc<dyn Identity>>>,
    },
    Persist {
        reply: Reply<Result<usize, NodeError>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Talks to a node task. Cheap to clone; the node stops once every handle
/// is dropped or [`NodeHandle::shutdown`] is called.
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}

impl NodeHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    async fn submit(&self, command: Command) -> Result<(), NodeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| NodeError::NotRunning)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, NodeError> {
        let (reply, response) = oneshot::channel();
        self.submit(command(reply)).await?;
        response.await.map_err(|_| NodeError::NotRunning)
    }

    /// Hand a frame received on `interface` to the node.
    pub async fn inbound(&self, interface: InterfaceId, raw: Bytes) -> Result<(), NodeError> {
        self.submit(Command::Inbound { interface, raw }).await
    }

    /// Attach a driver's outbound queue under `name`. The `[[interfaces]]`
    /// entry of that name configures it; unknown names get defaults.
    pub async fn attach_interface(
        &self,
        name: impl Into<String>,
        sender: mpsc::Sender<Bytes>,
    ) -> Result<InterfaceId, NodeError> {
        let name = name.into();
        self.request(|reply| Command::AttachInterface {
            name,
            info: None,
            sender,
            reply,
        })
        .await?
    }

    /// Attach a driver with an explicit description, ignoring the config.
    pub async fn attach_interface_info(
        &self,
        info: InterfaceInfo,
        sender: mpsc::Sender<Bytes>,
    ) -> Result<InterfaceId, NodeError> {
        self.request(|reply| Command::AttachInterface {
            name: info.name.clone(),
            info: Some(info),
            sender,
            reply,
        })
        .await?
    }

    pub async fn detach_interface(&self, interface: InterfaceId) -> Result<bool, NodeError> {
        self.request(|reply| Command::DetachInterface { interface, reply })
            .await
    }

    pub async fn register_destination(
        &self,
        destination: Destination,
        handler: impl DestinationHandler + 'static,
    ) -> Result<(), NodeError> {
        self.request(|reply| Command::RegisterDestination {
            destination,
            handler: Box::new(handler),
            reply,
        })
        .await?
    }

    pub async fn deregister_destination(&self, destination: DestinationHash) -> Result<bool, NodeError> {
        self.request(|reply| Command::DeregisterDestination { destination, reply })
            .await
    }

    pub async fn add_announce_handler(
        &self,
        handler: impl AnnounceHandler + 'static,
    ) -> Result<(), NodeError> {
        self.submit(Command::AddAnnounceHandler {
            handler: Box::new(handler),
        })
        .await
    }

    pub async fn set_link_handler(&self, handler: impl LinkHandler + 'static) -> Result<(), NodeError> {
        self.submit(Command::SetLinkHandler {
            handler: Box::new(handler),
        })
        .await
    }

    /// Announce a registered destination on every interface.
    pub async fn announce(
        &self,
        destination: DestinationHash,
        app_data: Option<Bytes>,
    ) -> Result<(), NodeError> {
        self.request(|reply| Command::Announce {
            destination,
            app_data,
            reply,
        })
        .await?
    }

    /// Send `data` to `destination`. A receipt handler, if given, hears
    /// once whether the packet was proven.
    pub async fn send(
        &self,
        destination: Destination,
        data: impl Into<Bytes>,
        receipt: Option<Box<dyn ReceiptHandler>>,
    ) -> Result<SendOutcome, NodeError> {
        let data = data.into();
        self.request(|reply| Command::Send {
            destination,
            data,
            receipt,
            reply,
        })
        .await?
    }

    pub async fn request_path(&self, destination: DestinationHash) -> Result<(), NodeError> {
        self.request(|reply| Command::RequestPath { destination, reply })
            .await?
    }

    pub async fn path(&self, destination: DestinationHash) -> Result<Option<PathInfo>, NodeError> {
        self.request(|reply| Command::Path { destination, reply }).await
    }

    pub async fn recall_identity(
        &self,
        destination: DestinationHash,
    ) -> Result<Option<Arc<dyn Identity>>, NodeError> {
        self.request(|reply| Command::RecallIdentity { destination, reply })
            .await
    }

    /// Persist now instead of waiting for the interval. Returns the number
    /// of tables written.
    pub async fn persist(&self) -> Result<usize, NodeError> {
        self.request(|reply| Command::Persist { reply }).await?
    }

    /// Stop the node. Returns after the final persist.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
