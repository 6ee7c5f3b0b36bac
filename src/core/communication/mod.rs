// Communication module - Wire format, transport seams and route selection
pub mod facade;
pub mod message;
pub mod transport;

pub use facade::{select_route, CommandRoute};
pub use message::{Envelope, FrameKind};
pub use transport::{
    ChannelPeer, CloseInfo, CommandReply, DeviceService, LinkChannel, LinkConnector, Outbound,
    TransportEvent, NORMAL_CLOSURE,
};
