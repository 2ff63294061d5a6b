pub mod enums;
pub mod header;
pub mod packet;
pub mod question;
pub mod resource;

pub use enums::{DNSResourceClass, DNSResourceType, ResponseCode};
pub use header::DNSHeader;
pub use packet::DNSPacket;
pub use question::{DNSQuestion, Query};
pub use resource::DNSResource;
