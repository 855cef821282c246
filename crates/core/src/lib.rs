pub mod assembler;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod loopback;
pub mod reference;
pub mod scaler;
pub mod transport;

pub use codec::{AudioCodec, CodecStats, ReferenceCodec};
pub use config::CodecConfig;
pub use error::CodecError;
pub use reference::ReferenceBuffer;
pub use transport::{InputTransport, OutputTransport, TransportError};
