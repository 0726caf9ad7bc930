//! hs-io: asynchronous device attachment for running models.
//!
//! Devices run on their own threads and talk to the integration loop only
//! through one-slot, last-write-wins channels ([`LatestSlot`]). Neither side
//! ever waits on the other: a slow reader loses intermediate values, a slow
//! writer leaves the previous input in place.

pub mod device;
pub mod error;
pub mod loopback;
pub mod registry;
pub mod slot;

pub use device::{DeviceConfig, InputDevice, OutputDevice};
pub use error::{DeviceError, DeviceResult};
pub use loopback::{LastValue, LoopbackEnd, LoopbackReceiver, LoopbackSender};
pub use registry::IoRegistry;
pub use slot::{LatestSlot, SlotReader, SlotWriter};
