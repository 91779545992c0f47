/// nf/ — the normalizing-flow trainer/sampler subsystem
pub mod flow;
pub mod sample;
pub mod train;

pub use flow::NFModel;
pub use sample::sample;
pub use train::{fit, NfTrainConfig};
